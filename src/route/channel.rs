//! An asynchronous channel for producers to mutate routes owned by a
//! background task, which publishes finalized snapshots to the renderer.

use super::capture::CaptureError;
use super::manager::{RouteManager, RouteSnapshot};
use super::segment::{RouteSegmentOptions, SegmentAddressing};
use super::{Precision, RouteId, RouteOptions, SegmentId};
use crate::geometry::Point;
use anyhow::Context;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::channel::oneshot;
use futures::future;
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use std::sync::{Arc, PoisonError, RwLock};

/// Mutation requested to the owner of the routes.
#[derive(Debug)]
pub enum RouteCommand {
    /// Creates a route.
    Create {
        /// Polyline of the route.
        points: Vec<Point<f64>>,
        /// Style of the route.
        options: RouteOptions,
        /// Receives the identifier of the new route.
        reply: oneshot::Sender<Option<RouteId>>,
    },
    /// Disposes of a route.
    Dispose(RouteId),
    /// Adds a traffic segment.
    SegmentCreate {
        /// Route of the segment.
        id: RouteId,
        /// Bounds and colors of the segment.
        options: RouteSegmentOptions,
        /// Receives the identifier of the new segment.
        reply: oneshot::Sender<Option<SegmentId>>,
    },
    /// Replaces a traffic segment.
    SegmentUpdate {
        /// Route of the segment.
        id: RouteId,
        /// Segment to replace.
        segment: SegmentId,
        /// New bounds and colors of the segment.
        options: RouteSegmentOptions,
    },
    /// Removes a traffic segment.
    SegmentDispose {
        /// Route of the segment.
        id: RouteId,
        /// Segment to remove.
        segment: SegmentId,
    },
    /// Removes all the traffic segments of a route.
    ClearSegments(RouteId),
    /// Sets the traveled fraction of a route.
    SetProgressPercent {
        /// Route to update.
        id: RouteId,
        /// Traveled fraction.
        percent: f64,
    },
    /// Sets the progress of a route to its point closest to a location.
    SetProgressPoint {
        /// Route to update.
        id: RouteId,
        /// Current location.
        point: Point<f64>,
        /// Whether to snap to the closest vertex.
        precision: Precision,
        /// Receives the new progress.
        reply: oneshot::Sender<Option<f64>>,
    },
    /// Sets the progress of a route to a traveled distance.
    SetProgressInMeters {
        /// Route to update.
        id: RouteId,
        /// Traveled distance.
        distance: f64,
    },
    /// Designates the vanishing route.
    SetVanishingRoute(RouteId),
    /// Chooses how new segments are addressed.
    SetSegmentAddressing(SegmentAddressing),
    /// Replaces all the routes with the ones of a capture.
    LoadCapture {
        /// JSON capture.
        json: String,
        /// Receives the outcome.
        reply: oneshot::Sender<Result<(), CaptureError>>,
    },
    /// Serializes all the routes.
    Capture {
        /// Receives the JSON capture.
        reply: oneshot::Sender<Result<String, CaptureError>>,
    },
    /// Commits the pending changes and publishes a new snapshot.
    Finalize,
    /// Commits the pending changes, publishes a new snapshot and returns it.
    Snapshot {
        /// Receives the new snapshot.
        reply: oneshot::Sender<Arc<RouteSnapshot>>,
    },
    /// End of stream.
    End,
}

/// Latest snapshot published by the owner task.
type Published = Arc<RwLock<Arc<RouteSnapshot>>>;

/// Sending side of the channel, for producers to mutate routes.
#[derive(Clone)]
pub struct RouteCommandSender {
    tx: UnboundedSender<RouteCommand>,
    published: Published,
}

/// Receiving side of the channel, consumed by the task owning the routes.
pub struct RouteCommandReceiver {
    rx: UnboundedReceiver<RouteCommand>,
    published: Published,
}

/// Read access to the latest finalized snapshot, for the renderer.
#[derive(Clone)]
pub struct SnapshotReader {
    published: Published,
}

/// Constructs a channel to communicate [`RouteCommand`]s.
pub fn route_channel() -> (RouteCommandSender, RouteCommandReceiver) {
    let (tx, rx) = unbounded();
    let published_tx = Arc::new(RwLock::new(Arc::new(RouteSnapshot::default())));
    let published_rx = published_tx.clone();
    (
        RouteCommandSender {
            tx,
            published: published_tx,
        },
        RouteCommandReceiver {
            rx,
            published: published_rx,
        },
    )
}

impl SnapshotReader {
    /// Returns the latest finalized snapshot.
    pub fn latest(&self) -> Arc<RouteSnapshot> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RouteCommandSender {
    /// Returns a reader of the published snapshots.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            published: self.published.clone(),
        }
    }

    /// Creates a route.
    pub async fn create_route(
        &self,
        points: Vec<Point<f64>>,
        options: RouteOptions,
    ) -> anyhow::Result<Option<RouteId>> {
        let (reply, rx) = oneshot::channel();
        self.send(RouteCommand::Create {
            points,
            options,
            reply,
        })?;
        rx.await.context("Failed to receive the created route id")
    }

    /// Disposes of a route.
    pub fn dispose_route(&self, id: RouteId) -> anyhow::Result<()> {
        self.send(RouteCommand::Dispose(id))
    }

    /// Adds a traffic segment to a route.
    pub async fn create_segment(
        &self,
        id: RouteId,
        options: RouteSegmentOptions,
    ) -> anyhow::Result<Option<SegmentId>> {
        let (reply, rx) = oneshot::channel();
        self.send(RouteCommand::SegmentCreate { id, options, reply })?;
        rx.await.context("Failed to receive the created segment id")
    }

    /// Replaces a traffic segment of a route.
    pub fn update_segment(
        &self,
        id: RouteId,
        segment: SegmentId,
        options: RouteSegmentOptions,
    ) -> anyhow::Result<()> {
        self.send(RouteCommand::SegmentUpdate {
            id,
            segment,
            options,
        })
    }

    /// Removes a traffic segment from a route.
    pub fn dispose_segment(&self, id: RouteId, segment: SegmentId) -> anyhow::Result<()> {
        self.send(RouteCommand::SegmentDispose { id, segment })
    }

    /// Removes all the traffic segments of a route.
    pub fn clear_segments(&self, id: RouteId) -> anyhow::Result<()> {
        self.send(RouteCommand::ClearSegments(id))
    }

    /// Sets the traveled fraction of a route.
    pub fn set_progress_percent(&self, id: RouteId, percent: f64) -> anyhow::Result<()> {
        self.send(RouteCommand::SetProgressPercent { id, percent })
    }

    /// Sets the progress of a route from a location, returning the new
    /// progress.
    pub async fn set_progress_point(
        &self,
        id: RouteId,
        point: Point<f64>,
        precision: Precision,
    ) -> anyhow::Result<Option<f64>> {
        let (reply, rx) = oneshot::channel();
        self.send(RouteCommand::SetProgressPoint {
            id,
            point,
            precision,
            reply,
        })?;
        rx.await.context("Failed to receive the route progress")
    }

    /// Sets the progress of a route to a traveled distance.
    pub fn set_progress_in_meters(&self, id: RouteId, distance: f64) -> anyhow::Result<()> {
        self.send(RouteCommand::SetProgressInMeters { id, distance })
    }

    /// Designates the vanishing route.
    pub fn set_vanishing_route(&self, id: RouteId) -> anyhow::Result<()> {
        self.send(RouteCommand::SetVanishingRoute(id))
    }

    /// Chooses how new segments are addressed.
    pub fn set_segment_addressing(&self, addressing: SegmentAddressing) -> anyhow::Result<()> {
        self.send(RouteCommand::SetSegmentAddressing(addressing))
    }

    /// Replaces all the routes with the ones of a JSON capture.
    pub async fn load_capture(&self, json: String) -> anyhow::Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(RouteCommand::LoadCapture { json, reply })?;
        rx.await
            .context("Failed to receive the capture outcome")?
            .context("Failed to load capture")
    }

    /// Serializes all the routes into a JSON capture.
    pub async fn capture(&self) -> anyhow::Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send(RouteCommand::Capture { reply })?;
        rx.await
            .context("Failed to receive the capture")?
            .context("Failed to capture routes")
    }

    /// Commits the pending changes.
    pub fn finalize(&self) -> anyhow::Result<()> {
        self.send(RouteCommand::Finalize)
    }

    /// Commits the pending changes and waits for the resulting snapshot.
    pub async fn finalized(&self) -> anyhow::Result<Arc<RouteSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.send(RouteCommand::Snapshot { reply })?;
        rx.await.context("Failed to receive the route snapshot")
    }

    /// Notifies that the channel is ready to close.
    pub fn close(&self) -> anyhow::Result<()> {
        self.send(RouteCommand::End)
    }

    /// Sends a [`RouteCommand`].
    fn send(&self, msg: RouteCommand) -> anyhow::Result<()> {
        self.tx
            .unbounded_send(msg)
            .context("Failed to send route command on the channel")
    }
}

impl RouteCommandReceiver {
    /// Returns a reader of the published snapshots.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            published: self.published.clone(),
        }
    }

    /// Applies the received commands to `manager` until the channel closes,
    /// then returns the manager.
    pub async fn serve(self, mut manager: RouteManager) -> RouteManager {
        let published = self.published.clone();
        let mut commands = Box::pin(self.into_stream());

        while let Some(command) = commands.next().await {
            apply(&mut manager, &published, command);
        }
        info!("Route channel closed");
        manager
    }

    /// Transforms the receiving end of the channel into an asynchronous stream
    /// of [`RouteCommand`]s, ending at [`RouteCommand::End`].
    pub fn into_stream(self) -> impl Stream<Item = RouteCommand> {
        self.rx
            .take_while(|command| future::ready(!matches!(command, RouteCommand::End)))
    }
}

/// Replies to a command, if the requester still waits for it.
fn reply<T>(tx: oneshot::Sender<T>, value: T) {
    if tx.send(value).is_err() {
        debug!("Requester dropped before the reply");
    }
}

fn publish(manager: &mut RouteManager, published: &Published) -> Arc<RouteSnapshot> {
    let snapshot = manager.finalize();
    *published.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
    snapshot
}

fn apply(manager: &mut RouteManager, published: &Published, command: RouteCommand) {
    match command {
        RouteCommand::Create {
            points,
            options,
            reply: tx,
        } => reply(tx, manager.route_create(points, options)),
        RouteCommand::Dispose(id) => {
            manager.route_dispose(id);
        }
        RouteCommand::SegmentCreate {
            id,
            options,
            reply: tx,
        } => reply(tx, manager.route_segment_create(id, options)),
        RouteCommand::SegmentUpdate {
            id,
            segment,
            options,
        } => {
            manager.route_segment_update(id, segment, options);
        }
        RouteCommand::SegmentDispose { id, segment } => {
            manager.route_segment_dispose(id, segment);
        }
        RouteCommand::ClearSegments(id) => {
            manager.route_clear_segments(id);
        }
        RouteCommand::SetProgressPercent { id, percent } => {
            manager.route_set_progress_percent(id, percent);
        }
        RouteCommand::SetProgressPoint {
            id,
            point,
            precision,
            reply: tx,
        } => reply(tx, manager.route_set_progress_point(id, &point, precision)),
        RouteCommand::SetProgressInMeters { id, distance } => {
            manager.route_set_progress_in_meters(id, distance);
        }
        RouteCommand::SetVanishingRoute(id) => {
            manager.set_vanishing_route_id(id);
        }
        RouteCommand::SetSegmentAddressing(addressing) => {
            manager.set_segment_addressing(addressing);
        }
        RouteCommand::LoadCapture { json, reply: tx } => {
            let result = manager.load_capture(&json);
            if let Err(e) = &result {
                warn!("Failed to load capture: {e}");
            }
            reply(tx, result)
        }
        RouteCommand::Capture { reply: tx } => reply(tx, manager.capture_snapshot()),
        RouteCommand::Finalize => {
            publish(manager, published);
        }
        RouteCommand::Snapshot { reply: tx } => reply(tx, publish(manager, published)),
        RouteCommand::End => (),
    }
}
