//! Routeline - replay a navigation along a route.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, RouteParams};
use futures::channel::oneshot;
use futures::future::FutureExt;
use futures::{join, select};
use log::{debug, error, info, warn};
use rand::rng;
use routeline::config::RouteStyle;
use routeline::geometry::Point;
use routeline::render::backend::RecordingBackend;
use routeline::render::dots::DotsHandle;
use routeline::render::picking::{pick_route, SnapshotFeatureQuery, PICK_RADIUS};
use routeline::render::tessellator::StrokeTessellator;
use routeline::render::transform::Transform;
use routeline::render::vanishing_line::VanishingLineHandle;
use routeline::render::{FrameState, PuckState, RenderStats, RouteRenderer};
use routeline::route::channel::{route_channel, RouteCommandReceiver, RouteCommandSender, SnapshotReader};
use routeline::route::geometry::RouteGeometry;
use routeline::route::manager::RouteManager;
use routeline::route::{Precision, ProjectionMode, RouteId};
use routeline::sources::{circle, load_routes_parallel, synthetic_traffic, FileFormat};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task;

/// Padding around the routes when fitting the view to them, in pixels.
const VIEW_PADDING: f64 = 20.0;

/// Message sent by the navigation task to the render loop.
#[derive(Debug)]
enum NavMessage {
    /// Fits the view to a bounding box.
    View {
        /// Coordinate space of the routes.
        projection: ProjectionMode,
        /// Minimum corner of the box.
        min: Point<f64>,
        /// Maximum corner of the box.
        max: Point<f64>,
    },
    /// Moves the puck, triggering a frame.
    Puck(PuckState),
    /// End of the navigation.
    End,
}

/// Parameters of the navigation task.
struct Navigation {
    route_params: RouteParams,
    style: RouteStyle,
    ticks: u32,
    tick_period: Duration,
    traffic_zones: usize,
    capture_output: Option<String>,
    parallel_loads: usize,
}

/// Routes to navigate, as created in the route manager.
struct Routes {
    main: RouteId,
    alternatives: Vec<RouteId>,
    projection: ProjectionMode,
    geometry: RouteGeometry,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Cli {
        route_params,
        style,
        width,
        height,
        ticks,
        tick_millis,
        traffic_zones,
        capture_output,
        parallel_loads,
    } = Cli::parse();
    let style = style.unwrap_or_default();

    let renderer = RouteRenderer::new(StrokeTessellator::default());
    let blue_line = renderer.blue_line_handle();
    let dots = renderer.dots_handle();

    // Separate threads for navigation and rendering.
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let (ui_tx, ui_rx) = channel();
    let (routes_tx, routes_rx) = route_channel();
    let reader = routes_tx.reader();

    let navigation = Navigation {
        route_params,
        style,
        ticks,
        tick_period: Duration::from_millis(tick_millis),
        traffic_zones: traffic_zones as usize,
        capture_output,
        parallel_loads: parallel_loads as usize,
    };

    let background = thread::spawn(move || -> anyhow::Result<()> {
        // Create the Tokio runtime.
        let rt = Runtime::new().context("Failed to create the Tokio runtime")?;

        // Spawn the root task.
        rt.block_on(async {
            select!(
                _ = cancel_rx.fuse() => Ok(()),
                res = tokio_loop(
                    routes_tx,
                    routes_rx,
                    ui_tx,
                    blue_line,
                    dots,
                    navigation,
                ).fuse() => res,
            )
        })?;
        info!("End of navigation thread");
        Ok(())
    });

    let result = render_loop(ui_rx, reader, renderer, width, height);
    if cancel_tx.send(()).is_err() {
        debug!("Navigation already finished");
    }

    match background.join() {
        Ok(res) => res.context("Failed to run the navigation")?,
        Err(_) => error!("Navigation thread panicked"),
    }
    result
}

/// Asynchronous loop running the route owner task alongside the navigation.
///
/// This is invoked with a Tokio runtime in a background thread by the main
/// function.
async fn tokio_loop(
    routes_tx: RouteCommandSender,
    routes_rx: RouteCommandReceiver,
    ui_tx: Sender<NavMessage>,
    blue_line: VanishingLineHandle,
    dots: DotsHandle,
    navigation: Navigation,
) -> anyhow::Result<()> {
    let (manager, res) = join!(routes_rx.serve(RouteManager::new()), async {
        let res = navigate(&routes_tx, &ui_tx, &blue_line, &dots, &navigation).await;
        warn_on_error(routes_tx.close(), "close the route channel");
        warn_on_error(
            ui_tx.send(NavMessage::End).context("Render loop stopped"),
            "notify the end of the navigation",
        );
        res
    });

    info!("Route manager: {}", manager.stats());
    res
}

/// Creates the routes and moves along the main one.
async fn navigate(
    routes_tx: &RouteCommandSender,
    ui_tx: &Sender<NavMessage>,
    blue_line: &VanishingLineHandle,
    dots: &DotsHandle,
    navigation: &Navigation,
) -> anyhow::Result<()> {
    let style = &navigation.style;
    let Routes {
        main,
        alternatives,
        projection,
        geometry,
    } = create_routes(routes_tx, navigation).await?;

    // Traffic on the main route.
    let traffic = synthetic_traffic(
        &mut rng(),
        geometry.len(),
        navigation.traffic_zones,
        &style.traffic,
        style.route.outer_color,
    );
    for options in traffic {
        if routes_tx.create_segment(main, options).await?.is_none() {
            warn!("Traffic segment rejected on route {main}");
        }
    }
    routes_tx.set_vanishing_route(main)?;
    let snapshot = routes_tx.finalized().await?;

    // Lighter traffic on the alternatives.
    for &id in &alternatives {
        let Some(frame) = snapshot.route(id) else {
            continue;
        };
        let traffic = synthetic_traffic(
            &mut rng(),
            frame.geometry.len(),
            navigation.traffic_zones,
            &style.alternative_traffic,
            style.route.outer_color,
        );
        for options in traffic {
            if routes_tx.create_segment(id, options).await?.is_none() {
                warn!("Traffic segment rejected on route {id}");
            }
        }
    }

    // Overlays and view.
    blue_line.set_style(style.blue_line_color, style.blue_line_width)?;
    blue_line.set_line(geometry.points().to_vec())?;
    let destinations: Vec<Point<f64>> = snapshot
        .routes
        .iter()
        .filter_map(|frame| frame.geometry.points().last().copied())
        .collect();
    dots.set_options(style.dots)?;
    dots.set_points(destinations)?;
    dots.set_enabled(true)?;

    let bounds = snapshot
        .routes
        .iter()
        .filter_map(|frame| frame.geometry.bounding_box())
        .reduce(|(min_a, max_a), (min_b, max_b)| {
            (
                Point::new(min_a.x.min(min_b.x), min_a.y.min(min_b.y)),
                Point::new(max_a.x.max(max_b.x), max_a.y.max(max_b.y)),
            )
        });
    if let Some((min, max)) = bounds {
        ui_tx
            .send(NavMessage::View {
                projection,
                min,
                max,
            })
            .context("Failed to send the view to the render loop")?;
    }

    // Navigation ticks.
    let mut interval = tokio::time::interval(navigation.tick_period);
    for tick in 0..=navigation.ticks {
        interval.tick().await;
        let percent = tick as f64 / navigation.ticks as f64;
        let (location, bearing) = geometry.point_and_bearing(percent, Precision::Fine);
        routes_tx.set_progress_percent(main, percent)?;
        debug!("Tick {tick}: progress {percent:.4}, bearing {bearing:.1}");

        if tick == navigation.ticks / 2 {
            for &id in &alternatives {
                info!("Dropping alternative route {id}");
                routes_tx.dispose_route(id)?;
            }
        }
        routes_tx.finalize()?;

        blue_line.set_percent(percent)?;
        ui_tx
            .send(NavMessage::Puck(PuckState {
                location,
                bearing,
                visible: true,
            }))
            .context("Failed to send the puck to the render loop")?;
    }

    if let Some(path) = &navigation.capture_output {
        let json = routes_tx.capture().await?;
        let path = path.clone();
        let path2 = path.clone();
        task::spawn_blocking(move || std::fs::write(&path, json))
            .await
            .with_context(|| format!("Failed to join background task to write capture: {path2}"))?
            .with_context(|| format!("Failed to write capture to: {path2}"))?;
        info!("Wrote capture to {path2}");
    }

    Ok(())
}

/// Creates the routes described by the command line.
async fn create_routes(
    routes_tx: &RouteCommandSender,
    navigation: &Navigation,
) -> anyhow::Result<Routes> {
    let style = &navigation.style;
    let (projection, mut lines) = match &navigation.route_params {
        RouteParams::Circle(params) => {
            let lines = (0..=params.alternatives)
                .map(|i| {
                    circle(
                        params.radius,
                        params.resolution as usize,
                        i as f64 * params.radius * 2.5,
                    )
                })
                .collect::<Vec<_>>();
            (ProjectionMode::Planar, lines)
        }
        RouteParams::Geojson(params) => (
            ProjectionMode::Mercator,
            load_files(&params.files, FileFormat::GeoJson, navigation).await,
        ),
        RouteParams::Gpx(params) => (
            ProjectionMode::Mercator,
            load_files(&params.files, FileFormat::Gpx, navigation).await,
        ),
        RouteParams::Polyline(params) => (
            ProjectionMode::Mercator,
            load_files(&params.files, FileFormat::Polyline, navigation).await,
        ),
        RouteParams::Capture(params) => return replay_capture(routes_tx, &params.file).await,
    };

    if lines.is_empty() {
        anyhow::bail!("No route to navigate");
    }
    let main_line = lines.remove(0);
    let main = routes_tx
        .create_route(main_line.clone(), style.route_options(projection))
        .await?
        .context("Failed to create the main route")?;

    let mut alternatives = Vec::new();
    for line in lines {
        match routes_tx
            .create_route(line, style.alternative_options(projection))
            .await?
        {
            Some(id) => alternatives.push(id),
            None => warn!("Failed to create an alternative route"),
        }
    }
    info!(
        "Created main route {main} and {} alternatives",
        alternatives.len()
    );

    Ok(Routes {
        main,
        alternatives,
        projection,
        geometry: RouteGeometry::new(main_line, projection.metric()),
    })
}

/// Loads route files, skipping the ones that fail.
async fn load_files(
    files: &[String],
    format: FileFormat,
    navigation: &Navigation,
) -> Vec<Vec<Point<f64>>> {
    load_routes_parallel(files, format, navigation.parallel_loads)
        .await
        .into_iter()
        .map(|route| route.points)
        .filter(|points| !points.is_empty())
        .collect()
}

/// Loads the routes of a capture file. The vanishing route is the main one.
async fn replay_capture(routes_tx: &RouteCommandSender, file: &str) -> anyhow::Result<Routes> {
    let path = file.to_owned();
    let json = task::spawn_blocking(move || std::fs::read_to_string(path))
        .await
        .with_context(|| format!("Failed to join background task to read capture: {file}"))?
        .with_context(|| format!("Failed to read capture from: {file}"))?;
    routes_tx.load_capture(json).await?;

    let snapshot = routes_tx.finalized().await?;
    let main = snapshot
        .vanishing
        .or_else(|| snapshot.routes.first().map(|frame| frame.id))
        .context("Capture has no route")?;
    let frame = snapshot
        .route(main)
        .context("Capture has no vanishing route")?;
    let alternatives = snapshot
        .routes
        .iter()
        .map(|frame| frame.id)
        .filter(|&id| id != main)
        .collect();

    let projection = frame.options.projection;
    Ok(Routes {
        main,
        alternatives,
        projection,
        geometry: RouteGeometry::new(frame.geometry.points().to_vec(), projection.metric()),
    })
}

/// Renders a frame for each puck update, until the navigation ends.
fn render_loop(
    ui_rx: Receiver<NavMessage>,
    reader: SnapshotReader,
    mut renderer: RouteRenderer<StrokeTessellator>,
    width: u32,
    height: u32,
) -> anyhow::Result<()> {
    let mut backend = RecordingBackend::new();
    let mut frame = FrameState {
        transform: Transform::new(width, height, ProjectionMode::Planar),
        puck: PuckState::default(),
    };
    let mut frames = 0usize;
    let mut totals = RenderStats::default();

    for msg in ui_rx.iter() {
        match msg {
            NavMessage::View {
                projection,
                min,
                max,
            } => {
                frame.transform = Transform::new(width, height, projection);
                frame.transform.fit_bounds(&min, &max, VIEW_PADDING);
            }
            NavMessage::Puck(puck) => {
                frame.puck = puck;
                let snapshot = reader.latest();
                let stats = renderer.render(&mut backend, &snapshot, &frame);
                let commands = backend.take_commands();
                debug!("Frame {frames}: {} draw commands", commands.len());
                frames += 1;
                totals.routes_drawn += stats.routes_drawn;
                totals.meshes_built += stats.meshes_built;
                totals.meshes_released += stats.meshes_released;
                totals.ramps_uploaded += stats.ramps_uploaded;
                totals.blue_line_vertices = stats.blue_line_vertices;
                totals.dots_drawn = stats.dots_drawn;
                totals.puck_drawn = stats.puck_drawn;
            }
            NavMessage::End => break,
        }
    }

    let snapshot = reader.latest();
    if frame.puck.visible {
        let position = frame.transform.to_screen(&frame.puck.location);
        let query = SnapshotFeatureQuery::new(&snapshot, &frame.transform);
        match pick_route(&snapshot, &query, position, PICK_RADIUS) {
            Some(id) => info!("Route under the puck: {id}"),
            None => info!("No route under the puck"),
        }
    }

    renderer.release(&mut backend);
    let (meshes, textures, buffers) = backend.live_resources();
    if meshes + textures + buffers != 0 {
        warn!("Leaked GPU resources: {meshes} meshes, {textures} textures, {buffers} buffers");
    }
    info!("Rendered {frames} frames: {totals}");
    Ok(())
}

/// Logs a warning if the given result is an error.
fn warn_on_error(result: anyhow::Result<()>, what: &str) {
    if let Err(e) = result {
        warn!("Failed to {what}: {e:?}");
    }
}
