//! JSON captures of all the routes of a [`RouteManager`], to save and replay
//! a navigation session.

use super::manager::RouteManager;
use super::segment::{RouteSegmentOptions, SegmentAddressing};
use super::{RouteId, RouteOptions};
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the capture format.
pub const CAPTURE_VERSION: u32 = 1;

/// Error while loading or saving a capture.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The capture isn't valid JSON, or doesn't have the expected schema.
    #[error("Failed to parse capture at line {line}, column {column}: {message}")]
    Parse {
        /// Line of the error, starting at 1.
        line: usize,
        /// Column of the error, starting at 1.
        column: usize,
        /// Description of the error.
        message: String,
    },
    /// The capture is well-formed but can't be applied.
    #[error("Invalid capture: {reason}")]
    Invalid {
        /// Description of the problem.
        reason: String,
    },
    /// The capture couldn't be serialized.
    #[error("Failed to serialize capture")]
    Serialize(#[source] serde_json::Error),
}

impl From<serde_json::Error> for CaptureError {
    fn from(e: serde_json::Error) -> Self {
        CaptureError::Parse {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}

fn invalid(reason: impl Into<String>) -> CaptureError {
    CaptureError::Invalid {
        reason: reason.into(),
    }
}

/// Serialized state of a [`RouteManager`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    /// Format version, see [`CAPTURE_VERSION`].
    pub version: u32,
    /// How new segments are addressed, and how captured segments without
    /// their own addressing are resolved.
    #[serde(default)]
    pub segment_addressing: SegmentAddressing,
    /// Route whose traveled part vanishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vanishing_route_id: Option<RouteId>,
    /// All the routes.
    pub routes: Vec<CapturedRoute>,
    /// Recorded progress values of the vanishing route.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nav_stops: Vec<f64>,
}

/// Serialized route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRoute {
    /// Identifier of the route when it was captured.
    pub id: RouteId,
    /// Polyline of the route.
    pub geometry: Vec<Point<f64>>,
    /// Style of the route.
    #[serde(default)]
    pub options: RouteOptions,
    /// Traveled fraction of the route.
    #[serde(default)]
    pub progress: f64,
    /// Traffic segments, in insertion order.
    #[serde(default)]
    pub segments: Vec<CapturedSegment>,
}

/// Serialized traffic segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedSegment {
    /// How the options were resolved when the segment was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressing: Option<SegmentAddressing>,
    /// Bounds and colors of the segment.
    #[serde(flatten)]
    pub options: RouteSegmentOptions,
}

impl Capture {
    /// Captures the current state of a manager.
    pub fn from_manager(manager: &RouteManager) -> Self {
        let routes = manager
            .all_routes()
            .into_iter()
            .filter_map(|id| {
                let route = manager.route(id)?;
                Some(CapturedRoute {
                    id,
                    geometry: route.geometry().points().to_vec(),
                    options: *route.options(),
                    progress: route.progress(),
                    segments: route
                        .segments()
                        .segments()
                        .iter()
                        .map(|segment| CapturedSegment {
                            addressing: Some(segment.addressing()),
                            options: segment.options().clone(),
                        })
                        .collect(),
                })
            })
            .collect();
        Capture {
            version: CAPTURE_VERSION,
            segment_addressing: manager.segment_addressing(),
            vanishing_route_id: manager.vanishing_route_id(),
            routes,
            nav_stops: manager.nav_stops().to_vec(),
        }
    }

    /// Parses a capture from JSON.
    pub fn parse(json: &str) -> Result<Self, CaptureError> {
        let capture: Capture = serde_json::from_str(json)?;
        if capture.version != CAPTURE_VERSION {
            return Err(invalid(format!(
                "unsupported version {} (expected {CAPTURE_VERSION})",
                capture.version
            )));
        }
        Ok(capture)
    }

    /// Serializes this capture to JSON.
    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string_pretty(self).map_err(CaptureError::Serialize)
    }

    /// Recreates the captured routes into an empty manager.
    ///
    /// Routes get consecutive identifiers, in the order of their captured
    /// identifiers.
    pub fn restore(&self, manager: &mut RouteManager) -> Result<(), CaptureError> {
        let mut routes: Vec<&CapturedRoute> = self.routes.iter().collect();
        routes.sort_by_key(|route| route.id);
        if let Some(route) = routes.iter().find(|route| !route.id.is_valid()) {
            return Err(invalid(format!("invalid route id {}", route.id)));
        }
        if let Some(pair) = routes.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(invalid(format!("duplicate route id {}", pair[0].id)));
        }

        let mut remap = BTreeMap::new();
        if !routes.is_empty() {
            let first = manager
                .route_pre_create(routes.len() as u32)
                .ok_or_else(|| {
                    invalid(format!(
                        "{} routes don't fit in ids [0, {}]",
                        routes.len(),
                        manager.max_id()
                    ))
                })?;

            for (i, captured) in routes.iter().enumerate() {
                let id = RouteId::new(first.value() + i as u32);
                if !manager.route_set(id, captured.geometry.clone(), captured.options) {
                    return Err(invalid(format!(
                        "route {} has an empty geometry",
                        captured.id
                    )));
                }
                for (n, segment) in captured.segments.iter().enumerate() {
                    manager.set_segment_addressing(
                        segment.addressing.unwrap_or(self.segment_addressing),
                    );
                    if manager
                        .route_segment_create(id, segment.options.clone())
                        .is_none()
                    {
                        return Err(invalid(format!(
                            "segment #{n} of route {} doesn't fit on the route",
                            captured.id
                        )));
                    }
                }
                manager.route_set_progress_percent(id, captured.progress);
                remap.insert(captured.id, id);
            }
        }

        manager.set_segment_addressing(self.segment_addressing);

        if let Some(vanishing) = self.vanishing_route_id {
            let id = remap
                .get(&vanishing)
                .ok_or_else(|| invalid(format!("unknown vanishing route {vanishing}")))?;
            manager.set_vanishing_route_id(*id);
        }
        manager.restore_nav_stops(self.nav_stops.clone());
        Ok(())
    }
}
