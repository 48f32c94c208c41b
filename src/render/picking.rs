//! Pick-testing: finding the route under a screen position.

use super::transform::Transform;
use crate::geometry::{project_onto_segment, Point};
use crate::route::manager::RouteSnapshot;
use crate::route::RouteId;
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Default half-size of the sampled square around a picked position, in
/// pixels.
pub const PICK_RADIUS: i32 = 5;

/// Rendered feature found at a screen position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickHit {
    /// Name of the style layer that drew the feature.
    pub source_layer: String,
    /// Name of the GeoJSON source of the feature.
    pub source: String,
}

/// Query surface of rendered features.
pub trait FeatureQuery {
    /// Returns the features rendered at the given screen position.
    fn query_features(&self, screen: Point<f64>) -> Vec<PickHit>;
}

/// Route drawn on screen, as seen by the feature query.
struct ScreenRoute {
    line: Vec<Point<f64>>,
    min: Point<f64>,
    max: Point<f64>,
    inner_half_width: f64,
    outer_half_width: f64,
    base: PickHit,
    active: PickHit,
}

impl ScreenRoute {
    /// Returns the screen distance between the given position and the line.
    fn distance(&self, screen: &Point<f64>) -> f64 {
        if self.line.len() == 1 {
            let p = &self.line[0];
            return ((p.x - screen.x).powi(2) + (p.y - screen.y).powi(2)).sqrt();
        }
        self.line
            .windows(2)
            .map(|w| project_onto_segment(&w[0], &w[1], screen, 0.0).distance_sq)
            .fold(f64::INFINITY, f64::min)
            .sqrt()
    }
}

/// Feature query over the routes of a snapshot, as the route layer draws
/// them: a route is hit within half of its line width.
///
/// The casing is reported under the base layer and source names, and the line
/// under the active ones.
pub struct SnapshotFeatureQuery {
    routes: Vec<ScreenRoute>,
}

impl SnapshotFeatureQuery {
    /// Projects the routes of a snapshot on screen.
    pub fn new(snapshot: &RouteSnapshot, transform: &Transform) -> Self {
        let routes = snapshot
            .routes
            .iter()
            .filter(|frame| !frame.geometry.is_empty())
            .map(|frame| {
                let line: Vec<Point<f64>> = frame
                    .geometry
                    .points()
                    .iter()
                    .map(|p| {
                        transform.world_to_screen(&Transform::project_point(
                            frame.options.projection,
                            p,
                        ))
                    })
                    .collect();
                let outer_half_width = frame.options.outer_width / 2.0;
                let mut min = Point::new(f64::INFINITY, f64::INFINITY);
                let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
                for p in &line {
                    min = Point::new(min.x.min(p.x), min.y.min(p.y));
                    max = Point::new(max.x.max(p.x), max.y.max(p.y));
                }
                ScreenRoute {
                    line,
                    min: Point::new(min.x - outer_half_width, min.y - outer_half_width),
                    max: Point::new(max.x + outer_half_width, max.y + outer_half_width),
                    inner_half_width: frame.options.inner_width / 2.0,
                    outer_half_width,
                    base: PickHit {
                        source_layer: frame.base_layer.clone(),
                        source: frame.base_source.clone(),
                    },
                    active: PickHit {
                        source_layer: frame.active_layer.clone(),
                        source: frame.active_source.clone(),
                    },
                }
            })
            .collect();
        SnapshotFeatureQuery { routes }
    }
}

impl FeatureQuery for SnapshotFeatureQuery {
    fn query_features(&self, screen: Point<f64>) -> Vec<PickHit> {
        let mut hits = Vec::new();
        for route in &self.routes {
            if screen.x < route.min.x
                || screen.y < route.min.y
                || screen.x > route.max.x
                || screen.y > route.max.y
            {
                continue;
            }
            let distance = route.distance(&screen);
            if distance <= route.outer_half_width {
                hits.push(route.base.clone());
            }
            if distance <= route.inner_half_width {
                hits.push(route.active.clone());
            }
        }
        hits
    }
}

/// Returns the route under a screen position.
///
/// Features are queried on a `2 * radius` wide square of screen positions
/// around the given one, and correlated to routes by their base layer or
/// source name, as the casing is wider than the line. The routes hit by most
/// samples win, and ties are broken by [`RouteSnapshot::top_most`].
pub fn pick_route(
    snapshot: &RouteSnapshot,
    query: &impl FeatureQuery,
    screen: Point<f64>,
    radius: i32,
) -> Option<RouteId> {
    let mut base_layers: HashMap<&str, RouteId> = HashMap::new();
    let mut base_sources: HashMap<&str, RouteId> = HashMap::new();
    for frame in &snapshot.routes {
        if !frame.base_layer.is_empty() {
            base_layers.insert(&frame.base_layer, frame.id);
        }
        if !frame.base_source.is_empty() {
            base_sources.insert(&frame.base_source, frame.id);
        }
    }

    let mut coverage: BTreeMap<RouteId, u32> = BTreeMap::new();
    for i in -radius..radius {
        for j in -radius..radius {
            let sample = Point::new(screen.x + i as f64, screen.y + j as f64);
            for hit in query.query_features(sample) {
                if let Some(&id) = base_layers.get(hit.source_layer.as_str()) {
                    *coverage.entry(id).or_default() += 1;
                }
                if let Some(&id) = base_sources.get(hit.source.as_str()) {
                    *coverage.entry(id).or_default() += 1;
                }
            }
        }
    }

    let max_weight = coverage.values().copied().max()?;
    let candidates: Vec<RouteId> = coverage
        .iter()
        .filter(|(_, &weight)| weight == max_weight)
        .map(|(&id, _)| id)
        .collect();
    let picked = snapshot
        .top_most(&candidates)
        .and_then(|i| candidates.get(i).copied());
    debug!(
        "Picked {:?} at ({}, {}) among {:?}, weight {}",
        picked, screen.x, screen.y, candidates, max_weight
    );
    picked
}
