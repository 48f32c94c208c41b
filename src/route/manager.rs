//! Owner of all the routes: mutations are applied here, and become visible to
//! the renderer as an immutable [`RouteSnapshot`] when [`RouteManager::finalize`]
//! is called.

use super::capture::{Capture, CaptureError};
use super::geometry::RouteGeometry;
use super::id_pool::IdPool;
use super::segment::{RouteSegmentOptions, SegmentAddressing};
use super::state::{Route, RouteRamps};
use super::{Precision, RouteId, RouteOptions, SegmentId};
use crate::geometry::Point;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Largest route identifier of a default manager.
pub const DEFAULT_MAX_ROUTE_ID: u32 = 100;

/// Reason why a route needs to be finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirtyKind {
    /// Traffic segments changed.
    Segments,
    /// Progress changed.
    Progress,
    /// The route was created or its geometry replaced.
    Geometry,
}

impl DirtyKind {
    fn as_str(self) -> &'static str {
        match self {
            DirtyKind::Segments => "segments",
            DirtyKind::Progress => "progress",
            DirtyKind::Geometry => "geometry",
        }
    }
}

/// Counters about the usage of a [`RouteManager`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteManagerStats {
    /// Number of calls to [`RouteManager::finalize`].
    pub finalize_count: u32,
    /// Number of routes at the last finalization.
    pub route_count: u32,
    /// Number of traffic segments at the last finalization.
    pub segment_count: u32,
    /// Duration of the last finalization, in microseconds.
    pub last_finalize_micros: u128,
    /// Number of calls rejected because of an unknown route.
    pub rejected_calls: u32,
}

impl fmt::Display for RouteManagerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} finalizations ({} µs last), {} routes, {} segments, {} rejected calls",
            self.finalize_count,
            self.last_finalize_micros,
            self.route_count,
            self.segment_count,
            self.rejected_calls
        )
    }
}

/// State of a route, as committed by the last finalization.
#[derive(Clone, Debug)]
pub struct RouteFrame {
    /// Identifier of the route.
    pub id: RouteId,
    /// Creation serial of the route.
    pub serial: u64,
    /// Geometry of the route.
    pub geometry: Arc<RouteGeometry>,
    /// Style of the route.
    pub options: RouteOptions,
    /// Traveled fraction of the route.
    pub progress: f64,
    /// Color ramps to draw the route with.
    pub ramps: Arc<RouteRamps>,
    /// Generation at which the ramps were last rebuilt.
    pub ramp_generation: u64,
    /// Name of the casing layer of this route.
    pub base_layer: String,
    /// Name of the line layer of this route.
    pub active_layer: String,
    /// Name of the source feeding the casing layer.
    pub base_source: String,
    /// Name of the source feeding the line layer.
    pub active_source: String,
}

/// Immutable view of all the routes, published by each finalization.
#[derive(Clone, Debug, Default)]
pub struct RouteSnapshot {
    /// Finalization counter.
    pub generation: u64,
    /// Routes, by increasing identifier.
    pub routes: Vec<RouteFrame>,
    /// Route whose traveled part vanishes.
    pub vanishing: Option<RouteId>,
}

impl RouteSnapshot {
    /// Returns a route of this snapshot.
    pub fn route(&self, id: RouteId) -> Option<&RouteFrame> {
        self.routes
            .binary_search_by_key(&id, |frame| frame.id)
            .ok()
            .map(|i| &self.routes[i])
    }

    /// Returns the index in `candidates` of the route drawn on top of the
    /// others. See [`RouteManager::top_most`].
    pub fn top_most(&self, candidates: &[RouteId]) -> Option<usize> {
        top_most_index(candidates, self.vanishing, |id| {
            self.route(id).map(|frame| frame.serial)
        })
    }
}

/// Picks the vanishing route if it is a candidate, or else the most recently
/// created one.
fn top_most_index(
    candidates: &[RouteId],
    vanishing: Option<RouteId>,
    serial: impl Fn(RouteId) -> Option<u64>,
) -> Option<usize> {
    if let Some(vanishing) = vanishing {
        if let Some(i) = candidates.iter().position(|&id| id == vanishing) {
            if serial(vanishing).is_some() {
                return Some(i);
            }
        }
    }
    candidates
        .iter()
        .enumerate()
        .filter_map(|(i, &id)| serial(id).map(|s| (s, i)))
        .max()
        .map(|(_, i)| i)
}

const CASING_ROUTE_LAYER: &str = "route-casing-layer";
const ACTIVE_ROUTE_LAYER: &str = "route-active-layer";
const CASING_ROUTE_SOURCE: &str = "route-casing-source";
const ACTIVE_ROUTE_SOURCE: &str = "route-active-source";

/// Owner of a set of routes.
pub struct RouteManager {
    pool: IdPool,
    /// Routes indexed by identifier. Pre-created identifiers have no route
    /// yet.
    routes: Vec<Option<Route>>,
    vanishing: Option<RouteId>,
    addressing: SegmentAddressing,
    dirty: BTreeMap<DirtyKind, BTreeSet<RouteId>>,
    next_serial: u64,
    stats: RouteManagerStats,
    snapshot: Arc<RouteSnapshot>,
    capture_nav_stops: bool,
    nav_stops: Vec<f64>,
}

impl Default for RouteManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteManager {
    /// Creates a manager with identifiers up to [`DEFAULT_MAX_ROUTE_ID`].
    pub fn new() -> Self {
        Self::with_max_id(DEFAULT_MAX_ROUTE_ID)
    }

    /// Creates a manager with identifiers up to `max_id`.
    pub fn with_max_id(max_id: u32) -> Self {
        RouteManager {
            pool: IdPool::new(max_id),
            routes: Vec::new(),
            vanishing: None,
            addressing: SegmentAddressing::default(),
            dirty: BTreeMap::new(),
            next_serial: 0,
            stats: RouteManagerStats::default(),
            snapshot: Arc::new(RouteSnapshot::default()),
            capture_nav_stops: false,
            nav_stops: Vec::new(),
        }
    }

    /// Returns the largest identifier this manager can allocate.
    pub fn max_id(&self) -> u32 {
        self.pool.max_id()
    }

    fn mark_dirty(&mut self, id: RouteId, kind: DirtyKind) {
        self.dirty.entry(kind).or_default().insert(id);
    }

    fn reject(&mut self, operation: &str, id: RouteId) {
        warn!("{operation}: invalid route id {id}");
        self.stats.rejected_calls += 1;
    }

    fn route_mut(&mut self, operation: &str, id: RouteId) -> Option<&mut Route> {
        let exists = matches!(self.routes.get(id.index()), Some(Some(_)));
        if !exists {
            self.reject(operation, id);
            return None;
        }
        self.routes.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Returns a route.
    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id.index()).and_then(Option::as_ref)
    }

    fn new_route(&mut self, points: Vec<Point<f64>>, options: RouteOptions) -> Route {
        let serial = self.next_serial;
        self.next_serial += 1;
        Route::new(points, options, serial)
    }

    fn store(&mut self, id: RouteId, route: Route) {
        if self.routes.len() <= id.index() {
            self.routes.resize_with(id.index() + 1, || None);
        }
        self.routes[id.index()] = Some(route);
        self.mark_dirty(id, DirtyKind::Geometry);
    }

    /// Creates a route, returning its identifier.
    ///
    /// Fails if the geometry is empty or all identifiers are in use.
    pub fn route_create(&mut self, points: Vec<Point<f64>>, options: RouteOptions) -> Option<RouteId> {
        if points.is_empty() {
            warn!("route_create: empty geometry");
            return None;
        }
        let Some(id) = self.pool.create_id() else {
            warn!("route_create: no route id left (max {})", self.pool.max_id());
            return None;
        };
        let id = RouteId::new(id);
        let route = self.new_route(points, options);
        debug!("Created route {id} with {} points", route.geometry().len());
        self.store(id, route);
        Some(id)
    }

    /// Reserves `count` consecutive identifiers, to be filled with
    /// [`Self::route_set`]. Returns the first one.
    pub fn route_pre_create(&mut self, count: u32) -> Option<RouteId> {
        let first = self.pool.create_range_id(count)?;
        debug!("Reserved route ids [{first}, {}]", first + (count - 1));
        Some(RouteId::new(first))
    }

    /// Sets the geometry and style of a reserved identifier, replacing any
    /// route it had.
    pub fn route_set(&mut self, id: RouteId, points: Vec<Point<f64>>, options: RouteOptions) -> bool {
        if !id.is_valid() || !self.pool.is_id(id.value()) {
            self.reject("route_set", id);
            return false;
        }
        if points.is_empty() {
            warn!("route_set: empty geometry for route {id}");
            return false;
        }
        let route = self.new_route(points, options);
        self.store(id, route);
        true
    }

    /// Disposes of a route, releasing its identifier.
    pub fn route_dispose(&mut self, id: RouteId) -> bool {
        if !id.is_valid() || !self.pool.destroy_id(id.value()) {
            self.reject("route_dispose", id);
            return false;
        }
        if let Some(slot) = self.routes.get_mut(id.index()) {
            *slot = None;
        }
        for ids in self.dirty.values_mut() {
            ids.remove(&id);
        }
        if self.vanishing == Some(id) {
            self.vanishing = None;
        }
        debug!("Disposed route {id}");
        true
    }

    /// Adds a traffic segment to a route.
    pub fn route_segment_create(
        &mut self,
        id: RouteId,
        options: RouteSegmentOptions,
    ) -> Option<SegmentId> {
        let addressing = self.addressing;
        let segment = self
            .route_mut("route_segment_create", id)?
            .segment_create(options, addressing)?;
        self.mark_dirty(id, DirtyKind::Segments);
        Some(segment)
    }

    /// Replaces a traffic segment of a route.
    pub fn route_segment_update(
        &mut self,
        id: RouteId,
        segment: SegmentId,
        options: RouteSegmentOptions,
    ) -> bool {
        let addressing = self.addressing;
        let Some(route) = self.route_mut("route_segment_update", id) else {
            return false;
        };
        let updated = route.segment_update(segment, options, addressing);
        if updated {
            self.mark_dirty(id, DirtyKind::Segments);
        }
        updated
    }

    /// Removes a traffic segment from a route.
    pub fn route_segment_dispose(&mut self, id: RouteId, segment: SegmentId) -> bool {
        let Some(route) = self.route_mut("route_segment_dispose", id) else {
            return false;
        };
        let removed = route.segment_dispose(segment);
        if removed {
            self.mark_dirty(id, DirtyKind::Segments);
        }
        removed
    }

    /// Removes all traffic segments of a route.
    pub fn route_clear_segments(&mut self, id: RouteId) -> bool {
        let Some(route) = self.route_mut("route_clear_segments", id) else {
            return false;
        };
        route.segments_clear();
        self.mark_dirty(id, DirtyKind::Segments);
        true
    }

    /// Sets the traveled fraction of a route.
    pub fn route_set_progress_percent(&mut self, id: RouteId, percent: f64) -> bool {
        let Some(route) = self.route_mut("route_set_progress_percent", id) else {
            return false;
        };
        route.set_progress(percent);
        let progress = route.progress();
        self.progress_changed(id, progress);
        true
    }

    /// Sets the progress of a route to its point closest to `point`, and
    /// returns the new progress.
    ///
    /// With [`Precision::Coarse`], the progress snaps back to the vertex
    /// starting the closest segment.
    pub fn route_set_progress_point(
        &mut self,
        id: RouteId,
        point: &Point<f64>,
        precision: Precision,
    ) -> Option<f64> {
        let route = self.route_mut("route_set_progress_point", id)?;
        let geometry = route.geometry().clone();
        let nearest = geometry.nearest_point(point)?;
        let percent = match precision {
            Precision::Fine => nearest.percent,
            Precision::Coarse => geometry
                .normalized_position(nearest.segment, 0.0)
                .unwrap_or(nearest.percent),
        };
        route.set_progress(percent);
        self.progress_changed(id, percent);
        Some(percent)
    }

    /// Sets the progress of a route to the given traveled distance, and
    /// returns the new progress.
    pub fn route_set_progress_in_meters(&mut self, id: RouteId, distance: f64) -> Option<f64> {
        let route = self.route_mut("route_set_progress_in_meters", id)?;
        let percent = route.geometry().percent_from_distance(distance);
        route.set_progress(percent);
        self.progress_changed(id, percent);
        Some(percent)
    }

    fn progress_changed(&mut self, id: RouteId, percent: f64) {
        self.mark_dirty(id, DirtyKind::Progress);
        if self.capture_nav_stops && self.vanishing == Some(id) {
            self.nav_stops.push(percent);
        }
    }

    /// Returns the point at the current progress of a route.
    pub fn route_progress_point(&self, id: RouteId) -> Option<Point<f64>> {
        self.route(id).map(Route::progress_point)
    }

    /// Designates the route whose traveled part vanishes, drawn on top of the
    /// others.
    pub fn set_vanishing_route_id(&mut self, id: RouteId) -> bool {
        if self.route(id).is_none() {
            self.reject("set_vanishing_route_id", id);
            return false;
        }
        self.vanishing = Some(id);
        true
    }

    /// Returns the route whose traveled part vanishes.
    pub fn vanishing_route_id(&self) -> Option<RouteId> {
        self.vanishing
    }

    /// Chooses how new traffic segments are addressed: vertex indices and
    /// fractions, or explicit geometry.
    pub fn set_use_route_segment_index_fractions(&mut self, use_fractions: bool) {
        self.addressing = if use_fractions {
            SegmentAddressing::IndexFractions
        } else {
            SegmentAddressing::Geometry
        };
    }

    /// Returns how new traffic segments are addressed.
    pub fn segment_addressing(&self) -> SegmentAddressing {
        self.addressing
    }

    /// Sets how new traffic segments are addressed.
    pub fn set_segment_addressing(&mut self, addressing: SegmentAddressing) {
        self.addressing = addressing;
    }

    /// Returns the identifiers of all the routes, in increasing order.
    pub fn all_routes(&self) -> Vec<RouteId> {
        self.routes
            .iter()
            .enumerate()
            .filter(|(_, route)| route.is_some())
            .map(|(i, _)| RouteId::new(i as u32))
            .collect()
    }

    /// Checks whether any route exists.
    pub fn has_routes(&self) -> bool {
        self.routes.iter().any(Option::is_some)
    }

    /// Returns the polyline of a route.
    pub fn route_geometry(&self, id: RouteId) -> Option<Vec<Point<f64>>> {
        self.route(id).map(|route| route.geometry().points().to_vec())
    }

    /// Returns the point at `percent` of a route, with the bearing of the
    /// route there.
    pub fn get_point(
        &self,
        id: RouteId,
        percent: f64,
        precision: Precision,
    ) -> Option<(Point<f64>, f64)> {
        self.route(id)
            .map(|route| route.geometry().point_and_bearing(percent, precision))
    }

    fn layer_name(&self, id: RouteId, prefix: &str) -> Option<String> {
        self.route(id).map(|_| format!("{prefix}-{id}"))
    }

    /// Returns the name of the casing layer of a route.
    pub fn base_route_layer_name(&self, id: RouteId) -> Option<String> {
        self.layer_name(id, CASING_ROUTE_LAYER)
    }

    /// Returns the name of the line layer of a route.
    pub fn active_route_layer_name(&self, id: RouteId) -> Option<String> {
        self.layer_name(id, ACTIVE_ROUTE_LAYER)
    }

    /// Returns the name of the source feeding the casing layer of a route.
    pub fn base_geojson_source_name(&self, id: RouteId) -> Option<String> {
        self.layer_name(id, CASING_ROUTE_SOURCE)
    }

    /// Returns the name of the source feeding the line layer of a route.
    pub fn active_geojson_source_name(&self, id: RouteId) -> Option<String> {
        self.layer_name(id, ACTIVE_ROUTE_SOURCE)
    }

    /// Returns the index in `candidates` of the route drawn on top of the
    /// others: the vanishing route if it is a candidate, or else the most
    /// recently created route. Unknown routes are ignored.
    pub fn top_most(&self, candidates: &[RouteId]) -> Option<usize> {
        top_most_index(candidates, self.vanishing, |id| {
            self.route(id).map(Route::serial)
        })
    }

    /// Moves the progress of the vanishing route to `percent`, returning the
    /// point reached and the bearing of the route there.
    pub fn capture_scrub_route(&mut self, percent: f64) -> Option<(Point<f64>, f64)> {
        let id = self.vanishing?;
        if !self.route_set_progress_percent(id, percent) {
            return None;
        }
        self.get_point(id, percent, Precision::Fine)
    }

    /// Enables recording the successive progress values of the vanishing
    /// route into captures.
    pub fn set_capture_nav_stops(&mut self, enabled: bool) {
        self.capture_nav_stops = enabled;
        if !enabled {
            self.nav_stops.clear();
        }
    }

    /// Checks whether progress values of the vanishing route are recorded.
    pub fn is_capture_nav_stops_enabled(&self) -> bool {
        self.capture_nav_stops
    }

    /// Returns the recorded progress values of the vanishing route.
    pub fn nav_stops(&self) -> &[f64] {
        &self.nav_stops
    }

    /// Returns usage statistics.
    pub fn stats(&self) -> &RouteManagerStats {
        &self.stats
    }

    /// Returns the snapshot published by the last finalization.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.snapshot.clone()
    }

    /// Commits pending changes: rebuilds the color ramps of the routes that
    /// changed, and publishes a new snapshot.
    pub fn finalize(&mut self) -> Arc<RouteSnapshot> {
        let start = Instant::now();
        let generation = self.snapshot.generation + 1;

        let mut touched = BTreeSet::new();
        for (kind, ids) in std::mem::take(&mut self.dirty) {
            for id in ids {
                debug!("Finalizing route {id}: {}", kind.as_str());
                touched.insert(id);
            }
        }

        let previous = self.snapshot.clone();
        let mut frames = Vec::new();
        let mut segment_count = 0;
        for (index, slot) in self.routes.iter_mut().enumerate() {
            let Some(route) = slot else {
                continue;
            };
            let id = RouteId::new(index as u32);
            segment_count += route.segments().len();

            let reusable = previous
                .route(id)
                .filter(|frame| frame.serial == route.serial() && !touched.contains(&id));
            let (ramps, ramp_generation) = match reusable {
                Some(frame) => (frame.ramps.clone(), frame.ramp_generation),
                None => (Arc::new(route.ramps()), generation),
            };

            frames.push(RouteFrame {
                id,
                serial: route.serial(),
                geometry: route.geometry().clone(),
                options: *route.options(),
                progress: route.progress(),
                ramps,
                ramp_generation,
                base_layer: format!("{CASING_ROUTE_LAYER}-{id}"),
                active_layer: format!("{ACTIVE_ROUTE_LAYER}-{id}"),
                base_source: format!("{CASING_ROUTE_SOURCE}-{id}"),
                active_source: format!("{ACTIVE_ROUTE_SOURCE}-{id}"),
            });
        }

        self.stats.finalize_count += 1;
        self.stats.route_count = frames.len() as u32;
        self.stats.segment_count = segment_count as u32;
        self.stats.last_finalize_micros = start.elapsed().as_micros();

        self.snapshot = Arc::new(RouteSnapshot {
            generation,
            routes: frames,
            vanishing: self.vanishing,
        });
        debug!(
            "Finalized generation {generation}: {} routes rebuilt, {}",
            touched.len(),
            self.stats
        );
        self.snapshot.clone()
    }

    /// Serializes all the routes and their segments into a JSON capture.
    pub fn capture_snapshot(&self) -> Result<String, CaptureError> {
        Capture::from_manager(self).to_json()
    }

    /// Replaces all the routes with the ones of a JSON capture.
    ///
    /// Routes get consecutive identifiers from 0, in the order of their
    /// captured identifiers. The current state is kept if the capture can't
    /// be loaded. Changes become visible after the next finalization.
    pub fn load_capture(&mut self, json: &str) -> Result<(), CaptureError> {
        let capture = Capture::parse(json)?;

        let mut loaded = RouteManager::with_max_id(self.pool.max_id());
        loaded.next_serial = self.next_serial;
        loaded.stats = self.stats.clone();
        loaded.snapshot = self.snapshot.clone();
        loaded.capture_nav_stops = self.capture_nav_stops;
        capture.restore(&mut loaded)?;

        info!(
            "Loaded capture with {} routes",
            loaded.all_routes().len()
        );
        *self = loaded;
        Ok(())
    }

    /// Records nav stops restored from a capture.
    pub(super) fn restore_nav_stops(&mut self, stops: Vec<f64>) {
        self.nav_stops = stops;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::render::color::Color;
    use crate::route::ProjectionMode;

    const RED: Color = Color([1.0, 0.0, 0.0, 1.0]);

    fn square() -> Vec<Point<f64>> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    fn traffic(first: u32, last: u32, priority: u32) -> RouteSegmentOptions {
        RouteSegmentOptions {
            first_index: first,
            last_index: last,
            last_index_fraction: 0.0,
            color: RED,
            priority,
            ..Default::default()
        }
    }

    #[test]
    fn ids_are_smallest_available() {
        let mut manager = RouteManager::new();
        let ids: Vec<_> = (0..5)
            .map(|_| manager.route_create(square(), RouteOptions::default()).unwrap())
            .collect();
        assert_eq!(ids, (0..5).map(RouteId::new).collect::<Vec<_>>());

        assert!(manager.route_dispose(ids[2]));
        assert!(!manager.route_dispose(ids[2]));
        assert_eq!(manager.all_routes().len(), 4);
        assert_eq!(
            manager.route_create(square(), RouteOptions::default()),
            Some(RouteId::new(2))
        );
    }

    #[test]
    fn empty_geometry_is_rejected() {
        let mut manager = RouteManager::new();
        assert_eq!(manager.route_create(vec![], RouteOptions::default()), None);
        assert!(!manager.has_routes());
    }

    #[test]
    fn exhausted_pool() {
        let mut manager = RouteManager::with_max_id(1);
        assert!(manager.route_create(square(), RouteOptions::default()).is_some());
        assert!(manager.route_create(square(), RouteOptions::default()).is_some());
        assert_eq!(manager.route_create(square(), RouteOptions::default()), None);
    }

    #[test]
    fn invalid_ids_are_no_ops() {
        let mut manager = RouteManager::new();
        let unknown = RouteId::new(7);
        assert!(!manager.route_dispose(unknown));
        assert!(!manager.route_dispose(RouteId::INVALID));
        assert!(manager.route_segment_create(unknown, traffic(0, 1, 0)).is_none());
        assert!(!manager.route_clear_segments(unknown));
        assert!(!manager.route_set_progress_percent(unknown, 0.5));
        assert!(manager
            .route_set_progress_point(unknown, &Point::new(0.0, 0.0), Precision::Fine)
            .is_none());
        assert!(!manager.set_vanishing_route_id(unknown));
        assert!(manager.route_geometry(unknown).is_none());
        assert!(manager.get_point(unknown, 0.5, Precision::Fine).is_none());
        assert!(manager.base_route_layer_name(unknown).is_none());
        assert_eq!(manager.stats().rejected_calls, 7);
    }

    #[test]
    fn geometry_and_points() {
        let mut manager = RouteManager::new();
        let id = manager.route_create(square(), RouteOptions::default()).unwrap();
        assert_eq!(manager.route_geometry(id), Some(square()));

        let (point, bearing) = manager.get_point(id, 0.5, Precision::Fine).unwrap();
        assert_eq!(point, Point::new(10.0, 5.0));
        assert!(bearing.abs() < 1e-9);
    }

    #[test]
    fn progress_operations() {
        let mut manager = RouteManager::new();
        let id = manager.route_create(square(), RouteOptions::default()).unwrap();

        assert!(manager.route_set_progress_percent(id, 0.5));
        assert_eq!(manager.route_progress_point(id), Some(Point::new(10.0, 5.0)));

        let percent = manager
            .route_set_progress_point(id, &Point::new(12.0, 2.5), Precision::Fine)
            .unwrap();
        assert!((percent - 12.5 / 30.0).abs() < 1e-12);

        let coarse = manager
            .route_set_progress_point(id, &Point::new(12.0, 2.5), Precision::Coarse)
            .unwrap();
        assert!((coarse - 10.0 / 30.0).abs() < 1e-12);

        let meters = manager.route_set_progress_in_meters(id, 15.0).unwrap();
        assert!((meters - 0.5).abs() < 1e-12);
        assert_eq!(manager.route_set_progress_in_meters(id, 100.0), Some(1.0));
    }

    #[test]
    fn mercator_routes_measure_meters() {
        let mut manager = RouteManager::new();
        let id = manager
            .route_create(
                vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0)],
                RouteOptions {
                    projection: ProjectionMode::Mercator,
                    ..Default::default()
                },
            )
            .unwrap();
        let percent = manager.route_set_progress_in_meters(id, 55_597.5).unwrap();
        assert!((percent - 0.5).abs() < 1e-3);
    }

    #[test]
    fn finalize_publishes_snapshots() {
        let mut manager = RouteManager::new();
        let a = manager.route_create(square(), RouteOptions::default()).unwrap();
        let b = manager.route_create(square(), RouteOptions::default()).unwrap();

        // Nothing is visible before finalizing.
        assert!(manager.snapshot().routes.is_empty());

        let first = manager.finalize();
        assert_eq!(first.generation, 1);
        assert_eq!(first.routes.len(), 2);
        assert_eq!(first.route(a).unwrap().ramp_generation, 1);

        manager.route_segment_create(b, traffic(1, 2, 0)).unwrap();
        // The published snapshot is immutable.
        assert_eq!(first.route(b).unwrap().ramps.inner.len(), 2);

        let second = manager.finalize();
        assert_eq!(second.generation, 2);
        // Only the route that changed gets new ramps.
        assert_eq!(second.route(a).unwrap().ramp_generation, 1);
        assert!(Arc::ptr_eq(
            &first.route(a).unwrap().ramps,
            &second.route(a).unwrap().ramps
        ));
        assert_eq!(second.route(b).unwrap().ramp_generation, 2);
        assert_eq!(second.route(b).unwrap().ramps.inner.color_at(0.5), RED);

        let stats = manager.stats();
        assert_eq!(stats.finalize_count, 2);
        assert_eq!(stats.route_count, 2);
        assert_eq!(stats.segment_count, 1);
    }

    #[test]
    fn reused_id_gets_fresh_frame() {
        let mut manager = RouteManager::new();
        let a = manager.route_create(square(), RouteOptions::default()).unwrap();
        let before = manager.finalize();
        manager.route_dispose(a);
        let again = manager.route_create(square(), RouteOptions::default()).unwrap();
        assert_eq!(a, again);
        let after = manager.finalize();
        assert_ne!(
            before.route(a).unwrap().serial,
            after.route(again).unwrap().serial
        );
        assert_eq!(after.route(again).unwrap().ramp_generation, 2);
    }

    #[test]
    fn traffic_priorities_through_manager() {
        let mut manager = RouteManager::new();
        let id = manager.route_create(square(), RouteOptions::default()).unwrap();
        let green = Color([0.0, 1.0, 0.0, 1.0]);
        manager.route_segment_create(id, traffic(0, 2, 0)).unwrap();
        manager
            .route_segment_create(
                id,
                RouteSegmentOptions {
                    color: green,
                    ..traffic(1, 3, 1)
                },
            )
            .unwrap();
        let snapshot = manager.finalize();
        let ramps = &snapshot.route(id).unwrap().ramps;
        assert_eq!(ramps.inner.color_at(1.0 / 6.0), RED);
        assert_eq!(ramps.inner.color_at(0.5), green);
        assert_eq!(ramps.inner.color_at(5.0 / 6.0), green);

        assert!(manager.route_clear_segments(id));
        let cleared = manager.finalize();
        assert_eq!(
            cleared.route(id).unwrap().ramps.inner,
            crate::route::color_ramp::ColorRamp::flat(RouteOptions::default().inner_color)
        );
    }

    #[test]
    fn segment_update_and_dispose() {
        let mut manager = RouteManager::new();
        let id = manager.route_create(square(), RouteOptions::default()).unwrap();
        let segment = manager.route_segment_create(id, traffic(0, 1, 0)).unwrap();
        assert!(manager.route_segment_update(id, segment, traffic(2, 3, 0)));
        assert!(!manager.route_segment_update(id, SegmentId(42), traffic(2, 3, 0)));
        let snapshot = manager.finalize();
        assert_eq!(snapshot.route(id).unwrap().ramps.inner.color_at(0.9), RED);

        assert!(manager.route_segment_dispose(id, segment));
        assert!(!manager.route_segment_dispose(id, segment));
        assert_eq!(manager.route(id).unwrap().segments().len(), 0);
    }

    #[test]
    fn geometry_addressing_mode() {
        let mut manager = RouteManager::new();
        manager.set_use_route_segment_index_fractions(false);
        assert_eq!(manager.segment_addressing(), SegmentAddressing::Geometry);
        let id = manager.route_create(square(), RouteOptions::default()).unwrap();
        // Index fractions are ignored in this mode.
        assert!(manager.route_segment_create(id, traffic(0, 1, 0)).is_none());

        let segment = RouteSegmentOptions {
            geometry: Some(vec![Point::new(10.0, 0.0), Point::new(10.0, 10.0)]),
            color: RED,
            ..Default::default()
        };
        let segment = manager.route_segment_create(id, segment).unwrap();
        let range = manager
            .route(id)
            .unwrap()
            .segments()
            .get(segment)
            .unwrap()
            .range();
        assert!((range.start - 1.0 / 3.0).abs() < 1e-12);
        assert!((range.end - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn top_most_prefers_vanishing_then_newest() {
        let mut manager = RouteManager::new();
        let a = manager.route_create(square(), RouteOptions::default()).unwrap();
        let b = manager.route_create(square(), RouteOptions::default()).unwrap();
        let c = manager.route_create(square(), RouteOptions::default()).unwrap();

        assert_eq!(manager.top_most(&[a, b, c]), Some(2));
        assert_eq!(manager.top_most(&[c, a]), Some(0));
        assert_eq!(manager.top_most(&[]), None);
        assert_eq!(manager.top_most(&[RouteId::new(50)]), None);

        assert!(manager.set_vanishing_route_id(a));
        assert_eq!(manager.top_most(&[b, c, a]), Some(2));
        assert_eq!(manager.top_most(&[b, c]), Some(1));

        let snapshot = manager.finalize();
        assert_eq!(snapshot.top_most(&[b, c, a]), Some(2));

        manager.route_dispose(a);
        assert_eq!(manager.vanishing_route_id(), None);
    }

    #[test]
    fn layer_names() {
        let mut manager = RouteManager::new();
        let id = manager.route_create(square(), RouteOptions::default()).unwrap();
        let base = manager.base_route_layer_name(id).unwrap();
        let active = manager.active_route_layer_name(id).unwrap();
        let base_source = manager.base_geojson_source_name(id).unwrap();
        assert_ne!(base, active);
        assert_ne!(base, base_source);
        assert!(manager.active_geojson_source_name(id).is_some());

        let snapshot = manager.finalize();
        let frame = snapshot.route(id).unwrap();
        assert_eq!(frame.base_layer, base);
        assert_eq!(frame.base_source, base_source);
    }

    #[test]
    fn pre_create_and_set() {
        let mut manager = RouteManager::new();
        let first = manager.route_pre_create(3).unwrap();
        assert_eq!(first, RouteId::new(0));
        // Reserved but not set yet.
        assert!(manager.all_routes().is_empty());
        assert_eq!(
            manager.route_create(square(), RouteOptions::default()),
            Some(RouteId::new(3))
        );

        assert!(manager.route_set(RouteId::new(1), square(), RouteOptions::default()));
        assert!(!manager.route_set(RouteId::new(10), square(), RouteOptions::default()));
        assert_eq!(manager.all_routes(), vec![RouteId::new(1), RouteId::new(3)]);
        assert!(manager.route_dispose(RouteId::new(0)));
    }

    #[test]
    fn scrub_and_nav_stops() {
        let mut manager = RouteManager::new();
        let id = manager.route_create(square(), RouteOptions::default()).unwrap();
        assert_eq!(manager.capture_scrub_route(0.5), None);

        manager.set_vanishing_route_id(id);
        manager.set_capture_nav_stops(true);
        assert!(manager.is_capture_nav_stops_enabled());
        let (point, _) = manager.capture_scrub_route(0.5).unwrap();
        assert_eq!(point, Point::new(10.0, 5.0));
        manager.route_set_progress_percent(id, 0.75);
        assert_eq!(manager.nav_stops(), &[0.5, 0.75]);

        manager.set_capture_nav_stops(false);
        assert!(manager.nav_stops().is_empty());
    }
}
