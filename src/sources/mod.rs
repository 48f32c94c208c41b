//! Route geometries imported from files, or generated.
//!
//! Files are parsed in blocking background tasks, up to a given number in
//! parallel. Imported geometries are (longitude, latitude) points, meant for
//! routes in [`ProjectionMode::Mercator`](crate::route::ProjectionMode).

pub mod geojson;
pub mod gpx;

use crate::geometry::polyline::EncodedPolyline;
use crate::geometry::Point;
use crate::render::color::Color;
use crate::route::segment::RouteSegmentOptions;
use anyhow::Context;
use futures::{stream, StreamExt};
use log::{debug, error, trace};
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tokio::task;

/// Format of a route file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// GeoJSON file: every line string is a route.
    GeoJson,
    /// GPX file: every track is a route.
    Gpx,
    /// Text file with one encoded polyline per line.
    Polyline,
}

impl FileFormat {
    fn name(self) -> &'static str {
        match self {
            FileFormat::GeoJson => "GeoJSON",
            FileFormat::Gpx => "GPX",
            FileFormat::Polyline => "polyline",
        }
    }
}

/// Route geometry read from a file.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedRoute {
    /// Index of the file the route was read from.
    pub file: usize,
    /// (longitude, latitude) points of the route.
    pub points: Vec<Point<f64>>,
}

/// Returns a circle of `resolution` points around `(xlate, 0)`, starting and
/// ending due north of the center and going clockwise.
pub fn circle(radius: f64, resolution: usize, xlate: f64) -> Vec<Point<f64>> {
    let steps = resolution.saturating_sub(1).max(1) as f64;
    (0..resolution)
        .map(|i| {
            let angle = i as f64 / steps * std::f64::consts::TAU;
            Point::new(xlate + radius * angle.sin(), radius * angle.cos())
        })
        .collect()
}

/// Generates random traffic segments over a route of `point_count` points.
///
/// Each zone gets one of the `colors`, and a priority equal to the index of
/// its color, so that heavier traffic is drawn over lighter traffic.
pub fn synthetic_traffic<R: Rng + ?Sized>(
    rng: &mut R,
    point_count: usize,
    zones: usize,
    colors: &[Color],
    outer_color: Color,
) -> Vec<RouteSegmentOptions> {
    if point_count < 2 || colors.is_empty() {
        return Vec::new();
    }
    (0..zones)
        .map(|_| {
            let first_index = rng.random_range(0..point_count - 1);
            let last_index = rng.random_range(first_index..point_count - 1);
            let first_index_fraction: f64 = rng.random();
            let last_index_fraction = if last_index == first_index {
                rng.random_range(first_index_fraction..=1.0)
            } else {
                rng.random()
            };
            let level = rng.random_range(0..colors.len());
            RouteSegmentOptions {
                first_index: first_index as u32,
                first_index_fraction,
                last_index: last_index as u32,
                last_index_fraction,
                color: colors[level],
                outer_color,
                priority: level as u32,
                geometry: None,
            }
        })
        .collect()
}

/// Reads a text file of encoded polylines, one per line. Blank lines are
/// skipped.
fn read_polylines<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Vec<Point<f64>>>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open polyline file: {}", path.display()))?;
    parse_polylines(BufReader::new(file))
        .with_context(|| format!("Failed to parse polyline file: {}", path.display()))
}

/// Parses encoded polylines, one per line.
pub fn parse_polylines<R: BufRead>(reader: R) -> anyhow::Result<Vec<Vec<Point<f64>>>> {
    let mut routes = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let polyline = EncodedPolyline::new(line)
            .with_context(|| format!("Invalid encoded polyline on line {}", i + 1))?;
        routes.push(polyline.lon_lat_points());
    }
    Ok(routes)
}

/// Reads the routes of the given files, parsing up to `parallel_loads` of them
/// in parallel.
///
/// Files that fail to load are logged and skipped. Routes are returned in file
/// order.
pub async fn load_routes_parallel(
    files: &[String],
    format: FileFormat,
    parallel_loads: usize,
) -> Vec<LoadedRoute> {
    let results = stream::iter(files)
        .enumerate()
        .map(|(i, path)| async move { load_routes(path.clone(), format, i).await.map(|r| (i, r)) })
        .buffer_unordered(parallel_loads.max(1));

    let mut routes: Vec<LoadedRoute> = results
        .filter_map(|result| async {
            match result {
                Ok((i, routes)) => {
                    debug!("{} file {i} has {} routes", format.name(), routes.len());
                    Some(
                        routes
                            .into_iter()
                            .map(|points| LoadedRoute { file: i, points })
                            .collect::<Vec<_>>(),
                    )
                }
                Err(e) => {
                    error!("Got an error: {e:#}");
                    None
                }
            }
        })
        .concat()
        .await;

    // Stable sort, keeping the order of routes within a file.
    routes.sort_by_key(|route| route.file);
    for route in &routes {
        trace!("Route of file {} has {} points", route.file, route.points.len());
    }
    routes
}

/// Reads and parses the routes contained in the given file.
async fn load_routes(
    path: String,
    format: FileFormat,
    i: usize,
) -> anyhow::Result<Vec<Vec<Point<f64>>>> {
    debug!("Load routes {i}");
    let path2 = path.clone();
    task::spawn_blocking(move || match format {
        FileFormat::GeoJson => geojson::read_routes(path),
        FileFormat::Gpx => gpx::read_routes(path),
        FileFormat::Polyline => read_polylines(path),
    })
    .await
    .with_context(|| {
        format!(
            "Failed to join background task to load {} routes: {path2}",
            format.name()
        )
    })?
}
