//! Route geometries from a GPX file.

use crate::geometry::Point;
use anyhow::Context;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Schema for a GPX file.
#[derive(Deserialize)]
struct Gpx {
    #[serde(default)]
    trk: Vec<GpxTrack>,
    #[serde(default)]
    rte: Vec<GpxRoute>,
}

/// Schema for a track in a GPX file.
#[derive(Deserialize)]
struct GpxTrack {
    #[serde(default)]
    trkseg: Vec<GpxTrackSegment>,
}

/// Schema for a segment within a GPX track.
#[derive(Deserialize)]
struct GpxTrackSegment {
    #[serde(default)]
    trkpt: Vec<GpxPoint>,
}

/// Schema for a planned route in a GPX file.
#[derive(Deserialize)]
struct GpxRoute {
    #[serde(default)]
    rtept: Vec<GpxPoint>,
}

/// Schema for a track or route point.
#[derive(Deserialize)]
struct GpxPoint {
    #[serde(rename = "@lat")]
    lat: f64,
    #[serde(rename = "@lon")]
    lon: f64,
}

impl GpxPoint {
    fn to_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl From<Gpx> for Vec<Vec<Point<f64>>> {
    fn from(gpx: Gpx) -> Self {
        let tracks = gpx.trk.iter().map(|track| {
            track
                .trkseg
                .iter()
                .flat_map(|segment| segment.trkpt.iter().map(GpxPoint::to_point))
                .collect()
        });
        let routes = gpx
            .rte
            .iter()
            .map(|route| route.rtept.iter().map(GpxPoint::to_point).collect());
        tracks
            .chain(routes)
            .filter(|points: &Vec<Point<f64>>| !points.is_empty())
            .collect()
    }
}

/// Reads the routes of the given GPX file.
pub fn read_routes<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Vec<Point<f64>>>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open GPX file: {}", path.display()))?;
    parse_routes(BufReader::new(file))
        .with_context(|| format!("Failed to parse GPX file: {}", path.display()))
}

/// Parses GPX, returning each track (with its segments joined) and each route
/// as a route.
pub fn parse_routes<R: Read>(reader: R) -> anyhow::Result<Vec<Vec<Point<f64>>>> {
    let gpx: Gpx = serde_xml_rs::from_reader(reader)?;
    Ok(gpx.into())
}
