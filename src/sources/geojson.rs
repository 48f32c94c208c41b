//! Route geometries from a GeoJSON file.

use crate::geometry::Point;
use ::geojson::{Feature, FeatureCollection, GeoJson, Geometry, LineStringType, Value};
use anyhow::Context;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Reads the routes of the given GeoJSON file.
pub fn read_routes<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Vec<Point<f64>>>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {}", path.display()))?;
    parse_routes(BufReader::new(file))
        .with_context(|| format!("Failed to parse GeoJSON file: {}", path.display()))
}

/// Parses GeoJSON, returning every line string as a route. Other geometries
/// are ignored.
pub fn parse_routes<R: Read>(reader: R) -> anyhow::Result<Vec<Vec<Point<f64>>>> {
    let geojson = GeoJson::from_reader(reader)?;
    let mut routes = Vec::new();
    match &geojson {
        GeoJson::FeatureCollection(collection) => visit_feature_collection(collection, &mut routes),
        GeoJson::Feature(feature) => visit_feature(feature, &mut routes),
        GeoJson::Geometry(geometry) => visit_geometry(geometry, &mut routes),
    }
    Ok(routes)
}

fn to_points(line: &LineStringType) -> Vec<Point<f64>> {
    line.iter()
        .filter(|position| position.len() >= 2)
        .map(|position| Point::new(position[0], position[1]))
        .collect()
}

fn visit_feature_collection(collection: &FeatureCollection, routes: &mut Vec<Vec<Point<f64>>>) {
    for feature in &collection.features {
        visit_feature(feature, routes);
    }
}

fn visit_feature(feature: &Feature, routes: &mut Vec<Vec<Point<f64>>>) {
    if let Some(geometry) = &feature.geometry {
        visit_geometry(geometry, routes);
    }
}

fn visit_geometry(geometry: &Geometry, routes: &mut Vec<Vec<Point<f64>>>) {
    match &geometry.value {
        Value::LineString(line) => routes.push(to_points(line)),
        Value::MultiLineString(lines) => {
            for line in lines {
                routes.push(to_points(line));
            }
        }
        Value::Point(_) | Value::MultiPoint(_) | Value::Polygon(_) | Value::MultiPolygon(_) => (),
        Value::GeometryCollection(collection) => {
            for geometry in collection {
                visit_geometry(geometry, routes);
            }
        }
    }
}
