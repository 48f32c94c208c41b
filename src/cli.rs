//! Command-line interface.

use clap::{Parser, Subcommand};
use routeline::config::RouteStyle;

/// Replay a navigation along a route, rendering it headlessly.
#[derive(Parser, Debug)]
#[command(name = "Routeline")]
#[command(version)]
#[command(author)]
#[command(about = "Replay a navigation along a route", long_about = None)]
pub struct Cli {
    /// Sub-command to load routes.
    #[command(subcommand)]
    pub route_params: RouteParams,

    /// JSON file containing the route style.
    #[arg(long = "style", value_parser = clap::value_parser!(RouteStyle))]
    pub style: Option<RouteStyle>,

    /// Width of the rendered view, in pixels.
    #[arg(long, default_value_t = 800, value_parser = clap::value_parser!(u32).range(1..=16384))]
    pub width: u32,

    /// Height of the rendered view, in pixels.
    #[arg(long, default_value_t = 600, value_parser = clap::value_parser!(u32).range(1..=16384))]
    pub height: u32,

    /// Number of navigation ticks from the start to the end of the route.
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=1_000_000))]
    pub ticks: u32,

    /// Period of the navigation ticks, in milliseconds.
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u64).range(1..=60_000))]
    pub tick_millis: u64,

    /// Number of random traffic zones on the main route.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(0..=1000))]
    pub traffic_zones: u32,

    /// File to write a capture of the routes to, at the end of the replay.
    #[arg(long)]
    pub capture_output: Option<String>,

    /// Maximum number of files to load in parallel.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub parallel_loads: u32,
}

/// Parameters to load routes.
#[derive(Subcommand, Debug)]
pub enum RouteParams {
    /// Generate circular routes, in planar coordinates.
    Circle(CircleParams),

    /// Read routes from GeoJSON file(s).
    Geojson(FileParams),

    /// Read routes from GPX file(s).
    Gpx(FileParams),

    /// Read routes from text file(s) of encoded polylines.
    Polyline(FileParams),

    /// Replay the routes of a capture.
    Capture(CaptureParams),
}

/// Parameters to generate circular routes.
#[derive(Parser, Debug)]
pub struct CircleParams {
    /// Radius of the circles.
    #[arg(long, default_value_t = 50.0)]
    pub radius: f64,

    /// Number of points of each circle.
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(2..=1_000_000))]
    pub resolution: u32,

    /// Number of alternative routes, next to the main one.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(0..=50))]
    pub alternatives: u32,
}

/// Parameters to read route files. The first route is the main one, the other
/// ones are alternatives.
#[derive(Parser, Debug)]
pub struct FileParams {
    /// File(s) to read.
    #[arg(long = "file", short = 'f', required = true, value_delimiter = ',')]
    pub files: Vec<String>,
}

/// Parameters to replay a capture. The vanishing route of the capture is the
/// main one.
#[derive(Parser, Debug)]
pub struct CaptureParams {
    /// Capture file to read.
    #[arg(long = "file", short = 'f')]
    pub file: String,
}
