//! Configuration utilities.

use crate::render::color::{palette, Color};
use crate::render::dots::DotOptions;
use crate::route::{ProjectionMode, RouteOptions};
use anyhow::Context;
use clap::builder;
use clap::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Style of the rendered routes and overlays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteStyle {
    /// Options of the main route.
    pub route: RouteOptions,
    /// Line color of alternative routes.
    pub alternative_color: Color,
    /// Colors of the traffic segments, from light to heavy traffic.
    pub traffic: Vec<Color>,
    /// Colors of the traffic segments on alternative routes.
    pub alternative_traffic: Vec<Color>,
    /// Color of the vanishing line.
    pub blue_line_color: Color,
    /// Width of the vanishing line, in pixels.
    pub blue_line_width: f32,
    /// Style of the dots.
    pub dots: DotOptions,
}

impl Default for RouteStyle {
    fn default() -> Self {
        RouteStyle {
            route: RouteOptions::default(),
            alternative_color: palette::ALTERNATIVE,
            traffic: palette::TRAFFIC.to_vec(),
            alternative_traffic: palette::ALTERNATIVE_TRAFFIC.to_vec(),
            blue_line_color: palette::ROUTE,
            blue_line_width: 4.0,
            dots: DotOptions {
                inner_color: Color::WHITE,
                outer_color: palette::CASING,
                inner_radius: 3.0,
                outer_radius: 5.0,
            },
        }
    }
}

impl RouteStyle {
    /// Returns the options of the main route, in the given coordinate space.
    pub fn route_options(&self, projection: ProjectionMode) -> RouteOptions {
        RouteOptions {
            projection,
            ..self.route
        }
    }

    /// Returns the options of an alternative route, in the given coordinate
    /// space.
    pub fn alternative_options(&self, projection: ProjectionMode) -> RouteOptions {
        RouteOptions {
            inner_color: self.alternative_color,
            projection,
            ..self.route
        }
    }

    /// Reads a route style from the given JSON file.
    fn read_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| {
            format!("Failed to read route style from: {}", path.display())
        })?;
        let reader = BufReader::new(file);
        let style: Self = serde_json::from_reader(reader).with_context(|| {
            format!("Failed to parse route style from: {}", path.display())
        })?;

        Ok(style)
    }
}

/// Helper struct to parse a [`RouteStyle`] directly from a Clap argument.
#[derive(Clone)]
pub struct RouteStyleParser;

impl builder::TypedValueParser for RouteStyleParser {
    type Value = RouteStyle;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        RouteStyle::read_from_file(value).map_err(|e| {
            let arg_str = arg.map(|a| a.to_string());
            let msg = format!(
                "Failed to parse route style{}{}: {:#}\n",
                arg_str.map(|a| format!(" ({})", a)).unwrap_or_default(),
                value
                    .to_str()
                    .map(|f| format!(" from file `{}`", f))
                    .unwrap_or_default(),
                e
            );
            clap::Error::raw(ErrorKind::Io, msg).with_cmd(cmd)
        })
    }
}

impl builder::ValueParserFactory for RouteStyle {
    type Parser = RouteStyleParser;

    fn value_parser() -> Self::Parser {
        RouteStyleParser
    }
}
