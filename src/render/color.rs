//! RGBA colors, as consumed by the route shaders and written in style and
//! capture files.

use rand::distr::Open01;
use rand::{rng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA color, with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [f32; 4]);

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color([0.0, 0.0, 0.0, 0.0]);
    /// Opaque white.
    pub const WHITE: Color = Color([1.0, 1.0, 1.0, 1.0]);
    /// Opaque black.
    pub const BLACK: Color = Color([0.0, 0.0, 0.0, 1.0]);

    /// Creates an opaque color from its components.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Color([r, g, b, 1.0])
    }

    /// Creates a color from 8-bit components.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color([
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        ])
    }

    /// Parses a `RRGGBB` or `RRGGBBAA` hexadecimal color, with an optional
    /// leading `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }
        let component = |i: usize| u8::from_str_radix(hex.get(2 * i..2 * i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::from_rgba8(component(0)?, component(1)?, component(2)?, 255)),
            8 => Some(Self::from_rgba8(
                component(0)?,
                component(1)?,
                component(2)?,
                component(3)?,
            )),
            _ => None,
        }
    }

    /// Creates a new random opaque color.
    pub fn new_random() -> Self {
        let mut rng = rng();
        let r = rng.sample(Open01);
        let g = rng.sample(Open01);
        let b = rng.sample(Open01);
        Self([r, g, b, 1.0])
    }

    /// Returns the 8-bit components of this color.
    pub fn to_rgba8(self) -> [u8; 4] {
        self.0.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    /// Linear interpolation between `self` (at `t = 0`) and `other` (at `t =
    /// 1`).
    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        let t = t as f32;
        let mut result = [0.0; 4];
        for (i, c) in result.iter_mut().enumerate() {
            *c = self.0[i] + (other.0[i] - self.0[i]) * t;
        }
        Color(result)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            write!(f, "#{r:02X}{g:02X}{b:02X}")
        } else {
            write!(f, "#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color: {value:?}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Colors of the navigation route style: base line, casing and traffic
/// levels.
pub mod palette {
    use super::Color;

    /// Active route line.
    pub const ROUTE: Color = Color([47.0 / 255.0, 112.0 / 255.0, 169.0 / 255.0, 1.0]);
    /// Active route casing.
    pub const ROUTE_CASING: Color = Color::WHITE;
    /// Alternative route line.
    pub const ALTERNATIVE: Color = Color([122.0 / 255.0, 122.0 / 255.0, 122.0 / 255.0, 1.0]);
    /// Default casing of the demo routes.
    pub const CASING: Color = Color([0.2, 0.2, 0.2, 1.0]);

    /// Traffic levels of the active route, from low to severe.
    pub const TRAFFIC: [Color; 4] = [
        Color([255.0 / 255.0, 188.0 / 255.0, 45.0 / 255.0, 1.0]),
        Color([237.0 / 255.0, 109.0 / 255.0, 74.0 / 255.0, 1.0]),
        Color([219.0 / 255.0, 0.0, 0.0, 1.0]),
        Color([155.0 / 255.0, 0.0, 0.0, 1.0]),
    ];

    /// Traffic levels of alternative routes, from low to severe.
    pub const ALTERNATIVE_TRAFFIC: [Color; 4] = [
        Color([255.0 / 255.0, 229.0 / 255.0, 173.0 / 255.0, 1.0]),
        Color([243.0 / 255.0, 159.0 / 255.0, 126.0 / 255.0, 1.0]),
        Color([238.0 / 255.0, 118.0 / 255.0, 118.0 / 255.0, 1.0]),
        Color([230.0 / 255.0, 71.0 / 255.0, 71.0 / 255.0, 1.0]),
    ];
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_hex() {
        assert_eq!(Color::from_hex("#FFFFFF"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("000000ff"), Some(Color::BLACK));
        assert_eq!(Color::from_hex("2F70A9"), Some(palette::ROUTE));
        assert_eq!(Color::from_hex("#00000000"), Some(Color::TRANSPARENT));
    }

    #[test]
    fn parse_hex_invalid() {
        assert_eq!(Color::from_hex(""), None);
        assert_eq!(Color::from_hex("#FFF"), None);
        assert_eq!(Color::from_hex("GGGGGG"), None);
        assert_eq!(Color::from_hex("#é0000"), None);
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(palette::ROUTE.to_string(), "#2F70A9");
        assert_eq!(Color::TRANSPARENT.to_string(), "#00000000");
        let c = Color::from_rgba8(1, 2, 3, 4);
        assert_eq!(Color::from_hex(&c.to_string()), Some(c));
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&palette::TRAFFIC[0]).unwrap();
        assert_eq!(json, "\"#FFBC2D\"");
        let c: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(c, palette::TRAFFIC[0]);
        assert!(serde_json::from_str::<Color>("\"red\"").is_err());
    }

    #[test]
    fn interpolate() {
        let mid = Color::BLACK.lerp(&Color::WHITE, 0.5);
        assert_eq!(mid, Color([0.5, 0.5, 0.5, 1.0]));
        assert_eq!(Color::BLACK.lerp(&Color::WHITE, 0.0), Color::BLACK);
    }

    #[test]
    fn random_is_opaque() {
        let c = Color::new_random();
        assert_eq!(c.0[3], 1.0);
        assert!(c.0[..3].iter().all(|&x| x > 0.0 && x < 1.0));
    }
}
