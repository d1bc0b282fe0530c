//! Colours and background gradient
//!
//! Colours serialize as `RRGGBBAA` hex strings. Interpolation is a pure
//! function of fixed endpoints and a progress fraction.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Linear RGBA colour
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `RRGGBB` or `RRGGBBAA`, with or without a leading `#`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| -> Option<f32> {
            let byte = u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()?;
            Some(byte as f32 / 255.0)
        };
        let a = if hex.len() == 8 { channel(6)? } else { 1.0 };
        Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_hex(&self) -> String {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "{:02x}{:02x}{:02x}{:02x}",
            byte(self.r),
            byte(self.g),
            byte(self.b),
            byte(self.a)
        )
    }

    pub fn lerp(from: Color, to: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color::rgba(
            crate::lerp(from.r, to.r, t),
            crate::lerp(from.g, to.g, t),
            crate::lerp(from.b, to.b, t),
            crate::lerp(from.a, to.a, t),
        )
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid colour `{value}`"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Two-stop vertical background gradient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub start: Color,
    pub end: Color,
}

impl Default for Gradient {
    fn default() -> Self {
        Self {
            start: Color::rgba(0.0, 0.0, 0.0, 1.0),
            end: Color::rgba(0.5, 0.5, 0.5, 1.0),
        }
    }
}

impl Gradient {
    pub fn new(start: Color, end: Color) -> Self {
        Self { start, end }
    }

    pub fn lerp(from: Gradient, to: Gradient, t: f32) -> Gradient {
        Gradient {
            start: Color::lerp(from.start, to.start, t),
            end: Color::lerp(from.end, to.end, t),
        }
    }
}
