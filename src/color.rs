//! RGBA colors for series and tags.
//!
//! Tags persist their color as an `R;G;B;A` text column; series get theirs
//! from the rainbow palette whenever auto-coloring is enabled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Default serie color before any palette assignment.
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);

    /// Encode as the `R;G;B;A` form used by the `signal_tags.color` column.
    pub fn to_rgba_string(self) -> String {
        format!("{};{};{};{}", self.r, self.g, self.b, self.a)
    }

    /// Parse the `R;G;B;A` form. Malformed input falls back to white so a
    /// hand-edited project file cannot fail the load.
    pub fn from_rgba_string(s: &str) -> Color {
        let mut parts = s.split(';').map(|p| p.trim().parse::<u8>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(r)), Some(Ok(g)), Some(Ok(b)), Some(Ok(a))) => Color::rgba(r, g, b, a),
            _ => {
                log::warn!("Malformed tag color '{}', using white", s);
                Color::WHITE
            }
        }
    }

    /// Build a color from HSV components (h in degrees, s/v in [0,1]).
    pub fn from_hsv(h: f32, s: f32, v: f32) -> Color {
        let h = h.rem_euclid(360.0);
        let c = v * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = v - c;
        let (r, g, b) = match h as u32 {
            0..=59 => (c, x, 0.0),
            60..=119 => (x, c, 0.0),
            120..=179 => (0.0, c, x),
            180..=239 => (0.0, x, c),
            240..=299 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Color::rgba(
            ((r + m) * 255.0).round() as u8,
            ((g + m) * 255.0).round() as u8,
            ((b + m) * 255.0).round() as u8,
            255,
        )
    }
}

/// Rainbow palette entry for the `index`-th of `count` visible series.
///
/// Hue stops short of a full circle so the last serie does not wrap back to
/// the first one's red.
pub fn rainbow(index: usize, count: usize, saturation: f32, value: f32) -> Color {
    let count = count.max(1);
    let hue = 330.0 * (index % count) as f32 / count as f32;
    Color::from_hsv(hue, saturation, value)
}
