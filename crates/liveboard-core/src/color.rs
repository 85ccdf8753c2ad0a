//! Color representation and CSS encoding.

use serde::{Deserialize, Serialize};

/// Serializable fill color (RGB, 8 bits per channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Encode as a CSS hex string, e.g. `#dc2626`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Encode as a CSS functional string, e.g. `rgb(220, 38, 38)`.
    pub fn to_rgb_css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// Parse a `#rgb` or `#rrggbb` hex string.
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.strip_prefix('#')?.trim();
        match hex.len() {
            3 => {
                // #rgb -> #rrggbb
                let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
                Some(Self::new(r, g, b))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::new(r, g, b))
            }
            _ => None,
        }
    }
}

impl From<peniko::Color> for Color {
    fn from(color: peniko::Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
        }
    }
}

impl From<Color> for peniko::Color {
    fn from(color: Color) -> Self {
        peniko::Color::from_rgba8(color.r, color.g, color.b, 255)
    }
}

/// Fixed palette for participant cursors and selection outlines.
pub const CONNECTION_PALETTE: [Color; 5] = [
    Color::new(0xdc, 0x26, 0x26), // red
    Color::new(0xd9, 0x77, 0x06), // amber
    Color::new(0x05, 0x96, 0x69), // emerald
    Color::new(0x7c, 0x3a, 0xed), // violet
    Color::new(0xdb, 0x27, 0x77), // pink
];

/// Map a connection id onto the fixed palette.
///
/// The mapping is deterministic, so every participant sees the same color
/// for a given connection throughout the session.
pub fn connection_id_to_color(connection_id: u32) -> Color {
    CONNECTION_PALETTE[connection_id as usize % CONNECTION_PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let color = Color::new(0xdc, 0x26, 0x26);
        assert_eq!(color.to_hex(), "#dc2626");
        assert_eq!(Color::from_hex("#dc2626"), Some(color));
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(Color::from_hex("#fff"), Some(Color::white()));
        assert_eq!(Color::from_hex("#000"), Some(Color::black()));
    }

    #[test]
    fn test_invalid_hex() {
        assert_eq!(Color::from_hex("dc2626"), None);
        assert_eq!(Color::from_hex("#dc26"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_rgb_css() {
        assert_eq!(Color::new(220, 38, 38).to_rgb_css(), "rgb(220, 38, 38)");
    }

    #[test]
    fn test_peniko_roundtrip() {
        let color = Color::new(10, 20, 30);
        let peniko: peniko::Color = color.into();
        assert_eq!(Color::from(peniko), color);
    }

    #[test]
    fn test_connection_color_deterministic() {
        assert_eq!(connection_id_to_color(3), connection_id_to_color(3));
        // Wraps around the palette
        assert_eq!(connection_id_to_color(0), connection_id_to_color(5));
        assert_ne!(connection_id_to_color(0), connection_id_to_color(1));
    }
}
