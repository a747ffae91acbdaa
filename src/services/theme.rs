//! Theme service for loading wallust colors.

use anyhow::Result;
use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// The subset of a wallust palette the UI draws with.
#[derive(Debug, Clone, Deserialize)]
struct WallustColors {
    foreground: String,
    color1: String,
    color2: String,
    color6: String,
    color7: String,
    color8: String,
}

/// UI colors, named by role.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Regular text
    pub foreground: Color,
    /// Secondary text and unfocused borders
    pub muted: Color,
    /// Focused borders and titles
    pub accent: Color,
    /// Preview body text
    pub preview: Color,
    /// Destructive prompts and errors
    pub danger: Color,
    /// Confirmation of a completed action
    pub success: Color,
}

impl Theme {
    /// Load theme from wallust colors file, falling back to defaults.
    pub fn load() -> Self {
        let path = Self::colors_path();
        if path.exists() {
            Self::from_file(&path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    fn colors_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("wallust")
            .join("colors-original.json")
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let colors: WallustColors = serde_json::from_str(&content)?;
        Ok(Self::from_wallust(&colors))
    }

    fn from_wallust(colors: &WallustColors) -> Self {
        Self {
            foreground: parse_hex(&colors.foreground),
            muted: parse_hex(&colors.color8),
            accent: parse_hex(&colors.color6),
            preview: parse_hex(&colors.color7),
            danger: parse_hex(&colors.color1),
            success: parse_hex(&colors.color2),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            foreground: Color::White,
            muted: Color::DarkGray,
            accent: Color::Cyan,
            preview: Color::Gray,
            danger: Color::Red,
            success: Color::Green,
        }
    }
}

/// Parse a hex color string like "#RRGGBB" to a ratatui Color.
fn parse_hex(hex: &str) -> Color {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Color::White;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(255);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(255);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(255);

    Color::Rgb(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex("#ff8000"), Color::Rgb(255, 128, 0));
        assert_eq!(parse_hex("short"), Color::White);
    }

    #[test]
    fn maps_wallust_roles() {
        let colors: WallustColors = serde_json::from_str(
            r##"{
                "background": "#000000",
                "foreground": "#eeeeee",
                "color1": "#aa0000",
                "color2": "#00aa00",
                "color6": "#00aaaa",
                "color7": "#aaaaaa",
                "color8": "#555555"
            }"##,
        )
        .unwrap();
        let theme = Theme::from_wallust(&colors);
        assert_eq!(theme.accent, Color::Rgb(0, 0xaa, 0xaa));
        assert_eq!(theme.danger, Color::Rgb(0xaa, 0, 0));
    }
}
