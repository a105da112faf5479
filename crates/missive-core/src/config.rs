use crate::error::MissiveError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters for grouping glyphs into lines and lines into boxes.
///
/// Margins are relative to glyph width (horizontal) or line height (vertical),
/// with the same meaning and defaults as pdfminer's `LAParams`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Minimum vertical overlap, relative to the smaller glyph height, for two
    /// glyphs to share a line.
    pub line_overlap: f64,
    /// Maximum horizontal gap, relative to the wider glyph, inside a line.
    pub char_margin: f64,
    /// Maximum vertical gap, relative to the taller line, inside a box.
    pub line_margin: f64,
    /// Gap, relative to glyph width, above which a space is inserted.
    pub word_margin: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            line_overlap: 0.5,
            char_margin: 2.0,
            line_margin: 0.5,
            word_margin: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub layout: LayoutParams,
    /// A page-0 box whose `y0` exceeds this fraction of the page height is
    /// treated as part of the header.
    pub header_top_ratio: f64,
    /// Fail the whole record when one embedded image cannot be decoded,
    /// instead of dropping that image.
    pub strict_images: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            layout: LayoutParams::default(),
            header_top_ratio: 0.9,
            strict_images: false,
        }
    }
}

/// Load extraction options from a JSON file. Missing fields keep their defaults.
pub fn load_options(path: &Path) -> Result<ExtractOptions, MissiveError> {
    let content = std::fs::read_to_string(path).map_err(|e| MissiveError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let options: ExtractOptions =
        serde_json::from_str(&content).map_err(|e| MissiveError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_options(&options).map_err(|reason| MissiveError::Config {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(options)
}

fn validate_options(options: &ExtractOptions) -> Result<(), String> {
    if !(0.0..=1.0).contains(&options.header_top_ratio) {
        return Err(format!(
            "header_top_ratio must be between 0 and 1, got {}",
            options.header_top_ratio
        ));
    }
    let layout = &options.layout;
    for (name, value) in [
        ("line_overlap", layout.line_overlap),
        ("char_margin", layout.char_margin),
        ("line_margin", layout.line_margin),
        ("word_margin", layout.word_margin),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("layout.{name} must be a non-negative number"));
        }
    }
    Ok(())
}
