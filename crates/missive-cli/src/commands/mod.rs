pub mod catalog;
pub mod images;
pub mod migrate;
pub mod text;

use missive_core::config::{load_options, ExtractOptions};
use missive_core::error::MissiveError;
use missive_core::model::ImageEncoding;
use std::path::Path;

fn extract_options(config: Option<&Path>) -> Result<ExtractOptions, MissiveError> {
    match config {
        Some(path) => load_options(path),
        None => Ok(ExtractOptions::default()),
    }
}

fn image_encoding(name: &str) -> Result<ImageEncoding, MissiveError> {
    name.parse().map_err(|reason| MissiveError::Config {
        path: "--encoding".into(),
        reason,
    })
}
