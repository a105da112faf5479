//! Size signatures of template background images.
//!
//! An embedded image whose pixel dimensions equal those of any template
//! background is treated as that background and left out. Only the size is
//! compared, so a photo that happens to share a background's dimensions is
//! dropped too.

use crate::error::MissiveError;
use image::io::Reader as ImageReader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::Path;

/// One page of a correspondence template.
#[derive(Debug, Clone, Default)]
pub struct TemplatePage {
    /// Encoded background image (PNG, JPEG, TIFF), if the page has one.
    pub background: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct Template {
    pub name: String,
    pub pages: Vec<TemplatePage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundCatalog {
    sizes: BTreeSet<(u32, u32)>,
}

impl BackgroundCatalog {
    /// Read the dimensions of every non-empty page background.
    pub fn build(templates: &[Template]) -> Result<Self, MissiveError> {
        let mut sizes = BTreeSet::new();
        for template in templates {
            for (index, page) in template.pages.iter().enumerate() {
                let Some(background) = page.background.as_deref() else {
                    continue;
                };
                if background.is_empty() {
                    continue;
                }
                let size = image_dimensions(background).map_err(|reason| MissiveError::Catalog {
                    template: template.name.clone(),
                    reason: format!("page {index}: {reason}"),
                })?;
                log::debug!(
                    "template {} page {index}: background {}x{}",
                    template.name,
                    size.0,
                    size.1
                );
                sizes.insert(size);
            }
        }
        Ok(BackgroundCatalog { sizes })
    }

    pub fn from_sizes(sizes: impl IntoIterator<Item = (u32, u32)>) -> Self {
        BackgroundCatalog {
            sizes: sizes.into_iter().collect(),
        }
    }

    pub fn contains(&self, width: u32, height: u32) -> bool {
        self.sizes.contains(&(width, height))
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.sizes.iter().copied()
    }

    pub fn load(path: &Path) -> Result<Self, MissiveError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), MissiveError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Pixel dimensions from the image header, without decoding pixel data.
fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageOutputFormat};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(GrayImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    fn template(name: &str, backgrounds: Vec<Option<Vec<u8>>>) -> Template {
        Template {
            name: name.into(),
            pages: backgrounds
                .into_iter()
                .map(|background| TemplatePage { background })
                .collect(),
        }
    }

    #[test]
    fn test_build_collects_unique_sizes() {
        let templates = vec![
            template("letter", vec![Some(png(60, 80)), None, Some(Vec::new())]),
            template("card", vec![Some(png(60, 80)), Some(png(30, 30))]),
        ];
        let catalog = BackgroundCatalog::build(&templates).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(60, 80));
        assert!(catalog.contains(30, 30));
        assert!(!catalog.contains(80, 60));
    }

    #[test]
    fn test_unreadable_background_fails() {
        let templates = vec![template("broken", vec![Some(b"not an image".to_vec())])];
        let err = BackgroundCatalog::build(&templates).unwrap_err();
        assert!(matches!(err, MissiveError::Catalog { ref template, .. } if template == "broken"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = BackgroundCatalog::from_sizes([(600, 800), (1240, 1754)]);
        catalog.save(&path).unwrap();
        assert_eq!(BackgroundCatalog::load(&path).unwrap(), catalog);

        let json = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["sizes"][0], serde_json::json!([600, 800]));
    }
}
