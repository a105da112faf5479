pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod images;
pub mod layout;
pub mod migration;
pub mod model;
mod pdf;
pub mod text;

pub use images::extract_images;
pub use text::extract_text;

use catalog::BackgroundCatalog;
use config::ExtractOptions;
use error::MissiveError;
use images::ImageExtractor;
use layout::{LayoutSource, LopdfLayout};
use model::{ExtractionResult, ImageExtraction};
use text::{BoxClassifier, PositionalHeaderClassifier, TextExtractor};

/// Main API entry point: transcript and images of one correspondence PDF.
///
/// Immutable once built, so one extractor can serve concurrent batches.
pub struct Extractor {
    text: TextExtractor,
    images: ImageExtractor,
}

impl Extractor {
    pub fn new(options: &ExtractOptions) -> Self {
        Extractor::with_components(
            Box::new(LopdfLayout::new(options.layout.clone())),
            Box::new(PositionalHeaderClassifier {
                top_ratio: options.header_top_ratio,
            }),
            options,
        )
    }

    /// Build an extractor around a custom layout backend and header classifier.
    pub fn with_components(
        layout: Box<dyn LayoutSource>,
        classifier: Box<dyn BoxClassifier>,
        options: &ExtractOptions,
    ) -> Self {
        Extractor {
            text: TextExtractor::new(layout, classifier),
            images: ImageExtractor::new(options.strict_images),
        }
    }

    pub fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, MissiveError> {
        self.text.extract(pdf_bytes)
    }

    pub fn extract_images(
        &self,
        pdf_bytes: &[u8],
        catalog: &BackgroundCatalog,
    ) -> Result<ImageExtraction, MissiveError> {
        self.images.extract(pdf_bytes, catalog)
    }

    /// Run both extractors. `None` when the document has no text, in which
    /// case images are not looked at.
    pub fn extract(
        &self,
        pdf_bytes: &[u8],
        catalog: &BackgroundCatalog,
    ) -> Result<Option<ExtractionResult>, MissiveError> {
        let transcript = self.extract_text(pdf_bytes)?;
        if transcript.is_empty() {
            return Ok(None);
        }
        let ImageExtraction { images, skipped } = self.extract_images(pdf_bytes, catalog)?;
        Ok(Some(ExtractionResult {
            transcript,
            images,
            skipped_images: skipped,
        }))
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::new(&ExtractOptions::default())
    }
}
