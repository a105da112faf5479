//! Reading-order transcript assembly with repeated-header suppression.
//!
//! The first page decides what the header looks like: boxes sitting in the
//! top band of page 0 are header boxes, and the first line of the topmost one
//! becomes the signature key. On later pages any box starting with that exact
//! line is dropped. Everything else is ordered by page, then top to bottom.

use crate::error::MissiveError;
use crate::layout::{LayoutSource, LopdfLayout};
use crate::model::{HeaderSignature, PageLayout, TextBox};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxRole {
    Body,
    Header,
}

/// Decides whether a text box belongs to the repeated page header.
pub trait BoxClassifier: Send + Sync {
    /// `signature` is `None` while page 0 is being examined, or when page 0
    /// had no header.
    fn classify(
        &self,
        text_box: &TextBox,
        page: &PageLayout,
        signature: Option<&HeaderSignature>,
    ) -> BoxRole;
}

/// Header detection by position on the first page and by first-line text on
/// the others.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionalHeaderClassifier {
    /// Fraction of the page height above which a page-0 box is a header.
    pub top_ratio: f64,
}

impl Default for PositionalHeaderClassifier {
    fn default() -> Self {
        PositionalHeaderClassifier { top_ratio: 0.9 }
    }
}

impl BoxClassifier for PositionalHeaderClassifier {
    fn classify(
        &self,
        text_box: &TextBox,
        page: &PageLayout,
        signature: Option<&HeaderSignature>,
    ) -> BoxRole {
        if page.index == 0 {
            if text_box.y0 > self.top_ratio * page.height {
                return BoxRole::Header;
            }
            return BoxRole::Body;
        }
        match signature {
            Some(sig) if text_box.top_level_run_text == sig.key() => BoxRole::Header,
            _ => BoxRole::Body,
        }
    }
}

/// Collect the line texts of the header boxes on page 0, topmost box first.
pub fn header_signature(
    first_page: &PageLayout,
    classifier: &dyn BoxClassifier,
) -> Option<HeaderSignature> {
    let mut candidates: Vec<&TextBox> = first_page
        .boxes
        .iter()
        .filter(|tb| !tb.is_blank())
        .filter(|tb| classifier.classify(tb, first_page, None) == BoxRole::Header)
        .collect();
    candidates.sort_by(|a, b| b.y0.total_cmp(&a.y0));

    let runs: Vec<String> = candidates
        .iter()
        .flat_map(|tb| tb.runs.iter().cloned())
        .collect();
    HeaderSignature::from_runs(runs)
}

/// Order the body boxes of all pages and join their text with newlines.
pub fn assemble_transcript(pages: &[PageLayout], classifier: &dyn BoxClassifier) -> String {
    let signature = pages
        .iter()
        .find(|page| page.index == 0)
        .and_then(|page| header_signature(page, classifier));
    match &signature {
        Some(sig) => log::debug!("header signature key: {:?}", sig.key()),
        None => log::debug!("no header found on the first page"),
    }

    let mut body: Vec<&TextBox> = Vec::new();
    for page in pages {
        for tb in &page.boxes {
            if tb.is_blank() {
                continue;
            }
            match classifier.classify(tb, page, signature.as_ref()) {
                BoxRole::Body => body.push(tb),
                BoxRole::Header => {
                    log::debug!("page {}: dropping header box {:?}", page.index, tb.text)
                }
            }
        }
    }

    // stable: boxes at the same height keep layout order
    body.sort_by(|a, b| {
        a.page_index
            .cmp(&b.page_index)
            .then_with(|| b.y0.total_cmp(&a.y0))
    });

    body.iter()
        .map(|tb| tb.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Transcript extraction over a pluggable layout backend and classifier.
pub struct TextExtractor {
    source: Box<dyn LayoutSource>,
    classifier: Box<dyn BoxClassifier>,
}

impl TextExtractor {
    pub fn new(source: Box<dyn LayoutSource>, classifier: Box<dyn BoxClassifier>) -> Self {
        TextExtractor { source, classifier }
    }

    pub fn extract(&self, pdf_bytes: &[u8]) -> Result<String, MissiveError> {
        let pages = self.source.page_layouts(pdf_bytes)?;
        log::debug!(
            "{} pages laid out by {}",
            pages.len(),
            self.source.backend_name()
        );
        Ok(assemble_transcript(&pages, self.classifier.as_ref()))
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        TextExtractor::new(
            Box::new(LopdfLayout::default()),
            Box::new(PositionalHeaderClassifier::default()),
        )
    }
}

/// Extract the transcript of a PDF with default layout parameters.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<String, MissiveError> {
    TextExtractor::default().extract(pdf_bytes)
}
