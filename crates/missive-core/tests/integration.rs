//! Integration tests for transcript extraction end to end.
//!
//! Most tests use a MockLayout that returns pre-built pages, so header and
//! ordering rules are checked without going through PDF parsing. The
//! remaining ones run the lopdf backend on generated documents.

mod common;

use common::PdfBuilder;
use missive_core::catalog::BackgroundCatalog;
use missive_core::config::ExtractOptions;
use missive_core::error::MissiveError;
use missive_core::layout::LayoutSource;
use missive_core::model::{HeaderSignature, PageLayout, TextBox};
use missive_core::text::{BoxClassifier, BoxRole, PositionalHeaderClassifier};
use missive_core::{extract_text, Extractor};

struct MockLayout {
    pages: Vec<PageLayout>,
}

impl LayoutSource for MockLayout {
    fn page_layouts(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageLayout>, MissiveError> {
        Ok(self.pages.clone())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

fn page(index: usize, boxes: &[(f64, &[&str])]) -> PageLayout {
    PageLayout {
        index,
        width: 612.0,
        height: 792.0,
        boxes: boxes
            .iter()
            .map(|(y0, runs)| {
                TextBox::new(index, *y0, runs.iter().map(|r| r.to_string()).collect())
            })
            .collect(),
    }
}

fn mock_extractor(pages: Vec<PageLayout>) -> Extractor {
    Extractor::with_components(
        Box::new(MockLayout { pages }),
        Box::new(PositionalHeaderClassifier::default()),
        &ExtractOptions::default(),
    )
}

// ---------------------------------------------------------------------------
// Header suppression across a three-page letter
// ---------------------------------------------------------------------------
#[test]
fn three_page_letter_drops_repeated_header() {
    let extractor = mock_extractor(vec![
        page(
            0,
            &[
                (760.0, &["Sunrise Child Fund", "PO Box 12"]),
                (600.0, &["Dear Maria,"]),
                (400.0, &["We hope you are well."]),
            ],
        ),
        page(
            1,
            &[
                (760.0, &["Sunrise Child Fund", "PO Box 12"]),
                (650.0, &["School started again."]),
            ],
        ),
        page(
            2,
            &[
                (760.0, &["Sunrise Child Fund", "PO Box 12"]),
                (300.0, &["Love, Tomas"]),
            ],
        ),
    ]);

    let transcript = extractor.extract_text(&[]).unwrap();
    assert_eq!(
        transcript,
        "Dear Maria,\nWe hope you are well.\nSchool started again.\nLove, Tomas"
    );
}

// ---------------------------------------------------------------------------
// Every box that is not a header appears exactly once, in reading order
// ---------------------------------------------------------------------------
#[test]
fn transcript_is_ordered_by_page_then_height() {
    let extractor = mock_extractor(vec![
        page(0, &[(100.0, &["p0 low"]), (500.0, &["p0 high"]), (300.0, &["p0 mid"])]),
        page(1, &[(50.0, &["p1 low"]), (700.0, &["p1 high"])]),
    ]);

    let transcript = extractor.extract_text(&[]).unwrap();
    let lines: Vec<&str> = transcript.lines().collect();
    assert_eq!(lines, vec!["p0 high", "p0 mid", "p0 low", "p1 high", "p1 low"]);
}

#[test]
fn header_on_later_page_must_match_exactly() {
    let extractor = mock_extractor(vec![
        page(0, &[(760.0, &["Sunrise Child Fund"]), (500.0, &["Hi"])]),
        page(1, &[(760.0, &["Sunrise Child Fund "]), (500.0, &["Bye"])]),
    ]);

    // one trailing space is already a different line
    assert_eq!(
        extractor.extract_text(&[]).unwrap(),
        "Hi\nSunrise Child Fund \nBye"
    );

    let extractor = mock_extractor(vec![
        page(0, &[(760.0, &["Sunrise Child Fund"]), (500.0, &["Hi"])]),
        page(1, &[(760.0, &["Sunrise Child Fond"]), (500.0, &["Bye"])]),
    ]);
    assert_eq!(extractor.extract_text(&[]).unwrap(), "Hi\nSunrise Child Fond\nBye");

    let extractor = mock_extractor(vec![
        page(0, &[(760.0, &["Sunrise Child Fund"]), (500.0, &["Hi"])]),
        page(1, &[(760.0, &["Sunrise Child Fund"]), (500.0, &["Bye"])]),
    ]);
    assert_eq!(extractor.extract_text(&[]).unwrap(), "Hi\nBye");
}

#[test]
fn empty_document_yields_no_result() {
    let extractor = mock_extractor(vec![page(0, &[]), page(1, &[])]);
    assert_eq!(extractor.extract_text(&[]).unwrap(), "");
    let result = extractor
        .extract(&[], &BackgroundCatalog::default())
        .unwrap();
    assert!(result.is_none());
}

// ---------------------------------------------------------------------------
// The classifier is pluggable
// ---------------------------------------------------------------------------
struct KeywordClassifier;

impl BoxClassifier for KeywordClassifier {
    fn classify(
        &self,
        text_box: &TextBox,
        _page: &PageLayout,
        _signature: Option<&HeaderSignature>,
    ) -> BoxRole {
        if text_box.text.starts_with("CONFIDENTIAL") {
            BoxRole::Header
        } else {
            BoxRole::Body
        }
    }
}

#[test]
fn custom_classifier_replaces_positional_rule() {
    let extractor = Extractor::with_components(
        Box::new(MockLayout {
            pages: vec![page(
                0,
                &[(760.0, &["Top line"]), (500.0, &["CONFIDENTIAL copy"])],
            )],
        }),
        Box::new(KeywordClassifier),
        &ExtractOptions::default(),
    );
    assert_eq!(extractor.extract_text(&[]).unwrap(), "Top line");
}

// ---------------------------------------------------------------------------
// Real documents through the lopdf backend
// ---------------------------------------------------------------------------
#[test]
fn hello_world_single_page() {
    let pdf = PdfBuilder::new()
        .text_page(&[("Hello", 500.0), ("World", 300.0)])
        .build();
    assert_eq!(extract_text(&pdf).unwrap(), "Hello\nWorld");
}

#[test]
fn generated_letter_drops_header_on_second_page() {
    let pdf = PdfBuilder::new()
        .text_page(&[("Sunrise Child Fund", 760.0), ("Dear Maria,", 600.0)])
        .text_page(&[("Sunrise Child Fund", 760.0), ("Love, Tomas", 400.0)])
        .build();
    assert_eq!(extract_text(&pdf).unwrap(), "Dear Maria,\nLove, Tomas");
}

#[test]
fn malformed_bytes_are_rejected() {
    let err = extract_text(b"definitely not a PDF").unwrap_err();
    assert!(matches!(err, MissiveError::MalformedDocument(_)));
}

#[test]
fn custom_header_ratio_from_options() {
    let pdf = PdfBuilder::new()
        .text_page(&[("Letterhead", 650.0), ("Body text", 300.0)])
        .build();
    let options = ExtractOptions {
        header_top_ratio: 0.8,
        ..ExtractOptions::default()
    };
    let extractor = Extractor::new(&options);
    assert_eq!(extractor.extract_text(&pdf).unwrap(), "Body text");
}
