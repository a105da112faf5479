use crate::error::MissiveError;
use image::{DynamicImage, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// JPEG quality used when re-encoding images for storage.
const JPEG_QUALITY: u8 = 90;

/// A block of text lines grouped by layout analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    /// All lines joined by single spaces.
    pub text: String,
    pub page_index: usize,
    /// Bottom edge, measured upwards from the bottom of the MediaBox.
    pub y0: f64,
    /// Text of the first (topmost) line.
    pub top_level_run_text: String,
    /// Line texts, top to bottom.
    pub runs: Vec<String>,
}

impl TextBox {
    pub fn new(page_index: usize, y0: f64, runs: Vec<String>) -> Self {
        let runs: Vec<String> = runs
            .into_iter()
            .map(|run| collapse_newlines(&run))
            .collect();
        let text = runs.join(" ");
        TextBox {
            top_level_run_text: runs.first().cloned().unwrap_or_default(),
            text,
            page_index,
            y0,
            runs,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Replace every run of line-break characters with one space. Other
/// whitespace is kept as is.
fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for c in text.chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
        } else {
            out.push(c);
            in_break = false;
        }
    }
    out
}

/// Text boxes of one page together with its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub index: usize,
    pub width: f64,
    pub height: f64,
    pub boxes: Vec<TextBox>,
}

/// Line texts of the header boxes found at the top of the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSignature {
    runs: Vec<String>,
}

impl HeaderSignature {
    /// `None` when no header line was found.
    pub fn from_runs(runs: Vec<String>) -> Option<Self> {
        if runs.is_empty() {
            None
        } else {
            Some(HeaderSignature { runs })
        }
    }

    /// The line later pages are compared against.
    pub fn key(&self) -> &str {
        self.runs.first().map(String::as_str).unwrap_or_default()
    }

    pub fn runs(&self) -> &[String] {
        &self.runs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId(id.to_string())
    }
}

/// `/DecodeParms` of a CCITTFaxDecode stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcittParams {
    /// Negative for pure two-dimensional (Group 4) coding.
    pub k: i64,
    pub columns: u32,
    pub rows: Option<u32>,
}

impl Default for CcittParams {
    fn default() -> Self {
        CcittParams {
            k: 0,
            columns: 1728,
            rows: None,
        }
    }
}

/// Stream filter of an image XObject, after unwrapping one-element arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFilter {
    Raw,
    Flate,
    Dct,
    Jpx,
    CcittFax(CcittParams),
    Unsupported(String),
}

impl ImageFilter {
    pub fn name(&self) -> &str {
        match self {
            ImageFilter::Raw => "none",
            ImageFilter::Flate => "FlateDecode",
            ImageFilter::Dct => "DCTDecode",
            ImageFilter::Jpx => "JPXDecode",
            ImageFilter::CcittFax(_) => "CCITTFaxDecode",
            ImageFilter::Unsupported(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    /// Indexed colours with an RGB lookup table.
    Indexed { palette: Vec<[u8; 3]> },
    /// Anything else; samples are read as a single channel.
    Other(String),
}

impl ColorSpace {
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Rgb => 3,
            _ => 1,
        }
    }
}

/// An image XObject as read from the page resources.
#[derive(Debug, Clone)]
pub struct ImageObject {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub filter: ImageFilter,
    pub color_space: ColorSpace,
    pub bits_per_component: u8,
    /// Stream data; already inflated for `ImageFilter::Flate`.
    pub raw_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Jpeg2000,
    Tiff,
    Png,
}

impl ImageKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => ".jpg",
            ImageKind::Jpeg2000 => ".jp2",
            ImageKind::Tiff => ".tiff",
            ImageKind::Png => ".png",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Jpeg => write!(f, "JPEG"),
            ImageKind::Jpeg2000 => write!(f, "JPEG2000"),
            ImageKind::Tiff => write!(f, "TIFF"),
            ImageKind::Png => write!(f, "PNG"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Bitmap {
    Pixels(DynamicImage),
    /// JPEG 2000 codestream kept as found, with dimensions from its header.
    Jpeg2000 {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
}

/// How images are written out for storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    /// Re-encode as JPEG. JPEG 2000 data is passed through unchanged.
    #[default]
    Jpeg,
    /// Keep each image's own format.
    Native,
}

impl FromStr for ImageEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageEncoding::Jpeg),
            "native" => Ok(ImageEncoding::Native),
            other => Err(format!(
                "unknown image encoding '{other}', expected 'jpeg' or 'native'"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// `<resource key><extension>`, unique within one document.
    pub filename: String,
    pub format: ImageKind,
    pub bitmap: Bitmap,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        match &self.bitmap {
            Bitmap::Pixels(img) => img.width(),
            Bitmap::Jpeg2000 { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match &self.bitmap {
            Bitmap::Pixels(img) => img.height(),
            Bitmap::Jpeg2000 { height, .. } => *height,
        }
    }

    /// Format the image ends up in when written with `encoding`.
    pub fn output_kind(&self, encoding: ImageEncoding) -> ImageKind {
        match (&self.bitmap, encoding) {
            (Bitmap::Jpeg2000 { .. }, _) => ImageKind::Jpeg2000,
            (Bitmap::Pixels(_), ImageEncoding::Jpeg) => ImageKind::Jpeg,
            (Bitmap::Pixels(_), ImageEncoding::Native) => self.format,
        }
    }

    /// `filename` without its format extension.
    pub fn stem(&self) -> &str {
        self.filename
            .strip_suffix(self.format.extension())
            .unwrap_or(&self.filename)
    }

    /// File name matching `encode(encoding)`.
    pub fn output_filename(&self, encoding: ImageEncoding) -> String {
        format!("{}{}", self.stem(), self.output_kind(encoding).extension())
    }

    pub fn encode(&self, encoding: ImageEncoding) -> Result<Vec<u8>, MissiveError> {
        let img = match &self.bitmap {
            Bitmap::Jpeg2000 { data, .. } => return Ok(data.clone()),
            Bitmap::Pixels(img) => img,
        };
        let format = match self.output_kind(encoding) {
            ImageKind::Jpeg => ImageOutputFormat::Jpeg(JPEG_QUALITY),
            ImageKind::Tiff => ImageOutputFormat::Tiff,
            ImageKind::Png | ImageKind::Jpeg2000 => ImageOutputFormat::Png,
        };

        // the JPEG encoder only takes 8-bit gray or RGB
        let needs_rgb = matches!(format, ImageOutputFormat::Jpeg(_))
            && !matches!(
                img,
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_)
            );

        let mut buf = Cursor::new(Vec::new());
        let written = if needs_rgb {
            DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut buf, format)
        } else {
            img.write_to(&mut buf, format)
        };
        written.map_err(|e| MissiveError::ImageDecode {
            name: self.filename.clone(),
            reason: format!("failed to encode: {e}"),
        })?;
        Ok(buf.into_inner())
    }
}

/// An image left out of the result, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedImage {
    pub name: String,
    pub reason: String,
}

/// Images recovered from the first page, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct ImageExtraction {
    pub images: BTreeMap<String, DecodedImage>,
    pub skipped: Vec<SkippedImage>,
}

/// Everything kept from one record's PDF.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub transcript: String,
    pub images: BTreeMap<String, DecodedImage>,
    pub skipped_images: Vec<SkippedImage>,
}

/// Per-record result of one batch. The three sets are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub succeeded: BTreeSet<RecordId>,
    pub failed: BTreeSet<RecordId>,
    /// Records without a stored PDF or with an empty transcript.
    pub skipped: BTreeSet<RecordId>,
}

impl MigrationOutcome {
    pub fn merge(&mut self, other: MigrationOutcome) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }
}
