pub mod font;
pub mod geometry;
pub mod grouping;
pub mod interpreter;

use crate::config::LayoutParams;
use crate::error::MissiveError;
use crate::model::{PageLayout, TextBox};
use crate::pdf;
use geometry::Matrix;
use grouping::{group_boxes, group_lines, LineGroup};
use interpreter::PageInterpreter;

/// Trait for layout analysis backends.
pub trait LayoutSource: Send + Sync {
    /// Produce the text boxes of every page, in page order.
    fn page_layouts(&self, pdf_bytes: &[u8]) -> Result<Vec<PageLayout>, MissiveError>;

    /// Name of this layout backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Layout analysis over the page content streams, using `lopdf` for parsing.
#[derive(Debug, Clone, Default)]
pub struct LopdfLayout {
    params: LayoutParams,
}

impl LopdfLayout {
    pub fn new(params: LayoutParams) -> Self {
        LopdfLayout { params }
    }
}

impl LayoutSource for LopdfLayout {
    fn page_layouts(&self, pdf_bytes: &[u8]) -> Result<Vec<PageLayout>, MissiveError> {
        let doc = pdf::load(pdf_bytes)?;
        let mut pages = Vec::new();

        for (index, page_id) in pdf::page_ids(&doc).into_iter().enumerate() {
            let [x0, y0, x1, y1] = pdf::media_box(&doc, page_id)?;
            let resources = pdf::page_resources(&doc, page_id)?;
            let content = pdf::page_content(&doc, page_id)?;

            // Shift the origin to the MediaBox corner so y0 is measured from its bottom.
            let mut interpreter = PageInterpreter::new(&doc);
            interpreter.run(&content, resources, Matrix::translate(-x0, -y0))?;
            let glyphs = interpreter.into_glyphs();

            let lines = group_lines(&glyphs, &self.params);
            let boxes: Vec<TextBox> = group_boxes(lines, &self.params)
                .into_iter()
                .map(|group| text_box(index, group))
                .collect();
            log::debug!(
                "page {index}: {} glyphs grouped into {} boxes",
                glyphs.len(),
                boxes.len()
            );

            pages.push(PageLayout {
                index,
                width: x1 - x0,
                height: y1 - y0,
                boxes,
            });
        }

        Ok(pages)
    }

    fn backend_name(&self) -> &str {
        "lopdf"
    }
}

fn text_box(page_index: usize, group: LineGroup) -> TextBox {
    let runs = group.lines.into_iter().map(|line| line.text).collect();
    TextBox::new(page_index, group.bbox.y0, runs)
}
