//! Content-stream interpreter producing positioned glyphs.

use crate::error::MissiveError;
use crate::layout::font::FontDecoder;
use crate::layout::geometry::{Matrix, Rect};
use crate::layout::grouping::Glyph;
use crate::pdf;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;
use std::rc::Rc;

/// Nesting limit for Form XObjects drawn from other forms.
const MAX_FORM_DEPTH: usize = 8;

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
    font: Option<Rc<FontDecoder>>,
    font_size: f64,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        GraphicsState {
            ctm,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            font_size: 0.0,
        }
    }
}

/// Walks the operators of one page and collects its glyphs.
pub struct PageInterpreter<'a> {
    doc: &'a Document,
    glyphs: Vec<Glyph>,
}

impl<'a> PageInterpreter<'a> {
    pub fn new(doc: &'a Document) -> Self {
        PageInterpreter {
            doc,
            glyphs: Vec::new(),
        }
    }

    pub fn into_glyphs(self) -> Vec<Glyph> {
        self.glyphs
    }

    /// Interpret `content` drawn with `resources` under the initial `ctm`.
    pub fn run(
        &mut self,
        content: &[u8],
        resources: Option<&Dictionary>,
        ctm: Matrix,
    ) -> Result<(), MissiveError> {
        self.run_at_depth(content, resources, ctm, 0)
    }

    fn run_at_depth(
        &mut self,
        content: &[u8],
        resources: Option<&Dictionary>,
        ctm: Matrix,
        depth: usize,
    ) -> Result<(), MissiveError> {
        let content = Content::decode(content).map_err(|e| {
            MissiveError::MalformedDocument(format!("failed to decode content stream: {e}"))
        })?;

        let mut fonts: HashMap<Vec<u8>, Rc<FontDecoder>> = HashMap::new();
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut gs = GraphicsState::new(ctm);
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let nums = || numbers(&op.operands);
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operands(&nums()) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let [Object::Name(name), size] = op.operands.as_slice() {
                        gs.font = Some(self.font(&mut fonts, resources, name));
                        gs.font_size = pdf::number(size).unwrap_or(0.0);
                    }
                }
                "Tc" => gs.char_spacing = first(&nums()).unwrap_or(gs.char_spacing),
                "Tw" => gs.word_spacing = first(&nums()).unwrap_or(gs.word_spacing),
                "Tz" => {
                    gs.horizontal_scale =
                        first(&nums()).map_or(gs.horizontal_scale, |v| v / 100.0)
                }
                "TL" => gs.leading = first(&nums()).unwrap_or(gs.leading),
                "Ts" => gs.rise = first(&nums()).unwrap_or(gs.rise),
                "Td" => {
                    if let [tx, ty] = nums()[..] {
                        tlm = Matrix::translate(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "TD" => {
                    if let [tx, ty] = nums()[..] {
                        gs.leading = -ty;
                        tlm = Matrix::translate(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operands(&nums()) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "'" => {
                    tlm = Matrix::translate(0.0, -gs.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "\"" => {
                    if let [Object::String(bytes, _)] = op.operands.get(2..).unwrap_or_default() {
                        let spacing = nums();
                        if let [aw, ac, ..] = spacing[..] {
                            gs.word_spacing = aw;
                            gs.char_spacing = ac;
                        }
                        tlm = Matrix::translate(0.0, -gs.leading).then(&tlm);
                        tm = tlm;
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(&gs, &mut tm, bytes),
                                other => {
                                    if let Some(adjust) = pdf::number(other) {
                                        let tx = -adjust / 1000.0
                                            * gs.font_size
                                            * gs.horizontal_scale;
                                        tm = Matrix::translate(tx, 0.0).then(&tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if depth < MAX_FORM_DEPTH {
                        self.draw_form(op, resources, &gs, depth)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn font(
        &self,
        cache: &mut HashMap<Vec<u8>, Rc<FontDecoder>>,
        resources: Option<&Dictionary>,
        name: &[u8],
    ) -> Rc<FontDecoder> {
        if let Some(font) = cache.get(name) {
            return Rc::clone(font);
        }
        let decoder = resources
            .and_then(|res| res.get(b"Font").ok())
            .and_then(|fonts| pdf::resolve_dict(self.doc, fonts, "/Font").ok())
            .and_then(|fonts| fonts.get(name).ok())
            .and_then(|font| pdf::resolve_dict(self.doc, font, "font").ok())
            .map(|font| FontDecoder::from_dict(self.doc, font))
            .unwrap_or_else(|| {
                log::debug!(
                    "font /{} not found in resources, using fallback metrics",
                    String::from_utf8_lossy(name)
                );
                FontDecoder::default()
            });
        let decoder = Rc::new(decoder);
        cache.insert(name.to_vec(), Rc::clone(&decoder));
        decoder
    }

    fn show(&mut self, gs: &GraphicsState, tm: &mut Matrix, bytes: &[u8]) {
        let Some(font) = gs.font.as_ref() else {
            return;
        };
        let size = gs.font_size;
        let scale = gs.horizontal_scale;

        for code in font.codes(bytes) {
            let width = font.width(code) / 1000.0;
            let trm = Matrix::new(size * scale, 0.0, 0.0, size, 0.0, gs.rise)
                .then(tm)
                .then(&gs.ctm);

            let text = font.decode(code);
            if !text.is_empty() {
                let descent = font.descent / 1000.0;
                let bbox = Rect::from_points(
                    trm.apply(0.0, descent),
                    trm.apply(width, descent + 1.0),
                );
                self.glyphs.push(Glyph { text, bbox });
            }

            let mut advance = width * size + gs.char_spacing;
            if font.is_single_byte() && code == 32 {
                advance += gs.word_spacing;
            }
            *tm = Matrix::translate(advance * scale, 0.0).then(tm);
        }
    }

    fn draw_form(
        &mut self,
        op: &Operation,
        resources: Option<&Dictionary>,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<(), MissiveError> {
        let Some(Object::Name(name)) = op.operands.first() else {
            return Ok(());
        };
        let Some(xobject) = resources
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|xobjects| pdf::resolve_dict(self.doc, xobjects, "/XObject").ok())
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|obj| pdf::resolve(self.doc, obj).ok())
        else {
            return Ok(());
        };
        let Object::Stream(stream) = xobject else {
            return Ok(());
        };
        if pdf::name(self.doc, &stream.dict, b"Subtype") != Some(b"Form".as_slice()) {
            return Ok(());
        }

        let form_matrix = match stream.dict.get(b"Matrix") {
            Ok(Object::Array(values)) => {
                let values: Vec<f64> = values.iter().filter_map(pdf::number).collect();
                matrix_operands(&values).unwrap_or(Matrix::IDENTITY)
            }
            _ => Matrix::IDENTITY,
        };
        let form_resources = match stream.dict.get(b"Resources") {
            Ok(obj) => Some(pdf::resolve_dict(self.doc, obj, "form /Resources")?),
            Err(_) => resources,
        };
        let content = pdf::stream_bytes(stream)?;
        self.run_at_depth(
            &content,
            form_resources,
            form_matrix.then(&gs.ctm),
            depth + 1,
        )
    }
}

fn numbers(operands: &[Object]) -> Vec<f64> {
    operands.iter().filter_map(pdf::number).collect()
}

fn first(values: &[f64]) -> Option<f64> {
    values.first().copied()
}

fn matrix_operands(values: &[f64]) -> Option<Matrix> {
    match *values {
        [a, b, c, d, e, f] => Some(Matrix::new(a, b, c, d, e, f)),
        _ => None,
    }
}
