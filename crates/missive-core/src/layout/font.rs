//! Font decoding: character codes to Unicode text and glyph metrics.

use crate::pdf;
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// Glyph width used when a font carries no metrics (thousandths of an em).
const FALLBACK_WIDTH: f64 = 500.0;

/// Decoder for one font resource.
#[derive(Debug, Clone)]
pub struct FontDecoder {
    two_byte: bool,
    to_unicode: Option<HashMap<u32, String>>,
    encoding: [Option<char>; 256],
    widths: HashMap<u32, f64>,
    default_width: f64,
    /// Font descent in thousandths of an em (negative below the baseline).
    pub descent: f64,
}

impl Default for FontDecoder {
    fn default() -> Self {
        FontDecoder {
            two_byte: false,
            to_unicode: None,
            encoding: win_ansi_table(),
            widths: HashMap::new(),
            default_width: FALLBACK_WIDTH,
            descent: 0.0,
        }
    }
}

impl FontDecoder {
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let mut decoder = FontDecoder::default();
        let subtype = pdf::name(doc, font, b"Subtype").unwrap_or_default();

        if subtype == b"Type0" {
            decoder.two_byte = true;
            decoder.default_width = 1000.0;
            if let Some(descendant) = descendant_font(doc, font) {
                decoder.load_cid_widths(doc, descendant);
                decoder.descent = descent(doc, descendant).unwrap_or(0.0);
            }
        } else {
            decoder.load_simple_widths(doc, font);
            decoder.load_differences(doc, font);
            decoder.descent = descent(doc, font).unwrap_or(0.0);
        }

        if let Some(cmap) = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| pdf::resolve(doc, obj).ok())
            .and_then(|obj| match obj {
                Object::Stream(stream) => pdf::stream_bytes(stream).ok(),
                _ => None,
            })
        {
            let map = parse_to_unicode(&cmap);
            if !map.is_empty() {
                decoder.to_unicode = Some(map);
            }
        }

        decoder
    }

    /// Split a shown string into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }

    pub fn is_single_byte(&self) -> bool {
        !self.two_byte
    }

    /// Glyph advance in thousandths of an em.
    pub fn width(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    /// Unicode text for a code; empty when the code maps to nothing.
    pub fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|map| map.get(&code)) {
            return text.clone();
        }
        if self.two_byte {
            return char::from_u32(code).map(String::from).unwrap_or_default();
        }
        usize::try_from(code)
            .ok()
            .and_then(|i| self.encoding.get(i).copied().flatten())
            .map(String::from)
            .unwrap_or_default()
    }

    fn load_simple_widths(&mut self, doc: &Document, font: &Dictionary) {
        if let Some(missing) = font_descriptor(doc, font)
            .and_then(|fd| fd.get(b"MissingWidth").ok())
            .and_then(pdf::number)
        {
            if missing > 0.0 {
                self.default_width = missing;
            }
        }
        let first = pdf::integer(doc, font, b"FirstChar").unwrap_or(0);
        let Some(Object::Array(widths)) = font
            .get(b"Widths")
            .ok()
            .and_then(|obj| pdf::resolve(doc, obj).ok())
        else {
            return;
        };
        for (offset, width) in widths.iter().enumerate() {
            let width = pdf::resolve(doc, width).ok().and_then(pdf::number);
            if let (Some(width), Ok(code)) = (width, u32::try_from(first + offset as i64)) {
                self.widths.insert(code, width);
            }
        }
    }

    /// `/W` entries are either `c [w1 w2 ...]` or `c_first c_last w`.
    fn load_cid_widths(&mut self, doc: &Document, cid_font: &Dictionary) {
        if let Some(dw) = cid_font.get(b"DW").ok().and_then(pdf::number) {
            self.default_width = dw;
        }
        let Some(Object::Array(entries)) = cid_font
            .get(b"W")
            .ok()
            .and_then(|obj| pdf::resolve(doc, obj).ok())
        else {
            return;
        };

        let mut i = 0;
        while i < entries.len() {
            let Some(start) = pdf::number(&entries[i]) else {
                break;
            };
            match entries.get(i + 1).map(|obj| pdf::resolve(doc, obj)) {
                Some(Ok(Object::Array(list))) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = pdf::number(width) {
                            self.widths.insert(start as u32 + offset as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(Ok(end)) => {
                    let (Some(end), Some(width)) =
                        (pdf::number(end), entries.get(i + 2).and_then(pdf::number))
                    else {
                        break;
                    };
                    for cid in start as u32..=end as u32 {
                        self.widths.insert(cid, width);
                    }
                    i += 3;
                }
                _ => break,
            }
        }
    }

    fn load_differences(&mut self, doc: &Document, font: &Dictionary) {
        let Some(encoding) = font
            .get(b"Encoding")
            .ok()
            .and_then(|obj| pdf::resolve(doc, obj).ok())
        else {
            return;
        };
        let Object::Dictionary(encoding) = encoding else {
            return;
        };
        let Some(Object::Array(differences)) = encoding
            .get(b"Differences")
            .ok()
            .and_then(|obj| pdf::resolve(doc, obj).ok())
        else {
            return;
        };

        let mut code: usize = 0;
        for item in differences {
            match item {
                Object::Integer(start) => code = usize::try_from(*start).unwrap_or(0),
                Object::Name(glyph) => {
                    if code < 256 {
                        if let Some(ch) = glyph_to_char(&String::from_utf8_lossy(glyph)) {
                            self.encoding[code] = Some(ch);
                        }
                    }
                    code += 1;
                }
                _ => {}
            }
        }
    }
}

fn descendant_font<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    match pdf::resolve(doc, font.get(b"DescendantFonts").ok()?).ok()? {
        Object::Array(list) => pdf::resolve_dict(doc, list.first()?, "descendant font").ok(),
        _ => None,
    }
}

fn font_descriptor<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    pdf::resolve_dict(doc, font.get(b"FontDescriptor").ok()?, "font descriptor").ok()
}

fn descent(doc: &Document, font: &Dictionary) -> Option<f64> {
    font_descriptor(doc, font)?
        .get(b"Descent")
        .ok()
        .and_then(|obj| pdf::resolve(doc, obj).ok())
        .and_then(pdf::number)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            CmapToken::Keyword(k) if k == "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (CmapToken::Hex(src), CmapToken::Hex(dst)) => {
                            map.insert(code_value(src), utf16_text(dst));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            CmapToken::Keyword(k) if k == "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (CmapToken::Hex(lo), CmapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1])
                    else {
                        break;
                    };
                    let lo = code_value(lo);
                    let hi = code_value(hi).min(lo.saturating_add(0xffff));
                    match &tokens[i + 2] {
                        CmapToken::Hex(dst) => {
                            let mut units = utf16_units(dst);
                            for code in lo..=hi {
                                map.insert(code, String::from_utf16_lossy(&units));
                                if let Some(last) = units.last_mut() {
                                    *last = last.wrapping_add(1);
                                }
                            }
                            i += 3;
                        }
                        CmapToken::ArrayStart => {
                            let mut j = i + 3;
                            let mut code = lo;
                            while let Some(CmapToken::Hex(dst)) = tokens.get(j) {
                                if code <= hi {
                                    map.insert(code, utf16_text(dst));
                                }
                                code += 1;
                                j += 1;
                            }
                            // skip the closing bracket
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }

    map
}

#[derive(Debug, PartialEq)]
enum CmapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Keyword(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CmapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let end = data[i..]
                    .iter()
                    .position(|b| *b == b'>')
                    .map_or(data.len(), |p| i + p);
                tokens.push(CmapToken::Hex(hex_bytes(&data[i + 1..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CmapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CmapToken::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'(' => {
                // literal strings only appear in CMap headers
                while i < data.len() && data[i] != b')' {
                    i += 1;
                }
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !b"<>[]()%".contains(&data[i])
                {
                    i += 1;
                }
                let word = String::from_utf8_lossy(&data[start..i]).into_owned();
                if i == start {
                    i += 1;
                } else {
                    tokens.push(CmapToken::Keyword(word));
                }
            }
        }
    }
    tokens
}

fn hex_bytes(hex: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .iter()
        .filter_map(|b| (*b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (hi << 4) | lo,
            [hi] => hi << 4,
            _ => 0,
        })
        .collect()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

/// WinAnsiEncoding: Latin-1 with the 0x80-0x9F block remapped.
fn win_ansi_table() -> [Option<char>; 256] {
    const HIGH: [char; 32] = [
        '€', '\u{0}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{0}', 'Ž',
        '\u{0}', '\u{0}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{0}',
        'ž', 'Ÿ',
    ];
    let mut table = [None; 256];
    for (code, slot) in table.iter_mut().enumerate() {
        *slot = match code {
            0x20..=0x7e | 0xa0..=0xff => char::from_u32(code as u32),
            0x80..=0x9f => Some(HIGH[code - 0x80]).filter(|c| *c != '\u{0}'),
            _ => None,
        };
    }
    table
}

/// Map a glyph name from an `/Differences` array to its character.
fn glyph_to_char(name: &str) -> Option<char> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c);
    }
    if let Some(hex) = name.strip_prefix("uni").or_else(|| name.strip_prefix('u')) {
        if (4..=6).contains(&hex.len()) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c);
            }
        }
    }
    let c = match name {
        "space" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "underscore" => '_',
        "quoteleft" => '‘',
        "quoteright" => '’',
        "quotedblleft" => '“',
        "quotedblright" => '”',
        "endash" => '–',
        "emdash" => '—',
        "bullet" => '•',
        "ellipsis" => '…',
        "agrave" => 'à',
        "aacute" => 'á',
        "acircumflex" => 'â',
        "adieresis" => 'ä',
        "ccedilla" => 'ç',
        "egrave" => 'è',
        "eacute" => 'é',
        "ecircumflex" => 'ê',
        "edieresis" => 'ë',
        "icircumflex" => 'î',
        "idieresis" => 'ï',
        "ocircumflex" => 'ô',
        "odieresis" => 'ö',
        "ugrave" => 'ù',
        "ucircumflex" => 'û',
        "udieresis" => 'ü',
        "Eacute" => 'É',
        "germandbls" => 'ß',
        "fi" => 'ﬁ',
        "fl" => 'ﬂ',
        _ => return None,
    };
    Some(c)
}
