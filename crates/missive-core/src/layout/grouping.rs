//! Glyph → line → box grouping for horizontal text.

use crate::config::LayoutParams;
use crate::layout::geometry::Rect;

/// One positioned glyph, as emitted by the content-stream interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub bbox: Rect,
}

/// A horizontal run of glyphs sharing a baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub bbox: Rect,
}

/// Lines merged into one paragraph fragment, top line first.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGroup {
    pub lines: Vec<TextLine>,
    pub bbox: Rect,
}

/// Group glyphs into lines, following emission order.
///
/// Two consecutive glyphs share a line when they overlap vertically by more
/// than `line_overlap` of the smaller height and the horizontal gap between
/// them is under `char_margin` times the wider glyph.
pub fn group_lines(glyphs: &[Glyph], params: &LayoutParams) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Option<TextLine> = None;
    let mut previous: Option<&Glyph> = None;

    for glyph in glyphs {
        let continues = previous.is_some_and(|prev| halign(prev, glyph, params));
        match current.as_mut() {
            Some(line) if continues => push_glyph(line, glyph, params.word_margin),
            _ => {
                if let Some(done) = current.take() {
                    lines.push(done);
                }
                current = Some(TextLine {
                    text: glyph.text.clone(),
                    bbox: glyph.bbox,
                });
            }
        }
        previous = Some(glyph);
    }
    if let Some(done) = current {
        lines.push(done);
    }

    lines
        .into_iter()
        .map(|line| TextLine {
            text: line.text.trim().to_string(),
            bbox: line.bbox,
        })
        .filter(|line| !line.text.is_empty())
        .collect()
}

fn halign(a: &Glyph, b: &Glyph, params: &LayoutParams) -> bool {
    let (a, b) = (&a.bbox, &b.bbox);
    a.is_voverlap(b)
        && a.height().min(b.height()) * params.line_overlap < a.voverlap(b)
        && a.hdistance(b) < a.width().max(b.width()) * params.char_margin
}

fn push_glyph(line: &mut TextLine, glyph: &Glyph, word_margin: f64) {
    let margin = word_margin * glyph.bbox.width().max(glyph.bbox.height());
    let gap = glyph.bbox.x0 - line.bbox.x1;
    let already_spaced = line.text.ends_with(char::is_whitespace)
        || glyph.text.starts_with(char::is_whitespace);
    if gap > margin && !already_spaced {
        line.text.push(' ');
    }
    line.text.push_str(&glyph.text);
    line.bbox = line.bbox.union(&glyph.bbox);
}

/// Merge vertically adjacent, similarly sized and aligned lines into boxes.
///
/// Groups keep the order in which their first line appeared; lines inside a
/// group are sorted top to bottom.
pub fn group_boxes(lines: Vec<TextLine>, params: &LayoutParams) -> Vec<LineGroup> {
    let n = lines.len();
    let mut parent: Vec<usize> = (0..n).collect();

    for i in 0..n {
        let line = &lines[i].bbox;
        let d = params.line_margin * line.height();
        let search = Rect {
            x0: line.x0,
            y0: line.y0 - d,
            x1: line.x1,
            y1: line.y1 + d,
        };
        for j in 0..n {
            if i == j {
                continue;
            }
            let other = &lines[j].bbox;
            let intersects = other.x1 > search.x0
                && search.x1 > other.x0
                && other.y1 > search.y0
                && search.y1 > other.y0;
            if intersects && aligned(line, other, d) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut order: Vec<usize> = Vec::new();
    let mut members: Vec<Vec<TextLine>> = vec![Vec::new(); n];
    for (i, line) in lines.into_iter().enumerate() {
        let root = find(&mut parent, i);
        if members[root].is_empty() {
            order.push(root);
        }
        members[root].push(line);
    }

    order
        .into_iter()
        .map(|root| {
            let mut lines = std::mem::take(&mut members[root]);
            lines.sort_by(|a, b| b.bbox.y1.total_cmp(&a.bbox.y1));
            let bbox = lines
                .iter()
                .skip(1)
                .fold(lines[0].bbox, |acc, line| acc.union(&line.bbox));
            LineGroup { lines, bbox }
        })
        .collect()
}

fn aligned(a: &Rect, b: &Rect, tolerance: f64) -> bool {
    let same_height = (a.height() - b.height()).abs() <= tolerance;
    let left = (a.x0 - b.x0).abs() <= tolerance;
    let right = (a.x1 - b.x1).abs() <= tolerance;
    let center = (a.center_x() - b.center_x()).abs() <= tolerance;
    same_height && (left || right || center)
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        // lower index wins so group order follows first appearance
        let (keep, merge) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[merge] = keep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(text: &str, x0: f64, y0: f64, width: f64, size: f64) -> Glyph {
        Glyph {
            text: text.to_string(),
            bbox: Rect {
                x0,
                y0,
                x1: x0 + width,
                y1: y0 + size,
            },
        }
    }

    fn word(text: &str, x0: f64, y0: f64) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, c)| glyph(&c.to_string(), x0 + i as f64 * 6.0, y0, 6.0, 12.0))
            .collect()
    }

    #[test]
    fn test_glyphs_on_one_baseline_form_a_line() {
        let glyphs = word("Hello", 72.0, 700.0);
        let lines = group_lines(&glyphs, &LayoutParams::default());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hello");
        assert_eq!(lines[0].bbox.x1, 102.0);
    }

    #[test]
    fn test_gap_inserts_word_space() {
        let mut glyphs = word("Hi", 72.0, 700.0);
        glyphs.extend(word("there", 90.0, 700.0));
        let lines = group_lines(&glyphs, &LayoutParams::default());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hi there");
    }

    #[test]
    fn test_far_apart_glyphs_split_lines() {
        let mut glyphs = word("Left", 72.0, 700.0);
        glyphs.extend(word("Right", 400.0, 700.0));
        glyphs.extend(word("Below", 72.0, 600.0));
        let lines = group_lines(&glyphs, &LayoutParams::default());
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Left", "Right", "Below"]);
    }

    #[test]
    fn test_adjacent_lines_merge_into_one_box() {
        let mut glyphs = word("second", 72.0, 686.0);
        glyphs.extend(word("first", 72.0, 700.0));
        glyphs.extend(word("alone", 72.0, 500.0));
        let params = LayoutParams::default();
        let boxes = group_boxes(group_lines(&glyphs, &params), &params);
        assert_eq!(boxes.len(), 2);
        let first: Vec<&str> = boxes[0].lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(first, vec!["first", "second"]);
        assert_eq!(boxes[0].bbox.y0, 686.0);
        assert_eq!(boxes[1].lines[0].text, "alone");
    }

    #[test]
    fn test_blank_lines_are_dropped() {
        let glyphs = vec![glyph(" ", 72.0, 700.0, 3.0, 12.0)];
        assert!(group_lines(&glyphs, &LayoutParams::default()).is_empty());
    }
}
