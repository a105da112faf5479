//! Document access helpers shared by the layout and image extractors.

use crate::error::MissiveError;
use lopdf::{Dictionary, Document, Object, ObjectId};

/// US Letter, used when a page has no MediaBox anywhere in its tree.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Parse PDF bytes, mapping any parser failure to `MalformedDocument`.
pub fn load(pdf_bytes: &[u8]) -> Result<Document, MissiveError> {
    Document::load_mem(pdf_bytes)
        .map_err(|e| MissiveError::MalformedDocument(format!("failed to parse PDF: {e}")))
}

/// Page object ids in document order (page 0 first).
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Follow an indirect reference, if any.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, MissiveError> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).map_err(|e| {
            MissiveError::MalformedDocument(format!(
                "dangling reference {} {}: {e}",
                id.0, id.1
            ))
        }),
        other => Ok(other),
    }
}

pub fn resolve_dict<'a>(
    doc: &'a Document,
    obj: &'a Object,
    what: &str,
) -> Result<&'a Dictionary, MissiveError> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Ok(dict),
        Object::Stream(stream) => Ok(&stream.dict),
        other => Err(MissiveError::MalformedDocument(format!(
            "{what} is not a dictionary: {}",
            kind(other)
        ))),
    }
}

fn kind(obj: &Object) -> &'static str {
    match obj {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) | Object::Real(_) => "number",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        Object::Reference(_) => "reference",
    }
}

/// Look up a key on a page, walking up the page tree through `/Parent`.
pub fn inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, MissiveError> {
    let mut current = page_id;
    // Guards against /Parent cycles in broken files.
    for _ in 0..64 {
        let dict = doc
            .get_object(current)
            .map_err(|e| MissiveError::MalformedDocument(format!("missing page node: {e}")))
            .and_then(|obj| resolve_dict(doc, obj, "page node"))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return Ok(None),
        }
    }
    Err(MissiveError::MalformedDocument(
        "page tree is too deep or cyclic".into(),
    ))
}

/// The page's `/Resources`, inherited if needed. `None` when absent.
pub fn page_resources(
    doc: &Document,
    page_id: ObjectId,
) -> Result<Option<&Dictionary>, MissiveError> {
    match inherited(doc, page_id, b"Resources")? {
        Some(obj) => resolve_dict(doc, obj, "/Resources").map(Some),
        None => Ok(None),
    }
}

/// The page's MediaBox as `[x0, y0, x1, y1]`.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4], MissiveError> {
    let Some(obj) = inherited(doc, page_id, b"MediaBox")? else {
        return Ok(DEFAULT_MEDIA_BOX);
    };
    let array = match resolve(doc, obj)? {
        Object::Array(array) if array.len() == 4 => array,
        _ => {
            return Err(MissiveError::MalformedDocument(
                "MediaBox is not a 4-element array".into(),
            ))
        }
    };
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(array) {
        *slot = number(resolve(doc, value)?).ok_or_else(|| {
            MissiveError::MalformedDocument("MediaBox holds a non-numeric value".into())
        })?;
    }
    Ok([
        out[0].min(out[2]),
        out[1].min(out[3]),
        out[0].max(out[2]),
        out[1].max(out[3]),
    ])
}

/// Concatenated, decompressed content of a page (`/Contents` may be an array).
pub fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>, MissiveError> {
    let page = doc
        .get_object(page_id)
        .map_err(MissiveError::from)
        .and_then(|obj| resolve_dict(doc, obj, "page"))?;
    let contents = match page.get(b"Contents") {
        Ok(obj) => resolve(doc, obj)?,
        Err(_) => return Ok(Vec::new()),
    };
    match contents {
        Object::Stream(stream) => stream_bytes(stream),
        Object::Array(parts) => {
            let mut content = Vec::new();
            for part in parts {
                match resolve(doc, part)? {
                    Object::Stream(stream) => {
                        if !content.is_empty() {
                            content.push(b'\n');
                        }
                        content.extend_from_slice(&stream_bytes(stream)?);
                    }
                    _ => {
                        return Err(MissiveError::MalformedDocument(
                            "/Contents array item is not a stream".into(),
                        ))
                    }
                }
            }
            Ok(content)
        }
        _ => Err(MissiveError::MalformedDocument(
            "/Contents is not a stream or array".into(),
        )),
    }
}

/// Stream payload with its filters removed.
pub fn stream_bytes(stream: &lopdf::Stream) -> Result<Vec<u8>, MissiveError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content().map_err(|e| {
            MissiveError::MalformedDocument(format!("failed to decompress stream: {e}"))
        })
    } else {
        Ok(stream.content.clone())
    }
}

pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

pub fn integer(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key).ok().map(|obj| resolve(doc, obj)) {
        Some(Ok(Object::Integer(i))) => Some(*i),
        Some(Ok(Object::Real(r))) => Some(*r as i64),
        _ => None,
    }
}

pub fn name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match dict.get(key).ok().map(|obj| resolve(doc, obj)) {
        Some(Ok(Object::Name(name))) => Some(name.as_slice()),
        _ => None,
    }
}

pub fn boolean(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<bool> {
    match dict.get(key).ok().map(|obj| resolve(doc, obj)) {
        Some(Ok(Object::Boolean(b))) => Some(*b),
        _ => None,
    }
}
