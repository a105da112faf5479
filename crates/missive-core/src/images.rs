//! Embedded image recovery from the first page.

use crate::catalog::BackgroundCatalog;
use crate::codec;
use crate::error::MissiveError;
use crate::model::{
    CcittParams, ColorSpace, DecodedImage, ImageExtraction, ImageFilter, ImageObject,
    SkippedImage,
};
use crate::pdf;
use lopdf::{Dictionary, Document, Object, Stream};
use std::collections::BTreeSet;

/// Walks the page-0 XObjects and decodes every image that is not a template
/// background.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExtractor {
    /// Fail on the first undecodable image instead of skipping it.
    pub strict: bool,
}

impl ImageExtractor {
    pub fn new(strict: bool) -> Self {
        ImageExtractor { strict }
    }

    pub fn extract(
        &self,
        pdf_bytes: &[u8],
        catalog: &BackgroundCatalog,
    ) -> Result<ImageExtraction, MissiveError> {
        let doc = pdf::load(pdf_bytes)?;
        let Some(&page_id) = pdf::page_ids(&doc).first() else {
            return Err(MissiveError::MalformedDocument("document has no pages".into()));
        };
        let mut result = ImageExtraction::default();

        let Some(resources) = pdf::page_resources(&doc, page_id)? else {
            return Ok(result);
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Ok(result);
        };
        let xobjects = pdf::resolve_dict(&doc, xobjects, "/XObject")?;

        let mut entries: Vec<(&Vec<u8>, &Object)> = xobjects.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut stems = BTreeSet::new();

        for (key, obj) in entries {
            let name = String::from_utf8_lossy(key).into_owned();
            let Object::Stream(stream) = pdf::resolve(&doc, obj)? else {
                continue;
            };
            if pdf::name(&doc, &stream.dict, b"Subtype") != Some(b"Image".as_slice()) {
                continue;
            }

            match self.extract_one(&doc, &name, stream, catalog) {
                Ok(Some(mut image)) => {
                    if let Some(stem) = unique_stem(&mut stems, image.stem()) {
                        log::debug!("image {name} renamed to {stem}");
                        image.filename = format!("{stem}{}", image.format.extension());
                    }
                    result.images.insert(image.filename.clone(), image);
                }
                Ok(None) => {}
                Err(e) if e.is_image_level() && !self.strict => {
                    log::warn!("skipping image {name}: {e}");
                    result.skipped.push(SkippedImage {
                        name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }

    fn extract_one(
        &self,
        doc: &Document,
        name: &str,
        stream: &Stream,
        catalog: &BackgroundCatalog,
    ) -> Result<Option<DecodedImage>, MissiveError> {
        let (width, height) = image_size(doc, name, &stream.dict)?;
        if catalog.contains(width, height) {
            log::debug!("image {name} ({width}x{height}) matches a template background");
            return Ok(None);
        }
        let object = read_image_object(doc, name, stream, width, height)?;
        codec::decode(&object).map(Some)
    }
}

/// Decode the non-background images of page 0, skipping undecodable ones.
pub fn extract_images(
    pdf_bytes: &[u8],
    catalog: &BackgroundCatalog,
) -> Result<ImageExtraction, MissiveError> {
    ImageExtractor::default().extract(pdf_bytes, catalog)
}

/// Record `stem` as used. Returns a numbered replacement when another image
/// already took it, since sanitised keys can collide and every output
/// encoding must get distinct file names.
fn unique_stem(stems: &mut BTreeSet<String>, stem: &str) -> Option<String> {
    if stems.insert(stem.to_string()) {
        return None;
    }
    (2..)
        .map(|n| format!("{stem}_{n}"))
        .find(|candidate| stems.insert(candidate.clone()))
}

fn image_size(doc: &Document, name: &str, dict: &Dictionary) -> Result<(u32, u32), MissiveError> {
    let dimension = |key: &[u8]| {
        pdf::integer(doc, dict, key)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| MissiveError::ImageDecode {
                name: name.to_string(),
                reason: format!("missing or invalid /{}", String::from_utf8_lossy(key)),
            })
    };
    Ok((dimension(b"Width")?, dimension(b"Height")?))
}

fn read_image_object(
    doc: &Document,
    name: &str,
    stream: &Stream,
    width: u32,
    height: u32,
) -> Result<ImageObject, MissiveError> {
    let dict = &stream.dict;
    let filter = image_filter(doc, dict);
    let raw_bytes = match filter {
        ImageFilter::Flate => {
            stream
                .decompressed_content()
                .map_err(|e| MissiveError::ImageDecode {
                    name: name.to_string(),
                    reason: format!("failed to inflate: {e}"),
                })?
        }
        _ => stream.content.clone(),
    };
    let mask = pdf::boolean(doc, dict, b"ImageMask").unwrap_or(false);
    let bits_per_component = if mask {
        1
    } else {
        pdf::integer(doc, dict, b"BitsPerComponent")
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(8)
    };
    let color_space = match dict.get(b"ColorSpace") {
        Ok(obj) if !mask => color_space(doc, obj),
        _ => ColorSpace::Gray,
    };

    Ok(ImageObject {
        name: name.to_string(),
        width,
        height,
        filter,
        color_space,
        bits_per_component,
        raw_bytes,
    })
}

/// Read `/Filter`, unwrapping a one-element array. Chains are not supported.
pub fn image_filter(doc: &Document, dict: &Dictionary) -> ImageFilter {
    let filter = match dict.get(b"Filter").map(|obj| pdf::resolve(doc, obj)) {
        Err(_) => return ImageFilter::Raw,
        Ok(Ok(obj)) => obj,
        Ok(Err(_)) => return ImageFilter::Unsupported("unresolvable /Filter".into()),
    };
    let name = match filter {
        Object::Name(name) => name.as_slice(),
        Object::Array(list) => match list.as_slice() {
            [] => return ImageFilter::Raw,
            [Object::Name(name)] => name.as_slice(),
            chain => {
                let names: Vec<String> = chain
                    .iter()
                    .filter_map(|obj| match obj {
                        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                        _ => None,
                    })
                    .collect();
                return ImageFilter::Unsupported(names.join("+"));
            }
        },
        _ => return ImageFilter::Unsupported("malformed /Filter".into()),
    };

    match name {
        b"FlateDecode" | b"Fl" => ImageFilter::Flate,
        b"DCTDecode" | b"DCT" => ImageFilter::Dct,
        b"JPXDecode" => ImageFilter::Jpx,
        b"CCITTFaxDecode" | b"CCF" => ImageFilter::CcittFax(ccitt_params(doc, dict)),
        other => ImageFilter::Unsupported(String::from_utf8_lossy(other).into_owned()),
    }
}

fn ccitt_params(doc: &Document, dict: &Dictionary) -> CcittParams {
    let mut params = CcittParams::default();
    let parms = dict
        .get(b"DecodeParms")
        .ok()
        .and_then(|obj| pdf::resolve(doc, obj).ok())
        .and_then(|obj| match obj {
            Object::Dictionary(d) => Some(d),
            Object::Array(list) => list
                .first()
                .and_then(|first| pdf::resolve_dict(doc, first, "/DecodeParms").ok()),
            _ => None,
        });
    if let Some(parms) = parms {
        if let Some(k) = pdf::integer(doc, parms, b"K") {
            params.k = k;
        }
        if let Some(columns) = pdf::integer(doc, parms, b"Columns")
            .and_then(|v| u32::try_from(v).ok())
        {
            params.columns = columns;
        }
        params.rows = pdf::integer(doc, parms, b"Rows").and_then(|v| u32::try_from(v).ok());
    }
    params
}

/// Map a `/ColorSpace` entry to the channel layout of its samples.
pub fn color_space(doc: &Document, obj: &Object) -> ColorSpace {
    let Ok(obj) = pdf::resolve(doc, obj) else {
        return ColorSpace::Other("unresolvable".into());
    };
    match obj {
        Object::Name(name) => match name.as_slice() {
            b"DeviceRGB" | b"RGB" | b"CalRGB" => ColorSpace::Rgb,
            b"DeviceGray" | b"G" | b"CalGray" => ColorSpace::Gray,
            other => ColorSpace::Other(String::from_utf8_lossy(other).into_owned()),
        },
        Object::Array(list) => match list.as_slice() {
            [Object::Name(family), rest @ ..] => match family.as_slice() {
                b"CalRGB" => ColorSpace::Rgb,
                b"CalGray" => ColorSpace::Gray,
                b"ICCBased" => icc_components(doc, rest.first()),
                b"Indexed" | b"I" => indexed(doc, rest),
                other => ColorSpace::Other(String::from_utf8_lossy(other).into_owned()),
            },
            _ => ColorSpace::Other("malformed".into()),
        },
        _ => ColorSpace::Other("malformed".into()),
    }
}

fn icc_components(doc: &Document, profile: Option<&Object>) -> ColorSpace {
    let n = profile
        .and_then(|obj| pdf::resolve_dict(doc, obj, "ICC profile").ok())
        .and_then(|dict| pdf::integer(doc, dict, b"N"));
    match n {
        Some(3) => ColorSpace::Rgb,
        Some(1) => ColorSpace::Gray,
        _ => ColorSpace::Other("ICCBased".into()),
    }
}

/// `[/Indexed base hival lookup]`; only RGB bases are expanded.
fn indexed(doc: &Document, rest: &[Object]) -> ColorSpace {
    let [base, hival, lookup, ..] = rest else {
        return ColorSpace::Other("Indexed".into());
    };
    if color_space(doc, base) != ColorSpace::Rgb {
        return ColorSpace::Other("Indexed".into());
    }
    let entries = pdf::resolve(doc, hival)
        .ok()
        .and_then(pdf::number)
        .map_or(0, |v| v.max(0.0) as usize + 1);
    let table = match pdf::resolve(doc, lookup) {
        Ok(Object::String(bytes, _)) => bytes.clone(),
        Ok(Object::Stream(stream)) => match pdf::stream_bytes(stream) {
            Ok(bytes) => bytes,
            Err(_) => return ColorSpace::Other("Indexed".into()),
        },
        _ => return ColorSpace::Other("Indexed".into()),
    };
    let palette = table
        .chunks_exact(3)
        .take(entries)
        .map(|rgb| [rgb[0], rgb[1], rgb[2]])
        .collect();
    ColorSpace::Indexed { palette }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, StringFormat};

    fn doc() -> Document {
        Document::with_version("1.5")
    }

    #[test]
    fn test_unique_stem_numbers_collisions() {
        let mut stems = BTreeSet::new();
        assert_eq!(unique_stem(&mut stems, "a_b"), None);
        assert_eq!(unique_stem(&mut stems, "a_b").as_deref(), Some("a_b_2"));
        assert_eq!(unique_stem(&mut stems, "a_b").as_deref(), Some("a_b_3"));
        assert_eq!(unique_stem(&mut stems, "Im1"), None);
    }

    #[test]
    fn test_filter_names() {
        let doc = doc();
        assert_eq!(image_filter(&doc, &dictionary! {}), ImageFilter::Raw);
        assert_eq!(
            image_filter(&doc, &dictionary! { "Filter" => "DCTDecode" }),
            ImageFilter::Dct
        );
        assert_eq!(
            image_filter(
                &doc,
                &dictionary! { "Filter" => vec![Object::Name(b"JPXDecode".to_vec())] }
            ),
            ImageFilter::Jpx
        );
        assert_eq!(
            image_filter(&doc, &dictionary! { "Filter" => "JBIG2Decode" }),
            ImageFilter::Unsupported("JBIG2Decode".into())
        );
    }

    #[test]
    fn test_filter_chain_is_unsupported() {
        let doc = doc();
        let dict = dictionary! {
            "Filter" => vec![
                Object::Name(b"FlateDecode".to_vec()),
                Object::Name(b"DCTDecode".to_vec()),
            ],
        };
        assert_eq!(
            image_filter(&doc, &dict),
            ImageFilter::Unsupported("FlateDecode+DCTDecode".into())
        );
    }

    #[test]
    fn test_ccitt_params() {
        let doc = doc();
        let dict = dictionary! {
            "Filter" => "CCITTFaxDecode",
            "DecodeParms" => dictionary! { "K" => -1i64, "Columns" => 200i64, "Rows" => 50i64 },
        };
        assert_eq!(
            image_filter(&doc, &dict),
            ImageFilter::CcittFax(CcittParams {
                k: -1,
                columns: 200,
                rows: Some(50),
            })
        );
    }

    #[test]
    fn test_color_spaces() {
        let mut doc = doc();
        assert_eq!(color_space(&doc, &Object::Name(b"DeviceRGB".to_vec())), ColorSpace::Rgb);
        assert_eq!(color_space(&doc, &Object::Name(b"DeviceGray".to_vec())), ColorSpace::Gray);

        let icc = doc.add_object(Stream::new(dictionary! { "N" => 3i64 }, vec![]));
        let icc_space = Object::Array(vec![Object::Name(b"ICCBased".to_vec()), icc.into()]);
        assert_eq!(color_space(&doc, &icc_space), ColorSpace::Rgb);

        let indexed_space = Object::Array(vec![
            Object::Name(b"Indexed".to_vec()),
            Object::Name(b"DeviceRGB".to_vec()),
            Object::Integer(1),
            Object::String(vec![0, 0, 0, 255, 128, 0], StringFormat::Hexadecimal),
        ]);
        assert_eq!(
            color_space(&doc, &indexed_space),
            ColorSpace::Indexed {
                palette: vec![[0, 0, 0], [255, 128, 0]]
            }
        );

        assert_eq!(
            color_space(&doc, &Object::Name(b"DeviceCMYK".to_vec())),
            ColorSpace::Other("DeviceCMYK".into())
        );
    }
}
