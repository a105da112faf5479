//! Image codec selection and decoding.
//!
//! Each filter maps to one output kind: DCT to JPEG, JPX to JPEG 2000, CCITT
//! to TIFF, and raw or inflated samples to PNG. JPEG 2000 data is not decoded;
//! only its header is read for the dimensions.

use crate::error::MissiveError;
use crate::model::{
    Bitmap, CcittParams, ColorSpace, DecodedImage, ImageFilter, ImageKind, ImageObject,
};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

/// Decode an image object into a bitmap according to its filter.
pub fn decode(object: &ImageObject) -> Result<DecodedImage, MissiveError> {
    let (format, bitmap) = match &object.filter {
        ImageFilter::Raw | ImageFilter::Flate => (ImageKind::Png, decode_samples(object)?),
        ImageFilter::Dct => (ImageKind::Jpeg, decode_jpeg(object)?),
        ImageFilter::Jpx => (ImageKind::Jpeg2000, read_jpx(object)?),
        ImageFilter::CcittFax(params) => (ImageKind::Tiff, decode_ccitt(object, params)?),
        ImageFilter::Unsupported(filter) => {
            return Err(MissiveError::UnsupportedCodec {
                filter: filter.clone(),
            })
        }
    };

    log::debug!(
        "decoded image {} ({}) as {format}",
        object.name,
        object.filter.name()
    );
    Ok(DecodedImage {
        filename: format!("{}{}", file_stem(&object.name), format.extension()),
        format,
        bitmap,
    })
}

/// File-name stem for an XObject resource key. Path separators, control
/// characters and `..` become `_` so the name stays inside its directory.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.replace("..", "__");
    match stem.strip_prefix('.') {
        Some(rest) => format!("_{rest}"),
        None if stem.is_empty() => "image".to_string(),
        None => stem,
    }
}

fn decode_error(object: &ImageObject, reason: impl Into<String>) -> MissiveError {
    MissiveError::ImageDecode {
        name: object.name.clone(),
        reason: reason.into(),
    }
}

fn decode_jpeg(object: &ImageObject) -> Result<Bitmap, MissiveError> {
    image::load_from_memory_with_format(&object.raw_bytes, ImageFormat::Jpeg)
        .map(Bitmap::Pixels)
        .map_err(|e| decode_error(object, e.to_string()))
}

/// Unpack uncompressed samples into an 8-bit bitmap.
fn decode_samples(object: &ImageObject) -> Result<Bitmap, MissiveError> {
    let (width, height) = (object.width, object.height);
    if width == 0 || height == 0 {
        return Err(decode_error(object, "image has a zero dimension"));
    }
    let bpc = object.bits_per_component;
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Err(decode_error(
            object,
            format!("unsupported bits per component: {bpc}"),
        ));
    }

    let components = object.color_space.components();
    let per_row = (width as usize).saturating_mul(components);
    let row_bytes = per_row.saturating_mul(bpc as usize).div_ceil(8);
    let needed = row_bytes.saturating_mul(height as usize);
    if object.raw_bytes.len() < needed {
        return Err(decode_error(
            object,
            format!(
                "sample data too short: expected {needed} bytes, found {}",
                object.raw_bytes.len()
            ),
        ));
    }

    // Palette lookups need the raw index, everything else is scaled to 8 bits.
    let indexed = matches!(object.color_space, ColorSpace::Indexed { .. });
    let mut samples = Vec::with_capacity(per_row * height as usize);
    for row in object.raw_bytes[..needed].chunks(row_bytes) {
        for i in 0..per_row {
            samples.push(sample_at(row, i, bpc, !indexed));
        }
    }

    let pixels = match &object.color_space {
        ColorSpace::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        ColorSpace::Indexed { palette } => {
            let rgb: Vec<u8> = samples
                .iter()
                .flat_map(|&index| palette.get(usize::from(index)).copied().unwrap_or([0, 0, 0]))
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Gray | ColorSpace::Other(_) => {
            GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8)
        }
    };
    pixels
        .map(Bitmap::Pixels)
        .ok_or_else(|| decode_error(object, "sample buffer does not match dimensions"))
}

/// Read sample `index` of a packed row. 16-bit samples keep their high byte.
fn sample_at(row: &[u8], index: usize, bpc: u8, scale: bool) -> u8 {
    match bpc {
        8 => row[index],
        16 => row[index * 2],
        _ => {
            let bit = index * bpc as usize;
            let byte = row[bit / 8];
            let shift = 8 - bpc as usize - bit % 8;
            let max = (1u16 << bpc) - 1;
            let value = (u16::from(byte) >> shift) & max;
            if scale {
                (value * 255 / max) as u8
            } else {
                value as u8
            }
        }
    }
}

fn read_jpx(object: &ImageObject) -> Result<Bitmap, MissiveError> {
    let (width, height) = jpx_dimensions(&object.raw_bytes)
        .ok_or_else(|| decode_error(object, "no JP2 header or SIZ marker found"))?;
    Ok(Bitmap::Jpeg2000 {
        data: object.raw_bytes.clone(),
        width,
        height,
    })
}

const JPX_SOC_SIZ: [u8; 4] = [0xff, 0x4f, 0xff, 0x51];

/// Image dimensions from a JP2 file (`jp2h/ihdr`) or a raw codestream (`SIZ`).
pub fn jpx_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.starts_with(&JPX_SOC_SIZ) {
        return siz_dimensions(data);
    }
    jp2_box_dimensions(data)
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

fn siz_dimensions(codestream: &[u8]) -> Option<(u32, u32)> {
    // SOC, SIZ marker, Lsiz, Rsiz, then Xsiz Ysiz XOsiz YOsiz
    let xsiz = be_u32(codestream, 8)?;
    let ysiz = be_u32(codestream, 12)?;
    let xosiz = be_u32(codestream, 16)?;
    let yosiz = be_u32(codestream, 20)?;
    Some((xsiz.checked_sub(xosiz)?, ysiz.checked_sub(yosiz)?))
}

fn jp2_box_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 0;
    while pos + 8 <= data.len() {
        let length = be_u32(data, pos)? as usize;
        let kind = &data[pos + 4..pos + 8];
        let (header, size) = match length {
            0 => (8, data.len() - pos),
            1 => {
                let bytes: [u8; 8] = data.get(pos + 8..pos + 16)?.try_into().ok()?;
                (16, usize::try_from(u64::from_be_bytes(bytes)).ok()?)
            }
            n => (8, n),
        };
        if size < header {
            return None;
        }
        let end = pos.checked_add(size)?.min(data.len());
        let body = data.get(pos + header..end)?;
        match kind {
            b"jp2h" => {
                if let Some(dims) = jp2_box_dimensions(body) {
                    return Some(dims);
                }
            }
            b"ihdr" => {
                let height = be_u32(body, 0)?;
                let width = be_u32(body, 4)?;
                return Some((width, height));
            }
            b"jp2c" if body.starts_with(&JPX_SOC_SIZ) => return siz_dimensions(body),
            _ => {}
        }
        pos = end;
    }
    None
}

/// Largest bilevel image decoded, in pixels (one byte each once unpacked).
const MAX_BILEVEL_PIXELS: u64 = 1 << 27;

/// Decode CCITT Group 3 or 4 data into an 8-bit gray bitmap.
///
/// `/Columns` and `/Rows` must agree with the image's `/Width` and `/Height`.
/// Rows missing at the end of the data are left white.
fn decode_ccitt(object: &ImageObject, params: &CcittParams) -> Result<Bitmap, MissiveError> {
    let (columns, height) = (object.width, object.height);
    if params.columns != columns {
        return Err(decode_error(
            object,
            format!("/Columns {} does not match /Width {columns}", params.columns),
        ));
    }
    if let Some(rows) = params.rows.filter(|&rows| rows != height) {
        return Err(decode_error(
            object,
            format!("/Rows {rows} does not match /Height {height}"),
        ));
    }
    let width = u16::try_from(columns)
        .map_err(|_| decode_error(object, format!("too many columns: {columns}")))?;
    if width == 0 || height == 0 {
        return Err(decode_error(object, "image has a zero dimension"));
    }
    if u64::from(columns) * u64::from(height) > MAX_BILEVEL_PIXELS {
        return Err(decode_error(
            object,
            format!("{columns}x{height} exceeds the bilevel pixel limit"),
        ));
    }
    let row_limit = u16::try_from(height).ok();

    let mut pixels = Vec::new();
    let mut rows = 0u32;
    let mut push_line = |transitions: &[u16]| {
        if rows < height {
            push_row(&mut pixels, width, transitions);
            rows += 1;
        }
    };

    let bytes = object.raw_bytes.iter().copied();
    let finished = if params.k < 0 {
        fax::decoder::decode_g4(bytes, width, row_limit, &mut push_line)
    } else {
        fax::decoder::decode_g3(bytes, &mut push_line)
    };

    if rows == 0 {
        return Err(decode_error(object, "CCITT decoder produced no rows"));
    }
    if finished.is_none() || rows < height {
        log::debug!(
            "CCITT data of {} ended early after {rows} of {height} rows",
            object.name
        );
    }
    pixels.resize(usize::from(width) * height as usize, 255);
    GrayImage::from_raw(columns, height, pixels)
        .map(|img| Bitmap::Pixels(DynamicImage::ImageLuma8(img)))
        .ok_or_else(|| decode_error(object, "CCITT rows do not match dimensions"))
}

/// Append one row of `width` pixels. Runs alternate starting with white and
/// each transition flips the colour.
fn push_row(pixels: &mut Vec<u8>, width: u16, transitions: &[u16]) {
    let start = pixels.len();
    let mut x = 0u16;
    let mut black = false;
    for &t in transitions {
        let end = t.min(width).max(x);
        let value = if black { 0 } else { 255 };
        pixels.extend(std::iter::repeat(value).take(usize::from(end - x)));
        x = end;
        black = !black;
    }
    let value = if black { 0 } else { 255 };
    pixels.resize(start + usize::from(width), value);
}
