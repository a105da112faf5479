//! In-memory PDF fixtures built with lopdf.

#![allow(dead_code)]

use image::{DynamicImage, ImageOutputFormat, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

/// Builds letter-sized PDFs whose pages share a Helvetica `/F1`.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        PdfBuilder {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    /// Add a page drawing `content`, with `images` registered as XObjects.
    pub fn page(mut self, content: &str, images: Vec<(&str, Stream)>) -> Self {
        let content_id = self.doc.add_object(Stream::new(
            Dictionary::new(),
            content.as_bytes().to_vec(),
        ));
        let mut xobjects = Dictionary::new();
        for (name, stream) in images {
            let id = self.doc.add_object(stream);
            xobjects.set(name, id);
        }
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => self.font_id },
                "XObject" => xobjects,
            },
        });
        self.kids.push(page_id.into());
        self
    }

    /// Add a page with text lines at the given heights, 12pt, from x = 72.
    pub fn text_page(self, lines: &[(&str, f64)]) -> Self {
        let content = text_content(lines);
        self.page(&content, Vec::new())
    }

    pub fn build(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        self.doc.save_to(&mut buf).expect("failed to save test PDF");
        buf
    }
}

pub fn text_content(lines: &[(&str, f64)]) -> String {
    let mut content = String::from("BT /F1 12 Tf\n");
    for (text, y) in lines {
        content.push_str(&format!("1 0 0 1 72 {y} Tm ({text}) Tj\n"));
    }
    content.push_str("ET");
    content
}

/// Image XObject stream with the given filter (or none).
pub fn image_stream(
    width: i64,
    height: i64,
    color_space: &str,
    filter: Option<&str>,
    data: Vec<u8>,
) -> Stream {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8i64,
    };
    if let Some(filter) = filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }
    Stream::new(dict, data)
}

/// A Flate-compressed 8-bit gray image filled with `value`.
pub fn flate_gray_image(width: i64, height: i64, value: u8) -> Stream {
    let data = vec![value; (width * height) as usize];
    let mut stream = image_stream(width, height, "DeviceGray", None, data);
    let _ = stream.compress();
    stream
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbImage::from_pixel(width, height, image::Rgb([90, 30, 200]));
    let img = DynamicImage::ImageRgb8(pixels);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Jpeg(90))
        .expect("failed to encode test JPEG");
    buf.into_inner()
}
