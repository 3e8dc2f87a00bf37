//! Page bitmaps → PDF document.
//!
//! Each bitmap becomes one page whose MediaBox is the bitmap's physical
//! size at the given DPI (`pixels · 72 / dpi` points), with a single image
//! XObject stretched over the whole page.
//!
//! [`PdfAssembler`] is incremental: the driver hands it one page at a time
//! and drops the bitmap immediately afterwards, so only compressed page
//! data accumulates while the document is being built.

use crate::config::ImageEncoding;
use crate::error::InvertError;
use crate::pipeline::render::PDF_POINTS_PER_INCH;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use tracing::debug;

/// Name under which each page references its image.
const IMAGE_NAME: &str = "Im0";

/// Builds an output PDF one page at a time.
pub struct PdfAssembler {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    dpi: u32,
    encoding: ImageEncoding,
}

impl PdfAssembler {
    pub fn new(dpi: u32, encoding: ImageEncoding) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            dpi,
            encoding,
        }
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append `image` as the next page.
    ///
    /// A zero DPI or an empty bitmap would produce a page with no usable
    /// size, so both are rejected.
    pub fn add_page(&mut self, image: &RgbImage) -> Result<(), InvertError> {
        let page_num = self.kids.len() + 1;
        let (width, height) = image.dimensions();
        if self.dpi == 0 {
            return Err(InvertError::InvalidConfig(
                "output DPI must be at least 1".into(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(InvertError::EncodingFailed {
                page: page_num,
                detail: format!("empty bitmap ({width}x{height})"),
            });
        }
        let page_w = points(width, self.dpi);
        let page_h = points(height, self.dpi);

        let image_stream = encode_image(image, self.encoding, page_num)?;
        let image_id = self.doc.add_object(image_stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(page_w),
                        0.into(),
                        0.into(),
                        Object::Real(page_h),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| InvertError::PdfWriteFailed(format!("page {page_num} content: {e}")))?;
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(page_w), Object::Real(page_h)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
        });
        self.kids.push(page_id.into());

        debug!(
            "Embedded page {} ({}x{} px → {:.1}x{:.1} pt)",
            page_num, width, height, page_w, page_h
        );
        Ok(())
    }

    /// Serialise the document.
    ///
    /// Fails with [`InvertError::EmptyInput`] if no page was added.
    pub fn finish(mut self) -> Result<Vec<u8>, InvertError> {
        if self.kids.is_empty() {
            return Err(InvertError::EmptyInput);
        }

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
        self.doc
            .save_to(&mut buf)
            .map_err(|e| InvertError::PdfWriteFailed(e.to_string()))?;
        Ok(buf)
    }
}

/// Assemble a complete PDF from page bitmaps in order.
pub fn assemble(
    images: &[RgbImage],
    dpi: u32,
    encoding: ImageEncoding,
) -> Result<Vec<u8>, InvertError> {
    let mut assembler = PdfAssembler::new(dpi, encoding);
    for image in images {
        assembler.add_page(image)?;
    }
    assembler.finish()
}

/// Pixel count → PDF points at `dpi`.
fn points(pixels: u32, dpi: u32) -> f32 {
    pixels as f32 * PDF_POINTS_PER_INCH / dpi as f32
}

fn encode_image(
    image: &RgbImage,
    encoding: ImageEncoding,
    page: usize,
) -> Result<Stream, InvertError> {
    let (width, height) = image.dimensions();
    let (filter, data) = match encoding {
        ImageEncoding::Flate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            let data = encoder
                .write_all(image.as_raw())
                .and_then(|_| encoder.finish())
                .map_err(|e| InvertError::EncodingFailed {
                    page,
                    detail: e.to_string(),
                })?;
            ("FlateDecode", data)
        }
        ImageEncoding::Jpeg { quality } => {
            let mut data = Vec::new();
            JpegEncoder::new_with_quality(&mut data, quality)
                .encode_image(image)
                .map_err(|e| InvertError::EncodingFailed {
                    page,
                    detail: e.to_string(),
                })?;
            ("DCTDecode", data)
        }
    };

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => filter,
    };
    Ok(Stream::new(dict, data).with_compression(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    fn media_box(doc: &Document, page_id: ObjectId) -> Vec<f32> {
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    fn page_image<'a>(doc: &'a Document, page_id: ObjectId) -> &'a Stream {
        let page = doc.get_dictionary(page_id).unwrap();
        let xobjects = page
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"XObject")
            .unwrap()
            .as_dict()
            .unwrap();
        let id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
        doc.get_object(id).unwrap().as_stream().unwrap()
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let err = assemble(&[], 300, ImageEncoding::Flate).unwrap_err();
        assert!(matches!(err, InvertError::EmptyInput));
        assert!(matches!(
            PdfAssembler::new(72, ImageEncoding::Flate).finish(),
            Err(InvertError::EmptyInput)
        ));
    }

    #[test]
    fn zero_dpi_is_rejected() {
        let err = assemble(&[solid(4, 4, 0)], 0, ImageEncoding::Flate).unwrap_err();
        assert!(matches!(err, InvertError::InvalidConfig(_)));

        let mut asm = PdfAssembler::new(0, ImageEncoding::Flate);
        assert!(asm.add_page(&solid(4, 4, 0)).is_err());
        assert_eq!(asm.page_count(), 0);
    }

    #[test]
    fn empty_bitmap_is_rejected() {
        for img in [RgbImage::new(0, 10), RgbImage::new(10, 0)] {
            let err = assemble(&[solid(4, 4, 0), img], 72, ImageEncoding::Flate).unwrap_err();
            assert!(matches!(err, InvertError::EncodingFailed { page: 2, .. }));
        }
    }

    #[test]
    fn page_size_follows_dpi() {
        // 2550x3300 px at 300 DPI is US Letter.
        let pdf = assemble(&[solid(2550, 3300, 0)], 300, ImageEncoding::Flate).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let mb = media_box(&doc, pages[&1]);
        assert_eq!(mb[0], 0.0);
        assert_eq!(mb[1], 0.0);
        assert!((mb[2] - 612.0).abs() < 0.01);
        assert!((mb[3] - 792.0).abs() < 0.01);
    }

    #[test]
    fn pages_keep_input_order() {
        let images: Vec<RgbImage> = (1..=4).map(|i| solid(10 * i, 20, 0)).collect();
        let pdf = assemble(&images, 72, ImageEncoding::Flate).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 4);
        for (num, id) in pages {
            let stream = page_image(&doc, id);
            let w = stream.dict.get(b"Width").unwrap().as_i64().unwrap();
            assert_eq!(w, 10 * num as i64);
            let mb = media_box(&doc, id);
            assert!((mb[2] - 10.0 * num as f32).abs() < 0.01);
        }
    }

    #[test]
    fn flate_image_round_trips_pixels() {
        let mut img = solid(3, 2, 0);
        img.put_pixel(1, 0, Rgb([10, 200, 30]));
        let pdf = assemble(&[img.clone()], 72, ImageEncoding::Flate).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let stream = page_image(&doc, doc.get_pages()[&1]);
        assert_eq!(
            stream.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"FlateDecode"
        );
        let raw = stream.decompressed_content().unwrap();
        assert_eq!(raw, img.into_raw());
    }

    #[test]
    fn jpeg_encoding_uses_dct() {
        let pdf = assemble(
            &[solid(16, 16, 128)],
            150,
            ImageEncoding::Jpeg { quality: 80 },
        )
        .unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        let stream = page_image(&doc, doc.get_pages()[&1]);
        assert_eq!(
            stream.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"DCTDecode"
        );
        assert_eq!(&stream.content[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn incremental_page_count() {
        let mut asm = PdfAssembler::new(96, ImageEncoding::Flate);
        assert_eq!(asm.page_count(), 0);
        asm.add_page(&solid(8, 8, 255)).unwrap();
        asm.add_page(&solid(8, 8, 0)).unwrap();
        assert_eq!(asm.page_count(), 2);
        let pdf = asm.finish().unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));
    }
}
