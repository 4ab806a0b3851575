use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::tiling::PageGeometry;

const JPEG_QUALITY: u8 = 92;
const IMAGE_NAME: &str = "Im0";

pub fn encode_jpeg(bitmap: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder
        .encode_image(bitmap)
        .context("failed encoding report bitmap as JPEG")?;
    Ok(bytes)
}

/// A paginated document that shows one tall image across as many pages as it
/// needs. The image is stored once and referenced from every page.
pub struct TiledPdf {
    document: Document,
    pages: usize,
}

impl TiledPdf {
    pub fn assemble(
        jpeg: Vec<u8>,
        bitmap_width: u32,
        bitmap_height: u32,
        geometry: &PageGeometry,
    ) -> Result<Self> {
        anyhow::ensure!(
            bitmap_width > 0 && bitmap_height > 0,
            "report bitmap is empty ({bitmap_width}x{bitmap_height})"
        );
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(bitmap_width),
                "Height" => i64::from(bitmap_height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = document.add_object(image);

        let image_height = geometry.scaled_height(bitmap_width, bitmap_height);
        let offsets = geometry.tile_offsets(image_height);
        let mut kids: Vec<Object> = Vec::with_capacity(offsets.len());
        for offset in &offsets {
            let page_id = add_page(
                &mut document,
                pages_id,
                image_id,
                geometry,
                image_height,
                *offset,
            )?;
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => offsets.len() as i64,
        };
        document.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        Ok(Self {
            document,
            pages: offsets.len(),
        })
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn save(mut self, path: &Path) -> Result<()> {
        self.document
            .save(path)
            .with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }
}

/// `offset` is the top of the image relative to the top of the page, in
/// points, growing downwards. PDF space grows upwards from the bottom edge.
fn add_page(
    document: &mut Document,
    pages_id: ObjectId,
    image_id: ObjectId,
    geometry: &PageGeometry,
    image_height: f64,
    offset: f64,
) -> Result<ObjectId> {
    let bottom = geometry.height_pt - offset - image_height;
    let content = format!(
        "q\n{:.4} 0 0 {:.4} 0 {:.4} cm\n/{IMAGE_NAME} Do\nQ\n",
        geometry.width_pt, image_height, bottom
    );
    let content_id = document.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0_i64.into(),
            0_i64.into(),
            Object::Real(geometry.width_pt as _),
            Object::Real(geometry.height_pt as _),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_NAME => image_id,
            },
        },
    };
    Ok(document.add_object(page))
}
