//! Résumé extractor: pulls plain text and embedded raster images out of a PDF.
//!
//! Text comes straight from lopdf's per-page extraction; no normalization or
//! layout reconstruction is attempted.
//!
//! Images are returned as standalone image files. JPEG streams (`DCTDecode`)
//! are passed through untouched. Everything else is a bag of raw samples
//! inside the PDF, so it is decoded from Width/Height/ColorSpace/BitsPerComponent
//! and re-encoded as PNG. Images drawn through Form XObjects are included.
//! Images that cannot be decoded are skipped.

use std::io::{Cursor, Read, Seek, SeekFrom};

use image::{DynamicImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;
use tracing::{debug, trace};

use crate::models::content::ExtractedContent;

/// Guard against cyclic `Parent` chains in malformed page trees.
const MAX_PAGE_TREE_DEPTH: usize = 32;
/// Guard against cyclic or runaway Form XObject nesting.
const MAX_FORM_DEPTH: usize = 8;
const MAX_IMAGE_PIXELS: u64 = 40_000_000;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The upload is not a well-formed PDF. Surfaced verbatim to the user.
    #[error("Could not read PDF: {0}")]
    Parse(String),

    #[error("I/O error while reading document: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts text and images from a seekable PDF stream.
///
/// The stream is rewound first: callers often read part of an upload for a
/// preview before handing it over.
pub fn extract<R: Read + Seek>(reader: &mut R) -> Result<ExtractedContent, ExtractError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    extract_bytes(&bytes)
}

/// Extracts text and images from an in-memory PDF.
pub fn extract_bytes(bytes: &[u8]) -> Result<ExtractedContent, ExtractError> {
    let mut doc = Document::load_mem(bytes).map_err(|e| ExtractError::Parse(e.to_string()))?;

    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|_| ExtractError::Parse("document is password protected".to_string()))?;
        debug!("Decrypted PDF with empty password");
    }

    // BTreeMap keyed by page number, so iteration is document order.
    let pages = doc.get_pages();
    let mut content = ExtractedContent::default();

    for (page_num, page_id) in &pages {
        let page_text = doc.extract_text(&[*page_num]).unwrap_or_else(|e| {
            debug!("No extractable text on page {page_num}: {e}");
            String::new()
        });
        content.text.push_str(&page_text);

        let images = page_images(&doc, *page_id);
        trace!("Page {page_num}: {} chars, {} images", page_text.len(), images.len());
        content.images.extend(images);
    }

    debug!(
        "Extracted {} chars and {} images from {} pages",
        content.text.len(),
        content.images.len(),
        pages.len()
    );

    Ok(content)
}

/// Every image reachable from the page's resources, in listing order. An
/// image listed under two names is returned twice.
fn page_images(doc: &Document, page_id: ObjectId) -> Vec<Vec<u8>> {
    let mut images = Vec::new();
    if let Some(resources) = page_resources(doc, page_id) {
        collect_images(doc, resources, 0, &mut images);
    }
    images
}

/// Walks a resources dictionary's XObjects, descending into Form XObjects
/// where they are listed.
fn collect_images(doc: &Document, resources: &Dictionary, depth: usize, out: &mut Vec<Vec<u8>>) {
    if depth > MAX_FORM_DEPTH {
        debug!("Form XObjects nested deeper than {MAX_FORM_DEPTH}; not descending");
        return;
    }
    let Ok(xobjects) = resources.get(b"XObject") else {
        return;
    };
    let Ok((_, Object::Dictionary(xobjects))) = doc.dereference(xobjects) else {
        return;
    };

    for (name, obj) in xobjects.iter() {
        let Ok((_, Object::Stream(stream))) = doc.dereference(obj) else {
            continue;
        };
        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => match encode_image(doc, stream) {
                Some(bytes) => out.push(bytes),
                None => debug!(
                    "Skipping image /{} that could not be decoded",
                    String::from_utf8_lossy(name)
                ),
            },
            Ok(b"Form") => {
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .and_then(|r| doc.dereference(r));
                if let Ok((_, Object::Dictionary(form_resources))) = form_resources {
                    collect_images(doc, form_resources, depth + 1, out);
                }
            }
            _ => {}
        }
    }
}

/// Filter names in application order. A single name is a one-element list.
fn filters(dict: &Dictionary) -> Vec<&[u8]> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_name().ok()).collect(),
        _ => Vec::new(),
    }
}

/// The image as a standalone file: JPEG as stored, anything else as PNG.
fn encode_image(doc: &Document, stream: &Stream) -> Option<Vec<u8>> {
    let dict = &stream.dict;
    let filters = filters(dict);

    match filters.last().copied() {
        Some(b"DCTDecode") if filters.len() == 1 => return Some(stream.content.clone()),
        Some(b"DCTDecode" | b"JPXDecode" | b"CCITTFaxDecode" | b"JBIG2Decode") => return None,
        _ => {}
    }
    if dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false)
    {
        return None;
    }

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
        return None;
    }
    let bits = u8::try_from(
        dict.get(b"BitsPerComponent")
            .and_then(Object::as_i64)
            .unwrap_or(8),
    )
    .ok()?;
    let color = ColorModel::resolve(doc, dict.get(b"ColorSpace").ok()?)?;

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().ok()?
    };

    let rgb = samples_to_rgb(&samples, width, height, bits, &color)?;
    let buffer = RgbImage::from_raw(width, height, rgb)?;

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(buffer)
        .write_to(&mut png, ImageFormat::Png)
        .ok()?;
    Some(png.into_inner())
}

#[derive(Debug, Clone, PartialEq)]
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of 8-bit entries in the base space, one index per sample.
    Indexed { base: Box<ColorModel>, lookup: Vec<u8> },
}

impl ColorModel {
    fn resolve(doc: &Document, obj: &Object) -> Option<Self> {
        let (_, obj) = doc.dereference(obj).ok()?;
        match obj {
            Object::Name(name) => Self::from_name(name),
            Object::Array(items) => match items.first()?.as_name().ok()? {
                b"ICCBased" => {
                    let (_, profile) = doc.dereference(items.get(1)?).ok()?;
                    let Object::Stream(profile) = profile else {
                        return None;
                    };
                    match profile.dict.get(b"N").and_then(Object::as_i64).ok()? {
                        1 => Some(ColorModel::Gray),
                        3 => Some(ColorModel::Rgb),
                        4 => Some(ColorModel::Cmyk),
                        _ => None,
                    }
                }
                b"Indexed" | b"I" => {
                    let base = Self::resolve(doc, items.get(1)?)?;
                    if matches!(base, ColorModel::Indexed { .. }) {
                        return None;
                    }
                    let lookup = lookup_table(doc, items.get(3)?)?;
                    Some(ColorModel::Indexed {
                        base: Box::new(base),
                        lookup,
                    })
                }
                b"CalGray" => Some(ColorModel::Gray),
                b"CalRGB" => Some(ColorModel::Rgb),
                _ => None,
            },
            _ => None,
        }
    }

    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Some(ColorModel::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(ColorModel::Rgb),
            b"DeviceCMYK" | b"CMYK" => Some(ColorModel::Cmyk),
            _ => None,
        }
    }

    fn components(&self) -> usize {
        match self {
            ColorModel::Gray | ColorModel::Indexed { .. } => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }

    /// Appends one RGB pixel. `max` is the largest sample value at the
    /// image's bit depth.
    fn push_rgb(&self, pixel: &[u16], max: u16, out: &mut Vec<u8>) -> Option<()> {
        let scale = |v: u16| (u32::from(v.min(max)) * 255 / u32::from(max)) as u8;
        match self {
            ColorModel::Gray => {
                let g = scale(pixel[0]);
                out.extend([g, g, g]);
            }
            ColorModel::Rgb => out.extend(pixel.iter().map(|&v| scale(v))),
            ColorModel::Cmyk => {
                let k = 255 - u32::from(scale(pixel[3]));
                for &v in &pixel[..3] {
                    out.push(((255 - u32::from(scale(v))) * k / 255) as u8);
                }
            }
            ColorModel::Indexed { base, lookup } => {
                let n = base.components();
                let start = usize::from(pixel[0]) * n;
                let entry: Vec<u16> = lookup
                    .get(start..start + n)?
                    .iter()
                    .map(|&b| u16::from(b))
                    .collect();
                base.push_rgb(&entry, 255, out)?;
            }
        }
        Some(())
    }
}

fn lookup_table(doc: &Document, obj: &Object) -> Option<Vec<u8>> {
    match doc.dereference(obj).ok()?.1 {
        Object::String(bytes, _) => Some(bytes.clone()),
        Object::Stream(stream) if filters(&stream.dict).is_empty() => Some(stream.content.clone()),
        Object::Stream(stream) => stream.decompressed_content().ok(),
        _ => None,
    }
}

/// Reads packed samples MSB-first; rows are padded to a whole byte.
struct SampleReader<'a> {
    row: &'a [u8],
    bits: usize,
    offset: usize,
}

impl<'a> SampleReader<'a> {
    fn new(row: &'a [u8], bits: u8) -> Self {
        Self {
            row,
            bits: usize::from(bits),
            offset: 0,
        }
    }

    fn next_sample(&mut self) -> Option<u16> {
        let byte = *self.row.get(self.offset / 8)?;
        let value = if self.bits == 8 {
            u16::from(byte)
        } else {
            let shift = 8 - self.bits - self.offset % 8;
            u16::from((byte >> shift) & ((1u8 << self.bits) - 1))
        };
        self.offset += self.bits;
        Some(value)
    }
}

fn samples_to_rgb(
    samples: &[u8],
    width: u32,
    height: u32,
    bits: u8,
    color: &ColorModel,
) -> Option<Vec<u8>> {
    if !matches!(bits, 1 | 2 | 4 | 8) {
        return None;
    }
    let (width, height) = (width as usize, height as usize);
    let per_pixel = color.components();
    let row_bytes = (width * per_pixel * usize::from(bits)).div_ceil(8);
    if samples.len() < row_bytes * height {
        trace!(
            "Image data too short: {} bytes for {width}x{height}",
            samples.len()
        );
        return None;
    }

    let max = (1u16 << bits) - 1;
    let mut rgb = Vec::with_capacity(width * height * 3);
    let mut pixel = Vec::with_capacity(per_pixel);
    for row in samples.chunks_exact(row_bytes).take(height) {
        let mut reader = SampleReader::new(row, bits);
        for _ in 0..width {
            pixel.clear();
            for _ in 0..per_pixel {
                pixel.push(reader.next_sample()?);
            }
            color.push_rgb(&pixel, max, &mut rgb)?;
        }
    }
    Some(rgb)
}

/// Resources dictionary for a page, walking up the page tree for inherited
/// resources.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node_id = page_id;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let Ok(Object::Dictionary(node)) = doc.get_object(node_id) else {
            return None;
        };
        if let Ok(resources) = node.get(b"Resources") {
            if let Ok((_, Object::Dictionary(dict))) = doc.dereference(resources) {
                return Some(dict);
            }
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node_id = *parent_id,
            _ => return None,
        }
    }
    None
}
