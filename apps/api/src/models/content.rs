use serde::Serialize;

/// Text and raw image blobs pulled out of a résumé PDF.
///
/// `text` is the per-page text concatenated in page order. `images` keeps page
/// order, then the order images are listed on each page; repeats are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    pub images: Vec<Vec<u8>>,
}

/// Preview returned to the caller after an upload.
#[derive(Debug, Serialize)]
pub struct ExtractionPreview {
    pub text: String,
    pub image_count: usize,
    pub image_bytes: usize,
}

impl From<&ExtractedContent> for ExtractionPreview {
    fn from(content: &ExtractedContent) -> Self {
        Self {
            text: content.text.clone(),
            image_count: content.images.len(),
            image_bytes: content.images.iter().map(Vec::len).sum(),
        }
    }
}
