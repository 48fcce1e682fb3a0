//! Multipart form collection shared by the upload routes.

use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;
use image::ImageFormat;

use crate::errors::AppError;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// One file field plus every plain text field of a multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// The text field, trimmed; `None` when missing or blank.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Checkbox-style flag: `true`, `1`, `on` or `yes`.
    pub fn flag(&self, name: &str) -> bool {
        self.field(name).is_some_and(|v| {
            matches!(
                v.to_ascii_lowercase().as_str(),
                "true" | "1" | "on" | "yes"
            )
        })
    }

    pub fn require_file(&self, field: &str) -> Result<&UploadedFile, AppError> {
        match &self.file {
            Some(file) if !file.bytes.is_empty() => Ok(file),
            _ => Err(AppError::Validation(format!(
                "Please upload a file in the '{field}' field"
            ))),
        }
    }
}

/// Reads the whole form. Only `file_field` is kept as bytes; later duplicates
/// of it replace earlier ones.
pub async fn collect_form(mut multipart: Multipart, file_field: &str) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == file_field {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            form.file = Some(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// PDF magic plus either a `.pdf` name or an `application/pdf` content type.
pub fn is_pdf(file: &UploadedFile) -> bool {
    let named_pdf = file
        .file_name
        .as_deref()
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(".pdf"));
    let typed_pdf = file.content_type.as_deref() == Some("application/pdf");

    file.bytes.starts_with(b"%PDF-") && (named_pdf || typed_pdf)
}

/// Only JPEG and PNG are accepted for captioning, judged by content.
pub fn is_jpeg_or_png(bytes: &[u8]) -> bool {
    matches!(
        image::guess_format(bytes),
        Ok(ImageFormat::Jpeg) | Ok(ImageFormat::Png)
    )
}
