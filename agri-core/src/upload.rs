use std::path::Path;

use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// An image staged for upload to a prediction endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn from_path(path: &Path, max_bytes: u64) -> ApiResult<Self> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > max_bytes {
            return Err(too_large(meta.len(), max_bytes));
        }

        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Self::from_bytes(file_name, bytes, max_bytes)
    }

    pub fn from_bytes(file_name: String, bytes: Vec<u8>, max_bytes: u64) -> ApiResult<Self> {
        if bytes.is_empty() {
            return Err(ApiError::invalid_image("file is empty"));
        }
        if bytes.len() as u64 > max_bytes {
            return Err(too_large(bytes.len() as u64, max_bytes));
        }

        let mime = sniff_mime(&bytes)
            .or_else(|| mime_from_extension(&file_name))
            .ok_or_else(|| {
                ApiError::invalid_image(format!("'{file_name}' is not an image file"))
            })?;

        debug!(file = %file_name, mime, size = bytes.len(), "staged image");
        Ok(Self { file_name, mime, bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn too_large(size: u64, max: u64) -> ApiError {
    ApiError::invalid_image(format!(
        "file is {:.1} MB, the limit is {:.1} MB",
        size as f64 / (1024.0 * 1024.0),
        max as f64 / (1024.0 * 1024.0),
    ))
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"II*\0", "image/tiff"),
        (b"MM\0*", "image/tiff"),
    ];

    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    SIGNATURES.iter().find(|(sig, _)| bytes.starts_with(sig)).map(|(_, mime)| *mime)
}

fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}
