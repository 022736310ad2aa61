pub mod local_store;
pub mod s3_service;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("S3 error: {0}")]
    S3(String),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Reference to an image that has been durably written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub key: String,
    pub mime_type: Option<&'static str>,
}

/// Blob store for uploaded report photos.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists `data` and returns its key once the write is durable.
    async fn save(&self, original_filename: &str, data: &[u8]) -> Result<StoredImage, StorageError>;
}

pub fn calculate_image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

pub fn sniff_mime_type(image_data: &[u8]) -> Option<&'static str> {
    image::guess_format(image_data)
        .ok()
        .map(|format| format.to_mime_type())
}

/// Picks the stored extension: the uploader's if it looks sane, else one derived from the bytes.
pub fn file_extension(original_filename: &str, image_data: &[u8]) -> String {
    let from_name = original_filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_name {
        return ext.to_ascii_lowercase();
    }

    image::guess_format(image_data)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin")
        .to_string()
}

/// Content-addressed key, so distinct uploads never collide and repeats are idempotent.
pub fn generate_image_key(original_filename: &str, image_data: &[u8]) -> String {
    format!(
        "{}.{}",
        calculate_image_hash(image_data),
        file_extension(original_filename, image_data)
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x02\0\0\0";
    pub const JPEG_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0\x01\x01\0\0\x01\0\x01\0\0";
}

#[cfg(test)]
mod tests {
    use super::test_support::{JPEG_BYTES, PNG_BYTES};
    use super::*;

    #[test]
    fn keeps_uploader_extension_lowercased() {
        assert_eq!(file_extension("dump.JPG", PNG_BYTES), "jpg");
    }

    #[test]
    fn falls_back_to_sniffed_extension() {
        assert_eq!(file_extension("photo", PNG_BYTES), "png");
        assert_eq!(file_extension("../../etc/passwd", JPEG_BYTES), "jpg");
        assert_eq!(file_extension("weird.ph p", PNG_BYTES), "png");
    }

    #[test]
    fn unknown_bytes_get_bin() {
        assert_eq!(file_extension("noext", b"hello"), "bin");
    }

    #[test]
    fn keys_are_content_addressed() {
        let a = generate_image_key("a.png", PNG_BYTES);
        let b = generate_image_key("b.png", PNG_BYTES);
        let c = generate_image_key("a.png", JPEG_BYTES);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64 + ".png".len());
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_mime_type(PNG_BYTES), Some("image/png"));
        assert_eq!(sniff_mime_type(JPEG_BYTES), Some("image/jpeg"));
        assert_eq!(sniff_mime_type(b"not an image"), None);
    }
}
