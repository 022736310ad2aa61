use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{generate_image_key, sniff_mime_type, ImageStore, StorageError, StoredImage};

const KEY_PREFIX: &str = "images";

/// S3-backed image store. Public URLs come from the bucket's configured base address.
#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket_name: String,
}

impl S3ImageStore {
    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }

    pub fn object_key(original_filename: &str, image_data: &[u8]) -> String {
        format!("{}/{}", KEY_PREFIX, generate_image_key(original_filename, image_data))
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn save(&self, original_filename: &str, data: &[u8]) -> Result<StoredImage, StorageError> {
        let key = Self::object_key(original_filename, data);
        let mime_type = sniff_mime_type(data);
        let body = ByteStream::from(data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(body)
            .content_type(mime_type.unwrap_or("application/octet-stream"))
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        log::debug!("Uploaded image to s3://{}/{}", self.bucket_name, key);
        Ok(StoredImage { key, mime_type })
    }
}
