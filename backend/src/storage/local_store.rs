use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{generate_image_key, sniff_mime_type, ImageStore, StorageError, StoredImage};

/// Filesystem image store; the directory is what `/static` serves.
#[derive(Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, original_filename: &str, data: &[u8]) -> Result<StoredImage, StorageError> {
        let key = generate_image_key(original_filename, data);
        let final_path = self.path_for(&key)?;
        let temp_path = self.root.join(format!(".{}.tmp", Uuid::new_v4()));

        let write_result = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&temp_path, &final_path).await
        }
        .await;

        if let Err(e) = write_result {
            log::error!("Failed to write image {}: {}", final_path.display(), e);
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        log::debug!("Stored image {} ({} bytes)", key, data.len());
        Ok(StoredImage {
            key,
            mime_type: sniff_mime_type(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::PNG_BYTES;
    use tempfile::TempDir;

    fn read(dir: &TempDir, key: &str) -> Vec<u8> {
        std::fs::read(dir.path().join(key)).unwrap()
    }

    #[tokio::test]
    async fn save_writes_bytes_under_generated_key() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path()).unwrap();

        let stored = store.save("garbage.png", PNG_BYTES).await.unwrap();

        assert!(stored.key.ends_with(".png"));
        assert_eq!(stored.mime_type, Some("image/png"));
        assert_eq!(read(&dir, &stored.key), PNG_BYTES);
    }

    #[tokio::test]
    async fn same_filename_different_content_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path()).unwrap();

        let first = store.save("photo.jpg", b"first upload").await.unwrap();
        let second = store.save("photo.jpg", b"second upload").await.unwrap();

        assert_ne!(first.key, second.key);
        assert_eq!(read(&dir, &first.key), b"first upload");
        assert_eq!(read(&dir, &second.key), b"second upload");
    }

    #[tokio::test]
    async fn leaves_no_temporary_files() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path()).unwrap();
        store.save("a.png", PNG_BYTES).await.unwrap();
        store.save("b.png", PNG_BYTES).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!names[0].ends_with(".tmp"));
    }

    #[tokio::test]
    async fn write_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("uploads");
        let store = LocalImageStore::new(&uploads).unwrap();
        std::fs::remove_dir_all(&uploads).unwrap();

        let result = store.save("a.png", PNG_BYTES).await;
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn path_for_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalImageStore::new(dir.path()).unwrap();
        assert!(matches!(store.path_for("../secret"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(store.path_for(".hidden"), Err(StorageError::InvalidKey(_))));
        assert!(store.path_for("abc.png").is_ok());
    }
}
