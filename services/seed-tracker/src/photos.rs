use crate::errors::{Result, SeedTrackerError};
use crate::metrics;
use crate::models::{NewPhoto, PhotoUploadResponse};
use crate::storage::InventoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const PHOTO_DIR: &str = "batch_photos";
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff"];

/// File received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Stores batch photos under `<media_root>/batch_photos` and records them.
pub struct PhotoStorage {
    store: Arc<dyn InventoryStore>,
    media_root: PathBuf,
    max_upload_bytes: usize,
}

impl PhotoStorage {
    pub fn new(store: Arc<dyn InventoryStore>, media_root: PathBuf, max_upload_bytes: usize) -> Self {
        PhotoStorage {
            store,
            media_root,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Validate every file first, then write and record them one by one.
    pub async fn upload(&self, batch_id: i64, files: Vec<UploadedFile>) -> Result<PhotoUploadResponse> {
        if files.is_empty() {
            return Err(SeedTrackerError::Upload(
                "Please select at least one image.".to_string(),
            ));
        }

        let mut prepared = Vec::with_capacity(files.len());
        for file in files {
            if file.bytes.len() > self.max_upload_bytes {
                return Err(SeedTrackerError::Upload(format!(
                    "{}: File too large (max {} bytes).",
                    file.file_name, self.max_upload_bytes
                )));
            }
            let extension = image_extension(&file.file_name)?;
            prepared.push((extension, file.bytes));
        }

        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or(SeedTrackerError::BatchNotFound(batch_id))?;

        let dir = self.media_root.join(PHOTO_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let mut uploaded = Vec::with_capacity(prepared.len());
        for (extension, bytes) in prepared {
            let name = format!("{}.{}", Uuid::new_v4(), extension);
            let path = dir.join(&name);
            tokio::fs::write(&path, &bytes).await?;

            let photo = match self
                .store
                .insert_photo(&NewPhoto {
                    batch_id,
                    image_path: format!("{}/{}", PHOTO_DIR, name),
                })
                .await
            {
                Ok(photo) => photo,
                Err(e) => {
                    // unrecorded files are not kept
                    if let Err(io_err) = tokio::fs::remove_file(&path).await {
                        warn!("Failed to remove unrecorded photo {}: {}", path.display(), io_err);
                    }
                    return Err(e);
                }
            };
            metrics::PHOTOS_UPLOADED.inc();
            uploaded.push(photo);
        }

        info!(
            "Uploaded {} photo(s) to batch {}",
            uploaded.len(),
            batch.batch_number
        );

        Ok(PhotoUploadResponse {
            batch_id,
            batch_number: batch.batch_number,
            uploaded,
        })
    }
}

fn image_extension(file_name: &str) -> Result<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(SeedTrackerError::Upload(format!(
            "{}: Upload a valid image file.",
            file_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Batch, NewBatch};
    use crate::storage::{MemoryStore, MockInventoryStore};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    async fn setup(max: usize) -> (tempfile::TempDir, PhotoStorage, i64) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let batch = store
            .insert_batch(&NewBatch {
                seed_name: "Kale".to_string(),
                batch_number: "K-7".to_string(),
                weight_grams: dec!(5.00),
                sell_by_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            })
            .await
            .unwrap();
        let photos = PhotoStorage::new(store, dir.path().to_path_buf(), max);
        (dir, photos, batch.id)
    }

    fn file(name: &str, size: usize) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            bytes: vec![0u8; size],
        }
    }

    #[tokio::test]
    async fn test_upload_writes_files_and_rows() {
        let (dir, photos, id) = setup(1024).await;

        let response = photos
            .upload(id, vec![file("front.JPG", 10), file("back.png", 20)])
            .await
            .unwrap();

        assert_eq!(response.batch_number, "K-7");
        assert_eq!(response.uploaded.len(), 2);
        for photo in &response.uploaded {
            assert!(photo.image_path.starts_with("batch_photos/"));
            assert!(dir.path().join(&photo.image_path).exists());
        }
        assert!(response.uploaded[0].image_path.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_upload_requires_files() {
        let (_dir, photos, id) = setup(1024).await;
        assert!(matches!(
            photos.upload(id, Vec::new()).await,
            Err(SeedTrackerError::Upload(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_file_rejects_whole_upload() {
        let (dir, photos, id) = setup(16).await;
        let err = photos
            .upload(id, vec![file("ok.png", 8), file("huge.png", 17)])
            .await
            .unwrap_err();
        assert!(matches!(err, SeedTrackerError::Upload(msg) if msg.contains("huge.png")));
        assert!(!dir.path().join(PHOTO_DIR).exists());
    }

    #[tokio::test]
    async fn test_failed_insert_removes_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MockInventoryStore::new();
        store.expect_get_batch().returning(|id| {
            Ok(Some(Batch {
                id,
                seed_name: "Kale".to_string(),
                batch_number: "K-8".to_string(),
                weight_grams: dec!(5.00),
                sell_by_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
                created_at: chrono::Utc::now(),
            }))
        });
        // batch deleted between the lookup and the insert
        store
            .expect_insert_photo()
            .times(1)
            .returning(|photo| Err(SeedTrackerError::BatchNotFound(photo.batch_id)));

        let photos = PhotoStorage::new(Arc::new(store), dir.path().to_path_buf(), 1024);
        let err = photos
            .upload(8, vec![file("a.png", 4), file("b.png", 4)])
            .await
            .unwrap_err();
        assert!(matches!(err, SeedTrackerError::BatchNotFound(8)));

        let leftover = std::fs::read_dir(dir.path().join(PHOTO_DIR)).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_non_image_and_missing_batch() {
        let (_dir, photos, id) = setup(1024).await;
        assert!(matches!(
            photos.upload(id, vec![file("notes.txt", 4)]).await,
            Err(SeedTrackerError::Upload(_))
        ));
        assert!(matches!(
            photos.upload(id + 1, vec![file("a.png", 4)]).await,
            Err(SeedTrackerError::BatchNotFound(_))
        ));
    }
}
