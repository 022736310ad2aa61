use shared::{SubmitResponse, SubmitStatus};
use std::sync::Arc;
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::db::models::NewReport;
use crate::db::report_repository::{ReportStore, RepositoryError};
use crate::storage::{ImageStore, StorageError};

pub const ACCEPTED_MESSAGE: &str = "Waste Verified!";
pub const REJECTED_MESSAGE: &str = "Not identified as waste.";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid submission: {0}")]
    InvalidInput(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// One citizen report as received: coordinates plus the photo.
#[derive(Debug, Clone)]
pub struct Submission {
    pub latitude: f64,
    pub longitude: f64,
    pub image: Vec<u8>,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub accepted: bool,
    pub message: String,
    pub details: String,
    pub confidence: f64,
}

impl Submission {
    pub fn validate(&self, max_upload_bytes: usize) -> Result<(), PipelineError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(PipelineError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(PipelineError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        if self.image.is_empty() {
            return Err(PipelineError::InvalidInput("missing image".to_string()));
        }
        if self.image.len() > max_upload_bytes {
            return Err(PipelineError::InvalidInput(format!(
                "image of {} bytes exceeds limit of {} bytes",
                self.image.len(),
                max_upload_bytes
            )));
        }
        Ok(())
    }
}

impl From<Outcome> for SubmitResponse {
    fn from(outcome: Outcome) -> Self {
        Self {
            status: if outcome.accepted {
                SubmitStatus::Success
            } else {
                SubmitStatus::Rejected
            },
            message: outcome.message,
            details: outcome.details,
            confidence: outcome.confidence,
        }
    }
}

/// Store image, classify it, and persist a report when the verdict is positive.
#[derive(Clone)]
pub struct VerificationService {
    images: Arc<dyn ImageStore>,
    classifier: Arc<dyn Classifier>,
    reports: Arc<dyn ReportStore>,
    max_upload_bytes: usize,
}

impl VerificationService {
    pub fn new(
        images: Arc<dyn ImageStore>,
        classifier: Arc<dyn Classifier>,
        reports: Arc<dyn ReportStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            images,
            classifier,
            reports,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn submit(&self, submission: Submission) -> Result<Outcome, PipelineError> {
        let submission_id = Uuid::new_v4();
        submission.validate(self.max_upload_bytes)?;
        log::info!(
            "[{}] Received report at ({}, {}) with {} ({} bytes)",
            submission_id,
            submission.latitude,
            submission.longitude,
            submission.filename,
            submission.image.len()
        );

        // the image must be durable before a row can reference it
        let stored = self
            .images
            .save(&submission.filename, &submission.image)
            .await
            .map_err(|e| {
                log::error!("[{}] Failed to store image: {}", submission_id, e);
                PipelineError::Storage(e)
            })?;
        log::debug!(
            "[{}] Stored image as {} ({})",
            submission_id,
            stored.key,
            stored.mime_type.unwrap_or("unknown type")
        );

        let verdict = self.classifier.classify(&submission.image).await;
        log::info!(
            "[{}] Verdict: is_trash={} confidence={:.2}",
            submission_id,
            verdict.is_trash,
            verdict.confidence
        );

        if !verdict.is_trash {
            log::info!("[{}] Rejected, image {} kept unreferenced", submission_id, stored.key);
            return Ok(Outcome {
                accepted: false,
                message: REJECTED_MESSAGE.to_string(),
                details: verdict.description,
                confidence: verdict.confidence,
            });
        }

        let report = self
            .reports
            .insert(NewReport::verified(
                submission.latitude,
                submission.longitude,
                stored.key,
                verdict.description.clone(),
                verdict.confidence,
            ))
            .await?;
        log::info!("[{}] Accepted as report {}", submission_id, report.id);

        Ok(Outcome {
            accepted: true,
            message: ACCEPTED_MESSAGE.to_string(),
            details: verdict.description,
            confidence: verdict.confidence,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use crate::classifier::{ClassificationVerdict, Classifier};
    use crate::storage::{generate_image_key, ImageStore, StorageError, StoredImage};

    #[derive(Default)]
    pub struct MemoryImageStore {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl ImageStore for MemoryImageStore {
        async fn save(&self, original_filename: &str, data: &[u8]) -> Result<StoredImage, StorageError> {
            let key = generate_image_key(original_filename, data);
            self.objects.lock().await.insert(key.clone(), data.to_vec());
            Ok(StoredImage {
                key,
                mime_type: None,
            })
        }
    }

    pub struct FailingImageStore;

    #[async_trait]
    impl ImageStore for FailingImageStore {
        async fn save(&self, _original_filename: &str, _data: &[u8]) -> Result<StoredImage, StorageError> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "disk full",
            )))
        }
    }

    pub struct FixedClassifier {
        verdict: ClassificationVerdict,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        pub fn new(is_trash: bool, confidence: f64, description: &str) -> Self {
            Self {
                verdict: ClassificationVerdict {
                    is_trash,
                    confidence,
                    description: description.to_string(),
                },
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(&self, _image: &[u8]) -> ClassificationVerdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }
}
