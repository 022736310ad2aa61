pub mod gemini;
pub mod parser;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ClassifierConfig, ConfigError};
use crate::storage::sniff_mime_type;
use gemini::GeminiClient;
use parser::{parse_verdict, ParseError};

pub const CLASSIFICATION_PROMPT: &str = r#"Analyze this image for civic issues.
Does this image contain illegal garbage dumping, litter, overflowing bins, or construction debris?
Return ONLY a JSON response like this: {"is_trash": true, "confidence": 0.95, "description": "A pile of plastic bags..."}
If clean, set is_trash to false."#;

pub const DEMO_CONFIDENCE: f64 = 0.98;
pub const DEMO_DESCRIPTION: &str =
    "DEMO MODE: Verified pile of garbage containing plastic and debris.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationVerdict {
    pub is_trash: bool,
    pub confidence: f64,
    pub description: String,
}

impl ClassificationVerdict {
    /// Terminal negative verdict carrying the failure as its description.
    pub fn failed(error: &ClassificationError) -> Self {
        Self {
            is_trash: false,
            confidence: 0.0,
            description: format!("AI Error: {}", error),
        }
    }

    pub fn demo() -> Self {
        Self {
            is_trash: true,
            confidence: DEMO_CONFIDENCE,
            description: DEMO_DESCRIPTION.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Response blocked: {0}")]
    Blocked(String),
    #[error("Model returned no content")]
    EmptyResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("Unrecognized image format")]
    UnsupportedImage,
    #[error("Model did not answer within {0:?}")]
    Timeout(Duration),
}

/// External multimodal model: prompt + image in, raw text out.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, ModelError>;
}

/// Produces a verdict for every image; failures come back as rejections.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> ClassificationVerdict;
}

enum Mode {
    Demo {
        delay: Duration,
    },
    Live {
        model: Arc<dyn VisionModel>,
        timeout: Duration,
    },
}

pub struct ClassifierGateway {
    mode: Mode,
}

impl ClassifierGateway {
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        if config.demo_mode {
            log::warn!("Classifier running in DEMO MODE: every submission will be accepted");
            return Ok(Self::demo(config.demo_delay()));
        }

        let api_key = config.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
        let client = GeminiClient::new(config.api_base.clone(), config.model.clone(), api_key);
        log::info!("Classifier using model {}", config.model);
        Ok(Self::live(Arc::new(client), config.timeout()))
    }

    pub fn demo(delay: Duration) -> Self {
        Self {
            mode: Mode::Demo { delay },
        }
    }

    pub fn live(model: Arc<dyn VisionModel>, timeout: Duration) -> Self {
        Self {
            mode: Mode::Live { model, timeout },
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self.mode, Mode::Demo { .. })
    }

    async fn ask_model(
        model: &dyn VisionModel,
        timeout: Duration,
        image: &[u8],
    ) -> Result<ClassificationVerdict, ClassificationError> {
        let mime_type = sniff_mime_type(image).ok_or(ClassificationError::UnsupportedImage)?;

        let raw = tokio::time::timeout(timeout, model.generate(CLASSIFICATION_PROMPT, image, mime_type))
            .await
            .map_err(|_| ClassificationError::Timeout(timeout))??;

        log::debug!("Raw model output: {}", raw);
        Ok(parse_verdict(&raw)?)
    }
}

#[async_trait]
impl Classifier for ClassifierGateway {
    async fn classify(&self, image: &[u8]) -> ClassificationVerdict {
        match &self.mode {
            Mode::Demo { delay } => {
                tokio::time::sleep(*delay).await;
                ClassificationVerdict::demo()
            }
            Mode::Live { model, timeout } => {
                match Self::ask_model(model.as_ref(), *timeout, image).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        log::error!("❌ AI Error: {}", e);
                        ClassificationVerdict::failed(&e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Vision model double replying with a canned result and counting calls.
    pub struct StubModel {
        reply: Box<dyn Fn() -> Result<String, ModelError> + Send + Sync>,
        delay: Duration,
        pub calls: AtomicUsize,
    }

    impl StubModel {
        pub fn replying(text: &str) -> Self {
            let text = text.to_string();
            Self {
                reply: Box::new(move || Ok(text.clone())),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: Box::new(|| Err(ModelError::Status {
                    status: 503,
                    body: "model overloaded".into(),
                })),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionModel for StubModel {
        async fn generate(
            &self,
            _prompt: &str,
            _image: &[u8],
            _mime_type: &str,
        ) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.reply)()
        }
    }
}
