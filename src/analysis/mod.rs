pub mod command;
pub mod deepface;
pub mod normalize;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use normalize::{normalize, RawValue};

use crate::utils::config::{AnalyzerKind, Config};

/// Text the classifier uses when enforced detection finds no face.
const NO_FACE_MARKER: &str = "Face could not be detected";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("no face detected in the image")]
    NoFaceDetected,
    #[error("{0}")]
    Failed(String),
}

impl AnalysisError {
    /// Classify a failure message reported by an external classifier.
    ///
    /// This is the only place message text is inspected; callers match on the
    /// variant.
    pub fn from_backend_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if msg.contains(NO_FACE_MARKER) {
            AnalysisError::NoFaceDetected
        } else {
            AnalysisError::Failed(msg)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnalyzerSettings {
    pub detector_backend: String,
    pub enforce_detection: bool,
    pub actions: Vec<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            detector_backend: "mtcnn".to_string(),
            enforce_detection: true,
            actions: vec!["emotion".to_string()],
        }
    }
}

/// Emotion classification of a face image on local disk.
#[async_trait]
pub trait EmotionAnalyzer: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn analyze(&self, image: &Path) -> Result<RawValue, AnalysisError>;
}

pub fn from_config(cfg: &Config) -> anyhow::Result<Arc<dyn EmotionAnalyzer>> {
    let settings = AnalyzerSettings {
        detector_backend: cfg.detector_backend.clone(),
        ..AnalyzerSettings::default()
    };
    let timeout = Duration::from_secs(cfg.analyzer_timeout_secs);
    let analyzer: Arc<dyn EmotionAnalyzer> = match cfg.analyzer {
        AnalyzerKind::DeepFace => Arc::new(deepface::DeepFaceClient::new(&cfg.analyzer_url, settings, timeout)?),
        AnalyzerKind::Command => Arc::new(command::CommandAnalyzer::from_command_line(&cfg.analyzer_cmd, settings, timeout)?),
    };
    Ok(analyzer)
}
