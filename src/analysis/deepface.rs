use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use tracing::debug;

use super::{AnalysisError, AnalyzerSettings, EmotionAnalyzer, RawValue};

/// Client for a DeepFace REST server (`POST /analyze`).
pub struct DeepFaceClient {
    client: reqwest::Client,
    endpoint: String,
    settings: AnalyzerSettings,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl DeepFaceClient {
    pub fn new(base_url: &str, settings: AnalyzerSettings, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build analyzer HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/analyze", base_url.trim_end_matches('/')),
            settings,
        })
    }

    fn request_body(&self, image: &Path, bytes: &[u8]) -> serde_json::Value {
        let mime = mime_guess::from_path(image).first_or_octet_stream();
        serde_json::json!({
            "img": format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes)),
            "actions": self.settings.actions,
            "detector_backend": self.settings.detector_backend,
            "enforce_detection": self.settings.enforce_detection,
        })
    }
}

#[async_trait]
impl EmotionAnalyzer for DeepFaceClient {
    fn name(&self) -> &'static str {
        "deepface"
    }

    async fn analyze(&self, image: &Path) -> Result<RawValue, AnalysisError> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|e| AnalysisError::Failed(format!("failed to read {}: {}", image.display(), e)))?;
        let body = self.request_body(image, &bytes);
        debug!(endpoint = %self.endpoint, size = bytes.len(), "posting image to analyzer");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Failed(format!("analyzer request failed: {}", e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Failed(format!("analyzer response unreadable: {}", e)))?;

        if !status.is_success() {
            let msg = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("analyzer returned {}: {}", status, text));
            return Err(AnalysisError::from_backend_message(msg));
        }

        serde_json::from_str::<RawValue>(&text)
            .map(RawValue::into_results)
            .map_err(|e| AnalysisError::Failed(format!("analyzer returned invalid JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let c = DeepFaceClient::new("http://analyzer:5005/", AnalyzerSettings::default(), Duration::from_secs(1)).unwrap();
        assert_eq!(c.endpoint, "http://analyzer:5005/analyze");
    }

    #[test]
    fn request_carries_detector_settings_and_data_uri() {
        let settings = AnalyzerSettings { detector_backend: "retinaface".into(), ..AnalyzerSettings::default() };
        let c = DeepFaceClient::new("http://analyzer:5005", settings, Duration::from_secs(1)).unwrap();
        let body = c.request_body(Path::new("/tmp/face_abc.jpg"), b"\xff\xd8\xff");
        assert_eq!(body["detector_backend"], "retinaface");
        assert_eq!(body["enforce_detection"], true);
        assert_eq!(body["actions"], serde_json::json!(["emotion"]));
        assert_eq!(body["img"], "data:image/jpeg;base64,/9j/");
    }
}
