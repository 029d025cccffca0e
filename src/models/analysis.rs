use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::media::screenshot::SavedScreenshot;

/// Document written to the store for every analyzed image.
///
/// `timestamp` is not part of the payload; stores assign it at write time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalysisDocument {
    pub image_name: String,
    pub analysis: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub screenshot_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub screenshot_filename: Option<String>,
}

impl AnalysisDocument {
    /// Multi-face results keep only the first face.
    pub fn new(image_name: impl Into<String>, result: &Value, screenshot: Option<&SavedScreenshot>) -> Self {
        let analysis = match result {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        Self {
            image_name: image_name.into(),
            analysis,
            screenshot_url: screenshot.map(|s| s.url.clone()),
            screenshot_filename: screenshot.map(|s| s.filename.clone()),
        }
    }
}

/// A document read back from a store.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub document: AnalysisDocument,
}
