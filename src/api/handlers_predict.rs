use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::analysis::{normalize, AnalysisError};
use crate::media::screenshot::{save_screenshot, SavedScreenshot};
use crate::media::temp::TempImage;
use crate::models::analysis::AnalysisDocument;
use crate::AppState;

pub const NO_IMAGE_MESSAGE: &str = "No image provided";
pub const NO_FACE_MESSAGE: &str = "No face detected, please provide a clear face image";

const IMAGE_FIELD: &str = "image";
const SCREENSHOT_FIELD: &str = "screenshot";

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct PredictForm {
    image: Option<Upload>,
    screenshot: Option<Upload>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn read_form(multipart: &mut Multipart) -> Result<PredictForm, Response> {
    let mut form = PredictForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(error_response(e.status(), e.body_text())),
        };
        let name = field.name().unwrap_or_default().to_string();
        if name != IMAGE_FIELD && name != SCREENSHOT_FIELD {
            continue;
        }
        // Only file parts count, and the first one of each name wins.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let slot = if name == IMAGE_FIELD { &mut form.image } else { &mut form.screenshot };
        if slot.is_some() {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| error_response(e.status(), e.body_text()))?
            .to_vec();
        *slot = Some(Upload { filename, bytes });
    }
    Ok(form)
}

/// Attach `key` to the response payload: the first face of a list result,
/// or the mapping itself.
fn attach(result: &mut Value, key: &str, value: &str) {
    let target = match result {
        Value::Array(items) => items.first_mut(),
        other => Some(other),
    };
    if let Some(Value::Object(map)) = target {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

pub async fn predict(State(state): State<Arc<AppState>>, multipart: Result<Multipart, MultipartRejection>) -> Response {
    state.stats.inc_requests();

    // A body that is not multipart at all carries no image either.
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            warn!(%rejection, "predict request without multipart body");
            return error_response(StatusCode::BAD_REQUEST, NO_IMAGE_MESSAGE);
        }
    };
    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    let Some(image) = form.image else {
        warn!("no image found in request");
        return error_response(StatusCode::BAD_REQUEST, NO_IMAGE_MESSAGE);
    };
    let image_name = image.filename.clone();
    info!(filename = %image_name, size = image.bytes.len(), "received image");

    let screenshot = match form.screenshot {
        Some(shot) => store_screenshot(&state, shot).await,
        None => None,
    };

    let temp = match TempImage::write(&state.paths.tmp, image.bytes, Some(image_name.as_str())).await {
        Ok(temp) => temp,
        Err(e) => {
            error!("failed to stage image: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e));
        }
    };
    let outcome = state.analyzer.analyze(temp.path()).await;
    if let Err(e) = temp.close() {
        warn!("failed to remove temporary image: {}", e);
    }

    let raw = match outcome {
        Ok(raw) => raw,
        Err(AnalysisError::NoFaceDetected) => {
            state.stats.inc_no_face();
            warn!(filename = %image_name, "no face detected");
            return error_response(StatusCode::BAD_REQUEST, NO_FACE_MESSAGE);
        }
        Err(AnalysisError::Failed(msg)) => {
            state.stats.inc_analysis_failed();
            error!(filename = %image_name, "analysis failed: {}", msg);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, msg);
        }
    };
    state.stats.inc_analyzed();

    let mut result = normalize(raw);
    let doc = AnalysisDocument::new(image_name, &result, screenshot.as_ref());
    match state.store.insert(&state.collection, &doc).await {
        Ok(id) => {
            state.stats.inc_persisted();
            info!(document_id = %id, store = state.store.name(), "analysis saved");
            attach(&mut result, "document_id", &id);
            if let Some(shot) = &screenshot {
                attach(&mut result, "screenshot_url", &shot.url);
            }
        }
        Err(e) => {
            // Persistence is best effort; the caller gets the bare analysis.
            state.stats.inc_persist_failed();
            error!(store = state.store.name(), "failed to save analysis: {}", e);
        }
    }

    (StatusCode::OK, Json(result)).into_response()
}

async fn store_screenshot(state: &AppState, shot: Upload) -> Option<SavedScreenshot> {
    info!(filename = %shot.filename, size = shot.bytes.len(), "received screenshot");
    match save_screenshot(&state.paths.screenshots, &state.base_url, &shot.bytes).await {
        Ok(saved) => {
            state.stats.inc_screenshots_saved();
            info!(filename = %saved.filename, url = %saved.url, "screenshot saved");
            Some(saved)
        }
        Err(e) => {
            state.stats.inc_screenshots_failed();
            warn!("error saving screenshot: {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attach_targets_first_face_of_list_results() {
        let mut v = json!([{"dominant_emotion": "happy"}, {"dominant_emotion": "sad"}]);
        attach(&mut v, "document_id", "abc");
        assert_eq!(v[0]["document_id"], "abc");
        assert!(v[1].get("document_id").is_none());
    }

    #[test]
    fn attach_targets_mapping_results() {
        let mut v = json!({"dominant_emotion": "happy"});
        attach(&mut v, "screenshot_url", "http://x/screenshots/a.jpg");
        assert_eq!(v["screenshot_url"], "http://x/screenshots/a.jpg");
    }

    #[test]
    fn attach_ignores_scalars_and_empty_lists() {
        let mut empty = json!([]);
        attach(&mut empty, "document_id", "abc");
        assert_eq!(empty, json!([]));
        let mut scalar = json!("odd");
        attach(&mut scalar, "document_id", "abc");
        assert_eq!(scalar, json!("odd"));
    }
}
