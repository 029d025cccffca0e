#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use moodscan_backend::analysis::{AnalysisError, EmotionAnalyzer, RawValue};
use moodscan_backend::models::analysis::AnalysisDocument;
use moodscan_backend::store::{DocumentStore, StoreError};
use moodscan_backend::utils::config::{AnalyzerKind, Config, StoreKind};
use moodscan_backend::{api::routes, AppState};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// What the stub analyzer does with each image.
#[derive(Clone)]
pub enum Behavior {
    Returns(RawValue),
    NoFace,
    Fails(String),
    /// Return the image's bytes as a string so tests can tell requests apart.
    Echo,
}

/// One call the stub saw: the path it was given and whether the file existed.
#[derive(Clone, Debug)]
pub struct SeenImage {
    pub path: PathBuf,
    pub existed: bool,
}

pub struct StubAnalyzer {
    behavior: Behavior,
    pub seen: Mutex<Vec<SeenImage>>,
}

impl StubAnalyzer {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self { behavior, seen: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl EmotionAnalyzer for StubAnalyzer {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn analyze(&self, image: &Path) -> Result<RawValue, AnalysisError> {
        let existed = image.exists();
        self.seen.lock().push(SeenImage { path: image.to_path_buf(), existed });
        match &self.behavior {
            Behavior::Returns(raw) => Ok(raw.clone()),
            Behavior::NoFace => Err(AnalysisError::NoFaceDetected),
            Behavior::Fails(msg) => Err(AnalysisError::Failed(msg.clone())),
            Behavior::Echo => {
                let bytes = tokio::fs::read(image).await.map_err(|e| AnalysisError::Failed(e.to_string()))?;
                // Give concurrent requests a chance to interleave.
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                let v = serde_json::json!({
                    "dominant_emotion": "neutral",
                    "echo": String::from_utf8_lossy(&bytes),
                });
                Ok(RawValue::from(v))
            }
        }
    }
}

/// Store that is always down.
pub struct OutageStore;

#[async_trait]
impl DocumentStore for OutageStore {
    fn name(&self) -> &'static str {
        "outage"
    }

    async fn insert(&self, _collection: &str, _doc: &AnalysisDocument) -> Result<String, StoreError> {
        Err(StoreError::Rejected { status: 503, body: "store unavailable".to_string() })
    }
}

pub fn test_config(data: &Path, base_url: &str) -> Config {
    Config {
        data: data.to_path_buf(),
        screenshots_dir: data.join("screenshots"),
        base_url: base_url.to_string(),
        port: 0,
        analyzer: AnalyzerKind::DeepFace,
        analyzer_url: "http://127.0.0.1:9".to_string(),
        analyzer_cmd: "true".to_string(),
        detector_backend: "mtcnn".to_string(),
        analyzer_timeout_secs: 5,
        store: StoreKind::Sqlite,
        credentials: data.join("credentials.json"),
        collection: "emotion_analysis".to_string(),
        body_limit_bytes: 4 * 1024 * 1024,
    }
}

pub struct TestApp {
    pub tmp: TempDir,
    pub base_url: String,
    pub state: Arc<AppState>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Files left behind in the temporary image directory.
    pub fn temp_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.state.paths.tmp) {
            Ok(rd) => rd.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn predict(&self, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client.post(self.url("/predict")).multipart(form).send().await.unwrap()
    }
}

/// Start the real router on an ephemeral port.
pub async fn spawn_app(analyzer: Arc<dyn EmotionAnalyzer>, store: Arc<dyn DocumentStore>) -> TestApp {
    let tmp = TempDir::new().unwrap();
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = TcpListener::bind(&addr).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{}", port);

    let cfg = test_config(tmp.path(), &base_url);
    let state = Arc::new(AppState::new(&cfg, analyzer, store));
    state.paths.ensure().unwrap();
    let app = routes::router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    TestApp { tmp, base_url, state, client: reqwest::Client::new() }
}

/// A small valid JPEG.
pub fn test_jpeg() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8));
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Jpeg(85))
        .unwrap();
    bytes
}

pub fn file_part(bytes: Vec<u8>, filename: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str("image/jpeg")
        .unwrap()
}

/// Analysis shaped like a classifier's native output: single-precision scores,
/// integer region, a tensor and a flag.
pub fn native_analysis() -> RawValue {
    serde_json::from_str::<RawValue>(
        r#"[{
            "dominant_emotion": "happy",
            "region": {"x": 10, "y": 20, "w": 64, "h": 64, "left_eye": null, "right_eye": null},
            "face_confidence": 0.98,
            "embedding": {"__ndarray__": [0.5, 0.25, 1, 2], "shape": [2, 2]}
        }]"#,
    )
    .map(|raw| match raw {
        RawValue::Seq(mut faces) => {
            if let Some(RawValue::Map(face)) = faces.first_mut() {
                let emotion = [
                    ("angry", 0.5f32),
                    ("happy", 97.25f32),
                    ("neutral", 2.25f32),
                ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), RawValue::Float32(v)))
                .collect();
                face.insert("emotion".to_string(), RawValue::Map(emotion));
                face.insert("is_real".to_string(), RawValue::Bool(true));
            }
            RawValue::Seq(faces)
        }
        other => other,
    })
    .unwrap()
}

/// True when `v` holds only JSON-native values (no NaN placeholders, no tensor tags).
pub fn is_plain_json(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Array(items) => items.iter().all(is_plain_json),
        serde_json::Value::Object(map) => !map.contains_key("__ndarray__") && map.values().all(is_plain_json),
        _ => true,
    }
}
