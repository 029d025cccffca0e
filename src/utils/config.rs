use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyzerKind {
    DeepFace,
    Command,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Firestore,
    Sqlite,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub data: PathBuf,
    pub screenshots_dir: PathBuf,
    pub base_url: String,
    pub port: u16,
    pub analyzer: AnalyzerKind,
    pub analyzer_url: String,
    pub analyzer_cmd: String,
    pub detector_backend: String,
    pub analyzer_timeout_secs: u64,
    pub store: StoreKind,
    pub credentials: PathBuf,
    pub collection: String,
    pub body_limit_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let data = PathBuf::from(env::var("MOODSCAN_DATA").unwrap_or_else(|_| "./data".to_string()));
        let screenshots_dir = env::var("MOODSCAN_SCREENSHOTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data.join("screenshots"));
        let base_url = env::var("MOODSCAN_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let port = env::var("MOODSCAN_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(3000);
        let analyzer = match env::var("MOODSCAN_ANALYZER").as_deref() {
            Ok("command") => AnalyzerKind::Command,
            _ => AnalyzerKind::DeepFace,
        };
        let analyzer_url = env::var("MOODSCAN_ANALYZER_URL").unwrap_or_else(|_| "http://127.0.0.1:5005".to_string());
        let analyzer_cmd = env::var("MOODSCAN_ANALYZER_CMD").unwrap_or_else(|_| "deepface-analyze".to_string());
        let detector_backend = env::var("MOODSCAN_DETECTOR").unwrap_or_else(|_| "mtcnn".to_string());
        let analyzer_timeout_secs = env::var("MOODSCAN_ANALYZER_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(120);
        let store = match env::var("MOODSCAN_STORE").as_deref() {
            Ok("sqlite") => StoreKind::Sqlite,
            _ => StoreKind::Firestore,
        };
        let credentials = PathBuf::from(env::var("MOODSCAN_CREDENTIALS").unwrap_or_else(|_| "credentials.json".to_string()));
        let collection = env::var("MOODSCAN_COLLECTION").unwrap_or_else(|_| "emotion_analysis".to_string());
        let body_limit_mb: usize = env::var("MOODSCAN_BODY_LIMIT_MB").ok().and_then(|v| v.parse().ok()).unwrap_or(16);
        Self {
            data,
            screenshots_dir,
            base_url,
            port,
            analyzer,
            analyzer_url,
            analyzer_cmd,
            detector_backend,
            analyzer_timeout_secs,
            store,
            credentials,
            collection,
            body_limit_bytes: body_limit_mb.saturating_mul(1024 * 1024),
        }
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.data.join("tmp")
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data.join("db").join("documents.db")
    }
}
