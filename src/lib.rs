pub mod utils;
pub mod stats;
pub mod models;
pub mod media;
pub mod analysis;
pub mod store;
pub mod api;

use std::path::PathBuf;
use std::sync::Arc;

use analysis::EmotionAnalyzer;
use store::DocumentStore;
use utils::config::Config;

#[derive(Clone)]
pub struct AppPaths {
    pub data: PathBuf,
    pub screenshots: PathBuf,
    pub tmp: PathBuf,
}

impl AppPaths {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            data: cfg.data.clone(),
            screenshots: cfg.screenshots_dir.clone(),
            tmp: cfg.tmp_dir(),
        }
    }

    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data)?;
        std::fs::create_dir_all(&self.screenshots)?;
        std::fs::create_dir_all(&self.tmp)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub started_at: std::time::Instant,
    pub paths: AppPaths,
    pub base_url: String,
    pub collection: String,
    pub body_limit_bytes: usize,
    pub stats: Arc<stats::Stats>,
    pub analyzer: Arc<dyn EmotionAnalyzer>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(cfg: &Config, analyzer: Arc<dyn EmotionAnalyzer>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            started_at: std::time::Instant::now(),
            paths: AppPaths::from_config(cfg),
            base_url: cfg.base_url.clone(),
            collection: cfg.collection.clone(),
            body_limit_bytes: cfg.body_limit_bytes,
            stats: Arc::new(stats::Stats::new()),
            analyzer,
            store,
        }
    }
}
