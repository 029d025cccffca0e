use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

pub struct Stats {
    requests: AtomicU64,
    analyzed: AtomicU64,
    no_face: AtomicU64,
    analysis_failed: AtomicU64,
    persisted: AtomicU64,
    persist_failed: AtomicU64,
    screenshots_saved: AtomicU64,
    screenshots_failed: AtomicU64,
    started: Instant,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub uptime_seconds: u64,
    pub requests: u64,
    pub analyzed: u64,
    pub no_face: u64,
    pub analysis_failed: u64,
    pub persisted: u64,
    pub persist_failed: u64,
    pub screenshots_saved: u64,
    pub screenshots_failed: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            analyzed: AtomicU64::new(0),
            no_face: AtomicU64::new(0),
            analysis_failed: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
            persist_failed: AtomicU64::new(0),
            screenshots_saved: AtomicU64::new(0),
            screenshots_failed: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
    pub fn inc_requests(&self) { self.requests.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_analyzed(&self) { self.analyzed.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_no_face(&self) { self.no_face.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_analysis_failed(&self) { self.analysis_failed.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_persisted(&self) { self.persisted.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_persist_failed(&self) { self.persist_failed.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_screenshots_saved(&self) { self.screenshots_saved.fetch_add(1, Ordering::Relaxed); }
    pub fn inc_screenshots_failed(&self) { self.screenshots_failed.fetch_add(1, Ordering::Relaxed); }
    pub fn uptime_secs(&self) -> u64 { self.started.elapsed().as_secs() }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_seconds: self.uptime_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            analyzed: self.analyzed.load(Ordering::Relaxed),
            no_face: self.no_face.load(Ordering::Relaxed),
            analysis_failed: self.analysis_failed.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
            screenshots_saved: self.screenshots_saved.load(Ordering::Relaxed),
            screenshots_failed: self.screenshots_failed.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text exposition.
    pub fn metrics_text(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();
        out.push_str(&format!("moodscan_uptime_seconds {}\n", s.uptime_seconds));
        out.push_str(&format!("moodscan_requests_total {}\n", s.requests));
        out.push_str(&format!("moodscan_analyzed_total {}\n", s.analyzed));
        out.push_str(&format!("moodscan_no_face_total {}\n", s.no_face));
        out.push_str(&format!("moodscan_analysis_failed_total {}\n", s.analysis_failed));
        out.push_str(&format!("moodscan_persisted_total {}\n", s.persisted));
        out.push_str(&format!("moodscan_persist_failed_total {}\n", s.persist_failed));
        out.push_str(&format!("moodscan_screenshots_saved_total {}\n", s.screenshots_saved));
        out.push_str(&format!("moodscan_screenshots_failed_total {}\n", s.screenshots_failed));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_snapshot_and_metrics() {
        let s = Stats::new();
        s.inc_requests();
        s.inc_requests();
        s.inc_analyzed();
        s.inc_persist_failed();
        let snap = s.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.analyzed, 1);
        assert_eq!(snap.persist_failed, 1);
        assert_eq!(snap.persisted, 0);
        let text = s.metrics_text();
        assert!(text.contains("moodscan_requests_total 2\n"));
        assert!(text.contains("moodscan_persist_failed_total 1\n"));
    }
}
