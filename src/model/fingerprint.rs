//! Running behavioral fingerprints and write-once baselines.

/// Coarse per-tick behavior classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    Burst,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Active => "active",
            Phase::Burst => "burst",
        }
    }

    pub fn from_str(s: &str) -> Phase {
        match s {
            "burst" => Phase::Burst,
            "active" => Phase::Active,
            _ => Phase::Idle,
        }
    }
}

/// Running behavioral summary, keyed by `(pid, comm)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub pid: i32,
    pub comm: String,
    pub avg_cpu: f64,
    pub avg_rss_kb: f64,
    pub avg_threads: f64,
    pub avg_fd_count: f64,
    pub avg_net_conns: f64,
    pub dominant_phase: Phase,
    pub sample_count: i64,
    pub updated_at: i64,
}

/// A write-once snapshot of one or more fingerprints, labeled by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub id: i64,
    pub comm: String,
    pub avg_cpu: f64,
    pub avg_rss_kb: f64,
    pub avg_threads: f64,
    pub avg_fd_count: f64,
    pub avg_net_conns: f64,
    pub dominant_phase: Phase,
    pub created_at: i64,
    pub version: String,
    pub label: String,
}

/// One metric's comparison between a baseline and a current fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionFinding {
    pub comm: String,
    pub metric: String,
    pub baseline_value: f64,
    pub current_value: f64,
    pub change_pct: f64,
}
