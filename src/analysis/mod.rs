//! Per-PID rolling state and the threshold/anomaly/leak/phase/fingerprint
//! pipeline that runs over every tick's samples.

pub mod regression;

use std::collections::HashMap;

use crate::model::{Alert, Fingerprint, Phase, ProcessSample, Severity, StatusRecord};
use crate::ringstats::RingStats;

const CPU_STATS_WINDOW: usize = 120;
const RSS_STATS_WINDOW: usize = 120;
const Z_SCORE_MIN_SAMPLES: usize = 10;
const Z_SCORE_THRESHOLD: f64 = 3.0;
const LEAK_MIN_HISTORY: usize = 30;
const LEAK_SLOPE_KB_PER_SAMPLE: f64 = 10.0;
const CTX_PRESSURE_THRESHOLD: f64 = 0.5;
const FINGERPRINT_WRITE_PERIOD: i64 = 10;

/// Threshold config for the four per-tick category checks. Defaults match
/// `spec.md` §4.5.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub rss_warning_mb: f64,
    pub rss_critical_mb: f64,
    pub fd_warning: i32,
    pub fd_critical: i32,
    pub thread_warning: i32,
    pub thread_critical: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 80.0,
            cpu_critical: 95.0,
            rss_warning_mb: 2048.0,
            rss_critical_mb: 4096.0,
            fd_warning: 1000,
            fd_critical: 5000,
            thread_warning: 100,
            thread_critical: 500,
        }
    }
}

/// Per-PID accumulated state, created on first sample and kept for the
/// engine's lifetime (see the PID-reuse design note in `DESIGN.md`).
struct PidState {
    comm: String,
    cpu_stats: RingStats,
    rss_stats: RingStats,
    rss_history: Vec<f64>,
    prev_vol_ctx: i64,
    prev_nvol_ctx: i64,
    prev_ts: i64,
    cpu_sum: f64,
    rss_sum: f64,
    thread_sum: f64,
    fd_sum: f64,
    net_sum: f64,
    sample_count: i64,
    phase_idle: i64,
    phase_active: i64,
    phase_burst: i64,
}

impl PidState {
    fn new(comm: String) -> Self {
        Self {
            comm,
            cpu_stats: RingStats::new(CPU_STATS_WINDOW),
            rss_stats: RingStats::new(RSS_STATS_WINDOW),
            rss_history: Vec::new(),
            prev_vol_ctx: 0,
            prev_nvol_ctx: 0,
            prev_ts: 0,
            cpu_sum: 0.0,
            rss_sum: 0.0,
            thread_sum: 0.0,
            fd_sum: 0.0,
            net_sum: 0.0,
            sample_count: 0,
            phase_idle: 0,
            phase_active: 0,
            phase_burst: 0,
        }
    }

    fn dominant_phase(&self) -> Phase {
        // Ties broken burst > active > idle.
        if self.phase_burst >= self.phase_active && self.phase_burst >= self.phase_idle {
            Phase::Burst
        } else if self.phase_active >= self.phase_idle {
            Phase::Active
        } else {
            Phase::Idle
        }
    }
}

/// Classifies one sample's phase from CPU percent and the leading state
/// character (`'R'` for running).
pub fn phase(cpu: f64, state_char: char) -> Phase {
    if cpu > 80.0 {
        Phase::Burst
    } else if state_char == 'R' && cpu > 20.0 {
        Phase::Burst
    } else if state_char == 'R' {
        Phase::Active
    } else if cpu < 1.0 {
        Phase::Idle
    } else {
        Phase::Active
    }
}

/// Pure per-sample threshold evaluation (testable property #6). Emits at
/// most one alert per category; a critical tier suppresses its warning.
pub fn evaluate(
    sample: &ProcessSample,
    status: Option<&StatusRecord>,
    fd_count: usize,
    thresholds: &Thresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::with_capacity(4);
    let ts = sample.ts;
    let pid = sample.pid;

    two_tier(
        &mut alerts,
        ts,
        pid,
        "cpu",
        sample.cpu,
        thresholds.cpu_warning,
        thresholds.cpu_critical,
    );

    let rss_mb = sample.rss_kb as f64 / 1024.0;
    two_tier(
        &mut alerts,
        ts,
        pid,
        "memory",
        rss_mb,
        thresholds.rss_warning_mb,
        thresholds.rss_critical_mb,
    );

    let fd_i32 = fd_count.min(i32::MAX as usize) as i32;
    two_tier(
        &mut alerts,
        ts,
        pid,
        "fd",
        fd_i32 as f64,
        thresholds.fd_warning as f64,
        thresholds.fd_critical as f64,
    );

    if let Some(status) = status {
        two_tier(
            &mut alerts,
            ts,
            pid,
            "threads",
            status.threads as f64,
            thresholds.thread_warning as f64,
            thresholds.thread_critical as f64,
        );
    }

    alerts
}

fn two_tier(
    alerts: &mut Vec<Alert>,
    ts: i64,
    pid: i32,
    category: &str,
    value: f64,
    warning: f64,
    critical: f64,
) {
    if value >= critical {
        alerts.push(Alert {
            ts,
            pid,
            severity: Severity::Critical,
            category: category.to_string(),
            message: format!("{category} at {value:.1} exceeds critical threshold {critical:.1}"),
            value,
            threshold: critical,
        });
    } else if value >= warning {
        alerts.push(Alert {
            ts,
            pid,
            severity: Severity::Warning,
            category: category.to_string(),
            message: format!("{category} at {value:.1} exceeds warning threshold {warning:.1}"),
            value,
            threshold: warning,
        });
    }
}

/// A fingerprint due for persistence this tick, alongside the accumulated
/// alerts produced while processing it.
pub struct TickAnalysisResult {
    pub alerts: Vec<Alert>,
    pub fingerprints_due: Vec<Fingerprint>,
}

pub struct AnalysisEngine {
    per_pid: HashMap<i32, PidState>,
    thresholds: Thresholds,
}

impl AnalysisEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            per_pid: HashMap::new(),
            thresholds,
        }
    }

    pub fn process_tick(
        &mut self,
        samples: &[ProcessSample],
        statuses: &[StatusRecord],
        fd_counts: &HashMap<i32, usize>,
        conn_counts: &HashMap<i32, usize>,
        ts: i64,
    ) -> TickAnalysisResult {
        let status_by_pid: HashMap<i32, &StatusRecord> =
            statuses.iter().map(|s| (s.pid, s)).collect();

        let mut alerts = Vec::new();
        let mut fingerprints_due = Vec::new();

        for sample in samples {
            let status = status_by_pid.get(&sample.pid).copied();
            let fd_count = fd_counts.get(&sample.pid).copied().unwrap_or(0);
            let net_count = conn_counts.get(&sample.pid).copied().unwrap_or(0);

            alerts.extend(evaluate(sample, status, fd_count, &self.thresholds));

            let state = self
                .per_pid
                .entry(sample.pid)
                .or_insert_with(|| PidState::new(sample.comm.clone()));

            state.cpu_stats.push(sample.cpu);
            state.rss_stats.push(sample.rss_kb as f64);

            if state.cpu_stats.count() >= Z_SCORE_MIN_SAMPLES {
                let mean = state.cpu_stats.mean();
                let stddev = state.cpu_stats.stddev();
                if stddev > f64::EPSILON {
                    let z = (sample.cpu - mean).abs() / stddev;
                    if z > Z_SCORE_THRESHOLD {
                        alerts.push(Alert {
                            ts,
                            pid: sample.pid,
                            severity: Severity::Warning,
                            category: "anomaly:cpu".to_string(),
                            message: format!("cpu {:.1} is a {z:.1}-sigma outlier", sample.cpu),
                            value: sample.cpu,
                            threshold: mean + Z_SCORE_THRESHOLD * stddev,
                        });
                    }
                }
            }

            state.rss_history.push(sample.rss_kb as f64);
            if state.rss_history.len() >= LEAK_MIN_HISTORY {
                if let Some(fit) =
                    regression::detect_leak(&state.rss_history, LEAK_SLOPE_KB_PER_SAMPLE)
                {
                    alerts.push(Alert {
                        ts,
                        pid: sample.pid,
                        severity: Severity::Warning,
                        category: "memory_leak".to_string(),
                        message: format!(
                            "rss growing at {:.1} kB/sample (R^2={:.2})",
                            fit.slope, fit.r_squared
                        ),
                        value: fit.slope,
                        threshold: LEAK_SLOPE_KB_PER_SAMPLE,
                    });
                }
            }

            let state_char = status.map(|s| s.state.chars().next().unwrap_or('?')).unwrap_or_else(|| {
                sample.stat.chars().next().unwrap_or('?')
            });
            match phase(sample.cpu, state_char) {
                Phase::Idle => state.phase_idle += 1,
                Phase::Active => state.phase_active += 1,
                Phase::Burst => state.phase_burst += 1,
            }

            if let Some(status) = status {
                if state.prev_ts > 0 {
                    let dt = ts - state.prev_ts;
                    if dt > 0 {
                        let dvol = (status.voluntary_ctxt_switches - state.prev_vol_ctx).max(0);
                        let dnvol =
                            (status.nonvoluntary_ctxt_switches - state.prev_nvol_ctx).max(0);
                        let total = dvol + dnvol;
                        let pressure = if total > 0 {
                            dnvol as f64 / total as f64
                        } else {
                            0.0
                        };
                        if pressure > CTX_PRESSURE_THRESHOLD {
                            alerts.push(Alert {
                                ts,
                                pid: sample.pid,
                                severity: Severity::Info,
                                category: "scheduling".to_string(),
                                message: format!("involuntary context-switch pressure {pressure:.2}"),
                                value: pressure,
                                threshold: CTX_PRESSURE_THRESHOLD,
                            });
                        }
                    }
                }
                state.prev_vol_ctx = status.voluntary_ctxt_switches;
                state.prev_nvol_ctx = status.nonvoluntary_ctxt_switches;
                state.prev_ts = ts;
            }

            state.cpu_sum += sample.cpu;
            state.rss_sum += sample.rss_kb as f64;
            state.thread_sum += status.map(|s| s.threads as f64).unwrap_or(0.0);
            state.fd_sum += fd_count as f64;
            state.net_sum += net_count as f64;
            state.sample_count += 1;

            if state.sample_count % FINGERPRINT_WRITE_PERIOD == 0 {
                let n = state.sample_count as f64;
                fingerprints_due.push(Fingerprint {
                    pid: sample.pid,
                    comm: state.comm.clone(),
                    avg_cpu: state.cpu_sum / n,
                    avg_rss_kb: state.rss_sum / n,
                    avg_threads: state.thread_sum / n,
                    avg_fd_count: state.fd_sum / n,
                    avg_net_conns: state.net_sum / n,
                    dominant_phase: state.dominant_phase(),
                    sample_count: state.sample_count,
                    updated_at: ts,
                });
            }
        }

        TickAnalysisResult {
            alerts,
            fingerprints_due,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pid: i32, ts: i64, cpu: f64, rss_kb: i64) -> ProcessSample {
        ProcessSample {
            ts,
            pid,
            user: "root".to_string(),
            cpu,
            mem: 1.0,
            rss_kb,
            stat: "S".to_string(),
            etimes: 10,
            comm: "claude".to_string(),
            args: String::new(),
        }
    }

    #[test]
    fn phase_idle_below_one_percent() {
        assert_eq!(phase(0.5, 'S'), Phase::Idle);
    }

    #[test]
    fn phase_never_idle_when_running() {
        assert_ne!(phase(0.1, 'R'), Phase::Idle);
    }

    #[test]
    fn phase_burst_above_eighty() {
        assert_eq!(phase(90.0, 'S'), Phase::Burst);
    }

    #[test]
    fn evaluate_emits_one_alert_per_category_critical_suppresses_warning() {
        let thresholds = Thresholds::default();
        let s = ProcessSample {
            cpu: 97.0,
            rss_kb: 5_000_000,
            ..sample(1, 100, 97.0, 5_000_000)
        };
        let status = StatusRecord {
            pid: 1,
            ts: 100,
            state: "R".to_string(),
            threads: 600,
            ..Default::default()
        };
        let alerts = evaluate(&s, Some(&status), 6000, &thresholds);
        assert_eq!(alerts.len(), 4);
        assert!(alerts.iter().all(|a| a.severity == Severity::Critical));
    }

    #[test]
    fn cpu_spike_emits_single_critical_alert() {
        let thresholds = Thresholds::default();
        let s = sample(1, 100, 97.0, 50_000);
        let alerts = evaluate(&s, None, 50, &thresholds);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, "cpu");
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].value, 97.0);
        assert_eq!(alerts[0].threshold, 95.0);
    }

    #[test]
    fn leak_detection_fires_once_history_long_enough() {
        let mut engine = AnalysisEngine::new(Thresholds::default());
        let mut fired = false;
        for i in 0..50 {
            let s = sample(1, i, 5.0, 1000 + 100 * i);
            let result = engine.process_tick(&[s], &[], &HashMap::new(), &HashMap::new(), i);
            if result.alerts.iter().any(|a| a.category == "memory_leak") {
                fired = true;
            }
        }
        assert!(fired);
    }

    #[test]
    fn fingerprint_written_every_ten_samples() {
        let mut engine = AnalysisEngine::new(Thresholds::default());
        let mut due_counts = Vec::new();
        for i in 1..=20 {
            let s = sample(1, i, 5.0, 1000);
            let result = engine.process_tick(&[s], &[], &HashMap::new(), &HashMap::new(), i);
            due_counts.push(result.fingerprints_due.len());
        }
        let total_due: usize = due_counts.iter().sum();
        assert_eq!(total_due, 2);
    }

    #[test]
    fn phase_dominance_reflects_mostly_burst_samples() {
        let mut engine = AnalysisEngine::new(Thresholds::default());
        let mut last_fp = None;
        for i in 1..=10 {
            let s = ProcessSample {
                stat: "R".to_string(),
                ..sample(1, i, 90.0, 1000)
            };
            let result = engine.process_tick(&[s], &[], &HashMap::new(), &HashMap::new(), i);
            last_fp = result.fingerprints_due.into_iter().next().or(last_fp);
        }
        for i in 11..=20 {
            let s = ProcessSample {
                stat: "S".to_string(),
                ..sample(1, i, 0.5, 1000)
            };
            let result = engine.process_tick(&[s], &[], &HashMap::new(), &HashMap::new(), i);
            if let Some(fp) = result.fingerprints_due.into_iter().next() {
                last_fp = Some(fp);
            }
        }
        assert_eq!(last_fp.unwrap().dominant_phase, Phase::Burst);
    }
}
