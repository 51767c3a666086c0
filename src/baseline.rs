//! Baseline save/compare: labeled snapshots of fingerprints used as a
//! regression reference.

use crate::model::{Alert, Baseline, Fingerprint, RegressionFinding, Severity};
use crate::store::{Reader, StoreError, Writer};

pub const DEFAULT_LABEL: &str = "default";
pub const DEFAULT_VERSION: &str = "1.0";
pub const DEFAULT_CHANGE_PCT_THRESHOLD: f64 = 20.0;
const LIVE_REGRESSION_SEVERITY_THRESHOLD_PCT: f64 = 50.0;

/// Snapshots every current fingerprint under `label`. No conflict
/// resolution: duplicate `(comm, label)` pairs are allowed.
pub fn save(reader: &Reader, writer: &Writer, label: &str, now: i64) -> Result<usize, StoreError> {
    let fingerprints = reader.get_all_fingerprints()?;
    for fp in &fingerprints {
        writer.insert_baseline(
            &fp.comm,
            fp.avg_cpu,
            fp.avg_rss_kb,
            fp.avg_threads,
            fp.avg_fd_count,
            fp.avg_net_conns,
            fp.dominant_phase.as_str(),
            now,
            DEFAULT_VERSION,
            label,
        )?;
    }
    Ok(fingerprints.len())
}

/// Compares every current fingerprint against every baseline sharing its
/// `comm`, emitting up to six findings per pair.
pub fn compare_all(
    baselines: &[Baseline],
    fingerprints: &[Fingerprint],
    pct_threshold: f64,
) -> Vec<RegressionFinding> {
    let mut findings = Vec::new();
    for baseline in baselines {
        for fp in fingerprints.iter().filter(|f| f.comm == baseline.comm) {
            findings.extend(compare_one(baseline, fp, pct_threshold));
        }
    }
    findings
}

fn compare_one(baseline: &Baseline, fp: &Fingerprint, pct_threshold: f64) -> Vec<RegressionFinding> {
    let mut findings = Vec::new();
    let metrics: [(&str, f64, f64); 5] = [
        ("avg_cpu", baseline.avg_cpu, fp.avg_cpu),
        ("avg_rss_kb", baseline.avg_rss_kb, fp.avg_rss_kb),
        ("avg_threads", baseline.avg_threads, fp.avg_threads),
        ("avg_fd_count", baseline.avg_fd_count, fp.avg_fd_count),
        ("avg_net_conns", baseline.avg_net_conns, fp.avg_net_conns),
    ];

    for (name, base, cur) in metrics {
        let change_pct = if base != 0.0 {
            ((cur - base) / base.abs()) * 100.0
        } else if cur != 0.0 {
            100.0
        } else {
            continue;
        };
        if change_pct.abs() >= pct_threshold {
            findings.push(RegressionFinding {
                comm: fp.comm.clone(),
                metric: name.to_string(),
                baseline_value: base,
                current_value: cur,
                change_pct,
            });
        }
    }

    if baseline.dominant_phase != fp.dominant_phase {
        findings.push(RegressionFinding {
            comm: fp.comm.clone(),
            metric: "dominant_phase".to_string(),
            baseline_value: 0.0,
            current_value: 0.0,
            change_pct: 100.0,
        });
    }

    findings
}

/// Converts regression findings into alert rows, used for the engine's
/// live regression persistence (`spec.md` §4.7 "Live regression").
pub fn findings_to_alerts(findings: &[RegressionFinding], ts: i64, pid: i32) -> Vec<Alert> {
    findings
        .iter()
        .map(|f| {
            let severity = if f.change_pct.abs() >= LIVE_REGRESSION_SEVERITY_THRESHOLD_PCT {
                Severity::Warning
            } else {
                Severity::Info
            };
            Alert {
                ts,
                pid,
                severity,
                category: "regression".to_string(),
                message: f.metric.clone(),
                value: f.current_value,
                threshold: f.baseline_value,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Phase;

    fn fp(comm: &str, avg_cpu: f64, phase: Phase) -> Fingerprint {
        Fingerprint {
            pid: 1,
            comm: comm.to_string(),
            avg_cpu,
            avg_rss_kb: 1000.0,
            avg_threads: 4.0,
            avg_fd_count: 10.0,
            avg_net_conns: 1.0,
            dominant_phase: phase,
            sample_count: 20,
            updated_at: 100,
        }
    }

    fn baseline(comm: &str, avg_cpu: f64, phase: Phase) -> Baseline {
        Baseline {
            id: 1,
            comm: comm.to_string(),
            avg_cpu,
            avg_rss_kb: 1000.0,
            avg_threads: 4.0,
            avg_fd_count: 10.0,
            avg_net_conns: 1.0,
            dominant_phase: phase,
            created_at: 0,
            version: "1.0".to_string(),
            label: "default".to_string(),
        }
    }

    #[test]
    fn change_above_threshold_emits_finding() {
        let base = baseline("claude", 10.0, Phase::Idle);
        let cur = fp("claude", 50.0, Phase::Idle);
        let findings = compare_one(&base, &cur, 20.0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metric, "avg_cpu");
        assert!((findings[0].change_pct - 400.0).abs() < 1e-9);
    }

    #[test]
    fn change_below_threshold_emits_nothing() {
        let base = baseline("claude", 10.0, Phase::Idle);
        let cur = fp("claude", 11.0, Phase::Idle);
        assert!(compare_one(&base, &cur, 20.0).is_empty());
    }

    #[test]
    fn phase_mismatch_always_emits_one_finding() {
        let base = baseline("claude", 10.0, Phase::Idle);
        let cur = fp("claude", 10.0, Phase::Burst);
        let findings = compare_one(&base, &cur, 20.0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metric, "dominant_phase");
    }

    #[test]
    fn zero_baseline_nonzero_current_is_full_change() {
        let base = baseline("claude", 0.0, Phase::Idle);
        let cur = fp("claude", 5.0, Phase::Idle);
        let findings = compare_one(&base, &cur, 20.0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].change_pct, 100.0);
    }

    #[test]
    fn both_zero_skips_metric() {
        let mut base = baseline("claude", 0.0, Phase::Idle);
        base.avg_rss_kb = 0.0;
        let mut cur = fp("claude", 0.0, Phase::Idle);
        cur.avg_rss_kb = 0.0;
        let findings = compare_one(&base, &cur, 20.0);
        assert!(findings.iter().all(|f| f.metric != "avg_rss_kb"));
    }

    #[test]
    fn large_regression_is_warning_severity() {
        let findings = vec![RegressionFinding {
            comm: "claude".to_string(),
            metric: "avg_cpu".to_string(),
            baseline_value: 10.0,
            current_value: 50.0,
            change_pct: 400.0,
        }];
        let alerts = findings_to_alerts(&findings, 100, 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn small_regression_is_info_severity() {
        let findings = vec![RegressionFinding {
            comm: "claude".to_string(),
            metric: "avg_cpu".to_string(),
            baseline_value: 10.0,
            current_value: 12.5,
            change_pct: 25.0,
        }];
        let alerts = findings_to_alerts(&findings, 100, 1);
        assert_eq!(alerts[0].severity, Severity::Info);
    }
}
