//! Per-tick orchestrator: scan -> per-PID sample/status/fd/net -> batched
//! write in one transaction -> in-memory result for the analysis engine.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::baseline;
use crate::model::{Alert, ProcessSample, StatusRecord};
use crate::procsource::ProcSource;
use crate::scanner;
use crate::security;
use crate::store::{Store, TickCounts};

pub struct Collector<'a> {
    source: &'a dyn ProcSource,
    pattern: String,
    self_pid: i32,
    tick_count: u64,
}

/// In-memory result of one tick, handed to the analysis engine regardless
/// of whether the transaction committed.
pub struct TickResult {
    pub counts: TickCounts,
    pub samples: Vec<ProcessSample>,
    pub statuses: Vec<StatusRecord>,
    pub fd_counts: HashMap<i32, usize>,
    pub conn_counts: HashMap<i32, usize>,
}

impl<'a> Collector<'a> {
    pub fn new(source: &'a dyn ProcSource, pattern: impl Into<String>, self_pid: i32) -> Self {
        Self {
            source,
            pattern: pattern.into(),
            self_pid,
            tick_count: 0,
        }
    }

    pub fn tick(&mut self, store: &Store, now: i64) -> TickResult {
        self.tick_count += 1;
        let agents = scanner::scan(self.source, &self.pattern, self.self_pid);

        let mut result = TickResult {
            counts: TickCounts {
                agents_found: agents.len(),
                ..Default::default()
            },
            samples: Vec::new(),
            statuses: Vec::new(),
            fd_counts: HashMap::new(),
            conn_counts: HashMap::new(),
        };

        if agents.is_empty() {
            debug!(tick = self.tick_count, "no matching agents this tick");
            return result;
        }

        let writer = store.writer();
        if let Err(e) = writer.begin() {
            warn!(error = %e, "tick begin failed, writing nothing this tick");
            return result;
        }

        let boot_time = self.source.get_boot_time().unwrap_or(0);
        let clk_tck = self.source.get_clk_tck();

        for agent in &agents {
            if writer
                .upsert_agent(agent.pid, &agent.comm, &agent.cmdline, now)
                .is_err()
            {
                continue;
            }

            let sample = self.collect_sample(agent.pid, &agent.comm, &agent.cmdline, boot_time, clk_tck, now);
            let _ = writer.write_sample(
                sample.ts,
                sample.pid,
                &sample.user,
                sample.cpu,
                sample.mem,
                sample.rss_kb,
                &sample.stat,
                sample.etimes,
                &sample.comm,
                &sample.args,
            );
            result.counts.samples_written += 1;

            if let Ok(status) = self.source.read_status(agent.pid, now) {
                if writer.write_status(&status).is_ok() {
                    result.counts.statuses_written += 1;
                }
                result.statuses.push(status);
            }

            if let Ok(fds) = self.source.list_fds(agent.pid, now) {
                result.fd_counts.insert(agent.pid, fds.len());
                for fd in &fds {
                    if writer.write_fd(fd).is_ok() {
                        result.counts.fds_written += 1;
                    }
                }
                for alert in security::audit_fds(&fds, now) {
                    write_and_count(&writer, &alert, &mut result.counts);
                }
            }

            if let Ok(conns) = self.source.read_net_connections(agent.pid, now) {
                result.conn_counts.insert(agent.pid, conns.len());
                for conn in &conns {
                    if writer.write_net(conn).is_ok() {
                        result.counts.conns_written += 1;
                    }
                }
                for alert in security::audit_connections(&conns, now) {
                    write_and_count(&writer, &alert, &mut result.counts);
                }
            }

            result.samples.push(sample);
        }

        match writer.commit() {
            Ok(()) => {
                result.counts.committed = true;
                debug!(
                    tick = self.tick_count,
                    agents_found = result.counts.agents_found,
                    samples_written = result.counts.samples_written,
                    committed = true,
                    "tick committed"
                );
            }
            Err(e) => {
                warn!(error = %e, "tick commit failed, rolling back");
                let _ = writer.rollback();
                result.counts.committed = false;
            }
        }

        result
    }

    fn collect_sample(
        &self,
        pid: i32,
        comm: &str,
        cmdline: &str,
        boot_time: i64,
        clk_tck: i64,
        now: i64,
    ) -> ProcessSample {
        use crate::procsource::linux::{cpu_percent, elapsed_secs, rss_kb};

        match self.source.read_stat(pid) {
            Ok(stat) => {
                let etimes = elapsed_secs(&stat, boot_time, clk_tck, now);
                ProcessSample {
                    ts: now,
                    pid,
                    user: String::new(),
                    cpu: cpu_percent(&stat, clk_tck, etimes),
                    mem: 0.0,
                    rss_kb: rss_kb(&stat),
                    stat: stat.state.to_string(),
                    etimes,
                    comm: comm.to_string(),
                    args: cmdline.to_string(),
                }
            }
            Err(_) => ProcessSample::zeroed(now, pid),
        }
    }
}

fn write_and_count(writer: &crate::store::Writer<'_>, alert: &Alert, counts: &mut TickCounts) {
    if writer.write_alert(alert).is_ok() {
        counts.alerts_written += 1;
    }
}

/// Persists a fingerprint due this tick, then runs `baseline::compare_all`
/// against every baseline sharing its `comm` and persists any findings as
/// alerts (`spec.md` §4.5 step 7, §4.7 "Live regression").
pub fn persist_fingerprint_and_regressions(
    store: &Store,
    fingerprint: &crate::model::Fingerprint,
    pct_threshold: f64,
    now: i64,
) -> Result<usize, crate::store::StoreError> {
    let writer = store.writer();
    writer.upsert_fingerprint(fingerprint)?;

    let baselines = store.reader().get_baselines_by_comm(&fingerprint.comm)?;
    let findings = baseline::compare_all(&baselines, std::slice::from_ref(fingerprint), pct_threshold);
    let alerts = baseline::findings_to_alerts(&findings, now, fingerprint.pid);
    for alert in &alerts {
        writer.write_alert(alert)?;
    }
    Ok(alerts.len())
}
