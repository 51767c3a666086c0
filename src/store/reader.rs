//! Bounded, typed queries. Every result is an owned `Vec` of fully owned
//! records — Rust's ownership model gives us the "caller owns every
//! returned string" contract for free, with no explicit free helper
//! needed.

use rusqlite::Connection;

use super::StoreError;
use crate::model::{Agent, Alert, Baseline, Fingerprint, Phase, ProcessSample, Severity};

const ALIVE_AGENTS_CAP: i64 = 500;
const LATEST_SAMPLES_CAP: i64 = 200;
const DISTINCT_PIDS_CAP: i64 = 10_000;

pub struct Reader<'c> {
    conn: &'c Connection,
}

impl<'c> Reader<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.conn
    }

    pub fn get_alive_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, pid, comm, args, first_seen, last_seen, alive FROM agent \
             WHERE alive = 1 ORDER BY last_seen DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([ALIVE_AGENTS_CAP], |r| {
            Ok(Agent {
                id: r.get(0)?,
                pid: r.get(1)?,
                comm: r.get(2)?,
                args: r.get(3)?,
                first_seen: r.get(4)?,
                last_seen: r.get(5)?,
                alive: r.get::<_, i64>(6)? != 0,
            })
        })?;
        collect(rows)
    }

    /// Most recent sample per distinct PID, newest first.
    pub fn get_latest_samples_per_agent(&self) -> Result<Vec<ProcessSample>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT ts, pid, user, cpu, mem, rss_kb, stat, etimes, comm, args FROM process_sample \
             WHERE id IN (SELECT MAX(id) FROM process_sample GROUP BY pid) \
             ORDER BY ts DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([LATEST_SAMPLES_CAP], |r| {
            Ok(ProcessSample {
                ts: r.get(0)?,
                pid: r.get(1)?,
                user: r.get(2)?,
                cpu: r.get(3)?,
                mem: r.get(4)?,
                rss_kb: r.get(5)?,
                stat: r.get(6)?,
                etimes: r.get(7)?,
                comm: r.get(8)?,
                args: r.get(9)?,
            })
        })?;
        collect(rows)
    }

    pub fn get_distinct_pids(&self) -> Result<Vec<i32>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT DISTINCT pid FROM process_sample ORDER BY pid LIMIT ?1")?;
        let rows = stmt.query_map([DISTINCT_PIDS_CAP], |r| r.get(0))?;
        collect(rows)
    }

    pub fn get_recent_alerts(&self, limit: i32) -> Result<Vec<Alert>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT ts, pid, severity, category, message, value, threshold FROM alert \
             ORDER BY ts DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |r| {
            let severity: String = r.get(2)?;
            Ok(Alert {
                ts: r.get(0)?,
                pid: r.get(1)?,
                severity: parse_severity(&severity),
                category: r.get(3)?,
                message: r.get(4)?,
                value: r.get(5)?,
                threshold: r.get(6)?,
            })
        })?;
        collect(rows)
    }

    pub fn get_sample_count(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM process_sample", [], |r| r.get(0))?)
    }

    pub fn get_all_fingerprints(&self) -> Result<Vec<Fingerprint>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT pid, comm, avg_cpu, avg_rss_kb, avg_threads, avg_fd_count, avg_net_conns, \
             dominant_phase, sample_count, updated_at FROM fingerprint",
        )?;
        let rows = stmt.query_map([], |r| {
            let phase: String = r.get(7)?;
            Ok(Fingerprint {
                pid: r.get(0)?,
                comm: r.get(1)?,
                avg_cpu: r.get(2)?,
                avg_rss_kb: r.get(3)?,
                avg_threads: r.get(4)?,
                avg_fd_count: r.get(5)?,
                avg_net_conns: r.get(6)?,
                dominant_phase: Phase::from_str(&phase),
                sample_count: r.get(8)?,
                updated_at: r.get(9)?,
            })
        })?;
        collect(rows)
    }

    pub fn get_baselines_by_comm(&self, comm: &str) -> Result<Vec<Baseline>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, comm, avg_cpu, avg_rss_kb, avg_threads, avg_fd_count, avg_net_conns, \
             dominant_phase, created_at, version, label FROM fingerprint_baseline WHERE comm = ?1",
        )?;
        let rows = stmt.query_map([comm], |r| {
            let phase: String = r.get(7)?;
            Ok(Baseline {
                id: r.get(0)?,
                comm: r.get(1)?,
                avg_cpu: r.get(2)?,
                avg_rss_kb: r.get(3)?,
                avg_threads: r.get(4)?,
                avg_fd_count: r.get(5)?,
                avg_net_conns: r.get(6)?,
                dominant_phase: Phase::from_str(&phase),
                created_at: r.get(8)?,
                version: r.get(9)?,
                label: r.get(10)?,
            })
        })?;
        collect(rows)
    }
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "critical" => Severity::Critical,
        "warning" => Severity::Warning,
        _ => Severity::Info,
    }
}

fn collect<T>(rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn empty_store_returns_empty_slices() {
        let store = Store::open_in_memory().unwrap();
        let reader = store.reader();
        assert!(reader.get_alive_agents().unwrap().is_empty());
        assert!(reader.get_latest_samples_per_agent().unwrap().is_empty());
        assert!(reader.get_distinct_pids().unwrap().is_empty());
        assert!(reader.get_recent_alerts(10).unwrap().is_empty());
        assert_eq!(reader.get_sample_count().unwrap(), 0);
    }

    #[test]
    fn recent_alerts_respects_limit_and_order() {
        let store = Store::open_in_memory().unwrap();
        let writer = store.writer();
        writer.begin().unwrap();
        for ts in [10, 20, 30] {
            let alert = Alert {
                ts,
                pid: 1,
                severity: Severity::Warning,
                category: "cpu".to_string(),
                message: "high cpu".to_string(),
                value: 90.0,
                threshold: 80.0,
            };
            writer.write_alert(&alert).unwrap();
        }
        writer.commit().unwrap();

        let alerts = store.reader().get_recent_alerts(2).unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].ts, 30);
        assert_eq!(alerts[1].ts, 20);
    }
}
