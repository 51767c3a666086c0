//! Batch writer: one cached prepared statement per INSERT/UPDATE, used
//! inside an explicit `begin`/`commit`/`rollback` transaction bracket.

use rusqlite::{params, Connection};

use super::StoreError;
use crate::model::{Alert, Fingerprint, FdRecord, NetConnection, StatusRecord};

/// Per-tick counters the collector reports to the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickCounts {
    pub agents_found: usize,
    pub samples_written: usize,
    pub statuses_written: usize,
    pub fds_written: usize,
    pub conns_written: usize,
    pub alerts_written: usize,
    pub committed: bool,
}

pub struct Writer<'c> {
    conn: &'c Connection,
}

impl<'c> Writer<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Starts a new transaction. If this fails the tick writes nothing.
    pub fn begin(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| StoreError::TxnBegin(e.to_string()))
    }

    /// Commits the open transaction. On failure the caller must call
    /// `rollback` and report the tick as failed.
    pub fn commit(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| StoreError::TxnCommit(e.to_string()))
    }

    pub fn rollback(&self) -> Result<(), StoreError> {
        // Best effort: if the connection already left the transaction
        // (e.g. commit itself failed partway), this just errors and the
        // caller has nothing further to undo at the application layer.
        self.conn.execute_batch("ROLLBACK").ok();
        Ok(())
    }

    /// UPDATE-first, then INSERT only when the UPDATE touched zero rows.
    pub fn upsert_agent(
        &self,
        pid: i32,
        comm: &str,
        args: &str,
        now: i64,
    ) -> Result<(), StoreError> {
        let mut update = self
            .conn
            .prepare_cached(
                "UPDATE agent SET last_seen = ?1, args = ?2 WHERE pid = ?3 AND comm = ?4 AND alive = 1",
            )
            .map_err(|e| StoreError::Prepare(e.to_string()))?;
        let changed = update
            .execute(params![now, args, pid, comm])
            .map_err(|e| StoreError::Step(e.to_string()))?;

        if changed == 0 {
            let mut insert = self
                .conn
                .prepare_cached(
                    "INSERT INTO agent (pid, comm, args, first_seen, last_seen, alive) \
                     VALUES (?1, ?2, ?3, ?4, ?4, 1)",
                )
                .map_err(|e| StoreError::Prepare(e.to_string()))?;
            insert
                .execute(params![pid, comm, args, now])
                .map_err(|e| StoreError::Step(e.to_string()))?;
        }
        Ok(())
    }

    pub fn write_sample(
        &self,
        ts: i64,
        pid: i32,
        user: &str,
        cpu: f64,
        mem: f64,
        rss_kb: i64,
        stat: &str,
        etimes: i64,
        comm: &str,
        args: &str,
    ) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO process_sample (ts, pid, user, cpu, mem, rss_kb, stat, etimes, comm, args) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .map_err(|e| StoreError::Prepare(e.to_string()))?;
        stmt.execute(params![ts, pid, user, cpu, mem, rss_kb, stat, etimes, comm, args])
            .map_err(|e| StoreError::Step(e.to_string()))?;
        Ok(())
    }

    pub fn write_status(&self, status: &StatusRecord) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO status_sample \
                 (pid, ts, state, threads, vm_rss_kb, vm_swap_kb, voluntary_ctxt_switches, nonvoluntary_ctxt_switches) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(|e| StoreError::Prepare(e.to_string()))?;
        stmt.execute(params![
            status.pid,
            status.ts,
            status.state,
            status.threads,
            status.vm_rss_kb,
            status.vm_swap_kb,
            status.voluntary_ctxt_switches,
            status.nonvoluntary_ctxt_switches,
        ])
        .map_err(|e| StoreError::Step(e.to_string()))?;
        Ok(())
    }

    pub fn write_fd(&self, fd: &FdRecord) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO fd_record (pid, ts, fd_num, fd_type, path) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(|e| StoreError::Prepare(e.to_string()))?;
        stmt.execute(params![fd.pid, fd.ts, fd.fd_num, fd.fd_type.as_str(), fd.path])
            .map_err(|e| StoreError::Step(e.to_string()))?;
        Ok(())
    }

    pub fn write_net(&self, conn: &NetConnection) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO net_connection \
                 (pid, ts, protocol, local_addr, local_port, remote_addr, remote_port, state) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(|e| StoreError::Prepare(e.to_string()))?;
        stmt.execute(params![
            conn.pid,
            conn.ts,
            conn.protocol,
            conn.local_addr,
            conn.local_port,
            conn.remote_addr,
            conn.remote_port,
            conn.state,
        ])
        .map_err(|e| StoreError::Step(e.to_string()))?;
        Ok(())
    }

    pub fn write_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO alert (ts, pid, severity, category, message, value, threshold) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(|e| StoreError::Prepare(e.to_string()))?;
        stmt.execute(params![
            alert.ts,
            alert.pid,
            alert.severity.as_str(),
            alert.category,
            alert.message,
            alert.value,
            alert.threshold,
        ])
        .map_err(|e| StoreError::Step(e.to_string()))?;
        Ok(())
    }

    /// Upsert by `(pid, comm)` primary key.
    pub fn upsert_fingerprint(&self, fp: &Fingerprint) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO fingerprint \
                 (pid, comm, avg_cpu, avg_rss_kb, avg_threads, avg_fd_count, avg_net_conns, dominant_phase, sample_count, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(pid, comm) DO UPDATE SET \
                 avg_cpu = excluded.avg_cpu, \
                 avg_rss_kb = excluded.avg_rss_kb, \
                 avg_threads = excluded.avg_threads, \
                 avg_fd_count = excluded.avg_fd_count, \
                 avg_net_conns = excluded.avg_net_conns, \
                 dominant_phase = excluded.dominant_phase, \
                 sample_count = excluded.sample_count, \
                 updated_at = excluded.updated_at",
            )
            .map_err(|e| StoreError::Prepare(e.to_string()))?;
        stmt.execute(params![
            fp.pid,
            fp.comm,
            fp.avg_cpu,
            fp.avg_rss_kb,
            fp.avg_threads,
            fp.avg_fd_count,
            fp.avg_net_conns,
            fp.dominant_phase.as_str(),
            fp.sample_count,
            fp.updated_at,
        ])
        .map_err(|e| StoreError::Step(e.to_string()))?;
        Ok(())
    }

    /// Never conflict-resolved: duplicate `(comm, label)` pairs are allowed.
    pub fn insert_baseline(
        &self,
        comm: &str,
        avg_cpu: f64,
        avg_rss_kb: f64,
        avg_threads: f64,
        avg_fd_count: f64,
        avg_net_conns: f64,
        dominant_phase: &str,
        created_at: i64,
        version: &str,
        label: &str,
    ) -> Result<(), StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "INSERT INTO fingerprint_baseline \
                 (comm, avg_cpu, avg_rss_kb, avg_threads, avg_fd_count, avg_net_conns, dominant_phase, created_at, version, label) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .map_err(|e| StoreError::Prepare(e.to_string()))?;
        stmt.execute(params![
            comm,
            avg_cpu,
            avg_rss_kb,
            avg_threads,
            avg_fd_count,
            avg_net_conns,
            dominant_phase,
            created_at,
            version,
            label,
        ])
        .map_err(|e| StoreError::Step(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn upsert_agent_is_idempotent_across_calls() {
        let store = Store::open_in_memory().unwrap();
        let writer = store.writer();
        for ts in [100, 105, 110] {
            writer.upsert_agent(42, "claude", "claude --resume", ts).unwrap();
        }
        let count: i64 = store
            .reader()
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM agent WHERE pid = 42 AND comm = 'claude' AND alive = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);

        let last_seen: i64 = store
            .reader()
            .conn()
            .query_row("SELECT last_seen FROM agent WHERE pid = 42", [], |r| r.get(0))
            .unwrap();
        assert_eq!(last_seen, 110);
    }

    #[test]
    fn commit_failure_leaves_no_partial_rows() {
        let store = Store::open_in_memory().unwrap();
        let writer = store.writer();
        writer.begin().unwrap();
        writer
            .write_sample(1, 1, "root", 10.0, 1.0, 1000, "S", 5, "claude", "")
            .unwrap();
        // simulate the transaction dying before commit
        writer.rollback().unwrap();

        let count: i64 = store
            .reader()
            .conn()
            .query_row("SELECT COUNT(*) FROM process_sample", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn committed_tick_persists_all_rows() {
        let store = Store::open_in_memory().unwrap();
        let writer = store.writer();
        writer.begin().unwrap();
        writer.upsert_agent(7, "codex", "", 50).unwrap();
        writer
            .write_sample(50, 7, "root", 5.0, 1.0, 2000, "S", 10, "codex", "")
            .unwrap();
        writer.commit().unwrap();

        let count: i64 = store
            .reader()
            .conn()
            .query_row("SELECT COUNT(*) FROM process_sample", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
