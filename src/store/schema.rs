//! Append-only idempotent DDL for the 9 core tables plus their indexes.
//! Column names and types are the portable, byte-compatible contract
//! other implementations of this store are expected to match.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS agent (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    pid         INTEGER NOT NULL,
    comm        TEXT NOT NULL,
    args        TEXT NOT NULL DEFAULT '',
    first_seen  INTEGER NOT NULL,
    last_seen   INTEGER NOT NULL,
    alive       INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_agent_pid_comm ON agent(pid, comm);
CREATE INDEX IF NOT EXISTS idx_agent_alive ON agent(alive);

CREATE TABLE IF NOT EXISTS process_sample (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    ts       INTEGER NOT NULL,
    pid      INTEGER NOT NULL,
    user     TEXT NOT NULL DEFAULT '',
    cpu      REAL NOT NULL DEFAULT 0,
    mem      REAL NOT NULL DEFAULT 0,
    rss_kb   INTEGER NOT NULL DEFAULT 0,
    stat     TEXT NOT NULL DEFAULT '?',
    etimes   INTEGER NOT NULL DEFAULT 0,
    comm     TEXT NOT NULL DEFAULT '',
    args     TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_process_sample_ts ON process_sample(ts);
CREATE INDEX IF NOT EXISTS idx_process_sample_pid ON process_sample(pid);
CREATE INDEX IF NOT EXISTS idx_process_sample_ts_pid ON process_sample(ts, pid);

CREATE TABLE IF NOT EXISTS status_sample (
    id                          INTEGER PRIMARY KEY AUTOINCREMENT,
    pid                         INTEGER NOT NULL,
    ts                          INTEGER NOT NULL,
    state                       TEXT NOT NULL DEFAULT '',
    threads                     INTEGER NOT NULL DEFAULT 0,
    vm_rss_kb                   INTEGER NOT NULL DEFAULT 0,
    vm_swap_kb                  INTEGER NOT NULL DEFAULT 0,
    voluntary_ctxt_switches     INTEGER NOT NULL DEFAULT 0,
    nonvoluntary_ctxt_switches  INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_status_sample_ts ON status_sample(ts);
CREATE INDEX IF NOT EXISTS idx_status_sample_pid ON status_sample(pid);

CREATE TABLE IF NOT EXISTS fd_record (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    pid      INTEGER NOT NULL,
    ts       INTEGER NOT NULL,
    fd_num   INTEGER NOT NULL,
    fd_type  TEXT NOT NULL,
    path     TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_fd_record_ts ON fd_record(ts);
CREATE INDEX IF NOT EXISTS idx_fd_record_pid ON fd_record(pid);

CREATE TABLE IF NOT EXISTS net_connection (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    pid           INTEGER NOT NULL,
    ts            INTEGER NOT NULL,
    protocol      TEXT NOT NULL,
    local_addr    TEXT NOT NULL DEFAULT '',
    local_port    INTEGER NOT NULL DEFAULT 0,
    remote_addr   TEXT NOT NULL DEFAULT '',
    remote_port   INTEGER NOT NULL DEFAULT 0,
    state         TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_net_connection_ts ON net_connection(ts);
CREATE INDEX IF NOT EXISTS idx_net_connection_pid ON net_connection(pid);

CREATE TABLE IF NOT EXISTS metric_rollup (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    pid        INTEGER NOT NULL,
    ts_bucket  INTEGER NOT NULL,
    metric     TEXT NOT NULL,
    avg_value  REAL NOT NULL DEFAULT 0,
    max_value  REAL NOT NULL DEFAULT 0,
    sample_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_metric_rollup_ts ON metric_rollup(ts_bucket);
CREATE INDEX IF NOT EXISTS idx_metric_rollup_pid ON metric_rollup(pid);

CREATE TABLE IF NOT EXISTS alert (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    ts         INTEGER NOT NULL,
    pid        INTEGER NOT NULL,
    severity   TEXT NOT NULL,
    category   TEXT NOT NULL,
    message    TEXT NOT NULL DEFAULT '',
    value      REAL NOT NULL DEFAULT 0,
    threshold  REAL NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_alert_ts ON alert(ts);
CREATE INDEX IF NOT EXISTS idx_alert_pid ON alert(pid);

CREATE TABLE IF NOT EXISTS fingerprint (
    pid             INTEGER NOT NULL,
    comm            TEXT NOT NULL,
    avg_cpu         REAL NOT NULL DEFAULT 0,
    avg_rss_kb      REAL NOT NULL DEFAULT 0,
    avg_threads     REAL NOT NULL DEFAULT 0,
    avg_fd_count    REAL NOT NULL DEFAULT 0,
    avg_net_conns   REAL NOT NULL DEFAULT 0,
    dominant_phase  TEXT NOT NULL DEFAULT 'idle',
    sample_count    INTEGER NOT NULL DEFAULT 0,
    updated_at      INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (pid, comm)
);

CREATE TABLE IF NOT EXISTS fingerprint_baseline (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    comm            TEXT NOT NULL,
    avg_cpu         REAL NOT NULL DEFAULT 0,
    avg_rss_kb      REAL NOT NULL DEFAULT 0,
    avg_threads     REAL NOT NULL DEFAULT 0,
    avg_fd_count    REAL NOT NULL DEFAULT 0,
    avg_net_conns   REAL NOT NULL DEFAULT 0,
    dominant_phase  TEXT NOT NULL DEFAULT 'idle',
    created_at      INTEGER NOT NULL,
    version         TEXT NOT NULL DEFAULT '1.0',
    label           TEXT NOT NULL DEFAULT 'default'
);
CREATE INDEX IF NOT EXISTS idx_fingerprint_baseline_comm_label ON fingerprint_baseline(comm, label);
"#;
