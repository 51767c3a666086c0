//! `ProcSource` — the platform capability for reading per-PID and kernel
//! process state. Linux is specified in full (`spec.md` §4.2); other
//! platforms would add sibling modules behind the same trait, chosen at
//! build time (no runtime reflection).

mod fs;
pub mod linux;
mod parser;

#[cfg(test)]
pub mod mock;

pub use fs::{FileSystem, RealFs};
pub use linux::LinuxProcSource;

use crate::model::{FdRecord, NetConnection, StatusRecord};

/// All `/proc` read/parse failures map to one of these, per `spec.md` §7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcSourceError {
    /// A read (or parse) failed while the file was expected to exist.
    ProcRead(String),
    /// A specific numeric/structural parse failed.
    Parse(String),
}

impl std::fmt::Display for ProcSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcSourceError::ProcRead(msg) => write!(f, "proc read error: {msg}"),
            ProcSourceError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ProcSourceError {}

/// Parsed `/proc/<pid>/stat` counters (`spec.md` §4.2).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatInfo {
    pub pid: i32,
    pub comm: String,
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    pub num_threads: i32,
    /// Kernel ticks since boot.
    pub starttime: u64,
    pub rss_pages: i64,
    pub vsize: u64,
}

/// Platform capability: list PIDs, read per-PID metadata. Every reader
/// consumes a PID and returns owned memory; all read errors map to
/// `ProcSourceError`.
pub trait ProcSource {
    fn list_pids(&self) -> Result<Vec<i32>, ProcSourceError>;

    /// Short process name, trimmed of trailing newline. `"unknown"` on
    /// failure.
    fn read_comm(&self, pid: i32) -> String;

    /// NUL-separated argv joined with single spaces, trailing spaces
    /// stripped. Empty string allowed.
    fn read_cmdline(&self, pid: i32) -> String;

    fn read_stat(&self, pid: i32) -> Result<StatInfo, ProcSourceError>;

    fn read_status(&self, pid: i32, ts: i64) -> Result<StatusRecord, ProcSourceError>;

    fn list_fds(&self, pid: i32, ts: i64) -> Result<Vec<FdRecord>, ProcSourceError>;

    fn read_net_connections(&self, pid: i32, ts: i64)
    -> Result<Vec<NetConnection>, ProcSourceError>;

    fn read_exe_path(&self, pid: i32) -> Result<String, ProcSourceError>;
    fn read_cwd(&self, pid: i32) -> Result<String, ProcSourceError>;
    fn read_environ(&self, pid: i32) -> Result<String, ProcSourceError>;

    fn get_boot_time(&self) -> Result<i64, ProcSourceError>;

    /// Ticks-per-second is a platform constant (100 on Linux).
    fn get_clk_tck(&self) -> i64;
}
