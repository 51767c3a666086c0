//! Per-tick, per-PID records: samples, kernel status, fds, sockets, agents.

/// One tick's metrics for one PID.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub ts: i64,
    pub pid: i32,
    pub user: String,
    /// Percent CPU over the process's lifetime of elapsed seconds.
    pub cpu: f64,
    pub mem: f64,
    pub rss_kb: i64,
    /// Single-letter process state, or `"?"` when the read/parse failed.
    pub stat: String,
    /// Seconds since process start.
    pub etimes: i64,
    pub comm: String,
    pub args: String,
}

impl ProcessSample {
    /// A zeroed placeholder used when `/proc/<pid>/stat` could not be read
    /// or parsed, per `spec.md` §4.2 — the PID was proven to exist by the
    /// scan, so the collector keeps it rather than dropping it.
    pub fn zeroed(ts: i64, pid: i32) -> Self {
        Self {
            ts,
            pid,
            user: String::new(),
            cpu: 0.0,
            mem: 0.0,
            rss_kb: 0,
            stat: "?".to_string(),
            etimes: 0,
            comm: String::new(),
            args: String::new(),
        }
    }
}

/// Kernel-exposed status for one PID at one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusRecord {
    pub pid: i32,
    pub ts: i64,
    pub state: String,
    pub threads: i32,
    pub vm_rss_kb: i64,
    pub vm_swap_kb: i64,
    /// Monotonically non-decreasing per PID across ticks until PID reuse;
    /// consumers must treat a decrease as a reset (`spec.md` §3).
    pub voluntary_ctxt_switches: i64,
    pub nonvoluntary_ctxt_switches: i64,
}

/// Kind of open file descriptor, inferred from the symlink target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdType {
    Regular,
    Directory,
    Socket,
    Pipe,
    Device,
    AnonInode,
    Other,
}

impl FdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FdType::Regular => "regular",
            FdType::Directory => "directory",
            FdType::Socket => "socket",
            FdType::Pipe => "pipe",
            FdType::Device => "device",
            FdType::AnonInode => "anon_inode",
            FdType::Other => "other",
        }
    }

    /// Classifies by symlink-target prefix per `spec.md` §4.2.
    pub fn classify(target: &str) -> FdType {
        if target.starts_with("socket:") {
            FdType::Socket
        } else if target.starts_with("pipe:") {
            FdType::Pipe
        } else if target.starts_with("anon_inode:") {
            FdType::AnonInode
        } else if target.starts_with("/dev/") {
            FdType::Device
        } else if target.ends_with('/') {
            FdType::Directory
        } else if target.is_empty() {
            FdType::Other
        } else {
            FdType::Regular
        }
    }
}

/// One open file descriptor for one PID.
#[derive(Debug, Clone, PartialEq)]
pub struct FdRecord {
    pub pid: i32,
    pub ts: i64,
    pub fd_num: i32,
    pub fd_type: FdType,
    /// Symlink target, or synthetic `socket:[inode]` form.
    pub path: String,
}

/// One socket attributable to a PID by fd-inode match.
#[derive(Debug, Clone, PartialEq)]
pub struct NetConnection {
    pub pid: i32,
    pub ts: i64,
    pub protocol: String,
    pub local_addr: String,
    pub local_port: u16,
    pub remote_addr: String,
    pub remote_port: u16,
    pub state: String,
}

/// Deduplicated process identity across the lifetime of one `pid+comm`.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: i64,
    pub pid: i32,
    pub comm: String,
    pub args: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub alive: bool,
}
