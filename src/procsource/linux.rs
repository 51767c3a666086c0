//! Linux `ProcSource`: reads `/proc` through an injected `FileSystem` so
//! the real tree and a mock tree run the exact same parsing path.

use std::path::PathBuf;

use super::fs::FileSystem;
use super::parser::{
    parse_net_table, parse_stat_line, parse_status_map, socket_inode_from_link, status_field_str,
    status_field_u64,
};
use super::{ProcSource, ProcSourceError, StatInfo};
use crate::model::{FdRecord, FdType, NetConnection, StatusRecord};

/// USER_HZ, the kernel clock tick rate used by `/proc/<pid>/stat` counters.
/// Standard value on Linux.
const CLK_TCK: i64 = 100;

/// Page size used to convert `/proc/<pid>/stat` RSS pages to kilobytes.
const PAGE_SIZE_BYTES: i64 = 4096;

pub struct LinuxProcSource<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
}

impl<F: FileSystem> LinuxProcSource<F> {
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            proc_path: PathBuf::from("/proc"),
        }
    }

    pub fn with_proc_path(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    fn pid_path(&self, pid: i32, leaf: &str) -> PathBuf {
        self.proc_path.join(pid.to_string()).join(leaf)
    }

    /// Socket inodes currently open by `pid`, gathered by listing its fd
    /// table rather than trusting a cached set — sockets churn fast.
    fn socket_inodes(&self, pid: i32) -> Vec<u64> {
        let dir = self.pid_path(pid, "fd");
        let entries = match self.fs.read_dir(&dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        entries
            .iter()
            .filter_map(|p| self.fs.read_link(p).ok())
            .filter_map(|target| socket_inode_from_link(&target.to_string_lossy()))
            .collect()
    }
}

impl<F: FileSystem> ProcSource for LinuxProcSource<F> {
    fn list_pids(&self) -> Result<Vec<i32>, ProcSourceError> {
        let entries = self
            .fs
            .read_dir(&self.proc_path)
            .map_err(|e| ProcSourceError::ProcRead(e.to_string()))?;
        let mut pids: Vec<i32> = entries
            .iter()
            .filter_map(|p| p.file_name())
            .filter_map(|n| n.to_str())
            .filter_map(|n| n.parse::<i32>().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn read_comm(&self, pid: i32) -> String {
        self.fs
            .read_to_string(&self.pid_path(pid, "comm"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn read_cmdline(&self, pid: i32) -> String {
        self.fs
            .read_to_string(&self.pid_path(pid, "cmdline"))
            .unwrap_or_default()
            .replace('\0', " ")
            .trim()
            .to_string()
    }

    fn read_stat(&self, pid: i32) -> Result<StatInfo, ProcSourceError> {
        let content = self
            .fs
            .read_to_string(&self.pid_path(pid, "stat"))
            .map_err(|e| ProcSourceError::ProcRead(e.to_string()))?;
        parse_stat_line(content.trim_end())
    }

    fn read_status(&self, pid: i32, ts: i64) -> Result<StatusRecord, ProcSourceError> {
        let content = self
            .fs
            .read_to_string(&self.pid_path(pid, "status"))
            .map_err(|e| ProcSourceError::ProcRead(e.to_string()))?;
        let map = parse_status_map(&content);
        let state_raw = status_field_str(&map, "State");
        let state = state_raw
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();

        Ok(StatusRecord {
            pid,
            ts,
            state,
            threads: status_field_u64(&map, "Threads") as i32,
            vm_rss_kb: status_field_u64(&map, "VmRSS"),
            vm_swap_kb: status_field_u64(&map, "VmSwap"),
            voluntary_ctxt_switches: status_field_u64(&map, "voluntary_ctxt_switches"),
            nonvoluntary_ctxt_switches: status_field_u64(&map, "nonvoluntary_ctxt_switches"),
        })
    }

    fn list_fds(&self, pid: i32, ts: i64) -> Result<Vec<FdRecord>, ProcSourceError> {
        let dir = self.pid_path(pid, "fd");
        let entries = self
            .fs
            .read_dir(&dir)
            .map_err(|e| ProcSourceError::ProcRead(e.to_string()))?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let fd_num: i32 = match entry.file_name().and_then(|n| n.to_str()) {
                Some(n) => match n.parse() {
                    Ok(v) => v,
                    Err(_) => continue,
                },
                None => continue,
            };
            let target = self
                .fs
                .read_link(&entry)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
            let fd_type = FdType::classify(&target);
            records.push(FdRecord {
                pid,
                ts,
                fd_num,
                fd_type,
                path: target,
            });
        }
        Ok(records)
    }

    fn read_net_connections(
        &self,
        pid: i32,
        ts: i64,
    ) -> Result<Vec<NetConnection>, ProcSourceError> {
        let inodes = self.socket_inodes(pid);
        if inodes.is_empty() {
            return Ok(Vec::new());
        }

        let tables: [(&str, &str); 4] = [
            ("tcp", "net/tcp"),
            ("tcp6", "net/tcp6"),
            ("udp", "net/udp"),
            ("udp6", "net/udp6"),
        ];

        let mut conns = Vec::new();
        for (protocol, leaf) in tables {
            let path = self.proc_path.join(leaf);
            let content = match self.fs.read_to_string(&path) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for row in parse_net_table(&content) {
                if inodes.contains(&row.inode) {
                    conns.push(NetConnection {
                        pid,
                        ts,
                        protocol: protocol.to_string(),
                        local_addr: row.local_addr,
                        local_port: row.local_port,
                        remote_addr: row.remote_addr,
                        remote_port: row.remote_port,
                        state: row.state,
                    });
                }
            }
        }
        Ok(conns)
    }

    fn read_exe_path(&self, pid: i32) -> Result<String, ProcSourceError> {
        self.fs
            .read_link(&self.pid_path(pid, "exe"))
            .map(|p| p.to_string_lossy().to_string())
            .map_err(|e| ProcSourceError::ProcRead(e.to_string()))
    }

    fn read_cwd(&self, pid: i32) -> Result<String, ProcSourceError> {
        self.fs
            .read_link(&self.pid_path(pid, "cwd"))
            .map(|p| p.to_string_lossy().to_string())
            .map_err(|e| ProcSourceError::ProcRead(e.to_string()))
    }

    fn read_environ(&self, pid: i32) -> Result<String, ProcSourceError> {
        self.fs
            .read_to_string(&self.pid_path(pid, "environ"))
            .map(|s| s.replace('\0', "\n"))
            .map_err(|e| ProcSourceError::ProcRead(e.to_string()))
    }

    fn get_boot_time(&self) -> Result<i64, ProcSourceError> {
        let path = self.proc_path.join("stat");
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| ProcSourceError::ProcRead(e.to_string()))?;
        content
            .lines()
            .find_map(|l| l.strip_prefix("btime "))
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| ProcSourceError::Parse("missing btime in /proc/stat".to_string()))
    }

    fn get_clk_tck(&self) -> i64 {
        CLK_TCK
    }
}

/// CPU utilization as a percentage of the process's own lifetime, matching
/// `ps`'s `%cpu` convention: `100 * (utime+stime)/HZ / elapsed_seconds`.
pub fn cpu_percent(stat: &StatInfo, clk_tck: i64, elapsed_secs: i64) -> f64 {
    if elapsed_secs <= 0 || clk_tck <= 0 {
        return 0.0;
    }
    let total_ticks = (stat.utime + stat.stime) as f64;
    100.0 * (total_ticks / clk_tck as f64) / elapsed_secs as f64
}

pub fn rss_kb(stat: &StatInfo) -> i64 {
    stat.rss_pages.max(0) * PAGE_SIZE_BYTES / 1024
}

/// Seconds since `starttime` (in kernel ticks since boot), given boot time
/// and current wall-clock time.
pub fn elapsed_secs(stat: &StatInfo, boot_time: i64, clk_tck: i64, now: i64) -> i64 {
    if clk_tck <= 0 {
        return 0;
    }
    let started_at = boot_time + (stat.starttime as i64 / clk_tck);
    (now - started_at).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procsource::mock::MockFs;

    fn sample_stat(pid: i32, content: &str) -> MockFs {
        let fs = MockFs::new();
        fs.set_file(&format!("/proc/{pid}/stat"), content);
        fs
    }

    #[test]
    fn reads_and_parses_stat() {
        let fs = sample_stat(
            7,
            "7 (agentd) S 1 7 7 0 -1 4194304 100 0 0 0 20 10 0 0 20 0 1 0 1000 \
             4096000 250 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0",
        );
        let source = LinuxProcSource::new(fs);
        let stat = source.read_stat(7).unwrap();
        assert_eq!(stat.comm, "agentd");
        assert_eq!(stat.utime, 20);
        assert_eq!(stat.num_threads, 1);
    }

    #[test]
    fn missing_stat_file_is_proc_read_error() {
        let fs = MockFs::new();
        let source = LinuxProcSource::new(fs);
        assert!(matches!(
            source.read_stat(404),
            Err(ProcSourceError::ProcRead(_))
        ));
    }

    #[test]
    fn list_pids_filters_non_numeric_entries() {
        let fs = MockFs::new();
        fs.set_file("/proc/1/stat", "1 (init) S 0 0 0 0 -1 0 0 0 0 0 0 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0");
        fs.set_file("/proc/9/stat", "9 (agentd) S 0 0 0 0 -1 0 0 0 0 0 0 0 0 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0");
        fs.add_dir_entry("/proc", "1");
        fs.add_dir_entry("/proc", "9");
        fs.add_dir_entry("/proc", "self");
        let source = LinuxProcSource::new(fs);
        assert_eq!(source.list_pids().unwrap(), vec![1, 9]);
    }

    #[test]
    fn cpu_percent_is_zero_for_no_elapsed_time() {
        let stat = StatInfo {
            utime: 100,
            stime: 50,
            ..Default::default()
        };
        assert_eq!(cpu_percent(&stat, 100, 0), 0.0);
    }

    #[test]
    fn cpu_percent_matches_expected_ratio() {
        let stat = StatInfo {
            utime: 100,
            stime: 100,
            ..Default::default()
        };
        // 200 ticks / 100 HZ = 2s of CPU time over 10s elapsed = 20%.
        assert!((cpu_percent(&stat, 100, 10) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn rss_kb_converts_pages_to_kilobytes() {
        let stat = StatInfo {
            rss_pages: 256,
            ..Default::default()
        };
        assert_eq!(rss_kb(&stat), 256 * 4096 / 1024);
    }
}
