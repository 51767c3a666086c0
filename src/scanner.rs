//! Filters the PID set exposed by a `ProcSource` down to the processes
//! worth watching.

use crate::procsource::ProcSource;

/// One PID that matched the configured pattern, with the strings the
/// collector needs without reading `/proc` twice.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedAgent {
    pub pid: i32,
    pub comm: String,
    pub cmdline: String,
}

/// Splits a pipe-separated pattern into lowercase, non-empty substrings.
fn split_pattern(pattern: &str) -> Vec<String> {
    pattern
        .split('|')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn matches(needles: &[String], comm: &str, cmdline: &str) -> bool {
    if needles.is_empty() {
        return false;
    }
    let comm_lower = comm.to_lowercase();
    let cmdline_lower = cmdline.to_lowercase();
    needles
        .iter()
        .any(|n| comm_lower.contains(n.as_str()) || cmdline_lower.contains(n.as_str()))
}

/// Scans the source for PIDs whose `comm` or `cmdline` contains any of the
/// pipe-separated, case-insensitive substrings in `pattern`. The calling
/// process's own PID is always excluded.
pub fn scan(source: &dyn ProcSource, pattern: &str, self_pid: i32) -> Vec<ScannedAgent> {
    let needles = split_pattern(pattern);
    let pids = match source.list_pids() {
        Ok(p) => p,
        Err(_) => return Vec::new(),
    };

    pids.into_iter()
        .filter(|&pid| pid != self_pid)
        .filter_map(|pid| {
            let comm = source.read_comm(pid);
            let cmdline = source.read_cmdline(pid);
            if matches(&needles, &comm, &cmdline) {
                Some(ScannedAgent { pid, comm, cmdline })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procsource::mock::MockFs;
    use crate::procsource::LinuxProcSource;

    fn wire(pid: i32, comm: &str, cmdline: &str) -> MockFs {
        let fs = MockFs::new();
        fs.set_file(&format!("/proc/{pid}/comm"), comm);
        fs.set_file(&format!("/proc/{pid}/cmdline"), cmdline);
        fs.add_dir_entry("/proc", &pid.to_string());
        fs
    }

    #[test]
    fn matches_by_comm() {
        let fs = wire(100, "claude\n", "");
        let source = LinuxProcSource::new(fs);
        let found = scan(&source, "codex|claude|gemini", 1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pid, 100);
    }

    #[test]
    fn matches_by_cmdline_case_insensitively() {
        let fs = wire(100, "python3\n", "python3\0/usr/bin/Codex-Agent\0");
        let source = LinuxProcSource::new(fs);
        let found = scan(&source, "codex", 1);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn excludes_self_pid() {
        let fs = wire(42, "claude\n", "");
        let source = LinuxProcSource::new(fs);
        let found = scan(&source, "claude", 42);
        assert!(found.is_empty());
    }

    #[test]
    fn empty_pattern_matches_nothing() {
        let fs = wire(100, "claude\n", "");
        let source = LinuxProcSource::new(fs);
        assert!(scan(&source, "", 1).is_empty());
        assert!(scan(&source, "|||", 1).is_empty());
    }

    #[test]
    fn no_match_excluded() {
        let fs = wire(100, "bash\n", "/bin/bash\0");
        let source = LinuxProcSource::new(fs);
        assert!(scan(&source, "codex|claude", 1).is_empty());
    }
}
