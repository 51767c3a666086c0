//! Pure heuristics over one tick's FD and connection inventory. Invoked
//! by the collector; never touches `/proc` or the store itself.

use crate::model::{Alert, FdRecord, NetConnection, Severity};

const CREDENTIAL_PATTERNS: &[&str] = &[
    ".ssh/",
    ".aws/",
    ".env",
    "keyring",
    ".gnupg/",
    ".config/gcloud/",
    "credentials",
    ".npmrc",
    ".pypirc",
    "id_rsa",
    "id_ed25519",
    ".kube/config",
];

/// Common outbound ports an agent talking to its own API provider would
/// use; anything else on an ESTABLISHED connection is flagged `info`.
const EXPECTED_REMOTE_PORTS: &[u16] = &[0, 53, 80, 443, 8080, 8443];

/// At most one finding per FD row.
pub fn audit_fds(fds: &[FdRecord], ts: i64) -> Vec<Alert> {
    fds.iter()
        .filter(|fd| CREDENTIAL_PATTERNS.iter().any(|p| fd.path.contains(p)))
        .map(|fd| Alert {
            ts,
            pid: fd.pid,
            severity: Severity::Warning,
            category: "security:credential_access".to_string(),
            message: format!("fd {} targets a credential-like path: {}", fd.fd_num, fd.path),
            value: 0.0,
            threshold: 0.0,
        })
        .collect()
}

pub fn audit_connections(conns: &[NetConnection], ts: i64) -> Vec<Alert> {
    conns
        .iter()
        .filter_map(|c| match c.state.as_str() {
            "LISTEN" => Some(Alert {
                ts,
                pid: c.pid,
                severity: if c.local_port < 1024 {
                    Severity::Warning
                } else {
                    Severity::Info
                },
                category: "security:listening_port".to_string(),
                message: format!("listening on {}:{}", c.local_addr, c.local_port),
                value: 0.0,
                threshold: 0.0,
            }),
            "ESTABLISHED" if !EXPECTED_REMOTE_PORTS.contains(&c.remote_port) => Some(Alert {
                ts,
                pid: c.pid,
                severity: Severity::Info,
                category: "security:unexpected_network".to_string(),
                message: format!("established connection to {}:{}", c.remote_addr, c.remote_port),
                value: 0.0,
                threshold: 0.0,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fd(pid: i32, path: &str) -> FdRecord {
        FdRecord {
            pid,
            ts: 0,
            fd_num: 3,
            fd_type: crate::model::FdType::Regular,
            path: path.to_string(),
        }
    }

    fn conn(pid: i32, state: &str, local_port: u16, remote_port: u16) -> NetConnection {
        NetConnection {
            pid,
            ts: 0,
            protocol: "tcp".to_string(),
            local_addr: "0.0.0.0".to_string(),
            local_port,
            remote_addr: "1.2.3.4".to_string(),
            remote_port,
            state: state.to_string(),
        }
    }

    #[test]
    fn flags_ssh_key_access() {
        let findings = audit_fds(&[fd(1, "/home/user/.ssh/id_rsa")], 100);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "security:credential_access");
    }

    #[test]
    fn ignores_unrelated_paths() {
        let findings = audit_fds(&[fd(1, "/tmp/scratch.txt")], 100);
        assert!(findings.is_empty());
    }

    #[test]
    fn low_port_listen_is_warning() {
        let findings = audit_connections(&[conn(1, "LISTEN", 22, 0)], 100);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn high_port_listen_is_info() {
        let findings = audit_connections(&[conn(1, "LISTEN", 9000, 0)], 100);
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn established_to_expected_port_is_silent() {
        let findings = audit_connections(&[conn(1, "ESTABLISHED", 0, 443)], 100);
        assert!(findings.is_empty());
    }

    #[test]
    fn established_to_unexpected_port_is_info() {
        let findings = audit_connections(&[conn(1, "ESTABLISHED", 0, 6000)], 100);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "security:unexpected_network");
    }
}
