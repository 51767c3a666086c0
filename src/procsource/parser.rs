//! Pure parsers for `/proc` text formats. Kept free of I/O so they can be
//! unit-tested directly against fixture strings.

use super::{ProcSourceError, StatInfo};
use std::collections::HashMap;

/// Parses one `/proc/<pid>/stat` line. Must find the *last* `)` to split
/// the `(comm)` field, since `comm` itself may contain spaces or parens.
pub fn parse_stat_line(line: &str) -> Result<StatInfo, ProcSourceError> {
    let open = line.find('(').ok_or_else(|| {
        ProcSourceError::Parse("missing '(' in stat line".to_string())
    })?;
    let close = line.rfind(')').ok_or_else(|| {
        ProcSourceError::Parse("missing ')' in stat line".to_string())
    })?;
    if close < open {
        return Err(ProcSourceError::Parse("malformed comm field".to_string()));
    }

    let pid_str = line[..open].trim();
    let pid: i32 = pid_str
        .parse()
        .map_err(|_| ProcSourceError::Parse(format!("bad pid field '{pid_str}'")))?;
    let comm = line[open + 1..close].to_string();

    let rest: Vec<&str> = line[close + 1..].split_whitespace().collect();
    // rest[0] = state, rest[1] = ppid, ... fields are 0-indexed from state (field 3).
    if rest.len() < 20 {
        return Err(ProcSourceError::Parse(
            "stat line has too few fields after comm".to_string(),
        ));
    }

    let state = rest[0].chars().next().unwrap_or('?');
    let utime: u64 = parse_field(rest, 11)?;
    let stime: u64 = parse_field(rest, 12)?;
    let num_threads: i32 = parse_field(rest, 17)?;
    let starttime: u64 = parse_field(rest, 19)?;
    let vsize: u64 = parse_field(rest, 20).unwrap_or(0);
    let rss_pages: i64 = parse_field(rest, 21).unwrap_or(0);

    Ok(StatInfo {
        pid,
        comm,
        state,
        utime,
        stime,
        num_threads,
        starttime,
        rss_pages,
        vsize,
    })
}

/// `rest` is 0-indexed starting at the `state` field (which is field 3 of
/// the whole `/proc/<pid>/stat` record); `field_after_state` counts fields
/// after state, so `utime` (field 14 overall) is index 11 here.
fn parse_field<T: std::str::FromStr>(
    rest: &[&str],
    field_after_state: usize,
) -> Result<T, ProcSourceError> {
    rest.get(field_after_state)
        .ok_or_else(|| ProcSourceError::Parse(format!("missing field {field_after_state}")))?
        .parse()
        .map_err(|_| ProcSourceError::Parse(format!("bad field {field_after_state}")))
}

/// Parses `/proc/<pid>/status` into a key->value map (colon-separated,
/// first whitespace-delimited token of the value used for numeric fields).
pub fn parse_status_map(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

pub fn status_field_u64(map: &HashMap<String, String>, key: &str) -> i64 {
    map.get(key)
        .and_then(|v| v.split_whitespace().next())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

pub fn status_field_str(map: &HashMap<String, String>, key: &str) -> String {
    map.get(key).cloned().unwrap_or_default()
}

/// One row of a `/proc/net/{tcp,tcp6,udp,udp6}` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NetTableRow {
    pub inode: u64,
    pub local_addr: String,
    pub local_port: u16,
    pub remote_addr: String,
    pub remote_port: u16,
    pub state: String,
}

/// Fixed per-state code mapping (`spec.md` §4.2): `0x01` ESTABLISHED ...
/// `0x0B` CLOSING.
pub fn tcp_state_name(code: u8) -> &'static str {
    match code {
        0x01 => "ESTABLISHED",
        0x02 => "SYN_SENT",
        0x03 => "SYN_RECV",
        0x04 => "FIN_WAIT1",
        0x05 => "FIN_WAIT2",
        0x06 => "TIME_WAIT",
        0x07 => "CLOSE",
        0x08 => "CLOSE_WAIT",
        0x09 => "LAST_ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        _ => "UNKNOWN",
    }
}

/// Parses a `/proc/net/{tcp,tcp6,udp,udp6}` table body (header line
/// skipped by the caller or detected here by the leading `sl` column).
pub fn parse_net_table(content: &str) -> Vec<NetTableRow> {
    let mut rows = Vec::new();
    for line in content.lines() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 10 || cols[0] == "sl" {
            continue;
        }
        let Some((local_addr, local_port)) = parse_hex_addr_port(cols[1]) else {
            continue;
        };
        let Some((remote_addr, remote_port)) = parse_hex_addr_port(cols[2]) else {
            continue;
        };
        let state_code = u8::from_str_radix(cols[3], 16).unwrap_or(0);
        let inode: u64 = cols[9].parse().unwrap_or(0);

        rows.push(NetTableRow {
            inode,
            local_addr,
            local_port,
            remote_addr,
            remote_port,
            state: tcp_state_name(state_code).to_string(),
        });
    }
    rows
}

/// Parses a `<hex-addr>:<hex-port>` column from a `/proc/net/*` table.
/// Handles both IPv4 (8 hex chars, little-endian dword) and IPv6 (32 hex
/// chars, four little-endian dwords) forms.
fn parse_hex_addr_port(col: &str) -> Option<(String, u16)> {
    let (addr_hex, port_hex) = col.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;

    let addr = if addr_hex.len() == 8 {
        let raw = u32::from_str_radix(addr_hex, 16).ok()?;
        let bytes = raw.to_le_bytes();
        format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    } else if addr_hex.len() == 32 {
        let mut words = [0u32; 4];
        for (i, word) in words.iter_mut().enumerate() {
            let chunk = &addr_hex[i * 8..i * 8 + 8];
            *word = u32::from_str_radix(chunk, 16).ok()?;
        }
        let mut bytes = [0u8; 16];
        for (i, w) in words.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        std::net::Ipv6Addr::from(bytes).to_string()
    } else {
        return None;
    };

    Some((addr, port))
}

/// Extracts the `socket:[<inode>]` target of an fd symlink, if it is one.
pub fn socket_inode_from_link(target: &str) -> Option<u64> {
    let inner = target.strip_prefix("socket:[")?.strip_suffix(']')?;
    inner.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stat_line_with_simple_comm() {
        let line = "1234 (bash) S 1 1234 1234 0 -1 4194304 100 0 0 0 10 5 0 0 20 0 1 0 50000 \
                     5000000 200 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";
        let info = parse_stat_line(line).unwrap();
        assert_eq!(info.pid, 1234);
        assert_eq!(info.comm, "bash");
        assert_eq!(info.state, 'S');
        assert_eq!(info.utime, 10);
        assert_eq!(info.stime, 5);
        assert_eq!(info.num_threads, 1);
        assert_eq!(info.starttime, 50000);
    }

    #[test]
    fn parses_stat_line_with_parens_and_spaces_in_comm() {
        let line = "42 ((my) weird proc)) R 1 42 42 0 -1 4194304 100 0 0 0 1 2 0 0 20 0 3 0 99 \
                     1000 50 0 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";
        let info = parse_stat_line(line).unwrap();
        assert_eq!(info.pid, 42);
        assert_eq!(info.comm, "(my) weird proc)");
        assert_eq!(info.state, 'R');
    }

    #[test]
    fn missing_close_paren_fails() {
        assert!(parse_stat_line("1234 (bash S 1").is_err());
    }

    #[test]
    fn status_map_defaults_missing_keys() {
        let map = parse_status_map("Name:\tbash\nThreads:\t4\n");
        assert_eq!(status_field_str(&map, "Name"), "bash");
        assert_eq!(status_field_u64(&map, "Threads"), 4);
        assert_eq!(status_field_u64(&map, "VmSwap"), 0);
        assert_eq!(status_field_str(&map, "Missing"), "");
    }

    #[test]
    fn tcp_state_code_mapping() {
        assert_eq!(tcp_state_name(0x01), "ESTABLISHED");
        assert_eq!(tcp_state_name(0x0A), "LISTEN");
        assert_eq!(tcp_state_name(0x0B), "CLOSING");
        assert_eq!(tcp_state_name(0xFF), "UNKNOWN");
    }

    #[test]
    fn parses_ipv4_net_table_row() {
        let content = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 12345 1 0000000000000000 100 0 0 10 0";
        let rows = parse_net_table(content);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].local_addr, "127.0.0.1");
        assert_eq!(rows[0].local_port, 0x1F90);
        assert_eq!(rows[0].state, "LISTEN");
        assert_eq!(rows[0].inode, 12345);
    }

    #[test]
    fn extracts_socket_inode_from_link() {
        assert_eq!(socket_inode_from_link("socket:[12345]"), Some(12345));
        assert_eq!(socket_inode_from_link("/dev/null"), None);
    }
}
