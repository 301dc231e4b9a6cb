// Security log analyzer: failed-auth and firewall-drop detection over the
// recent log window. Counts are recomputed from scratch for every batch.

use crate::client::{Record, field};
use crate::models::{SecurityEvent, SecurityEventKind, SecuritySummary, Severity};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogLine {
    pub time: String,
    /// Comma-separated topic list, e.g. "system,error,critical".
    pub topics: String,
    pub message: String,
}

impl LogLine {
    pub fn from_record(r: &Record) -> Self {
        Self {
            time: field(r, "time").to_string(),
            topics: field(r, "topics").to_string(),
            message: field(r, "message").to_string(),
        }
    }
}

/// Router log rows arrive oldest-first; keep the newest `limit`, newest first.
pub fn recent_lines(records: &[Record], limit: usize) -> Vec<LogLine> {
    records
        .iter()
        .rev()
        .take(limit)
        .map(LogLine::from_record)
        .collect()
}

/// Zero, one or two events per line: at most one auth event plus at most one firewall event.
pub fn classify_line(line: &LogLine) -> Vec<SecurityEvent> {
    let message = line.message.to_lowercase();
    let topics = line.topics.to_lowercase();
    let mut events = Vec::new();

    let auth = if message.contains("login failure")
        || (message.contains("login") && message.contains("failed"))
    {
        Some((SecurityEventKind::FailedLogin, Severity::High))
    } else if message.contains("authentication failed") || message.contains("invalid user") {
        Some((SecurityEventKind::AuthFailed, Severity::High))
    } else if topics.contains("critical") && message.contains("login") {
        Some((SecurityEventKind::FailedLogin, Severity::Critical))
    } else {
        None
    };
    if let Some((kind, severity)) = auth {
        events.push(event(line, kind, severity));
    }

    if topics.contains("firewall") || message.contains("blocked") || message.contains("dropped") {
        events.push(event(line, SecurityEventKind::FirewallBlock, Severity::Medium));
    }
    events
}

fn event(line: &LogLine, kind: SecurityEventKind, severity: Severity) -> SecurityEvent {
    SecurityEvent {
        time: line.time.clone(),
        kind,
        severity,
        message: line.message.clone(),
        source: source_of(line),
    }
}

/// Address after "from", else the first IPv4-looking token, else the topics.
fn source_of(line: &LogLine) -> String {
    let tokens: Vec<&str> = line.message.split_whitespace().collect();
    let after_from = tokens
        .windows(2)
        .find(|w| w[0].eq_ignore_ascii_case("from"))
        .and_then(|w| as_ipv4(w[1]));
    after_from
        .or_else(|| tokens.iter().find_map(|t| as_ipv4(t)))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| line.topics.clone())
}

fn as_ipv4(token: &str) -> Option<Ipv4Addr> {
    let t = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != ':');
    let host = t.split(':').next()?;
    host.parse().ok()
}

/// Analyze a most-recent-first batch. `display_limit` caps only the event list.
pub fn analyze(lines: &[LogLine], display_limit: usize) -> SecuritySummary {
    let mut summary = SecuritySummary::default();
    for line in lines {
        for e in classify_line(line) {
            match e.kind {
                SecurityEventKind::FailedLogin | SecurityEventKind::AuthFailed => {
                    summary.attack_count += 1
                }
                SecurityEventKind::FirewallBlock => summary.blocked_count += 1,
            }
            if summary.events.len() < display_limit {
                summary.events.push(e);
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(topics: &str, message: &str) -> LogLine {
        LogLine {
            time: "12:00:00".into(),
            topics: topics.into(),
            message: message.into(),
        }
    }

    fn batch() -> Vec<LogLine> {
        let mut lines: Vec<LogLine> = (0..25)
            .map(|i| line("system,info", &format!("user admin logged in via api #{}", i)))
            .collect();
        lines.push(line(
            "system,error,critical",
            "login failure for user root from 203.0.113.7 via ssh",
        ));
        lines.push(line("system,error", "Authentication failed for user guest"));
        lines.push(line("firewall,info", "input: in:ether1 src-mac 00:11:22:33:44:55"));
        lines.push(line("system,info", "connection from 198.51.100.2:5353 blocked"));
        lines.push(line("system,info", "packet dropped by rule 4"));
        lines
    }

    #[test]
    fn counts_failed_logins_and_blocks() {
        let lines = batch();
        assert_eq!(lines.len(), 30);
        let s = analyze(&lines, 20);
        assert_eq!(s.attack_count, 2);
        assert_eq!(s.blocked_count, 3);
        assert_eq!(s.events.len(), 5);
    }

    #[test]
    fn counts_are_per_batch_not_cumulative() {
        let first = analyze(&batch(), 20);
        assert_eq!(first.attack_count, 2);
        let second = analyze(&[line("system,info", "login failure for user x")], 20);
        assert_eq!(second.attack_count, 1);
        assert_eq!(second.blocked_count, 0);
    }

    #[test]
    fn event_list_is_capped_but_counts_are_not() {
        let lines: Vec<LogLine> = (0..30)
            .map(|i| line("firewall", &format!("drop #{}", i)))
            .collect();
        let s = analyze(&lines, 20);
        assert_eq!(s.blocked_count, 30);
        assert_eq!(s.events.len(), 20);
        assert_eq!(s.events[0].message, "drop #0");
    }

    #[test]
    fn classifies_kinds_and_sources() {
        let e = classify_line(&line("system", "login failure for user root from 203.0.113.7 via ssh"));
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].kind, SecurityEventKind::FailedLogin);
        assert_eq!(e[0].source, "203.0.113.7");

        let e = classify_line(&line("system", "invalid user oracle"));
        assert_eq!(e[0].kind, SecurityEventKind::AuthFailed);
        assert_eq!(e[0].source, "system");

        let e = classify_line(&line("system,critical", "login by admin"));
        assert_eq!(e[0].severity, Severity::Critical);

        let e = classify_line(&line("firewall", "login failed from 10.0.0.9:22"));
        assert_eq!(e.len(), 2);
        assert_eq!(e[0].source, "10.0.0.9");

        assert!(classify_line(&line("dhcp,info", "lease assigned")).is_empty());
    }

    #[test]
    fn recent_lines_are_newest_first_and_limited() {
        let records: Vec<Record> = (0..5)
            .map(|i| {
                let mut r = Record::new();
                r.insert("message".into(), format!("m{}", i));
                r
            })
            .collect();
        let lines = recent_lines(&records, 3);
        let msgs: Vec<&str> = lines.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(msgs, vec!["m4", "m3", "m2"]);
    }
}
