//! Provider connectivity formatting

use chrono::{DateTime, Local, Utc};
use tabled::Tabled;

use crate::models::ConnectionStatus;
use crate::services::StatusBoard;

use super::format::{format_percentage, table, truncate};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Latency")]
    latency: String,
    #[tabled(rename = "Uptime")]
    uptime: String,
    #[tabled(rename = "Checked")]
    checked: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn state_label(reachable: bool) -> &'static str {
    if reachable {
        "online"
    } else {
        "offline"
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Format one round of connection tests
pub fn format_connection_statuses(statuses: &[ConnectionStatus]) -> String {
    let rows = statuses
        .iter()
        .map(|s| StatusRow {
            provider: s.provider.to_string(),
            status: state_label(s.reachable),
            latency: format!("{} ms", s.latency.as_millis()),
            uptime: String::new(),
            checked: String::new(),
            message: truncate(&s.message, 60),
        })
        .collect();
    table(rows, "No providers checked.")
}

/// Format the monitor board: latest state per provider and recent log lines
pub fn format_status_board(board: &StatusBoard, log_lines: usize) -> String {
    let rows: Vec<StatusRow> = board
        .snapshot()
        .into_iter()
        .map(|(at, s)| StatusRow {
            provider: s.provider.to_string(),
            status: state_label(s.reachable),
            latency: format!("{} ms", s.latency.as_millis()),
            uptime: board
                .uptime(s.provider)
                .percent()
                .map(format_percentage)
                .unwrap_or_default(),
            checked: local_time(at),
            message: truncate(&s.message, 60),
        })
        .collect();

    let mut output = format!("Round {}\n", board.rounds());
    output.push_str(&table(rows, "No results yet."));

    let log: Vec<_> = board.log().collect();
    if log_lines > 0 && !log.is_empty() {
        output.push('\n');
        for line in &log[log.len().saturating_sub(log_lines)..] {
            output.push_str(&format!(
                "[{}] {}: {} {}\n",
                local_time(line.at),
                line.provider,
                state_label(line.reachable),
                line.message
            ));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderId;
    use std::time::Duration;

    fn status(provider: ProviderId, reachable: bool) -> ConnectionStatus {
        ConnectionStatus {
            provider,
            reachable,
            message: if reachable { "OK".into() } else { "timed out".into() },
            latency: Duration::from_millis(120),
        }
    }

    #[test]
    fn test_round_table() {
        let out = format_connection_statuses(&[
            status(ProviderId::Momo, true),
            status(ProviderId::Visa, false),
        ]);
        assert!(out.contains("MoMo"));
        assert!(out.contains("online"));
        assert!(out.contains("offline"));
        assert!(out.contains("120 ms"));
    }

    #[test]
    fn test_board_shows_uptime_and_log_tail() {
        let mut board = StatusBoard::new(10);
        board.record_round(vec![status(ProviderId::Momo, true)]);
        board.record_round(vec![status(ProviderId::Momo, false)]);

        let out = format_status_board(&board, 1);
        assert!(out.starts_with("Round 2"));
        assert!(out.contains("50%"));
        assert_eq!(out.matches("timed out").count(), 2);
        assert_eq!(out.matches("] MoMo:").count(), 1);
    }

    #[test]
    fn test_empty_board() {
        let out = format_status_board(&StatusBoard::new(10), 5);
        assert!(out.contains("No results yet."));
    }
}
