//! Small formatting helpers shared by the display modules

use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Render rows as a plain table, or `empty` when there are none
pub fn table<T: Tabled>(rows: Vec<T>, empty: &str) -> String {
    if rows.is_empty() {
        return format!("{}\n", empty);
    }
    let mut table = Table::new(rows);
    table.with(Style::psql());
    format!("{}\n", table)
}

/// Format a percentage with appropriate precision
pub fn format_percentage(pct: f64) -> String {
    if pct < 0.1 && pct > 0.0 {
        format!("{:.2}%", pct)
    } else if pct < 10.0 {
        format!("{:.1}%", pct)
    } else {
        format!("{:.0}%", pct)
    }
}

/// Format a separator line
pub fn separator(width: usize) -> String {
    "─".repeat(width)
}

/// Truncate to at most `max_len` characters with an ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// `label: value` detail line, skipped when the value is absent
pub fn detail_line(output: &mut String, label: &str, value: Option<impl std::fmt::Display>) {
    if let Some(value) = value {
        output.push_str(&format!("  {:<16}{}\n", format!("{}:", label), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.05), "0.05%");
        assert_eq!(format_percentage(5.5), "5.5%");
        assert_eq!(format_percentage(50.0), "50%");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Công ty Điện lực", 10), "Công ty...");
        assert_eq!(truncate("Hello", 2), "..");
    }

    #[test]
    fn test_detail_line_skips_missing() {
        let mut out = String::new();
        detail_line(&mut out, "Due", None::<&str>);
        assert!(out.is_empty());
        detail_line(&mut out, "Due", Some("2025-07-15"));
        assert_eq!(out, "  Due:            2025-07-15\n");
    }
}
