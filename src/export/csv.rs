//! CSV export of payment history and reports
//!
//! Spreadsheet workbooks become one CSV file per sheet: the sheet name is
//! appended to the file stem (`report.csv` -> `report_overview.csv`, ...).

use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;

use crate::error::{BillPayError, BillPayResult};
use crate::models::HistoryRecord;
use crate::services::history::{GroupTotal, HistoryStatistics};
use crate::storage::file_io::sibling_path;

#[derive(Serialize)]
struct HistoryRow<'a> {
    transaction_id: &'a str,
    customer_id: &'a str,
    customer_name: &'a str,
    bill_type: String,
    provider: &'a str,
    amount: i64,
    payment_method: &'a str,
    status: String,
    payment_date: String,
    description: &'a str,
}

impl<'a> From<&'a HistoryRecord> for HistoryRow<'a> {
    fn from(record: &'a HistoryRecord) -> Self {
        Self {
            transaction_id: &record.transaction_id,
            customer_id: &record.customer_id,
            customer_name: &record.customer_name,
            bill_type: record.bill_type.to_string(),
            provider: &record.provider,
            amount: record.amount.dong(),
            payment_method: &record.payment_method,
            status: record.status.to_string(),
            payment_date: record.payment_date.format("%Y-%m-%d %H:%M:%S").to_string(),
            description: &record.description,
        }
    }
}

#[derive(Serialize)]
struct DetailRow<'a> {
    transaction_id: &'a str,
    date: String,
    customer: &'a str,
    bill_type: String,
    amount: i64,
    payment_method: &'a str,
    status: String,
}

#[derive(Serialize)]
struct GroupRow<'a> {
    group: &'a str,
    count: usize,
    total: String,
    share: String,
}

fn open(path: &Path) -> BillPayResult<Writer<std::fs::File>> {
    Writer::from_path(path)
        .map_err(|e| BillPayError::Export(format!("Failed to create {}: {}", path.display(), e)))
}

fn finish(mut writer: Writer<std::fs::File>) -> BillPayResult<()> {
    writer
        .flush()
        .map_err(|e| BillPayError::Export(format!("Failed to write CSV: {}", e)))
}

fn require_records(records: &[&HistoryRecord]) -> BillPayResult<()> {
    if records.is_empty() {
        Err(BillPayError::Export("No payment records to export".into()))
    } else {
        Ok(())
    }
}

fn write_pairs(path: &Path, header: [&str; 2], rows: &[(&str, String)]) -> BillPayResult<()> {
    let mut writer = open(path)?;
    writer.write_record(header)?;
    for (label, value) in rows {
        writer.write_record([*label, value.as_str()])?;
    }
    finish(writer)
}

fn percent(part: usize, whole: usize) -> String {
    if whole == 0 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", part as f64 * 100.0 / whole as f64)
    }
}

/// Write the history rows to `path` and summary figures beside it
///
/// Returns every file written.
pub fn export_payment_history(records: &[&HistoryRecord], path: &Path) -> BillPayResult<Vec<PathBuf>> {
    require_records(records)?;

    let mut writer = open(path)?;
    for record in records {
        writer.serialize(HistoryRow::from(*record))?;
    }
    finish(writer)?;

    let stats = HistoryStatistics::from_records(records.iter().copied());
    let stats_path = sibling_path(path, "statistics");
    write_pairs(
        &stats_path,
        ["statistic", "value"],
        &[
            ("Total transactions", stats.total_transactions.to_string()),
            ("Total amount", stats.total_amount.dong().to_string()),
            ("Successful", stats.successful.to_string()),
            ("Failed", stats.failed.to_string()),
            ("Success rate", format!("{:.1}%", stats.success_rate())),
        ],
    )?;

    tracing::info!(path = %path.display(), records = records.len(), "payment history exported");
    Ok(vec![path.to_path_buf(), stats_path])
}

fn write_groups(path: &Path, groups: &std::collections::BTreeMap<String, GroupTotal>, total: usize) -> BillPayResult<()> {
    let mut writer = open(path)?;
    for (name, group) in groups {
        writer.serialize(GroupRow {
            group: name,
            count: group.count,
            total: group.amount.to_string(),
            share: percent(group.count, total),
        })?;
    }
    finish(writer)
}

/// Write the four report sheets next to `path`
///
/// Sheets: overview, by bill type, by payment method, details.
pub fn create_payment_report(records: &[&HistoryRecord], path: &Path) -> BillPayResult<Vec<PathBuf>> {
    require_records(records)?;
    let stats = HistoryStatistics::from_records(records.iter().copied());

    let overview = sibling_path(path, "overview");
    write_pairs(
        &overview,
        ["statistic", "value"],
        &[
            ("Total transactions", stats.total_transactions.to_string()),
            ("Total amount", stats.total_amount.to_string()),
            ("Successful", stats.successful.to_string()),
            ("Failed", stats.failed.to_string()),
            ("Success rate", format!("{:.1}%", stats.success_rate())),
            ("Average amount", stats.average_amount().to_string()),
        ],
    )?;

    let by_type = sibling_path(path, "by_bill_type");
    write_groups(&by_type, &stats.by_bill_type, stats.total_transactions)?;

    let by_method = sibling_path(path, "by_payment_method");
    write_groups(&by_method, &stats.by_payment_method, stats.total_transactions)?;

    let details = sibling_path(path, "details");
    let mut writer = open(&details)?;
    for record in records {
        writer.serialize(DetailRow {
            transaction_id: &record.transaction_id,
            date: record.payment_date.format("%Y-%m-%d").to_string(),
            customer: &record.customer_name,
            bill_type: record.bill_type.to_string(),
            amount: record.amount.dong(),
            payment_method: &record.payment_method,
            status: record.status.to_string(),
        })?;
    }
    finish(writer)?;

    tracing::info!(path = %path.display(), records = records.len(), "payment report created");
    Ok(vec![overview, by_type, by_method, details])
}
