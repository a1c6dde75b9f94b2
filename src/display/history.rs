//! Payment history, statistics and bulk import formatting

use chrono::Local;
use tabled::Tabled;

use crate::models::HistoryRecord;
use crate::services::{BulkImport, HistoryStatistics};

use super::format::{format_percentage, separator, table, truncate};

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Transaction")]
    transaction: String,
    #[tabled(rename = "Customer")]
    customer: String,
    #[tabled(rename = "Type")]
    bill_type: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Format history records as a table, newest first as given
pub fn format_history_list(records: &[&HistoryRecord]) -> String {
    let rows = records
        .iter()
        .map(|r| HistoryRow {
            date: r
                .payment_date
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            transaction: r.transaction_id.clone(),
            customer: truncate(
                if r.customer_name.is_empty() {
                    &r.customer_id
                } else {
                    &r.customer_name
                },
                24,
            ),
            bill_type: r.bill_type.to_string(),
            amount: r.amount.to_string(),
            method: r.payment_method.clone(),
            status: r.status.to_string(),
        })
        .collect();
    table(rows, "No payments found.")
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Total")]
    total: String,
}

/// Format summary figures with per-type and per-method breakdowns
pub fn format_statistics(stats: &HistoryStatistics) -> String {
    let mut output = String::new();
    output.push_str("Payment statistics\n");
    output.push_str(&separator(40));
    output.push('\n');
    output.push_str(&format!("  Transactions:   {}\n", stats.total_transactions));
    output.push_str(&format!("  Total amount:   {}\n", stats.total_amount));
    output.push_str(&format!("  Average:        {}\n", stats.average_amount()));
    output.push_str(&format!(
        "  Success rate:   {} ({} ok, {} failed, {} processing)\n",
        format_percentage(stats.success_rate()),
        stats.successful,
        stats.failed,
        stats.processing
    ));

    for (title, groups) in [
        ("By bill type", &stats.by_bill_type),
        ("By payment method", &stats.by_payment_method),
    ] {
        if groups.is_empty() {
            continue;
        }
        output.push_str(&format!("\n{}\n", title));
        let rows = groups
            .iter()
            .map(|(name, total)| GroupRow {
                group: name.clone(),
                count: total.count,
                total: total.amount.to_string(),
            })
            .collect();
        output.push_str(&table(rows, ""));
    }
    output
}

#[derive(Tabled)]
struct BulkRow {
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Customer")]
    customer: String,
    #[tabled(rename = "Type")]
    bill_type: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Biller")]
    biller: String,
    #[tabled(rename = "Due")]
    due: String,
}

/// Format the outcome of reading a bulk file
pub fn format_bulk_import(import: &BulkImport) -> String {
    let rows = import
        .bills
        .iter()
        .map(|b| BulkRow {
            line: b.line,
            customer: b.customer_id.clone(),
            bill_type: b.bill_type.to_string(),
            amount: b.amount.to_string(),
            biller: b.provider.clone().unwrap_or_default(),
            due: b.due_date.map(|d| d.to_string()).unwrap_or_default(),
        })
        .collect();

    let mut output = table(rows, "No valid rows.");
    output.push_str(&format!(
        "\n{} of {} rows accepted, total {}\n",
        import.processed_rows(),
        import.total_rows,
        import.total_amount()
    ));
    if !import.row_errors.is_empty() {
        output.push_str("\nRejected rows:\n");
        for error in &import.row_errors {
            output.push_str(&format!("  {}\n", error));
        }
    }
    output
}
