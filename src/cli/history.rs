//! Payment history commands

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};

use crate::audit::{Action, ActivityEntry};
use crate::display::{format_history_list, format_statistics};
use crate::error::BillPayResult;
use crate::export::{create_payment_report, export_payment_history};
use crate::models::{BillType, HistoryRecord, HistoryStatus};
use crate::services::HistoryFilter;

use super::{emit, AppContext};

/// Filters shared by the history commands
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// success, failed or processing
    #[arg(long)]
    pub status: Option<HistoryStatus>,

    #[arg(long)]
    pub bill_type: Option<BillType>,

    /// Provider key, e.g. momo
    #[arg(long)]
    pub method: Option<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl From<FilterArgs> for HistoryFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            status: args.status,
            bill_type: args.bill_type,
            payment_method: args.method,
            from: args.from,
            to: args.to,
        }
    }
}

/// History subcommands
#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List payments, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Number of payments to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Show summary statistics instead of the list
        #[arg(long)]
        stats: bool,
    },

    /// Export payments and summary figures to CSV
    Export {
        /// Output file path
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Write a multi-sheet payment report (one CSV per sheet)
    Report {
        /// Output file path; sheet names are appended to its stem
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Handle history commands
pub fn handle_history_command(ctx: &AppContext, cmd: HistoryCommands) -> BillPayResult<()> {
    let history = ctx.history()?;
    match cmd {
        HistoryCommands::List {
            filter,
            limit,
            stats,
        } => {
            let filter = HistoryFilter::from(filter);
            if stats {
                return emit(ctx, Ok(history.statistics(&filter)), "History statistics", |s| {
                    format_statistics(s)
                });
            }
            let records: Vec<&HistoryRecord> =
                history.filter(&filter).into_iter().take(limit).collect();
            emit(ctx, Ok(&records), "History listed", |r| format_history_list(r))
        }
        HistoryCommands::Export { output, filter } => {
            let records = history.filter(&filter.into());
            let result = export_payment_history(&records, &output);
            record_export(ctx, &output, &result);
            emit(ctx, result, "History exported", |files| written(files))
        }
        HistoryCommands::Report { output, filter } => {
            let records = history.filter(&filter.into());
            let result = create_payment_report(&records, &output);
            record_export(ctx, &output, &result);
            emit(ctx, result, "Report written", |files| written(files))
        }
    }
}

fn record_export(ctx: &AppContext, output: &std::path::Path, result: &BillPayResult<Vec<PathBuf>>) {
    ctx.record(ActivityEntry::from_result(
        Action::Export,
        None,
        output.display().to_string(),
        result,
        "history exported",
    ));
}

fn written(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| format!("Wrote {}\n", f.display()))
        .collect()
}
