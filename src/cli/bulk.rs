//! Bulk bill commands

use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;

use crate::audit::{Action, ActivityEntry};
use crate::display::format_bulk_import;
use crate::error::{BillPayResult, CallOutcome};
use crate::models::ProviderId;
use crate::services::bulk::{import_file, write_template};
use crate::services::{BulkImport, Task, TaskOutput};

use super::{emit, AppContext};

/// Bulk subcommands
#[derive(Subcommand, Debug)]
pub enum BulkCommands {
    /// Read and check a CSV file of bills
    Import {
        /// CSV file with customer_id, bill_type and amount columns
        file: PathBuf,

        /// Also look up every valid bill with the provider
        #[arg(long)]
        lookup: bool,

        /// Provider used for lookups
        #[arg(short, long, default_value = "bidv")]
        provider: ProviderId,
    },

    /// Write a sample CSV file and a column guide
    Template {
        /// Output file path
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct BulkReport {
    #[serde(flatten)]
    import: BulkImport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    lookups: Vec<LookupLine>,
}

#[derive(Serialize)]
struct LookupLine {
    line: usize,
    customer_id: String,
    #[serde(flatten)]
    outcome: CallOutcome,
}

/// Handle bulk commands
pub fn handle_bulk_command(ctx: &AppContext, cmd: BulkCommands) -> BillPayResult<()> {
    match cmd {
        BulkCommands::Import {
            file,
            lookup,
            provider,
        } => {
            let result = import_file(&file);
            ctx.record(ActivityEntry::from_result(
                Action::BulkImport,
                None,
                file.display().to_string(),
                &result,
                &match &result {
                    Ok(import) => format!(
                        "{} of {} rows accepted",
                        import.processed_rows(),
                        import.total_rows
                    ),
                    Err(_) => String::new(),
                },
            ));

            let result = result.and_then(|import| {
                let lookups = if lookup {
                    look_up_all(ctx, &import, provider)?
                } else {
                    Vec::new()
                };
                Ok(BulkReport { import, lookups })
            });
            emit(ctx, result, "Bulk file read", format_report)
        }
        BulkCommands::Template { output } => {
            let result = write_template(&output);
            emit(ctx, result, "Template written", |(template, guide)| {
                format!(
                    "Template written to {}\nColumn guide written to {}\n",
                    template.display(),
                    guide.display()
                )
            })
        }
    }
}

fn look_up_all(ctx: &AppContext, import: &BulkImport, provider: ProviderId) -> BillPayResult<Vec<LookupLine>> {
    let dispatcher = ctx.dispatcher()?;
    let tasks = import
        .bills
        .iter()
        .map(|bill| Task::Lookup {
            provider,
            bill_number: bill.customer_id.clone(),
        })
        .collect();
    let results = dispatcher.run_all(tasks);
    dispatcher.shutdown();

    Ok(import
        .bills
        .iter()
        .zip(results)
        .map(|(bill, result)| {
            let outcome = match &result {
                Ok(TaskOutput::Lookup(lookup)) => CallOutcome::ok(format!(
                    "{} {} ({})",
                    lookup.bill.provider, lookup.bill.amount, lookup.customer.name
                )),
                Ok(_) => CallOutcome::ok("found"),
                Err(e) => e.into(),
            };
            LookupLine {
                line: bill.line,
                customer_id: bill.customer_id.clone(),
                outcome,
            }
        })
        .collect())
}

fn format_report(report: &BulkReport) -> String {
    let mut output = format_bulk_import(&report.import);
    if !report.lookups.is_empty() {
        output.push_str("\nLookups:\n");
        for line in &report.lookups {
            output.push_str(&format!(
                "  Line {} {}: {} {}\n",
                line.line,
                line.customer_id,
                if line.outcome.success { "OK  " } else { "FAIL" },
                line.outcome.message
            ));
        }
    }
    output
}
