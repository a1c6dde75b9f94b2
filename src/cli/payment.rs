//! Provider call commands: lookup, pay, query, refund, callbacks
//!
//! Calls run on the worker pool through the dispatcher, which also writes
//! the activity log. Payments and status queries keep the local history in
//! step with the provider.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};

use crate::audit::{Action, ActivityEntry};
use crate::display::{
    format_banks, format_bill_lookup, format_card_check, format_payment_methods,
    format_payment_result, format_payment_status, format_refund_result, payment_method_rows,
};
use crate::error::{BillPayError, BillPayResult};
use crate::models::card::mask_card_number;
use crate::models::{
    validate_card_number, BillNumber, BillType, Environment, HistoryRecord, PaymentExtras,
    PaymentRequest, ProviderId, RefundRequest, Vnd,
};
use crate::providers::{ReqwestTransport, ZaloPayClient, ZaloPayConfig};
use crate::services::{Task, TaskOutput};

use super::{confirm, emit, emit_message, AppContext};

fn unexpected(output: TaskOutput) -> BillPayError {
    BillPayError::Dispatch(format!("Unexpected task output: {:?}", output))
}

/// Look up a bill by its number
pub fn handle_lookup(ctx: &AppContext, bill_number: &str, provider: ProviderId) -> BillPayResult<()> {
    let result = ctx
        .run_task(Task::Lookup {
            provider,
            bill_number: bill_number.trim().to_string(),
        })
        .and_then(|output| match output {
            TaskOutput::Lookup(lookup) => Ok(lookup),
            other => Err(unexpected(other)),
        });
    emit(ctx, result, "Bill found", format_bill_lookup)
}

/// Arguments for `pay`
#[derive(Args, Debug)]
pub struct PayArgs {
    /// Amount in VND (e.g. 150000 or "150,000")
    pub amount: Vnd,

    /// Payment description shown to the payer
    #[arg(short, long)]
    pub description: String,

    /// Provider to pay through (default: payment_settings.default_payment_method)
    #[arg(short, long)]
    pub provider: Option<ProviderId>,

    /// Customer or bill number the payment is for
    #[arg(long)]
    pub customer: Option<String>,

    #[arg(long)]
    pub customer_name: Option<String>,

    /// electric, water, internet, tv or any other label
    #[arg(long)]
    pub bill_type: Option<BillType>,

    /// Biller id from `billpay billers`
    #[arg(long)]
    pub biller: Option<String>,

    /// Recipient card number (Visa Direct)
    #[arg(long)]
    pub card: Option<String>,

    /// Recipient name (Visa Direct)
    #[arg(long)]
    pub recipient_name: Option<String>,

    /// Payer name (ZaloPay)
    #[arg(long)]
    pub payer_name: Option<String>,

    /// Charge a payment code from the payer's ZaloPay app instead of creating an order
    #[arg(long, conflicts_with_all = ["card", "recipient_name"])]
    pub payment_code: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Create a payment and record it in the history
///
/// Orders stay processing until queried; a quick pay is recorded with the
/// state the provider reported.
pub fn handle_pay(ctx: &AppContext, args: PayArgs) -> BillPayResult<()> {
    if let Some(code) = args.payment_code.clone() {
        return quick_pay(ctx, &args, &code);
    }

    let provider = args
        .provider
        .unwrap_or(ctx.settings.payment.default_payment_method);

    let request = PaymentRequest::new(args.amount, args.description.clone()).with_extra(PaymentExtras {
        payer_name: args.payer_name.clone(),
        card_number: args.card.clone(),
        recipient_name: args.recipient_name.clone(),
        ..PaymentExtras::default()
    });
    if let Err(e) = request.validate() {
        return emit::<()>(ctx, Err(e), "", |_| String::new());
    }
    if !confirmed(ctx, &args, provider)? {
        return emit_message(ctx, "Payment cancelled.");
    }

    let result = ctx
        .run_task(Task::Pay { provider, request })
        .and_then(|output| match output {
            TaskOutput::Payment(payment) => Ok(payment),
            other => Err(unexpected(other)),
        });

    if let Ok(payment) = &result {
        let record =
            HistoryRecord::from_payment(payment, args.amount, bill_type(&args), &args.description);
        save_record(ctx, &args, record);
    }

    emit(ctx, result, "Payment created", format_payment_result)
}

fn quick_pay(ctx: &AppContext, args: &PayArgs, payment_code: &str) -> BillPayResult<()> {
    let provider = args.provider.unwrap_or(ProviderId::ZaloPay);
    if provider != ProviderId::ZaloPay {
        let err = BillPayError::unsupported(provider, "quick pay");
        return emit::<()>(ctx, Err(err), "", |_| String::new());
    }
    if args.description.trim().is_empty() {
        let err = BillPayError::Validation("Description is required".into());
        return emit::<()>(ctx, Err(err), "", |_| String::new());
    }
    if !confirmed(ctx, args, provider)? {
        return emit_message(ctx, "Payment cancelled.");
    }

    let result = ctx
        .run_task(Task::QuickPay {
            provider,
            amount: args.amount,
            payment_code: payment_code.trim().to_string(),
        })
        .and_then(|output| match output {
            TaskOutput::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        });

    if let Ok(status) = &result {
        let record =
            HistoryRecord::from_status(status, args.amount, bill_type(args), &args.description);
        save_record(ctx, args, record);
    }

    emit(ctx, result, "Payment code charged", format_payment_status)
}

fn bill_type(args: &PayArgs) -> BillType {
    args.bill_type
        .clone()
        .or_else(|| args.customer.as_deref().and_then(BillNumber::infer_bill_type))
        .unwrap_or_else(|| BillType::Other("other".into()))
}

fn confirmed(ctx: &AppContext, args: &PayArgs, provider: ProviderId) -> BillPayResult<bool> {
    if !ctx.settings.payment.confirmation_required || args.yes {
        return Ok(true);
    }
    confirm(&format!("Pay {} via {}?", args.amount, provider))
}

/// Add a record to the history; a failed save only warns
fn save_record(ctx: &AppContext, args: &PayArgs, mut record: HistoryRecord) {
    record.customer_id = args.customer.clone().unwrap_or_default();
    record.customer_name = args.customer_name.clone().unwrap_or_default();
    record.provider = args.biller.clone().unwrap_or_default();

    let order = record.transaction_id.clone();
    let saved = ctx.history().and_then(|mut history| {
        history.add(record);
        history.save()
    });
    if let Err(e) = saved {
        tracing::warn!(order = %order, error = %e, "payment not recorded in history");
    }
}

/// Query a payment; the provider defaults to the one recorded in the history
pub fn handle_query(ctx: &AppContext, order_id: &str, provider: Option<ProviderId>) -> BillPayResult<()> {
    let mut history = ctx.history()?;
    let provider = provider
        .or_else(|| {
            history
                .find(order_id)
                .and_then(|r| r.payment_method.parse::<ProviderId>().ok())
        })
        .unwrap_or(ctx.settings.payment.default_payment_method);

    let result = ctx
        .run_task(Task::Query {
            provider,
            order_id: order_id.to_string(),
        })
        .and_then(|output| match output {
            TaskOutput::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        });

    if let Ok(status) = &result {
        if history.update_status(order_id, status.state.into()) {
            if let Err(e) = history.save() {
                tracing::warn!(order = %order_id, error = %e, "history status not saved");
            }
        }
    }

    emit(ctx, result, "Payment status", format_payment_status)
}

/// Arguments for `refund`
#[derive(Args, Debug)]
pub struct RefundArgs {
    /// Order id of the original payment
    pub order_id: String,

    /// Amount to refund in VND
    pub amount: Vnd,

    #[arg(short, long)]
    pub provider: Option<ProviderId>,

    /// Provider transaction id of the original payment, if known
    #[arg(long)]
    pub transaction_id: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,
}

pub fn handle_refund(ctx: &AppContext, args: RefundArgs) -> BillPayResult<()> {
    let history = ctx.history()?;
    let provider = args
        .provider
        .or_else(|| {
            history
                .find(&args.order_id)
                .and_then(|r| r.payment_method.parse::<ProviderId>().ok())
        })
        .unwrap_or(ctx.settings.payment.default_payment_method);

    let mut request = RefundRequest::new(args.order_id, args.amount);
    request.transaction_id = args.transaction_id;
    request.description = args.description;
    if let Err(e) = request.validate() {
        return emit::<()>(ctx, Err(e), "", |_| String::new());
    }

    let result = ctx
        .run_task(Task::Refund { provider, request })
        .and_then(|output| match output {
            TaskOutput::Refund(refund) => Ok(refund),
            other => Err(unexpected(other)),
        });
    emit(ctx, result, "Refund requested", format_refund_result)
}

/// Arguments for `pull`
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Amount to debit
    pub amount: Vnd,

    /// Card to debit
    #[arg(long)]
    pub card: String,

    /// VND, USD or SGD
    #[arg(long, default_value = "VND")]
    pub currency: String,

    #[arg(short, long, default_value = "Visa Direct pull funds")]
    pub description: String,

    /// electric, water, internet, tv or any other label
    #[arg(long)]
    pub bill_type: Option<BillType>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Debit a card through Visa Direct and record it in the history
pub fn handle_pull(ctx: &AppContext, args: PullArgs) -> BillPayResult<()> {
    let check = validate_card_number(&args.card);
    if !check.valid {
        let err = BillPayError::Validation(format!("Invalid card number: {}", check.message));
        return emit::<()>(ctx, Err(err), "", |_| String::new());
    }

    if ctx.settings.payment.confirmation_required
        && !args.yes
        && !confirm(&format!(
            "Debit {} from card {}?",
            args.amount,
            mask_card_number(&check.digits)
        ))?
    {
        return emit_message(ctx, "Payment cancelled.");
    }

    let result = ctx
        .run_task(Task::PullFunds {
            provider: ProviderId::Visa,
            amount: args.amount,
            card_number: check.digits.clone(),
            currency: args.currency.clone(),
        })
        .and_then(|output| match output {
            TaskOutput::Payment(payment) => Ok(payment),
            other => Err(unexpected(other)),
        });

    if let Ok(payment) = &result {
        let bill_type = args
            .bill_type
            .clone()
            .unwrap_or_else(|| BillType::Other("other".into()));
        let record = HistoryRecord::from_payment(payment, args.amount, bill_type, &args.description);
        let saved = ctx.history().and_then(|mut history| {
            history.add(record);
            history.save()
        });
        if let Err(e) = saved {
            tracing::warn!(order = %payment.order_id, error = %e, "payment not recorded in history");
        }
    }

    emit(ctx, result, "Funds pulled", format_payment_result)
}

/// List the funding sources each provider's gateway offers
pub fn handle_methods(ctx: &AppContext, provider: Option<ProviderId>) -> BillPayResult<()> {
    let providers = match provider {
        Some(provider) => vec![provider],
        None => ProviderId::ALL.to_vec(),
    };
    let rows = payment_method_rows(&providers);
    emit(ctx, Ok(rows), "Payment methods listed", |rows| {
        format_payment_methods(rows)
    })
}

/// Check a card number locally (Luhn and length)
pub fn handle_card(ctx: &AppContext, number: &str) -> BillPayResult<()> {
    let check = validate_card_number(number);
    if !ctx.json && !check.valid {
        print!("{}", format_card_check(&check));
    }
    let result = if check.valid {
        Ok(&check)
    } else {
        Err(BillPayError::Validation(format!(
            "Invalid card number: {}",
            check.message
        )))
    };
    emit(ctx, result, "Card number is valid", |c| format_card_check(c))
}

/// Callback subcommands
#[derive(Subcommand, Debug)]
pub enum CallbackCommands {
    /// Check the signature of a provider notification
    Verify {
        /// Provider that sent the notification
        provider: ProviderId,

        /// JSON payload file (default: read stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

pub fn handle_callback_command(ctx: &AppContext, cmd: CallbackCommands) -> BillPayResult<()> {
    match cmd {
        CallbackCommands::Verify { provider, file } => {
            let raw = match &file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut raw = String::new();
                    std::io::stdin().read_to_string(&mut raw)?;
                    raw
                }
            };
            let result = serde_json::from_str::<serde_json::Value>(&raw)
                .map_err(|e| BillPayError::Validation(format!("Payload is not JSON: {}", e)))
                .and_then(|payload| ctx.registry().client(provider).verify_callback(&payload))
                .and_then(|valid| {
                    if valid {
                        Ok(valid)
                    } else {
                        Err(BillPayError::Validation(
                            "Callback signature does not match".into(),
                        ))
                    }
                });
            ctx.record(ActivityEntry::from_result(
                Action::CallbackVerify,
                Some(provider),
                file.map(|p| p.display().to_string()).unwrap_or_else(|| "stdin".into()),
                &result,
                "signature valid",
            ));
            emit(ctx, result, "Callback signature is valid", |_| {
                "Callback signature is valid.\n".to_string()
            })
        }
    }
}

/// List the banks ZaloPay can route card payments to
pub fn handle_banks(ctx: &AppContext) -> BillPayResult<()> {
    let environment = if ctx.settings.api.sandbox_mode {
        Environment::Sandbox
    } else {
        Environment::Production
    };
    let credential = ctx.store.credential_or_empty(ProviderId::ZaloPay, environment);
    let registry = ctx.registry();
    let result = ZaloPayConfig::from_credential(&credential).and_then(|config| {
        let transport = Arc::new(ReqwestTransport::new(registry.options().clone()));
        ZaloPayClient::new(config, transport).bank_list()
    });
    emit(ctx, result, "Banks listed", |banks| format_banks(banks))
}
