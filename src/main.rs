use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use billpay::cli::{
    handle_banks, handle_bulk_command, handle_callback_command, handle_card, handle_config_command,
    handle_credentials_command, handle_history_command, handle_init, handle_lookup, handle_methods,
    handle_pay, handle_pull, handle_query, handle_refund, handle_status, AppContext, BulkCommands,
    CallbackCommands, ConfigCommands, CredentialCommands, HistoryCommands, PayArgs, PullArgs,
    RefundArgs, StatusArgs,
};
use billpay::display::format_billers;
use billpay::models::ProviderId;

/// Environment variable holding the log filter
const LOG_ENV: &str = "BILLPAY_LOG";

#[derive(Parser)]
#[command(
    name = "billpay",
    version,
    about = "Look up and pay Vietnamese utility bills",
    long_about = "billpay looks up electricity, water, internet and TV bills and pays \
                  them through BIDV, MoMo, ZaloPay or Visa Direct. Credentials are \
                  kept in an encrypted local store."
)]
struct Cli {
    /// Print results as JSON ({success, kind, message, data})
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configuration directory and default settings
    Init,

    /// Settings, export, import and backup
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Provider credentials
    #[command(subcommand, alias = "creds")]
    Credentials(CredentialCommands),

    /// Look up a bill by its number
    Lookup {
        bill_number: String,

        #[arg(short, long, default_value = "bidv")]
        provider: ProviderId,
    },

    /// Create a payment
    Pay(PayArgs),

    /// Debit a card through Visa Direct
    Pull(PullArgs),

    /// Query the status of a payment
    Query {
        order_id: String,

        #[arg(short, long)]
        provider: Option<ProviderId>,
    },

    /// Refund a payment
    Refund(RefundArgs),

    /// Test the connection to every provider
    Status(StatusArgs),

    /// Check a card number locally
    Card { number: String },

    /// Provider notifications
    #[command(subcommand)]
    Callback(CallbackCommands),

    /// Bulk bill files
    #[command(subcommand)]
    Bulk(BulkCommands),

    /// Payment history
    #[command(subcommand)]
    History(HistoryCommands),

    /// List the built-in billers
    Billers,

    /// List banks available through ZaloPay
    Banks,

    /// List the funding sources each provider offers
    Methods {
        #[arg(short, long)]
        provider: Option<ProviderId>,
    },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let Some(command) = cli.command else {
        println!("billpay - Vietnamese utility bill payments");
        println!();
        println!("Run 'billpay --help' for usage information.");
        println!("Run 'billpay init' to get started.");
        return Ok(());
    };

    let mut ctx = AppContext::load(cli.json)?;

    match command {
        Commands::Init => handle_init(&ctx)?,
        Commands::Config(cmd) => handle_config_command(&mut ctx, cmd)?,
        Commands::Credentials(cmd) => handle_credentials_command(&mut ctx, cmd)?,
        Commands::Lookup {
            bill_number,
            provider,
        } => handle_lookup(&ctx, &bill_number, provider)?,
        Commands::Pay(args) => handle_pay(&ctx, args)?,
        Commands::Pull(args) => handle_pull(&ctx, args)?,
        Commands::Query { order_id, provider } => handle_query(&ctx, &order_id, provider)?,
        Commands::Refund(args) => handle_refund(&ctx, args)?,
        Commands::Status(args) => handle_status(&ctx, args)?,
        Commands::Card { number } => handle_card(&ctx, &number)?,
        Commands::Callback(cmd) => handle_callback_command(&ctx, cmd)?,
        Commands::Bulk(cmd) => handle_bulk_command(&ctx, cmd)?,
        Commands::History(cmd) => handle_history_command(&ctx, cmd)?,
        Commands::Billers => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&billpay::models::all_billers())?);
            } else {
                print!("{}", format_billers());
            }
        }
        Commands::Banks => handle_banks(&ctx)?,
        Commands::Methods { provider } => handle_methods(&ctx, provider)?,
    }

    Ok(())
}
