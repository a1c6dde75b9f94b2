//! Configuration commands
//!
//! `init`, and `config` for inspecting, editing, exporting and restoring the
//! settings file and credential store.

use std::path::PathBuf;

use clap::Subcommand;

use crate::audit::{Action, ActivityEntry};
use crate::config::Settings;
use crate::display::format_validation_report;
use crate::error::{BillPayError, BillPayResult};
use crate::export::{backup_config, export_config, import_config};

use super::{confirm, emit, emit_message, read_passphrase, AppContext};

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show settings and file locations
    Show,

    /// Print one setting by dotted key (e.g. api_settings.timeout_secs)
    Get { key: String },

    /// Change one setting by dotted key
    Set { key: String, value: String },

    /// Check the settings for errors and warnings
    Validate,

    /// Restore default settings and delete stored credentials
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Export settings to a JSON file
    Export {
        /// Output file path
        output: PathBuf,

        /// Include provider credentials
        #[arg(long)]
        include_secure: bool,

        /// Encrypt included credentials with a passphrase
        #[arg(long, requires = "include_secure")]
        seal: bool,
    },

    /// Import settings (and credentials, if present) from an export
    Import {
        /// Export file to read
        input: PathBuf,
    },

    /// Write a timestamped export, including credentials, to the backup directory
    Backup {
        /// Encrypt the credentials with a passphrase
        #[arg(long)]
        seal: bool,

        /// Directory to write into (default: the backups directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

/// Create the directory layout and a default settings file
pub fn handle_init(ctx: &AppContext) -> BillPayResult<()> {
    ctx.paths.ensure_directories()?;
    if !ctx.paths.is_initialized() {
        ctx.settings.save(&ctx.paths)?;
    }
    ctx.record(ActivityEntry::success(
        Action::SettingsChange,
        None,
        "init",
        ctx.paths.base_dir().display().to_string(),
    ));
    emit_message(
        ctx,
        &format!("Initialized billpay at {}", ctx.paths.base_dir().display()),
    )
}

/// Handle configuration commands
pub fn handle_config_command(ctx: &mut AppContext, cmd: ConfigCommands) -> BillPayResult<()> {
    match cmd {
        ConfigCommands::Show => show(ctx),
        ConfigCommands::Get { key } => {
            let value = ctx
                .settings
                .get_setting(&key)?
                .ok_or_else(|| BillPayError::NotFound {
                    entity_type: "Setting",
                    identifier: key.clone(),
                });
            emit(ctx, value, &key, |v| format!("{}\n", v))
        }
        ConfigCommands::Set { key, value } => set(ctx, &key, &value),
        ConfigCommands::Validate => {
            let report = ctx.settings.validate();
            if !ctx.json {
                print!("{}", format_validation_report(&report));
            }
            let result = if report.is_valid() {
                Ok(&report)
            } else {
                Err(BillPayError::Validation(report.errors.join("; ")))
            };
            emit(ctx, result, "Configuration is valid", |_| String::new())
        }
        ConfigCommands::Reset { yes } => reset(ctx, yes),
        ConfigCommands::Export {
            output,
            include_secure,
            seal,
        } => {
            let passphrase = if seal {
                Some(read_passphrase("Export passphrase: ")?)
            } else {
                None
            };
            let result = export_config(
                &output,
                &ctx.settings,
                &ctx.store,
                include_secure,
                passphrase.as_deref(),
            );
            ctx.record(ActivityEntry::from_result(
                Action::Export,
                None,
                output.display().to_string(),
                &result,
                "configuration exported",
            ));
            emit(ctx, result, "Configuration exported", |s| {
                let mut out = format!("Configuration exported to {}\n", s.path.display());
                if s.credentials > 0 {
                    out.push_str(&format!(
                        "Included {} credential(s){}\n",
                        s.credentials,
                        if s.sealed {
                            ", sealed with your passphrase"
                        } else {
                            " IN PLAIN TEXT; keep this file private"
                        }
                    ));
                }
                out
            })
        }
        ConfigCommands::Import { input } => {
            let passphrase = if is_sealed(&input) {
                Some(read_passphrase("Export passphrase: ")?)
            } else {
                None
            };
            let result = import_config(&input, &ctx.paths, &mut ctx.store, passphrase.as_deref());
            ctx.record(ActivityEntry::from_result(
                Action::Import,
                None,
                input.display().to_string(),
                &result,
                "configuration imported",
            ));
            if let Ok(summary) = &result {
                ctx.settings = summary.settings.clone();
            }
            emit(ctx, result, "Configuration imported", |s| {
                format!(
                    "Imported settings and {} credential(s) from {}\n",
                    s.credentials,
                    input.display()
                )
            })
        }
        ConfigCommands::Backup { seal, dir } => {
            let passphrase = if seal {
                Some(read_passphrase("Backup passphrase: ")?)
            } else {
                None
            };
            let dir = dir.unwrap_or_else(|| ctx.paths.backup_dir());
            std::fs::create_dir_all(&dir)?;
            let result = backup_config(&dir, &ctx.settings, &ctx.store, passphrase.as_deref());
            ctx.record(ActivityEntry::from_result(
                Action::Export,
                None,
                dir.display().to_string(),
                &result,
                "backup written",
            ));
            emit(ctx, result, "Backup written", |s| {
                format!("Backup written to {}\n", s.path.display())
            })
        }
    }
}

fn show(ctx: &AppContext) -> BillPayResult<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&ctx.settings)?);
        return Ok(());
    }
    println!("billpay configuration");
    println!("=====================");
    println!("Config directory: {}", ctx.paths.base_dir().display());
    println!("Settings file:    {}", ctx.paths.settings_file().display());
    println!("History file:     {}", ctx.paths.history_file().display());
    println!("Backups:          {}", ctx.paths.backup_dir().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&ctx.settings)?);
    let configured = ctx.store.configured_providers();
    println!();
    if configured.is_empty() {
        println!("No provider credentials stored.");
    } else {
        let names: Vec<String> = configured.iter().map(|p| p.to_string()).collect();
        println!("Credentials stored for: {}", names.join(", "));
    }
    Ok(())
}

fn set(ctx: &mut AppContext, key: &str, value: &str) -> BillPayResult<()> {
    let mut updated = ctx.settings.clone();
    let result = updated.set_setting(key, value).and_then(|_| {
        let report = updated.validate();
        if report.is_valid() {
            updated.save(&ctx.paths)
        } else {
            Err(BillPayError::Validation(report.errors.join("; ")))
        }
    });
    ctx.record(ActivityEntry::from_result(
        Action::SettingsChange,
        None,
        key,
        &result,
        "setting changed",
    ));
    if result.is_ok() {
        ctx.settings = updated;
    }
    emit(ctx, result, &format!("{} updated", key), |_| {
        format!("{} = {}\n", key, value)
    })
}

fn reset(ctx: &mut AppContext, yes: bool) -> BillPayResult<()> {
    if !yes && !confirm("Reset all settings and delete stored credentials?")? {
        return emit_message(ctx, "Reset cancelled.");
    }
    let defaults = Settings::default();
    defaults.save(&ctx.paths)?;
    ctx.store.reset()?;
    ctx.settings = defaults;
    ctx.record(ActivityEntry::success(
        Action::SettingsChange,
        None,
        "reset",
        "settings and credentials reset",
    ));
    emit_message(ctx, "Settings restored to defaults; credentials deleted.")
}

/// Whether an export file carries sealed credentials
fn is_sealed(path: &std::path::Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .map(|value| value.pointer("/secure_config/sealed").is_some())
        .unwrap_or(false)
}
