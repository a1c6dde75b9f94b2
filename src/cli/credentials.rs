//! Credential commands
//!
//! Values are stored encrypted; listings mask the secret fields.

use clap::Subcommand;
use serde::Serialize;

use crate::audit::{Action, ActivityEntry};
use crate::display::format_credentials;
use crate::error::{BillPayError, BillPayResult};
use crate::models::{Credential, Environment, ProviderId};

use super::{emit, emit_message, AppContext};

/// Credential subcommands
#[derive(Subcommand, Debug)]
pub enum CredentialCommands {
    /// Set credential fields for a provider
    ///
    /// Fields are given as name=value. A bare name is prompted for without
    /// echo, which keeps secrets out of shell history. An empty value removes
    /// the field.
    Set {
        /// bidv, momo, zalopay or visa
        provider: ProviderId,

        /// Fields as name=value, or a bare name to be prompted for
        #[arg(required = true)]
        fields: Vec<String>,

        /// sandbox or production
        #[arg(short, long)]
        env: Option<Environment>,
    },

    /// List stored credentials with secrets masked
    List,

    /// Delete the stored credential for a provider
    Clear { provider: ProviderId },
}

/// Handle credential commands
pub fn handle_credentials_command(ctx: &mut AppContext, cmd: CredentialCommands) -> BillPayResult<()> {
    match cmd {
        CredentialCommands::Set {
            provider,
            fields,
            env,
        } => set(ctx, provider, &fields, env),
        CredentialCommands::List => list(ctx),
        CredentialCommands::Clear { provider } => {
            let removed = ctx.store.clear_credential(provider)?;
            if !removed {
                return Err(BillPayError::credential_not_found(provider.key()));
            }
            ctx.record(ActivityEntry::success(
                Action::CredentialChange,
                Some(provider),
                "clear",
                "credential removed",
            ));
            emit_message(ctx, &format!("Removed {} credentials.", provider))
        }
    }
}

fn set(
    ctx: &mut AppContext,
    provider: ProviderId,
    fields: &[String],
    env: Option<Environment>,
) -> BillPayResult<()> {
    let default_env = if ctx.settings.api.sandbox_mode {
        Environment::Sandbox
    } else {
        Environment::Production
    };
    let mut credential = ctx
        .store
        .get_credential(provider)
        .cloned()
        .unwrap_or_else(|| Credential::new(provider, default_env));
    if let Some(env) = env {
        credential.environment = env;
    }

    let mut names = Vec::with_capacity(fields.len());
    for field in fields {
        let (name, value) = match field.split_once('=') {
            Some((name, value)) => (name.trim().to_string(), value.to_string()),
            None => {
                let name = field.trim().to_string();
                let value = rpassword::prompt_password(format!("{} {}: ", provider, name))
                    .map_err(|e| BillPayError::Io(format!("Failed to read {}: {}", name, e)))?;
                (name, value)
            }
        };
        credential.validate_field_name(&name)?;
        credential.set(&name, value);
        names.push(name);
    }

    let missing = credential.missing_fields();
    let result = ctx.store.set_credential(credential);
    ctx.record(ActivityEntry::from_result(
        Action::CredentialChange,
        Some(provider),
        names.join(","),
        &result,
        "credential updated",
    ));
    result?;

    let message = if missing.is_empty() {
        format!("Saved {} credentials.", provider)
    } else {
        format!(
            "Saved {} credentials; still missing {}.",
            provider,
            missing.join(", ")
        )
    };
    emit_message(ctx, &message)
}

#[derive(Serialize)]
struct CredentialListing {
    provider: ProviderId,
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<Environment>,
    fields: Vec<(String, String)>,
    missing: Vec<&'static str>,
}

fn list(ctx: &AppContext) -> BillPayResult<()> {
    let entries: Vec<(ProviderId, Option<&Credential>)> = ProviderId::ALL
        .iter()
        .map(|&p| (p, ctx.store.get_credential(p)))
        .collect();

    let listing: Vec<CredentialListing> = entries
        .iter()
        .map(|(provider, credential)| CredentialListing {
            provider: *provider,
            configured: credential.is_some_and(|c| c.missing_fields().is_empty()),
            environment: credential.map(|c| c.environment),
            fields: credential.map(|c| c.redacted_fields()).unwrap_or_default(),
            missing: credential
                .map(|c| c.missing_fields())
                .unwrap_or_else(|| provider.required_fields().to_vec()),
        })
        .collect();

    emit(ctx, Ok(listing), "credentials listed", |_| {
        format_credentials(&entries)
    })
}
