//! Settings, credential and biller formatting

use tabled::Tabled;

use crate::config::ValidationReport;
use crate::models::{all_billers, Credential, ProviderId};

use super::format::table;

/// Format provider credentials with secrets masked
///
/// Providers without a stored credential are listed with their missing
/// required fields.
pub fn format_credentials(credentials: &[(ProviderId, Option<&Credential>)]) -> String {
    let mut output = String::new();
    for (provider, credential) in credentials {
        match credential {
            None => {
                output.push_str(&format!("{} [not configured]\n", provider));
                output.push_str(&format!(
                    "  required: {}\n",
                    provider.required_fields().join(", ")
                ));
            }
            Some(credential) => {
                let missing = credential.missing_fields();
                let state = if missing.is_empty() {
                    "configured".to_string()
                } else {
                    format!("incomplete, missing {}", missing.join(", "))
                };
                output.push_str(&format!(
                    "{} ({}) [{}]\n",
                    provider, credential.environment, state
                ));
                for (name, value) in credential.redacted_fields() {
                    output.push_str(&format!("  {:<14}{}\n", name, value));
                }
            }
        }
    }
    output
}

/// Format a settings check
pub fn format_validation_report(report: &ValidationReport) -> String {
    let mut output = String::new();
    if report.is_valid() && report.warnings.is_empty() {
        output.push_str("Configuration is valid.\n");
        return output;
    }
    for error in &report.errors {
        output.push_str(&format!("error: {}\n", error));
    }
    for warning in &report.warnings {
        output.push_str(&format!("warning: {}\n", warning));
    }
    if report.is_valid() {
        output.push_str("Configuration is valid with warnings.\n");
    }
    output
}

#[derive(Tabled)]
struct BillerRow {
    #[tabled(rename = "Type")]
    bill_type: String,
    #[tabled(rename = "ID")]
    id: &'static str,
    #[tabled(rename = "Name")]
    name: &'static str,
}

/// Format the built-in biller catalog
pub fn format_billers() -> String {
    let rows = all_billers()
        .into_iter()
        .map(|(bill_type, biller)| BillerRow {
            bill_type: bill_type.to_string(),
            id: biller.id,
            name: biller.name,
        })
        .collect();
    table(rows, "No billers.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environment;

    #[test]
    fn test_credentials_are_masked() {
        let momo = Credential::new(ProviderId::Momo, Environment::Sandbox)
            .with("partner_code", "MOMOBKUN20180529")
            .with("secret_key", "at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa");
        let out = format_credentials(&[(ProviderId::Momo, Some(&momo)), (ProviderId::Bidv, None)]);

        assert!(out.contains("MOMOBKUN20180529"));
        assert!(!out.contains("at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa"));
        assert!(out.contains("2bsa"));
        assert!(out.contains("missing access_key"));
        assert!(out.contains("BIDV [not configured]"));
    }

    #[test]
    fn test_validation_report() {
        assert_eq!(
            format_validation_report(&ValidationReport::default()),
            "Configuration is valid.\n"
        );
        let report = ValidationReport {
            errors: vec!["API timeout must be greater than 0".into()],
            warnings: vec![],
        };
        let out = format_validation_report(&report);
        assert!(out.starts_with("error: API timeout"));
        assert!(!out.contains("valid"));
    }

    #[test]
    fn test_billers_table() {
        let out = format_billers();
        assert!(out.contains("EVN_HCMC"));
        assert!(out.contains("SAWACO"));
    }
}
