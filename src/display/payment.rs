//! Bill, payment and refund formatting

use serde::Serialize;

use crate::models::{
    card::mask_card_number, BillLookup, CardCheck, PaymentResult, PaymentStatus, ProviderId,
    RefundResult,
};

use crate::providers::{payment_methods, ZaloPayBank};

use super::format::{detail_line, separator, table, yes_no};

/// Format a looked-up bill with its customer
pub fn format_bill_lookup(lookup: &BillLookup) -> String {
    let bill = &lookup.bill;
    let customer = &lookup.customer;

    let mut output = String::new();
    output.push_str(&format!("Bill: {}\n", bill.bill_number));
    output.push_str(&separator(40));
    output.push('\n');
    detail_line(&mut output, "Type", Some(&bill.bill_type));
    detail_line(&mut output, "Biller", Some(&bill.provider));
    detail_line(&mut output, "Amount", Some(bill.amount));
    detail_line(&mut output, "Due date", bill.due_date);
    detail_line(&mut output, "Period", bill.period.as_deref());
    detail_line(&mut output, "Status", bill.status.as_deref());
    if let (Some(old), Some(new)) = (bill.old_index, bill.new_index) {
        detail_line(&mut output, "Meter", Some(format!("{} -> {}", old, new)));
    }
    detail_line(&mut output, "Consumption", bill.consumption);
    detail_line(&mut output, "Taxes", bill.taxes);
    detail_line(&mut output, "Fees", bill.fees);
    if !bill.description.is_empty() {
        detail_line(&mut output, "Description", Some(&bill.description));
    }

    output.push_str("\nCustomer\n");
    detail_line(&mut output, "ID", Some(&customer.id));
    detail_line(&mut output, "Name", Some(&customer.name));
    if !customer.address.is_empty() {
        detail_line(&mut output, "Address", Some(&customer.address));
    }
    detail_line(&mut output, "Phone", customer.phone.as_deref());
    detail_line(&mut output, "Email", customer.email.as_deref());
    output.push_str(&format!("\nSource: {}\n", lookup.source));

    output
}

/// Format a newly created payment
pub fn format_payment_result(result: &PaymentResult) -> String {
    let mut output = String::new();
    output.push_str(&format!("Payment created via {}\n", result.provider));
    detail_line(&mut output, "Order", Some(&result.order_id));
    detail_line(&mut output, "Transaction", result.transaction_id.as_deref());
    detail_line(&mut output, "Pay URL", result.pay_url.as_deref());
    detail_line(&mut output, "Deep link", result.deep_link.as_deref());
    detail_line(&mut output, "QR code", result.qr_code.as_deref());
    if !result.message.is_empty() {
        detail_line(&mut output, "Message", Some(&result.message));
    }
    output
}

/// Format a payment status query
pub fn format_payment_status(status: &PaymentStatus) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Order {} ({}): {}\n",
        status.order_id,
        status.provider,
        status.state
    ));
    detail_line(&mut output, "Transaction", status.transaction_id.as_deref());
    detail_line(&mut output, "Amount", status.amount);
    detail_line(&mut output, "Result code", Some(&status.result_code));
    if !status.message.is_empty() {
        detail_line(&mut output, "Message", Some(&status.message));
    }
    output
}

pub fn format_refund_result(refund: &RefundResult) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Refund requested for order {} ({})\n",
        refund.order_id,
        refund.provider
    ));
    detail_line(&mut output, "Request", Some(&refund.refund_request_id));
    detail_line(&mut output, "Refund", refund.refund_id.as_deref());
    detail_line(&mut output, "Result code", Some(&refund.result_code));
    if !refund.message.is_empty() {
        detail_line(&mut output, "Message", Some(&refund.message));
    }
    output
}

/// Format a card check; only the last four digits are shown
pub fn format_card_check(check: &CardCheck) -> String {
    let mut output = String::new();
    if !check.digits.is_empty() {
        detail_line(&mut output, "Card", Some(mask_card_number(&check.digits)));
    }
    detail_line(&mut output, "Network", Some(check.network));
    detail_line(&mut output, "Valid", Some(yes_no(check.valid)));
    detail_line(&mut output, "Result", Some(&check.message));
    output
}

#[derive(tabled::Tabled)]
struct BankRow<'a> {
    #[tabled(rename = "Code")]
    code: &'a str,
    #[tabled(rename = "Name")]
    name: &'a str,
    #[tabled(rename = "Method")]
    method: &'a str,
}

pub fn format_banks(banks: &[ZaloPayBank]) -> String {
    let rows = banks
        .iter()
        .map(|b| BankRow {
            code: &b.bank_code,
            name: &b.name,
            method: b.pmc_id.as_deref().unwrap_or(""),
        })
        .collect();
    table(rows, "No banks returned.")
}

/// One funding source offered by a provider
#[derive(Debug, Clone, Serialize, tabled::Tabled)]
pub struct PaymentMethodRow {
    #[tabled(rename = "Provider")]
    pub provider: ProviderId,
    #[tabled(rename = "Code")]
    pub code: &'static str,
    #[tabled(rename = "Name")]
    pub name: &'static str,
    #[tabled(rename = "Description")]
    pub description: &'static str,
}

/// Funding sources of the given providers, in provider order
pub fn payment_method_rows(providers: &[ProviderId]) -> Vec<PaymentMethodRow> {
    providers
        .iter()
        .flat_map(|&provider| {
            payment_methods(provider)
                .iter()
                .map(move |&(code, name, description)| PaymentMethodRow {
                    provider,
                    code,
                    name,
                    description,
                })
        })
        .collect()
}

pub fn format_payment_methods(rows: &[PaymentMethodRow]) -> String {
    table(rows.to_vec(), "No payment methods listed.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{validate_card_number, Bill, BillType, Customer, PaymentState, Vnd};

    #[test]
    fn test_lookup_shows_present_fields_only() {
        let lookup = BillLookup {
            bill: Bill {
                bill_number: "PE01000123456".into(),
                bill_type: BillType::Electric,
                provider: "EVN_HCMC".into(),
                amount: Vnd::new(523_000),
                due_date: None,
                period: Some("07/2025".into()),
                status: None,
                old_index: Some(1200),
                new_index: Some(1450),
                consumption: Some(250),
                taxes: None,
                fees: None,
                description: String::new(),
            },
            customer: Customer {
                id: "PE01000123456".into(),
                name: "Nguyen Van A".into(),
                address: String::new(),
                phone: None,
                email: None,
            },
            source: "bidv".into(),
        };

        let out = format_bill_lookup(&lookup);
        assert!(out.contains("523,000 VND"));
        assert!(out.contains("1200 -> 1450"));
        assert!(out.contains("07/2025"));
        assert!(!out.contains("Due date"));
        assert!(!out.contains("Phone"));
    }

    #[test]
    fn test_status_line() {
        let status = PaymentStatus {
            provider: ProviderId::Momo,
            order_id: "MM1".into(),
            state: PaymentState::Succeeded,
            transaction_id: Some("2547".into()),
            amount: Some(Vnd::new(10_000)),
            result_code: "0".into(),
            message: "Thành công.".into(),
        };
        let out = format_payment_status(&status);
        assert!(out.starts_with("Order MM1 (MoMo):"));
        assert!(out.contains("2547"));
    }

    #[test]
    fn test_payment_methods_listed_per_provider() {
        let rows = payment_method_rows(&[ProviderId::Bidv, ProviderId::ZaloPay]);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.provider == ProviderId::ZaloPay));

        let out = format_payment_methods(&rows);
        assert!(out.contains("zalopayapp"));
        assert!(out.contains("Thẻ ATM"));
        assert_eq!(format_payment_methods(&[]), "No payment methods listed.\n");
    }

    #[test]
    fn test_card_is_masked() {
        let out = format_card_check(&validate_card_number("4532 0151 1283 0366"));
        assert!(!out.contains("4532015112830366"));
        assert!(out.contains("0366"));
        assert!(out.contains("Yes"));
    }
}
