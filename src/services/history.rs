//! Payment history
//!
//! Records of created payments, kept in `data/history.json`. Status starts as
//! processing and is updated when the payment is queried.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::settings::HistorySettings;
use crate::error::BillPayResult;
use crate::models::{BillType, HistoryRecord, HistoryStatus, Vnd};
use crate::storage::file_io::{read_json, write_json_atomic};

/// Criteria for listing history; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub status: Option<HistoryStatus>,
    pub bill_type: Option<BillType>,
    pub payment_method: Option<String>,
    /// Inclusive, by payment date (UTC)
    pub from: Option<NaiveDate>,
    /// Inclusive
    pub to: Option<NaiveDate>,
}

impl HistoryFilter {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        let day = record.payment_date.date_naive();
        self.status.map_or(true, |s| record.status == s)
            && self.bill_type.as_ref().map_or(true, |t| &record.bill_type == t)
            && self
                .payment_method
                .as_deref()
                .map_or(true, |m| record.payment_method.eq_ignore_ascii_case(m))
            && self.from.map_or(true, |from| day >= from)
            && self.to.map_or(true, |to| day <= to)
    }
}

/// Count and total for one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupTotal {
    pub count: usize,
    pub amount: Vnd,
}

/// Summary figures over a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStatistics {
    pub total_transactions: usize,
    pub total_amount: Vnd,
    pub successful: usize,
    pub failed: usize,
    pub processing: usize,
    pub by_bill_type: BTreeMap<String, GroupTotal>,
    pub by_payment_method: BTreeMap<String, GroupTotal>,
}

impl HistoryStatistics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a HistoryRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total_transactions += 1;
            stats.total_amount += record.amount;
            match record.status {
                HistoryStatus::Success => stats.successful += 1,
                HistoryStatus::Failed => stats.failed += 1,
                HistoryStatus::Processing => stats.processing += 1,
            }
            for (map, key) in [
                (&mut stats.by_bill_type, record.bill_type.to_string()),
                (&mut stats.by_payment_method, record.payment_method.clone()),
            ] {
                let group = map.entry(key).or_default();
                group.count += 1;
                group.amount += record.amount;
            }
        }
        stats
    }

    /// Share of successful transactions, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_transactions == 0 {
            0.0
        } else {
            self.successful as f64 * 100.0 / self.total_transactions as f64
        }
    }

    pub fn average_amount(&self) -> Vnd {
        if self.total_transactions == 0 {
            Vnd::zero()
        } else {
            Vnd::new(self.total_amount.dong() / self.total_transactions as i64)
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    records: Vec<HistoryRecord>,
}

/// History records backed by a JSON file
pub struct PaymentHistory {
    path: PathBuf,
    records: Vec<HistoryRecord>,
    max_records: usize,
    auto_cleanup: bool,
}

impl PaymentHistory {
    /// Load history from `path`; a missing file is an empty history
    pub fn load(path: PathBuf, settings: &HistorySettings) -> BillPayResult<Self> {
        let file: HistoryFile = read_json(&path)?;
        Ok(Self {
            path,
            records: file.records,
            max_records: settings.max_records.max(1),
            auto_cleanup: settings.auto_cleanup,
        })
    }

    /// Write history back, dropping the oldest records beyond the limit
    pub fn save(&mut self) -> BillPayResult<()> {
        if self.auto_cleanup && self.records.len() > self.max_records {
            self.records.sort_by_key(|r| r.payment_date);
            let excess = self.records.len() - self.max_records;
            self.records.drain(..excess);
            tracing::debug!(dropped = excess, "history cleaned up");
        }
        write_json_atomic(
            &self.path,
            &HistoryFile {
                records: self.records.clone(),
            },
        )
    }

    pub fn add(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    /// Update a record's status after a query; returns whether it was found
    pub fn update_status(&mut self, transaction_id: &str, status: HistoryStatus) -> bool {
        match self
            .records
            .iter_mut()
            .find(|r| r.transaction_id == transaction_id)
        {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    pub fn find(&self, transaction_id: &str) -> Option<&HistoryRecord> {
        self.records.iter().find(|r| r.transaction_id == transaction_id)
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Matching records, newest first
    pub fn filter(&self, filter: &HistoryFilter) -> Vec<&HistoryRecord> {
        let mut matched: Vec<&HistoryRecord> =
            self.records.iter().filter(|r| filter.matches(r)).collect();
        matched.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        matched
    }

    pub fn statistics(&self, filter: &HistoryFilter) -> HistoryStatistics {
        HistoryStatistics::from_records(self.filter(filter))
    }
}

#[cfg(test)]
pub(crate) fn sample_record(
    id: &str,
    bill_type: BillType,
    method: &str,
    amount: i64,
    status: HistoryStatus,
    day: u32,
) -> HistoryRecord {
    use chrono::{TimeZone, Utc};

    HistoryRecord {
        transaction_id: id.to_string(),
        customer_id: "CUST001".to_string(),
        customer_name: "Nguyen Van A".to_string(),
        bill_type,
        provider: "EVN_HCMC".to_string(),
        amount: Vnd::new(amount),
        payment_method: method.to_string(),
        status,
        payment_date: Utc
            .with_ymd_and_hms(2025, 7, day, 9, 30, 0)
            .single()
            .unwrap(),
        description: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn history(temp_dir: &TempDir, max_records: usize) -> PaymentHistory {
        let settings = HistorySettings {
            max_records,
            ..HistorySettings::default()
        };
        PaymentHistory::load(temp_dir.path().join("data").join("history.json"), &settings).unwrap()
    }

    fn seed(history: &mut PaymentHistory) {
        history.add(sample_record("M1", BillType::Electric, "momo", 500_000, HistoryStatus::Success, 1));
        history.add(sample_record("Z1", BillType::Water, "zalopay", 300_000, HistoryStatus::Failed, 5));
        history.add(sample_record("M2", BillType::Electric, "momo", 200_000, HistoryStatus::Processing, 10));
    }

    #[test]
    fn test_filter_by_fields_and_dates() {
        let temp_dir = TempDir::new().unwrap();
        let mut history = history(&temp_dir, 100);
        seed(&mut history);

        let momo = HistoryFilter {
            payment_method: Some("MoMo".into()),
            ..Default::default()
        };
        let ids: Vec<_> = history.filter(&momo).iter().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["M2", "M1"]);

        let early = HistoryFilter {
            to: NaiveDate::from_ymd_opt(2025, 7, 5),
            ..Default::default()
        };
        assert_eq!(history.filter(&early).len(), 2);

        let failed_water = HistoryFilter {
            status: Some(HistoryStatus::Failed),
            bill_type: Some(BillType::Water),
            ..Default::default()
        };
        assert_eq!(history.filter(&failed_water)[0].transaction_id, "Z1");
    }

    #[test]
    fn test_statistics() {
        let temp_dir = TempDir::new().unwrap();
        let mut history = history(&temp_dir, 100);
        seed(&mut history);

        let stats = history.statistics(&HistoryFilter::default());
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.total_amount, Vnd::new(1_000_000));
        assert_eq!((stats.successful, stats.failed, stats.processing), (1, 1, 1));
        assert_eq!(stats.average_amount(), Vnd::new(333_333));
        assert!((stats.success_rate() - 33.333).abs() < 0.01);
        assert_eq!(
            stats.by_bill_type["electric"],
            GroupTotal {
                count: 2,
                amount: Vnd::new(700_000)
            }
        );
        assert_eq!(stats.by_payment_method["zalopay"].count, 1);
    }

    #[test]
    fn test_update_status_and_persist() {
        let temp_dir = TempDir::new().unwrap();
        let mut history = history(&temp_dir, 100);
        seed(&mut history);

        assert!(history.update_status("M2", HistoryStatus::Success));
        assert!(!history.update_status("nope", HistoryStatus::Success));
        history.save().unwrap();

        let reloaded = self::history(&temp_dir, 100);
        assert_eq!(reloaded.records().len(), 3);
        assert_eq!(reloaded.find("M2").unwrap().status, HistoryStatus::Success);
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let temp_dir = TempDir::new().unwrap();
        let mut history = history(&temp_dir, 2);
        seed(&mut history);
        history.save().unwrap();

        let ids: Vec<_> = history.records().iter().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["Z1", "M2"]);
    }
}
