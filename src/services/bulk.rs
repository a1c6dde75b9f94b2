//! Bulk bill import from CSV
//!
//! Files must carry the `customer_id`, `bill_type` and `amount` columns and
//! may carry `provider`, `description`, `due_date` and `period`. A missing
//! required column rejects the whole file before any row is read. Rows that
//! fail validation are reported by line number (the header is line 1) and
//! left out, while the valid rows are returned.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{Position, ReaderBuilder, StringRecord, Writer};
use serde::Serialize;

use crate::error::{BillPayError, BillPayResult};
use crate::models::{BillType, Vnd};
use crate::storage::file_io::sibling_path;

pub const REQUIRED_COLUMNS: [&str; 3] = ["customer_id", "bill_type", "amount"];
pub const OPTIONAL_COLUMNS: [&str; 4] = ["provider", "description", "due_date", "period"];

/// Largest file accepted for import
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// One valid row of an import file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkBill {
    pub customer_id: String,
    pub bill_type: BillType,
    pub amount: Vnd,
    pub provider: Option<String>,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub period: Option<String>,
    /// Line in the source file
    pub line: usize,
}

/// Problems found on one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub errors: Vec<String>,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.errors.join(", "))
    }
}

/// Outcome of reading an import file
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkImport {
    pub bills: Vec<BulkBill>,
    pub row_errors: Vec<RowError>,
    pub total_rows: usize,
}

impl BulkImport {
    pub fn processed_rows(&self) -> usize {
        self.bills.len()
    }

    pub fn total_amount(&self) -> Vnd {
        self.bills.iter().map(|b| b.amount).sum()
    }
}

/// Check extension, existence and size before reading
pub fn check_file(path: &Path) -> BillPayResult<u64> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(BillPayError::Validation(format!(
            "Unsupported file format: {}. Supported: .csv",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(path).map_err(|_| {
        BillPayError::Validation(format!("File does not exist: {}", path.display()))
    })?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(BillPayError::Validation(format!(
            "File is too large ({} bytes, at most 10 MB)",
            metadata.len()
        )));
    }
    Ok(metadata.len())
}

/// Check and read an import file
pub fn import_file(path: &Path) -> BillPayResult<BulkImport> {
    check_file(path)?;
    let file = File::open(path)
        .map_err(|e| BillPayError::Import(format!("Failed to open {}: {}", path.display(), e)))?;
    let import = parse_bills(file)?;
    tracing::info!(
        file = %path.display(),
        total = import.total_rows,
        processed = import.processed_rows(),
        rejected = import.row_errors.len(),
        "bulk file read"
    );
    Ok(import)
}

/// Column positions found in the header
struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_headers(headers: &StringRecord) -> BillPayResult<Self> {
        let map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_lowercase(), i))
            .collect();

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !map.contains_key(*c))
            .collect();
        if !missing.is_empty() {
            return Err(BillPayError::Validation(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )));
        }
        Ok(Self(map))
    }

    fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.0
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Read bills from CSV data
pub fn parse_bills<R: Read>(mut input: R) -> BillPayResult<BulkImport> {
    let mut data = Vec::new();
    input.read_to_end(&mut data)?;

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_slice());
    let headers = reader.headers()?.clone();
    let columns = Columns::from_headers(&headers)?;

    let mut import = BulkImport::default();
    let mut last_line = 1;
    for record in reader.records() {
        import.total_rows += 1;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e
                    .position()
                    .map_or(last_line + 1, |pos| physical_line(&data, pos));
                last_line = line;
                import.row_errors.push(RowError {
                    line,
                    errors: vec![format!("Unreadable row: {}", e)],
                });
                continue;
            }
        };

        let line = record
            .position()
            .map_or(last_line + 1, |pos| physical_line(&data, pos));
        last_line = line;
        match parse_row(&columns, &record, line) {
            Ok(bill) => import.bills.push(bill),
            Err(errors) => import.row_errors.push(RowError { line, errors }),
        }
    }
    Ok(import)
}

/// Line a record starts on
///
/// The reader records where it began looking, which is before any blank
/// lines it skipped on the way to the record.
fn physical_line(data: &[u8], pos: &Position) -> usize {
    let start = usize::try_from(pos.byte()).unwrap_or(data.len());
    let skipped = data
        .get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .filter(|&&b| b == b'\n')
        .count();
    usize::try_from(pos.line()).unwrap_or(usize::MAX).saturating_add(skipped)
}

fn parse_row(columns: &Columns, record: &StringRecord, line: usize) -> Result<BulkBill, Vec<String>> {
    let mut errors = Vec::new();

    let customer_id = columns.get(record, "customer_id");
    if customer_id.is_none() {
        errors.push("Missing customer id".to_string());
    }

    let bill_type = match columns.get(record, "bill_type").map(str::parse::<BillType>) {
        Some(Ok(bill_type)) => Some(bill_type),
        _ => {
            errors.push("Missing bill type".to_string());
            None
        }
    };

    let amount = match columns.get(record, "amount").map(Vnd::parse) {
        Some(Ok(amount)) if amount.is_positive() => Some(amount),
        Some(Ok(_)) => {
            errors.push("Amount must be greater than 0".to_string());
            None
        }
        _ => {
            errors.push("Invalid amount".to_string());
            None
        }
    };

    let due_date = match columns.get(record, "due_date") {
        None => None,
        Some(raw) => match parse_date(raw) {
            Some(date) => Some(date),
            None => {
                errors.push(format!("Invalid due date '{}'", raw));
                None
            }
        },
    };

    match (customer_id, bill_type, amount) {
        (Some(customer_id), Some(bill_type), Some(amount)) if errors.is_empty() => Ok(BulkBill {
            customer_id: customer_id.to_string(),
            bill_type,
            amount,
            provider: columns.get(record, "provider").map(str::to_string),
            description: columns
                .get(record, "description")
                .unwrap_or_default()
                .to_string(),
            due_date,
            period: columns.get(record, "period").map(str::to_string),
            line,
        }),
        _ => Err(errors),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
}

/// Write a sample import file and a column guide beside it
///
/// Returns the paths of the template and the guide.
pub fn write_template(path: &Path) -> BillPayResult<(PathBuf, PathBuf)> {
    let mut writer = Writer::from_path(path)
        .map_err(|e| BillPayError::Export(format!("Failed to create {}: {}", path.display(), e)))?;
    let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    header.extend(OPTIONAL_COLUMNS);
    writer.write_record(&header)?;
    for row in [
        ["CUST001", "electric", "500000", "EVN_HCMC", "Tiền điện tháng 7", "2025-08-15", "2025-07"],
        ["CUST002", "water", "300000", "SAWACO", "Tiền nước tháng 7", "2025-08-20", "2025-07"],
        ["CUST003", "internet", "200000", "VNPT", "Cước internet tháng 7", "2025-08-25", "2025-07"],
    ] {
        writer.write_record(row)?;
    }
    writer.flush()?;

    let guide_path = sibling_path(path, "instructions");
    let mut guide = Writer::from_path(&guide_path).map_err(|e| {
        BillPayError::Export(format!("Failed to create {}: {}", guide_path.display(), e))
    })?;
    guide.write_record(["column", "description", "example"])?;
    for row in [
        ["customer_id", "Customer code (required)", "CUST001"],
        ["bill_type", "electric, water, internet or tv (required)", "electric"],
        ["amount", "Amount in VND (required)", "500000"],
        ["provider", "Biller id (optional)", "EVN_HCMC"],
        ["description", "Bill description (optional)", "Tiền điện tháng 7"],
        ["due_date", "Due date, YYYY-MM-DD (optional)", "2025-08-15"],
        ["period", "Billing period (optional)", "2025-07"],
    ] {
        guide.write_record(row)?;
    }
    guide.flush()?;

    tracing::info!(template = %path.display(), "bulk template written");
    Ok((path.to_path_buf(), guide_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_columns_rejects_file() {
        let data = "customer_id,description\nCUST001,x\n";
        let err = parse_bills(data.as_bytes()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Validation error: Missing required columns: bill_type, amount"
        );
    }

    #[test]
    fn test_bad_rows_reported_and_excluded() {
        let data = "\
customer_id,bill_type,amount,provider,due_date
CUST001,electric,500000,EVN_HCMC,2025-08-15
CUST002,water,-5,,
,internet,abc,,
CUST004,tv,\"1,200,000\",,15/09/2025
CUST005,water,100000,,someday
";
        let import = parse_bills(data.as_bytes()).unwrap();
        assert_eq!(import.total_rows, 5);
        assert_eq!(import.processed_rows(), 2);
        assert_eq!(import.total_amount(), Vnd::new(1_700_000));

        let lines: Vec<usize> = import.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 6]);
        assert_eq!(import.row_errors[0].to_string(), "Line 3: Amount must be greater than 0");
        assert_eq!(
            import.row_errors[1].to_string(),
            "Line 4: Missing customer id, Invalid amount"
        );

        let first = &import.bills[0];
        assert_eq!(first.line, 2);
        assert_eq!(first.bill_type, BillType::Electric);
        assert_eq!(first.provider.as_deref(), Some("EVN_HCMC"));
        assert_eq!(first.due_date, NaiveDate::from_ymd_opt(2025, 8, 15));
        assert_eq!(import.bills[1].due_date, NaiveDate::from_ymd_opt(2025, 9, 15));
    }

    #[test]
    fn test_lines_count_blank_and_multiline_rows() {
        let data = "customer_id,bill_type,amount\nPD1,electric,1000\n\nPD2,electric,abc\n";
        let import = parse_bills(data.as_bytes()).unwrap();
        assert_eq!(import.total_rows, 2);
        assert_eq!(import.row_errors.len(), 1);
        assert_eq!(import.row_errors[0].line, 4);

        let data = "\
customer_id,bill_type,amount,description
WB1,water,2000,\"two
lines\"


TV1,tv,,
";
        let import = parse_bills(data.as_bytes()).unwrap();
        assert_eq!(import.bills[0].line, 2);
        assert_eq!(import.row_errors[0].line, 6);
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let data = "Customer_ID,Bill_Type,Amount\nCUST001,Electric,500000\n";
        let import = parse_bills(data.as_bytes()).unwrap();
        assert_eq!(import.processed_rows(), 1);
        assert!(import.row_errors.is_empty());
    }

    #[test]
    fn test_check_file() {
        let temp_dir = TempDir::new().unwrap();
        let xlsx = temp_dir.path().join("bills.xlsx");
        std::fs::write(&xlsx, "x").unwrap();
        assert!(check_file(&xlsx).unwrap_err().to_string().contains("Supported: .csv"));

        let missing = temp_dir.path().join("missing.csv");
        assert!(check_file(&missing).unwrap_err().to_string().contains("does not exist"));

        let ok = temp_dir.path().join("bills.CSV");
        std::fs::write(&ok, "customer_id,bill_type,amount\n").unwrap();
        assert_eq!(check_file(&ok).unwrap(), 29);
    }

    #[test]
    fn test_template_imports_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bills.csv");
        let (template, guide) = write_template(&path).unwrap();

        assert_eq!(guide, temp_dir.path().join("bills_instructions.csv"));
        assert!(guide.exists());

        let import = import_file(&template).unwrap();
        assert_eq!(import.processed_rows(), 3);
        assert!(import.row_errors.is_empty());
        assert_eq!(import.total_amount(), Vnd::new(1_000_000));
    }
}
