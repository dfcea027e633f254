//! Offline ledger import from a charge CSV export.
//!
//! Expected headers: `id`, `created`, `amount`, `currency`, `status`, and optionally
//! `refunded`, `disputed`, `recurring`. Amounts are decimal major units (`25.99`);
//! `created` is RFC 3339 or a bare `YYYY-MM-DD`.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use super::domain::{ChargeStatus, LedgerTransaction};

#[derive(Debug)]
pub enum LedgerImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
}

impl std::fmt::Display for LedgerImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerImportError::Io(err) => write!(f, "failed to read ledger export: {}", err),
            LedgerImportError::Csv(err) => write!(f, "invalid ledger CSV data: {}", err),
            LedgerImportError::InvalidRow { line, message } => {
                write!(f, "invalid ledger row at line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for LedgerImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerImportError::Io(err) => Some(err),
            LedgerImportError::Csv(err) => Some(err),
            LedgerImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for LedgerImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for LedgerImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct LedgerCsvImporter;

impl LedgerCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<LedgerTransaction>, LedgerImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<LedgerTransaction>, LedgerImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut transactions = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record
                .position()
                .map(|position| position.line())
                .unwrap_or_default();
            let row: LedgerRow = record.deserialize(Some(&headers))?;
            transactions.push(row.into_transaction(line)?);
        }

        Ok(transactions)
    }
}

#[derive(Debug, Deserialize)]
struct LedgerRow {
    id: String,
    created: String,
    amount: f64,
    currency: String,
    status: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    refunded: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    disputed: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    recurring: Option<String>,
}

impl LedgerRow {
    fn into_transaction(self, line: u64) -> Result<LedgerTransaction, LedgerImportError> {
        let invalid = |message: String| LedgerImportError::InvalidRow { line, message };

        let created_at = parse_datetime(&self.created)
            .ok_or_else(|| invalid(format!("unrecognized created date '{}'", self.created)))?;
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(invalid(format!("amount {} must be non-negative", self.amount)));
        }
        let status = match self.status.to_ascii_lowercase().as_str() {
            "succeeded" | "paid" => ChargeStatus::Succeeded,
            "pending" => ChargeStatus::Pending,
            "failed" => ChargeStatus::Failed,
            other => return Err(invalid(format!("unknown status '{other}'"))),
        };

        Ok(LedgerTransaction {
            external_id: self.id,
            amount: (self.amount * 100.0).round() as i64,
            currency: self.currency.to_ascii_lowercase(),
            created_at,
            status,
            refunded: parse_flag(self.refunded.as_deref()),
            disputed: parse_flag(self.disputed.as_deref()),
            recurring: parse_flag(self.recurring.as_deref()),
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "yes" | "1" | "y")
    )
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
