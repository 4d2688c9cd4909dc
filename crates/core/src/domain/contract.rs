use crate::domain::record::{Outcome, PredictionRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An input row before validation. Field names also accept the capitalized
/// column headers used by the spreadsheet export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPredictionRecord {
    #[serde(alias = "Date")]
    pub date: String,
    #[serde(alias = "League")]
    pub league: String,
    #[serde(alias = "Outcome")]
    pub outcome: String,
}

impl RawPredictionRecord {
    pub fn new(date: &str, league: &str, outcome: &str) -> Self {
        Self {
            date: date.to_string(),
            league: league.to_string(),
            outcome: outcome.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("record {index}: invalid date {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { index: usize, value: String },

    #[error("record {index}: unknown outcome {value:?}")]
    UnknownOutcome { index: usize, value: String },

    #[error("record {index}: league must be non-empty")]
    EmptyLeague { index: usize },
}

impl ValidationError {
    pub fn index(&self) -> usize {
        match self {
            ValidationError::InvalidDate { index, .. }
            | ValidationError::UnknownOutcome { index, .. }
            | ValidationError::EmptyLeague { index } => *index,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidatedRecords {
    pub records: Vec<PredictionRecord>,
    pub rejected: Vec<ValidationError>,
}

impl ValidatedRecords {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl PredictionRecord {
    pub fn try_from_raw(
        index: usize,
        raw: &RawPredictionRecord,
    ) -> Result<PredictionRecord, ValidationError> {
        let invalid_date = || ValidationError::InvalidDate {
            index,
            value: raw.date.clone(),
        };
        let date_str = raw.date.trim();
        if !is_iso_date_shape(date_str) {
            return Err(invalid_date());
        }
        let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|_| invalid_date())?;

        let league = raw.league.trim();
        if league.is_empty() {
            return Err(ValidationError::EmptyLeague { index });
        }

        let outcome =
            Outcome::from_label(&raw.outcome).ok_or_else(|| ValidationError::UnknownOutcome {
                index,
                value: raw.outcome.clone(),
            })?;

        Ok(PredictionRecord {
            date,
            league: league.to_string(),
            outcome,
        })
    }
}

/// `YYYY-MM-DD` with zero-padded fields; chrono alone also accepts `2025-8-1`.
fn is_iso_date_shape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

/// Validates every row independently. Invalid rows are dropped from `records`
/// and reported in `rejected`; valid rows keep their input order.
pub fn validate_records(raw: &[RawPredictionRecord]) -> ValidatedRecords {
    let mut out = ValidatedRecords {
        records: Vec::with_capacity(raw.len()),
        rejected: Vec::new(),
    };

    for (index, row) in raw.iter().enumerate() {
        match PredictionRecord::try_from_raw(index, row) {
            Ok(record) => out.records.push(record),
            Err(err) => out.rejected.push(err),
        }
    }

    if !out.rejected.is_empty() {
        tracing::debug!(
            accepted = out.records.len(),
            rejected = out.rejected.len(),
            "prediction records failed validation"
        );
    }

    out
}
