pub mod import;
pub mod xlsx;
pub(crate) mod xml;

pub use import::{import_from_spreadsheet, read_sheet_rows};
pub use xlsx::CellValue;

use crate::domain::record::PredictionRecord;
use chrono::NaiveDate;

pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const SHEET_NAME: &str = "Predictions";

pub const COLUMNS: [&str; 4] = ["Date", "League", "Outcome", "Correct"];

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("cell {cell}: text contains U+{codepoint:04X}, which a workbook cannot store")]
    InvalidText { cell: String, codepoint: u32 },

    #[error("cell {cell}: text is {len} characters (max {max})")]
    CellTooLong { cell: String, len: usize, max: usize },

    #[error("cell {cell}: number is not finite")]
    NonFiniteNumber { cell: String },

    #[error("{rows} rows exceed the sheet limit of {max}")]
    TooManyRows { rows: usize, max: usize },

    #[error("zip container write failed")]
    Zip(#[from] zip::result::ZipError),

    #[error("workbook write failed")]
    Io(#[from] std::io::Error),
}

/// Finished `.xlsx` workbook bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBuffer {
    bytes: Vec<u8>,
}

impl ExportBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn file_name(generated_on: NaiveDate) -> String {
        format!("predictions_{}.xlsx", generated_on.format("%Y-%m-%d"))
    }

    pub fn mime_type() -> &'static str {
        XLSX_MIME_TYPE
    }
}

pub fn export_to_spreadsheet(
    records: &[PredictionRecord],
) -> Result<ExportBuffer, SerializationError> {
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(
        COLUMNS
            .iter()
            .map(|h| CellValue::Text((*h).to_string()))
            .collect::<Vec<_>>(),
    );

    for record in records {
        rows.push(vec![
            CellValue::Date(record.date),
            CellValue::Text(record.league.clone()),
            CellValue::Text(record.outcome.label().to_string()),
            CellValue::Bool(record.is_correct()),
        ]);
    }

    let bytes = xlsx::write_workbook(SHEET_NAME, &rows)?;
    tracing::debug!(
        rows = records.len(),
        bytes = bytes.len(),
        "exported predictions workbook"
    );
    Ok(ExportBuffer { bytes })
}
