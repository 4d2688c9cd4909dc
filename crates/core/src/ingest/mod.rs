pub mod sample;

use crate::domain::contract::RawPredictionRecord;
use crate::export::import_from_spreadsheet;
use anyhow::{bail, Context};
use std::path::Path;

/// Loads unvalidated rows from a `.json` array or an `.xlsx` workbook.
pub fn load_raw_records(path: &Path) -> anyhow::Result<Vec<RawPredictionRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    let rows = match ext.as_str() {
        "json" => parse_json_records(&bytes)
            .with_context(|| format!("invalid prediction JSON in {}", path.display()))?,
        "xlsx" => import_from_spreadsheet(&bytes)
            .with_context(|| format!("invalid prediction workbook {}", path.display()))?,
        other => bail!(
            "unsupported input format {other:?} for {} (expected .json or .xlsx)",
            path.display()
        ),
    };

    tracing::info!(path = %path.display(), rows = rows.len(), "loaded prediction rows");
    Ok(rows)
}

pub fn parse_json_records(bytes: &[u8]) -> anyhow::Result<Vec<RawPredictionRecord>> {
    serde_json::from_slice::<Vec<RawPredictionRecord>>(bytes)
        .context("expected an array of {date, league, outcome} objects")
}

/// Rows from `path` when given, otherwise the built-in sample.
pub fn load_or_sample(path: Option<&Path>) -> anyhow::Result<Vec<RawPredictionRecord>> {
    match path {
        Some(p) => load_raw_records(p),
        None => Ok(sample::sample_records()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{Outcome, PredictionRecord};
    use crate::export::export_to_spreadsheet;
    use chrono::NaiveDate;
    use serde_json::json;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("predictions_ingest_{}_{name}", std::process::id()))
    }

    #[test]
    fn parses_json_array() {
        let body = json!([
            {"date": "2025-08-01", "league": "La Liga", "outcome": "Wrong"},
            {"Date": "2025-08-02", "League": "Serie A", "Outcome": "✅ Correct"},
        ])
        .to_string();
        let rows = parse_json_records(body.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].league, "Serie A");
    }

    #[test]
    fn rejects_non_array_json() {
        assert!(parse_json_records(br#"{"date": "2025-08-01"}"#).is_err());
    }

    #[test]
    fn loads_json_and_xlsx_files() {
        let json_path = temp_path("rows.json");
        std::fs::write(
            &json_path,
            json!([{"date": "2025-08-01", "league": "La Liga", "outcome": "Wrong"}]).to_string(),
        )
        .unwrap();
        let rows = load_raw_records(&json_path).unwrap();
        assert_eq!(rows, vec![RawPredictionRecord::new("2025-08-01", "La Liga", "Wrong")]);
        std::fs::remove_file(&json_path).ok();

        let xlsx_path = temp_path("rows.XLSX");
        let d = NaiveDate::from_ymd_opt(2025, 8, 2).unwrap();
        let buf = export_to_spreadsheet(&[PredictionRecord::new(d, "Serie A", Outcome::Correct)])
            .unwrap();
        std::fs::write(&xlsx_path, buf.as_bytes()).unwrap();
        let rows = load_raw_records(&xlsx_path).unwrap();
        assert_eq!(rows, vec![RawPredictionRecord::new("2025-08-02", "Serie A", "Correct")]);
        std::fs::remove_file(&xlsx_path).ok();
    }

    #[test]
    fn rejects_unknown_extension_and_missing_file() {
        let csv_path = temp_path("rows.csv");
        std::fs::write(&csv_path, "date,league,outcome\n").unwrap();
        assert!(load_raw_records(&csv_path).is_err());
        std::fs::remove_file(&csv_path).ok();

        assert!(load_raw_records(&temp_path("missing.json")).is_err());
    }

    #[test]
    fn falls_back_to_sample() {
        assert_eq!(load_or_sample(None).unwrap().len(), 5);
    }
}
