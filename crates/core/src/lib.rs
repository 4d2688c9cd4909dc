pub mod domain;
pub mod export;
pub mod ingest;
pub mod report;

pub use domain::contract::{validate_records, RawPredictionRecord, ValidatedRecords, ValidationError};
pub use domain::record::{Outcome, PredictionRecord};
pub use export::{export_to_spreadsheet, ExportBuffer, SerializationError, XLSX_MIME_TYPE};
pub use report::{compute_accuracy_series, compute_frequency, AccuracySeries, DashboardReport, FrequencyTable};

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub predictions_path: Option<PathBuf>,
        pub port: u16,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let port = match std::env::var("PORT") {
                Ok(v) => v
                    .parse::<u16>()
                    .with_context(|| format!("PORT must be a port number (got {v:?})"))?,
                Err(_) => 3000,
            };

            Ok(Self {
                predictions_path: std::env::var("PREDICTIONS_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
                port,
                sentry_dsn: std::env::var("SENTRY_DSN").ok().filter(|s| !s.is_empty()),
            })
        }
    }
}
