pub mod accuracy;
pub mod frequency;

pub use accuracy::{compute_accuracy_series, AccuracySeries};
pub use frequency::{by_league, by_outcome, compute_frequency, FrequencyEntry, FrequencyTable};

use crate::domain::record::PredictionRecord;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyPoint {
    pub date: NaiveDate,
    pub accuracy_pct: f64,
}

/// All dashboard views over one record snapshot, shaped for a charting client.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub total_records: usize,
    pub accuracy_over_time: Vec<AccuracyPoint>,
    pub outcome_distribution: Vec<FrequencyEntry>,
    pub predictions_per_league: Vec<FrequencyEntry>,
}

impl DashboardReport {
    pub fn build(records: &[PredictionRecord]) -> Self {
        let accuracy = compute_accuracy_series(records);
        let outcomes = compute_frequency(records, by_outcome);
        let leagues = compute_frequency(records, by_league);

        Self {
            total_records: records.len(),
            accuracy_over_time: accuracy
                .iter()
                .map(|(date, accuracy_pct)| AccuracyPoint { date, accuracy_pct })
                .collect(),
            outcome_distribution: outcomes.sorted(),
            predictions_per_league: leagues.sorted(),
        }
    }

    /// Share of correct predictions across the whole snapshot, if any records exist.
    pub fn overall_accuracy_pct(&self) -> Option<f64> {
        if self.total_records == 0 {
            return None;
        }
        let correct = self
            .outcome_distribution
            .iter()
            .find(|e| e.label == crate::domain::record::Outcome::Correct.label())
            .map(|e| e.count)
            .unwrap_or(0);
        Some(100.0 * correct as f64 / self.total_records as f64)
    }
}
