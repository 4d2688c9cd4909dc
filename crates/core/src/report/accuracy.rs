use crate::domain::record::PredictionRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Percentage of correct predictions per calendar date, ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccuracySeries(BTreeMap<NaiveDate, f64>);

impl AccuracySeries {
    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.0.get(date).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.0.iter().map(|(d, pct)| (*d, *pct))
    }

    pub fn as_map(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.0
    }
}

pub fn compute_accuracy_series(records: &[PredictionRecord]) -> AccuracySeries {
    // (correct, total) per date.
    let mut groups: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.date).or_insert((0, 0));
        if record.is_correct() {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    let series = groups
        .into_iter()
        .filter(|(_, (_, total))| *total > 0)
        .map(|(date, (correct, total))| (date, 100.0 * correct as f64 / total as f64))
        .collect();

    AccuracySeries(series)
}
