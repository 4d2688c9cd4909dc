use crate::domain::record::PredictionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable(BTreeMap<String, u64>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub label: String,
    pub count: u64,
}

impl FrequencyTable {
    pub fn get(&self, label: &str) -> u64 {
        self.0.get(label).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.0
    }

    /// Display order: descending count, ties by label.
    pub fn sorted(&self) -> Vec<FrequencyEntry> {
        let mut out: Vec<FrequencyEntry> = self
            .0
            .iter()
            .map(|(label, count)| FrequencyEntry {
                label: label.clone(),
                count: *count,
            })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        out
    }
}

pub fn compute_frequency<F>(records: &[PredictionRecord], key_selector: F) -> FrequencyTable
where
    F: Fn(&PredictionRecord) -> &str,
{
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let key = key_selector(record);
        match counts.get_mut(key) {
            Some(n) => *n += 1,
            None => {
                counts.insert(key.to_string(), 1);
            }
        }
    }
    FrequencyTable(counts)
}

pub fn by_outcome(record: &PredictionRecord) -> &str {
    record.outcome.label()
}

pub fn by_league(record: &PredictionRecord) -> &str {
    &record.league
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Outcome;
    use chrono::NaiveDate;

    fn sample() -> Vec<PredictionRecord> {
        let d = |day| NaiveDate::from_ymd_opt(2025, 8, day).unwrap();
        vec![
            PredictionRecord::new(d(1), "Premier League", Outcome::Correct),
            PredictionRecord::new(d(1), "La Liga", Outcome::Wrong),
            PredictionRecord::new(d(2), "Premier League", Outcome::Correct),
            PredictionRecord::new(d(3), "Serie A", Outcome::Wrong),
            PredictionRecord::new(d(3), "La Liga", Outcome::Correct),
        ]
    }

    #[test]
    fn counts_outcomes_and_leagues() {
        let records = sample();
        let outcomes = compute_frequency(&records, by_outcome);
        assert_eq!(outcomes.get("Correct"), 3);
        assert_eq!(outcomes.get("Wrong"), 2);

        let leagues = compute_frequency(&records, by_league);
        assert_eq!(leagues.len(), 3);
        assert_eq!(leagues.get("Premier League"), 2);
        assert_eq!(leagues.get("La Liga"), 2);
        assert_eq!(leagues.get("Serie A"), 1);
        assert_eq!(leagues.get("Bundesliga"), 0);
    }

    #[test]
    fn counts_sum_to_record_count() {
        let records = sample();
        assert_eq!(compute_frequency(&records, by_outcome).total(), records.len() as u64);
        assert_eq!(compute_frequency(&records, by_league).total(), records.len() as u64);
    }

    #[test]
    fn sorted_is_descending_with_label_tiebreak() {
        let leagues = compute_frequency(&sample(), by_league);
        let labels: Vec<String> = leagues.sorted().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["La Liga", "Premier League", "Serie A"]);
    }

    #[test]
    fn empty_input_gives_empty_table() {
        assert!(compute_frequency(&[], by_league).is_empty());
    }
}
