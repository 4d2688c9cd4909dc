use crate::domain::contract::RawPredictionRecord;

/// Built-in demo table. Returned by value; callers own their copy.
pub fn sample_records() -> Vec<RawPredictionRecord> {
    vec![
        RawPredictionRecord::new("2025-08-01", "Premier League", "✅ Correct"),
        RawPredictionRecord::new("2025-08-01", "La Liga", "❌ Wrong"),
        RawPredictionRecord::new("2025-08-02", "Premier League", "✅ Correct"),
        RawPredictionRecord::new("2025-08-03", "Serie A", "❌ Wrong"),
        RawPredictionRecord::new("2025-08-03", "La Liga", "✅ Correct"),
    ]
}
