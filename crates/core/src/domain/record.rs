use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    Correct,
    Wrong,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Correct => "Correct",
            Outcome::Wrong => "Wrong",
        }
    }

    /// Accepts the canonical labels and the emoji-prefixed forms used by the sample data.
    /// Anything else is rejected rather than guessed.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Correct" | "✅ Correct" => Some(Outcome::Correct),
            "Wrong" | "❌ Wrong" => Some(Outcome::Wrong),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub league: String,
    pub outcome: Outcome,
}

impl PredictionRecord {
    pub fn new(date: NaiveDate, league: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            date,
            league: league.into(),
            outcome,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.outcome == Outcome::Correct
    }
}
