//! Emotion reference data and the per-run completion ledger

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The emotions a participant can reflect on.
///
/// Serialized by display label, which is also the wire identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Emotion {
    Excitement,
    Uncertainty,
    Frustration,
}

impl Emotion {
    pub const ALL: [Emotion; 3] = [
        Emotion::Excitement,
        Emotion::Uncertainty,
        Emotion::Frustration,
    ];

    /// Single-character menu token
    pub fn token(self) -> char {
        match self {
            Emotion::Excitement => 'A',
            Emotion::Uncertainty => 'B',
            Emotion::Frustration => 'C',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Excitement => "Excitement",
            Emotion::Uncertainty => "Uncertainty",
            Emotion::Frustration => "Frustration",
        }
    }

    /// Look up an emotion by menu token, ignoring case and surrounding whitespace
    pub fn from_token(input: &str) -> Option<Self> {
        let mut chars = input.trim().chars();
        let c = chars.next()?.to_ascii_uppercase();
        if chars.next().is_some() {
            return None;
        }
        Self::ALL.into_iter().find(|e| e.token() == c)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Emotions fully reflected on during this run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionLedger {
    completed: BTreeSet<Emotion>,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, emotion: Emotion) -> bool {
        self.completed.contains(&emotion)
    }

    /// Returns false if the emotion was already recorded
    pub fn record(&mut self, emotion: Emotion) -> bool {
        self.completed.insert(emotion)
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Emotions still available for selection, in menu order
    pub fn remaining(&self) -> Vec<Emotion> {
        Emotion::ALL
            .into_iter()
            .filter(|e| !self.completed.contains(e))
            .collect()
    }
}
