//! Evaluate the classifier against labelled training examples.

use crate::classifier::IntentClassifier;
use crate::content::TrainingExample;
use crate::intent::Intent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub id: i64,
    pub query: String,
    pub expected: Intent,
    /// `None` when the query itself was rejected (empty, too long)
    pub actual: Option<Intent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub mismatches: Vec<Mismatch>,
}

pub fn evaluate(classifier: &IntentClassifier, examples: &[TrainingExample]) -> TrainingReport {
    let mut mismatches = Vec::new();

    for example in examples {
        let actual = classifier.classify(&example.query).ok().map(|c| c.intent);
        if actual != Some(example.expected_intent) {
            mismatches.push(Mismatch {
                id: example.id,
                query: example.query.clone(),
                expected: example.expected_intent,
                actual,
            });
        }
    }

    let total = examples.len();
    let correct = total - mismatches.len();
    let accuracy = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    };

    TrainingReport {
        total,
        correct,
        accuracy,
        mismatches,
    }
}
