//! Keyword-based crisis detection.
//!
//! Matching is a case-insensitive substring search with no word-boundary
//! handling, so "give up on this assignment" is a positive. False positives
//! are accepted; false negatives on a listed phrase are not.

use serde::{Deserialize, Serialize};

/// How urgently a positive signal should be escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Hopelessness language.
    Elevated,
    /// Explicit self-harm or suicide language.
    Critical,
}

/// The single phrase list every chat surface scans against.
///
/// Phrases are stored lowercase. Inflections are listed explicitly because the
/// matcher does no stemming.
pub const RISK_PHRASES: &[(&str, Severity)] = &[
    ("suicide", Severity::Critical),
    ("suicidal", Severity::Critical),
    ("kill myself", Severity::Critical),
    ("killing myself", Severity::Critical),
    ("hurt myself", Severity::Critical),
    ("hurting myself", Severity::Critical),
    ("harm myself", Severity::Critical),
    ("self harm", Severity::Critical),
    ("self-harm", Severity::Critical),
    ("end it all", Severity::Critical),
    ("end my life", Severity::Critical),
    ("want to die", Severity::Critical),
    ("better off dead", Severity::Critical),
    ("no reason to live", Severity::Critical),
    ("no point", Severity::Elevated),
    ("give up", Severity::Elevated),
    ("giving up", Severity::Elevated),
    ("hopeless", Severity::Elevated),
    ("worthless", Severity::Elevated),
    ("can't go on", Severity::Elevated),
];

/// Result of scanning one message. Derived per message and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrisisSignal {
    pub severity: Option<Severity>,
    pub matched: Vec<&'static str>,
}

impl CrisisSignal {
    pub fn is_positive(&self) -> bool {
        self.severity.is_some()
    }
}

/// Lowercases and folds typographic apostrophes so "can’t" matches "can't".
fn normalise(text: &str) -> String {
    text.to_lowercase()
        .replace(&['\u{2019}', '\u{2018}', '\u{02bc}'][..], "'")
}

/// Returns true when `text` contains any listed risk phrase, in any case.
pub fn detect(text: &str) -> bool {
    let lowered = normalise(text);
    RISK_PHRASES
        .iter()
        .any(|(phrase, _)| lowered.contains(phrase))
}

/// Scans `text` and reports every matched phrase with the highest severity among them.
pub fn assess(text: &str) -> CrisisSignal {
    let lowered = normalise(text);

    let mut signal = CrisisSignal::default();
    for (phrase, severity) in RISK_PHRASES {
        if lowered.contains(phrase) {
            signal.matched.push(phrase);
            signal.severity = signal.severity.max(Some(*severity));
        }
    }

    signal
}
