//! Deterministic keyword overrides applied after the model.
//!
//! Rules are plain case-insensitive substring checks on the normalized text.
//! They do not pair levels with severities and do not handle negation:
//! "no stenosis" still counts as a stenosis mention. When a rule fires the
//! model's answer is discarded, never merged, and no rule re-enables a level.

use super::types::Classification;

const FACET_TERMS: &[&str] = &[
    "facet arthrosis",
    "facet arthropathy",
    "facet osteoarthritis",
    "facet joint osteoarthritis",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideRule {
    /// Neither "stenosis" nor "narrowing" appears.
    NoStenosisMention,
    /// Facet degeneration terms without any stenosis/narrowing mention.
    /// Always subsumed by `NoStenosisMention`; kept as its own rule.
    FacetOnly,
    /// "mild" and "stenosis" both appear, anywhere in the text.
    MildStenosis,
}

impl OverrideRule {
    /// Evaluation order.
    pub const ALL: [OverrideRule; 3] = [
        OverrideRule::NoStenosisMention,
        OverrideRule::FacetOnly,
        OverrideRule::MildStenosis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoStenosisMention => "no_stenosis_mention",
            Self::FacetOnly => "facet_only",
            Self::MildStenosis => "mild_stenosis",
        }
    }

    /// Guard evaluated against lowercased text.
    fn matches(self, lower: &str) -> bool {
        let mentions_stenosis = lower.contains("stenosis");
        let mentions_narrowing = lower.contains("narrowing");
        match self {
            Self::NoStenosisMention => !mentions_stenosis && !mentions_narrowing,
            Self::FacetOnly => {
                FACET_TERMS.iter().any(|t| lower.contains(t))
                    && !mentions_stenosis
                    && !mentions_narrowing
            }
            Self::MildStenosis => lower.contains("mild") && mentions_stenosis,
        }
    }
}

impl std::fmt::Display for OverrideRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideOutcome {
    pub classification: Classification,
    /// Every rule whose guard matched, in evaluation order.
    pub fired: Vec<OverrideRule>,
}

impl OverrideOutcome {
    pub fn first_fired(&self) -> Option<OverrideRule> {
        self.fired.first().copied()
    }
}

/// Rules whose guards match `normalized_text`.
pub fn matching_rules(normalized_text: &str) -> Vec<OverrideRule> {
    let lower = normalized_text.to_lowercase();
    OverrideRule::ALL
        .into_iter()
        .filter(|rule| rule.matches(&lower))
        .collect()
}

/// Apply every rule in order to the validated (or fallback) classification.
pub fn apply_overrides(classification: Classification, normalized_text: &str) -> OverrideOutcome {
    let fired = matching_rules(normalized_text);
    let classification = if fired.is_empty() {
        classification
    } else {
        // Each firing rule clears everything; repeated clearing is a no-op.
        Classification::default()
    };
    OverrideOutcome {
        classification,
        fired,
    }
}
