use super::normalize::normalize;
use super::overrides::{apply_overrides, OverrideRule};
use super::retry::{Provenance, RetryPolicy, RetryingClassifier};
use super::types::{ChatClient, Classification};

/// Where a report's final label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    Model,
    Fallback,
    Override(OverrideRule),
}

impl LabelSource {
    pub fn as_label(&self) -> String {
        match self {
            Self::Model => "model".to_string(),
            Self::Fallback => "fallback".to_string(),
            Self::Override(rule) => format!("override:{rule}"),
        }
    }

    /// Inverse of `as_label`, used when resuming from an earlier output file.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "model" => Some(Self::Model),
            "fallback" => Some(Self::Fallback),
            other => {
                let rule = other.strip_prefix("override:")?;
                OverrideRule::ALL
                    .into_iter()
                    .find(|r| r.as_str() == rule)
                    .map(Self::Override)
            }
        }
    }
}

/// Final record for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledReport {
    pub id: String,
    pub classification: Classification,
    /// `None` for rows carried over from an output file that had no source column.
    pub source: Option<LabelSource>,
}

/// Runs the full per-report pipeline:
/// normalize → prompt → model (with retry) → validate → override
pub struct ReportLabeler {
    client: Box<dyn ChatClient + Send + Sync>,
    model_name: String,
    policy: RetryPolicy,
}

impl ReportLabeler {
    pub fn new(client: Box<dyn ChatClient + Send + Sync>, model_name: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            model_name: model_name.to_string(),
            policy,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Label one report. Never fails; the worst outcome is a review flag.
    pub fn label(&self, report_id: &str, raw_text: Option<&str>) -> LabeledReport {
        let _span = tracing::debug_span!("label_report", report_id = %report_id).entered();

        let text = normalize(raw_text);
        let classifier = RetryingClassifier::new(self.client.as_ref(), &self.model_name, self.policy);
        let outcome = classifier.classify(report_id, &text);

        let overridden = apply_overrides(outcome.classification, &text);
        let source = match overridden.first_fired() {
            Some(rule) => {
                if overridden.classification != outcome.classification {
                    tracing::debug!(
                        report_id = %report_id,
                        rule = %rule,
                        "Override rule replaced model answer"
                    );
                }
                LabelSource::Override(rule)
            }
            None => match outcome.provenance {
                Provenance::Model => LabelSource::Model,
                Provenance::Fallback => LabelSource::Fallback,
            },
        };

        LabeledReport {
            id: report_id.to_string(),
            classification: overridden.classification,
            source: Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::labeling::ollama::MockChatClient;
    use std::time::Duration;

    const L45_ANSWER: &str = r#"{"L1/2":false,"L2/3":false,"L3/4":false,"L4/5":true,"L5/S1":false,"need_check":false}"#;
    const L34_ANSWER: &str = r#"{"L1/2":false,"L2/3":false,"L3/4":true,"L4/5":false,"L5/S1":false,"need_check":false}"#;

    fn labeler(client: MockChatClient) -> ReportLabeler {
        ReportLabeler::new(
            Box::new(client),
            "llama3",
            RetryPolicy {
                max_retries: 2,
                backoff: Duration::ZERO,
            },
        )
    }

    #[test]
    fn scenario_a_no_abnormality() {
        let result = labeler(MockChatClient::new(L45_ANSWER)).label("a", Some("No significant abnormality."));
        assert_eq!(result.classification, Classification::default());
        assert_eq!(
            result.source,
            Some(LabelSource::Override(OverrideRule::NoStenosisMention))
        );
    }

    #[test]
    fn scenario_b_passes_through() {
        let result = labeler(MockChatClient::new(L45_ANSWER))
            .label("b", Some("L4/5 moderate central canal stenosis."));
        let expected = Classification {
            l4_l5: true,
            ..Default::default()
        };
        assert_eq!(result.classification, expected);
        assert_eq!(result.source, Some(LabelSource::Model));
    }

    #[test]
    fn scenario_c_mild_overrides_model() {
        let result = labeler(MockChatClient::new(L34_ANSWER)).label("c", Some("Mild L3/4 spinal stenosis noted."));
        assert_eq!(result.classification, Classification::default());
        assert_eq!(result.source, Some(LabelSource::Override(OverrideRule::MildStenosis)));
    }

    #[test]
    fn scenario_d_garbage_falls_back() {
        let result = labeler(MockChatClient::new("not json at all"))
            .label("d", Some("Severe L5/S1 foraminal stenosis."));
        assert_eq!(result.classification, Classification::SAFE_DEFAULT);
        assert_eq!(result.source, Some(LabelSource::Fallback));
    }

    #[test]
    fn missing_text_is_cleared_by_rule_one() {
        let result = labeler(MockChatClient::unreachable()).label("e", None);
        assert_eq!(result.classification, Classification::default());
    }

    #[test]
    fn disclaimer_suffix_does_not_reach_overrides() {
        let text = format!(
            "Unremarkable lumbar spine.\n{}\nSevere L4/5 stenosis.",
            crate::pipeline::labeling::normalize::DISCLAIMER_MARKER
        );
        let result = labeler(MockChatClient::new(L45_ANSWER)).label("f", Some(text.as_str()));
        assert_eq!(result.classification, Classification::default());
    }

    #[test]
    fn source_labels_round_trip() {
        for source in [
            LabelSource::Model,
            LabelSource::Fallback,
            LabelSource::Override(OverrideRule::FacetOnly),
        ] {
            assert_eq!(LabelSource::from_label(&source.as_label()), Some(source));
        }
        assert_eq!(LabelSource::from_label("override:unknown"), None);
        assert_eq!(LabelSource::from_label(""), None);
    }
}
