//! Bounded retry around the model call.
//!
//! Each report goes through an explicit state machine:
//! `Attempting(n) → Success | Retrying(n) | Exhausted`. Transport faults and
//! unusable answers are handled identically. Exhaustion is not an error: it
//! yields the safe default so the record is routed to human review.

use std::time::Duration;

use super::prompt::build_messages;
use super::types::{ChatClient, ChatMessage, Classification};
use super::validation::validate_response;
use super::AttemptError;

/// Retry knobs. Defaults: 2 retries after the first attempt, 1s between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Where the classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// A validated model answer.
    Model,
    /// All attempts failed; safe default.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOutcome {
    pub classification: Classification,
    pub provenance: Provenance,
    pub attempts: u32,
}

/// States of one report's classification. `attempt` is 1-based.
#[derive(Debug)]
enum AttemptState {
    Attempting { attempt: u32 },
    Retrying { attempt: u32 },
    Success { attempt: u32, classification: Classification },
    Exhausted { attempts: u32 },
}

/// Calls the model through a `ChatClient` and never fails.
pub struct RetryingClassifier<'a> {
    client: &'a dyn ChatClient,
    model: &'a str,
    temperature: f32,
    policy: RetryPolicy,
}

impl<'a> RetryingClassifier<'a> {
    pub fn new(client: &'a dyn ChatClient, model: &'a str, policy: RetryPolicy) -> Self {
        Self {
            client,
            model,
            temperature: 0.0,
            policy,
        }
    }

    /// Classify normalized report text. `report_id` is only used for logging.
    pub fn classify(&self, report_id: &str, normalized_text: &str) -> ClassifyOutcome {
        let messages = build_messages(normalized_text);
        let total = self.policy.total_attempts();
        let mut state = AttemptState::Attempting { attempt: 1 };

        loop {
            state = match state {
                AttemptState::Attempting { attempt } => match self.attempt_once(&messages) {
                    Ok(classification) => AttemptState::Success {
                        attempt,
                        classification,
                    },
                    Err(e) if attempt < total => {
                        tracing::warn!(
                            report_id = %report_id,
                            attempt,
                            error = %e,
                            "Classification attempt failed, retrying"
                        );
                        AttemptState::Retrying { attempt }
                    }
                    Err(e) => {
                        tracing::warn!(
                            report_id = %report_id,
                            attempt,
                            error = %e,
                            "Classification attempts exhausted, flagging for review"
                        );
                        AttemptState::Exhausted { attempts: attempt }
                    }
                },
                AttemptState::Retrying { attempt } => {
                    if !self.policy.backoff.is_zero() {
                        std::thread::sleep(self.policy.backoff);
                    }
                    AttemptState::Attempting {
                        attempt: attempt + 1,
                    }
                }
                AttemptState::Success {
                    attempt,
                    classification,
                } => {
                    return ClassifyOutcome {
                        classification,
                        provenance: Provenance::Model,
                        attempts: attempt,
                    }
                }
                AttemptState::Exhausted { attempts } => {
                    return ClassifyOutcome {
                        classification: Classification::SAFE_DEFAULT,
                        provenance: Provenance::Fallback,
                        attempts,
                    }
                }
            };
        }
    }

    fn attempt_once(&self, messages: &[ChatMessage]) -> Result<Classification, AttemptError> {
        let raw = self.client.chat(messages, self.model, self.temperature)?;
        Ok(validate_response(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::labeling::ollama::MockChatClient;
    use crate::pipeline::labeling::types::SpinalLevel;

    const L45_ANSWER: &str = r#"{"L1/2":false,"L2/3":false,"L3/4":false,"L4/5":true,"L5/S1":false,"need_check":false}"#;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn default_policy_is_three_attempts_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.total_attempts(), 3);
        assert_eq!(policy.backoff, Duration::from_secs(1));
    }

    #[test]
    fn success_on_first_attempt() {
        let client = MockChatClient::new(L45_ANSWER);
        let classifier = RetryingClassifier::new(&client, "llama3", fast_policy(2));
        let outcome = classifier.classify("r1", "L4/5 moderate central canal stenosis.");
        assert_eq!(outcome.provenance, Provenance::Model);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.classification.positive_levels(), vec![SpinalLevel::L4L5]);
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn transport_failure_exhausts_after_retries_plus_one() {
        let client = MockChatClient::unreachable();
        let classifier = RetryingClassifier::new(&client, "llama3", fast_policy(2));
        let outcome = classifier.classify("r1", "text");
        assert_eq!(outcome.classification, Classification::SAFE_DEFAULT);
        assert_eq!(outcome.provenance, Provenance::Fallback);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn custom_retry_count_is_honored() {
        let client = MockChatClient::unreachable();
        let classifier = RetryingClassifier::new(&client, "llama3", fast_policy(4));
        classifier.classify("r1", "text");
        assert_eq!(client.call_count(), 5);
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let client = MockChatClient::new("garbage");
        let classifier = RetryingClassifier::new(&client, "llama3", fast_policy(0));
        let outcome = classifier.classify("r1", "text");
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.provenance, Provenance::Fallback);
    }

    #[test]
    fn garbage_every_time_yields_safe_default() {
        let client = MockChatClient::new("Sorry, I am not sure about this report.");
        let classifier = RetryingClassifier::new(&client, "llama3", fast_policy(2));
        let outcome = classifier.classify("r1", "text");
        assert_eq!(outcome.classification, Classification::SAFE_DEFAULT);
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn recovers_after_mixed_failures() {
        let client = MockChatClient::scripted(vec![
            None,
            Some(r#"{"L1/2": "maybe"}"#.into()),
            Some(L45_ANSWER.into()),
        ]);
        let classifier = RetryingClassifier::new(&client, "llama3", fast_policy(2));
        let outcome = classifier.classify("r1", "text");
        assert_eq!(outcome.provenance, Provenance::Model);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.classification.l4_l5);
    }

    #[test]
    fn backoff_is_applied_between_attempts() {
        let client = MockChatClient::unreachable();
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(20),
        };
        let classifier = RetryingClassifier::new(&client, "llama3", policy);
        let start = std::time::Instant::now();
        classifier.classify("r1", "text");
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
