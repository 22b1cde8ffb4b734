use serde::{Deserialize, Serialize};

use super::TransportError;

/// Lumbar segment boundaries a stenosis finding can be attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpinalLevel {
    L1L2,
    L2L3,
    L3L4,
    L4L5,
    L5S1,
}

impl SpinalLevel {
    pub const ALL: [SpinalLevel; 5] = [
        SpinalLevel::L1L2,
        SpinalLevel::L2L3,
        SpinalLevel::L3L4,
        SpinalLevel::L4L5,
        SpinalLevel::L5S1,
    ];

    /// Key used in model JSON and in the output header.
    pub fn key(self) -> &'static str {
        match self {
            Self::L1L2 => "L1/2",
            Self::L2L3 => "L2/3",
            Self::L3L4 => "L3/4",
            Self::L4L5 => "L4/5",
            Self::L5S1 => "L5/S1",
        }
    }
}

impl std::fmt::Display for SpinalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Key of the "route to human review" flag.
pub const NEED_CHECK_KEY: &str = "need_check";

/// All six keys in output order.
pub const CLASSIFICATION_KEYS: [&str; 6] = ["L1/2", "L2/3", "L3/4", "L4/5", "L5/S1", NEED_CHECK_KEY];

/// Per-level stenosis classification of one report.
///
/// Every field is a plain `bool`, so a value with a missing key cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "L1/2")]
    pub l1_l2: bool,
    #[serde(rename = "L2/3")]
    pub l2_l3: bool,
    #[serde(rename = "L3/4")]
    pub l3_l4: bool,
    #[serde(rename = "L4/5")]
    pub l4_l5: bool,
    #[serde(rename = "L5/S1")]
    pub l5_s1: bool,
    pub need_check: bool,
}

impl Classification {
    /// Fallback when extraction cannot be completed: no level, flagged for review.
    pub const SAFE_DEFAULT: Classification = Classification {
        l1_l2: false,
        l2_l3: false,
        l3_l4: false,
        l4_l5: false,
        l5_s1: false,
        need_check: true,
    };

    pub fn level(&self, level: SpinalLevel) -> bool {
        match level {
            SpinalLevel::L1L2 => self.l1_l2,
            SpinalLevel::L2L3 => self.l2_l3,
            SpinalLevel::L3L4 => self.l3_l4,
            SpinalLevel::L4L5 => self.l4_l5,
            SpinalLevel::L5S1 => self.l5_s1,
        }
    }

    pub fn set_level(&mut self, level: SpinalLevel, value: bool) {
        let slot = match level {
            SpinalLevel::L1L2 => &mut self.l1_l2,
            SpinalLevel::L2L3 => &mut self.l2_l3,
            SpinalLevel::L3L4 => &mut self.l3_l4,
            SpinalLevel::L4L5 => &mut self.l4_l5,
            SpinalLevel::L5S1 => &mut self.l5_s1,
        };
        *slot = value;
    }

    /// Levels currently marked positive, in anatomical order.
    pub fn positive_levels(&self) -> Vec<SpinalLevel> {
        SpinalLevel::ALL
            .into_iter()
            .filter(|l| self.level(*l))
            .collect()
    }

    /// Values in `CLASSIFICATION_KEYS` order.
    pub fn values(&self) -> [bool; 6] {
        [
            self.l1_l2,
            self.l2_l3,
            self.l3_l4,
            self.l4_l5,
            self.l5_s1,
            self.need_check,
        ]
    }
}

/// Chat role understood by the model boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat-completion backend abstraction (allows mocking).
pub trait ChatClient {
    /// Send the conversation and return the raw assistant text.
    fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
    ) -> Result<String, TransportError>;

    fn is_model_available(&self, model: &str) -> Result<bool, TransportError>;
}
