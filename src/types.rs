use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Flattened column name (`<field>_<contributor>`).
/// Examples: `agent_answers_QmPeer7`, `agent_opinion_node_3`
pub type ColumnName = String;
/// Client question text carried by every record.
/// Example: `I'm having trouble sleeping at night. What techniques might help?`
pub type QuestionText = String;
/// Text submitted by one contributor (an answer or a critique).
/// Example: `<think>...</think><answer>Try a worry journal...</answer>`
pub type ContributionText = String;
/// Scalar reward produced by the external scorer.
/// Examples: `0.5`, `2.25`
pub type RewardValue = f64;
/// 128-bit tie-break key derived from a column name.
/// Example: `0x72952ed838ceaf53d04cd4e8fbf58fc5`
pub type TieBreaker = u128;
/// Rendered prompt text handed to the model-call layer.
/// Example: `The client concern we received is: ...`
pub type PromptText = String;
/// Human-readable reason attached to a skipped record.
/// Example: `reward scorer failed for stage compare: timeout`
pub type SkipReason = String;

/// Identity of one submission for one question in one stage.
///
/// The value carries no meaning outside the (question, stage) pair it was
/// observed in; two equal ids in different stages may be different peers.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributorId(String);

impl ContributorId {
    /// Wrap a raw contributor token.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id and return the raw token.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContributorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContributorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ContributorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ContributorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
