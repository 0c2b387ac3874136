use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::codec::{FIELD_ANSWERS, FIELD_OPINIONS};
use crate::errors::PipelineError;

pub use crate::types::{
    ColumnName, ContributionText, ContributorId, PromptText, QuestionText, SkipReason,
};

/// Per-record mapping from contributor to submitted text.
pub type ContributionMap = BTreeMap<ContributorId, ContributionText>;

/// Phase of the debate/supervision protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: independent agents answer the question.
    Answer,
    /// Stage 2: critics compare a sample of the answers.
    Compare,
    /// Stage 3: a synthesis merges the sampled critiques.
    Synthesis,
}

impl Stage {
    /// Protocol stage number (1-based).
    pub const fn number(self) -> u8 {
        match self {
            Stage::Answer => 1,
            Stage::Compare => 2,
            Stage::Synthesis => 3,
        }
    }

    /// Contribution field whose entries are sampled when building this stage's prompt.
    pub const fn candidate_field(self) -> Option<ContributionField> {
        match self {
            Stage::Answer => None,
            Stage::Compare => Some(ContributionField::Answers),
            Stage::Synthesis => Some(ContributionField::Opinions),
        }
    }

    /// Contribution fields that must be normalized before this stage's prompts are built.
    pub fn normalized_fields(self) -> &'static [ContributionField] {
        match self {
            Stage::Answer => &[],
            Stage::Compare => &[ContributionField::Answers],
            Stage::Synthesis => &ContributionField::ALL,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Answer => "answer",
            Stage::Compare => "compare",
            Stage::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

/// Contribution-map field of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContributionField {
    /// Stage-1 answers, keyed by answering agent.
    #[serde(rename = "agent_answers")]
    Answers,
    /// Stage-2 critiques, keyed by critic.
    #[serde(rename = "agent_opinion")]
    Opinions,
}

impl ContributionField {
    /// Every known field, in column order.
    pub const ALL: [ContributionField; 2] = [ContributionField::Answers, ContributionField::Opinions];

    /// Field name used as the column prefix.
    pub const fn name(self) -> &'static str {
        match self {
            ContributionField::Answers => FIELD_ANSWERS,
            ContributionField::Opinions => FIELD_OPINIONS,
        }
    }
}

impl fmt::Display for ContributionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One training question and the contributions gathered for it so far.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Question text shown to every stage.
    pub question: QuestionText,
    /// Ground-truth answer handed to the reward scorer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Stage-2 prompt rendered in the previous round, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage2_prompt: Option<PromptText>,
    /// Stage-1 answers.
    #[serde(default, rename = "agent_answers", skip_serializing_if = "Option::is_none")]
    pub answers: Option<ContributionMap>,
    /// Stage-2 critiques.
    #[serde(default, rename = "agent_opinion", skip_serializing_if = "Option::is_none")]
    pub opinions: Option<ContributionMap>,
}

impl Record {
    /// Create a record with only the question populated.
    pub fn new(question: impl Into<QuestionText>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    /// Attach a ground-truth answer.
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    /// Attach a previously rendered stage-2 prompt.
    pub fn with_stage2_prompt(mut self, prompt: impl Into<PromptText>) -> Self {
        self.stage2_prompt = Some(prompt.into());
        self
    }

    /// Builder form of [`Record::insert_contribution`].
    pub fn with_contribution(
        mut self,
        field: ContributionField,
        contributor: impl Into<ContributorId>,
        text: impl Into<ContributionText>,
    ) -> Self {
        self.insert_contribution(field, contributor, text);
        self
    }

    /// Record one submission, creating the field when it is absent.
    ///
    /// Returns the previous text when the contributor had already submitted.
    pub fn insert_contribution(
        &mut self,
        field: ContributionField,
        contributor: impl Into<ContributorId>,
        text: impl Into<ContributionText>,
    ) -> Option<ContributionText> {
        self.slot_mut(field)
            .get_or_insert_with(ContributionMap::new)
            .insert(contributor.into(), text.into())
    }

    /// Contribution map for `field`, if the field is present.
    pub fn contributions(&self, field: ContributionField) -> Option<&ContributionMap> {
        match field {
            ContributionField::Answers => self.answers.as_ref(),
            ContributionField::Opinions => self.opinions.as_ref(),
        }
    }

    /// Mutable contribution map for `field`, if the field is present.
    pub fn contributions_mut(&mut self, field: ContributionField) -> Option<&mut ContributionMap> {
        self.slot_mut(field).as_mut()
    }

    fn slot_mut(&mut self, field: ContributionField) -> &mut Option<ContributionMap> {
        match field {
            ContributionField::Answers => &mut self.answers,
            ContributionField::Opinions => &mut self.opinions,
        }
    }
}

/// Parse a round-cache snapshot (a JSON array of records).
pub fn records_from_json(raw: &str) -> Result<Vec<Record>, PipelineError> {
    serde_json::from_str(raw).map_err(|err| PipelineError::Snapshot {
        details: err.to_string(),
    })
}

/// One exploded contribution: `<field>_<contributor>` → text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatColumn {
    /// `<field>_<contributor>` column name.
    pub name: ColumnName,
    /// Contribution text, or the sentinel after backfill.
    pub value: ContributionText,
}

/// A record with its contribution maps exploded into scalar columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    /// Question text of the source record.
    pub question: QuestionText,
    /// Ground-truth answer, carried through unchanged.
    pub answer: Option<String>,
    /// Cached stage-2 prompt, if the record had one.
    pub stage2_prompt: Option<PromptText>,
    /// Contribution columns, answers first, each field in id order.
    pub columns: IndexMap<ColumnName, ContributionText>,
}

impl FlatRecord {
    /// Text stored under `column`.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    /// Column names in flatten order.
    pub fn column_names(&self) -> impl Iterator<Item = &ColumnName> {
        self.columns.keys()
    }
}

/// Flattened batch plus the union of its column names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatBatch {
    pub(crate) columns: Vec<ColumnName>,
    pub(crate) rows: Vec<FlatRecord>,
}

impl FlatBatch {
    /// Sorted union of the contribution column names across all rows.
    pub fn columns(&self) -> &[ColumnName] {
        &self.columns
    }

    /// Flattened rows, in input order.
    pub fn rows(&self) -> &[FlatRecord] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Speaker of a chat turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Stage instruction.
    System,
    /// Rendered question and contributions.
    User,
}

/// Single chat turn handed to the model-call layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker of the turn.
    pub role: ChatRole,
    /// Turn text.
    pub content: String,
}

impl ChatMessage {
    /// System turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// User turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Finished prompt for one record and one stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StagePrompt {
    /// Stage this prompt feeds.
    pub stage: Stage,
    /// Question the prompt was built from.
    pub question: QuestionText,
    /// Ground truth forwarded to the next stage's reward scorer.
    pub answer: Option<String>,
    /// System turn followed by the user turn.
    pub messages: Vec<ChatMessage>,
    /// Sampled contributors, in canonical index order.
    pub selected: Vec<ContributorId>,
}

impl StagePrompt {
    /// Content of the system turn.
    pub fn system_content(&self) -> &str {
        self.content_for(ChatRole::System)
    }

    /// Content of the user turn.
    pub fn user_content(&self) -> &str {
        self.content_for(ChatRole::User)
    }

    fn content_for(&self, role: ChatRole) -> &str {
        self.messages
            .iter()
            .find(|message| message.role == role)
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }
}
