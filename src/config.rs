use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::constants::normalize::MISSING_CONTRIBUTION_SENTINEL;
use crate::constants::prompts::{PERSONA_ENV_VAR, PERSONA_RANDOM};
use crate::constants::selection::DEFAULT_K;
use crate::errors::PipelineError;

/// How a bounded sample of contributions is picked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Keep the `k` best-rewarded columns, ties broken by column-name hash.
    #[default]
    TopK,
    /// Sample `k` columns without replacement.
    UniformRandom,
}

/// Direction in which the external scorer ranks contributions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardOrder {
    /// Larger rewards rank first.
    #[default]
    HigherIsBetter,
    /// Smaller rewards rank first, e.g. for loss-like scorers.
    LowerIsBetter,
}

/// Voice prepended to every system instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonaRole {
    /// 17th century pirate.
    Pirate,
    /// Medieval knight.
    Knight,
    /// Prohibition-era mob boss.
    Mobster,
    /// Sports announcer.
    Announcer,
    /// Crypto start-up founder pitching investors.
    Founder,
}

impl PersonaRole {
    /// Every persona, in declaration order.
    pub const ALL: [PersonaRole; 5] = [
        PersonaRole::Pirate,
        PersonaRole::Knight,
        PersonaRole::Mobster,
        PersonaRole::Announcer,
        PersonaRole::Founder,
    ];

    /// Parse a persona name (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PIRATE" => Some(PersonaRole::Pirate),
            "KNIGHT" => Some(PersonaRole::Knight),
            "MOBSTER" => Some(PersonaRole::Mobster),
            "ANNOUNCER" => Some(PersonaRole::Announcer),
            "FOUNDER" => Some(PersonaRole::Founder),
            _ => None,
        }
    }

    /// Sentence prepended to the system instruction.
    pub const fn preamble(self) -> &'static str {
        match self {
            PersonaRole::Pirate => {
                "You are a 17th century pirate, speak in time-period-accurate vernacular."
            }
            PersonaRole::Knight => {
                "You are a medieval knight, speak in time-period-accurate vernacular."
            }
            PersonaRole::Mobster => {
                "You are a mob boss from the prohibition era of the United States, speak in time-period-accurate vernacular."
            }
            PersonaRole::Announcer => {
                "You are an enthusiastic sports announcer and, when responding, speak as you would while announcing a sports event."
            }
            PersonaRole::Founder => {
                "Your name is Bearry and you are from the UK and you are the founder of a crypto start-up. Speak as you would during an investor meeting."
            }
        }
    }
}

/// Persona policy for system instructions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonaSetting {
    /// Use the stage instruction unchanged.
    #[default]
    Off,
    /// Always prepend this persona.
    Fixed(PersonaRole),
    /// Prepend one persona chosen per batch.
    Random,
}

impl PersonaSetting {
    /// Read the persona from `PROMPT_GENERATOR_ROLE`; unset or unknown values disable it.
    pub fn from_env() -> Self {
        std::env::var(PERSONA_ENV_VAR)
            .map(|raw| Self::parse(&raw))
            .unwrap_or_default()
    }

    /// Parse `RANDOM` or a persona name; anything else disables the persona.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case(PERSONA_RANDOM) {
            return PersonaSetting::Random;
        }
        PersonaRole::parse(raw)
            .map(PersonaSetting::Fixed)
            .unwrap_or_default()
    }

    /// Resolve the persona for one batch of prompts.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<PersonaRole> {
        match self {
            PersonaSetting::Off => None,
            PersonaSetting::Fixed(role) => Some(*role),
            PersonaSetting::Random => PersonaRole::ALL.choose(rng).copied(),
        }
    }
}

/// Wording used when rendering sampled contributions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptStyle {
    /// Display name of an answering agent (e.g. `Therapist #0`).
    pub answer_role: Cow<'static, str>,
    /// Tag wrapping the answer label.
    pub answer_tag: Cow<'static, str>,
    /// Display name of a critic (e.g. `Supervisor #0`).
    pub critic_role: Cow<'static, str>,
    /// Tag wrapping the critic label.
    pub critic_tag: Cow<'static, str>,
    /// Lead-in placed before the question.
    pub question_lead: Cow<'static, str>,
    /// Heading placed before the sampled answers.
    pub answers_heading: Cow<'static, str>,
    /// Heading placed before the sampled critiques.
    pub critiques_heading: Cow<'static, str>,
    /// Append `<content>` highlights extracted from critiques.
    pub append_highlights: bool,
}

impl Default for PromptStyle {
    fn default() -> Self {
        Self {
            answer_role: Cow::Borrowed("Therapist"),
            answer_tag: Cow::Borrowed("therapist"),
            critic_role: Cow::Borrowed("Supervisor"),
            critic_tag: Cow::Borrowed("supervisor"),
            question_lead: Cow::Borrowed("The client concern we received is: "),
            answers_heading: Cow::Borrowed("The following therapeutic responses were provided:"),
            critiques_heading: Cow::Borrowed(
                "After comparing these therapeutic responses, the following supervision feedback was provided:",
            ),
            append_highlights: true,
        }
    }
}

/// Top-level prompt pipeline configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of contributions rendered per record.
    pub k: usize,
    /// Sampling method for contributions.
    pub method: SelectionMethod,
    /// Seed for uniform random sampling; `None` draws from the OS-seeded thread RNG.
    pub seed: Option<u64>,
    /// Ranking direction of the reward scorer.
    pub reward_order: RewardOrder,
    /// Text stored for contributors missing from a record.
    pub sentinel: Cow<'static, str>,
    /// Abort the batch on the first failed record instead of skipping it.
    pub fail_fast: bool,
    /// Persona policy for system instructions.
    pub persona: PersonaSetting,
    /// Rendering wording.
    pub style: PromptStyle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            method: SelectionMethod::TopK,
            seed: None,
            reward_order: RewardOrder::HigherIsBetter,
            sentinel: Cow::Borrowed(MISSING_CONTRIBUTION_SENTINEL),
            fail_fast: false,
            persona: PersonaSetting::Off,
            style: PromptStyle::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would render unreadable prompts.
    pub fn validated(self) -> Result<Self, PipelineError> {
        if self.sentinel.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "missing-contribution sentinel must not be empty".to_string(),
            ));
        }
        let labels = [
            ("answer_role", &self.style.answer_role),
            ("answer_tag", &self.style.answer_tag),
            ("critic_role", &self.style.critic_role),
            ("critic_tag", &self.style.critic_tag),
        ];
        for (name, value) in labels {
            if value.trim().is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "prompt style '{name}' must not be empty"
                )));
            }
        }
        Ok(self)
    }
}
