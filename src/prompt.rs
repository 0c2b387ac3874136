use tracing::warn;

use crate::codec::ColumnCodec;
use crate::config::{PersonaRole, PromptStyle};
use crate::constants::prompts::{
    BLOCK_TERMINATOR, HIGHLIGHT_GAP, STAGE1_SYSTEM_PROMPT, STAGE2_SYSTEM_PROMPT,
    STAGE3_SYSTEM_PROMPT,
};
use crate::data::{ChatMessage, ContributionField, FlatRecord, Stage};
use crate::index::CanonicalIndex;
use crate::transcript::{TranscriptEntry, TranscriptSink};
use crate::types::{ContributorId, PromptText};
use crate::utils::extract_highlight;

/// Stage instruction, optionally voiced by a persona.
pub fn system_prompt(stage: Stage, persona: Option<PersonaRole>) -> String {
    let base = match stage {
        Stage::Answer => STAGE1_SYSTEM_PROMPT,
        Stage::Compare => STAGE2_SYSTEM_PROMPT,
        Stage::Synthesis => STAGE3_SYSTEM_PROMPT,
    };
    match persona {
        Some(role) => format!("{}{}", role.preamble(), base),
        None => base.to_string(),
    }
}

/// System turn followed by the user turn.
pub fn chat_messages(system: String, user: String) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Renders stage prompts from sampled contributions.
pub struct PromptAssembler<'a> {
    codec: &'a ColumnCodec,
    style: &'a PromptStyle,
    transcript: &'a dyn TranscriptSink,
}

impl<'a> PromptAssembler<'a> {
    /// Assembler rendering with `style` and reporting to `transcript`.
    pub fn new(
        codec: &'a ColumnCodec,
        style: &'a PromptStyle,
        transcript: &'a dyn TranscriptSink,
    ) -> Self {
        Self {
            codec,
            style,
            transcript,
        }
    }

    /// Question followed by each sampled answer in canonical index order.
    pub fn render_stage2(&self, row: &FlatRecord, index: &CanonicalIndex) -> PromptText {
        let mut out = String::new();
        out.push_str(&self.style.question_lead);
        out.push_str(&row.question);
        out.push_str("  \n\n");
        out.push_str(&self.style.answers_heading);
        out.push_str(" \n");
        for (position, contributor, text) in self.blocks(row, index, ContributionField::Answers) {
            out.push_str(&format!(
                "<{tag}>{role} #{position}</{tag}> said \n",
                tag = self.style.answer_tag,
                role = self.style.answer_role,
            ));
            out.push_str(text);
            out.push_str(BLOCK_TERMINATOR);
            self.record(TranscriptEntry::Answer {
                stage: Stage::Compare,
                index: position,
                contributor: contributor.clone(),
                text: text.to_string(),
            });
        }
        out
    }

    /// Stage-2 prompt followed by each sampled critique in canonical index order.
    pub fn render_stage3(
        &self,
        stage2_prompt: &str,
        row: &FlatRecord,
        index: &CanonicalIndex,
    ) -> PromptText {
        let mut out = String::new();
        out.push_str(stage2_prompt);
        out.push_str("  \n");
        out.push_str(&self.style.critiques_heading);
        out.push_str(" \n");
        let mut highlights = Vec::new();
        for (position, contributor, text) in self.blocks(row, index, ContributionField::Opinions) {
            out.push_str(&format!(
                "<{tag}>{role} #{position}</{tag}> provided \n",
                tag = self.style.critic_tag,
                role = self.style.critic_role,
            ));
            out.push_str(text);
            out.push_str(BLOCK_TERMINATOR);
            if self.style.append_highlights {
                highlights.extend(extract_highlight(text));
            }
            self.record(TranscriptEntry::Critique {
                stage: Stage::Synthesis,
                index: position,
                contributor: contributor.clone(),
                text: text.to_string(),
            });
        }
        if !highlights.is_empty() {
            out.push_str(HIGHLIGHT_GAP);
            for highlight in highlights {
                out.push_str(&format!("<content>{highlight}</content>\n"));
            }
        }
        out
    }

    fn blocks<'r>(
        &self,
        row: &'r FlatRecord,
        index: &'r CanonicalIndex,
        field: ContributionField,
    ) -> impl Iterator<Item = (usize, &'r ContributorId, &'r str)> + use<'r, 'a> {
        let codec = self.codec;
        index.iter().filter_map(move |(position, contributor)| {
            row.value(&codec.encode(field, contributor))
                .map(|text| (position, contributor, text))
        })
    }

    fn record(&self, entry: TranscriptEntry) {
        if let Err(err) = self.transcript.append(entry) {
            warn!(
                error = %err,
                "[swarm_prompts:prompt] transcript append failed; continuing"
            );
        }
    }
}
