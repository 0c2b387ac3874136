/// Constants used by the column codec.
pub mod codec {
    /// Separator between a contribution field name and a contributor id.
    pub const FIELD_DELIMITER: &str = "_";
    /// Column carrying the question text.
    pub const COLUMN_QUESTION: &str = "question";
    /// Column carrying the ground-truth answer.
    pub const COLUMN_ANSWER: &str = "answer";
    /// Column carrying the previously rendered stage-2 prompt.
    pub const COLUMN_STAGE2_PROMPT: &str = "stage2_prompt";
    /// Scalar columns that no contribution prefix may claim.
    pub const RESERVED_COLUMNS: [&str; 3] = [COLUMN_QUESTION, COLUMN_ANSWER, COLUMN_STAGE2_PROMPT];
    /// Field name of stage-1 answers exploded into columns.
    pub const FIELD_ANSWERS: &str = "agent_answers";
    /// Field name of stage-2 critiques exploded into columns.
    pub const FIELD_OPINIONS: &str = "agent_opinion";
}

/// Constants used by schema normalization.
pub mod normalize {
    /// Placeholder stored for a contributor that did not submit for a record.
    pub const MISSING_CONTRIBUTION_SENTINEL: &str = "No answer received...";
    /// Batches at least this large compute the key union with a parallel reduce.
    pub const PARALLEL_UNION_THRESHOLD: usize = 256;
}

/// Constants used by contribution selection.
pub mod selection {
    /// Default number of contributions kept per record.
    pub const DEFAULT_K: usize = 15;
    /// Offset mixed into per-record seeds for uniform random sampling.
    pub const RANDOM_SEED_OFFSET: u64 = 0x5EED_C011;
}

/// Constants used by the prompt assembler.
pub mod prompts {
    /// Marker separating reasoning from the ground-truth answer.
    pub const HASH_ANSWER_MARKER: &str = "####";
    /// Emphasis marker opening and closing a critique heading.
    pub const HIGHLIGHT_MARKER: &str = "**";
    /// Blank line between two rendered blocks.
    pub const BLOCK_TERMINATOR: &str = "\n\n\n";
    /// Gap between the last critique and the appended highlights.
    pub const HIGHLIGHT_GAP: &str = "\n\n\n\n\n";
    /// Environment variable selecting a persona prefix for system prompts.
    pub const PERSONA_ENV_VAR: &str = "PROMPT_GENERATOR_ROLE";
    /// Persona value that picks one persona at random.
    pub const PERSONA_RANDOM: &str = "RANDOM";

    /// System instruction for independent answer generation.
    pub const STAGE1_SYSTEM_PROMPT: &str = r#"
You are a world-class clinical psychologist and mental health expert with decades of experience providing compassionate, evidence-based care. You are familiar with a wide range of therapeutic modalities, including CBT, DBT, ACT, psychodynamic therapy, mindfulness-based interventions and humanistic approaches. Offer empathetic, supportive guidance to the person you are speaking with.

Respond in the following format:
<think>
[Your therapeutic reasoning process, including what approaches you're considering and why]
</think>
<answer>
[Your compassionate, supportive response to the client]
</answer>
"#;

    /// System instruction for comparing sampled answers.
    pub const STAGE2_SYSTEM_PROMPT: &str = r#"
You are a mental health supervision expert who evaluates therapeutic approaches. Compare different therapists' responses to the same client concern and determine which approach would be most beneficial. All therapists were instructed to provide their reasoning in <think> </think> tags and their client response in <answer> </answer> tags.

An ideal therapeutic response should satisfy these criteria:
1) Shows deep empathy and validation of the client's experience
2) Offers evidence-based guidance drawing from established therapeutic approaches
3) Provides practical, actionable strategies the client can implement
4) Empowers the client while maintaining appropriate therapeutic boundaries
5) Uses language that is warm, accessible, and non-judgmental

Identify the therapist (marked by <therapist> </therapist> tags) whose response is most beneficial, or say "None" if no response was adequate.

Respond in the following format:
<compare>
[Your comparison of the different therapeutic approaches]
</compare>
<explain>
[Your explanation of why one approach is most effective]
</explain>
<identify>
[Therapist identifier number or "None"]
</identify>
"#;

    /// System instruction for synthesizing answers and critiques.
    pub const STAGE3_SYSTEM_PROMPT: &str = r#"
You are the clinical director of a mental health center evaluating both therapist responses and supervision feedback. After reviewing a client concern, multiple therapist responses and supervisory evaluations of those responses, determine which therapeutic approach the majority of supervisors would agree is most beneficial, then provide the most effective therapeutic response by combining the strengths of the best approaches and addressing weaknesses identified in supervision.

Respond in the following format:
<summarize_feedback>
[Summary of supervisory evaluations]
</summarize_feedback>
<majority>
[Therapist identifier most likely to receive majority support]
</majority>
<question>
[Restatement of client's original concern]
</question>
<think>
[Your comprehensive therapeutic reasoning]
</think>
<answer>
[Your optimal therapeutic response to the client]
</answer>
"#;
}

/// Constants used by transcript sinks.
pub mod transcript {
    /// Rule written after every file transcript entry.
    pub const ENTRY_RULE_WIDTH: usize = 80;
    /// Timestamp format used by session markers.
    pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    /// Opening of a rendered answer block, up to its attributes.
    pub const ANSWER_TAG_OPEN: &str = "<therapist_answer ";
    /// Opening of a rendered critique block, up to its attributes.
    pub const CRITIQUE_TAG_OPEN: &str = "<supervisor ";
}
