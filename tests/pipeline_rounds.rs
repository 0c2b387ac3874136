use std::sync::Arc;

use swarm_prompts::{
    FileTranscript, PipelineConfig, PipelineError, PromptPipeline, RewardScorer, RewardValue,
    ScoringRequest, Stage, TranscriptSink, records_from_json, start_session,
};

/// Scores a completion by the number embedded after `score=`.
struct EmbeddedScorer;

impl RewardScorer for EmbeddedScorer {
    fn score(
        &self,
        _stage: Stage,
        requests: &[ScoringRequest<'_>],
    ) -> Result<Vec<RewardValue>, PipelineError> {
        Ok(requests
            .iter()
            .map(|request| {
                request
                    .completion
                    .split("score=")
                    .nth(1)
                    .and_then(|tail| tail.split_whitespace().next())
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(0.0)
            })
            .collect())
    }
}

const SNAPSHOT: &str = r#"[
  {
    "question": "I feel anxious before meetings.",
    "answer": "breathing",
    "agent_answers": {
      "peer_a": "Try box breathing. score=0.5",
      "peer_b": "Prepare notes ahead. score=0.5",
      "peer_c": "Name the worry out loud. score=0.9"
    },
    "agent_opinion": {
      "critic_1": "**Strongest**\nTherapist #1 gave a concrete step.\n\nOthers were vague. score=0.7"
    }
  },
  {
    "question": "I can't focus at work.",
    "answer": "breaks",
    "agent_answers": {
      "peer_a": "Use short timed breaks. score=0.4"
    },
    "agent_opinion": {
      "critic_2": "Reasonable. score=0.2"
    }
  }
]"#;

fn pipeline(k: usize) -> PromptPipeline<EmbeddedScorer> {
    let config = PipelineConfig {
        k,
        ..PipelineConfig::default()
    };
    PromptPipeline::new(config, EmbeddedScorer).unwrap()
}

#[test]
fn snapshot_round_builds_stage2_prompts() {
    let records = records_from_json(SNAPSHOT).unwrap();
    let outcome = pipeline(2).stage2_prompts(records).unwrap();
    assert_eq!(outcome.stage, Stage::Compare);
    assert_eq!(outcome.prompts.len(), 2);
    assert!(outcome.skipped.is_empty());

    let first = &outcome.prompts[0];
    let picked: Vec<&str> = first.selected.iter().map(|id| id.as_str()).collect();
    // peer_a and peer_b tie; the larger md5 of agent_answers_peer_b wins.
    assert_eq!(picked, vec!["peer_b", "peer_c"]);
    assert_eq!(first.answer.as_deref(), Some("breathing"));
    assert_eq!(
        first.user_content(),
        "The client concern we received is: I feel anxious before meetings.  \n\n\
         The following therapeutic responses were provided: \n\
         <therapist>Therapist #0</therapist> said \nPrepare notes ahead. score=0.5\n\n\n\
         <therapist>Therapist #1</therapist> said \nName the worry out loud. score=0.9\n\n\n"
    );

    // peer_b and peer_c are backfilled into the second record with a zero reward.
    let second: Vec<&str> = outcome.prompts[1]
        .selected
        .iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(second, vec!["peer_a", "peer_c"]);
    assert!(outcome.prompts[1].user_content().contains("No answer received..."));

    // Both cutoffs fall inside a reward tie.
    assert_eq!(outcome.stats.tiebreak_rows, 2);
    assert_eq!(outcome.stats.truncated_rows, 2);
    assert_eq!(outcome.stats.sentinel_selected, 1);
}

#[test]
fn snapshot_round_builds_stage3_prompts_with_highlights() {
    let records = records_from_json(SNAPSHOT).unwrap();
    let outcome = pipeline(15).stage3_prompts(records).unwrap();
    assert_eq!(outcome.prompts.len(), 2);

    let text = outcome.prompts[0].user_content();
    assert!(text.contains("After comparing these therapeutic responses"));
    assert!(text.contains("<supervisor>Supervisor #0</supervisor> provided \n**Strongest**"));
    assert!(text.contains("<supervisor>Supervisor #1</supervisor> provided \nNo answer received..."));
    assert!(text.ends_with("<content>Therapist #1 gave a concrete step.</content>\n"));
    assert!(outcome.prompts[0].system_content().contains("<majority>"));

    // Each record keeps its own critique plus the other critic's sentinel.
    let stats = &outcome.stats;
    assert_eq!(stats.selected, 4);
    assert_eq!(stats.sentinel_selected, 2);
    assert!((stats.sentinel_share() - 0.5).abs() < 1e-9);
    assert_eq!(stats.truncated_rows, 0);
    assert_eq!(stats.per_contributor.len(), 2);
}

#[test]
fn malformed_snapshot_is_reported() {
    let err = records_from_json("{\"question\": 3}").unwrap_err();
    assert!(matches!(err, PipelineError::Snapshot { .. }));
}

#[test]
fn file_transcript_records_rendered_answers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round.txt");
    let sink = Arc::new(FileTranscript::open(&path).unwrap());
    start_session(sink.as_ref()).unwrap();

    let shared: Arc<dyn TranscriptSink> = sink.clone();
    let outcome = pipeline(2)
        .with_transcript(shared)
        .stage2_prompts(records_from_json(SNAPSHOT).unwrap())
        .unwrap();
    assert_eq!(outcome.prompts.len(), 2);

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("# New Session "));
    assert!(written.contains("<therapist_answer id=\"0\" entry=\"1\">\nPrepare notes ahead. score=0.5\n"));
    assert!(written.contains("<therapist_answer id=\"1\" entry=\"2\">\nName the worry out loud. score=0.9\n"));
    assert_eq!(written.matches("<therapist_answer").count(), 4);
}

#[test]
fn empty_sentinel_is_rejected() {
    let config = PipelineConfig {
        sentinel: "  ".into(),
        ..PipelineConfig::default()
    };
    let err = PromptPipeline::new(config, EmbeddedScorer).err().unwrap();
    assert!(matches!(err, PipelineError::Configuration(_)));
}
