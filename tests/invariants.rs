use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use swarm_prompts::{
    CanonicalIndex, ColumnCodec, ContributionField, ContributionSelector, ContributorId,
    FlatRecord, PipelineError, Record, RewardOrder, RewardScorer, RewardValue, ScoringRequest,
    SelectionMethod, Stage, normalize_batch, union_keys,
};

/// Rewards completions by exact text and counts scorer calls.
struct TextScorer {
    rewards: HashMap<String, RewardValue>,
    calls: AtomicUsize,
}

impl TextScorer {
    fn new(pairs: &[(&str, RewardValue)]) -> Self {
        Self {
            rewards: pairs
                .iter()
                .map(|(text, reward)| (text.to_string(), *reward))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RewardScorer for TextScorer {
    fn score(
        &self,
        _stage: Stage,
        requests: &[ScoringRequest<'_>],
    ) -> Result<Vec<RewardValue>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(requests
            .iter()
            .map(|request| self.rewards.get(request.completion).copied().unwrap_or(0.0))
            .collect())
    }
}

fn answers_row(pairs: &[(&str, &str)]) -> (FlatRecord, Vec<String>) {
    let codec = ColumnCodec::default();
    let mut record = Record::new("What helps with stress?");
    for (id, text) in pairs {
        record.insert_contribution(ContributionField::Answers, *id, *text);
    }
    let row = codec.flatten_record(&record);
    let columns = row.column_names().cloned().collect();
    (row, columns)
}

fn selected(
    selector: &ContributionSelector,
    row: &FlatRecord,
    candidates: &[String],
    scorer: &TextScorer,
) -> Vec<String> {
    selector
        .select(row, ContributionField::Answers, candidates, Stage::Compare, scorer)
        .unwrap()
        .columns()
        .map(str::to_string)
        .collect()
}

#[test]
fn normalized_batch_shares_one_key_set_per_field() {
    let mut records = vec![
        Record::new("q1")
            .with_contribution(ContributionField::Answers, "x", "hi")
            .with_contribution(ContributionField::Opinions, "critic", "ok"),
        Record::new("q2").with_contribution(ContributionField::Answers, "y", "yo"),
        Record::new("q3"),
    ];
    let report = normalize_batch(
        &mut records,
        &ContributionField::ALL,
        "No answer received...",
    );

    let expected: BTreeSet<ContributorId> = ["x", "y"].into_iter().map(Into::into).collect();
    for record in records.iter().take(2) {
        let keys: BTreeSet<ContributorId> = record
            .contributions(ContributionField::Answers)
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, expected);
    }
    assert!(records[2].answers.is_none());
    assert!(records[1].opinions.is_none());
    assert_eq!(
        records[0].answers.as_ref().unwrap()[&ContributorId::from("y")],
        "No answer received..."
    );
    assert_eq!(records[1].answers.as_ref().unwrap()[&ContributorId::from("y")], "yo");
    assert_eq!(report.backfilled[&ContributionField::Answers], 2);
    assert_eq!(union_keys(&records, ContributionField::Answers), expected);
}

#[test]
fn codec_decodes_ids_containing_the_delimiter() {
    let codec = ColumnCodec::default();
    let ids = ["a", "peer_7", "QmNode_x_y", "__"];
    for id in ids {
        let contributor = ContributorId::from(id);
        let column = codec.encode(ContributionField::Opinions, &contributor);
        assert_eq!(
            codec.decode_column(&column),
            Some((ContributionField::Opinions, contributor.clone()))
        );
        assert_eq!(codec.decode_in(ContributionField::Answers, &column), None);
    }
    assert_eq!(codec.decode_column("question"), None);
    assert_eq!(codec.decode_column("agent_answers"), None);
}

#[test]
fn top_k_matches_reference_scenario() {
    let (row, columns) = answers_row(&[("a", "A"), ("b", "B"), ("c", "C")]);
    let scorer = TextScorer::new(&[("A", 0.5), ("B", 0.5), ("C", 0.9)]);
    let selector = ContributionSelector::new(2, SelectionMethod::TopK);

    let picked = selected(&selector, &row, &columns, &scorer);
    assert_eq!(picked, vec!["agent_answers_a", "agent_answers_c"]);

    let selection = selector
        .select(&row, ContributionField::Answers, &columns, Stage::Compare, &scorer)
        .unwrap();
    let index = CanonicalIndex::from_selection(&ColumnCodec::default(), &selection);
    assert_eq!(index.index_of("a"), Some(0));
    assert_eq!(index.index_of("c"), Some(1));
    assert_eq!(index.index_of("b"), None);
}

#[test]
fn selection_ignores_candidate_order() {
    let pairs: Vec<(String, String)> = (0..12)
        .map(|n| (format!("peer_{n}"), format!("text {}", n % 4)))
        .collect();
    let borrowed: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(id, text)| (id.as_str(), text.as_str()))
        .collect();
    let (row, mut columns) = answers_row(&borrowed);
    let scorer = TextScorer::new(&[("text 0", 1.0), ("text 1", 1.0), ("text 2", 0.25)]);
    let selector = ContributionSelector::new(5, SelectionMethod::TopK);

    let baseline = selected(&selector, &row, &columns, &scorer);
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..8 {
        columns.shuffle(&mut rng);
        assert_eq!(selected(&selector, &row, &columns, &scorer), baseline);
    }
}

#[test]
fn seeded_random_sampling_ignores_candidate_order() {
    let (row, mut columns) = answers_row(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
    let scorer = TextScorer::new(&[]);
    let selector = ContributionSelector::new(2, SelectionMethod::UniformRandom).with_seed(11);

    let baseline = selected(&selector, &row, &columns, &scorer);
    assert_eq!(baseline.len(), 2);
    columns.reverse();
    assert_eq!(selected(&selector, &row, &columns, &scorer), baseline);
    assert_eq!(scorer.calls(), 0);
}

#[test]
fn boundary_k_values() {
    let (row, columns) = answers_row(&[("a", "A"), ("b", "B")]);
    let scorer = TextScorer::new(&[("A", 1.0), ("B", 2.0)]);

    let none = ContributionSelector::new(0, SelectionMethod::TopK);
    assert!(selected(&none, &row, &columns, &scorer).is_empty());
    assert_eq!(scorer.calls(), 0);

    let all = ContributionSelector::new(10, SelectionMethod::TopK);
    assert_eq!(
        selected(&all, &row, &columns, &scorer),
        vec!["agent_answers_a", "agent_answers_b"]
    );

    let empty: Vec<String> = Vec::new();
    assert!(selected(&all, &row, &empty, &scorer).is_empty());
    assert_eq!(scorer.calls(), 1);
}

#[test]
fn signed_zero_ties_and_infinities_are_ordered() {
    let (row, columns) = answers_row(&[("a", "neg"), ("b", "pos"), ("c", "inf")]);
    let scorer = TextScorer::new(&[("neg", -0.0), ("pos", 0.0), ("inf", f64::INFINITY)]);
    let selector = ContributionSelector::new(2, SelectionMethod::TopK);
    // -0.0 ties with 0.0, so the md5 tiebreak prefers a over b.
    assert_eq!(
        selected(&selector, &row, &columns, &scorer),
        vec!["agent_answers_a", "agent_answers_c"]
    );
}

#[test]
fn lower_is_better_inverts_ranking() {
    let (row, columns) = answers_row(&[("a", "A"), ("b", "B"), ("c", "C")]);
    let scorer = TextScorer::new(&[("A", 3.0), ("B", 1.0), ("C", 2.0)]);
    let selector = ContributionSelector::new(2, SelectionMethod::TopK)
        .with_reward_order(RewardOrder::LowerIsBetter);
    assert_eq!(
        selected(&selector, &row, &columns, &scorer),
        vec!["agent_answers_c", "agent_answers_b"]
    );
}

#[test]
fn nan_reward_is_rejected() {
    let (row, columns) = answers_row(&[("a", "A"), ("b", "B")]);
    let scorer = TextScorer::new(&[("A", f64::NAN), ("B", 1.0)]);
    let selector = ContributionSelector::new(1, SelectionMethod::TopK);
    let err = selector
        .select(&row, ContributionField::Answers, &columns, Stage::Compare, &scorer)
        .unwrap_err();
    assert!(matches!(err, PipelineError::NonNumericReward { ref column } if column == "agent_answers_a"));
    assert!(err.is_scorer_failure());
}

#[test]
fn canonical_index_is_order_independent() {
    let forward = CanonicalIndex::from_ids(["b", "a", "c"].into_iter().map(ContributorId::from));
    let backward = CanonicalIndex::from_ids(["c", "b", "a"].into_iter().map(ContributorId::from));
    assert_eq!(forward, backward);
    let order: Vec<&str> = forward
        .iter()
        .map(|(_, contributor)| contributor.as_str())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}
