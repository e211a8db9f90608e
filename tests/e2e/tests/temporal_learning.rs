//! Temporal learning journeys
//!
//! Activation streams flowing into pair statistics, and the learned
//! correlations feeding association edges that drive prefetching.

use engram_core::{
    AssociationKind, MemoryTier, PatternId, TemporalConfig, TemporalLearner, Timestamp,
};
use engram_e2e_tests::fixtures::{StorageHarness, pattern};

fn ts(micros: i64) -> Timestamp {
    Timestamp::from_micros(micros)
}

#[test]
fn regular_sequence_learns_perfect_correlation() {
    let mut learner = TemporalLearner::default();
    let (a, b) = (PatternId::generate(), PatternId::generate());

    // A then B, 1000 µs apart, five times over well-separated repetitions
    for i in 0..5 {
        let base = i * 30_000_000;
        learner.record_activation(a, ts(base));
        learner.record_activation(b, ts(base + 1000));
    }

    let stats = learner.temporal_stats(a, b).expect("enough observations");
    assert_eq!(stats.occurrence_count, 5);
    assert!((stats.mean_delay_micros - 1000).abs() <= 1);
    assert_eq!(stats.stddev_delay_micros, 0);
    assert_eq!(stats.correlation, 1.0);

    // Default threshold is 0.5
    assert!(learner.is_temporally_correlated(a, b));
    assert!(!learner.is_temporally_correlated(b, a));
}

#[test]
fn irregular_sequence_scores_lower() {
    let mut learner = TemporalLearner::default();
    let (a, b) = (PatternId::generate(), PatternId::generate());
    let (c, d) = (PatternId::generate(), PatternId::generate());

    for i in 0..5 {
        let base = i * 30_000_000;
        // Steady pair
        learner.record_activation(a, ts(base));
        learner.record_activation(b, ts(base + 2000));
        // Erratic pair: delay swings between 1 ms and 9 ms
        learner.record_activation(c, ts(base + 10_000_000));
        let jitter = if i % 2 == 0 { 1_000 } else { 9_000 };
        learner.record_activation(d, ts(base + 10_000_000 + jitter));
    }

    let steady = learner.temporal_correlation(a, b);
    let erratic = learner.temporal_correlation(c, d);
    assert_eq!(steady, 1.0);
    assert!(erratic < steady);
    assert!(erratic > 0.0);
}

#[test]
fn custom_config_changes_thresholds() {
    let config = TemporalConfig {
        min_occurrences: 5,
        min_correlation: 0.9,
        ..TemporalConfig::default()
    };
    let mut learner = TemporalLearner::new(config).unwrap();
    let (a, b) = (PatternId::generate(), PatternId::generate());

    for i in 0..4 {
        let base = i * 30_000_000;
        learner.record_activation(a, ts(base));
        learner.record_activation(b, ts(base + 1000));
    }
    // Four observations, threshold is five
    assert!(learner.temporal_stats(a, b).is_none());

    learner.record_activation(a, ts(5 * 30_000_000));
    learner.record_activation(b, ts(5 * 30_000_000 + 1000));
    assert_eq!(learner.temporal_stats(a, b).unwrap().occurrence_count, 5);
}

#[test]
fn successors_feed_association_edges_and_prefetch() {
    let harness = StorageHarness::new();
    let anchor = pattern(vec![1.0, 0.0, 0.0]);
    let follower = pattern(vec![0.0, 1.0, 0.0]);
    let straggler = pattern(vec![0.0, 0.0, 1.0]);

    for node in [&anchor, &follower, &straggler] {
        harness.storage.store_pattern(node, MemoryTier::Cold);
    }

    // Learn that the follower reliably comes after the anchor, while the
    // straggler's timing wanders
    let mut learner = TemporalLearner::default();
    for i in 0..6 {
        let base = i * 30_000_000;
        learner.record_activation(anchor.id(), ts(base));
        learner.record_activation(follower.id(), ts(base + 1500));
        learner.record_activation(straggler.id(), ts(base + 4000 + i * 1200));
    }

    // Turn learned correlations into temporal association edges
    for (successor, correlation) in learner.successors(anchor.id(), 0.0) {
        harness.matrix.add_or_reinforce(
            anchor.id(),
            successor,
            AssociationKind::Temporal,
            correlation,
        );
    }
    assert!(harness.matrix.get(anchor.id(), follower.id()).is_some());

    // The strongest successor is prefetched alongside the anchor read
    harness.storage.get_pattern(anchor.id()).unwrap();
    assert!(harness.storage.cache_stats().prefetch_patterns_loaded >= 1);

    // The follower is now served from cache
    let misses_before = harness.storage.cache_stats().misses;
    harness.storage.get_pattern(follower.id()).unwrap();
    assert_eq!(harness.storage.cache_stats().misses, misses_before);
}

#[test]
fn pruning_window_keeps_learned_statistics() {
    let mut learner = TemporalLearner::default();
    let (a, b) = (PatternId::generate(), PatternId::generate());

    for i in 0..4 {
        let base = i * 30_000_000;
        learner.record_activation(a, ts(base));
        learner.record_activation(b, ts(base + 500));
    }
    assert!(learner.activation_count() > 0);

    learner.prune_old_activations(ts(i64::MAX));
    assert_eq!(learner.activation_count(), 0);

    // Statistics are monotone: pruning the window rolls nothing back
    let stats = learner.temporal_stats(a, b).unwrap();
    assert_eq!(stats.occurrence_count, 4);
    assert!((stats.mean_delay_micros - 500).abs() <= 1);
}
