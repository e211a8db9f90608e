//! Temporal correlation learning
//!
//! Streams of pattern activations are folded into per-pair delay
//! statistics using Welford's online algorithm, bounded by a sliding
//! tracking window. Correlation is derived on read:
//! `tau = 1 / (1 + sigma/mu)`, so a perfectly regular delay scores 1.0.
//!
//! Pair statistics are monotone cumulative: pruning old activations never
//! rolls them back.
//!
//! Not thread-safe; callers provide external synchronization.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};
use crate::pattern::{Duration, PatternId, PatternPair, Timestamp};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Temporal learner tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Maximum delay between two activations for the pair to be counted
    pub max_delay: Duration,
    /// Minimum observations before statistics are considered reliable
    pub min_occurrences: u32,
    /// Correlation threshold for `is_temporally_correlated`
    pub min_correlation: f32,
    /// Length of the sliding activation window
    pub tracking_window: Duration,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_secs(10),
            min_occurrences: 3,
            min_correlation: 0.5,
            tracking_window: Duration::from_mins(5),
        }
    }
}

impl TemporalConfig {
    /// Reject nonsensical settings
    pub fn validate(&self) -> Result<()> {
        if self.max_delay.as_micros() <= 0 {
            return Err(EngramError::InvalidConfig(
                "max_delay must be positive".into(),
            ));
        }
        if self.tracking_window.as_micros() <= 0 {
            return Err(EngramError::InvalidConfig(
                "tracking_window must be positive".into(),
            ));
        }
        if self.min_occurrences == 0 {
            return Err(EngramError::InvalidConfig(
                "min_occurrences must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_correlation) {
            return Err(EngramError::InvalidConfig(
                "min_correlation must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Delay statistics for an ordered pattern pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalStats {
    /// Observations of predecessor followed by successor
    pub occurrence_count: u32,
    /// Mean delay in microseconds
    pub mean_delay_micros: i64,
    /// Delay standard deviation in microseconds
    pub stddev_delay_micros: i64,
    /// Consistency measure in [0, 1]
    pub correlation: f32,
    /// Last time the pair was observed
    pub last_updated: Timestamp,
}

/// Welford accumulator for one ordered pair
#[derive(Debug, Clone, Copy)]
struct PairAccumulator {
    count: u32,
    mean: f64,
    m2: f64,
    last_updated: Timestamp,
}

impl PairAccumulator {
    fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            last_updated: Timestamp::EPOCH,
        }
    }

    fn observe(&mut self, delay_micros: i64, at: Timestamp) {
        let d = delay_micros as f64;
        self.count += 1;
        let delta = d - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (d - self.mean);
        self.last_updated = at;
    }

    fn stddev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }
}

fn correlation_of(mean: f64, stddev: f64) -> f32 {
    if mean <= 0.0 {
        return 0.0;
    }
    (1.0 / (1.0 + stddev / mean)) as f32
}

// ============================================================================
// TEMPORAL LEARNER
// ============================================================================

/// Online estimator of causal-timing statistics between patterns
pub struct TemporalLearner {
    config: TemporalConfig,
    /// Activation history, oldest first
    activations: VecDeque<(Timestamp, PatternId)>,
    /// (predecessor, successor) -> accumulated delay statistics
    stats: HashMap<PatternPair, PairAccumulator>,
}

impl Default for TemporalLearner {
    fn default() -> Self {
        Self::new(TemporalConfig::default()).expect("default config is valid")
    }
}

impl TemporalLearner {
    /// Create a learner with the given configuration
    pub fn new(config: TemporalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            activations: VecDeque::new(),
            stats: HashMap::new(),
        })
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    /// Record that `pattern` activated now
    pub fn record_activation_now(&mut self, pattern: PatternId) {
        self.record_activation(pattern, Timestamp::now());
    }

    /// Record that `pattern` activated at `at`
    ///
    /// Every earlier activation still inside the tracking window and within
    /// `max_delay` of `at` contributes one delay observation for the pair
    /// (earlier, pattern).
    pub fn record_activation(&mut self, pattern: PatternId, at: Timestamp) {
        let window_start = at - self.config.tracking_window;
        while let Some((front, _)) = self.activations.front() {
            if *front < window_start {
                self.activations.pop_front();
            } else {
                break;
            }
        }

        for (earlier, predecessor) in &self.activations {
            let delay = at - *earlier;
            if delay.is_negative() || delay > self.config.max_delay {
                continue;
            }
            self.stats
                .entry((*predecessor, pattern))
                .or_insert_with(PairAccumulator::new)
                .observe(delay.as_micros(), at);
        }

        self.activations.push_back((at, pattern));
    }

    /// Record a time-ordered sequence of activations
    pub fn record_sequence(&mut self, sequence: &[(Timestamp, PatternId)]) {
        for (at, pattern) in sequence {
            self.record_activation(*pattern, *at);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Statistics for the ordered pair, or `None` below `min_occurrences`
    pub fn temporal_stats(
        &self,
        predecessor: PatternId,
        successor: PatternId,
    ) -> Option<TemporalStats> {
        let acc = self.stats.get(&(predecessor, successor))?;
        if acc.count < self.config.min_occurrences {
            return None;
        }
        Some(self.snapshot(acc))
    }

    /// Correlation for the ordered pair, 0.0 below `min_occurrences`
    pub fn temporal_correlation(&self, predecessor: PatternId, successor: PatternId) -> f32 {
        self.temporal_stats(predecessor, successor)
            .map(|s| s.correlation)
            .unwrap_or(0.0)
    }

    /// Whether the pair's correlation reaches the configured threshold
    pub fn is_temporally_correlated(&self, predecessor: PatternId, successor: PatternId) -> bool {
        self.temporal_correlation(predecessor, successor) >= self.config.min_correlation
    }

    /// Mean delay in microseconds, 0 with no observations
    pub fn mean_delay(&self, predecessor: PatternId, successor: PatternId) -> i64 {
        self.stats
            .get(&(predecessor, successor))
            .filter(|acc| acc.count > 0)
            .map(|acc| acc.mean.round() as i64)
            .unwrap_or(0)
    }

    /// Patterns that follow `pattern`, with correlation at least
    /// `min_correlation`, strongest first
    pub fn successors(&self, pattern: PatternId, min_correlation: f32) -> Vec<(PatternId, f32)> {
        self.neighbors(min_correlation, |pair| {
            (pair.0 == pattern).then_some(pair.1)
        })
    }

    /// Patterns that precede `pattern`, with correlation at least
    /// `min_correlation`, strongest first
    pub fn predecessors(&self, pattern: PatternId, min_correlation: f32) -> Vec<(PatternId, f32)> {
        self.neighbors(min_correlation, |pair| {
            (pair.1 == pattern).then_some(pair.0)
        })
    }

    fn neighbors<F>(&self, min_correlation: f32, select: F) -> Vec<(PatternId, f32)>
    where
        F: Fn(&PatternPair) -> Option<PatternId>,
    {
        let mut out: Vec<(PatternId, f32, u32)> = self
            .stats
            .iter()
            .filter(|(_, acc)| acc.count >= self.config.min_occurrences)
            .filter_map(|(pair, acc)| {
                let other = select(pair)?;
                let tau = correlation_of(acc.mean, acc.stddev());
                (tau >= min_correlation).then_some((other, tau, acc.count))
            })
            .collect();

        // Descending correlation, then more observations, then smaller id
        out.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.2.cmp(&a.2))
                .then_with(|| a.0.cmp(&b.0))
        });
        out.into_iter().map(|(id, tau, _)| (id, tau)).collect()
    }

    // ------------------------------------------------------------------
    // Maintenance & introspection
    // ------------------------------------------------------------------

    /// Drop activations older than `cutoff`. Pair statistics are kept.
    pub fn prune_old_activations(&mut self, cutoff: Timestamp) {
        while let Some((front, _)) = self.activations.front() {
            if *front < cutoff {
                self.activations.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drop all activations and statistics
    pub fn clear(&mut self) {
        self.activations.clear();
        self.stats.clear();
    }

    /// Activations currently inside the window
    pub fn activation_count(&self) -> usize {
        self.activations.len()
    }

    /// Distinct patterns seen in the current window
    pub fn unique_pattern_count(&self) -> usize {
        self.activations
            .iter()
            .map(|(_, p)| *p)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Ordered pairs with accumulated statistics
    pub fn pair_count(&self) -> usize {
        self.stats.len()
    }

    /// Current configuration
    pub fn config(&self) -> &TemporalConfig {
        &self.config
    }

    /// Replace the configuration
    pub fn set_config(&mut self, config: TemporalConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    fn snapshot(&self, acc: &PairAccumulator) -> TemporalStats {
        let stddev = acc.stddev();
        TemporalStats {
            occurrence_count: acc.count,
            mean_delay_micros: acc.mean.round() as i64,
            stddev_delay_micros: stddev.round() as i64,
            correlation: correlation_of(acc.mean, stddev),
            last_updated: acc.last_updated,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(micros: i64) -> Timestamp {
        Timestamp::from_micros(micros)
    }

    #[test]
    fn test_regular_delay_is_perfectly_correlated() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        // Five repetitions of a -> b with a 1000 µs delay, spaced far
        // enough apart that repetitions do not cross-correlate
        for i in 0..5 {
            let base = i * 60_000_000;
            learner.record_activation(a, ts(base));
            learner.record_activation(b, ts(base + 1000));
        }

        let stats = learner.temporal_stats(a, b).unwrap();
        assert_eq!(stats.occurrence_count, 5);
        assert_eq!(stats.mean_delay_micros, 1000);
        assert_eq!(stats.stddev_delay_micros, 0);
        assert_eq!(stats.correlation, 1.0);
        assert!(learner.is_temporally_correlated(a, b));
        assert_eq!(learner.mean_delay(a, b), 1000);
    }

    #[test]
    fn test_mean_matches_arithmetic_mean() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        let delays = [500, 1500, 1000, 2000, 1000];
        for (i, delay) in delays.iter().enumerate() {
            let base = i as i64 * 60_000_000;
            learner.record_activation(a, ts(base));
            learner.record_activation(b, ts(base + delay));
        }

        let stats = learner.temporal_stats(a, b).unwrap();
        let expected = delays.iter().sum::<i64>() / delays.len() as i64;
        assert_eq!(stats.occurrence_count, delays.len() as u32);
        assert!((stats.mean_delay_micros - expected).abs() <= 1);
        assert!(stats.stddev_delay_micros > 0);
        assert!(stats.correlation < 1.0);
    }

    #[test]
    fn test_below_min_occurrences_is_none() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        learner.record_activation(a, ts(0));
        learner.record_activation(b, ts(100));
        learner.record_activation(a, ts(60_000_000));
        learner.record_activation(b, ts(60_000_100));

        assert!(learner.temporal_stats(a, b).is_none());
        assert_eq!(learner.temporal_correlation(a, b), 0.0);
        // Mean is still reported from the accumulator
        assert_eq!(learner.mean_delay(a, b), 100);
    }

    #[test]
    fn test_max_delay_bounds_pairing() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        // 20 s apart: outside max_delay (10 s), inside the window (5 min)
        learner.record_activation(a, ts(0));
        learner.record_activation(b, ts(20_000_000));

        assert_eq!(learner.pair_count(), 0);
        assert_eq!(learner.activation_count(), 2);
    }

    #[test]
    fn test_window_eviction() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        learner.record_activation(a, ts(0));
        // 6 minutes later: the window is 5 minutes, so `a` is dropped
        learner.record_activation(b, ts(360_000_000));

        assert_eq!(learner.activation_count(), 1);
        assert_eq!(learner.pair_count(), 0);
    }

    #[test]
    fn test_directionality() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        for i in 0..3 {
            let base = i * 60_000_000;
            learner.record_activation(a, ts(base));
            learner.record_activation(b, ts(base + 2000));
        }

        assert!(learner.temporal_stats(a, b).is_some());
        assert!(learner.temporal_stats(b, a).is_none());
    }

    #[test]
    fn test_successors_sorted_by_correlation() {
        let mut learner = TemporalLearner::default();
        let a = PatternId::generate();
        let steady = PatternId::generate();
        let noisy = PatternId::generate();

        for i in 0..4 {
            let base = i * 60_000_000;
            learner.record_activation(a, ts(base));
            learner.record_activation(steady, ts(base + 1000));
            // Noisy follower: delay varies widely
            learner.record_activation(noisy, ts(base + 2000 + i * 1500));
        }

        let successors = learner.successors(a, 0.0);
        assert_eq!(successors.len(), 2);
        assert_eq!(successors[0].0, steady);
        assert_eq!(successors[0].1, 1.0);
        assert!(successors[1].1 < 1.0);

        let predecessors = learner.predecessors(steady, 0.0);
        assert!(predecessors.iter().any(|(p, _)| *p == a));
    }

    #[test]
    fn test_record_sequence() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        let sequence: Vec<(Timestamp, PatternId)> = (0..3)
            .flat_map(|i| {
                let base = i * 60_000_000;
                [(ts(base), a), (ts(base + 500), b)]
            })
            .collect();
        learner.record_sequence(&sequence);

        assert_eq!(learner.temporal_stats(a, b).unwrap().occurrence_count, 3);
    }

    #[test]
    fn test_prune_keeps_stats() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());

        for i in 0..3 {
            let base = i * 60_000_000;
            learner.record_activation(a, ts(base));
            learner.record_activation(b, ts(base + 1000));
        }
        learner.prune_old_activations(ts(i64::MAX));

        assert_eq!(learner.activation_count(), 0);
        assert_eq!(learner.temporal_stats(a, b).unwrap().occurrence_count, 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TemporalConfig {
            min_occurrences: 0,
            ..TemporalConfig::default()
        };
        assert!(matches!(
            TemporalLearner::new(config),
            Err(EngramError::InvalidConfig(_))
        ));

        let config = TemporalConfig {
            min_correlation: 1.5,
            ..TemporalConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unique_pattern_count() {
        let mut learner = TemporalLearner::default();
        let (a, b) = (PatternId::generate(), PatternId::generate());
        learner.record_activation(a, ts(0));
        learner.record_activation(b, ts(100));
        learner.record_activation(a, ts(200));
        assert_eq!(learner.unique_pattern_count(), 2);
        assert_eq!(learner.activation_count(), 3);
    }
}
