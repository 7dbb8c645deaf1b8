//! Adaptive tuner (C7): a pure observer of recall/reward/consolidation
//! traffic that periodically rewrites the engine's own [`Config`].
//!
//! Direct port of `original_source/engram/adaptive_tuning.py`'s
//! `AdaptiveMetrics`/`AdaptiveTuner` pair into the teacher's idiom: metrics
//! accumulate on plain struct fields, `adapt()` walks an independent rule
//! table, and every rule is a no-op once its own clamp is already hit (the
//! basis of the tuner's idempotence property).

use crate::clock::Clock;
use crate::config::Config;
use crate::memory::Polarity;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Accumulated performance metrics driving adaptation decisions.
#[derive(Debug, Clone)]
pub struct AdaptiveMetrics {
    /// Total `recall` calls observed.
    pub total_recalls: u64,
    /// Recalls whose result list was non-empty.
    pub successful_recalls: u64,
    /// Positive-polarity rewards observed.
    pub positive_rewards: u64,
    /// Negative-polarity rewards observed.
    pub negative_rewards: u64,
    /// Memories forgotten across all consolidation cycles.
    pub memories_forgotten: u64,
    /// Consolidation cycles observed.
    pub consolidation_cycles: u64,
    /// Cumulative recall latency, in seconds.
    pub total_retrieval_time: f64,
    /// Last time any metric was recorded.
    pub last_updated: DateTime<Utc>,
}

impl AdaptiveMetrics {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_recalls: 0,
            successful_recalls: 0,
            positive_rewards: 0,
            negative_rewards: 0,
            memories_forgotten: 0,
            consolidation_cycles: 0,
            total_retrieval_time: 0.0,
            last_updated: now,
        }
    }

    /// Fraction of recalls that returned at least one result. Neutral (`1.0`)
    /// with no samples yet.
    pub fn hit_rate(&self) -> f64 {
        if self.total_recalls == 0 {
            1.0
        } else {
            self.successful_recalls as f64 / self.total_recalls as f64
        }
    }

    /// `positive / (positive + negative)`. Neutral (`0.5`) absent feedback.
    pub fn reward_ratio(&self) -> f64 {
        let total = self.positive_rewards + self.negative_rewards;
        if total == 0 {
            0.5
        } else {
            self.positive_rewards as f64 / total as f64
        }
    }

    /// Average memories forgotten per consolidation cycle.
    pub fn forget_rate(&self) -> f64 {
        if self.consolidation_cycles == 0 {
            0.0
        } else {
            self.memories_forgotten as f64 / self.consolidation_cycles as f64
        }
    }

    /// Average recall latency, in seconds.
    pub fn avg_retrieval_time(&self) -> f64 {
        if self.total_recalls == 0 {
            0.0
        } else {
            self.total_retrieval_time / self.total_recalls as f64
        }
    }
}

/// Rewrites [`Config`] from observed [`AdaptiveMetrics`].
#[derive(Debug)]
pub struct AdaptiveTuner {
    /// Rate at which parameters move per adaptation (`0.01..=0.2` sane range).
    pub adaptation_rate: f64,
    /// Minimum recalls before `should_adapt` can fire on the sample gate.
    pub min_samples: u64,
    /// Minimum wall-clock gap between adaptations.
    pub adaptation_interval: chrono::Duration,
    metrics: AdaptiveMetrics,
    last_adaptation: DateTime<Utc>,
}

impl AdaptiveTuner {
    /// Creates a tuner with the reference defaults: `adaptation_rate=0.05`,
    /// `min_samples=20`, `adaptation_interval=1h`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            adaptation_rate: 0.05,
            min_samples: 20,
            adaptation_interval: chrono::Duration::hours(1),
            metrics: AdaptiveMetrics::new(now),
            last_adaptation: now,
        }
    }

    /// Current metric snapshot.
    pub fn metrics(&self) -> &AdaptiveMetrics {
        &self.metrics
    }

    /// Records one `recall` call's result count and latency.
    pub fn record_recall(&mut self, result_count: usize, latency_secs: f64, now: DateTime<Utc>) {
        self.metrics.total_recalls += 1;
        if result_count > 0 {
            self.metrics.successful_recalls += 1;
        }
        self.metrics.total_retrieval_time += latency_secs;
        self.metrics.last_updated = now;
    }

    /// Records one reward call's polarity. [`Polarity::Neutral`] is tracked
    /// in neither counter, matching the reference (which only branches on
    /// `"positive"`/`"negative"` strings).
    pub fn record_reward(&mut self, polarity: Polarity, now: DateTime<Utc>) {
        match polarity {
            Polarity::Positive => self.metrics.positive_rewards += 1,
            Polarity::Negative => self.metrics.negative_rewards += 1,
            Polarity::Neutral => {}
        }
        self.metrics.last_updated = now;
    }

    /// Records one consolidation cycle's forgetting count.
    pub fn record_consolidation(&mut self, n_forgotten: u64, now: DateTime<Utc>) {
        self.metrics.consolidation_cycles += 1;
        self.metrics.memories_forgotten += n_forgotten;
        self.metrics.last_updated = now;
    }

    /// Gate from spec §4.7: `(total_recalls >= min_samples OR
    /// consolidation_cycles >= 3) AND (now - last_adaptation >= interval)`.
    pub fn should_adapt(&self, now: DateTime<Utc>) -> bool {
        let has_enough_samples =
            self.metrics.total_recalls >= self.min_samples || self.metrics.consolidation_cycles >= 3;
        let interval_elapsed = now - self.last_adaptation >= self.adaptation_interval;
        has_enough_samples && interval_elapsed
    }

    /// Applies the rule table in order against `config`, mutating it in
    /// place. Returns the keys that actually changed, mapped to their new
    /// values; empty if `should_adapt` is false or every rule's clamp was
    /// already hit (the latter makes repeated `adapt()` calls with identical
    /// metrics idempotent, per spec property 8).
    pub fn adapt(&mut self, config: &mut Config, clock: &dyn Clock) -> BTreeMap<&'static str, f64> {
        let now = clock.now();
        if !self.should_adapt(now) {
            return BTreeMap::new();
        }

        let mut changes = BTreeMap::new();
        let r = self.adaptation_rate;

        // Rule 1: hit rate -> min_activation permissiveness.
        let hit_rate = self.metrics.hit_rate();
        if hit_rate < 0.6 {
            let new_threshold = (config.min_activation - config.min_activation.abs() * r).max(-15.0);
            if new_threshold != config.min_activation {
                changes.insert("min_activation", new_threshold);
                config.min_activation = new_threshold;
            }
        } else if hit_rate > 0.9 {
            let new_threshold = (config.min_activation + config.min_activation.abs() * r / 2.0).min(-5.0);
            if new_threshold != config.min_activation {
                changes.insert("min_activation", new_threshold);
                config.min_activation = new_threshold;
            }
        }

        // Rule 2: low reward ratio with enough feedback -> more context weight.
        let reward_ratio = self.metrics.reward_ratio();
        let total_feedback = self.metrics.positive_rewards + self.metrics.negative_rewards;
        if reward_ratio < 0.4 && total_feedback > 5 {
            let new_weight = (config.context_weight * (1.0 + r)).min(3.0);
            if new_weight != config.context_weight {
                changes.insert("context_weight", new_weight);
                config.context_weight = new_weight;
            }
        }

        // Rule 3: forget rate -> decay speed.
        let forget_rate = self.metrics.forget_rate();
        if forget_rate > 10.0 {
            let new_mu1 = (config.mu1 * (1.0 - r)).max(0.01);
            let new_mu2 = (config.mu2 * (1.0 - r)).max(0.0001);
            if new_mu1 != config.mu1 {
                changes.insert("mu1", new_mu1);
                config.mu1 = new_mu1;
            }
            if new_mu2 != config.mu2 {
                changes.insert("mu2", new_mu2);
                config.mu2 = new_mu2;
            }
        } else if forget_rate < 2.0 && self.metrics.consolidation_cycles >= 5 {
            let new_mu1 = (config.mu1 * (1.0 + r)).min(0.5);
            let new_mu2 = (config.mu2 * (1.0 + r)).min(0.02);
            if new_mu1 != config.mu1 {
                changes.insert("mu1", new_mu1);
                config.mu1 = new_mu1;
            }
            if new_mu2 != config.mu2 {
                changes.insert("mu2", new_mu2);
                config.mu2 = new_mu2;
            }
        }

        // Rule 4: strong positive feedback -> faster consolidation.
        if reward_ratio > 0.7 && self.metrics.positive_rewards >= 5 {
            let new_alpha = (config.alpha * (1.0 + r / 2.0)).min(0.3);
            if new_alpha != config.alpha {
                changes.insert("alpha", new_alpha);
                config.alpha = new_alpha;
            }
        }

        self.last_adaptation = now;
        if changes.is_empty() {
            tracing::warn!("adaptive tuner ran but every rule's clamp was already hit");
        } else {
            tracing::info!(?changes, "adaptive tuner adjusted configuration");
        }
        changes
    }

    /// Resets collected metrics, e.g. after a manual configuration override.
    pub fn reset_metrics(&mut self, now: DateTime<Utc>) {
        self.metrics = AdaptiveMetrics::new(now);
    }
}
