//! Runtime-mutable engine configuration.
//!
//! Every field here can be rewritten at runtime by [`crate::tuner::AdaptiveTuner`]
//! or by an explicit caller; readers always see the most recently committed
//! values. Defaults mirror the reference engine's defaults.

use crate::error::{EngineError, Result};

/// Configuration consumed by the activation kernel, recall pipeline,
/// consolidator, and Hebbian graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Fast decay coefficient, per hour.
    pub mu1: f64,
    /// Slow decay coefficient, per hour.
    pub mu2: f64,
    /// Consolidation rate applied to `reinforcement` per access.
    pub alpha: f64,
    /// Log-activation threshold below which a candidate is dropped from recall.
    pub min_activation: f64,
    /// Multiplier on semantic similarity in the final recall score.
    pub context_weight: f64,
    /// `reinforcement` value needed to promote a memory to the core layer.
    pub working_to_core_threshold: f64,
    /// Master switch for Hebbian link formation and graph expansion.
    pub hebbian_enabled: bool,
    /// Co-activations required before a link forms.
    pub hebbian_threshold: u32,
    /// Multiplicative decay factor applied to link strength per consolidation cycle.
    pub hebbian_decay: f64,
    /// Strength below which a link is pruned.
    pub hebbian_prune_floor: f64,
    /// Maximum link strength.
    pub hebbian_cap: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mu1: 0.1,
            mu2: 0.005,
            alpha: 0.1,
            min_activation: -8.0,
            context_weight: 1.0,
            working_to_core_threshold: 1.0,
            hebbian_enabled: true,
            hebbian_threshold: 3,
            hebbian_decay: 0.95,
            hebbian_prune_floor: 0.1,
            hebbian_cap: 2.0,
        }
    }
}

impl Config {
    /// Validates invariants that must hold for any configuration the engine
    /// will run with. Called at construction and after every tuner adaptation.
    pub fn validate(&self) -> Result<()> {
        if self.hebbian_prune_floor <= 0.0 || self.hebbian_prune_floor >= self.hebbian_cap {
            return Err(EngineError::InvalidArgument(format!(
                "hebbian_prune_floor ({}) must be in (0, hebbian_cap)",
                self.hebbian_prune_floor
            )));
        }
        if self.hebbian_cap <= 0.0 {
            return Err(EngineError::InvalidArgument(
                "hebbian_cap must be positive".into(),
            ));
        }
        if self.mu1 < 0.0 || self.mu2 < 0.0 {
            return Err(EngineError::InvalidArgument(
                "mu1 and mu2 must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.mu1, 0.1);
        assert_eq!(config.mu2, 0.005);
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.min_activation, -8.0);
        assert_eq!(config.hebbian_threshold, 3);
        assert_eq!(config.hebbian_cap, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_prune_floor() {
        let mut config = Config::default();
        config.hebbian_prune_floor = 3.0;
        assert!(config.validate().is_err());
    }
}
