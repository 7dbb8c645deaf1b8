//! Activation kernel (C2): a pure, deterministic function of a memory's
//! persisted fields and the current time.
//!
//! Two-timescale decay mirrors empirical forgetting curves: a fast
//! coefficient (`mu1`) dominates in the first few hours, a slow coefficient
//! (`mu2`, scaled by `log(1 + delta_hours)`) captures the long tail. `base`
//! is dominated by importance for fresh memories and by usage for old ones.

use crate::config::Config;
use crate::memory::ConfidenceLabel;
use chrono::{DateTime, Utc};

/// Inputs the kernel needs from a persisted memory; callers pass a view
/// rather than the full [`crate::memory::Memory`] so this stays independent
/// of the storage representation.
#[derive(Debug, Clone, Copy)]
pub struct ActivationInputs {
    /// Subjective importance in `[0, 1]`.
    pub importance: f64,
    /// Number of prior accesses.
    pub access_count: i64,
    /// Running reinforcement accumulator.
    pub reinforcement: f64,
    /// When the memory was last accessed.
    pub last_accessed_at: DateTime<Utc>,
}

/// Computes `a(t)` in log-domain for the given instant `now`.
///
/// ```text
/// delta_hours = (now - last_accessed_at) / 3600
/// base        = log(1 + importance) + log(1 + access_count) + reinforcement
/// decay       = mu1 * delta_hours + mu2 * delta_hours * log(1 + delta_hours)
/// a(t)        = base - decay
/// ```
///
/// Monotone non-increasing in `delta_hours`: with no intervening access or
/// reward, activation can only fall as time passes.
pub fn activation(inputs: &ActivationInputs, now: DateTime<Utc>, config: &Config) -> f64 {
    let delta_hours = (now - inputs.last_accessed_at).num_milliseconds() as f64 / 3_600_000.0;
    let delta_hours = delta_hours.max(0.0);

    let base = (1.0 + inputs.importance).ln()
        + (1.0 + inputs.access_count as f64).ln()
        + inputs.reinforcement;
    let decay = config.mu1 * delta_hours + config.mu2 * delta_hours * (1.0 + delta_hours).ln();

    base - decay
}

/// Buckets an activation value into its public confidence label.
pub fn confidence_label(a: f64) -> ConfidenceLabel {
    ConfidenceLabel::from_activation(a)
}

/// Clamped `sigmoid(a)`; the resolved meaning of the open `confidence` field
/// (see DESIGN.md Open Question decisions).
pub fn confidence(a: f64) -> f64 {
    let s = 1.0 / (1.0 + (-a).exp());
    s.clamp(0.0, 1.0)
}
