//! Consolidator (C6): the periodic sweep that promotes reinforced working-layer
//! memories to the stable core layer, forgets weak ones, and ages the Hebbian
//! graph. Invoked manually or on whatever cadence the caller chooses.

use crate::activation::{activation, ActivationInputs};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::Result;
use crate::hebbian;
use crate::storage::Store;
use std::time::Instant;

/// Outcome of one [`run`] sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolidationResult {
    /// Working-layer memories examined.
    pub memories_scanned: i64,
    /// Memories promoted from working to core.
    pub memories_promoted: i64,
    /// Memories forgotten (deleted for falling below the forget floor).
    pub memories_forgotten: i64,
    /// Hebbian link rows pruned during the decay sweep.
    pub links_pruned: i64,
    /// Wall-clock duration of the sweep, in milliseconds.
    pub duration_ms: i64,
}

/// Runs one consolidation sweep:
///
/// 1. For each working-layer memory, compute `a(t)` at `now`.
/// 2. Promote to core if `reinforcement >= working_to_core_threshold`.
/// 3. Otherwise forget (delete) if `a(t) < forget_floor`, where
///    `forget_floor = min_activation - 2 - log(1 + days)`.
/// 4. Decay the Hebbian graph by `hebbian_decay`.
///
/// `days` is an advisory knob scaling forgetting severity; larger values
/// forget more aggressively. A second immediate call with no intervening
/// activity promotes and forgets nothing further.
pub fn run(store: &Store, config: &Config, clock: &dyn Clock, days: f64) -> Result<ConsolidationResult> {
    let start = Instant::now();
    let now = clock.now();
    let forget_floor = config.min_activation - 2.0 - (1.0 + days).ln();

    let candidates = store.working_layer_memories()?;
    let mut result = ConsolidationResult {
        memories_scanned: candidates.len() as i64,
        ..Default::default()
    };

    for memory in candidates {
        if memory.reinforcement >= config.working_to_core_threshold {
            store.promote_to_core(&memory.id)?;
            result.memories_promoted += 1;
            continue;
        }

        let a = activation(
            &ActivationInputs {
                importance: memory.importance,
                access_count: memory.access_count,
                reinforcement: memory.reinforcement,
                last_accessed_at: memory.last_accessed_at,
            },
            now,
            config,
        );

        if a < forget_floor {
            store.delete(&memory.id)?;
            result.memories_forgotten += 1;
        }
    }

    result.links_pruned = hebbian::decay(store, config.hebbian_decay, config.hebbian_prune_floor)?;
    result.duration_ms = start.elapsed().as_millis() as i64;

    tracing::info!(
        promoted = result.memories_promoted,
        forgotten = result.memories_forgotten,
        links_pruned = result.links_pruned,
        "consolidation sweep complete"
    );

    Ok(result)
}
