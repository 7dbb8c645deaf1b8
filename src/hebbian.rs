//! Hebbian graph (C5): pairwise co-activation counters that materialize into
//! persistent weighted links once they cross a threshold.
//!
//! "Neurons that fire together, wire together." Pairs are canonicalized to
//! `(min_id, max_id)` before touching the counter so order of recall never
//! matters; materialized links are stored as two rows (one per direction)
//! with equal strength, generalizing the teacher's single-row
//! `memory_connections` table to the bidirectional model the Hebbian
//! invariants require.

use crate::config::Config;
use crate::error::StorageResult;
use crate::storage::{HebbianRow, Store};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Records one co-activation for every unordered pair among `ids` (excluding
/// self-pairs), incrementing each pair's counter. Returns the canonical
/// `(min_id, max_id)` pairs whose counter *crossed* `threshold` on this call
/// (i.e. went from `< threshold` to `== threshold`) and were materialized
/// into a bidirectional link.
///
/// A no-op, returning no new links, if `ids` has fewer than two distinct
/// entries or `config.hebbian_enabled` is false.
pub fn record_coactivation(
    store: &Store,
    ids: &[String],
    config: &Config,
    now: DateTime<Utc>,
) -> StorageResult<Vec<(String, String)>> {
    if !config.hebbian_enabled {
        return Ok(Vec::new());
    }

    let unique: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
    let unique: Vec<&str> = unique.into_iter().collect();
    if unique.len() < 2 {
        return Ok(Vec::new());
    }

    let mut new_links = Vec::new();
    for i in 0..unique.len() {
        for j in (i + 1)..unique.len() {
            let (a, b) = canonical_pair(unique[i], unique[j]);
            if maybe_create_link(store, a, b, config.hebbian_threshold, now)? {
                new_links.push((a.to_string(), b.to_string()));
            }
        }
    }
    Ok(new_links)
}

/// Increments the co-activation counter for the canonical pair `(a, b)` and
/// materializes a bidirectional link the moment the counter reaches
/// `threshold`. Idempotent past that point: once formed, repeated calls keep
/// incrementing the counter (it survives as history) but never create a
/// second link or re-fire the "newly formed" signal.
///
/// Returns `true` iff this call is the one that crossed the threshold.
pub fn maybe_create_link(
    store: &Store,
    a: &str,
    b: &str,
    threshold: u32,
    now: DateTime<Utc>,
) -> StorageResult<bool> {
    debug_assert_ne!(a, b, "Hebbian links never self-loop");
    let (a, b) = canonical_pair(a, b);

    let existing = store.hebbian_row(a, b)?;
    let (count, already_linked) = match &existing {
        Some(row) => (row.coactivation_count + 1, row.strength.is_some()),
        None => (1, false),
    };

    let crosses_threshold = !already_linked && count >= threshold as i64;
    let strength = if already_linked {
        existing.as_ref().and_then(|r| r.strength)
    } else if crosses_threshold {
        Some(1.0)
    } else {
        None
    };
    let created_at = existing.as_ref().map(|r| r.created_at).unwrap_or(now);

    store.upsert_hebbian_row(&HebbianRow {
        source_id: a.to_string(),
        target_id: b.to_string(),
        strength,
        coactivation_count: count,
        created_at,
    })?;
    store.upsert_hebbian_row(&HebbianRow {
        source_id: b.to_string(),
        target_id: a.to_string(),
        strength,
        coactivation_count: count,
        created_at,
    })?;

    Ok(crosses_threshold)
}

/// Returns `id`'s linked neighbors (`strength >= prune_floor`) as
/// `(neighbor_id, strength)` pairs.
pub fn neighbors(store: &Store, id: &str, prune_floor: f64) -> StorageResult<Vec<(String, f64)>> {
    store.hebbian_neighbors(id, prune_floor)
}

/// Strengthens the link between `a` and `b` in both directions by `boost`,
/// capped at `cap`. No-op if no link exists yet.
pub fn strengthen(store: &Store, a: &str, b: &str, boost: f64, cap: f64) -> StorageResult<()> {
    let (a, b) = canonical_pair(a, b);
    let Some(row) = store.hebbian_row(a, b)? else {
        return Ok(());
    };
    let Some(current) = row.strength else {
        return Ok(());
    };
    let new_strength = (current + boost).min(cap);
    let updated = HebbianRow {
        strength: Some(new_strength),
        ..row
    };
    store.upsert_hebbian_row(&updated)?;
    store.upsert_hebbian_row(&HebbianRow {
        source_id: b.to_string(),
        target_id: a.to_string(),
        strength: Some(new_strength),
        coactivation_count: updated.coactivation_count,
        created_at: updated.created_at,
    })?;
    Ok(())
}

/// Multiplies every link's strength by `factor` and drops rows (both
/// directions) that fall below `prune_floor`. Returns the number of rows
/// deleted.
pub fn decay(store: &Store, factor: f64, prune_floor: f64) -> StorageResult<i64> {
    store.decay_and_prune_links(factor, prune_floor)
}

/// Every materialized link as `(source_id, target_id, strength)` triples.
pub fn all_links(store: &Store) -> StorageResult<Vec<(String, String, f64)>> {
    Ok(store
        .all_hebbian_links()?
        .into_iter()
        .filter_map(|row| row.strength.map(|s| (row.source_id, row.target_id, s)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryType;

    fn setup() -> (Store, Config, DateTime<Utc>) {
        (Store::open_in_memory().unwrap(), Config::default(), Utc::now())
    }

    #[test]
    fn below_threshold_forms_no_link() {
        let (store, config, now) = setup();
        let m1 = store.add("m1", MemoryType::Factual, 0.5, None, None, now).unwrap();
        let m2 = store.add("m2", MemoryType::Factual, 0.5, None, None, now).unwrap();

        record_coactivation(&store, &[m1.id.clone(), m2.id.clone()], &config, now).unwrap();
        record_coactivation(&store, &[m1.id.clone(), m2.id.clone()], &config, now).unwrap();
        assert!(neighbors(&store, &m1.id, config.hebbian_prune_floor).unwrap().is_empty());
    }

    #[test]
    fn link_forms_exactly_at_threshold() {
        let (store, config, now) = setup();
        let m1 = store.add("m1", MemoryType::Factual, 0.5, None, None, now).unwrap();
        let m2 = store.add("m2", MemoryType::Factual, 0.5, None, None, now).unwrap();

        record_coactivation(&store, &[m1.id.clone(), m2.id.clone()], &config, now).unwrap();
        record_coactivation(&store, &[m1.id.clone(), m2.id.clone()], &config, now).unwrap();
        let new_links = record_coactivation(&store, &[m1.id.clone(), m2.id.clone()], &config, now).unwrap();
        assert_eq!(new_links.len(), 1);

        let n1 = neighbors(&store, &m1.id, config.hebbian_prune_floor).unwrap();
        assert!(n1.iter().any(|(id, _)| id == &m2.id));
        let n2 = neighbors(&store, &m2.id, config.hebbian_prune_floor).unwrap();
        assert!(n2.iter().any(|(id, _)| id == &m1.id));
    }

    #[test]
    fn maybe_create_link_is_idempotent() {
        let (store, config, now) = setup();
        let m1 = store.add("m1", MemoryType::Factual, 0.5, None, None, now).unwrap();
        let m2 = store.add("m2", MemoryType::Factual, 0.5, None, None, now).unwrap();

        for _ in 0..3 {
            maybe_create_link(&store, &m1.id, &m2.id, config.hebbian_threshold, now).unwrap();
        }
        assert_eq!(all_links(&store).unwrap().len(), 2);

        for _ in 0..5 {
            maybe_create_link(&store, &m1.id, &m2.id, config.hebbian_threshold, now).unwrap();
        }
        assert_eq!(all_links(&store).unwrap().len(), 2);
    }

    #[test]
    fn bidirectional_with_equal_strength() {
        let (store, config, now) = setup();
        let m1 = store.add("m1", MemoryType::Factual, 0.5, None, None, now).unwrap();
        let m2 = store.add("m2", MemoryType::Factual, 0.5, None, None, now).unwrap();
        for _ in 0..3 {
            maybe_create_link(&store, &m1.id, &m2.id, config.hebbian_threshold, now).unwrap();
        }
        let fwd = store.hebbian_row(&m1.id, &m2.id).unwrap().unwrap();
        let rev = store.hebbian_row(&m2.id, &m1.id).unwrap().unwrap();
        assert_eq!(fwd.strength, rev.strength);
    }

    #[test]
    fn decay_reduces_and_eventually_prunes() {
        let (store, config, now) = setup();
        let m1 = store.add("m1", MemoryType::Factual, 0.5, None, None, now).unwrap();
        let m2 = store.add("m2", MemoryType::Factual, 0.5, None, None, now).unwrap();
        for _ in 0..3 {
            maybe_create_link(&store, &m1.id, &m2.id, config.hebbian_threshold, now).unwrap();
        }

        decay(&store, 0.5, config.hebbian_prune_floor).unwrap();
        let row = store.hebbian_row(&m1.id, &m2.id).unwrap().unwrap();
        assert!((row.strength.unwrap() - 0.5).abs() < 1e-9);

        for _ in 0..5 {
            decay(&store, 0.5, config.hebbian_prune_floor).unwrap();
        }
        assert!(all_links(&store).unwrap().is_empty());
    }

    #[test]
    fn strengthen_caps_at_configured_maximum() {
        let (store, config, now) = setup();
        let m1 = store.add("m1", MemoryType::Factual, 0.5, None, None, now).unwrap();
        let m2 = store.add("m2", MemoryType::Factual, 0.5, None, None, now).unwrap();
        for _ in 0..3 {
            maybe_create_link(&store, &m1.id, &m2.id, config.hebbian_threshold, now).unwrap();
        }
        strengthen(&store, &m1.id, &m2.id, 5.0, config.hebbian_cap).unwrap();
        let row = store.hebbian_row(&m1.id, &m2.id).unwrap().unwrap();
        assert_eq!(row.strength, Some(config.hebbian_cap));
    }

    #[test]
    fn disabled_config_prevents_link_formation() {
        let (store, mut config, now) = setup();
        config.hebbian_enabled = false;
        let m1 = store.add("m1", MemoryType::Factual, 0.5, None, None, now).unwrap();
        let m2 = store.add("m2", MemoryType::Factual, 0.5, None, None, now).unwrap();
        for _ in 0..10 {
            record_coactivation(&store, &[m1.id.clone(), m2.id.clone()], &config, now).unwrap();
        }
        assert!(all_links(&store).unwrap().is_empty());
    }
}
