//! Public API surface (spec §6): wires the store (C1), activation kernel
//! (C2/C3), recall pipeline (C4), Hebbian graph (C5), consolidator (C6), and
//! adaptive tuner (C7) together behind a single [`Engine`] handle.

use crate::activation::{self, ActivationInputs};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::consolidation::{self, ConsolidationResult};
use crate::error::{EngineError, Result, StorageError};
use crate::hebbian;
use crate::memory::{AddInput, Layer, Memory, MemoryType, Polarity, RecallResult};
use crate::recall::{expansion_score, score, token_jaccard};
use crate::storage::Store;
use crate::tuner::AdaptiveTuner;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

/// Optional collaborator that encodes free text into a fixed-dimensionality
/// vector. Absent, vector candidate generation is skipped and semantic
/// similarity falls back to token Jaccard (spec §6).
pub trait EmbeddingAdaptor: Send + Sync {
    /// Encodes `text` into a vector of the store-wide embedding dimension.
    fn encode(&self, text: &str) -> Vec<f32>;
}

/// Optional collaborator that classifies free-text reward feedback into a
/// [`Polarity`]. Absent, callers must supply the polarity directly.
pub trait PolarityClassifier: Send + Sync {
    /// Classifies `text` as positive, negative, or neutral feedback.
    fn classify(&self, text: &str) -> Polarity;
}

/// Aggregate counts and adaptive metrics returned by [`Engine::stats`].
#[derive(Debug, Clone)]
pub struct Stats {
    /// Memories currently in the working layer.
    pub working_count: i64,
    /// Memories currently in the core layer.
    pub core_count: i64,
    /// Hit rate over observed recalls (`1.0` absent data).
    pub hit_rate: f64,
    /// Positive/negative reward ratio (`0.5` absent data).
    pub reward_ratio: f64,
    /// Average memories forgotten per consolidation cycle.
    pub forget_rate: f64,
    /// Average recall latency, in seconds.
    pub avg_retrieval_time: f64,
    /// Total recalls observed by the tuner.
    pub total_recalls: u64,
    /// Total consolidation cycles observed by the tuner.
    pub consolidation_cycles: u64,
}

/// Builder for [`Engine`], the entry point for wiring optional collaborators
/// (embedding adaptor, polarity classifier, clock) before opening storage.
pub struct EngineBuilder {
    config: Option<Config>,
    embedding_adaptor: Option<Box<dyn EmbeddingAdaptor>>,
    polarity_classifier: Option<Box<dyn PolarityClassifier>>,
    clock: Box<dyn Clock>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: None,
            embedding_adaptor: None,
            polarity_classifier: None,
            clock: Box::new(SystemClock),
        }
    }
}

impl EngineBuilder {
    /// Starts a builder with the production system clock and no optional
    /// collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the starting configuration (defaults to [`Config::default`]
    /// or whatever is already persisted at the target path).
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Installs an embedding adaptor for vector candidate generation.
    pub fn embedding_adaptor(mut self, adaptor: impl EmbeddingAdaptor + 'static) -> Self {
        self.embedding_adaptor = Some(Box::new(adaptor));
        self
    }

    /// Installs a polarity classifier for free-text `reward` calls.
    pub fn polarity_classifier(mut self, classifier: impl PolarityClassifier + 'static) -> Self {
        self.polarity_classifier = Some(Box::new(classifier));
        self
    }

    /// Overrides the injectable clock, primarily for deterministic tests.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Opens (or creates) a database file at `path` and builds the engine.
    pub fn open(self, path: impl AsRef<Path>) -> Result<Engine> {
        let store = Store::open(path)?;
        self.finish(store)
    }

    /// Opens an in-memory database — intended for tests and ephemeral usage.
    pub fn open_in_memory(self) -> Result<Engine> {
        let store = Store::open_in_memory()?;
        self.finish(store)
    }

    fn finish(self, store: Store) -> Result<Engine> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                store.save_config(&config).map_err(EngineError::from)?;
                config
            }
            None => store.load_config().map_err(EngineError::from)?,
        };
        let now = self.clock.now();
        Ok(Engine {
            store,
            config: Mutex::new(config),
            clock: self.clock,
            embedding_adaptor: self.embedding_adaptor,
            polarity_classifier: self.polarity_classifier,
            tuner: Mutex::new(AdaptiveTuner::new(now)),
            last_recall_ids: Mutex::new(Vec::new()),
        })
    }
}

/// The embeddable memory engine: C1-C7 behind one handle.
///
/// `Send + Sync` via interior mutability on [`Store`], the mutable
/// [`Config`], the [`AdaptiveTuner`], and the most-recent-recall id cache —
/// callers may share an `Arc<Engine>` across threads without an outer lock,
/// matching the teacher's `Storage` shape. Write paths still serialize under
/// the store's own writer mutex (spec §5).
pub struct Engine {
    store: Store,
    config: Mutex<Config>,
    clock: Box<dyn Clock>,
    embedding_adaptor: Option<Box<dyn EmbeddingAdaptor>>,
    polarity_classifier: Option<Box<dyn PolarityClassifier>>,
    tuner: Mutex<AdaptiveTuner>,
    last_recall_ids: Mutex<Vec<String>>,
}

impl Engine {
    /// Starts a builder for constructing an [`Engine`].
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Opens (or creates) a database file with default configuration and the
    /// system clock.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        EngineBuilder::new().open(path)
    }

    /// Opens an in-memory engine with default configuration and the system
    /// clock — primarily for tests and scratch usage.
    pub fn open_in_memory() -> Result<Self> {
        EngineBuilder::new().open_in_memory()
    }

    fn config(&self) -> Config {
        self.config.lock().expect("config lock poisoned").clone()
    }

    /// Current configuration snapshot.
    pub fn config_snapshot(&self) -> Config {
        self.config()
    }

    // ------------------------------------------------------------------
    // add
    // ------------------------------------------------------------------

    /// Inserts a new memory at the working layer. Validates `importance`,
    /// `contradicts`, and embedding dimensionality before any write
    /// (spec §7: invalid inputs are rejected before mutation).
    pub fn add(&self, input: AddInput) -> Result<String> {
        if !(0.0..=1.0).contains(&input.importance) {
            return Err(EngineError::InvalidArgument(format!(
                "importance {} outside [0, 1]",
                input.importance
            )));
        }
        if let Some(embedding) = &input.embedding {
            if embedding.is_empty() {
                return Err(EngineError::InvalidArgument(
                    "embedding must be non-empty".into(),
                ));
            }
            if let Some(existing_dim) = self.store.embedding_dimension().map_err(EngineError::from)? {
                if embedding.len() != existing_dim {
                    return Err(EngineError::InvalidArgument(format!(
                        "embedding dimensionality {} does not match store dimension {existing_dim}",
                        embedding.len()
                    )));
                }
            }
        }

        let now = self.clock.now();
        let memory = self
            .store
            .add(
                &input.content,
                input.memory_type,
                input.importance,
                input.contradicts.as_deref(),
                input.embedding.as_deref(),
                now,
            )
            .map_err(|err| match err {
                StorageError::Conflict(msg) => EngineError::Conflict(msg),
                other => EngineError::Unavailable(other),
            })?;

        Ok(memory.id)
    }

    /// Fetches a memory by id.
    pub fn get(&self, id: &str) -> Result<Memory> {
        self.store
            .get(id)
            .map_err(EngineError::from)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Deletes a memory, cascading to Hebbian links/counters.
    pub fn delete(&self, id: &str) -> Result<()> {
        let removed = self.store.delete(id).map_err(EngineError::from)?;
        if !removed {
            return Err(EngineError::NotFound(id.to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // recall (C4)
    // ------------------------------------------------------------------

    /// Runs the recall pipeline: candidate generation, scoring, threshold
    /// filter, optional graph expansion, ranking, contradiction penalty,
    /// reinforcement, co-activation, and metrics (spec §4.4).
    pub fn recall(&self, query: &str, limit: usize, graph_expand: Option<bool>) -> Result<Vec<RecallResult>> {
        let start = std::time::Instant::now();
        let config = self.config();
        let now = self.clock.now();
        let expand = graph_expand.unwrap_or(config.hebbian_enabled);

        if limit == 0 {
            let elapsed = start.elapsed().as_secs_f64();
            self.tuner
                .lock()
                .expect("tuner lock poisoned")
                .record_recall(0, elapsed, now);
            return Ok(Vec::new());
        }

        // 1. Candidate generation.
        let fts_limit = limit.saturating_mul(4).max(1);
        let lexical_ids = self.store.lexical_candidates(query, fts_limit).map_err(EngineError::from)?;
        let query_embedding = self.embedding_adaptor.as_ref().map(|a| a.encode(query));
        let vector_candidates = match &query_embedding {
            Some(embedding) => self.store.vector_candidates(embedding, fts_limit).map_err(EngineError::from)?,
            None => Vec::new(),
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut candidate_ids: Vec<String> = Vec::new();
        for id in lexical_ids {
            if seen.insert(id.clone()) {
                candidate_ids.push(id);
            }
        }
        for candidate in &vector_candidates {
            if seen.insert(candidate.id.clone()) {
                candidate_ids.push(candidate.id.clone());
            }
        }

        let similarity_by_id: HashMap<String, f64> = vector_candidates
            .into_iter()
            .filter_map(|c| c.similarity.map(|s| (c.id, s)))
            .collect();

        // 2 & 3. Score every direct candidate, then threshold filter.
        let mut scored: Vec<(Memory, f64, f64)> = Vec::new(); // (memory, activation, score)
        for id in &candidate_ids {
            let Some(memory) = self.store.get(id).map_err(EngineError::from)? else {
                continue;
            };
            let a = activation_at(&memory, now, &config);
            if a < config.min_activation {
                continue;
            }
            let similarity = similarity_by_id
                .get(id)
                .copied()
                .unwrap_or_else(|| token_jaccard(query, &memory.content));
            let s = score(config.context_weight, similarity, a);
            scored.push((memory, a, s));
        }

        // 4. Single-hop graph expansion, deduplicated against the direct set.
        if expand {
            let mut expansion: Vec<(Memory, f64, f64)> = Vec::new();
            for (source_memory, _source_activation, source_score) in &scored {
                let neighbors = hebbian::neighbors(&self.store, &source_memory.id, config.hebbian_prune_floor)
                    .map_err(EngineError::from)?;
                for (neighbor_id, strength) in neighbors {
                    if seen.contains(&neighbor_id) {
                        continue;
                    }
                    let Some(neighbor) = self.store.get(&neighbor_id).map_err(EngineError::from)? else {
                        continue;
                    };
                    let neighbor_activation = activation_at(&neighbor, now, &config);
                    let neighbor_score = expansion_score(strength, *source_score, neighbor_activation);
                    seen.insert(neighbor_id);
                    expansion.push((neighbor, neighbor_activation, neighbor_score));
                }
            }
            scored.extend(expansion);
        }

        // 5. Rank, take top `limit`.
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        // 6. Contradiction penalty against other *returned* memories.
        let returned_ids: HashSet<String> = scored.iter().map(|(m, _, _)| m.id.clone()).collect();
        let mut results: Vec<RecallResult> = Vec::with_capacity(scored.len());
        for (memory, a, _s) in &scored {
            let mut confidence = activation::confidence(*a);
            let mut label = activation::confidence_label(*a);
            if let Some(target) = &memory.contradicts {
                let contradicts_returned = returned_ids.contains(target);
                let contradicts_active = !contradicts_returned
                    && self
                        .store
                        .get(target)
                        .map_err(EngineError::from)?
                        .map(|t| activation_at(&t, now, &config) >= config.min_activation)
                        .unwrap_or(false);
                if contradicts_returned || contradicts_active {
                    confidence *= 0.5;
                    label = label.downgrade();
                }
            }
            results.push(RecallResult {
                id: memory.id.clone(),
                content: memory.content.clone(),
                memory_type: memory.memory_type,
                activation: *a,
                confidence_label: label,
                confidence,
            });
        }

        // 7. Reinforcement for every returned id, one transaction per id
        // (the store itself provides the per-row atomicity the spec asks
        // for; there is no cross-row transaction need here since recall
        // never mutates more than the rows it mutates independently).
        for result in &results {
            self.store
                .update_activation_fields(&result.id, now, config.alpha)
                .map_err(EngineError::from)?;
        }

        // 8. Co-activation, best-effort (spec §7: failures here never roll
        // back the memory writes already committed above).
        if config.hebbian_enabled && results.len() > 1 {
            let ids: Vec<String> = results.iter().map(|r| r.id.clone()).collect();
            if let Err(err) = hebbian::record_coactivation(&self.store, &ids, &config, now) {
                tracing::warn!(error = %err, "co-activation recording failed; continuing (best-effort)");
            }
        }

        *self.last_recall_ids.lock().expect("recall-id cache lock poisoned") =
            results.iter().map(|r| r.id.clone()).collect();

        let elapsed = start.elapsed().as_secs_f64();
        self.tuner
            .lock()
            .expect("tuner lock poisoned")
            .record_recall(results.len(), elapsed, now);

        Ok(results)
    }

    // ------------------------------------------------------------------
    // reward (C3)
    // ------------------------------------------------------------------

    /// Applies reward feedback to `target_ids`, or to the ids returned by the
    /// most recent [`Engine::recall`] if `target_ids` is `None`.
    pub fn reward(&self, polarity: Polarity, target_ids: Option<&[String]>) -> Result<()> {
        let now = self.clock.now();
        let ids: Vec<String> = match target_ids {
            Some(ids) => ids.to_vec(),
            None => self.last_recall_ids.lock().expect("recall-id cache lock poisoned").clone(),
        };

        let config = self.config();
        for id in &ids {
            match polarity {
                Polarity::Positive => {
                    self.store
                        .update_activation_fields(id, now, 2.0 * config.alpha)
                        .map_err(EngineError::from)?;
                }
                Polarity::Negative => {
                    let memory = self
                        .store
                        .get(id)
                        .map_err(EngineError::from)?
                        .ok_or_else(|| EngineError::NotFound(id.clone()))?;
                    let new_reinforcement = (memory.reinforcement - config.alpha).max(0.0);
                    self.store.set_reinforcement(id, new_reinforcement).map_err(EngineError::from)?;
                }
                Polarity::Neutral => {}
            }
        }

        self.tuner.lock().expect("tuner lock poisoned").record_reward(polarity, now);
        Ok(())
    }

    /// Classifies `text` with the installed [`PolarityClassifier`] and
    /// applies it via [`Engine::reward`].
    pub fn reward_text(&self, text: &str, target_ids: Option<&[String]>) -> Result<()> {
        let classifier = self.polarity_classifier.as_ref().ok_or_else(|| {
            EngineError::InvalidArgument(
                "no PolarityClassifier installed; call reward() with an explicit Polarity".into(),
            )
        })?;
        let polarity = classifier.classify(text);
        self.reward(polarity, target_ids)
    }

    // ------------------------------------------------------------------
    // consolidate (C6)
    // ------------------------------------------------------------------

    /// Runs one consolidation sweep and records it with the tuner.
    pub fn consolidate(&self, days: f64) -> Result<ConsolidationResult> {
        let config = self.config();
        let result = consolidation::run(&self.store, &config, self.clock.as_ref(), days)
            .map_err(EngineError::from)?;
        let now = self.clock.now();
        self.tuner
            .lock()
            .expect("tuner lock poisoned")
            .record_consolidation(result.memories_forgotten as u64, now);
        Ok(result)
    }

    // ------------------------------------------------------------------
    // tuner (C7)
    // ------------------------------------------------------------------

    /// Runs the adaptive tuner's rule table against the current
    /// configuration if its gate is open, persisting any changes. Returns
    /// the changed parameter names and their new values.
    pub fn adapt(&self) -> Result<Vec<(String, f64)>> {
        let mut config = self.config();
        let changes = {
            let mut tuner = self.tuner.lock().expect("tuner lock poisoned");
            tuner.adapt(&mut config, self.clock.as_ref())
        };
        if !changes.is_empty() {
            config.validate()?;
            self.store.save_config(&config).map_err(EngineError::from)?;
            *self.config.lock().expect("config lock poisoned") = config;
        }
        Ok(changes.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    // ------------------------------------------------------------------
    // stats / hebbian_links / close
    // ------------------------------------------------------------------

    /// Aggregate counts per layer plus the tuner's current derived metrics.
    pub fn stats(&self) -> Result<Stats> {
        let (working_count, core_count) = self.store.layer_counts().map_err(EngineError::from)?;
        let tuner = self.tuner.lock().expect("tuner lock poisoned");
        let metrics = tuner.metrics();
        Ok(Stats {
            working_count,
            core_count,
            hit_rate: metrics.hit_rate(),
            reward_ratio: metrics.reward_ratio(),
            forget_rate: metrics.forget_rate(),
            avg_retrieval_time: metrics.avg_retrieval_time(),
            total_recalls: metrics.total_recalls,
            consolidation_cycles: metrics.consolidation_cycles,
        })
    }

    /// All Hebbian links, or only those touching `id` if given.
    pub fn hebbian_links(&self, id: Option<&str>) -> Result<Vec<(String, String, f64)>> {
        let links = hebbian::all_links(&self.store).map_err(EngineError::from)?;
        Ok(match id {
            Some(id) => links.into_iter().filter(|(a, b, _)| a == id || b == id).collect(),
            None => links,
        })
    }

    /// Flushes and releases the storage handle. A no-op beyond dropping the
    /// handle, since every write already commits synchronously; kept as an
    /// explicit call so callers have a clear teardown point (spec §6).
    pub fn close(self) {
        drop(self);
    }
}

fn activation_at(memory: &Memory, now: chrono::DateTime<Utc>, config: &Config) -> f64 {
    activation::activation(
        &ActivationInputs {
            importance: memory.importance,
            access_count: memory.access_count,
            reinforcement: memory.reinforcement,
            last_accessed_at: memory.last_accessed_at,
        },
        now,
        config,
    )
}
