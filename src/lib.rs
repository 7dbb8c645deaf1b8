//! # Mnemosyne
//!
//! Embeddable, biologically-inspired long-term memory engine for agents.
//!
//! Memories are short pieces of text tagged with a [`memory::MemoryType`] and
//! an importance in `[0, 1]`. The engine persists them durably, scores recall
//! candidates against an evolving **activation** — a log-domain scalar that
//! decays with time, is lifted on reuse, and consolidates through repetition
//! — and expands results across a **Hebbian** co-activation graph formed by
//! repeated co-recall.
//!
//! ## Components
//!
//! - [`storage`] — C1, durable persistence over embedded SQLite with FTS5.
//! - [`activation`] — C2, the pure two-timescale decay kernel.
//! - decay & reinforcement mutations (C3) live on [`storage::Store`] and are
//!   applied by [`engine::Engine::recall`]/[`engine::Engine::reward`].
//! - [`recall`] — C4's scoring/fusion helpers; orchestration lives on
//!   [`engine::Engine::recall`].
//! - [`hebbian`] — C5, the co-activation counter and link graph.
//! - [`consolidation`] — C6, the working-to-core promotion/forgetting sweep.
//! - [`tuner`] — C7, the closed-loop parameter adapter.
//! - [`engine`] — the public API surface wiring C1-C7 together.
//!
//! ## Quick start
//!
//! ```
//! use mnemosyne::{AddInput, Engine, MemoryType};
//!
//! let engine = Engine::open_in_memory()?;
//! let id = engine.add(AddInput::new("the sky is blue", MemoryType::Factual))?;
//! let results = engine.recall("sky", 5, None)?;
//! assert_eq!(results[0].id, id);
//! # Ok::<(), mnemosyne::EngineError>(())
//! ```
//!
//! ## Collaborators
//!
//! Embedding models and full-text search backends are treated as external:
//! the engine consumes them through [`engine::EmbeddingAdaptor`] and the
//! store's built-in FTS5 index respectively. Reward-text sentiment
//! classification is likewise pluggable via [`engine::PolarityClassifier`];
//! absent one, callers pass a [`memory::Polarity`] directly to
//! [`engine::Engine::reward`].

#![warn(rustdoc::missing_crate_level_docs)]

pub mod activation;
pub mod clock;
pub mod config;
pub mod consolidation;
pub mod engine;
pub mod error;
pub mod hebbian;
pub mod memory;
pub mod recall;
pub mod storage;
pub mod tuner;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use consolidation::ConsolidationResult;
pub use engine::{Engine, EngineBuilder, EmbeddingAdaptor, PolarityClassifier, Stats};
pub use error::{EngineError, Result, StorageError, StorageResult};
pub use memory::{AddInput, ConfidenceLabel, Layer, Memory, MemoryType, Polarity, RecallResult};
pub use tuner::{AdaptiveMetrics, AdaptiveTuner};

/// Crate version, as set in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        AddInput, Config, ConfidenceLabel, Engine, EngineBuilder, EngineError, Layer, Memory,
        MemoryType, Polarity, RecallResult, Result, Stats,
    };
}
