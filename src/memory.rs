//! Memory record types: the fundamental unit the engine persists and scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic category of a memory.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// A specific, time-bound experience.
    #[default]
    Episodic,
    /// A context-free fact.
    Factual,
    /// How-to knowledge.
    Procedural,
    /// A relationship between entities.
    Relational,
    /// A subjective opinion or preference.
    Opinion,
}

impl MemoryType {
    /// String form used in storage and the public API.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Episodic => "episodic",
            MemoryType::Factual => "factual",
            MemoryType::Procedural => "procedural",
            MemoryType::Relational => "relational",
            MemoryType::Opinion => "opinion",
        }
    }

    /// Parses the string form, returning `None` for unknown values — callers
    /// must reject these as [`crate::error::EngineError::InvalidArgument`]
    /// rather than silently defaulting.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "episodic" => Some(MemoryType::Episodic),
            "factual" => Some(MemoryType::Factual),
            "procedural" => Some(MemoryType::Procedural),
            "relational" => Some(MemoryType::Relational),
            "opinion" => Some(MemoryType::Opinion),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Consolidation layer a memory currently occupies.
///
/// Monotonically promoted: once [`Layer::Core`], a memory never returns to
/// [`Layer::Working`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Volatile pool of freshly ingested memories, subject to forgetting.
    #[default]
    Working,
    /// Stable pool, immune to the standard forgetting floor.
    Core,
}

impl Layer {
    /// String form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Working => "working",
            Layer::Core => "core",
        }
    }

    /// Parses the string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "working" => Some(Layer::Working),
            "core" => Some(Layer::Core),
            _ => None,
        }
    }
}

/// Polarity of a reward signal, either supplied directly or derived by a
/// [`crate::engine::PolarityClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Positive feedback: reinforcement is boosted.
    Positive,
    /// Negative feedback: reinforcement is reduced.
    Negative,
    /// No reinforcement effect.
    Neutral,
}

/// Qualitative bucket for a memory's activation, part of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    /// `a(t) >= 0`
    Certain,
    /// `a(t) >= -2`
    Likely,
    /// `a(t) >= -5`
    Uncertain,
    /// `a(t) < -5`
    Faint,
}

impl ConfidenceLabel {
    /// Buckets a log-domain activation value per the kernel's thresholds.
    pub fn from_activation(a: f64) -> Self {
        if a >= 0.0 {
            ConfidenceLabel::Certain
        } else if a >= -2.0 {
            ConfidenceLabel::Likely
        } else if a >= -5.0 {
            ConfidenceLabel::Uncertain
        } else {
            ConfidenceLabel::Faint
        }
    }

    /// Downgrades one bucket, used by the recall pipeline's contradiction
    /// penalty. [`ConfidenceLabel::Faint`] is already the floor and stays put.
    pub fn downgrade(self) -> Self {
        match self {
            ConfidenceLabel::Certain => ConfidenceLabel::Likely,
            ConfidenceLabel::Likely => ConfidenceLabel::Uncertain,
            ConfidenceLabel::Uncertain | ConfidenceLabel::Faint => ConfidenceLabel::Faint,
        }
    }
}

/// A persisted memory row.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Stable, opaque, immutable identifier.
    pub id: String,
    /// UTF-8 content.
    pub content: String,
    /// Semantic category.
    pub memory_type: MemoryType,
    /// Subjective importance in `[0, 1]`.
    pub importance: f64,
    /// Consolidation layer.
    pub layer: Layer,
    /// When the memory was created.
    pub created_at: DateTime<Utc>,
    /// When the memory was last accessed (recall or reward).
    pub last_accessed_at: DateTime<Utc>,
    /// Number of successful recalls/rewards.
    pub access_count: i64,
    /// Running consolidation accumulator, `>= 0`.
    pub reinforcement: f64,
    /// Id of a memory this one contradicts, if any.
    pub contradicts: Option<String>,
    /// Embedding vector, if one was supplied at write time.
    pub embedding: Option<Vec<f32>>,
}

/// Input accepted by [`crate::engine::Engine::add`].
///
/// Uses `deny_unknown_fields` so a malformed caller payload fails fast rather
/// than silently dropping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddInput {
    /// Content to memorize.
    pub content: String,
    /// Semantic category.
    pub memory_type: MemoryType,
    /// Subjective importance in `[0, 1]`.
    #[serde(default = "default_importance")]
    pub importance: f64,
    /// Id of a memory this one contradicts.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub contradicts: Option<String>,
    /// Precomputed embedding vector.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding: Option<Vec<f32>>,
}

fn default_importance() -> f64 {
    0.5
}

impl AddInput {
    /// Builds an input with default importance and no contradiction/embedding.
    pub fn new(content: impl Into<String>, memory_type: MemoryType) -> Self {
        Self {
            content: content.into(),
            memory_type,
            importance: default_importance(),
            contradicts: None,
            embedding: None,
        }
    }
}

/// A single scored result from [`crate::engine::Engine::recall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallResult {
    /// Id of the matched memory.
    pub id: String,
    /// Content of the matched memory.
    pub content: String,
    /// Semantic category.
    pub memory_type: MemoryType,
    /// Activation at the moment of recall.
    pub activation: f64,
    /// Bucketed view of `activation`.
    pub confidence_label: ConfidenceLabel,
    /// Clamped `sigmoid(activation)`, distinct from the raw activation value.
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_roundtrips() {
        for t in [
            MemoryType::Episodic,
            MemoryType::Factual,
            MemoryType::Procedural,
            MemoryType::Relational,
            MemoryType::Opinion,
        ] {
            assert_eq!(MemoryType::parse(t.as_str()), Some(t));
        }
        assert_eq!(MemoryType::parse("bogus"), None);
    }

    #[test]
    fn confidence_label_buckets() {
        assert_eq!(ConfidenceLabel::from_activation(0.0), ConfidenceLabel::Certain);
        assert_eq!(ConfidenceLabel::from_activation(-1.9), ConfidenceLabel::Likely);
        assert_eq!(ConfidenceLabel::from_activation(-4.9), ConfidenceLabel::Uncertain);
        assert_eq!(ConfidenceLabel::from_activation(-5.1), ConfidenceLabel::Faint);
    }

    #[test]
    fn confidence_label_downgrades_one_bucket() {
        assert_eq!(ConfidenceLabel::Certain.downgrade(), ConfidenceLabel::Likely);
        assert_eq!(ConfidenceLabel::Faint.downgrade(), ConfidenceLabel::Faint);
    }

    #[test]
    fn add_input_rejects_unknown_fields() {
        let json = r#"{"content":"x","memoryType":"factual","bogus":true}"#;
        let result: std::result::Result<AddInput, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
