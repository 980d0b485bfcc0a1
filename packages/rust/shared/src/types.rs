//! Core domain types for crew execution results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{CrewOutError, Result};
use crate::lenient;

/// Field name used when a stage output is not record-shaped.
pub const SCALAR_FIELD: &str = "value";

/// Raw text each stage's agent emitted, keyed by stage name.
pub type RawOutputs = BTreeMap<String, String>;

/// Serialize `data` to a JSON value.
///
/// A nested value that cannot be represented is replaced by a string in
/// place; non-string map keys are written as their JSON text. Only when
/// `data` itself produces nothing does the whole value fall back to its
/// `Debug` string form.
pub fn to_json_value<T: Serialize + fmt::Debug>(data: &T) -> Value {
    lenient::serialize(data).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "value not JSON-serializable, using string form");
        Value::String(format!("{data:?}"))
    })
}

// ---------------------------------------------------------------------------
// TokenUsage
// ---------------------------------------------------------------------------

/// Token accounting for one stage or a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub model_name: Option<String>,
}

impl TokenUsage {
    /// Build usage from prompt/completion counts, computing the total.
    pub fn from_counts(prompt_tokens: u64, completion_tokens: u64, model_name: Option<String>) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            model_name,
        }
    }

    /// All-zero usage attributed to `model_name`.
    pub fn zeroed(model_name: impl Into<String>) -> Self {
        Self {
            model_name: Some(model_name.into()),
            ..Self::default()
        }
    }

    /// Whether `total_tokens` equals prompt plus completion tokens.
    pub fn is_consistent(&self) -> bool {
        self.prompt_tokens.checked_add(self.completion_tokens) == Some(self.total_tokens)
    }
}

// ---------------------------------------------------------------------------
// StageOutput
// ---------------------------------------------------------------------------

/// The validated structured output of one pipeline stage.
///
/// Fields keep the declaration order of the model they were built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageOutput(Map<String, Value>);

impl StageOutput {
    /// Capture a typed stage model.
    ///
    /// Models that are not record-shaped, or that fail to serialize, are
    /// kept under a single [`SCALAR_FIELD`] entry instead of being dropped.
    pub fn from_model<T: Serialize + fmt::Debug>(model: &T) -> Self {
        match to_json_value(model) {
            Value::Object(fields) => Self(fields),
            other => Self::scalar(other),
        }
    }

    /// Interpret a loosely typed runtime value as a stage output.
    ///
    /// `null` and `{}` mean "no structured output" and yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Object(fields) if fields.is_empty() => None,
            Value::Object(fields) => Some(Self(fields.clone())),
            other => Some(Self::scalar(other.clone())),
        }
    }

    fn scalar(value: Value) -> Self {
        let mut fields = Map::new();
        fields.insert(SCALAR_FIELD.to_string(), value);
        Self(fields)
    }

    /// Field name → value mapping, in declaration order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validate the fields against a typed stage model.
    pub fn to_model<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| CrewOutError::validation(format!("stage output does not match model: {e}")))
    }
}

impl From<Map<String, Value>> for StageOutput {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

// ---------------------------------------------------------------------------
// StageSlots
// ---------------------------------------------------------------------------

/// A named place for one stage's output; `None` when the stage produced nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSlot {
    pub name: String,
    pub output: Option<StageOutput>,
}

/// Ordered stage slots of an execution result. Names are unique.
///
/// Serializes as a map of `"{name}_output"` → output (or `null`), so that it
/// can be flattened into the execution result object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageSlots(Vec<StageSlot>);

impl StageSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an empty slot, keeping any existing output under that name.
    pub fn declare(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.0.iter().any(|slot| slot.name == name) {
            self.0.push(StageSlot { name, output: None });
        }
    }

    /// Set a slot's output, replacing in place if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, output: Option<StageOutput>) {
        let name = name.into();
        match self.0.iter_mut().find(|slot| slot.name == name) {
            Some(slot) => slot.output = output,
            None => self.0.push(StageSlot { name, output }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&StageOutput> {
        self.0
            .iter()
            .find(|slot| slot.name == name)
            .and_then(|slot| slot.output.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageSlot> {
        self.0.iter()
    }

    /// Slots that carry an output, in slot order.
    pub fn populated(&self) -> impl Iterator<Item = (&str, &StageOutput)> {
        self.0
            .iter()
            .filter_map(|slot| slot.output.as_ref().map(|out| (slot.name.as_str(), out)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for StageSlots {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for slot in &self.0 {
            map.serialize_entry(&format!("{}_output", slot.name), &slot.output)?;
        }
        map.end()
    }
}

impl<N: Into<String>> FromIterator<(N, StageOutput)> for StageSlots {
    fn from_iter<I: IntoIterator<Item = (N, StageOutput)>>(iter: I) -> Self {
        let mut slots = Self::new();
        for (name, output) in iter {
            slots.insert(name, Some(output));
        }
        slots
    }
}

// ---------------------------------------------------------------------------
// ExecutionMetadata
// ---------------------------------------------------------------------------

/// Caller-reported outcome of a run. Not enforced by persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Partial,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Run context recorded next to the outputs.
///
/// Well-known keys are typed; anything else goes in `extra`, which is
/// flattened into the same JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Final raw text of the whole run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks_completed: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys of the typed [`ExecutionMetadata`] fields; `extra` cannot use them.
const TYPED_METADATA_KEYS: [&str; 6] = [
    "current_date",
    "agent_name",
    "status",
    "error_message",
    "final_output",
    "tasks_completed",
];

impl ExecutionMetadata {
    /// Add a free-form metadata entry.
    ///
    /// Keys of typed fields are ignored with a warning; set the field instead.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if TYPED_METADATA_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "ignoring extra metadata entry that shadows a typed field");
        } else {
            self.extra.insert(key, value.into());
        }
        self
    }

    /// All populated fields as one JSON object: typed fields first, then
    /// `extra` entries that do not shadow a typed field.
    pub fn to_fields(&self) -> Map<String, Value> {
        let typed = Self {
            extra: Map::new(),
            ..self.clone()
        };
        let mut fields = match to_json_value(&typed) {
            Value::Object(fields) => fields,
            other => {
                let mut fields = Map::new();
                fields.insert(SCALAR_FIELD.to_string(), other);
                fields
            }
        };

        for (key, value) in &self.extra {
            if TYPED_METADATA_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "ignoring extra metadata entry that shadows a typed field");
                continue;
            }
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}

fn serialize_metadata<S: Serializer>(
    metadata: &ExecutionMetadata,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    metadata.to_fields().serialize(serializer)
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// Everything one pipeline run produced, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub stages: StageSlots,
    pub total_token_usage: TokenUsage,
    /// Per-stage usage keyed by stage name.
    pub task_token_usage: BTreeMap<String, TokenUsage>,
    #[serde(serialize_with = "serialize_metadata")]
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    /// Empty result with a fresh time-sortable id and the current timestamp.
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            stages: StageSlots::new(),
            total_token_usage: TokenUsage::default(),
            task_token_usage: BTreeMap::new(),
            metadata: ExecutionMetadata::default(),
        }
    }

    /// Attach a populated stage.
    pub fn with_stage(mut self, name: impl Into<String>, output: StageOutput) -> Self {
        self.stages.insert(name, Some(output));
        self
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self::new()
    }
}
