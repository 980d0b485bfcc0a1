//! Output extraction from a finished crew run.
//!
//! The orchestration runtime hands back a loosely shaped result. The
//! [`CrewRunOutput`] and [`TaskOutputRecord`] traits describe the only parts
//! extraction looks at; [`CrewOutputDocument`] implements them over the
//! runtime's JSON form. Missing or malformed pieces degrade to defaults,
//! extraction itself never fails.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crewout_shared::{
    CrewOutError, ExtractionConfig, RawOutputs, Result, StageOutput, TokenUsage,
};

/// Stage name used for tasks that do not declare one.
pub const UNKNOWN_STAGE: &str = "unknown";

// ---------------------------------------------------------------------------
// Source traits
// ---------------------------------------------------------------------------

/// One task's output as reported by the runtime.
pub trait TaskOutputRecord {
    /// Declared task name.
    fn name(&self) -> Option<&str>;
    /// Raw text the agent emitted.
    fn raw(&self) -> Option<&str>;
    /// Validated structured form.
    fn structured(&self) -> Option<StageOutput>;
    /// Alternate structured form, used when the validated one is absent.
    fn output_model(&self) -> Option<StageOutput>;
    fn token_usage(&self) -> Option<&Value>;
    /// Text form of the whole record, used when no raw text is present.
    fn describe(&self) -> String;
}

/// A finished crew run.
pub trait CrewRunOutput {
    type Task: TaskOutputRecord;

    fn tasks_output(&self) -> Option<&[Self::Task]>;
    /// Aggregate usage for the whole run.
    fn token_usage(&self) -> Option<&Value>;
    /// Final raw text of the run.
    fn final_raw(&self) -> Option<&str>;
}

// ---------------------------------------------------------------------------
// JSON adapter
// ---------------------------------------------------------------------------

/// A crew run result in the runtime's JSON form.
///
/// Every field is optional; a non-array `tasks_output` is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewOutputDocument {
    #[serde(default, deserialize_with = "lenient_text")]
    pub raw: Option<String>,
    #[serde(default, deserialize_with = "lenient_tasks")]
    pub tasks_output: Option<Vec<TaskOutputDocument>>,
    #[serde(default)]
    pub token_usage: Option<Value>,
}

impl CrewOutputDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CrewOutError::validation(format!("invalid crew output document: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CrewOutError::io(path, e))?;
        Self::from_json_str(&content)
    }
}

impl CrewRunOutput for CrewOutputDocument {
    type Task = TaskOutputDocument;

    fn tasks_output(&self) -> Option<&[TaskOutputDocument]> {
        self.tasks_output.as_deref()
    }

    fn token_usage(&self) -> Option<&Value> {
        self.token_usage.as_ref()
    }

    fn final_raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

/// One entry of `tasks_output`, kept as the untouched JSON record.
///
/// Recognised keys: `name`, `raw`, `pydantic`, `output_pydantic`,
/// `json_dict`, `token_usage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskOutputDocument(Value);

impl TaskOutputRecord for TaskOutputDocument {
    fn name(&self) -> Option<&str> {
        self.0
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    fn raw(&self) -> Option<&str> {
        self.0.get("raw").and_then(Value::as_str)
    }

    fn structured(&self) -> Option<StageOutput> {
        self.0.get("pydantic").and_then(StageOutput::from_value)
    }

    fn output_model(&self) -> Option<StageOutput> {
        ["output_pydantic", "json_dict"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(StageOutput::from_value))
    }

    fn token_usage(&self) -> Option<&Value> {
        self.0.get("token_usage")
    }

    fn describe(&self) -> String {
        match &self.0 {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn lenient_tasks<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<TaskOutputDocument>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items.into_iter().map(TaskOutputDocument).collect()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Everything pulled out of one crew run, keyed by task name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Task names in run order, each listed once.
    pub stage_names: Vec<String>,
    pub structured_outputs: BTreeMap<String, StageOutput>,
    pub raw_outputs: RawOutputs,
    pub total_token_usage: TokenUsage,
    pub task_token_usage: BTreeMap<String, TokenUsage>,
    pub final_output: Option<String>,
}

/// Pull structured outputs, raw text and token usage out of `run`.
#[instrument(skip_all)]
pub fn extract<R: CrewRunOutput>(run: &R, config: &ExtractionConfig) -> Extraction {
    let mut extraction = Extraction {
        total_token_usage: aggregate_usage(run.token_usage(), config),
        final_output: run.final_raw().map(str::to_owned),
        ..Extraction::default()
    };

    let tasks = run.tasks_output().unwrap_or_default();
    for task in tasks {
        let name = task.name().unwrap_or(UNKNOWN_STAGE).to_string();
        if !extraction.stage_names.contains(&name) {
            extraction.stage_names.push(name.clone());
        }

        let raw = task.raw().map(str::to_owned).unwrap_or_else(|| task.describe());
        extraction.raw_outputs.insert(name.clone(), raw);

        if let Some(output) = task.structured().or_else(|| task.output_model()) {
            extraction.structured_outputs.insert(name.clone(), output);
        }

        if let Some(Value::Object(fields)) = task.token_usage() {
            extraction
                .task_token_usage
                .insert(name, usage_from_fields(fields, config));
        }
    }

    debug!(
        tasks = tasks.len(),
        structured = extraction.structured_outputs.len(),
        total_tokens = extraction.total_token_usage.total_tokens,
        "extracted crew output"
    );

    extraction
}

fn aggregate_usage(usage: Option<&Value>, config: &ExtractionConfig) -> TokenUsage {
    match usage {
        Some(Value::Object(fields)) => usage_from_fields(fields, config),
        None | Some(Value::Null) => TokenUsage::zeroed(&config.default_model_name),
        Some(other) => {
            warn!(
                usage = %other,
                "aggregate token usage is not a key-value record, reporting zero usage"
            );
            TokenUsage::zeroed(&config.default_model_name)
        }
    }
}

fn usage_from_fields(fields: &Map<String, Value>, config: &ExtractionConfig) -> TokenUsage {
    let count = |key: &str| fields.get(key).map_or(0, token_count);
    TokenUsage {
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
        total_tokens: count("total_tokens"),
        model_name: Some(
            fields
                .get("model_name")
                .and_then(Value::as_str)
                .unwrap_or(config.default_model_name.as_str())
                .to_string(),
        ),
    }
}

/// Non-negative integer counter; anything else counts as 0.
fn token_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
