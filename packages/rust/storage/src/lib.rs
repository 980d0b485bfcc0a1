//! Filesystem persistence for crew execution results.
//!
//! The [`StorageManager`] owns a base output directory and writes one folder
//! per execution:
//!
//! ```text
//! <base_dir>/<folder_name>_<execution_id>/
//! ├── <stage>_output.json
//! ├── <stage>_output.md
//! ├── token_usage.json
//! ├── execution_metadata.json
//! └── complete_execution_result.json
//! ```
//!
//! Files are created exclusively: a write that would replace an existing
//! file (two stage names that sanitise to the same file name, say) fails
//! with `AlreadyExists`. Filesystem errors are returned to the caller as-is:
//! nothing is retried and partially written folders are left in place.

mod naming;

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crewout_shared::{
    CrewOutError, ExecutionMetadata, ExecutionResult, RawOutputs, Result, StageOutput,
    TokenUsage, to_json_value,
};

/// Aggregated token usage file name.
pub const TOKEN_USAGE_FILE: &str = "token_usage.json";
/// Execution metadata file name.
pub const METADATA_FILE: &str = "execution_metadata.json";
/// Full serialized result file name.
pub const COMPLETE_RESULT_FILE: &str = "complete_execution_result.json";

/// Metadata keys owned by the manager; callers cannot override them.
const RESERVED_METADATA_KEYS: [&str; 2] = ["execution_id", "timestamp"];

/// A freshly created execution folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFolder {
    pub execution_id: String,
    pub path: PathBuf,
}

/// Paths written for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFiles {
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}

/// A persisted execution, as read back from its metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub path: PathBuf,
    pub timestamp: Option<String>,
    pub agent_name: Option<String>,
    pub status: Option<String>,
}

/// `token_usage.json` layout.
#[derive(Debug, Serialize)]
struct TokenUsageFile<'a> {
    total_usage: &'a TokenUsage,
    task_usage: &'a BTreeMap<String, TokenUsage>,
    timestamp: String,
}

/// Writes execution results under a base output directory.
#[derive(Debug, Clone)]
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Open a manager rooted at `base_dir`, creating the directory if missing.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| CrewOutError::io(&base_dir, e))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create `<base_dir>/<folder_name>_<uuid>` under a fresh execution id.
    pub fn create_execution_folder(&self, folder_name: &str) -> Result<ExecutionFolder> {
        let execution_id = Uuid::now_v7().to_string();
        self.create_folder_for(folder_name, &execution_id)
    }

    /// Create the folder for a known execution id.
    ///
    /// The leaf directory must not exist yet: execution folders are never reused.
    fn create_folder_for(&self, folder_name: &str, execution_id: &str) -> Result<ExecutionFolder> {
        std::fs::create_dir_all(&self.base_dir).map_err(|e| CrewOutError::io(&self.base_dir, e))?;

        let path = self
            .base_dir
            .join(naming::execution_folder_name(folder_name, execution_id));
        std::fs::create_dir(&path).map_err(|e| CrewOutError::io(&path, e))?;

        debug!(path = %path.display(), execution_id, "execution folder created");

        Ok(ExecutionFolder {
            execution_id: execution_id.to_string(),
            path,
        })
    }

    /// Write one stage's output as `<stage>_output.json` and `<stage>_output.md`.
    #[instrument(skip(self, folder, output, raw_output), fields(folder = %folder.display()))]
    pub fn save_task_output(
        &self,
        folder: &Path,
        stage: &str,
        output: &StageOutput,
        raw_output: Option<&str>,
    ) -> Result<SavedFiles> {
        let json_path = folder.join(naming::stage_json_file(stage));
        write_json(&json_path, output)?;

        let markdown_path = folder.join(naming::stage_markdown_file(stage));
        let doc = crewout_markdown::render_task_document(stage, output, raw_output, &Utc::now());
        write_new(&markdown_path, doc.as_bytes())?;
        debug!(path = %markdown_path.display(), "wrote Markdown file");

        Ok(SavedFiles {
            json_path,
            markdown_path,
        })
    }

    /// Write `token_usage.json` with the run total and per-stage usage.
    pub fn save_token_usage(
        &self,
        folder: &Path,
        task_usage: &BTreeMap<String, TokenUsage>,
        total_usage: &TokenUsage,
    ) -> Result<PathBuf> {
        let path = folder.join(TOKEN_USAGE_FILE);
        let data = TokenUsageFile {
            total_usage,
            task_usage,
            timestamp: Utc::now().to_rfc3339(),
        };
        write_json(&path, &data)?;
        Ok(path)
    }

    /// Write `execution_metadata.json`: the execution id, a save timestamp,
    /// then every caller field except the reserved keys.
    pub fn save_execution_metadata(
        &self,
        folder: &Path,
        execution_id: &str,
        metadata: &ExecutionMetadata,
    ) -> Result<PathBuf> {
        let mut doc = Map::new();
        doc.insert("execution_id".into(), Value::String(execution_id.to_string()));
        doc.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));

        for (key, value) in metadata.to_fields() {
            if RESERVED_METADATA_KEYS.contains(&key.as_str()) {
                warn!(key = %key, "ignoring caller metadata that would overwrite a reserved key");
                continue;
            }
            doc.insert(key, value);
        }

        let path = folder.join(METADATA_FILE);
        write_json(&path, &doc)?;
        Ok(path)
    }

    /// Write a finished Markdown report verbatim as `<name>_report.md`.
    pub fn save_report(&self, folder: &Path, name: &str, markdown: &str) -> Result<PathBuf> {
        let path = folder.join(naming::report_file(name));
        write_new(&path, markdown.as_bytes())?;
        debug!(path = %path.display(), len = markdown.len(), "wrote report");
        Ok(path)
    }

    /// Persist a whole execution result and return its folder.
    ///
    /// The folder is keyed by the result's own execution id. Each populated
    /// stage slot gets its JSON + Markdown pair; token usage, metadata and
    /// the complete result are always written.
    #[instrument(skip_all, fields(folder_name = %folder_name, execution_id = %result.execution_id))]
    pub fn save_crew_execution_result(
        &self,
        folder_name: &str,
        result: &ExecutionResult,
        raw_outputs: Option<&RawOutputs>,
    ) -> Result<PathBuf> {
        let folder = self.create_folder_for(folder_name, &result.execution_id)?;

        let mut stages_saved = 0usize;
        for (stage, output) in result.stages.populated() {
            let raw = raw_outputs.and_then(|raw| raw.get(stage)).map(String::as_str);
            self.save_task_output(&folder.path, stage, output, raw)?;
            stages_saved += 1;
        }

        self.save_token_usage(&folder.path, &result.task_token_usage, &result.total_token_usage)?;
        self.save_execution_metadata(&folder.path, &result.execution_id, &result.metadata)?;
        write_json(&folder.path.join(COMPLETE_RESULT_FILE), result)?;

        info!(
            path = %folder.path.display(),
            stages_saved,
            "execution result saved"
        );

        Ok(folder.path)
    }

    /// Persisted executions under the base directory, newest first.
    ///
    /// Only folders holding an execution metadata file are listed.
    pub fn list_executions(&self) -> Result<Vec<ExecutionSummary>> {
        let entries =
            std::fs::read_dir(&self.base_dir).map_err(|e| CrewOutError::io(&self.base_dir, e))?;

        let mut summaries = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CrewOutError::io(&self.base_dir, e))?;
            let path = entry.path();
            let metadata_path = path.join(METADATA_FILE);
            if !metadata_path.is_file() {
                continue;
            }

            let content = std::fs::read_to_string(&metadata_path)
                .map_err(|e| CrewOutError::io(&metadata_path, e))?;
            let doc: Value = match serde_json::from_str(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(path = %metadata_path.display(), error = %e, "skipping unreadable metadata");
                    continue;
                }
            };

            let field = |key: &str| doc.get(key).and_then(Value::as_str).map(String::from);
            summaries.push(ExecutionSummary {
                execution_id: field("execution_id")
                    .unwrap_or_else(|| entry.file_name().to_string_lossy().into_owned()),
                timestamp: field("timestamp"),
                agent_name: field("agent_name"),
                status: field("status"),
                path,
            });
        }

        let saved_at = |s: &ExecutionSummary| {
            s.timestamp
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        };
        summaries.sort_by(|a, b| saved_at(b).cmp(&saved_at(a)).then_with(|| a.path.cmp(&b.path)));
        Ok(summaries)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create `path` and write `contents`; an existing file is an error.
fn write_new(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| CrewOutError::io(path, e))?;
    file.write_all(contents).map_err(|e| CrewOutError::io(path, e))
}

/// Write a new JSON file (pretty-printed, two-space indent).
///
/// Values that cannot be serialized are written in their string form.
fn write_json<T: Serialize + fmt::Debug>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(&to_json_value(data))?;
    write_new(path, json.as_bytes())?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
