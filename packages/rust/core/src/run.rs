//! End-to-end persistence: crew output → extraction → result → disk.

use std::path::PathBuf;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, instrument};

use crewout_shared::{ExecutionStatus, ExtractionConfig, Result};
use crewout_storage::StorageManager;

use crate::extractor::{CrewRunOutput, extract};
use crate::pipeline::{Pipeline, RunContext, assemble};

/// What `persist_run` wrote.
#[derive(Debug, Clone)]
pub struct PersistedRun {
    pub folder: PathBuf,
    pub execution_id: String,
    pub status: ExecutionStatus,
    /// Slots that were written, in slot order.
    pub stages_saved: Vec<String>,
    pub report_path: Option<PathBuf>,
    pub elapsed: std::time::Duration,
}

/// Extract, assemble and persist one crew run.
///
/// When the pipeline carries a Markdown report, it is also written as
/// `{folder_name}_report.md` inside the execution folder.
#[instrument(skip_all, fields(pipeline = %pipeline))]
pub fn persist_run<R: CrewRunOutput>(
    storage: &StorageManager,
    pipeline: Pipeline,
    run: &R,
    config: &ExtractionConfig,
    context: &RunContext,
) -> Result<PersistedRun> {
    let start = Instant::now();

    let extraction = extract(run, config);
    let assembled = assemble(pipeline, extraction, context);
    let result = &assembled.result;

    let folder_name = context
        .folder_name
        .as_deref()
        .unwrap_or(pipeline.folder_name());
    let folder =
        storage.save_crew_execution_result(folder_name, result, Some(&assembled.raw_outputs))?;

    let report_path = match pipeline.report() {
        Some(report) => result
            .stages
            .get(report.stage)
            .and_then(|output| output.get(report.field))
            .and_then(Value::as_str)
            .map(|markdown| storage.save_report(&folder, folder_name, markdown))
            .transpose()?,
        None => None,
    };

    let stages_saved: Vec<String> = result
        .stages
        .populated()
        .map(|(name, _)| name.to_string())
        .collect();
    let status = result.metadata.status.unwrap_or(ExecutionStatus::Failed);
    let elapsed = start.elapsed();

    info!(
        folder = %folder.display(),
        stages = stages_saved.len(),
        status = %status,
        elapsed_ms = elapsed.as_millis() as u64,
        "run persisted"
    );

    Ok(PersistedRun {
        folder,
        execution_id: result.execution_id.clone(),
        status,
        stages_saved,
        report_path,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewout_storage::{COMPLETE_RESULT_FILE, METADATA_FILE, TOKEN_USAGE_FILE};
    use uuid::Uuid;

    use crate::extractor::CrewOutputDocument;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("crewout-core-run-test-{}", Uuid::now_v7()))
    }

    fn read_json(path: &std::path::Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn fixture() -> CrewOutputDocument {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../../fixtures/json/crew_output.fixture.json");
        CrewOutputDocument::from_path(std::path::Path::new(path)).expect("fixture")
    }

    #[test]
    fn persists_fixture_run() {
        let tmp = temp_dir();
        let storage = StorageManager::new(&tmp).unwrap();
        let ctx = RunContext::new("2025-11-25");

        let saved = persist_run(
            &storage,
            Pipeline::DailyAssistant,
            &fixture(),
            &ExtractionConfig::default(),
            &ctx,
        )
        .unwrap();

        assert_eq!(saved.status, ExecutionStatus::Success);
        assert_eq!(
            saved.stages_saved,
            vec!["daily_calendar", "email_extraction", "summary_generator"]
        );
        assert!(saved.report_path.is_none());

        let folder_name = saved.folder.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(folder_name, format!("daily_assistant_{}", saved.execution_id));

        for file in [TOKEN_USAGE_FILE, METADATA_FILE, COMPLETE_RESULT_FILE] {
            assert!(saved.folder.join(file).is_file(), "{file} missing");
        }

        let md = std::fs::read_to_string(saved.folder.join("daily_calendar_output.md")).unwrap();
        assert!(md.starts_with("# Daily Calendar"));
        assert!(md.contains("## Raw Output"));

        let usage = read_json(&saved.folder.join(TOKEN_USAGE_FILE));
        assert_eq!(usage["total_usage"]["total_tokens"], 2300);
        assert!(usage["task_usage"]["email_extraction"].is_object());

        let meta = read_json(&saved.folder.join(METADATA_FILE));
        assert_eq!(meta["execution_id"], saved.execution_id.as_str());
        assert_eq!(meta["agent_name"], "personal_assistant");
        assert_eq!(meta["status"], "success");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn company_report_written_under_folder_name() {
        let tmp = temp_dir();
        let storage = StorageManager::new(&tmp).unwrap();
        let run: CrewOutputDocument = serde_json::from_value(serde_json::json!({
            "tasks_output": [
                {"name": "research_task", "pydantic": {"company_name": "HubSpot"}},
                {"name": "report_task", "pydantic": {"markdown_report": "# HubSpot\n\nCRM."}}
            ]
        }))
        .unwrap();
        let ctx = RunContext::new("2025-11-25").with_folder_name("HubSpot");

        let saved = persist_run(
            &storage,
            Pipeline::CompanyResearch,
            &run,
            &ExtractionConfig::default(),
            &ctx,
        )
        .unwrap();

        let report = saved.report_path.expect("report written");
        assert_eq!(report.file_name().unwrap(), "HubSpot_report.md");
        assert_eq!(std::fs::read_to_string(&report).unwrap(), "# HubSpot\n\nCRM.");
        assert!(saved.folder.file_name().unwrap().to_string_lossy().starts_with("HubSpot_"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_run_still_writes_bookkeeping_files() {
        let tmp = temp_dir();
        let storage = StorageManager::new(&tmp).unwrap();

        let saved = persist_run(
            &storage,
            Pipeline::JobScreener,
            &CrewOutputDocument::default(),
            &ExtractionConfig::default(),
            &RunContext::new("2025-11-25"),
        )
        .unwrap();

        assert_eq!(saved.status, ExecutionStatus::Failed);
        assert!(saved.stages_saved.is_empty());
        let count = std::fs::read_dir(&saved.folder).unwrap().count();
        assert_eq!(count, 3);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
