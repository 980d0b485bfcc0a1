//! Pipeline catalog and result assembly.
//!
//! A [`Pipeline`] knows which tasks feed which result slot. [`assemble`]
//! turns an [`Extraction`] (keyed by task name) into an [`ExecutionResult`]
//! keyed by slot.

use std::fmt;
use std::str::FromStr;

use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crewout_shared::{
    CrewOutError, ExecutionMetadata, ExecutionResult, ExecutionStatus, RawOutputs, Result,
    StageOutput, StageSlots,
};

use crate::extractor::Extraction;
use crate::models::{
    CompanyResearchData, CompanyResearchReport, CrewOutputSummary, DailyCalendarOutput,
    EmailExtractionOutput, InterviewPreparationTips, JobCandidateProfile, JobProfiler,
    SummaryGeneratorOutput,
};

/// One result slot and the task names that fill it.
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub key: &'static str,
    /// Accepted task names, in priority order.
    pub task_names: &'static [&'static str],
    validate: fn(&StageOutput) -> Result<()>,
}

impl StageSpec {
    /// Check `output` against this stage's typed model.
    pub fn validate(&self, output: &StageOutput) -> Result<()> {
        (self.validate)(output)
    }

    fn accepts(&self, task: &str) -> bool {
        self.task_names.contains(&task)
    }
}

fn check<T: DeserializeOwned>(output: &StageOutput) -> Result<()> {
    output.to_model::<T>().map(|_| ())
}

/// A Markdown report carried inside one field of a stage output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSpec {
    pub stage: &'static str,
    pub field: &'static str,
}

const DAILY_ASSISTANT_STAGES: &[StageSpec] = &[
    StageSpec {
        key: "daily_calendar",
        task_names: &["daily_calendar_tasks", "daily_calendar"],
        validate: check::<DailyCalendarOutput>,
    },
    StageSpec {
        key: "email_extraction",
        task_names: &["email_extraction_task", "email_extraction"],
        validate: check::<EmailExtractionOutput>,
    },
    StageSpec {
        key: "summary_generator",
        task_names: &["summary_generator_task", "summary_generator"],
        validate: check::<SummaryGeneratorOutput>,
    },
];

const JOB_SCREENER_STAGES: &[StageSpec] = &[
    StageSpec {
        key: "job_profile",
        task_names: &["job_profile_task", "job_profiler_task"],
        validate: check::<JobProfiler>,
    },
    StageSpec {
        key: "job_screening",
        task_names: &["job_screening_task"],
        validate: check::<JobCandidateProfile>,
    },
    StageSpec {
        key: "interview_prep",
        task_names: &["interview_prep_task", "job_interview_prep_task"],
        validate: check::<InterviewPreparationTips>,
    },
    StageSpec {
        key: "final_summary",
        task_names: &["final_summary_task"],
        validate: check::<CrewOutputSummary>,
    },
];

const COMPANY_RESEARCH_STAGES: &[StageSpec] = &[
    StageSpec {
        key: "company_research",
        task_names: &["research_task", "company_research_task"],
        validate: check::<CompanyResearchData>,
    },
    StageSpec {
        key: "report",
        task_names: &["report_task", "report_generation_task"],
        validate: check::<CompanyResearchReport>,
    },
];

/// The crews whose results can be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    DailyAssistant,
    JobScreener,
    CompanyResearch,
}

impl Pipeline {
    pub const ALL: [Pipeline; 3] = [
        Pipeline::DailyAssistant,
        Pipeline::JobScreener,
        Pipeline::CompanyResearch,
    ];

    /// Default folder name prefix for persisted runs.
    pub fn folder_name(self) -> &'static str {
        match self {
            Pipeline::DailyAssistant => "daily_assistant",
            Pipeline::JobScreener => "job_screener",
            Pipeline::CompanyResearch => "company_research",
        }
    }

    pub fn agent_name(self) -> &'static str {
        match self {
            Pipeline::DailyAssistant => "personal_assistant",
            Pipeline::JobScreener => "job_recruiter",
            Pipeline::CompanyResearch => "company_researcher",
        }
    }

    /// Result slots, in output order.
    pub fn stages(self) -> &'static [StageSpec] {
        match self {
            Pipeline::DailyAssistant => DAILY_ASSISTANT_STAGES,
            Pipeline::JobScreener => JOB_SCREENER_STAGES,
            Pipeline::CompanyResearch => COMPANY_RESEARCH_STAGES,
        }
    }

    pub fn report(self) -> Option<ReportSpec> {
        match self {
            Pipeline::CompanyResearch => Some(ReportSpec {
                stage: "report",
                field: "markdown_report",
            }),
            _ => None,
        }
    }

    /// The slot a task feeds, if the task is part of this pipeline.
    pub fn stage_for_task(self, task: &str) -> Option<&'static StageSpec> {
        self.stages().iter().find(|spec| spec.accepts(task))
    }

    fn cli_name(self) -> &'static str {
        match self {
            Pipeline::DailyAssistant => "daily-assistant",
            Pipeline::JobScreener => "job-screener",
            Pipeline::CompanyResearch => "company-research",
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for Pipeline {
    type Err = CrewOutError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('_', "-").to_ascii_lowercase();
        Pipeline::ALL
            .into_iter()
            .find(|p| p.cli_name() == wanted)
            .ok_or_else(|| {
                CrewOutError::validation(format!(
                    "unknown pipeline '{s}' (expected daily-assistant, job-screener or company-research)"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Per-run values that do not come from the crew output itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Date the crew ran for, already formatted.
    pub current_date: String,
    /// Folder name prefix; the pipeline default when `None`.
    pub folder_name: Option<String>,
}

impl RunContext {
    pub fn new(current_date: impl Into<String>) -> Self {
        Self {
            current_date: current_date.into(),
            folder_name: None,
        }
    }

    /// Context dated today (local time) using a strftime `date_format`.
    pub fn today(date_format: &str) -> Result<Self> {
        let items: Vec<Item<'_>> = StrftimeItems::new(date_format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(CrewOutError::config(format!(
                "invalid date_format '{date_format}'"
            )));
        }
        let date = Local::now().format_with_items(items.into_iter()).to_string();
        Ok(Self::new(date))
    }

    pub fn with_folder_name(mut self, folder_name: impl Into<String>) -> Self {
        self.folder_name = Some(folder_name.into());
        self
    }
}

/// An execution result plus raw outputs, both keyed by slot.
#[derive(Debug, Clone)]
pub struct AssembledRun {
    pub result: ExecutionResult,
    pub raw_outputs: RawOutputs,
}

/// Build the execution result for `pipeline` from an extraction.
///
/// Each slot is filled from its highest-priority task that produced
/// structured output, whatever order the tasks ran in. Tasks the pipeline
/// does not know are appended as extra slots under their task name, or
/// `{task}_extra` when that name is already a slot. Typed validation
/// failures are logged and the output is kept.
#[instrument(skip_all, fields(pipeline = %pipeline))]
pub fn assemble(pipeline: Pipeline, extraction: Extraction, context: &RunContext) -> AssembledRun {
    let Extraction {
        stage_names,
        mut structured_outputs,
        mut raw_outputs,
        total_token_usage,
        mut task_token_usage,
        final_output,
    } = extraction;

    let mut result = ExecutionResult::new();
    for spec in pipeline.stages() {
        result.stages.declare(spec.key);
    }

    let tasks_completed: Vec<String> = stage_names
        .iter()
        .filter(|task| structured_outputs.contains_key(task.as_str()))
        .cloned()
        .collect();

    let mut slot_raw = RawOutputs::new();

    for spec in pipeline.stages() {
        for &task in spec.task_names {
            if let Some(output) = structured_outputs.remove(task) {
                if result.stages.get(spec.key).is_some() {
                    debug!(task, stage = spec.key, "slot already filled by a preferred task");
                } else {
                    if let Err(e) = spec.validate(&output) {
                        warn!(task, stage = spec.key, error = %e, "stage output does not match its model");
                    }
                    result.stages.insert(spec.key, Some(output));
                }
            }
            if let Some(raw) = raw_outputs.remove(task) {
                slot_raw.entry(spec.key.to_string()).or_insert(raw);
            }
            if let Some(usage) = task_token_usage.remove(task) {
                result.task_token_usage.entry(spec.key.to_string()).or_insert(usage);
            }
        }
    }

    for task in &stage_names {
        if pipeline.stage_for_task(task).is_some() {
            continue;
        }
        let output = structured_outputs.remove(task);
        let raw = raw_outputs.remove(task);
        let usage = task_token_usage.remove(task);
        if output.is_none() && raw.is_none() && usage.is_none() {
            continue;
        }

        let key = extra_slot_name(&result.stages, task);
        if key != *task {
            warn!(task = %task, slot = %key, "task name is already a slot, keeping it under another name");
        }
        if let Some(output) = output {
            debug!(task = %task, slot = %key, "task not part of pipeline, keeping as extra stage");
            result.stages.insert(key.clone(), Some(output));
        }
        if let Some(raw) = raw {
            slot_raw.entry(key.clone()).or_insert(raw);
        }
        if let Some(usage) = usage {
            result.task_token_usage.entry(key).or_insert(usage);
        }
    }

    let declared = pipeline.stages().len();
    let populated = pipeline
        .stages()
        .iter()
        .filter(|spec| result.stages.get(spec.key).is_some())
        .count();
    let status = if populated == declared {
        ExecutionStatus::Success
    } else if populated > 0 {
        ExecutionStatus::Partial
    } else {
        ExecutionStatus::Failed
    };

    result.total_token_usage = total_token_usage;
    result.metadata = ExecutionMetadata {
        current_date: Some(context.current_date.clone()),
        agent_name: Some(pipeline.agent_name().to_string()),
        status: Some(status),
        error_message: (status == ExecutionStatus::Failed)
            .then(|| "no stage produced structured output".to_string()),
        final_output,
        tasks_completed,
        ..ExecutionMetadata::default()
    };

    info!(populated, declared, status = %status, "assembled execution result");

    AssembledRun {
        result,
        raw_outputs: slot_raw,
    }
}

/// `task` if no slot uses it yet, else `{task}_extra`, `{task}_extra_2`, ...
fn extra_slot_name(slots: &StageSlots, task: &str) -> String {
    let taken = |name: &str| slots.iter().any(|slot| slot.name == name);
    if !taken(task) {
        return task.to_string();
    }

    let mut name = format!("{task}_extra");
    let mut n = 2;
    while taken(&name) {
        name = format!("{task}_extra_{n}");
        n += 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewout_shared::{ExtractionConfig, TokenUsage};
    use serde_json::json;

    use crate::extractor::{CrewOutputDocument, extract};

    fn extraction(value: serde_json::Value) -> Extraction {
        let doc: CrewOutputDocument = serde_json::from_value(value).expect("document");
        extract(&doc, &ExtractionConfig::default())
    }

    fn calendar() -> serde_json::Value {
        json!({"events": [{"title": "Standup"}], "summary": "one meeting"})
    }

    #[test]
    fn pipeline_names_parse() {
        assert_eq!("daily-assistant".parse::<Pipeline>().unwrap(), Pipeline::DailyAssistant);
        assert_eq!("job_screener".parse::<Pipeline>().unwrap(), Pipeline::JobScreener);
        assert_eq!(" Company-Research ".parse::<Pipeline>().unwrap(), Pipeline::CompanyResearch);
        assert!("weather".parse::<Pipeline>().is_err());
        for p in Pipeline::ALL {
            assert_eq!(p.to_string().parse::<Pipeline>().unwrap(), p);
        }
    }

    #[test]
    fn tasks_map_to_slots() {
        let p = Pipeline::DailyAssistant;
        assert_eq!(p.stage_for_task("daily_calendar_tasks").unwrap().key, "daily_calendar");
        assert_eq!(p.stage_for_task("email_extraction").unwrap().key, "email_extraction");
        assert!(p.stage_for_task("research_task").is_none());
        assert_eq!(
            Pipeline::CompanyResearch.report(),
            Some(ReportSpec { stage: "report", field: "markdown_report" })
        );
    }

    #[test]
    fn partial_run_keeps_empty_slots_and_rekeys_raw() {
        let ex = extraction(json!({
            "raw": "done",
            "tasks_output": [{
                "name": "daily_calendar_tasks",
                "raw": "calendar text",
                "pydantic": calendar(),
                "token_usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
            }, {
                "name": "email_extraction_task",
                "raw": "no structured form"
            }],
            "token_usage": {"prompt_tokens": 30, "completion_tokens": 40, "total_tokens": 70}
        }));

        let run = assemble(Pipeline::DailyAssistant, ex, &RunContext::new("2025-11-25"));
        let result = &run.result;

        let slots: Vec<(&str, bool)> = result
            .stages
            .iter()
            .map(|s| (s.name.as_str(), s.output.is_some()))
            .collect();
        assert_eq!(
            slots,
            vec![
                ("daily_calendar", true),
                ("email_extraction", false),
                ("summary_generator", false)
            ]
        );

        assert_eq!(run.raw_outputs["daily_calendar"], "calendar text");
        assert_eq!(run.raw_outputs["email_extraction"], "no structured form");
        assert_eq!(result.task_token_usage["daily_calendar"].total_tokens, 7);
        assert_eq!(result.total_token_usage.total_tokens, 70);

        let meta = &result.metadata;
        assert_eq!(meta.status, Some(ExecutionStatus::Partial));
        assert_eq!(meta.agent_name.as_deref(), Some("personal_assistant"));
        assert_eq!(meta.current_date.as_deref(), Some("2025-11-25"));
        assert_eq!(meta.final_output.as_deref(), Some("done"));
        assert_eq!(meta.tasks_completed, vec!["daily_calendar_tasks"]);
        assert!(meta.error_message.is_none());
    }

    #[test]
    fn all_slots_filled_is_success() {
        let ex = extraction(json!({
            "tasks_output": [
                {"name": "research_task", "pydantic": {"company_name": "HubSpot"}},
                {"name": "report_task", "pydantic": {"markdown_report": "# HubSpot"}}
            ]
        }));

        let run = assemble(Pipeline::CompanyResearch, ex, &RunContext::new("2025-11-25"));
        assert_eq!(run.result.metadata.status, Some(ExecutionStatus::Success));
        // Incomplete research data still gets persisted.
        assert_eq!(
            run.result.stages.get("company_research").and_then(|o| o.get("company_name")),
            Some(&json!("HubSpot"))
        );
    }

    #[test]
    fn nothing_structured_is_failed() {
        let ex = extraction(json!({"tasks_output": [], "token_usage": null}));
        let run = assemble(Pipeline::JobScreener, ex, &RunContext::new("2025-11-25"));

        assert_eq!(run.result.metadata.status, Some(ExecutionStatus::Failed));
        assert!(run.result.metadata.error_message.is_some());
        assert_eq!(run.result.stages.len(), 4);
        assert_eq!(run.result.stages.populated().count(), 0);
        assert_eq!(run.result.total_token_usage, TokenUsage::zeroed(crewout_shared::DEFAULT_MODEL_NAME));
    }

    #[test]
    fn unmapped_tasks_become_extra_slots() {
        let ex = extraction(json!({
            "tasks_output": [
                {"name": "daily_calendar", "pydantic": calendar()},
                {"name": "weather_task", "raw": "sunny", "pydantic": {"forecast": "sunny"}},
                {"pydantic": {"k": 1}}
            ]
        }));

        let run = assemble(Pipeline::DailyAssistant, ex, &RunContext::new("d"));
        let names: Vec<&str> = run.result.stages.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(
            names,
            vec!["daily_calendar", "email_extraction", "summary_generator", "weather_task", "unknown"]
        );
        assert_eq!(run.raw_outputs["weather_task"], "sunny");
    }

    #[test]
    fn preferred_alias_wins_a_slot() {
        let ex = extraction(json!({
            "tasks_output": [
                {"name": "daily_calendar_tasks", "pydantic": {"summary": "first", "events": []}},
                {"name": "daily_calendar", "pydantic": {"summary": "second", "events": []}}
            ]
        }));

        let run = assemble(Pipeline::DailyAssistant, ex, &RunContext::new("d"));
        assert_eq!(
            run.result.stages.get("daily_calendar").and_then(|o| o.get("summary")),
            Some(&json!("first"))
        );
        assert_eq!(run.result.metadata.tasks_completed.len(), 2);
    }

    #[test]
    fn alias_priority_ignores_run_order() {
        let ex = extraction(json!({
            "tasks_output": [
                {
                    "name": "daily_calendar",
                    "raw": "fallback text",
                    "pydantic": {"summary": "fallback alias", "events": []}
                },
                {
                    "name": "daily_calendar_tasks",
                    "raw": "preferred text",
                    "pydantic": {"summary": "preferred alias", "events": []}
                }
            ]
        }));

        let run = assemble(Pipeline::DailyAssistant, ex, &RunContext::new("d"));
        assert_eq!(
            run.result.stages.get("daily_calendar").and_then(|o| o.get("summary")),
            Some(&json!("preferred alias"))
        );
        assert_eq!(run.raw_outputs["daily_calendar"], "preferred text");
        assert_eq!(
            run.result.metadata.tasks_completed,
            vec!["daily_calendar", "daily_calendar_tasks"]
        );
    }

    #[test]
    fn unmapped_task_named_like_a_slot_stays_out_of_it() {
        let ex = extraction(json!({
            "tasks_output": [
                {"name": "research_task", "pydantic": {"company_name": "HubSpot"}},
                {"name": "report", "raw": "stray", "pydantic": {"markdown_report": "# Not validated"}}
            ]
        }));

        let run = assemble(Pipeline::CompanyResearch, ex, &RunContext::new("d"));
        let result = &run.result;

        assert!(result.stages.get("report").is_none());
        assert_eq!(
            result.stages.get("report_extra").and_then(|o| o.get("markdown_report")),
            Some(&json!("# Not validated"))
        );
        assert_eq!(run.raw_outputs["report_extra"], "stray");
        assert!(!run.raw_outputs.contains_key("report"));
        assert_eq!(result.metadata.status, Some(ExecutionStatus::Partial));
    }

    #[test]
    fn extra_slot_names_skip_taken_ones() {
        let mut slots = StageSlots::new();
        slots.declare("report");
        assert_eq!(extra_slot_name(&slots, "weather"), "weather");
        assert_eq!(extra_slot_name(&slots, "report"), "report_extra");
        slots.declare("report_extra");
        assert_eq!(extra_slot_name(&slots, "report"), "report_extra_2");
    }

    #[test]
    fn validation_checks_typed_model() {
        let spec = Pipeline::DailyAssistant.stage_for_task("daily_calendar").unwrap();
        assert!(spec.validate(&StageOutput::from_model(&calendar())).is_ok());
        assert!(spec.validate(&StageOutput::from_model(&json!({"events": []}))).is_err());
    }

    #[test]
    fn today_rejects_bad_format() {
        let ctx = RunContext::today("%Y-%m-%d").expect("valid format");
        assert_eq!(ctx.current_date.len(), 10);
        assert!(ctx.folder_name.is_none());
        assert!(RunContext::today("%Q").is_err());
    }
}
