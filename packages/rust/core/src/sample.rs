//! A ready-made daily assistant result, for trying out the output layout
//! without running a crew.

use std::collections::BTreeMap;

use crewout_shared::{
    ExecutionMetadata, ExecutionResult, ExecutionStatus, RawOutputs, StageOutput, TokenUsage,
};

use crate::models::{
    CalendarEvent, DailyCalendarOutput, Email, EmailExtractionOutput, SummaryGeneratorOutput,
};
use crate::pipeline::Pipeline;

/// One standup, one unread email and a summary, 2300 tokens in total.
pub fn sample_execution_result() -> ExecutionResult {
    let calendar = DailyCalendarOutput {
        events: vec![CalendarEvent {
            title: "Team Standup".into(),
            date_time: Some("2025-11-25 10:00 AM".into()),
            participants: Some(vec!["John".into(), "Sarah".into(), "Mike".into()]),
            agenda: Some("Daily sync".into()),
            location: Some("Zoom".into()),
            event_type: Some("meeting".into()),
        }],
        special_events: Some(vec![]),
        todo_list: Some(vec!["Review PR".into(), "Update documentation".into()]),
        summary: "One meeting scheduled for today".into(),
    };

    let email = EmailExtractionOutput {
        unread_emails: vec![Email {
            sender: "boss@company.com".into(),
            subject: "Project Update".into(),
            date_received: "2025-11-25".into(),
            content_overview: "Need status update on the project".into(),
            email_type: Some("unread".into()),
        }],
        newsletters: vec![],
        promotional_emails: vec![],
        summary: Some("1 unread email requiring attention".into()),
    };

    let summary = SummaryGeneratorOutput {
        key_meetings: vec!["Team Standup at 10:00 AM".into()],
        important_emails: vec!["Project Update from boss".into()],
        action_items: vec!["Provide project status update".into(), "Review PR".into()],
        personal_events: Some(vec![]),
        newsletter_summaries: Some(vec![]),
        google_docs_url: None,
        full_summary: "Today you have 1 meeting and 1 important email to address".into(),
    };

    let task_token_usage = BTreeMap::from([
        ("daily_calendar".to_string(), TokenUsage::from_counts(500, 250, None)),
        ("email_extraction".to_string(), TokenUsage::from_counts(500, 300, None)),
        ("summary_generator".to_string(), TokenUsage::from_counts(500, 250, None)),
    ]);

    let pipeline = Pipeline::DailyAssistant;
    let mut result = ExecutionResult::new()
        .with_stage("daily_calendar", StageOutput::from_model(&calendar))
        .with_stage("email_extraction", StageOutput::from_model(&email))
        .with_stage("summary_generator", StageOutput::from_model(&summary));

    result.total_token_usage = TokenUsage::from_counts(1500, 800, Some("claude-sonnet-4-5".into()));
    result.task_token_usage = task_token_usage;
    result.metadata = ExecutionMetadata {
        current_date: Some("2025-11-25".into()),
        agent_name: Some(pipeline.agent_name().into()),
        status: Some(ExecutionStatus::Success),
        ..ExecutionMetadata::default()
    };
    result
}

/// Raw agent text to go with [`sample_execution_result`].
pub fn sample_raw_outputs() -> RawOutputs {
    RawOutputs::from([
        (
            "daily_calendar".to_string(),
            "Team Standup at 10:00 AM on Zoom with John, Sarah and Mike.".to_string(),
        ),
        (
            "email_extraction".to_string(),
            "1 unread email from boss@company.com: Project Update.".to_string(),
        ),
    ])
}
