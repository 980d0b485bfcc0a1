//! Structured output models for each crew stage.
//!
//! The orchestration runtime validates agent output against these shapes;
//! here they are used to build sample results and to check that a stage
//! output still matches the model it claims to be.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Personal assistant (calendar → email → summary)
// ---------------------------------------------------------------------------

/// A single calendar event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub participants: Option<Vec<String>>,
    #[serde(default)]
    pub agenda: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// meeting, birthday, special event
    #[serde(default)]
    pub event_type: Option<String>,
}

/// Output of the daily calendar task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCalendarOutput {
    pub events: Vec<CalendarEvent>,
    #[serde(default)]
    pub special_events: Option<Vec<CalendarEvent>>,
    #[serde(default)]
    pub todo_list: Option<Vec<String>>,
    pub summary: String,
}

/// A single email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub sender: String,
    pub subject: String,
    pub date_received: String,
    pub content_overview: String,
    /// unread, newsletter, promotional
    #[serde(default)]
    pub email_type: Option<String>,
}

/// Output of the email extraction task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailExtractionOutput {
    pub unread_emails: Vec<Email>,
    pub newsletters: Vec<Email>,
    pub promotional_emails: Vec<Email>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Output of the summary generator task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryGeneratorOutput {
    pub key_meetings: Vec<String>,
    pub important_emails: Vec<String>,
    pub action_items: Vec<String>,
    #[serde(default)]
    pub personal_events: Option<Vec<String>>,
    #[serde(default)]
    pub newsletter_summaries: Option<Vec<String>>,
    #[serde(default)]
    pub google_docs_url: Option<String>,
    pub full_summary: String,
}

// ---------------------------------------------------------------------------
// Job screening
// ---------------------------------------------------------------------------

/// Analysis of the job being screened for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProfiler {
    pub job_title: String,
    pub key_responsibilities: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub preferred_experience: String,
    /// Brief overview of the hiring company.
    pub company_overview: String,
    pub ideal_candidate_profile: String,
}

/// Screening profile of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCandidateProfile {
    pub name: String,
    pub skills: Vec<String>,
    /// Years of relevant experience.
    pub experience_years: u32,
    /// Highest level of education attained.
    pub education: String,
    pub certifications: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    /// Overall fit assessment for the role.
    pub overall_fit: String,
    pub suggested_next_steps: Vec<String>,
}

/// Interview preparation material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewPreparationTips {
    pub common_questions: Vec<String>,
    pub best_practices: Vec<String>,
    pub resources: Vec<String>,
}

/// Final summary of the screening crew: the candidate profile and the
/// interview tips folded into one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewOutputSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub recommendations: Vec<String>,
    pub name: String,
    pub skills: Vec<String>,
    pub experience_years: u32,
    pub education: String,
    pub certifications: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub overall_fit: String,
    pub suggested_next_steps: Vec<String>,
    pub common_questions: Vec<String>,
    pub best_practices: Vec<String>,
    pub resources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Company research
// ---------------------------------------------------------------------------

/// Research data gathered about one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyResearchData {
    pub company_name: String,
    pub tagline: String,
    pub website: String,
    pub industry: String,
    pub employee_count: String,
    pub founded_year: String,
    /// Public, Private, Startup, ...
    pub company_type: String,
    #[serde(default = "revenue_not_available")]
    pub revenue: Option<String>,
    pub latest_news: Vec<String>,
    pub product_summary: String,
    pub competitors: Vec<String>,
    pub technology_stack: Vec<String>,
    /// Current hiring status in Canada.
    pub hiring_status: String,
    /// Available tech job roles in Canada.
    pub tech_job_roles: Vec<String>,
    pub financial_info: String,
    pub key_people: Vec<String>,
    pub funding_acquisitions: String,
    pub domains: Vec<String>,
}

fn revenue_not_available() -> Option<String> {
    Some("Not available".into())
}

/// Final report of the research crew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyResearchReport {
    /// Complete report, already formatted as Markdown.
    pub markdown_report: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_calendar_fields_default() {
        let out: DailyCalendarOutput = serde_json::from_value(json!({
            "events": [{"title": "Standup"}],
            "summary": "one meeting"
        }))
        .expect("deserialize");
        assert_eq!(out.events[0].title, "Standup");
        assert!(out.events[0].participants.is_none());
        assert!(out.special_events.is_none());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = serde_json::from_value::<EmailExtractionOutput>(json!({
            "unread_emails": [],
            "newsletters": []
        }))
        .unwrap_err();
        assert!(err.to_string().contains("promotional_emails"));
    }

    #[test]
    fn company_revenue_defaults_to_not_available() {
        let data: CompanyResearchData = serde_json::from_value(json!({
            "company_name": "HubSpot",
            "tagline": "Grow better",
            "website": "https://hubspot.com",
            "industry": "Software",
            "employee_count": "7000+",
            "founded_year": "2006",
            "company_type": "Public",
            "latest_news": [],
            "product_summary": "CRM platform",
            "competitors": ["Salesforce"],
            "technology_stack": [],
            "hiring_status": "Hiring",
            "tech_job_roles": [],
            "financial_info": "NYSE: HUBS",
            "key_people": [],
            "funding_acquisitions": "IPO 2014",
            "domains": ["hubspot.com"]
        }))
        .expect("deserialize");
        assert_eq!(data.revenue.as_deref(), Some("Not available"));
    }
}
