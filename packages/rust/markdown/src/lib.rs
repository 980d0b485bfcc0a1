//! Markdown rendering for structured stage outputs.
//!
//! Every field of a stage output becomes a `- **Field Title:** value` bullet.
//! [`render_task_document`] wraps the bullets in the per-stage document that
//! is written next to the JSON output.

mod fields;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crewout_shared::StageOutput;

pub use fields::{humanize, render_fields};

/// Render a stage output as top-level Markdown bullets.
pub fn render_stage_output(output: &StageOutput) -> String {
    render_fields(output.fields(), 0)
}

/// Build the complete Markdown document for one stage.
///
/// Layout: title header, generation timestamp, rendered structured output,
/// and a trailing "Raw Output" section when non-empty raw text is given.
#[instrument(skip(output, raw_output), fields(fields = output.fields().len()))]
pub fn render_task_document(
    stage: &str,
    output: &StageOutput,
    raw_output: Option<&str>,
    generated_at: &DateTime<Utc>,
) -> String {
    let mut doc = format!(
        "# {}\n\n**Generated at:** {}\n\n---\n\n## Structured Output\n\n",
        humanize(stage),
        generated_at.to_rfc3339()
    );
    doc.push_str(&render_stage_output(output));

    if let Some(raw) = raw_output.filter(|raw| !raw.is_empty()) {
        doc.push_str("\n\n---\n\n## Raw Output\n\n");
        doc.push_str(raw);
    }

    doc.push('\n');

    debug!(len = doc.len(), "rendered task document");
    doc
}
