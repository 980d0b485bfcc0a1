//! File and folder names inside the output tree.

use std::sync::LazyLock;

use regex::Regex;

/// Name used when a component sanitises to nothing.
const UNNAMED: &str = "unnamed";

/// Make a caller-supplied string safe to use as one path component.
///
/// Runs of characters outside `[A-Za-z0-9._-]` collapse to a single `_`,
/// so separators and spaces never leak into the layout.
pub(crate) fn sanitize_component(raw: &str) -> String {
    static UNSAFE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

    let cleaned = UNSAFE_RE.replace_all(raw.trim(), "_");
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        UNNAMED.to_string()
    } else {
        cleaned.into_owned()
    }
}

/// `{folder_name}_{execution_id}`
pub(crate) fn execution_folder_name(folder_name: &str, execution_id: &str) -> String {
    format!(
        "{}_{}",
        sanitize_component(folder_name),
        sanitize_component(execution_id)
    )
}

/// `{stage}_output.json`
pub(crate) fn stage_json_file(stage: &str) -> String {
    format!("{}_output.json", sanitize_component(stage))
}

/// `{stage}_output.md`
pub(crate) fn stage_markdown_file(stage: &str) -> String {
    format!("{}_output.md", sanitize_component(stage))
}

/// `{name}_report.md`
pub(crate) fn report_file(name: &str) -> String {
    format!("{}_report.md", sanitize_component(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_names_pass_through() {
        assert_eq!(sanitize_component("daily_calendar"), "daily_calendar");
        assert_eq!(execution_folder_name("test", "abc"), "test_abc");
        assert_eq!(stage_json_file("daily_calendar"), "daily_calendar_output.json");
        assert_eq!(stage_markdown_file("daily_calendar"), "daily_calendar_output.md");
    }

    #[test]
    fn separators_and_spaces_are_replaced() {
        assert_eq!(sanitize_component("HubSpot hubspot.com"), "HubSpot_hubspot.com");
        assert_eq!(sanitize_component("../etc/passwd"), ".._etc_passwd");
        assert_eq!(report_file("a / b"), "a_b_report.md");
    }

    #[test]
    fn empty_or_dot_only_names_get_placeholder() {
        assert_eq!(sanitize_component(""), UNNAMED);
        assert_eq!(sanitize_component("  "), UNNAMED);
        assert_eq!(sanitize_component(".."), UNNAMED);
    }
}
