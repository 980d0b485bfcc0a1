//! Recursive field → bullet rendering.
//!
//! Top-level fields recurse into sequences and mappings. Inside a mapping,
//! nested sequences and mappings are shown as pretty-printed JSON.

use serde_json::{Map, Value};

/// Indentation unit per nesting level.
const INDENT: &str = "  ";

/// Render a field mapping as Markdown bullets at `indent` levels deep.
pub fn render_fields(fields: &Map<String, Value>, indent: usize) -> String {
    let pad = INDENT.repeat(indent);
    let mut lines = Vec::new();

    for (key, value) in fields {
        let title = humanize(key);

        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    continue;
                }
                lines.push(format!("{pad}- **{title}:**"));
                for item in items {
                    let text = match item {
                        Value::Object(record) => {
                            render_record(record, indent + 2).trim_start().to_string()
                        }
                        other => scalar_text(other),
                    };
                    lines.push(format!("{pad}{INDENT}- {text}"));
                }
            }
            Value::Object(map) => {
                if map.is_empty() {
                    continue;
                }
                lines.push(format!("{pad}- **{title}:**"));
                let block = render_record(map, indent + 1);
                if !block.is_empty() {
                    lines.push(block);
                }
            }
            Value::Null => {}
            other => lines.push(format!("{pad}- **{title}:** {}", scalar_text(other))),
        }
    }

    lines.join("\n")
}

/// Render one nested record. Deeper structure is shown as JSON text.
fn render_record(record: &Map<String, Value>, indent: usize) -> String {
    let pad = INDENT.repeat(indent);
    let mut lines = Vec::new();

    for (key, value) in record {
        let title = humanize(key);

        match value {
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                lines.push(format!("{pad}- **{title}:** {json}"));
            }
            Value::Null => {}
            other => lines.push(format!("{pad}- **{title}:** {}", scalar_text(other))),
        }
    }

    lines.join("\n")
}

/// Strings render verbatim; everything else as its JSON text.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Display form of a field key: underscores become spaces, then each
/// alphabetic run is title-cased (`google_docs_url` → `Google Docs Url`).
pub fn humanize(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut in_word = false;

    for c in key.chars() {
        if c == '_' {
            out.push(' ');
            in_word = false;
        } else if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn humanize_keys() {
        assert_eq!(humanize("summary"), "Summary");
        assert_eq!(humanize("date_time"), "Date Time");
        assert_eq!(humanize("google_docs_url"), "Google Docs Url");
        assert_eq!(humanize("URL_path"), "Url Path");
        assert_eq!(humanize("top3_items"), "Top3 Items");
        assert_eq!(humanize("abc1def"), "Abc1Def");
    }

    #[test]
    fn scalar_fields_render_as_bullets() {
        let out = render_fields(
            &fields(json!({"summary": "one meeting", "experience_years": 4, "remote": true})),
            0,
        );
        assert_eq!(
            out,
            "- **Summary:** one meeting\n- **Experience Years:** 4\n- **Remote:** true"
        );
    }

    #[test]
    fn empty_and_null_fields_are_omitted() {
        let out = render_fields(
            &fields(json!({
                "special_events": [],
                "extra": {},
                "agenda": null,
                "todo_list": []
            })),
            0,
        );
        assert!(out.is_empty());
        assert!(!out.contains("- **"));
    }

    #[test]
    fn string_list_renders_sub_bullets() {
        let out = render_fields(&fields(json!({"todo_list": ["Review PR", "Update docs"]})), 0);
        assert_eq!(out, "- **Todo List:**\n  - Review PR\n  - Update docs");
    }

    #[test]
    fn record_list_recurses_inline() {
        let out = render_fields(
            &fields(json!({
                "events": [{
                    "title": "Team Standup",
                    "date_time": "2025-11-25 10:00 AM",
                    "participants": ["John", "Sarah"],
                    "agenda": null
                }]
            })),
            0,
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "- **Events:**");
        assert_eq!(lines[1], "  - - **Title:** Team Standup");
        assert_eq!(lines[2], "    - **Date Time:** 2025-11-25 10:00 AM");
        assert_eq!(lines[3], "    - **Participants:** [");
        assert!(out.contains("\"Sarah\""));
        assert!(!out.contains("Agenda"));
    }

    #[test]
    fn mapping_renders_nested_block_with_json_for_deeper_values() {
        let out = render_fields(
            &fields(json!({
                "company": {
                    "name": "Acme",
                    "domains": ["acme.com"],
                    "funding": {}
                }
            })),
            1,
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "  - **Company:**");
        assert_eq!(lines[1], "    - **Name:** Acme");
        assert_eq!(lines[2], "    - **Domains:** [");
        assert!(out.contains("    - **Funding:** {}"));
    }

    #[test]
    fn scalar_list_items_that_are_lists_use_json_text() {
        let out = render_fields(&fields(json!({"matrix": [[1, 2], "x"]})), 0);
        assert_eq!(out, "- **Matrix:**\n  - [1,2]\n  - x");
    }
}
