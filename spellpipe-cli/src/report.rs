// Report rendering for the command line
//
// Text output mirrors the classic spell check listing; JSON output is the
// task reports as serialized by serde.

use anyhow::Result;
use spellpipe_core::{SpellResult, TaskReport};
use std::fmt::Write;

const RULE: &str = "--------------------------------------------------------------------------------";

pub const FAILED_BANNER: &str = "!!!Spelling check failed!!!";
pub const PASSED_BANNER: &str = "Spelling check passed :)";

pub fn any_failure(reports: &[TaskReport]) -> bool {
    reports.iter().any(TaskReport::is_failure)
}

fn render_result(out: &mut String, result: &SpellResult) {
    if let Some(error) = &result.error {
        let _ = writeln!(out, "ERROR: {} -- {}", result.context, error);
        return;
    }
    if result.words.is_empty() {
        return;
    }

    let _ = writeln!(out, "Misspelled words:");
    let _ = writeln!(out, "<{}> {}", result.category, result.context);
    let _ = writeln!(out, "{RULE}");
    for word in &result.words {
        let _ = writeln!(out, "{word}");
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
}

pub fn render_text(reports: &[TaskReport]) -> String {
    let mut out = String::new();
    for report in reports {
        for result in &report.results {
            render_result(&mut out, result);
        }
    }
    out.push_str(if any_failure(reports) {
        FAILED_BANNER
    } else {
        PASSED_BANNER
    });
    out.push('\n');
    out
}

pub fn render_json(reports: &[TaskReport]) -> Result<String> {
    Ok(serde_json::to_string_pretty(reports)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports() -> Vec<TaskReport> {
        vec![TaskReport {
            name: "docs".to_string(),
            results: vec![
                SpellResult::new(vec!["begn".into(), "helo".into()], "readme.txt", "text"),
                SpellResult::new(Vec::new(), "clean.txt", "text"),
                SpellResult::failed("broken.txt", "", "Failed to read broken.txt"),
            ],
        }]
    }

    #[test]
    fn test_text_report() {
        let text = render_text(&reports());
        assert!(text.starts_with("Misspelled words:\n<text> readme.txt\n"));
        assert!(text.contains(&format!("{RULE}\nbegn\nhelo\n{RULE}\n")));
        assert!(!text.contains("clean.txt"));
        assert!(text.contains("ERROR: broken.txt -- Failed to read broken.txt\n"));
        assert!(text.ends_with(&format!("{FAILED_BANNER}\n")));
    }

    #[test]
    fn test_passing_report() {
        let passing = vec![TaskReport {
            name: "docs".to_string(),
            results: vec![SpellResult::new(Vec::new(), "clean.txt", "text")],
        }];
        assert!(!any_failure(&passing));
        assert_eq!(render_text(&passing), format!("{PASSED_BANNER}\n"));
    }

    #[test]
    fn test_json_report() {
        let json = render_json(&reports()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["name"], "docs");
        assert_eq!(value[0]["results"][0]["words"][1], "helo");
        assert!(value[0]["results"][2]["error"].is_string());
    }
}
