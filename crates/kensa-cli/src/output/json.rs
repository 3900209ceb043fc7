//! JSON output formatter for programmatic integration

use kensa_core::diagnostic::Diagnostic;
use kensa_core::rules::{RuleCategory, RuleRegistry, Severity};
use serde::Serialize;
use std::collections::HashSet;

use super::EngineTotals;

#[derive(Serialize)]
pub struct JsonOutput {
    pub version: &'static str,
    pub metadata: JsonMetadata,
    pub summary: JsonSummary,
    pub diagnostics: Vec<JsonDiagnostic>,
}

#[derive(Serialize)]
pub struct JsonMetadata {
    pub kensa_version: &'static str,
    pub working_directory: String,
    pub analyzed_path: String,
}

#[derive(Serialize)]
pub struct JsonSummary {
    pub total_files: usize,
    pub files_with_issues: usize,
    pub total_diagnostics: usize,
    pub by_severity: SeverityCounts,
    pub by_category: CategoryCounts,
    pub engine: JsonEngineSummary,
}

#[derive(Serialize, Default)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
    pub hint: usize,
}

#[derive(Serialize, Default)]
pub struct CategoryCounts {
    pub bug: usize,
    pub suspicious: usize,
}

/// Functions explored, and how many of them had to be cut short.
#[derive(Serialize)]
pub struct JsonEngineSummary {
    pub functions: usize,
    pub degraded: usize,
    pub failed: usize,
}

#[derive(Serialize)]
pub struct JsonDiagnostic {
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub severity: String,
    pub message: String,
    pub location: JsonLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Serialize)]
pub struct JsonLocation {
    pub file: String,
    pub start: JsonPosition,
    pub end: JsonPosition,
}

#[derive(Serialize)]
pub struct JsonPosition {
    pub line: usize,
    pub column: usize,
}

pub struct JsonFormatter<'a> {
    registry: Option<&'a RuleRegistry>,
}

impl<'a> JsonFormatter<'a> {
    pub fn new() -> Self {
        Self { registry: None }
    }

    pub fn with_registry(registry: &'a RuleRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    pub fn format(
        &self,
        diagnostics: &[Diagnostic],
        total_files: usize,
        analyzed_path: &str,
        totals: EngineTotals,
    ) -> String {
        let output = self.build_output(diagnostics, total_files, analyzed_path, totals);
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }

    fn build_output(
        &self,
        diagnostics: &[Diagnostic],
        total_files: usize,
        analyzed_path: &str,
        totals: EngineTotals,
    ) -> JsonOutput {
        JsonOutput {
            version: "1.0",
            metadata: JsonMetadata {
                kensa_version: env!("CARGO_PKG_VERSION"),
                working_directory: std::env::current_dir()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default(),
                analyzed_path: analyzed_path.to_string(),
            },
            summary: self.build_summary(diagnostics, total_files, totals),
            diagnostics: diagnostics
                .iter()
                .map(|d| self.convert_diagnostic(d))
                .collect(),
        }
    }

    fn build_summary(
        &self,
        diagnostics: &[Diagnostic],
        total_files: usize,
        totals: EngineTotals,
    ) -> JsonSummary {
        let mut by_severity = SeverityCounts::default();
        let mut by_category = CategoryCounts::default();
        let mut files_with_issues = HashSet::new();

        for diag in diagnostics {
            match diag.severity {
                Severity::Error => by_severity.error += 1,
                Severity::Warning => by_severity.warning += 1,
                Severity::Info => by_severity.info += 1,
                Severity::Hint => by_severity.hint += 1,
            }

            match self.get_category(&diag.rule_id) {
                Some(RuleCategory::Bug) => by_category.bug += 1,
                Some(RuleCategory::Suspicious) => by_category.suspicious += 1,
                None => {}
            }

            files_with_issues.insert(diag.file.as_str());
        }

        JsonSummary {
            total_files,
            files_with_issues: files_with_issues.len(),
            total_diagnostics: diagnostics.len(),
            by_severity,
            by_category,
            engine: JsonEngineSummary {
                functions: totals.functions,
                degraded: totals.degraded,
                failed: totals.failed,
            },
        }
    }

    fn convert_diagnostic(&self, diag: &Diagnostic) -> JsonDiagnostic {
        let rule = self.registry.and_then(|r| r.get_rule(&diag.rule_id));

        JsonDiagnostic {
            rule_id: diag.rule_id.clone(),
            rule_name: rule.map(|r| r.metadata().name.to_string()),
            category: rule.map(|r| category_name(r.metadata().category).to_string()),
            severity: diag.severity.as_str().to_string(),
            message: diag.message.clone(),
            location: JsonLocation {
                file: diag.file.clone(),
                start: JsonPosition {
                    line: diag.line,
                    column: diag.column,
                },
                end: JsonPosition {
                    line: diag.end_line,
                    column: diag.end_column,
                },
            },
            suggestion: diag.suggestion.clone(),
        }
    }

    fn get_category(&self, rule_id: &str) -> Option<RuleCategory> {
        self.registry
            .and_then(|r| r.get_rule(rule_id))
            .map(|rule| rule.metadata().category)
    }
}

impl Default for JsonFormatter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn category_name(category: RuleCategory) -> &'static str {
    match category {
        RuleCategory::Bug => "bug",
        RuleCategory::Suspicious => "suspicious",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn diagnostics() -> Vec<Diagnostic> {
        vec![
            Diagnostic::new(
                "B001",
                Severity::Error,
                "\"a\" is null or undefined",
                "src/a.js",
                3,
                5,
            )
            .with_end(3, 6),
            Diagnostic::new(
                "B003",
                Severity::Warning,
                "Change this condition so that it does not always evaluate to \"true\".",
                "src/a.js",
                7,
                7,
            ),
            Diagnostic::new("PARSE", Severity::Error, "Expected ident", "src/b.js", 1, 7),
        ]
    }

    fn parse(output: &str) -> Value {
        serde_json::from_str(output).expect("formatter should produce valid JSON")
    }

    #[test]
    fn json_output_has_metadata_and_summary() {
        let registry = RuleRegistry::builtin();
        let formatter = JsonFormatter::with_registry(&registry);
        let totals = EngineTotals {
            functions: 4,
            degraded: 1,
            failed: 0,
        };

        let json = parse(&formatter.format(&diagnostics(), 5, "src", totals));

        assert_eq!(json["version"], "1.0");
        assert_eq!(json["metadata"]["analyzed_path"], "src");
        assert_eq!(json["summary"]["total_files"], 5);
        assert_eq!(json["summary"]["files_with_issues"], 2);
        assert_eq!(json["summary"]["total_diagnostics"], 3);
        assert_eq!(json["summary"]["by_severity"]["error"], 2);
        assert_eq!(json["summary"]["by_severity"]["warning"], 1);
        assert_eq!(json["summary"]["by_category"]["bug"], 1);
        assert_eq!(json["summary"]["by_category"]["suspicious"], 1);
        assert_eq!(json["summary"]["engine"]["functions"], 4);
        assert_eq!(json["summary"]["engine"]["degraded"], 1);
    }

    #[test]
    fn json_diagnostics_carry_rule_info_and_location() {
        let registry = RuleRegistry::builtin();
        let formatter = JsonFormatter::with_registry(&registry);

        let json = parse(&formatter.format(&diagnostics(), 2, ".", EngineTotals::default()));
        let first = &json["diagnostics"][0];

        assert_eq!(first["rule_id"], "B001");
        assert_eq!(first["rule_name"], "null-dereference");
        assert_eq!(first["category"], "bug");
        assert_eq!(first["severity"], "error");
        assert_eq!(first["location"]["start"]["line"], 3);
        assert_eq!(first["location"]["end"]["column"], 6);
        assert!(first.get("suggestion").is_none());
    }

    #[test]
    fn parse_errors_have_no_rule_info() {
        let registry = RuleRegistry::builtin();
        let formatter = JsonFormatter::with_registry(&registry);

        let json = parse(&formatter.format(&diagnostics(), 2, ".", EngineTotals::default()));
        let parse_error = &json["diagnostics"][2];

        assert_eq!(parse_error["rule_id"], "PARSE");
        assert!(parse_error.get("rule_name").is_none());
        assert!(parse_error.get("category").is_none());
    }

    #[test]
    fn formatter_without_registry_omits_categories() {
        let formatter = JsonFormatter::new();

        let json = parse(&formatter.format(&diagnostics(), 2, ".", EngineTotals::default()));

        assert_eq!(json["summary"]["by_category"]["bug"], 0);
        assert!(json["diagnostics"][0].get("rule_name").is_none());
    }
}
