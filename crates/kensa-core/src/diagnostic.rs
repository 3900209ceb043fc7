//! Diagnostics reported to the user
//!
//! Positions are 1-based; `end_column` is exclusive.

use serde::Serialize;

use crate::rules::Severity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            file: file.into(),
            line,
            column,
            end_line: line,
            end_column: column,
            suggestion: None,
        }
    }

    pub fn with_end(mut self, end_line: usize, end_column: usize) -> Self {
        self.end_line = end_line;
        self.end_column = end_column;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Ordering used for output: by file, then position, then rule.
    pub fn sort_key(&self) -> (&str, usize, usize, &str) {
        (&self.file, self.line, self.column, &self.rule_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_defaults_to_start() {
        let diag = Diagnostic::new("B001", Severity::Error, "msg", "a.js", 3, 5);

        assert_eq!((diag.end_line, diag.end_column), (3, 5));
        assert!(diag.suggestion.is_none());
    }

    #[test]
    fn builder_sets_end_and_suggestion() {
        let diag = Diagnostic::new("B003", Severity::Warning, "msg", "a.js", 2, 7)
            .with_end(2, 8)
            .with_suggestion("Remove the condition");

        assert_eq!(diag.end_column, 8);
        assert_eq!(diag.suggestion.as_deref(), Some("Remove the condition"));
    }

    #[test]
    fn serializes_without_empty_suggestion() {
        let diag = Diagnostic::new("B001", Severity::Error, "\"a\" is null or undefined", "a.js", 1, 1)
            .with_end(1, 2);

        insta::assert_json_snapshot!(diag, @r###"
        {
          "rule_id": "B001",
          "severity": "error",
          "message": "\"a\" is null or undefined",
          "file": "a.js",
          "line": 1,
          "column": 1,
          "end_line": 1,
          "end_column": 2
        }
        "###);
    }
}
