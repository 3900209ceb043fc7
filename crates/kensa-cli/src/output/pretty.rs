//! Pretty formatter for human-readable terminal output
//!
//! Displays diagnostics with colors, source code context, and summary.

use colored::{ColoredString, Colorize};
use kensa_core::diagnostic::Diagnostic;
use kensa_core::rules::Severity;
use std::collections::HashMap;
use std::fs;

pub struct PrettyFormatter {
    sources: HashMap<String, String>,
}

impl PrettyFormatter {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    pub fn with_sources(sources: HashMap<String, String>) -> Self {
        Self { sources }
    }

    pub fn format(&self, diagnostics: &[Diagnostic]) -> String {
        let mut output = String::new();

        for diag in diagnostics {
            output.push_str(&self.format_diagnostic(diag));
            output.push('\n');
        }

        if !diagnostics.is_empty() {
            output.push_str(&self.format_summary(diagnostics));
        }

        output
    }

    fn format_diagnostic(&self, diag: &Diagnostic) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{}[{}]: {}",
            self.colorize_severity(&diag.severity),
            diag.rule_id.dimmed(),
            diag.message
        ));
        lines.push(format!(
            "  {} {}:{}:{}",
            "-->".blue(),
            diag.file,
            diag.line,
            diag.column
        ));

        let padding = " ".repeat(diag.line.to_string().len());

        if let Some(source_line) = self.get_source_line(&diag.file, diag.line) {
            lines.push(format!("{} {}", padding, "|".blue()));
            lines.push(format!(
                "{} {} {}",
                diag.line.to_string().blue(),
                "|".blue(),
                source_line
            ));

            let caret_padding = " ".repeat(diag.column.saturating_sub(1));
            let caret_len = if diag.end_line == diag.line && diag.end_column > diag.column {
                diag.end_column - diag.column
            } else {
                1
            };
            lines.push(format!(
                "{} {} {}{}",
                padding,
                "|".blue(),
                caret_padding,
                "^".repeat(caret_len).red()
            ));
            lines.push(format!("{} {}", padding, "|".blue()));
        }

        if let Some(suggestion) = &diag.suggestion {
            lines.push(format!(
                "{} {} {} {}",
                padding,
                "=".blue(),
                "suggestion:".green(),
                suggestion
            ));
        }

        lines.join("\n")
    }

    fn colorize_severity(&self, severity: &Severity) -> ColoredString {
        match severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
            Severity::Hint => "hint".cyan().bold(),
        }
    }

    fn get_source_line(&self, file: &str, line: usize) -> Option<String> {
        let index = line.checked_sub(1)?;
        if let Some(source) = self.sources.get(file) {
            return source.lines().nth(index).map(|s| s.to_string());
        }

        let content = fs::read_to_string(file).ok()?;
        content.lines().nth(index).map(|s| s.to_string())
    }

    fn format_summary(&self, diagnostics: &[Diagnostic]) -> String {
        let error_count = diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Error))
            .count();
        let warning_count = diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Warning))
            .count();
        let total = diagnostics.len();

        let errors_str = if error_count == 1 {
            format!("{} error", error_count)
        } else {
            format!("{} errors", error_count)
        };
        let warnings_str = if warning_count == 1 {
            format!("{} warning", warning_count)
        } else {
            format!("{} warnings", warning_count)
        };
        let problems_str = if total == 1 { "problem" } else { "problems" };

        format!(
            "\nFound {} {} ({}, {})\n",
            total.to_string().bold(),
            problems_str,
            errors_str.red(),
            warnings_str.yellow()
        )
    }
}

impl Default for PrettyFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_dereference(line: usize, column: usize) -> Diagnostic {
        Diagnostic::new(
            "B001",
            Severity::Error,
            "\"a\" is null or undefined",
            "test.js",
            line,
            column,
        )
        .with_end(line, column + 1)
    }

    fn plain(text: impl ToString) -> String {
        colored::control::set_override(false);
        text.to_string()
    }

    #[test]
    fn pretty_format_shows_source_and_carets() {
        let mut sources = HashMap::new();
        sources.insert(
            "test.js".to_string(),
            "function f() {\n  var a = null;\n  foo(a.x);\n}".to_string(),
        );
        let formatter = PrettyFormatter::with_sources(sources);

        let output = plain(formatter.format(&[null_dereference(3, 7)]));

        assert!(output.contains("error[B001]: \"a\" is null or undefined"));
        assert!(output.contains("--> test.js:3:7"));
        assert!(output.contains("3 |   foo(a.x);"));
        assert!(output.contains("  |       ^\n"));
    }

    #[test]
    fn summary_counts_problems() {
        let formatter = PrettyFormatter::new();
        let mut warning = null_dereference(1, 1);
        warning.severity = Severity::Warning;

        let output = plain(formatter.format(&[null_dereference(1, 1), warning]));

        assert!(output.contains("Found 2 problems (1 error, 1 warning)"));
    }

    #[test]
    fn missing_source_skips_excerpt() {
        let formatter = PrettyFormatter::new();

        let output = plain(formatter.format(&[null_dereference(3, 7)]));

        assert!(!output.contains(" | "));
    }

    #[test]
    fn colors_match_severity_warning() {
        let formatter = PrettyFormatter::new();
        let colored = formatter.colorize_severity(&Severity::Warning);
        assert_eq!(colored.to_string(), "warning".yellow().bold().to_string());
    }
}
