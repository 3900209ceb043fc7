//! Plain one-line-per-finding output, suited to editors and grep

use colored::Colorize;
use kensa_core::diagnostic::Diagnostic;
use kensa_core::rules::Severity;

pub struct TextFormatter;

impl TextFormatter {
    pub fn format(&self, diagnostics: &[Diagnostic]) -> String {
        let mut output = String::new();

        for diag in diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "error".red().bold(),
                Severity::Warning => "warning".yellow().bold(),
                Severity::Info => "info".blue().bold(),
                Severity::Hint => "hint".cyan().bold(),
            };

            output.push_str(&format!(
                "{}:{}:{}: {} [{}]: {}\n",
                diag.file,
                diag.line,
                diag.column,
                severity_str,
                diag.rule_id.dimmed(),
                diag.message
            ));

            if let Some(suggestion) = &diag.suggestion {
                output.push_str(&format!("  {} {}\n", "suggestion:".green(), suggestion));
            }
        }

        if !diagnostics.is_empty() {
            let error_count = count(diagnostics, Severity::Error);
            let warning_count = count(diagnostics, Severity::Warning);
            output.push_str(&format!(
                "\nFound {} error(s) and {} warning(s)\n",
                error_count, warning_count
            ));
        }

        output
    }
}

fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_format_is_one_line_per_finding() {
        colored::control::set_override(false);
        let diagnostics = vec![
            Diagnostic::new(
                "B001",
                Severity::Error,
                "\"a\" is null or undefined",
                "src/app.js",
                5,
                7,
            ),
            Diagnostic::new(
                "B003",
                Severity::Warning,
                "Change this condition so that it does not always evaluate to \"false\".",
                "src/app.js",
                9,
                7,
            ),
        ];

        let output = TextFormatter.format(&diagnostics);

        assert!(output.contains("src/app.js:5:7: error [B001]: \"a\" is null or undefined"));
        assert!(output.contains("src/app.js:9:7: warning [B003]"));
        assert!(output.contains("Found 1 error(s) and 1 warning(s)"));
    }

    #[test]
    fn no_findings_prints_nothing() {
        assert!(TextFormatter.format(&[]).is_empty());
    }
}
