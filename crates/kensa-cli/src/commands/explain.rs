//! Explain command - provides detailed explanation of a rule

use clap::Args;
use colored::Colorize;
use kensa_core::analysis::AnalysisEngine;
use kensa_core::config::load_config_or_default_with_warnings;
use kensa_core::rules::{Rule, RuleCategory, Severity};
use std::env;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    #[arg(
        value_name = "RULE_ID",
        help = "Rule ID or name to explain (e.g., \"B001\", \"constant-condition\")"
    )]
    pub rule_id: String,
}

impl ExplainArgs {
    pub fn run(&self) -> anyhow::Result<()> {
        let cwd = env::current_dir()?;
        let config = load_config_or_default_with_warnings(&cwd).config;
        let engine = AnalysisEngine::with_config(&config);
        let registry = engine.registry();

        match registry.find_rule(&self.rule_id) {
            Some(rule) => {
                print!("{}", describe(rule, registry.is_rule_enabled(&self.rule_id)));
                Ok(())
            }
            None => {
                eprintln!("Available rules:");
                for rule in registry.rules() {
                    let meta = rule.metadata();
                    eprintln!("  {} ({})", meta.id, meta.name);
                }
                anyhow::bail!("Unknown rule '{}'", self.rule_id)
            }
        }
    }
}

fn describe(rule: &dyn Rule, enabled: bool) -> String {
    let metadata = rule.metadata();
    let mut out = String::new();

    out.push('\n');
    out.push_str(&format!("{}\n\n", format!("Rule {}", metadata.id).bold()));
    out.push_str(&format!("  {}: {}\n", "Name".cyan(), metadata.name));
    out.push_str(&format!(
        "  {}: {}\n",
        "Description".cyan(),
        metadata.description
    ));
    out.push_str(&format!(
        "  {}: {}\n",
        "Category".cyan(),
        format_category(&metadata.category)
    ));
    out.push_str(&format!(
        "  {}: {}\n",
        "Severity".cyan(),
        format_severity(&metadata.severity)
    ));

    if let Some(url) = metadata.docs_url {
        out.push_str(&format!("  {}: {}\n", "Documentation".cyan(), url));
    }

    if let Some(examples) = metadata.examples {
        out.push_str(&format!("\n  {}:\n", "Examples".cyan()));
        for line in examples.lines() {
            out.push_str(&format!("    {}\n", line));
        }
    }

    let status = if enabled {
        "enabled".green()
    } else {
        "disabled".red()
    };
    out.push_str(&format!("\n  {}: {}\n\n", "Status".cyan(), status));
    out
}

fn format_category(category: &RuleCategory) -> &'static str {
    match category {
        RuleCategory::Bug => "bug",
        RuleCategory::Suspicious => "suspicious",
    }
}

fn format_severity(severity: &Severity) -> String {
    match severity {
        Severity::Error => "error".red().to_string(),
        Severity::Warning => "warning".yellow().to_string(),
        Severity::Info => "info".blue().to_string(),
        Severity::Hint => "hint".cyan().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kensa_core::config::{Config, RulesConfig};
    use kensa_core::rules::RuleRegistry;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn explain_finds_rule_by_id_and_name() {
        let registry = RuleRegistry::builtin();

        assert_eq!(
            registry.find_rule("B002").map(|r| r.metadata().name),
            Some("type-error-on-nully")
        );
        assert_eq!(
            registry.find_rule("constant-condition").map(|r| r.metadata().id),
            Some("B003")
        );
        assert!(registry.find_rule("Q999").is_none());
    }

    #[test]
    fn description_lists_metadata_and_examples() {
        plain();
        let registry = RuleRegistry::builtin();
        let rule = registry.find_rule("B001").unwrap();

        let text = describe(rule, true);

        assert!(text.contains("Rule B001"));
        assert!(text.contains("Name: null-dereference"));
        assert!(text.contains("Category: bug"));
        assert!(text.contains("Severity: error"));
        assert!(text.contains("Examples:"));
        assert!(text.contains("Status: enabled"));
    }

    #[test]
    fn disabled_rules_are_shown_as_disabled() {
        plain();
        let config = Config {
            rules: RulesConfig {
                disabled: vec!["B003".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = AnalysisEngine::with_config(&config);
        let registry = engine.registry();
        let rule = registry.find_rule("B003").unwrap();

        let text = describe(rule, registry.is_rule_enabled("B003"));

        assert!(text.contains("Category: suspicious"));
        assert!(text.contains("Status: disabled"));
    }
}
