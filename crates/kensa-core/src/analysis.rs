//! Analysis driver
//!
//! Runs the symbolic engine with every enabled detector over a parsed file
//! and applies inline suppression comments.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use swc_common::BytePos;

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::parser::ParsedFile;
use crate::rules::{RuleRegistry, Severity};
use crate::se::{RunSummary, SymbolicEngine};

/// Diagnostics of one file plus the engine's bookkeeping for it.
#[derive(Debug, Default)]
pub struct FileAnalysis {
    pub diagnostics: Vec<Diagnostic>,
    pub summary: RunSummary,
}

pub struct AnalysisEngine {
    registry: RuleRegistry,
    engine: SymbolicEngine,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let mut registry = RuleRegistry::builtin();
        registry.configure(&config.rules);
        Self {
            registry,
            engine: SymbolicEngine::new(config.engine),
        }
    }

    /// Functions not yet started once `flag` is set are skipped.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.engine = self.engine.with_cancellation(flag);
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn analyze(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        self.analyze_file(file).diagnostics
    }

    pub fn analyze_file(&self, file: &ParsedFile) -> FileAnalysis {
        let mut diagnostics = Vec::new();

        for error in file.errors() {
            let end = file.position(BytePos(error.span_hi));
            diagnostics.push(
                Diagnostic::new(
                    "PARSE",
                    Severity::Error,
                    &error.message,
                    &file.metadata().filename,
                    error.line,
                    error.column,
                )
                .with_end(end.line, end.column),
            );
        }

        let run = self.registry.run_all(file, &self.engine);
        diagnostics.extend(run.diagnostics);
        diagnostics.retain(|diagnostic| !self.is_suppressed(file, diagnostic));
        diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        FileAnalysis {
            diagnostics,
            summary: run.summary,
        }
    }

    fn is_suppressed(&self, file: &ParsedFile, diagnostic: &Diagnostic) -> bool {
        let directives = file.disable_directives();
        if directives.is_disabled(diagnostic.line, &diagnostic.rule_id) {
            return true;
        }
        self.registry
            .get_rule(&diagnostic.rule_id)
            .is_some_and(|rule| directives.is_disabled(diagnostic.line, rule.metadata().name))
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}
