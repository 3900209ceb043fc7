//! Rule system
//!
//! Every rule contributes one detector per file. Detectors observe a single
//! symbolic engine run over the file and turn what they see into
//! diagnostics.

pub mod constant_condition;
pub mod null_dereference;
pub mod type_error;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use swc_common::Span;

use crate::config::RulesConfig;
use crate::diagnostic::Diagnostic;
use crate::parser::ParsedFile;
use crate::se::{FunctionOutcome, Observer, RunSummary, SymbolicEngine};

pub use constant_condition::ConstantCondition;
pub use null_dereference::NullDereference;
pub use type_error::TypeErrorOnNully;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCategory {
    /// Code that throws at runtime on some path.
    Bug,
    /// Code that runs but very likely does not do what was meant.
    Suspicious,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: RuleCategory,
    pub severity: Severity,
    pub docs_url: Option<&'static str>,
    pub examples: Option<&'static str>,
}

pub trait Rule: Send + Sync {
    fn metadata(&self) -> &RuleMetadata;

    /// A fresh detector for one file.
    fn detector<'f>(&self, file: &'f ParsedFile) -> Box<dyn Detector + 'f>;
}

/// An engine observer that reports diagnostics once the run is over.
pub trait Detector: Observer {
    fn finish(&mut self) -> Vec<Diagnostic>;
}

/// Findings of the function being explored. They only become final when
/// the function's analysis did not fail.
#[derive(Debug, Default)]
pub struct FunctionFindings {
    pending: Vec<(Span, String)>,
    committed: Vec<(Span, String)>,
}

impl FunctionFindings {
    pub fn push(&mut self, span: Span, message: String) {
        self.pending.push((span, message));
    }

    pub fn end_function(&mut self, outcome: FunctionOutcome) {
        if outcome == FunctionOutcome::Failed {
            self.pending.clear();
        } else {
            self.committed.append(&mut self.pending);
        }
    }

    pub fn take_diagnostics(
        &mut self,
        file: &ParsedFile,
        metadata: &RuleMetadata,
    ) -> Vec<Diagnostic> {
        std::mem::take(&mut self.committed)
            .into_iter()
            .map(|(span, message)| span_diagnostic(file, metadata, span, message))
            .collect()
    }
}

pub fn span_diagnostic(
    file: &ParsedFile,
    metadata: &RuleMetadata,
    span: Span,
    message: String,
) -> Diagnostic {
    let (start, end) = file.span_positions(span);
    Diagnostic::new(
        metadata.id,
        metadata.severity,
        message,
        &file.metadata().filename,
        start.line,
        start.column,
    )
    .with_end(end.line, end.column)
}

/// Diagnostics of one file together with how the engine run went.
#[derive(Debug, Default)]
pub struct RuleRun {
    pub diagnostics: Vec<Diagnostic>,
    pub summary: RunSummary,
}

pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
    disabled_rules: HashSet<String>,
    severity_overrides: HashMap<String, Severity>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            disabled_rules: HashSet::new(),
            severity_overrides: HashMap::new(),
        }
    }

    /// The three engine-backed rules.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(NullDereference::new()));
        registry.register(Box::new(TypeErrorOnNully::new()));
        registry.register(Box::new(ConstantCondition::new()));
        registry
    }

    pub fn register(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn configure(&mut self, config: &RulesConfig) {
        self.disabled_rules.clear();
        self.severity_overrides.clear();

        for rule_ref in &config.disabled {
            self.disabled_rules.insert(rule_ref.clone());
        }

        for (rule_ref, severity_value) in &config.severity {
            self.severity_overrides
                .insert(rule_ref.clone(), (*severity_value).into());
        }
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Runs the engine once over `file` with the detectors of every enabled
    /// rule attached.
    pub fn run_all(&self, file: &ParsedFile, engine: &SymbolicEngine) -> RuleRun {
        let Some(module) = file.module() else {
            return RuleRun::default();
        };

        let enabled: Vec<&dyn Rule> = self
            .rules()
            .filter(|rule| self.should_run_rule(*rule))
            .collect();
        if enabled.is_empty() {
            return RuleRun::default();
        }

        let mut detectors: Vec<Box<dyn Detector + '_>> =
            enabled.iter().map(|rule| rule.detector(file)).collect();
        let summary = engine.run(module, detectors.as_mut_slice());

        let mut diagnostics = Vec::new();
        for (rule, detector) in enabled.iter().zip(detectors.iter_mut()) {
            let mut found = detector.finish();
            self.apply_severity_overrides(*rule, &mut found);
            diagnostics.extend(found);
        }

        RuleRun {
            diagnostics,
            summary,
        }
    }

    fn should_run_rule(&self, rule: &dyn Rule) -> bool {
        !self.is_rule_disabled(rule.metadata())
    }

    fn is_rule_disabled(&self, metadata: &RuleMetadata) -> bool {
        self.disabled_rules.contains(metadata.id) || self.disabled_rules.contains(metadata.name)
    }

    fn apply_severity_overrides(&self, rule: &dyn Rule, diagnostics: &mut [Diagnostic]) {
        let metadata = rule.metadata();

        let override_severity = self
            .severity_overrides
            .get(metadata.id)
            .or_else(|| self.severity_overrides.get(metadata.name));

        if let Some(severity) = override_severity {
            for diag in diagnostics.iter_mut() {
                diag.severity = *severity;
            }
        }
    }

    pub fn is_rule_enabled(&self, id_or_name: &str) -> bool {
        self.find_rule(id_or_name)
            .is_some_and(|rule| self.should_run_rule(rule))
    }

    /// Looks a rule up by id first, then by name.
    pub fn find_rule(&self, id_or_name: &str) -> Option<&dyn Rule> {
        self.get_rule(id_or_name)
            .or_else(|| self.get_rule_by_name(id_or_name))
    }

    pub fn get_rule(&self, id: &str) -> Option<&dyn Rule> {
        self.rules
            .iter()
            .find(|r| r.metadata().id == id)
            .map(|r| r.as_ref())
    }

    pub fn get_rule_by_name(&self, name: &str) -> Option<&dyn Rule> {
        self.rules
            .iter()
            .find(|r| r.metadata().name == name)
            .map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[macro_export]
macro_rules! declare_rule {
    (
        $name:ident,
        id = $id:literal,
        name = $rule_name:literal,
        description = $desc:literal,
        category = $cat:ident,
        severity = $sev:ident
        $(, docs_url = $url:literal)?
        $(, examples = $examples:literal)?
    ) => {
        pub struct $name {
            metadata: $crate::rules::RuleMetadata,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    metadata: $crate::rules::RuleMetadata {
                        id: $id,
                        name: $rule_name,
                        description: $desc,
                        category: $crate::rules::RuleCategory::$cat,
                        severity: $crate::rules::Severity::$sev,
                        docs_url: declare_rule!(@docs_url $($url)?),
                        examples: declare_rule!(@examples $($examples)?),
                    },
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
    (@docs_url $url:literal) => { Some($url) };
    (@docs_url) => { None };
    (@examples $examples:literal) => { Some($examples) };
    (@examples) => { None };
}
