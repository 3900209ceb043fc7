//! constant-condition rule (B003): branching tests that evaluate the same
//! way on every path reaching them.

use std::collections::HashMap;

use swc_common::Span;

use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::parser::ParsedFile;
use crate::rules::{Detector, FunctionFindings, Rule, RuleMetadata};
use crate::se::{Condition, FunctionContext, FunctionOutcome, Observer, Truthiness};

declare_rule!(
    ConstantCondition,
    id = "B003",
    name = "constant-condition",
    description = "Conditions should not always evaluate to the same value",
    category = Suspicious,
    severity = Warning,
    examples = "// Bad\nvar ready;\nif (ready) { start(); }\n\n// Good\nvar ready = check();\nif (ready) { start(); }"
);

impl Rule for ConstantCondition {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn detector<'f>(&self, file: &'f ParsedFile) -> Box<dyn Detector + 'f> {
        Box::new(ConstantConditionDetector {
            file,
            metadata: self.metadata.clone(),
            tests: HashMap::new(),
            findings: FunctionFindings::default(),
        })
    }
}

/// Everything seen for one test across the paths of a function.
#[derive(Debug, Default)]
struct TestSummary {
    always_true: usize,
    always_false: usize,
    undecided: bool,
    tracked: bool,
}

impl TestSummary {
    fn constant_value(&self) -> Option<bool> {
        if self.undecided || !self.tracked {
            return None;
        }
        match (self.always_true, self.always_false) {
            (0, 0) => None,
            (_, 0) => Some(true),
            (0, _) => Some(false),
            _ => None,
        }
    }
}

struct ConstantConditionDetector<'f> {
    file: &'f ParsedFile,
    metadata: RuleMetadata,
    tests: HashMap<Span, TestSummary>,
    findings: FunctionFindings,
}

impl Observer for ConstantConditionDetector<'_> {
    fn start_function(&mut self, _function: &FunctionContext<'_>) {
        self.tests.clear();
    }

    fn on_condition(&mut self, event: &Condition) {
        let summary = self.tests.entry(event.span).or_default();
        summary.tracked = event.tracked;
        if event.poisoned {
            summary.undecided = true;
            return;
        }
        match event.truthiness {
            Truthiness::AlwaysTrue => summary.always_true += 1,
            Truthiness::AlwaysFalse => summary.always_false += 1,
            Truthiness::Unknown => summary.undecided = true,
        }
    }

    fn end_function(&mut self, outcome: FunctionOutcome) {
        let mut constant: Vec<(Span, bool)> = self
            .tests
            .drain()
            .filter_map(|(span, summary)| summary.constant_value().map(|value| (span, value)))
            .collect();
        constant.sort_by_key(|(span, _)| (span.lo, span.hi));

        for (span, value) in constant {
            self.findings.push(
                span,
                format!(
                    "Change this condition so that it does not always evaluate to \"{}\".",
                    value
                ),
            );
        }
        self.findings.end_function(outcome);
    }
}

impl Detector for ConstantConditionDetector<'_> {
    fn finish(&mut self) -> Vec<Diagnostic> {
        self.findings.take_diagnostics(self.file, &self.metadata)
    }
}
