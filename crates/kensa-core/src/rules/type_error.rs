//! type-error-on-nully rule (B002): operations other than property access
//! that throw a `TypeError` on `null` or `undefined`.

use std::collections::HashSet;

use swc_common::Span;

use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::parser::ParsedFile;
use crate::rules::{Detector, FunctionFindings, Rule, RuleMetadata};
use crate::se::{Dereference, DereferenceKind, FunctionContext, FunctionOutcome, Observer};

declare_rule!(
    TypeErrorOnNully,
    id = "B002",
    name = "type-error-on-nully",
    description = "Values that can be null or undefined should not be called, iterated, spread or destructured",
    category = Bug,
    severity = Error,
    examples = "// Bad\nlet items;\nfor (const item of items) {}\n\n// Good\nlet items = [];\nfor (const item of items) {}"
);

impl Rule for TypeErrorOnNully {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn detector<'f>(&self, file: &'f ParsedFile) -> Box<dyn Detector + 'f> {
        Box::new(TypeErrorDetector {
            file,
            metadata: self.metadata.clone(),
            reported: HashSet::new(),
            findings: FunctionFindings::default(),
        })
    }
}

struct TypeErrorDetector<'f> {
    file: &'f ParsedFile,
    metadata: RuleMetadata,
    reported: HashSet<(Span, DereferenceKind)>,
    findings: FunctionFindings,
}

impl Observer for TypeErrorDetector<'_> {
    fn start_function(&mut self, _function: &FunctionContext<'_>) {
        self.reported.clear();
    }

    fn on_dereference(&mut self, event: &Dereference<'_>) {
        if event.kind == DereferenceKind::Member || !event.is_nully() {
            return;
        }
        if self.reported.insert((event.span, event.kind)) {
            self.findings.push(
                event.span,
                format!(
                    "\"{}\" is null or undefined, so this {} throws a TypeError",
                    event.name,
                    event.kind.operation()
                ),
            );
        }
    }

    fn end_function(&mut self, outcome: FunctionOutcome) {
        self.findings.end_function(outcome);
    }
}

impl Detector for TypeErrorDetector<'_> {
    fn finish(&mut self) -> Vec<Diagnostic> {
        self.findings.take_diagnostics(self.file, &self.metadata)
    }
}
