//! null-dereference rule (B001): property access on a value that is `null`
//! or `undefined` on some path.

use std::collections::HashSet;

use swc_common::Span;

use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::parser::ParsedFile;
use crate::rules::{Detector, FunctionFindings, Rule, RuleMetadata};
use crate::se::{Dereference, DereferenceKind, FunctionContext, FunctionOutcome, Observer};

declare_rule!(
    NullDereference,
    id = "B001",
    name = "null-dereference",
    description = "Properties should not be accessed on values that can be null or undefined",
    category = Bug,
    severity = Error,
    examples = "// Bad\nvar x;\nif (cond) { x = load(); }\nx.name;\n\n// Good\nif (x != null) { x.name; }"
);

impl Rule for NullDereference {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn detector<'f>(&self, file: &'f ParsedFile) -> Box<dyn Detector + 'f> {
        Box::new(NullDereferenceDetector {
            file,
            metadata: self.metadata.clone(),
            reported: HashSet::new(),
            findings: FunctionFindings::default(),
        })
    }
}

struct NullDereferenceDetector<'f> {
    file: &'f ParsedFile,
    metadata: RuleMetadata,
    reported: HashSet<Span>,
    findings: FunctionFindings,
}

impl Observer for NullDereferenceDetector<'_> {
    fn start_function(&mut self, _function: &FunctionContext<'_>) {
        self.reported.clear();
    }

    fn on_dereference(&mut self, event: &Dereference<'_>) {
        if event.kind != DereferenceKind::Member || !event.is_nully() {
            return;
        }
        if self.reported.insert(event.span) {
            self.findings
                .push(event.span, format!("\"{}\" is null or undefined", event.name));
        }
    }

    fn end_function(&mut self, outcome: FunctionOutcome) {
        self.findings.end_function(outcome);
    }
}

impl Detector for NullDereferenceDetector<'_> {
    fn finish(&mut self) -> Vec<Diagnostic> {
        self.findings.take_diagnostics(self.file, &self.metadata)
    }
}
