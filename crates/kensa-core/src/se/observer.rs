//! Events the explorer reports while it walks a function
//!
//! Observers are passive: they see every element visit, every dereference
//! of a tracked symbol and every evaluated condition, and decide on their
//! own what to report. Nothing an observer does feeds back into exploration.

use std::collections::BTreeSet;

use swc_common::Span;

use crate::semantic::{ScopeId, SemanticModel, SymbolId};

use super::state::ProgramState;
use super::value::{AbstractValue, Truthiness};

/// Operations that throw a `TypeError` when applied to `null` or `undefined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DereferenceKind {
    /// `x.y`, `x[y]` and the object of a method call.
    Member,
    Call,
    New,
    /// `for (const item of x)`
    Iterate,
    /// `[...x]` and `f(...x)`
    Spread,
    /// `const { a } = x` and `[a] = x`
    Destructure,
    /// `key in x`
    In,
}

impl DereferenceKind {
    pub fn operation(self) -> &'static str {
        match self {
            DereferenceKind::Member => "property access",
            DereferenceKind::Call => "call",
            DereferenceKind::New => "instantiation",
            DereferenceKind::Iterate => "iteration",
            DereferenceKind::Spread => "spread",
            DereferenceKind::Destructure => "destructuring",
            DereferenceKind::In => "\"in\" check",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dereference<'e> {
    pub kind: DereferenceKind,
    /// The expression being dereferenced, not the whole access.
    pub span: Span,
    pub symbol: SymbolId,
    pub name: &'e str,
    /// Value of the symbol on the current path, before the access.
    pub value: AbstractValue,
}

impl Dereference<'_> {
    pub fn is_nully(&self) -> bool {
        self.value.is_null_or_undefined()
    }
}

/// One evaluation of a branching test on one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub span: Span,
    pub truthiness: Truthiness,
    /// Whether the test reads a tracked symbol at all.
    pub tracked: bool,
    /// Set once exploration has degraded: the value says nothing about paths.
    pub poisoned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionOutcome {
    /// Every path was explored.
    Completed,
    /// A cap was hit and the rest of the function was merged per block.
    Degraded,
    /// An internal error stopped the analysis; partial observations are void.
    Failed,
}

pub struct FunctionContext<'c> {
    pub span: Span,
    pub scope: ScopeId,
    pub model: &'c SemanticModel,
    pub tracked: &'c BTreeSet<SymbolId>,
}

impl FunctionContext<'_> {
    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        &self.model.symbol_table.get(symbol).name
    }
}

pub trait Observer {
    fn start_function(&mut self, _function: &FunctionContext<'_>) {}

    /// Called once per path state before an element is evaluated.
    fn before_element(&mut self, _span: Span, _state: &ProgramState) {}

    fn on_dereference(&mut self, _event: &Dereference<'_>) {}

    fn on_condition(&mut self, _event: &Condition) {}

    fn end_function(&mut self, _outcome: FunctionOutcome) {}
}

impl<T: Observer + ?Sized> Observer for Box<T> {
    fn start_function(&mut self, function: &FunctionContext<'_>) {
        (**self).start_function(function);
    }

    fn before_element(&mut self, span: Span, state: &ProgramState) {
        (**self).before_element(span, state);
    }

    fn on_dereference(&mut self, event: &Dereference<'_>) {
        (**self).on_dereference(event);
    }

    fn on_condition(&mut self, event: &Condition) {
        (**self).on_condition(event);
    }

    fn end_function(&mut self, outcome: FunctionOutcome) {
        (**self).end_function(outcome);
    }
}

/// Fans every event out to each observer in order.
impl<T: Observer> Observer for [T] {
    fn start_function(&mut self, function: &FunctionContext<'_>) {
        for observer in self.iter_mut() {
            observer.start_function(function);
        }
    }

    fn before_element(&mut self, span: Span, state: &ProgramState) {
        for observer in self.iter_mut() {
            observer.before_element(span, state);
        }
    }

    fn on_dereference(&mut self, event: &Dereference<'_>) {
        for observer in self.iter_mut() {
            observer.on_dereference(event);
        }
    }

    fn on_condition(&mut self, event: &Condition) {
        for observer in self.iter_mut() {
            observer.on_condition(event);
        }
    }

    fn end_function(&mut self, outcome: FunctionOutcome) {
        for observer in self.iter_mut() {
            observer.end_function(outcome);
        }
    }
}
