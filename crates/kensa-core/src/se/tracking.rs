//! Which symbols a function analysis tracks
//!
//! Only bindings owned by the analyzed function are tracked: its parameters
//! and the variables declared in its own blocks. Globals, outer variables
//! and `arguments` always read as `Unknown`.

use std::collections::{BTreeSet, HashMap};

use crate::semantic::{DeclarationKind, ScopeId, SemanticModel, SymbolId, SymbolKind};

use super::state::ProgramState;
use super::value::AbstractValue;

#[derive(Debug, Clone, Default)]
pub struct TrackedSymbols {
    symbols: BTreeSet<SymbolId>,
    /// Tracked symbols written inside each closure directly nested in the
    /// function, keyed by the closure's scope.
    closure_writes: HashMap<ScopeId, BTreeSet<SymbolId>>,
    /// Tracked symbols written by hoisted function declarations, which may
    /// run at any call.
    hoisted_writes: BTreeSet<SymbolId>,
}

impl TrackedSymbols {
    pub fn collect(model: &SemanticModel, function: ScopeId) -> Self {
        if has_dynamic_scope(model, function) {
            return Self::default();
        }

        let tree = &model.scope_tree;
        let mut tracked = Self::default();

        for symbol in model.symbol_table.all_symbols() {
            let owned = tree.is_descendant_of(symbol.scope, function)
                && tree.nested_function_within(symbol.scope, function).is_none();
            let trackable = matches!(
                symbol.kind,
                SymbolKind::Variable
                    | SymbolKind::Constant
                    | SymbolKind::Parameter
                    | SymbolKind::CatchParameter
            );
            if !owned || !trackable || symbol.name == "arguments" {
                continue;
            }
            tracked.symbols.insert(symbol.id);

            for reference in symbol.references.iter().filter(|r| r.access.writes()) {
                let Some(closure) = tree.nested_function_within(reference.scope, function) else {
                    continue;
                };
                tracked
                    .closure_writes
                    .entry(closure)
                    .or_default()
                    .insert(symbol.id);
                if model.is_hoisted_function(closure) {
                    tracked.hoisted_writes.insert(symbol.id);
                }
            }
        }

        tracked
    }

    pub fn contains(&self, symbol: SymbolId) -> bool {
        self.symbols.contains(&symbol)
    }

    pub fn symbols(&self) -> &BTreeSet<SymbolId> {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Tracked symbols the closure with scope `closure` may write.
    pub fn written_by(&self, closure: ScopeId) -> impl Iterator<Item = SymbolId> + '_ {
        self.closure_writes
            .get(&closure)
            .into_iter()
            .flat_map(|symbols| symbols.iter().copied())
    }

    /// Declared variables start as `undefined`; parameters are unknown.
    pub fn entry_state(&self, model: &SemanticModel) -> ProgramState {
        let mut state = ProgramState::new();
        for &id in &self.symbols {
            let symbol = model.symbol_table.get(id);
            if matches!(
                symbol.declaration_kind,
                DeclarationKind::Var | DeclarationKind::Let | DeclarationKind::Const
            ) {
                state = state.set(id, AbstractValue::Undefined);
            }
        }
        for &id in &self.hoisted_writes {
            state = state.forget(id);
        }
        state
    }
}

/// `with` or direct `eval` anywhere inside the function, nested closures
/// included, may write any of its locals.
fn has_dynamic_scope(model: &SemanticModel, scope: ScopeId) -> bool {
    model.has_dynamic_bindings(scope)
        || model
            .scope_tree
            .get(scope)
            .children
            .iter()
            .any(|&child| has_dynamic_scope(model, child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;
    use crate::semantic::ScopeBuilder;

    fn analyze(code: &str) -> (SemanticModel, ScopeId) {
        let parsed = ParsedFile::from_source("test.js", code);
        let module = parsed.module().expect("parse failed");
        let (model, functions) = ScopeBuilder::build_with_functions(module);
        let scope = functions[0].scope;
        (model, scope)
    }

    fn names(model: &SemanticModel, symbols: impl IntoIterator<Item = SymbolId>) -> Vec<String> {
        let mut names: Vec<_> = symbols
            .into_iter()
            .map(|id| model.symbol_table.get(id).name.clone())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn tracks_locals_and_parameters_but_not_outer_bindings() {
        let (model, scope) = analyze(
            "var outer; function f(p) { var a; { let b; } try {} catch (e) {} function g() { var inner; } }",
        );

        let tracked = TrackedSymbols::collect(&model, scope);

        assert_eq!(
            names(&model, tracked.symbols().iter().copied()),
            vec!["a", "b", "e", "p"]
        );
    }

    #[test]
    fn entry_state_sets_declared_variables_to_undefined() {
        let (model, scope) = analyze("function f(p) { var a; let b = 1; }");
        let tracked = TrackedSymbols::collect(&model, scope);

        let state = tracked.entry_state(&model);

        let values: Vec<_> = state
            .tracked()
            .map(|(id, value)| (model.symbol_table.get(id).name.clone(), value))
            .collect();
        assert_eq!(
            values,
            vec![
                ("a".to_string(), AbstractValue::Undefined),
                ("b".to_string(), AbstractValue::Undefined)
            ]
        );
    }

    #[test]
    fn records_writes_by_closures() {
        let (model, scope) =
            analyze("function f() { var a, b; var cb = () => { a = 1; return b; }; }");
        let tracked = TrackedSymbols::collect(&model, scope);
        let closure = model
            .scope_tree
            .children(scope)
            .find(|s| s.kind.is_function_like())
            .map(|s| s.id)
            .expect("arrow scope");

        assert_eq!(names(&model, tracked.written_by(closure)), vec!["a"]);
    }

    #[test]
    fn hoisted_function_writes_escape_at_entry() {
        let (model, scope) = analyze("function f() { var a; reset(); function reset() { a = null; } }");
        let tracked = TrackedSymbols::collect(&model, scope);

        let state = tracked.entry_state(&model);

        let a = tracked.symbols().iter().copied().next().expect("a is tracked");
        assert!(state.is_escaped(a));
    }

    #[test]
    fn eval_disables_tracking() {
        let (model, scope) = analyze("function f() { var a; eval('a = 1'); }");

        assert!(TrackedSymbols::collect(&model, scope).is_empty());
    }

    #[test]
    fn with_statement_disables_tracking() {
        let (model, scope) = analyze("function f(o) { var a = null; with (o) { a = 1; } a.foo; }");

        assert!(TrackedSymbols::collect(&model, scope).is_empty());
    }

    #[test]
    fn eval_in_nested_closure_disables_tracking() {
        let (model, scope) = analyze("function f() { var a; return () => eval('a = 1'); }");

        assert!(TrackedSymbols::collect(&model, scope).is_empty());
    }
}
