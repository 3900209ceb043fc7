//! Symbol table for declarations and their references
//!
//! Symbols are bindings, not names: two declarations of `x` in different
//! scopes are two symbols. Every resolved reference records whether it reads
//! or writes the binding and from which scope.

use std::collections::HashMap;

use id_arena::{Arena, Id};
use swc_common::Span;

use super::scope::{ScopeId, ScopeTree};

pub type SymbolId = Id<Symbol>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Function,
    Class,
    Parameter,
    CatchParameter,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Parameter,
    Catch,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn writes(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Reference {
    pub span: Span,
    pub scope: ScopeId,
    pub access: Access,
}

#[derive(Debug)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub declaration_kind: DeclarationKind,
    pub scope: ScopeId,
    pub span: Span,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone)]
pub struct UnresolvedReference {
    pub name: String,
    pub span: Span,
    pub scope: ScopeId,
}

pub struct SymbolTable {
    arena: Arena<Symbol>,
    by_scope: HashMap<ScopeId, HashMap<String, SymbolId>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            by_scope: HashMap::new(),
        }
    }

    pub fn declare(
        &mut self,
        name: &str,
        kind: SymbolKind,
        declaration_kind: DeclarationKind,
        scope: ScopeId,
        span: Span,
    ) -> SymbolId {
        let id = self.arena.alloc_with_id(|id| Symbol {
            id,
            name: name.to_string(),
            kind,
            declaration_kind,
            scope,
            span,
            references: Vec::new(),
        });

        self.by_scope
            .entry(scope)
            .or_default()
            .insert(name.to_string(), id);

        id
    }

    pub fn lookup_local(&self, name: &str, scope: ScopeId) -> Option<SymbolId> {
        self.by_scope
            .get(&scope)
            .and_then(|symbols| symbols.get(name))
            .copied()
    }

    pub fn lookup(&self, name: &str, scope: ScopeId, scope_tree: &ScopeTree) -> Option<SymbolId> {
        scope_tree
            .ancestors(scope)
            .find_map(|s| self.lookup_local(name, s.id))
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.arena[id]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.arena[id]
    }

    pub fn add_reference(&mut self, symbol_id: SymbolId, reference: Reference) {
        self.arena[symbol_id].references.push(reference);
    }

    pub fn symbols_in_scope(&self, scope: ScopeId) -> impl Iterator<Item = &Symbol> {
        self.by_scope
            .get(&scope)
            .into_iter()
            .flat_map(|symbols| symbols.values().map(|&id| &self.arena[id]))
    }

    pub fn all_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.arena.iter().map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::scope::ScopeKind;
    use swc_common::DUMMY_SP;

    #[test]
    fn declare_and_get_symbol() {
        let mut tree = ScopeTree::new();
        let global = tree.create_scope(ScopeKind::Global, None, DUMMY_SP);
        let mut symbols = SymbolTable::new();

        let id = symbols.declare(
            "x",
            SymbolKind::Constant,
            DeclarationKind::Const,
            global,
            DUMMY_SP,
        );

        let symbol = symbols.get(id);
        assert_eq!(symbol.name, "x");
        assert_eq!(symbol.kind, SymbolKind::Constant);
        assert_eq!(symbol.scope, global);
        assert!(symbol.references.is_empty());
    }

    #[test]
    fn lookup_walks_parent_scopes() {
        let mut tree = ScopeTree::new();
        let global = tree.create_scope(ScopeKind::Global, None, DUMMY_SP);
        let func = tree.create_scope(ScopeKind::Function, Some(global), DUMMY_SP);
        let block = tree.create_scope(ScopeKind::Block, Some(func), DUMMY_SP);
        let mut symbols = SymbolTable::new();
        let outer = symbols.declare(
            "x",
            SymbolKind::Variable,
            DeclarationKind::Var,
            global,
            DUMMY_SP,
        );

        assert_eq!(symbols.lookup("x", block, &tree), Some(outer));
        assert_eq!(symbols.lookup_local("x", block), None);
        assert_eq!(symbols.lookup("y", block, &tree), None);
    }

    #[test]
    fn inner_declaration_shadows_outer() {
        let mut tree = ScopeTree::new();
        let global = tree.create_scope(ScopeKind::Global, None, DUMMY_SP);
        let func = tree.create_scope(ScopeKind::Function, Some(global), DUMMY_SP);
        let mut symbols = SymbolTable::new();
        let outer = symbols.declare(
            "x",
            SymbolKind::Variable,
            DeclarationKind::Var,
            global,
            DUMMY_SP,
        );
        let inner = symbols.declare(
            "x",
            SymbolKind::Parameter,
            DeclarationKind::Parameter,
            func,
            DUMMY_SP,
        );

        assert_ne!(outer, inner);
        assert_eq!(symbols.lookup("x", func, &tree), Some(inner));
        assert_eq!(symbols.lookup("x", global, &tree), Some(outer));
    }

    #[test]
    fn references_record_access() {
        let mut tree = ScopeTree::new();
        let global = tree.create_scope(ScopeKind::Global, None, DUMMY_SP);
        let mut symbols = SymbolTable::new();
        let id = symbols.declare(
            "x",
            SymbolKind::Variable,
            DeclarationKind::Let,
            global,
            DUMMY_SP,
        );

        symbols.add_reference(
            id,
            Reference {
                span: DUMMY_SP,
                scope: global,
                access: Access::ReadWrite,
            },
        );

        let reference = symbols.get(id).references[0];
        assert!(reference.access.writes());
        assert!(!Access::Read.writes());
    }
}
