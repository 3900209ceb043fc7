//! Semantic analysis
//!
//! Scopes, symbols and per-function control flow graphs.

pub mod cfg;
pub mod scope;
pub mod symbols;
pub mod visitor;

pub use cfg::{
    BasicBlock, BasicBlockId, BasicBlockKind, Branch, ControlFlowGraph, Element, FunctionBody,
};
pub use scope::{AncestorIter, Scope, ScopeId, ScopeKind, ScopeTree};
pub use symbols::{
    Access, DeclarationKind, Reference, Symbol, SymbolId, SymbolKind, SymbolTable,
    UnresolvedReference,
};
pub use visitor::{FunctionNode, ScopeBuilder, SemanticModel, binding_idents, unparen};
