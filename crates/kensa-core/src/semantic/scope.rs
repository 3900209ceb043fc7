//! Scope tree for lexical bindings
//!
//! Scopes are stored in an arena and linked to their parent. Function-like
//! scopes (functions, arrows, classes) are the boundaries across which the
//! symbolic engine stops tracking values.

use id_arena::{Arena, Id};
use swc_common::Span;

pub type ScopeId = Id<Scope>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    ArrowFunction,
    Block,
    For,
    While,
    Switch,
    Try,
    Catch,
    Class,
}

impl ScopeKind {
    /// Scopes whose code may run at a different time than the enclosing code.
    pub fn is_function_like(self) -> bool {
        matches!(
            self,
            ScopeKind::Function | ScopeKind::ArrowFunction | ScopeKind::Class
        )
    }

    /// Scopes that receive hoisted `var` declarations.
    pub fn is_var_target(self) -> bool {
        matches!(
            self,
            ScopeKind::Global | ScopeKind::Module | ScopeKind::Function | ScopeKind::ArrowFunction
        )
    }
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub span: Span,
}

pub struct ScopeTree {
    arena: Arena<Scope>,
    root: Option<ScopeId>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    pub fn create_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        span: Span,
    ) -> ScopeId {
        let id = self.arena.alloc_with_id(|id| Scope {
            id,
            kind,
            parent,
            children: Vec::new(),
            span,
        });

        if let Some(parent_id) = parent {
            self.arena[parent_id].children.push(id);
        }

        if self.root.is_none() {
            self.root = Some(id);
        }

        id
    }

    pub fn root(&self) -> Option<ScopeId> {
        self.root
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.arena[id]
    }

    pub fn parent(&self, id: ScopeId) -> Option<&Scope> {
        self.arena[id].parent.map(|p| &self.arena[p])
    }

    pub fn children(&self, id: ScopeId) -> impl Iterator<Item = &Scope> {
        self.arena[id].children.iter().map(|&c| &self.arena[c])
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    pub fn ancestors(&self, id: ScopeId) -> AncestorIter<'_> {
        AncestorIter {
            tree: self,
            current: Some(id),
        }
    }

    pub fn is_descendant_of(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        self.ancestors(scope).any(|s| s.id == ancestor)
    }

    /// The closest function-like scope containing `id`, `id` included.
    pub fn enclosing_function(&self, id: ScopeId) -> Option<ScopeId> {
        self.ancestors(id)
            .find(|s| s.kind.is_function_like())
            .map(|s| s.id)
    }

    /// Walks from `scope` towards `function` and returns the outermost
    /// function-like scope strictly inside `function`, if any. `None` means
    /// `scope` belongs to `function` itself, or is not inside it at all.
    pub fn nested_function_within(&self, scope: ScopeId, function: ScopeId) -> Option<ScopeId> {
        let mut outermost = None;
        for s in self.ancestors(scope) {
            if s.id == function {
                return outermost;
            }
            if s.kind.is_function_like() {
                outermost = Some(s.id);
            }
        }
        None
    }
}

pub struct AncestorIter<'a> {
    tree: &'a ScopeTree,
    current: Option<ScopeId>,
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = &'a Scope;

    fn next(&mut self) -> Option<Self::Item> {
        let current_id = self.current?;
        let scope = &self.tree.arena[current_id];
        self.current = scope.parent;
        Some(scope)
    }
}
