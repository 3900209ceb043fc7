//! Scope builder producing the semantic model of a module
//!
//! Declarations are hoisted before a body is visited (`var` and function
//! declarations to the enclosing function, `let`/`const`/class to their
//! block), so every identifier occurrence resolves to the binding the
//! runtime would use. Resolutions are keyed by the identifier's span.

use std::collections::{HashMap, HashSet};

use swc_common::Span;
use swc_ecma_ast::{
    ArrowExpr, AssignOp, AssignTarget, AssignTargetPat, BlockStmt, BlockStmtOrExpr, Callee,
    CatchClause, Class, ClassMember, Decl, Expr, ForHead, Function, Ident, JSXAttrOrSpread,
    JSXAttrValue, JSXElement, JSXElementChild, JSXExpr, MemberProp, Module, ModuleDecl,
    ModuleItem, ObjectPatProp, OptChainBase, OptChainExpr, ParamOrTsParamProp, Pat, Prop, PropName,
    PropOrSpread, SimpleAssignTarget, Stmt, SwitchStmt, TryStmt, TsParamPropParam, VarDecl,
    VarDeclKind, VarDeclOrExpr,
};

use super::cfg::FunctionBody;
use super::scope::{ScopeId, ScopeKind, ScopeTree};
use super::symbols::{
    Access, DeclarationKind, Reference, SymbolId, SymbolKind, SymbolTable, UnresolvedReference,
};

/// A function, arrow, constructor, accessor or static block with a body.
#[derive(Debug, Clone, Copy)]
pub struct FunctionNode<'a> {
    pub span: Span,
    pub scope: ScopeId,
    pub body: FunctionBody<'a>,
}

pub struct SemanticModel {
    pub scope_tree: ScopeTree,
    pub symbol_table: SymbolTable,
    pub unresolved_references: Vec<UnresolvedReference>,
    resolved: HashMap<Span, SymbolId>,
    node_scopes: HashMap<Span, ScopeId>,
    hoisted_functions: HashSet<ScopeId>,
    dynamic_scopes: HashSet<ScopeId>,
}

impl SemanticModel {
    /// The binding an identifier occurrence (declaration or reference) refers to.
    pub fn resolve(&self, ident: &Ident) -> Option<SymbolId> {
        self.resolved.get(&ident.span).copied()
    }

    pub fn resolve_span(&self, span: Span) -> Option<SymbolId> {
        self.resolved.get(&span).copied()
    }

    /// The scope created for a function, arrow, class, getter or setter node,
    /// keyed by the node's span.
    pub fn scope_of_node(&self, span: Span) -> Option<ScopeId> {
        self.node_scopes.get(&span).copied()
    }

    /// Function declarations may be called from anywhere in their scope,
    /// unlike function expressions which only exist once evaluated.
    pub fn is_hoisted_function(&self, scope: ScopeId) -> bool {
        self.hoisted_functions.contains(&scope)
    }

    /// Function scopes containing a `with` statement or a direct `eval` call.
    pub fn has_dynamic_bindings(&self, scope: ScopeId) -> bool {
        self.dynamic_scopes.contains(&scope)
    }
}

pub struct ScopeBuilder<'a> {
    functions: Vec<FunctionNode<'a>>,
    scope_tree: ScopeTree,
    symbol_table: SymbolTable,
    current: ScopeId,
    resolved: HashMap<Span, SymbolId>,
    node_scopes: HashMap<Span, ScopeId>,
    hoisted_functions: HashSet<ScopeId>,
    dynamic_scopes: HashSet<ScopeId>,
    unresolved_references: Vec<UnresolvedReference>,
}

impl<'a> ScopeBuilder<'a> {
    fn new(span: Span) -> Self {
        let mut scope_tree = ScopeTree::new();
        let root = scope_tree.create_scope(ScopeKind::Global, None, span);
        Self {
            scope_tree,
            symbol_table: SymbolTable::new(),
            current: root,
            resolved: HashMap::new(),
            node_scopes: HashMap::new(),
            hoisted_functions: HashSet::new(),
            dynamic_scopes: HashSet::new(),
            unresolved_references: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn build(module: &'a Module) -> SemanticModel {
        Self::build_with_functions(module).0
    }

    /// Builds the model and also returns every function-like node with a
    /// body, in source order of their start.
    pub fn build_with_functions(module: &'a Module) -> (SemanticModel, Vec<FunctionNode<'a>>) {
        let mut builder = Self::new(module.span);
        builder.visit_module(module);
        let mut functions = builder.functions;
        functions.sort_by_key(|f| f.span.lo);
        let model = SemanticModel {
            scope_tree: builder.scope_tree,
            symbol_table: builder.symbol_table,
            unresolved_references: builder.unresolved_references,
            resolved: builder.resolved,
            node_scopes: builder.node_scopes,
            hoisted_functions: builder.hoisted_functions,
            dynamic_scopes: builder.dynamic_scopes,
        };
        (model, functions)
    }

    fn visit_module(&mut self, module: &'a Module) {
        let root = self.current;
        let stmts: Vec<&Stmt> = module
            .body
            .iter()
            .filter_map(|item| match item {
                ModuleItem::Stmt(stmt) => Some(stmt),
                ModuleItem::ModuleDecl(_) => None,
            })
            .collect();
        let exported: Vec<&Decl> = module
            .body
            .iter()
            .filter_map(|item| match item {
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => Some(&export.decl),
                _ => None,
            })
            .collect();

        for stmt in &stmts {
            self.hoist_vars(stmt, root);
        }
        for decl in &exported {
            self.hoist_vars_in_decl(decl, root);
        }
        for stmt in &stmts {
            if let Stmt::Decl(decl) = stmt {
                self.hoist_lexical(decl, root);
            }
        }
        for decl in &exported {
            self.hoist_lexical(decl, root);
        }

        for item in &module.body {
            match item {
                ModuleItem::Stmt(stmt) => self.visit_stmt(stmt),
                ModuleItem::ModuleDecl(decl) => self.visit_module_decl(decl),
            }
        }
    }

    fn visit_module_decl(&mut self, decl: &'a ModuleDecl) {
        match decl {
            ModuleDecl::Import(import) => {
                for specifier in &import.specifiers {
                    let local = match specifier {
                        swc_ecma_ast::ImportSpecifier::Named(named) => &named.local,
                        swc_ecma_ast::ImportSpecifier::Default(default) => &default.local,
                        swc_ecma_ast::ImportSpecifier::Namespace(namespace) => &namespace.local,
                    };
                    self.declare_symbol(
                        local.sym.as_str(),
                        SymbolKind::Import,
                        DeclarationKind::Import,
                        local.span,
                        self.current,
                    );
                }
            }
            ModuleDecl::ExportDecl(export) => self.visit_decl(&export.decl),
            ModuleDecl::ExportDefaultDecl(export) => match &export.decl {
                swc_ecma_ast::DefaultDecl::Fn(fn_expr) => {
                    self.visit_function(&fn_expr.function, fn_expr.ident.as_ref(), false);
                }
                swc_ecma_ast::DefaultDecl::Class(class_expr) => {
                    self.visit_class(&class_expr.class);
                }
                swc_ecma_ast::DefaultDecl::TsInterfaceDecl(_) => {}
            },
            ModuleDecl::ExportDefaultExpr(export) => self.visit_expr(&export.expr),
            ModuleDecl::ExportNamed(named) if named.src.is_none() => {
                for specifier in &named.specifiers {
                    if let swc_ecma_ast::ExportSpecifier::Named(named) = specifier {
                        if let swc_ecma_ast::ModuleExportName::Ident(ident) = &named.orig {
                            self.visit_ident_reference(ident, Access::Read);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Declares every `var` reachable from `stmt` without entering nested
    /// functions or classes.
    fn hoist_vars(&mut self, stmt: &Stmt, target: ScopeId) {
        match stmt {
            Stmt::Decl(decl) => self.hoist_vars_in_decl(decl, target),
            Stmt::Block(block) => {
                for s in &block.stmts {
                    self.hoist_vars(s, target);
                }
            }
            Stmt::If(if_stmt) => {
                self.hoist_vars(&if_stmt.cons, target);
                if let Some(alt) = &if_stmt.alt {
                    self.hoist_vars(alt, target);
                }
            }
            Stmt::For(for_stmt) => {
                if let Some(VarDeclOrExpr::VarDecl(var)) = &for_stmt.init {
                    self.hoist_var_decl(var, target);
                }
                self.hoist_vars(&for_stmt.body, target);
            }
            Stmt::ForIn(for_in) => {
                if let ForHead::VarDecl(var) = &for_in.left {
                    self.hoist_var_decl(var, target);
                }
                self.hoist_vars(&for_in.body, target);
            }
            Stmt::ForOf(for_of) => {
                if let ForHead::VarDecl(var) = &for_of.left {
                    self.hoist_var_decl(var, target);
                }
                self.hoist_vars(&for_of.body, target);
            }
            Stmt::While(while_stmt) => self.hoist_vars(&while_stmt.body, target),
            Stmt::DoWhile(do_while) => self.hoist_vars(&do_while.body, target),
            Stmt::Labeled(labeled) => self.hoist_vars(&labeled.body, target),
            Stmt::With(with_stmt) => self.hoist_vars(&with_stmt.body, target),
            Stmt::Switch(switch_stmt) => {
                for case in &switch_stmt.cases {
                    for s in &case.cons {
                        self.hoist_vars(s, target);
                    }
                }
            }
            Stmt::Try(try_stmt) => {
                for s in &try_stmt.block.stmts {
                    self.hoist_vars(s, target);
                }
                if let Some(handler) = &try_stmt.handler {
                    for s in &handler.body.stmts {
                        self.hoist_vars(s, target);
                    }
                }
                if let Some(finalizer) = &try_stmt.finalizer {
                    for s in &finalizer.stmts {
                        self.hoist_vars(s, target);
                    }
                }
            }
            _ => {}
        }
    }

    fn hoist_vars_in_decl(&mut self, decl: &Decl, target: ScopeId) {
        if let Decl::Var(var) = decl {
            self.hoist_var_decl(var, target);
        }
    }

    fn hoist_var_decl(&mut self, var: &VarDecl, target: ScopeId) {
        if var.kind != VarDeclKind::Var {
            return;
        }
        for declarator in &var.decls {
            for ident in binding_idents(&declarator.name) {
                self.declare_symbol(
                    ident.sym.as_str(),
                    SymbolKind::Variable,
                    DeclarationKind::Var,
                    ident.span,
                    target,
                );
            }
        }
    }

    /// Declares function, class, `let` and `const` bindings of a statement
    /// list in the scope that owns it.
    fn hoist_lexical(&mut self, decl: &Decl, scope: ScopeId) {
        match decl {
            Decl::Fn(fn_decl) => {
                self.declare_symbol(
                    fn_decl.ident.sym.as_str(),
                    SymbolKind::Function,
                    DeclarationKind::Function,
                    fn_decl.ident.span,
                    scope,
                );
            }
            Decl::Class(class_decl) => {
                self.declare_symbol(
                    class_decl.ident.sym.as_str(),
                    SymbolKind::Class,
                    DeclarationKind::Class,
                    class_decl.ident.span,
                    scope,
                );
            }
            Decl::Var(var) if var.kind != VarDeclKind::Var => self.hoist_lexical_var(var, scope),
            _ => {}
        }
    }

    fn hoist_lexical_var(&mut self, var: &VarDecl, scope: ScopeId) {
        let (kind, decl_kind) = match var.kind {
            VarDeclKind::Const => (SymbolKind::Constant, DeclarationKind::Const),
            _ => (SymbolKind::Variable, DeclarationKind::Let),
        };
        for declarator in &var.decls {
            for ident in binding_idents(&declarator.name) {
                self.declare_symbol(ident.sym.as_str(), kind, decl_kind, ident.span, scope);
            }
        }
    }

    fn hoist_block(&mut self, stmts: &[Stmt], scope: ScopeId) {
        for stmt in stmts {
            if let Stmt::Decl(decl) = stmt {
                self.hoist_lexical(decl, scope);
            }
        }
    }

    fn hoist_function_body(&mut self, stmts: &[Stmt], scope: ScopeId) {
        for stmt in stmts {
            self.hoist_vars(stmt, scope);
        }
        self.hoist_block(stmts, scope);
    }

    fn declare_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        decl_kind: DeclarationKind,
        span: Span,
        scope: ScopeId,
    ) -> SymbolId {
        if let Some(&existing) = self.resolved.get(&span) {
            return existing;
        }

        if let Some(existing) = self.symbol_table.lookup_local(name, scope) {
            let symbol = self.symbol_table.get_mut(existing);
            let redeclarable = matches!(
                symbol.declaration_kind,
                DeclarationKind::Var | DeclarationKind::Function | DeclarationKind::Parameter
            ) && matches!(decl_kind, DeclarationKind::Var | DeclarationKind::Function);
            if redeclarable {
                if decl_kind == DeclarationKind::Function {
                    symbol.kind = SymbolKind::Function;
                    symbol.declaration_kind = DeclarationKind::Function;
                }
                self.resolved.insert(span, existing);
                return existing;
            }
        }

        let id = self
            .symbol_table
            .declare(name, kind, decl_kind, scope, span);
        self.resolved.insert(span, id);
        id
    }

    fn visit_ident_reference(&mut self, ident: &Ident, access: Access) {
        if self.resolved.contains_key(&ident.span) {
            return;
        }
        let name = ident.sym.as_str();
        match self
            .symbol_table
            .lookup(name, self.current, &self.scope_tree)
        {
            Some(symbol_id) => {
                self.resolved.insert(ident.span, symbol_id);
                self.symbol_table.add_reference(
                    symbol_id,
                    Reference {
                        span: ident.span,
                        scope: self.current,
                        access,
                    },
                );
            }
            None => self.unresolved_references.push(UnresolvedReference {
                name: name.to_string(),
                span: ident.span,
                scope: self.current,
            }),
        }
    }

    fn enter_scope(&mut self, kind: ScopeKind, span: Span) -> ScopeId {
        let scope = self
            .scope_tree
            .create_scope(kind, Some(self.current), span);
        self.current = scope;
        scope
    }

    fn exit_scope(&mut self, scope: ScopeId) {
        if let Some(parent) = self.scope_tree.get(scope).parent {
            self.current = parent;
        }
    }

    fn mark_dynamic(&mut self) {
        if let Some(function) = self.scope_tree.enclosing_function(self.current) {
            self.dynamic_scopes.insert(function);
        }
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.visit_decl(decl),
            Stmt::Block(block) => self.visit_block_stmt(block),
            Stmt::If(if_stmt) => {
                self.visit_expr(&if_stmt.test);
                self.visit_stmt(&if_stmt.cons);
                if let Some(alt) = &if_stmt.alt {
                    self.visit_stmt(alt);
                }
            }
            Stmt::For(for_stmt) => {
                let scope = self.enter_scope(ScopeKind::For, for_stmt.span);
                match &for_stmt.init {
                    Some(VarDeclOrExpr::VarDecl(var)) => {
                        if var.kind != VarDeclKind::Var {
                            self.hoist_lexical_var(var, scope);
                        }
                        self.visit_var_decl(var);
                    }
                    Some(VarDeclOrExpr::Expr(expr)) => self.visit_expr(expr),
                    None => {}
                }
                if let Some(test) = &for_stmt.test {
                    self.visit_expr(test);
                }
                if let Some(update) = &for_stmt.update {
                    self.visit_expr(update);
                }
                self.visit_stmt(&for_stmt.body);
                self.exit_scope(scope);
            }
            Stmt::ForIn(for_in) => {
                self.visit_expr(&for_in.right);
                self.visit_for_head(&for_in.left, for_in.span, &for_in.body);
            }
            Stmt::ForOf(for_of) => {
                self.visit_expr(&for_of.right);
                self.visit_for_head(&for_of.left, for_of.span, &for_of.body);
            }
            Stmt::While(while_stmt) => {
                let scope = self.enter_scope(ScopeKind::While, while_stmt.span);
                self.visit_expr(&while_stmt.test);
                self.visit_stmt(&while_stmt.body);
                self.exit_scope(scope);
            }
            Stmt::DoWhile(do_while) => {
                self.visit_stmt(&do_while.body);
                self.visit_expr(&do_while.test);
            }
            Stmt::Switch(switch_stmt) => self.visit_switch_stmt(switch_stmt),
            Stmt::Try(try_stmt) => self.visit_try_stmt(try_stmt),
            Stmt::With(with_stmt) => {
                self.mark_dynamic();
                self.visit_expr(&with_stmt.obj);
                self.visit_stmt(&with_stmt.body);
            }
            Stmt::Labeled(labeled) => self.visit_stmt(&labeled.body),
            Stmt::Return(ret) => {
                if let Some(arg) = &ret.arg {
                    self.visit_expr(arg);
                }
            }
            Stmt::Throw(throw_stmt) => self.visit_expr(&throw_stmt.arg),
            Stmt::Expr(expr_stmt) => self.visit_expr(&expr_stmt.expr),
            _ => {}
        }
    }

    fn visit_for_head(&mut self, head: &'a ForHead, span: Span, body: &'a Stmt) {
        let scope = self.enter_scope(ScopeKind::For, span);
        match head {
            ForHead::VarDecl(var) => {
                if var.kind != VarDeclKind::Var {
                    self.hoist_lexical_var(var, scope);
                }
                self.visit_var_decl(var);
            }
            ForHead::Pat(pat) => self.visit_assign_pat(pat),
            ForHead::UsingDecl(_) => {}
        }
        self.visit_stmt(body);
        self.exit_scope(scope);
    }

    fn visit_decl(&mut self, decl: &'a Decl) {
        match decl {
            Decl::Var(var) => self.visit_var_decl(var),
            Decl::Fn(fn_decl) => {
                self.visit_ident_reference(&fn_decl.ident, Access::Write);
                self.visit_function(&fn_decl.function, None, true);
            }
            Decl::Class(class_decl) => {
                self.visit_ident_reference(&class_decl.ident, Access::Write);
                self.visit_class(&class_decl.class);
            }
            _ => {}
        }
    }

    fn visit_var_decl(&mut self, var: &'a VarDecl) {
        let (kind, decl_kind) = match var.kind {
            VarDeclKind::Var => (SymbolKind::Variable, DeclarationKind::Var),
            VarDeclKind::Let => (SymbolKind::Variable, DeclarationKind::Let),
            VarDeclKind::Const => (SymbolKind::Constant, DeclarationKind::Const),
        };
        for declarator in &var.decls {
            self.declare_pat(&declarator.name, kind, decl_kind);
            if let Some(init) = &declarator.init {
                self.visit_expr(init);
            }
        }
    }

    /// Declares the bindings of a pattern and visits its default values.
    /// Bindings already created by hoisting are reused.
    fn declare_pat(&mut self, pat: &'a Pat, kind: SymbolKind, decl_kind: DeclarationKind) {
        match pat {
            Pat::Ident(binding) => {
                let scope = if decl_kind == DeclarationKind::Var {
                    self.var_scope()
                } else {
                    self.current
                };
                self.declare_symbol(binding.id.sym.as_str(), kind, decl_kind, binding.id.span, scope);
            }
            Pat::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.declare_pat(elem, kind, decl_kind);
                }
            }
            Pat::Object(object) => {
                for prop in &object.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => {
                            if let PropName::Computed(computed) = &kv.key {
                                self.visit_expr(&computed.expr);
                            }
                            self.declare_pat(&kv.value, kind, decl_kind);
                        }
                        ObjectPatProp::Assign(assign) => {
                            let scope = if decl_kind == DeclarationKind::Var {
                                self.var_scope()
                            } else {
                                self.current
                            };
                            self.declare_symbol(
                                assign.key.id.sym.as_str(),
                                kind,
                                decl_kind,
                                assign.key.id.span,
                                scope,
                            );
                            if let Some(value) = &assign.value {
                                self.visit_expr(value);
                            }
                        }
                        ObjectPatProp::Rest(rest) => self.declare_pat(&rest.arg, kind, decl_kind),
                    }
                }
            }
            Pat::Rest(rest) => self.declare_pat(&rest.arg, kind, decl_kind),
            Pat::Assign(assign) => {
                self.declare_pat(&assign.left, kind, decl_kind);
                self.visit_expr(&assign.right);
            }
            Pat::Expr(expr) => self.visit_expr(expr),
            Pat::Invalid(_) => {}
        }
    }

    /// Visits an assignment pattern: identifiers in it are written.
    fn visit_assign_pat(&mut self, pat: &'a Pat) {
        match pat {
            Pat::Ident(binding) => self.visit_ident_reference(&binding.id, Access::Write),
            Pat::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.visit_assign_pat(elem);
                }
            }
            Pat::Object(object) => self.visit_object_assign_pat(&object.props),
            Pat::Rest(rest) => self.visit_assign_pat(&rest.arg),
            Pat::Assign(assign) => {
                self.visit_assign_pat(&assign.left);
                self.visit_expr(&assign.right);
            }
            Pat::Expr(expr) => self.visit_expr(expr),
            Pat::Invalid(_) => {}
        }
    }

    fn visit_object_assign_pat(&mut self, props: &'a [ObjectPatProp]) {
        for prop in props {
            match prop {
                ObjectPatProp::KeyValue(kv) => {
                    self.visit_prop_name(&kv.key);
                    self.visit_assign_pat(&kv.value);
                }
                ObjectPatProp::Assign(assign) => {
                    self.visit_ident_reference(&assign.key.id, Access::Write);
                    if let Some(value) = &assign.value {
                        self.visit_expr(value);
                    }
                }
                ObjectPatProp::Rest(rest) => self.visit_assign_pat(&rest.arg),
            }
        }
    }

    fn var_scope(&self) -> ScopeId {
        self.scope_tree
            .ancestors(self.current)
            .find(|s| s.kind.is_var_target())
            .map(|s| s.id)
            .unwrap_or(self.current)
    }

    fn visit_function(&mut self, func: &'a Function, name: Option<&Ident>, hoisted: bool) {
        for decorator in &func.decorators {
            self.visit_expr(&decorator.expr);
        }
        let Some(body) = &func.body else {
            return;
        };

        let scope = self.enter_scope(ScopeKind::Function, func.span);
        self.node_scopes.insert(func.span, scope);
        self.functions.push(FunctionNode {
            span: func.span,
            scope,
            body: FunctionBody::Block(body),
        });
        if hoisted {
            self.hoisted_functions.insert(scope);
        }
        if let Some(ident) = name {
            self.declare_symbol(
                ident.sym.as_str(),
                SymbolKind::Function,
                DeclarationKind::Function,
                ident.span,
                scope,
            );
        }
        for param in &func.params {
            self.declare_pat(&param.pat, SymbolKind::Parameter, DeclarationKind::Parameter);
        }
        self.hoist_function_body(&body.stmts, scope);
        for stmt in &body.stmts {
            self.visit_stmt(stmt);
        }
        self.exit_scope(scope);
    }

    fn visit_arrow_expr(&mut self, arrow: &'a ArrowExpr) {
        let scope = self.enter_scope(ScopeKind::ArrowFunction, arrow.span);
        self.node_scopes.insert(arrow.span, scope);
        self.functions.push(FunctionNode {
            span: arrow.span,
            scope,
            body: FunctionBody::from(&*arrow.body),
        });
        for param in &arrow.params {
            self.declare_pat(param, SymbolKind::Parameter, DeclarationKind::Parameter);
        }
        match &*arrow.body {
            BlockStmtOrExpr::BlockStmt(block) => {
                self.hoist_function_body(&block.stmts, scope);
                for stmt in &block.stmts {
                    self.visit_stmt(stmt);
                }
            }
            BlockStmtOrExpr::Expr(expr) => self.visit_expr(expr),
        }
        self.exit_scope(scope);
    }

    fn visit_function_body(&mut self, span: Span, param: Option<&'a Pat>, body: &'a BlockStmt) {
        let scope = self.enter_scope(ScopeKind::Function, span);
        self.node_scopes.insert(span, scope);
        self.functions.push(FunctionNode {
            span,
            scope,
            body: FunctionBody::Block(body),
        });
        if let Some(param) = param {
            self.declare_pat(param, SymbolKind::Parameter, DeclarationKind::Parameter);
        }
        self.hoist_function_body(&body.stmts, scope);
        for stmt in &body.stmts {
            self.visit_stmt(stmt);
        }
        self.exit_scope(scope);
    }

    fn visit_class(&mut self, class: &'a Class) {
        for decorator in &class.decorators {
            self.visit_expr(&decorator.expr);
        }
        if let Some(super_class) = &class.super_class {
            self.visit_expr(super_class);
        }

        let scope = self.enter_scope(ScopeKind::Class, class.span);
        self.node_scopes.insert(class.span, scope);

        for member in &class.body {
            match member {
                ClassMember::Method(method) => {
                    self.visit_prop_name(&method.key);
                    self.visit_function(&method.function, None, false);
                }
                ClassMember::PrivateMethod(method) => {
                    self.visit_function(&method.function, None, false);
                }
                ClassMember::Constructor(ctor) => {
                    let Some(body) = &ctor.body else {
                        continue;
                    };
                    let ctor_scope = self.enter_scope(ScopeKind::Function, ctor.span);
                    self.node_scopes.insert(ctor.span, ctor_scope);
                    self.functions.push(FunctionNode {
                        span: ctor.span,
                        scope: ctor_scope,
                        body: FunctionBody::Block(body),
                    });
                    for param in &ctor.params {
                        match param {
                            ParamOrTsParamProp::Param(p) => self.declare_pat(
                                &p.pat,
                                SymbolKind::Parameter,
                                DeclarationKind::Parameter,
                            ),
                            ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
                                TsParamPropParam::Ident(binding) => {
                                    self.declare_symbol(
                                        binding.id.sym.as_str(),
                                        SymbolKind::Parameter,
                                        DeclarationKind::Parameter,
                                        binding.id.span,
                                        ctor_scope,
                                    );
                                }
                                TsParamPropParam::Assign(assign) => self.declare_pat(
                                    &assign.left,
                                    SymbolKind::Parameter,
                                    DeclarationKind::Parameter,
                                ),
                            },
                        }
                    }
                    self.hoist_function_body(&body.stmts, ctor_scope);
                    for stmt in &body.stmts {
                        self.visit_stmt(stmt);
                    }
                    self.exit_scope(ctor_scope);
                }
                ClassMember::ClassProp(prop) => {
                    self.visit_prop_name(&prop.key);
                    if let Some(value) = &prop.value {
                        self.visit_expr(value);
                    }
                }
                ClassMember::PrivateProp(prop) => {
                    if let Some(value) = &prop.value {
                        self.visit_expr(value);
                    }
                }
                ClassMember::StaticBlock(block) => {
                    self.visit_function_body(block.span, None, &block.body);
                }
                _ => {}
            }
        }

        self.exit_scope(scope);
    }

    fn visit_prop_name(&mut self, name: &'a PropName) {
        if let PropName::Computed(computed) = name {
            self.visit_expr(&computed.expr);
        }
    }

    fn visit_block_stmt(&mut self, block: &'a BlockStmt) {
        let scope = self.enter_scope(ScopeKind::Block, block.span);
        self.hoist_block(&block.stmts, scope);
        for stmt in &block.stmts {
            self.visit_stmt(stmt);
        }
        self.exit_scope(scope);
    }

    fn visit_switch_stmt(&mut self, switch_stmt: &'a SwitchStmt) {
        self.visit_expr(&switch_stmt.discriminant);

        let scope = self.enter_scope(ScopeKind::Switch, switch_stmt.span);
        for case in &switch_stmt.cases {
            self.hoist_block(&case.cons, scope);
        }
        for case in &switch_stmt.cases {
            if let Some(test) = &case.test {
                self.visit_expr(test);
            }
            for stmt in &case.cons {
                self.visit_stmt(stmt);
            }
        }
        self.exit_scope(scope);
    }

    fn visit_try_stmt(&mut self, try_stmt: &'a TryStmt) {
        let scope = self.enter_scope(ScopeKind::Try, try_stmt.block.span);
        self.hoist_block(&try_stmt.block.stmts, scope);
        for stmt in &try_stmt.block.stmts {
            self.visit_stmt(stmt);
        }
        self.exit_scope(scope);

        if let Some(handler) = &try_stmt.handler {
            self.visit_catch_clause(handler);
        }
        if let Some(finalizer) = &try_stmt.finalizer {
            self.visit_block_stmt(finalizer);
        }
    }

    fn visit_catch_clause(&mut self, catch: &'a CatchClause) {
        let scope = self.enter_scope(ScopeKind::Catch, catch.span);
        if let Some(param) = &catch.param {
            self.declare_pat(param, SymbolKind::CatchParameter, DeclarationKind::Catch);
        }
        self.hoist_block(&catch.body.stmts, scope);
        for stmt in &catch.body.stmts {
            self.visit_stmt(stmt);
        }
        self.exit_scope(scope);
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Ident(ident) => self.visit_ident_reference(ident, Access::Read),
            Expr::Arrow(arrow) => self.visit_arrow_expr(arrow),
            Expr::Fn(fn_expr) => {
                self.visit_function(&fn_expr.function, fn_expr.ident.as_ref(), false)
            }
            Expr::Class(class_expr) => self.visit_class(&class_expr.class),
            Expr::Call(call) => {
                if let Callee::Expr(callee) = &call.callee {
                    if matches!(&**callee, Expr::Ident(ident) if ident.sym.as_str() == "eval") {
                        self.mark_dynamic();
                    }
                    self.visit_expr(callee);
                }
                for arg in &call.args {
                    self.visit_expr(&arg.expr);
                }
            }
            Expr::New(new_expr) => {
                self.visit_expr(&new_expr.callee);
                for arg in new_expr.args.iter().flatten() {
                    self.visit_expr(&arg.expr);
                }
            }
            Expr::Member(member) => {
                self.visit_expr(&member.obj);
                if let MemberProp::Computed(computed) = &member.prop {
                    self.visit_expr(&computed.expr);
                }
            }
            Expr::SuperProp(super_prop) => {
                if let swc_ecma_ast::SuperProp::Computed(computed) = &super_prop.prop {
                    self.visit_expr(&computed.expr);
                }
            }
            Expr::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.visit_expr(&elem.expr);
                }
            }
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        PropOrSpread::Spread(spread) => self.visit_expr(&spread.expr),
                        PropOrSpread::Prop(prop) => self.visit_prop(prop),
                    }
                }
            }
            Expr::Assign(assign) => {
                let access = if assign.op == AssignOp::Assign {
                    Access::Write
                } else {
                    Access::ReadWrite
                };
                match &assign.left {
                    AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                        self.visit_ident_reference(&binding.id, access);
                    }
                    AssignTarget::Simple(simple) => self.visit_simple_target(simple),
                    AssignTarget::Pat(AssignTargetPat::Array(array)) => {
                        for elem in array.elems.iter().flatten() {
                            self.visit_assign_pat(elem);
                        }
                    }
                    AssignTarget::Pat(AssignTargetPat::Object(object)) => {
                        self.visit_object_assign_pat(&object.props);
                    }
                    AssignTarget::Pat(AssignTargetPat::Invalid(_)) => {}
                }
                self.visit_expr(&assign.right);
            }
            Expr::Update(update) => match &*update.arg {
                Expr::Ident(ident) => self.visit_ident_reference(ident, Access::ReadWrite),
                other => self.visit_expr(other),
            },
            Expr::Bin(bin) => {
                self.visit_expr(&bin.left);
                self.visit_expr(&bin.right);
            }
            Expr::Unary(unary) => self.visit_expr(&unary.arg),
            Expr::Cond(cond) => {
                self.visit_expr(&cond.test);
                self.visit_expr(&cond.cons);
                self.visit_expr(&cond.alt);
            }
            Expr::Seq(seq) => {
                for e in &seq.exprs {
                    self.visit_expr(e);
                }
            }
            Expr::Paren(paren) => self.visit_expr(&paren.expr),
            Expr::Tpl(tpl) => {
                for e in &tpl.exprs {
                    self.visit_expr(e);
                }
            }
            Expr::TaggedTpl(tagged) => {
                self.visit_expr(&tagged.tag);
                for e in &tagged.tpl.exprs {
                    self.visit_expr(e);
                }
            }
            Expr::Yield(yield_expr) => {
                if let Some(arg) = &yield_expr.arg {
                    self.visit_expr(arg);
                }
            }
            Expr::Await(await_expr) => self.visit_expr(&await_expr.arg),
            Expr::OptChain(opt_chain) => self.visit_opt_chain(opt_chain),
            Expr::TsAs(ts_as) => self.visit_expr(&ts_as.expr),
            Expr::TsTypeAssertion(assertion) => self.visit_expr(&assertion.expr),
            Expr::TsNonNull(non_null) => self.visit_expr(&non_null.expr),
            Expr::TsSatisfies(satisfies) => self.visit_expr(&satisfies.expr),
            Expr::TsConstAssertion(assertion) => self.visit_expr(&assertion.expr),
            Expr::TsInstantiation(inst) => self.visit_expr(&inst.expr),
            Expr::JSXElement(element) => self.visit_jsx_element(element),
            Expr::JSXFragment(fragment) => {
                for child in &fragment.children {
                    self.visit_jsx_child(child);
                }
            }
            _ => {}
        }
    }

    fn visit_opt_chain(&mut self, opt_chain: &'a OptChainExpr) {
        match &*opt_chain.base {
            OptChainBase::Member(member) => {
                self.visit_expr(&member.obj);
                if let MemberProp::Computed(computed) = &member.prop {
                    self.visit_expr(&computed.expr);
                }
            }
            OptChainBase::Call(call) => {
                self.visit_expr(&call.callee);
                for arg in &call.args {
                    self.visit_expr(&arg.expr);
                }
            }
        }
    }

    fn visit_simple_target(&mut self, target: &'a SimpleAssignTarget) {
        match target {
            SimpleAssignTarget::Ident(binding) => {
                self.visit_ident_reference(&binding.id, Access::Write)
            }
            SimpleAssignTarget::Member(member) => {
                self.visit_expr(&member.obj);
                if let MemberProp::Computed(computed) = &member.prop {
                    self.visit_expr(&computed.expr);
                }
            }
            SimpleAssignTarget::Paren(paren) => self.visit_expr(&paren.expr),
            SimpleAssignTarget::OptChain(opt_chain) => self.visit_opt_chain(opt_chain),
            SimpleAssignTarget::TsAs(ts_as) => self.visit_expr(&ts_as.expr),
            SimpleAssignTarget::TsNonNull(non_null) => self.visit_expr(&non_null.expr),
            SimpleAssignTarget::TsSatisfies(satisfies) => self.visit_expr(&satisfies.expr),
            SimpleAssignTarget::TsTypeAssertion(assertion) => self.visit_expr(&assertion.expr),
            _ => {}
        }
    }

    fn visit_prop(&mut self, prop: &'a Prop) {
        match prop {
            Prop::Shorthand(ident) => self.visit_ident_reference(ident, Access::Read),
            Prop::KeyValue(kv) => {
                self.visit_prop_name(&kv.key);
                self.visit_expr(&kv.value);
            }
            Prop::Assign(assign) => self.visit_expr(&assign.value),
            Prop::Getter(getter) => {
                self.visit_prop_name(&getter.key);
                if let Some(body) = &getter.body {
                    self.visit_function_body(getter.span, None, body);
                }
            }
            Prop::Setter(setter) => {
                self.visit_prop_name(&setter.key);
                if let Some(body) = &setter.body {
                    self.visit_function_body(setter.span, Some(&*setter.param), body);
                }
            }
            Prop::Method(method) => {
                self.visit_prop_name(&method.key);
                self.visit_function(&method.function, None, false);
            }
        }
    }

    fn visit_jsx_element(&mut self, element: &'a JSXElement) {
        for attr in &element.opening.attrs {
            match attr {
                JSXAttrOrSpread::JSXAttr(attr) => match &attr.value {
                    Some(JSXAttrValue::JSXExprContainer(container)) => {
                        if let JSXExpr::Expr(e) = &container.expr {
                            self.visit_expr(e);
                        }
                    }
                    Some(JSXAttrValue::JSXElement(nested)) => self.visit_jsx_element(nested),
                    Some(JSXAttrValue::JSXFragment(fragment)) => {
                        for child in &fragment.children {
                            self.visit_jsx_child(child);
                        }
                    }
                    _ => {}
                },
                JSXAttrOrSpread::SpreadElement(spread) => self.visit_expr(&spread.expr),
            }
        }
        for child in &element.children {
            self.visit_jsx_child(child);
        }
    }

    fn visit_jsx_child(&mut self, child: &'a JSXElementChild) {
        match child {
            JSXElementChild::JSXExprContainer(container) => {
                if let JSXExpr::Expr(e) = &container.expr {
                    self.visit_expr(e);
                }
            }
            JSXElementChild::JSXSpreadChild(spread) => self.visit_expr(&spread.expr),
            JSXElementChild::JSXElement(element) => self.visit_jsx_element(element),
            JSXElementChild::JSXFragment(fragment) => {
                for child in &fragment.children {
                    self.visit_jsx_child(child);
                }
            }
            JSXElementChild::JSXText(_) => {}
        }
    }
}

/// Binding identifiers introduced by a declaration pattern, in source order.
pub fn binding_idents(pat: &Pat) -> Vec<&Ident> {
    let mut out = Vec::new();
    collect_binding_idents(pat, &mut out);
    out
}

fn collect_binding_idents<'a>(pat: &'a Pat, out: &mut Vec<&'a Ident>) {
    match pat {
        Pat::Ident(binding) => out.push(&binding.id),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                collect_binding_idents(elem, out);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => collect_binding_idents(&kv.value, out),
                    ObjectPatProp::Assign(assign) => out.push(&assign.key.id),
                    ObjectPatProp::Rest(rest) => collect_binding_idents(&rest.arg, out),
                }
            }
        }
        Pat::Rest(rest) => collect_binding_idents(&rest.arg, out),
        Pat::Assign(assign) => collect_binding_idents(&assign.left, out),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}

/// The expression with surrounding parentheses removed.
pub fn unparen(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(paren) => unparen(&paren.expr),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;

    fn build(code: &str) -> (ParsedFile, SemanticModel) {
        let parsed = ParsedFile::from_source("test.js", code);
        let model = ScopeBuilder::build(parsed.module().expect("parse failed"));
        (parsed, model)
    }

    fn symbols_named<'a>(model: &'a SemanticModel, name: &str) -> Vec<&'a crate::semantic::Symbol> {
        model
            .symbol_table
            .all_symbols()
            .filter(|s| s.name == name)
            .collect()
    }

    #[test]
    fn var_hoists_to_function_scope() {
        let (_, model) = build(
            r#"
function test() {
    if (true) {
        var hoisted = 1;
    }
    return hoisted;
}
"#,
        );

        let hoisted = symbols_named(&model, "hoisted");
        assert_eq!(hoisted.len(), 1);
        assert_eq!(
            model.scope_tree.get(hoisted[0].scope).kind,
            ScopeKind::Function
        );
        assert_eq!(hoisted[0].references.len(), 1);
        assert!(model.unresolved_references.is_empty());
    }

    #[test]
    fn reference_before_var_declaration_resolves_locally() {
        let (_, model) = build("function f() { x = 1; var x; }");

        let x = symbols_named(&model, "x");
        assert_eq!(x.len(), 1);
        assert_eq!(x[0].references.len(), 1);
        assert_eq!(x[0].references[0].access, Access::Write);
    }

    #[test]
    fn let_respects_block_scope() {
        let (_, model) = build("function f() { let a = 1; { let a = 2; a; } a; }");

        let a = symbols_named(&model, "a");
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|s| s.references.len() == 1));
    }

    #[test]
    fn var_and_function_with_same_name_share_a_function_symbol() {
        let (_, model) = build("function f() { var g; function g() {} g(); }");

        let g = symbols_named(&model, "g");
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].kind, SymbolKind::Function);
    }

    #[test]
    fn parameters_and_catch_bindings_are_declared() {
        let (_, model) = build("function f(a, { b, c: [d] }) { try {} catch (e) { e; } }");

        for name in ["a", "b", "d"] {
            assert_eq!(symbols_named(&model, name)[0].kind, SymbolKind::Parameter);
        }
        assert_eq!(
            symbols_named(&model, "e")[0].kind,
            SymbolKind::CatchParameter
        );
    }

    #[test]
    fn assignments_are_recorded_as_writes() {
        let (_, model) = build("function f() { var x, y, z; x = 1; y += 2; z++; [x] = [1]; }");

        let accesses = |name: &str| -> Vec<Access> {
            symbols_named(&model, name)[0]
                .references
                .iter()
                .map(|r| r.access)
                .collect()
        };
        assert_eq!(accesses("x"), vec![Access::Write, Access::Write]);
        assert_eq!(accesses("y"), vec![Access::ReadWrite]);
        assert_eq!(accesses("z"), vec![Access::ReadWrite]);
    }

    #[test]
    fn function_nodes_map_to_their_scopes() {
        let (parsed, model) = build("function f() { const g = () => 1; }");
        let module = parsed.module().unwrap();
        let ModuleItem::Stmt(Stmt::Decl(Decl::Fn(f))) = &module.body[0] else {
            panic!("expected function declaration");
        };

        let scope = model.scope_of_node(f.function.span).unwrap();

        assert_eq!(model.scope_tree.get(scope).kind, ScopeKind::Function);
        assert!(model.is_hoisted_function(scope));
        let arrows: Vec<_> = model
            .scope_tree
            .children(scope)
            .filter(|s| s.kind == ScopeKind::ArrowFunction)
            .collect();
        assert_eq!(arrows.len(), 1);
        assert!(!model.is_hoisted_function(arrows[0].id));
    }

    #[test]
    fn unresolved_globals_are_collected() {
        let (_, model) = build("function f() { console.log(window); }");

        let names: Vec<_> = model
            .unresolved_references
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["console", "window"]);
    }

    #[test]
    fn with_and_eval_mark_the_enclosing_function() {
        let (parsed, model) = build(
            "function a(o) { with (o) { x; } }\nfunction b() { eval('1'); }\nfunction c() {}",
        );
        let module = parsed.module().unwrap();
        let dynamic: Vec<bool> = module
            .body
            .iter()
            .filter_map(|item| match item {
                ModuleItem::Stmt(Stmt::Decl(Decl::Fn(f))) => model.scope_of_node(f.function.span),
                _ => None,
            })
            .map(|scope| model.has_dynamic_bindings(scope))
            .collect();

        assert_eq!(dynamic, vec![true, true, false]);
    }
}
