//! Control flow graph of a single function body
//!
//! Blocks hold the elements the symbolic engine evaluates, in order:
//! expression statements, declarations, loop bindings, catch parameters and
//! branch tests. A block whose last element is a test has explicit true and
//! false successors. Blocks inside a `try` record where an exception goes.

use id_arena::{Arena, Id};
use swc_common::{Span, Spanned};
use swc_ecma_ast::{
    BlockStmt, BlockStmtOrExpr, Class, DoWhileStmt, Expr, ForHead, ForInStmt, ForOfStmt,
    ForStmt, IfStmt, LabeledStmt, Pat, Stmt, SwitchStmt, TryStmt, VarDeclKind, VarDeclOrExpr,
    VarDeclarator, WhileStmt,
};

pub type BasicBlockId = Id<BasicBlock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicBlockKind {
    Entry,
    Exit,
    Normal,
    Condition,
    LoopHeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    pub on_true: BasicBlockId,
    pub on_false: BasicBlockId,
}

#[derive(Debug)]
pub struct BasicBlock {
    pub id: BasicBlockId,
    pub kind: BasicBlockKind,
    pub predecessors: Vec<BasicBlockId>,
    pub successors: Vec<BasicBlockId>,
    pub branch: Option<Branch>,
    /// Where control goes if an element of this block throws.
    pub exception_target: Option<BasicBlockId>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
    Expr(&'a Expr),
    Declare {
        declarator: &'a VarDeclarator,
        kind: VarDeclKind,
    },
    /// Evaluation of the object iterated by `for-in` (`of == false`) or
    /// `for-of` (`of == true`), once before the loop.
    Iterate { expr: &'a Expr, of: bool },
    /// Assignment of the next key or item to the loop variable.
    Bind(&'a ForHead),
    CatchParam(&'a Pat),
    Class(&'a Class),
    Test(&'a Expr),
}

impl Element<'_> {
    pub fn span(&self) -> Span {
        match self {
            Element::Expr(expr) | Element::Test(expr) => expr.span(),
            Element::Declare { declarator, .. } => declarator.span,
            Element::Iterate { expr, .. } => expr.span(),
            Element::Bind(head) => head.span(),
            Element::CatchParam(pat) => pat.span(),
            Element::Class(class) => class.span,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FunctionBody<'a> {
    Block(&'a BlockStmt),
    Expr(&'a Expr),
}

impl<'a> From<&'a BlockStmtOrExpr> for FunctionBody<'a> {
    fn from(body: &'a BlockStmtOrExpr) -> Self {
        match body {
            BlockStmtOrExpr::BlockStmt(block) => FunctionBody::Block(block),
            BlockStmtOrExpr::Expr(expr) => FunctionBody::Expr(expr),
        }
    }
}

#[derive(Debug)]
pub struct ControlFlowGraph<'a> {
    blocks: Arena<BasicBlock>,
    elements: Vec<Vec<Element<'a>>>,
    entry: BasicBlockId,
    exit: BasicBlockId,
}

impl<'a> ControlFlowGraph<'a> {
    pub fn build(body: FunctionBody<'a>) -> Self {
        let mut blocks = Arena::new();
        let entry = alloc_block(&mut blocks, BasicBlockKind::Entry, None, None);
        let exit = alloc_block(&mut blocks, BasicBlockKind::Exit, None, None);
        let mut builder = CfgBuilder {
            graph: ControlFlowGraph {
                blocks,
                elements: vec![Vec::new(), Vec::new()],
                entry,
                exit,
            },
            exception_targets: Vec::new(),
            jump_targets: Vec::new(),
        };

        let start = builder.create_block(BasicBlockKind::Normal, None);
        builder.add_edge(entry, start);
        let end = match body {
            FunctionBody::Block(block) => builder.build_stmts(&block.stmts, start),
            FunctionBody::Expr(expr) => {
                builder.push(start, Element::Expr(expr));
                start
            }
        };
        builder.add_edge(end, exit);
        builder.graph
    }

    pub fn entry(&self) -> BasicBlockId {
        self.entry
    }

    pub fn exit(&self) -> BasicBlockId {
        self.exit
    }

    pub fn get(&self, id: BasicBlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn elements(&self, id: BasicBlockId) -> &[Element<'a>] {
        self.elements
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().map(|(_, block)| block)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn successors(&self, id: BasicBlockId) -> impl Iterator<Item = &BasicBlock> {
        self.blocks[id]
            .successors
            .iter()
            .map(|&succ| &self.blocks[succ])
    }

    pub fn predecessors(&self, id: BasicBlockId) -> impl Iterator<Item = &BasicBlock> {
        self.blocks[id]
            .predecessors
            .iter()
            .map(|&pred| &self.blocks[pred])
    }

    /// Loop bodies are allocated after their header, so an edge into a
    /// header from a later block closes an iteration.
    pub fn has_back_edge(&self, from: BasicBlockId, to: BasicBlockId) -> bool {
        self.blocks[to].kind == BasicBlockKind::LoopHeader
            && from.index() > to.index()
            && self.blocks[from].successors.contains(&to)
    }

    /// Like [`ControlFlowGraph::get`], for ids that may not belong to this graph.
    pub fn block(&self, id: BasicBlockId) -> Option<&BasicBlock> {
        self.blocks.get(id)
    }
}

fn alloc_block(
    blocks: &mut Arena<BasicBlock>,
    kind: BasicBlockKind,
    span: Option<Span>,
    exception_target: Option<BasicBlockId>,
) -> BasicBlockId {
    blocks.alloc_with_id(|id| BasicBlock {
        id,
        kind,
        predecessors: Vec::new(),
        successors: Vec::new(),
        branch: None,
        exception_target,
        span,
    })
}

struct JumpTarget<'a> {
    label: Option<&'a str>,
    break_to: BasicBlockId,
    continue_to: Option<BasicBlockId>,
    /// Whether an unlabeled `break` may target it (loops and switches).
    breakable: bool,
}

struct CfgBuilder<'a> {
    graph: ControlFlowGraph<'a>,
    exception_targets: Vec<BasicBlockId>,
    jump_targets: Vec<JumpTarget<'a>>,
}

impl<'a> CfgBuilder<'a> {
    fn create_block(&mut self, kind: BasicBlockKind, span: Option<Span>) -> BasicBlockId {
        let target = self.exception_targets.last().copied();
        let id = alloc_block(&mut self.graph.blocks, kind, span, target);
        self.graph.elements.push(Vec::new());
        id
    }

    fn add_edge(&mut self, from: BasicBlockId, to: BasicBlockId) {
        let blocks = &mut self.graph.blocks;
        if !blocks[from].successors.contains(&to) {
            blocks[from].successors.push(to);
        }
        if !blocks[to].predecessors.contains(&from) {
            blocks[to].predecessors.push(from);
        }
    }

    fn push(&mut self, block: BasicBlockId, element: Element<'a>) {
        if let Some(elements) = self.graph.elements.get_mut(block.index()) {
            elements.push(element);
        }
    }

    /// Ends `block` with a test branching to `on_true` and `on_false`.
    fn branch(
        &mut self,
        block: BasicBlockId,
        test: &'a Expr,
        on_true: BasicBlockId,
        on_false: BasicBlockId,
    ) {
        self.push(block, Element::Test(test));
        self.add_edge(block, on_true);
        self.add_edge(block, on_false);
        self.graph.blocks[block].branch = Some(Branch { on_true, on_false });
    }

    /// Block for the statements following a jump. Nothing flows into it.
    fn unreachable(&mut self) -> BasicBlockId {
        self.create_block(BasicBlockKind::Normal, None)
    }

    fn throw_target(&self) -> BasicBlockId {
        self.exception_targets
            .last()
            .copied()
            .unwrap_or(self.graph.exit)
    }

    fn build_stmts(&mut self, stmts: &'a [Stmt], current: BasicBlockId) -> BasicBlockId {
        stmts
            .iter()
            .fold(current, |block, stmt| self.build_stmt(stmt, block))
    }

    fn build_stmt(&mut self, stmt: &'a Stmt, current: BasicBlockId) -> BasicBlockId {
        match stmt {
            Stmt::Block(block) => self.build_stmts(&block.stmts, current),
            Stmt::Expr(expr_stmt) => {
                self.push(current, Element::Expr(&expr_stmt.expr));
                current
            }
            Stmt::Decl(swc_ecma_ast::Decl::Var(var)) => {
                for declarator in &var.decls {
                    self.push(
                        current,
                        Element::Declare {
                            declarator,
                            kind: var.kind,
                        },
                    );
                }
                current
            }
            Stmt::Decl(swc_ecma_ast::Decl::Class(class_decl)) => {
                self.push(current, Element::Class(&class_decl.class));
                current
            }
            Stmt::If(if_stmt) => self.build_if_stmt(if_stmt, current),
            Stmt::For(for_stmt) => self.build_for_stmt(for_stmt, current, None),
            Stmt::ForIn(for_in) => self.build_for_in_stmt(for_in, current, None),
            Stmt::ForOf(for_of) => self.build_for_of_stmt(for_of, current, None),
            Stmt::While(while_stmt) => self.build_while_stmt(while_stmt, current, None),
            Stmt::DoWhile(do_while) => self.build_do_while_stmt(do_while, current, None),
            Stmt::Labeled(labeled) => self.build_labeled_stmt(labeled, current),
            Stmt::Switch(switch_stmt) => self.build_switch_stmt(switch_stmt, current),
            Stmt::Try(try_stmt) => self.build_try_stmt(try_stmt, current),
            Stmt::With(with_stmt) => {
                self.push(current, Element::Expr(&with_stmt.obj));
                self.build_stmt(&with_stmt.body, current)
            }
            Stmt::Return(ret) => {
                if let Some(arg) = &ret.arg {
                    self.push(current, Element::Expr(arg));
                }
                let exit = self.graph.exit;
                self.add_edge(current, exit);
                self.unreachable()
            }
            Stmt::Throw(throw_stmt) => {
                self.push(current, Element::Expr(&throw_stmt.arg));
                let target = self.throw_target();
                self.add_edge(current, target);
                self.unreachable()
            }
            Stmt::Break(break_stmt) => {
                let label = break_stmt.label.as_ref().map(|l| l.sym.as_str());
                if let Some(target) = self.find_break_target(label) {
                    self.add_edge(current, target);
                }
                self.unreachable()
            }
            Stmt::Continue(continue_stmt) => {
                let label = continue_stmt.label.as_ref().map(|l| l.sym.as_str());
                if let Some(target) = self.find_continue_target(label) {
                    self.add_edge(current, target);
                }
                self.unreachable()
            }
            _ => current,
        }
    }

    fn find_break_target(&self, label: Option<&str>) -> Option<BasicBlockId> {
        self.jump_targets
            .iter()
            .rev()
            .find(|t| match label {
                Some(label) => t.label == Some(label),
                None => t.breakable,
            })
            .map(|t| t.break_to)
    }

    fn find_continue_target(&self, label: Option<&str>) -> Option<BasicBlockId> {
        self.jump_targets
            .iter()
            .rev()
            .filter(|t| t.continue_to.is_some())
            .find(|t| label.is_none() || t.label == label)
            .and_then(|t| t.continue_to)
    }

    fn build_loop_body(
        &mut self,
        body: &'a Stmt,
        start: BasicBlockId,
        label: Option<&'a str>,
        break_to: BasicBlockId,
        continue_to: BasicBlockId,
    ) -> BasicBlockId {
        self.jump_targets.push(JumpTarget {
            label,
            break_to,
            continue_to: Some(continue_to),
            breakable: true,
        });
        let end = self.build_stmt(body, start);
        self.jump_targets.pop();
        end
    }

    fn build_if_stmt(&mut self, if_stmt: &'a IfStmt, current: BasicBlockId) -> BasicBlockId {
        let condition = self.create_block(BasicBlockKind::Condition, Some(if_stmt.test.span()));
        self.add_edge(current, condition);

        let then_start = self.create_block(BasicBlockKind::Normal, Some(if_stmt.cons.span()));
        let after = self.create_block(BasicBlockKind::Normal, None);

        match &if_stmt.alt {
            Some(alt) => {
                let else_start = self.create_block(BasicBlockKind::Normal, Some(alt.span()));
                self.branch(condition, &if_stmt.test, then_start, else_start);
                let else_end = self.build_stmt(alt, else_start);
                self.add_edge(else_end, after);
            }
            None => self.branch(condition, &if_stmt.test, then_start, after),
        }

        let then_end = self.build_stmt(&if_stmt.cons, then_start);
        self.add_edge(then_end, after);
        after
    }

    fn build_while_stmt(
        &mut self,
        while_stmt: &'a WhileStmt,
        current: BasicBlockId,
        label: Option<&'a str>,
    ) -> BasicBlockId {
        let header = self.create_block(BasicBlockKind::LoopHeader, Some(while_stmt.span));
        self.add_edge(current, header);

        let body_start = self.create_block(BasicBlockKind::Normal, Some(while_stmt.body.span()));
        let after = self.create_block(BasicBlockKind::Normal, None);
        self.branch(header, &while_stmt.test, body_start, after);

        let body_end = self.build_loop_body(&while_stmt.body, body_start, label, after, header);
        self.add_edge(body_end, header);
        after
    }

    fn build_do_while_stmt(
        &mut self,
        do_while: &'a DoWhileStmt,
        current: BasicBlockId,
        label: Option<&'a str>,
    ) -> BasicBlockId {
        let header = self.create_block(BasicBlockKind::LoopHeader, Some(do_while.body.span()));
        self.add_edge(current, header);

        let condition = self.create_block(BasicBlockKind::Condition, Some(do_while.test.span()));
        let after = self.create_block(BasicBlockKind::Normal, None);

        let body_end = self.build_loop_body(&do_while.body, header, label, after, condition);
        self.add_edge(body_end, condition);
        self.branch(condition, &do_while.test, header, after);
        after
    }

    fn build_for_stmt(
        &mut self,
        for_stmt: &'a ForStmt,
        current: BasicBlockId,
        label: Option<&'a str>,
    ) -> BasicBlockId {
        match &for_stmt.init {
            Some(VarDeclOrExpr::VarDecl(var)) => {
                for declarator in &var.decls {
                    self.push(
                        current,
                        Element::Declare {
                            declarator,
                            kind: var.kind,
                        },
                    );
                }
            }
            Some(VarDeclOrExpr::Expr(expr)) => self.push(current, Element::Expr(expr)),
            None => {}
        }

        let header = self.create_block(BasicBlockKind::LoopHeader, Some(for_stmt.span));
        self.add_edge(current, header);

        let body_start = self.create_block(BasicBlockKind::Normal, Some(for_stmt.body.span()));
        let after = self.create_block(BasicBlockKind::Normal, None);
        match &for_stmt.test {
            Some(test) => self.branch(header, test, body_start, after),
            None => self.add_edge(header, body_start),
        }

        let update = match &for_stmt.update {
            Some(update) => {
                let block = self.create_block(BasicBlockKind::Normal, Some(update.span()));
                self.push(block, Element::Expr(update));
                self.add_edge(block, header);
                block
            }
            None => header,
        };

        let body_end = self.build_loop_body(&for_stmt.body, body_start, label, after, update);
        self.add_edge(body_end, update);
        after
    }

    fn build_iteration(
        &mut self,
        right: &'a Expr,
        left: &'a ForHead,
        body: &'a Stmt,
        span: Span,
        of: bool,
        current: BasicBlockId,
        label: Option<&'a str>,
    ) -> BasicBlockId {
        self.push(current, Element::Iterate { expr: right, of });

        let header = self.create_block(BasicBlockKind::LoopHeader, Some(span));
        self.add_edge(current, header);

        let body_start = self.create_block(BasicBlockKind::Normal, Some(body.span()));
        self.push(body_start, Element::Bind(left));
        let after = self.create_block(BasicBlockKind::Normal, None);
        self.add_edge(header, body_start);
        self.add_edge(header, after);

        let body_end = self.build_loop_body(body, body_start, label, after, header);
        self.add_edge(body_end, header);
        after
    }

    fn build_for_in_stmt(
        &mut self,
        for_in: &'a ForInStmt,
        current: BasicBlockId,
        label: Option<&'a str>,
    ) -> BasicBlockId {
        self.build_iteration(
            &for_in.right,
            &for_in.left,
            &for_in.body,
            for_in.span,
            false,
            current,
            label,
        )
    }

    fn build_for_of_stmt(
        &mut self,
        for_of: &'a ForOfStmt,
        current: BasicBlockId,
        label: Option<&'a str>,
    ) -> BasicBlockId {
        self.build_iteration(
            &for_of.right,
            &for_of.left,
            &for_of.body,
            for_of.span,
            true,
            current,
            label,
        )
    }

    fn build_labeled_stmt(
        &mut self,
        labeled: &'a LabeledStmt,
        current: BasicBlockId,
    ) -> BasicBlockId {
        let label = Some(labeled.label.sym.as_str());
        match &*labeled.body {
            Stmt::For(for_stmt) => self.build_for_stmt(for_stmt, current, label),
            Stmt::ForIn(for_in) => self.build_for_in_stmt(for_in, current, label),
            Stmt::ForOf(for_of) => self.build_for_of_stmt(for_of, current, label),
            Stmt::While(while_stmt) => self.build_while_stmt(while_stmt, current, label),
            Stmt::DoWhile(do_while) => self.build_do_while_stmt(do_while, current, label),
            body => {
                let after = self.create_block(BasicBlockKind::Normal, None);
                self.jump_targets.push(JumpTarget {
                    label,
                    break_to: after,
                    continue_to: None,
                    breakable: false,
                });
                let end = self.build_stmt(body, current);
                self.jump_targets.pop();
                self.add_edge(end, after);
                after
            }
        }
    }

    fn build_switch_stmt(
        &mut self,
        switch_stmt: &'a SwitchStmt,
        current: BasicBlockId,
    ) -> BasicBlockId {
        self.push(current, Element::Expr(&switch_stmt.discriminant));

        let dispatch = self.create_block(
            BasicBlockKind::Normal,
            Some(switch_stmt.discriminant.span()),
        );
        self.add_edge(current, dispatch);
        for test in switch_stmt.cases.iter().filter_map(|c| c.test.as_deref()) {
            self.push(dispatch, Element::Expr(test));
        }

        let after = self.create_block(BasicBlockKind::Normal, None);
        self.jump_targets.push(JumpTarget {
            label: None,
            break_to: after,
            continue_to: None,
            breakable: true,
        });

        let mut previous_end: Option<BasicBlockId> = None;
        for case in &switch_stmt.cases {
            let case_start = self.create_block(BasicBlockKind::Normal, Some(case.span));
            self.add_edge(dispatch, case_start);
            if let Some(end) = previous_end {
                self.add_edge(end, case_start);
            }
            previous_end = Some(self.build_stmts(&case.cons, case_start));
        }
        self.jump_targets.pop();

        if let Some(end) = previous_end {
            self.add_edge(end, after);
        }
        if !switch_stmt.cases.iter().any(|c| c.test.is_none()) {
            self.add_edge(dispatch, after);
        }
        after
    }

    fn build_try_stmt(&mut self, try_stmt: &'a TryStmt, current: BasicBlockId) -> BasicBlockId {
        let finally_start = try_stmt
            .finalizer
            .as_ref()
            .map(|f| self.create_block(BasicBlockKind::Normal, Some(f.span)));
        let catch_start = match &try_stmt.handler {
            Some(handler) => {
                if let Some(finally) = finally_start {
                    self.exception_targets.push(finally);
                }
                let block = self.create_block(BasicBlockKind::Normal, Some(handler.span));
                if finally_start.is_some() {
                    self.exception_targets.pop();
                }
                Some(block)
            }
            None => None,
        };
        let after = self.create_block(BasicBlockKind::Normal, None);

        let handler_entry = catch_start.or(finally_start);
        if let Some(entry) = handler_entry {
            self.exception_targets.push(entry);
        }
        let try_start = self.create_block(BasicBlockKind::Normal, Some(try_stmt.block.span));
        self.add_edge(current, try_start);
        let try_end = self.build_stmts(&try_stmt.block.stmts, try_start);
        if handler_entry.is_some() {
            self.exception_targets.pop();
        }
        let normal_exit = finally_start.unwrap_or(after);
        self.add_edge(try_end, normal_exit);

        if let (Some(handler), Some(catch_start)) = (&try_stmt.handler, catch_start) {
            if let Some(finally) = finally_start {
                self.exception_targets.push(finally);
            }
            if let Some(param) = &handler.param {
                self.push(catch_start, Element::CatchParam(param));
            }
            let catch_end = self.build_stmts(&handler.body.stmts, catch_start);
            if finally_start.is_some() {
                self.exception_targets.pop();
            }
            self.add_edge(catch_end, normal_exit);
        }

        if let (Some(finalizer), Some(finally_start)) = (&try_stmt.finalizer, finally_start) {
            let finally_end = self.build_stmts(&finalizer.stmts, finally_start);
            self.add_edge(finally_end, after);
            let rethrow = self.throw_target();
            self.add_edge(finally_end, rethrow);
        }

        after
    }
}
