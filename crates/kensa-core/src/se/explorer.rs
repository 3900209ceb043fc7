//! Path exploration over a function's control flow graph
//!
//! Each path carries one program state. Paths fork at branching tests and
//! whenever an element evaluates to several states, and paths reaching a
//! block with a state already seen there are dropped. Dead symbols are
//! removed from every state, so paths that differ only in values nobody
//! reads again coalesce.
//!
//! Loops are re-entered a bounded number of times, then the state is
//! widened against the one that first entered the loop. When a function
//! produces too many states or steps, exploration degrades to a dataflow
//! pass with one merged state per block.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use swc_ecma_ast::{
    ArrowExpr, AwaitExpr, CallExpr, Class, Expr, Function, MemberExpr, Module, NewExpr,
    OptChainExpr, Pat, SuperPropExpr, TaggedTpl, YieldExpr,
};
use swc_ecma_visit::{Visit, VisitWith};
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::semantic::{
    BasicBlock, BasicBlockId, BasicBlockKind, ControlFlowGraph, Element, FunctionNode,
    ScopeBuilder, SemanticModel,
};

use super::EngineError;
use super::liveness::Liveness;
use super::narrowing::{Evaluator, Event};
use super::observer::{Condition, Dereference, FunctionContext, FunctionOutcome, Observer};
use super::state::ProgramState;
use super::tracking::TrackedSymbols;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub functions: usize,
    pub degraded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

pub struct SymbolicEngine {
    config: EngineConfig,
    cancelled: Option<Arc<AtomicBool>>,
}

impl SymbolicEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancelled: None,
        }
    }

    /// Stops the run before the next function once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Analyzes every function in `module`. Top-level statements are not
    /// explored.
    pub fn run<O: Observer + ?Sized>(&self, module: &Module, observer: &mut O) -> RunSummary {
        let (model, functions) = ScopeBuilder::build_with_functions(module);
        let mut summary = RunSummary::default();

        for function in &functions {
            if self.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary.functions += 1;
            match self.analyze_function(&model, function, observer) {
                FunctionOutcome::Completed => {}
                FunctionOutcome::Degraded => summary.degraded += 1,
                FunctionOutcome::Failed => summary.failed += 1,
            }
        }

        summary
    }

    fn analyze_function<O: Observer + ?Sized>(
        &self,
        model: &SemanticModel,
        function: &FunctionNode<'_>,
        observer: &mut O,
    ) -> FunctionOutcome {
        let tracked = TrackedSymbols::collect(model, function.scope);
        let cfg = ControlFlowGraph::build(function.body);
        let liveness = Liveness::compute(&cfg, model, &tracked);

        observer.start_function(&FunctionContext {
            span: function.span,
            scope: function.scope,
            model,
            tracked: tracked.symbols(),
        });

        let mut exploration = Exploration {
            config: self.config,
            cfg: &cfg,
            model,
            liveness: &liveness,
            evaluator: Evaluator::new(model, &tracked, self.config.max_path_states),
            observer: &mut *observer,
            seen: HashMap::new(),
            path_states: 0,
            steps: 0,
            degraded: false,
        };
        let result = exploration.run(tracked.entry_state(model));
        let (steps, path_states) = (exploration.steps, exploration.path_states);

        let outcome = match result {
            Ok(false) => FunctionOutcome::Completed,
            Ok(true) => FunctionOutcome::Degraded,
            Err(err) => {
                warn!(span = ?function.span, error = %err, "function analysis failed");
                FunctionOutcome::Failed
            }
        };
        debug!(
            span = ?function.span,
            blocks = cfg.block_count(),
            tracked = tracked.len(),
            steps,
            states = path_states,
            outcome = ?outcome,
            "analyzed function"
        );
        observer.end_function(outcome);
        outcome
    }
}

#[derive(Debug, Clone)]
struct LoopVisit {
    header: BasicBlockId,
    /// Arrivals at the header on this path, the first entry included.
    count: usize,
    entry: ProgramState,
}

#[derive(Debug, Clone)]
struct Path {
    block: BasicBlockId,
    from: Option<BasicBlockId>,
    state: ProgramState,
    loops: Vec<LoopVisit>,
}

struct Exploration<'x, 'a, O: Observer + ?Sized> {
    config: EngineConfig,
    cfg: &'x ControlFlowGraph<'a>,
    model: &'x SemanticModel,
    liveness: &'x Liveness,
    evaluator: Evaluator<'x>,
    observer: &'x mut O,
    seen: HashMap<BasicBlockId, HashSet<ProgramState>>,
    path_states: usize,
    steps: usize,
    degraded: bool,
}

impl<O: Observer + ?Sized> Exploration<'_, '_, O> {
    /// Returns whether exploration had to degrade.
    fn run(&mut self, entry: ProgramState) -> Result<bool, EngineError> {
        let mut worklist = vec![Path {
            block: self.cfg.entry(),
            from: None,
            state: entry,
            loops: Vec::new(),
        }];

        while let Some(path) = worklist.pop() {
            if self.path_states > self.config.max_path_states || self.steps > self.config.max_steps
            {
                worklist.push(path);
                self.degrade(worklist)?;
                return Ok(true);
            }
            self.steps += 1;
            trace!(block = path.block.index(), paths = worklist.len(), "exploring block");
            worklist.extend(self.visit(path)?);
        }

        Ok(false)
    }

    fn visit(&mut self, path: Path) -> Result<Vec<Path>, EngineError> {
        let cfg = self.cfg;
        let block = cfg.block(path.block).ok_or(EngineError::UnknownBlock {
            block: path.block.index(),
        })?;
        let mut state = path.state.restrict(self.liveness.live_in(block.id));
        let mut loops = path.loops;

        if block.kind == BasicBlockKind::LoopHeader {
            let back = path
                .from
                .is_some_and(|from| cfg.has_back_edge(from, block.id));
            match loops.iter_mut().find(|visit| visit.header == block.id) {
                Some(visit) if back => {
                    visit.count += 1;
                    if visit.count > self.config.max_loop_iterations + 1 {
                        return Ok(Vec::new());
                    }
                    if visit.count == self.config.max_loop_iterations + 1 {
                        state = state.widen(&visit.entry);
                    }
                }
                Some(visit) => {
                    visit.count = 1;
                    visit.entry = state.clone();
                }
                None => loops.push(LoopVisit {
                    header: block.id,
                    count: 1,
                    entry: state.clone(),
                }),
            }
        }

        if !self.seen.entry(block.id).or_default().insert(state.clone()) {
            return Ok(Vec::new());
        }
        self.path_states += 1;

        let outgoing = self.run_block(block, state)?;
        Ok(outgoing
            .into_iter()
            .map(|(target, state)| Path {
                block: target,
                from: Some(block.id),
                state,
                loops: loops.clone(),
            })
            .collect())
    }

    /// Runs the elements of `block` and returns the states leaving it along
    /// each edge, exception edges included.
    fn run_block(
        &mut self,
        block: &BasicBlock,
        state: ProgramState,
    ) -> Result<Vec<(BasicBlockId, ProgramState)>, EngineError> {
        let (cfg, liveness) = (self.cfg, self.liveness);
        let elements = cfg.elements(block.id);
        let mut outgoing = Vec::new();
        if let Some(target) = block.exception_target {
            outgoing.push((target, state.clone()));
        }

        let mut states = vec![state];
        for (index, element) in elements.iter().enumerate() {
            let throws_to = block.exception_target.filter(|_| may_throw(element));
            if let Some(target) = throws_to {
                for state in &states {
                    push_edge(&mut outgoing, target, state.clone());
                }
            }

            if let Element::Test(test) = element {
                if index + 1 != elements.len() {
                    return Err(EngineError::ConditionOutsideBranch {
                        block: block.id.index(),
                    });
                }
                let branch = block.branch.ok_or(EngineError::MissingBranch {
                    block: block.id.index(),
                })?;
                for state in &states {
                    self.observer.before_element(element.span(), state);
                    let branches = self.evaluator.eval_test(test, state);
                    self.dispatch_events();
                    for state in branches.on_true {
                        push_edge(&mut outgoing, branch.on_true, state);
                    }
                    for state in branches.on_false {
                        push_edge(&mut outgoing, branch.on_false, state);
                    }
                }
                return Ok(outgoing);
            }

            let live = liveness.live_after(block.id, index);
            let mut next = Vec::new();
            for state in &states {
                self.observer.before_element(element.span(), state);
                let results = self.evaluator.exec(element, state);
                self.dispatch_events();
                for result in results {
                    let result = match live {
                        Some(live) => result.restrict(live),
                        None => result,
                    };
                    if !next.contains(&result) {
                        next.push(result);
                    }
                }
            }
            states = next;
        }

        for &successor in &block.successors {
            for state in &states {
                push_edge(&mut outgoing, successor, state.clone());
            }
        }
        Ok(outgoing)
    }

    fn dispatch_events(&mut self) {
        for event in self.evaluator.take_events() {
            match event {
                Event::Dereference {
                    kind,
                    span,
                    symbol,
                    value,
                } => {
                    if self.degraded {
                        continue;
                    }
                    self.observer.on_dereference(&Dereference {
                        kind,
                        span,
                        symbol,
                        name: &self.model.symbol_table.get(symbol).name,
                        value,
                    });
                }
                Event::Condition {
                    span,
                    truthiness,
                    tracked,
                } => self.observer.on_condition(&Condition {
                    span,
                    truthiness,
                    tracked,
                    poisoned: self.degraded,
                }),
            }
        }
    }

    /// Finishes the function with one merged state per block, starting from
    /// the paths still pending. Dereferences are no longer reported and
    /// conditions are marked as poisoned.
    fn degrade(&mut self, pending: Vec<Path>) -> Result<(), EngineError> {
        warn!(
            states = self.path_states,
            steps = self.steps,
            pending = pending.len(),
            "path exploration limit reached, merging states per block"
        );
        self.degraded = true;

        let mut entries: HashMap<BasicBlockId, ProgramState> = HashMap::new();
        let mut queue: VecDeque<BasicBlockId> = VecDeque::new();
        for path in pending {
            self.merge_into(&mut entries, &mut queue, path.block, path.state);
        }

        let cfg = self.cfg;
        while let Some(id) = queue.pop_front() {
            let block = cfg
                .block(id)
                .ok_or(EngineError::UnknownBlock { block: id.index() })?;
            let Some(state) = entries.get(&id).cloned() else {
                continue;
            };
            self.steps += 1;
            for (target, state) in self.run_block(block, state)? {
                self.merge_into(&mut entries, &mut queue, target, state);
            }
        }

        Ok(())
    }

    fn merge_into(
        &self,
        entries: &mut HashMap<BasicBlockId, ProgramState>,
        queue: &mut VecDeque<BasicBlockId>,
        block: BasicBlockId,
        state: ProgramState,
    ) {
        let state = match self.cfg.block(block) {
            Some(_) => state.restrict(self.liveness.live_in(block)),
            None => state,
        };
        let merged = match entries.get(&block) {
            Some(existing) => existing.merge(&state),
            None => state,
        };
        if entries.get(&block) != Some(&merged) {
            entries.insert(block, merged);
            if !queue.contains(&block) {
                queue.push_back(block);
            }
        }
    }
}

fn push_edge(edges: &mut Vec<(BasicBlockId, ProgramState)>, target: BasicBlockId, state: ProgramState) {
    if !edges
        .iter()
        .any(|(block, existing)| *block == target && *existing == state)
    {
        edges.push((target, state));
    }
}

/// Whether evaluating `element` may transfer control to a `catch` handler.
fn may_throw(element: &Element<'_>) -> bool {
    match element {
        Element::Expr(expr) | Element::Test(expr) => expr_may_throw(expr),
        Element::Declare { declarator, .. } => {
            !matches!(declarator.name, Pat::Ident(_))
                || declarator.init.as_deref().is_some_and(expr_may_throw)
        }
        Element::Iterate { .. } | Element::Bind(_) | Element::Class(_) => true,
        Element::CatchParam(_) => false,
    }
}

fn expr_may_throw(expr: &Expr) -> bool {
    let mut finder = ThrowPoints::default();
    expr.visit_with(&mut finder);
    finder.found
}

/// Finds calls, property accesses and suspension points outside nested
/// functions and classes.
#[derive(Default)]
struct ThrowPoints {
    found: bool,
}

impl Visit for ThrowPoints {
    fn visit_call_expr(&mut self, _node: &CallExpr) {
        self.found = true;
    }

    fn visit_new_expr(&mut self, _node: &NewExpr) {
        self.found = true;
    }

    fn visit_member_expr(&mut self, _node: &MemberExpr) {
        self.found = true;
    }

    fn visit_super_prop_expr(&mut self, _node: &SuperPropExpr) {
        self.found = true;
    }

    fn visit_opt_chain_expr(&mut self, _node: &OptChainExpr) {
        self.found = true;
    }

    fn visit_tagged_tpl(&mut self, _node: &TaggedTpl) {
        self.found = true;
    }

    fn visit_await_expr(&mut self, _node: &AwaitExpr) {
        self.found = true;
    }

    fn visit_yield_expr(&mut self, _node: &YieldExpr) {
        self.found = true;
    }

    fn visit_function(&mut self, _node: &Function) {}

    fn visit_arrow_expr(&mut self, _node: &ArrowExpr) {}

    fn visit_class(&mut self, _node: &Class) {}
}
