//! Expression evaluation and condition narrowing
//!
//! Evaluating an expression in a program state yields every distinct
//! `(state, value)` outcome the expression can produce. Short-circuit
//! operators, conditionals and comparisons against `null` or `undefined`
//! fork the state, so each outcome carries the knowledge its branch implies:
//! in `x && x.y` the access runs only on outcomes where `x` is truthy.
//!
//! When an outcome's value is read straight from a tracked symbol, the
//! outcome remembers that symbol as its origin. Narrowing the value then
//! also narrows the symbol.

use std::mem;

use swc_common::{Span, Spanned};
use swc_ecma_ast::{
    ArrowExpr, AssignExpr, AssignOp, AssignTarget, AssignTargetPat, BinExpr, BinaryOp,
    CallExpr, Callee, Class, CondExpr, Expr, ExprOrSpread, ForHead, Function, GetterProp, Ident,
    Lit, MemberExpr, MemberProp, NewExpr, ObjectPatProp, OptChainBase, Pat, Prop,
    PropName, PropOrSpread, SetterProp, SimpleAssignTarget, UnaryExpr, UnaryOp, UpdateExpr,
    VarDeclKind, VarDeclarator,
};
use swc_ecma_visit::{Visit, VisitWith};

use crate::semantic::{Element, SemanticModel, SymbolId, binding_idents, unparen};

use super::observer::DereferenceKind;
use super::state::ProgramState;
use super::tracking::TrackedSymbols;
use super::value::{AbstractValue, Constraint, Truthiness};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Outcome {
    pub state: ProgramState,
    pub value: AbstractValue,
    /// Tracked symbol currently holding `value`.
    pub origin: Option<SymbolId>,
}

impl Outcome {
    pub fn new(state: ProgramState, value: AbstractValue) -> Self {
        Self {
            state,
            value,
            origin: None,
        }
    }

    /// The outcome under the assumption that its value satisfies
    /// `constraint`, or `None` if it cannot.
    pub fn restrict(&self, constraint: Constraint) -> Option<Outcome> {
        let value = self.value.narrow(constraint)?;
        let state = match self.origin {
            Some(symbol) => {
                let narrowed = self.state.get(symbol).narrow(constraint)?;
                self.state.set(symbol, narrowed)
            }
            None => self.state.clone(),
        };
        Some(Outcome {
            state,
            value,
            origin: self.origin,
        })
    }

    fn with_value(self, value: AbstractValue) -> Outcome {
        Outcome::new(self.state, value)
    }
}

/// States reaching each side of a branching test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Branches {
    pub on_true: Vec<ProgramState>,
    pub on_false: Vec<ProgramState>,
}

/// Facts produced during evaluation, drained by the explorer after each
/// element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Dereference {
        kind: DereferenceKind,
        span: Span,
        symbol: SymbolId,
        value: AbstractValue,
    },
    Condition {
        span: Span,
        truthiness: Truthiness,
        tracked: bool,
    },
}

pub struct Evaluator<'e> {
    model: &'e SemanticModel,
    tracked: &'e TrackedSymbols,
    /// Outcome sets larger than this collapse into a single merged outcome.
    max_outcomes: usize,
    events: Vec<Event>,
}

impl<'e> Evaluator<'e> {
    pub fn new(model: &'e SemanticModel, tracked: &'e TrackedSymbols, max_outcomes: usize) -> Self {
        Self {
            model,
            tracked,
            max_outcomes: max_outcomes.max(1),
            events: Vec::new(),
        }
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        mem::take(&mut self.events)
    }

    /// Runs a non-test element and returns the distinct resulting states.
    /// An empty result means every path through the element throws.
    pub fn exec(&mut self, element: &Element<'_>, state: &ProgramState) -> Vec<ProgramState> {
        match *element {
            Element::Expr(expr) | Element::Test(expr) => states_of(self.eval(expr, state)),
            Element::Declare { declarator, kind } => self.declare(declarator, kind, state),
            Element::Iterate { expr, of } => {
                let mut states = Vec::new();
                for outcome in self.eval(expr, state) {
                    let outcome = if of {
                        match self.dereference(DereferenceKind::Iterate, expr.span(), outcome) {
                            Some(outcome) => outcome,
                            None => continue,
                        }
                    } else {
                        outcome
                    };
                    push_unique(&mut states, outcome.state);
                }
                states
            }
            Element::Bind(head) => vec![self.bind_head(head, state)],
            Element::CatchParam(pat) => vec![self.clear_bindings(pat, state.clone())],
            Element::Class(class) => states_of(self.eval_class(class, state)),
        }
    }

    /// Evaluates a branching test, reports its truthiness on every outcome
    /// and splits the outcomes between the two branches.
    pub fn eval_test(&mut self, test: &Expr, state: &ProgramState) -> Branches {
        let mut branches = Branches::default();
        for outcome in self.eval_condition(test, state) {
            if let Some(truthy) = outcome.restrict(Constraint::TRUTHY) {
                push_unique(&mut branches.on_true, truthy.state);
            }
            if let Some(falsy) = outcome.restrict(Constraint::FALSY) {
                push_unique(&mut branches.on_false, falsy.state);
            }
        }
        branches
    }

    pub fn eval(&mut self, expr: &Expr, state: &ProgramState) -> Vec<Outcome> {
        let outcomes = self.eval_expr(expr, state);
        self.bound(outcomes)
    }

    fn eval_expr(&mut self, expr: &Expr, state: &ProgramState) -> Vec<Outcome> {
        match expr {
            Expr::Paren(paren) => self.eval_grouped(&paren.expr, state),
            Expr::TsAs(e) => self.eval(&e.expr, state),
            Expr::TsTypeAssertion(e) => self.eval(&e.expr, state),
            Expr::TsConstAssertion(e) => self.eval(&e.expr, state),
            Expr::TsNonNull(e) => self.eval(&e.expr, state),
            Expr::TsSatisfies(e) => self.eval(&e.expr, state),
            Expr::TsInstantiation(e) => self.eval(&e.expr, state),
            Expr::Ident(ident) => vec![self.read(ident, state)],
            Expr::Lit(lit) => vec![Outcome::new(state.clone(), literal_value(lit))],
            Expr::Tpl(tpl) => {
                let value = if !tpl.exprs.is_empty() {
                    AbstractValue::NotNull
                } else if tpl.quasis.iter().all(|q| q.raw.is_empty()) {
                    AbstractValue::Nully
                } else {
                    AbstractValue::Truthy
                };
                let exprs: Vec<&Expr> = tpl.exprs.iter().map(|e| &**e).collect();
                self.eval_sequence(&exprs, state, value)
            }
            Expr::Array(array) => {
                let mut states = vec![state.clone()];
                for elem in array.elems.iter().flatten() {
                    states = self.eval_arg(elem, states);
                }
                with_value(states, AbstractValue::Truthy)
            }
            Expr::Object(object) => {
                let mut state = state.clone();
                let mut states = Vec::new();
                for prop in &object.props {
                    match prop {
                        PropOrSpread::Prop(prop) => match &**prop {
                            Prop::Method(method) => {
                                state = self.forget_closure(method.function.span, &state);
                            }
                            Prop::Getter(getter) => state = self.forget_closure(getter.span, &state),
                            Prop::Setter(setter) => state = self.forget_closure(setter.span, &state),
                            _ => {}
                        },
                        PropOrSpread::Spread(_) => {}
                    }
                }
                states.push(state);
                for prop in &object.props {
                    let exprs: Vec<&Expr> = match prop {
                        PropOrSpread::Spread(spread) => vec![&*spread.expr],
                        PropOrSpread::Prop(prop) => match &**prop {
                            Prop::KeyValue(kv) => match &kv.key {
                                PropName::Computed(key) => vec![&*key.expr, &*kv.value],
                                _ => vec![&*kv.value],
                            },
                            _ => Vec::new(),
                        },
                    };
                    for expr in exprs {
                        states = self.eval_states(expr, states);
                    }
                }
                with_value(states, AbstractValue::Truthy)
            }
            Expr::Fn(fn_expr) => vec![Outcome::new(
                self.forget_closure(fn_expr.function.span, state),
                AbstractValue::Truthy,
            )],
            Expr::Arrow(arrow) => vec![Outcome::new(
                self.forget_closure(arrow.span, state),
                AbstractValue::Truthy,
            )],
            Expr::Class(class_expr) => self.eval_class(&class_expr.class, state),
            Expr::Unary(unary) => self.eval_unary(unary, state),
            Expr::Update(update) => self.eval_update(update, state),
            Expr::Bin(bin) => self.eval_binary(bin, state),
            Expr::Assign(assign) => self.eval_assign(assign, state),
            Expr::Member(member) => self.eval_member(member, state),
            Expr::SuperProp(super_prop) => match &super_prop.prop {
                swc_ecma_ast::SuperProp::Computed(key) => self
                    .eval(&key.expr, state)
                    .into_iter()
                    .map(|o| o.with_value(AbstractValue::Unknown))
                    .collect(),
                swc_ecma_ast::SuperProp::Ident(_) => {
                    vec![Outcome::new(state.clone(), AbstractValue::Unknown)]
                }
            },
            Expr::Cond(cond) => self.eval_conditional(cond, state),
            Expr::Call(call) => self.eval_call(call, state),
            Expr::New(new) => self.eval_new(new, state),
            Expr::Seq(seq) => {
                let mut outcomes = vec![Outcome::new(state.clone(), AbstractValue::Undefined)];
                for expr in &seq.exprs {
                    let mut next = Vec::new();
                    for outcome in outcomes {
                        for result in self.eval(expr, &outcome.state) {
                            push_unique(&mut next, result);
                        }
                    }
                    outcomes = self.bound(next);
                }
                outcomes
            }
            Expr::TaggedTpl(tagged) => {
                let mut states = Vec::new();
                for outcome in self.eval(&tagged.tag, state) {
                    if let Some(outcome) =
                        self.dereference(DereferenceKind::Call, tagged.tag.span(), outcome)
                    {
                        push_unique(&mut states, outcome.state);
                    }
                }
                for expr in &tagged.tpl.exprs {
                    states = self.eval_states(expr, states);
                }
                with_value(states, AbstractValue::Unknown)
            }
            Expr::Await(await_expr) => self
                .eval(&await_expr.arg, state)
                .into_iter()
                .map(|o| o.with_value(AbstractValue::Unknown))
                .collect(),
            Expr::Yield(yield_expr) => match &yield_expr.arg {
                Some(arg) => self
                    .eval(arg, state)
                    .into_iter()
                    .map(|o| o.with_value(AbstractValue::Unknown))
                    .collect(),
                None => vec![Outcome::new(state.clone(), AbstractValue::Unknown)],
            },
            Expr::OptChain(_) => self
                .eval_chain(expr, state)
                .into_iter()
                .map(|(outcome, _)| outcome)
                .collect(),
            Expr::JSXElement(_) | Expr::JSXFragment(_) => vec![Outcome::new(
                self.forget_closures_in(expr, state),
                AbstractValue::Truthy,
            )],
            _ => vec![Outcome::new(
                self.forget_closures_in(expr, state),
                AbstractValue::Unknown,
            )],
        }
    }

    fn read(&self, ident: &Ident, state: &ProgramState) -> Outcome {
        match self.model.resolve(ident) {
            Some(symbol) if self.tracked.contains(symbol) => Outcome {
                state: state.clone(),
                value: state.get(symbol),
                origin: Some(symbol),
            },
            Some(_) => Outcome::new(state.clone(), AbstractValue::Unknown),
            None if ident.sym.as_str() == "undefined" => {
                Outcome::new(state.clone(), AbstractValue::Undefined)
            }
            None => Outcome::new(state.clone(), AbstractValue::Unknown),
        }
    }

    fn tracked_symbol(&self, ident: &Ident) -> Option<SymbolId> {
        self.model
            .resolve(ident)
            .filter(|&symbol| self.tracked.contains(symbol))
    }

    /// Stores `outcome`'s value into `target` and makes the target the
    /// outcome's origin.
    fn write(&self, target: Option<SymbolId>, outcome: Outcome) -> Outcome {
        match target {
            Some(symbol) => Outcome {
                state: outcome.state.set(symbol, outcome.value),
                value: outcome.value,
                origin: Some(symbol),
            },
            None => Outcome {
                origin: None,
                ..outcome
            },
        }
    }

    /// Reports an operation that throws on a nully operand. Returns the
    /// outcome narrowed to a non-nully operand, or `None` when the
    /// operation throws on this path.
    fn dereference(&mut self, kind: DereferenceKind, span: Span, outcome: Outcome) -> Option<Outcome> {
        let Some(symbol) = outcome.origin else {
            return Some(outcome);
        };
        self.events.push(Event::Dereference {
            kind,
            span,
            symbol,
            value: outcome.value,
        });
        if outcome.value.is_null_or_undefined() {
            return None;
        }
        outcome.restrict(Constraint::NOT_NULLISH)
    }

    fn eval_condition(&mut self, test: &Expr, state: &ProgramState) -> Vec<Outcome> {
        let tracked = self.mentions_tracked(test);
        let outcomes = self.eval(test, state);
        for outcome in &outcomes {
            self.events.push(Event::Condition {
                span: test.span(),
                truthiness: outcome.value.truthiness(),
                tracked,
            });
        }
        outcomes
    }

    /// A parenthesized short-circuit expression gives every outcome the
    /// same merged value, so a later branch on it keeps all of its states.
    /// `(x == null || y == null) ? 1 : x.foo` therefore still reaches
    /// `x.foo` with `x` nully.
    fn eval_grouped(&mut self, inner: &Expr, state: &ProgramState) -> Vec<Outcome> {
        let outcomes = self.eval(inner, state);
        let short_circuit = matches!(
            unparen(inner),
            Expr::Bin(BinExpr {
                op: BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing,
                ..
            })
        );
        if !short_circuit || outcomes.len() < 2 {
            return outcomes;
        }

        let value = outcomes
            .iter()
            .map(|outcome| outcome.value)
            .reduce(AbstractValue::merge)
            .unwrap_or(AbstractValue::Unknown);
        let mut grouped = Vec::new();
        for outcome in outcomes {
            push_unique(&mut grouped, outcome.with_value(value));
        }
        grouped
    }

    fn eval_conditional(&mut self, cond: &CondExpr, state: &ProgramState) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for outcome in self.eval_condition(&cond.test, state) {
            if let Some(truthy) = outcome.restrict(Constraint::TRUTHY) {
                for result in self.eval(&cond.cons, &truthy.state) {
                    push_unique(&mut outcomes, result);
                }
            }
            if let Some(falsy) = outcome.restrict(Constraint::FALSY) {
                for result in self.eval(&cond.alt, &falsy.state) {
                    push_unique(&mut outcomes, result);
                }
            }
        }
        outcomes
    }

    fn eval_unary(&mut self, unary: &UnaryExpr, state: &ProgramState) -> Vec<Outcome> {
        let operands = self.eval(&unary.arg, state);
        match unary.op {
            UnaryOp::Bang => {
                let mut outcomes = Vec::new();
                for operand in operands {
                    if let Some(truthy) = operand.restrict(Constraint::TRUTHY) {
                        push_unique(&mut outcomes, truthy.with_value(AbstractValue::False));
                    }
                    if let Some(falsy) = operand.restrict(Constraint::FALSY) {
                        push_unique(&mut outcomes, falsy.with_value(AbstractValue::True));
                    }
                }
                outcomes
            }
            UnaryOp::TypeOf => with_value(states_of(operands), AbstractValue::Truthy),
            UnaryOp::Void => with_value(states_of(operands), AbstractValue::Undefined),
            UnaryOp::Delete => with_value(states_of(operands), AbstractValue::Boolean),
            UnaryOp::Minus | UnaryOp::Plus | UnaryOp::Tilde => {
                with_value(states_of(operands), AbstractValue::NotNull)
            }
        }
    }

    fn eval_update(&mut self, update: &UpdateExpr, state: &ProgramState) -> Vec<Outcome> {
        let target = match unparen(&update.arg) {
            Expr::Ident(ident) => self.tracked_symbol(ident),
            _ => None,
        };
        self.eval(&update.arg, state)
            .into_iter()
            .map(|operand| {
                let state = match target {
                    Some(symbol) => operand.state.set(symbol, AbstractValue::NotNull),
                    None => operand.state,
                };
                Outcome::new(state, AbstractValue::NotNull)
            })
            .collect()
    }

    fn eval_binary(&mut self, bin: &BinExpr, state: &ProgramState) -> Vec<Outcome> {
        match bin.op {
            BinaryOp::LogicalAnd => self.eval_short_circuit(bin, Constraint::TRUTHY, state),
            BinaryOp::LogicalOr => self.eval_short_circuit(bin, Constraint::FALSY, state),
            BinaryOp::NullishCoalescing => {
                self.eval_short_circuit(bin, Constraint::NULLISH, state)
            }
            BinaryOp::EqEq | BinaryOp::NotEq | BinaryOp::EqEqEq | BinaryOp::NotEqEq => {
                self.eval_equality(bin, state)
            }
            BinaryOp::In => {
                let mut states = Vec::new();
                for left in self.eval(&bin.left, state) {
                    for right in self.eval(&bin.right, &left.state) {
                        if let Some(right) =
                            self.dereference(DereferenceKind::In, bin.right.span(), right)
                        {
                            push_unique(&mut states, right.state);
                        }
                    }
                }
                with_value(states, AbstractValue::Boolean)
            }
            op => {
                let value = match op {
                    BinaryOp::Lt
                    | BinaryOp::LtEq
                    | BinaryOp::Gt
                    | BinaryOp::GtEq
                    | BinaryOp::InstanceOf => AbstractValue::Boolean,
                    _ => AbstractValue::NotNull,
                };
                self.eval_sequence(&[&bin.left, &bin.right], state, value)
            }
        }
    }

    /// `left op right` where `right` only runs when `left` satisfies
    /// `continue_when`; otherwise the result is `left` itself.
    fn eval_short_circuit(
        &mut self,
        bin: &BinExpr,
        continue_when: Constraint,
        state: &ProgramState,
    ) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for left in self.eval(&bin.left, state) {
            if let Some(done) = left.restrict(continue_when.complement()) {
                push_unique(&mut outcomes, done);
            }
            if let Some(next) = left.restrict(continue_when) {
                for right in self.eval(&bin.right, &next.state) {
                    push_unique(&mut outcomes, right);
                }
            }
        }
        outcomes
    }

    fn eval_equality(&mut self, bin: &BinExpr, state: &ProgramState) -> Vec<Outcome> {
        let loose = matches!(bin.op, BinaryOp::EqEq | BinaryOp::NotEq);
        let negated = matches!(bin.op, BinaryOp::NotEq | BinaryOp::NotEqEq);

        // `typeof x === "..."` lands here too and narrows nothing.
        let Some((operand, literal)) = self.nullish_comparison(bin) else {
            return self.eval_sequence(&[&bin.left, &bin.right], state, AbstractValue::Boolean);
        };
        let matching = match (loose, literal) {
            (true, _) => Constraint::NULLISH,
            (false, NullishLiteral::Null) => Constraint::NULL,
            (false, NullishLiteral::Undefined) => Constraint::UNDEFINED,
        };
        let other = matching.complement();

        let mut outcomes = Vec::new();
        for outcome in self.eval(operand, state) {
            if let Some(hit) = outcome.restrict(matching) {
                push_unique(&mut outcomes, hit.with_value(AbstractValue::from_bool(!negated)));
            }
            if let Some(miss) = outcome.restrict(other) {
                push_unique(&mut outcomes, miss.with_value(AbstractValue::from_bool(negated)));
            }
        }
        outcomes
    }

    /// The non-literal side of a comparison against `null` or `undefined`.
    fn nullish_comparison<'b>(&self, bin: &'b BinExpr) -> Option<(&'b Expr, NullishLiteral)> {
        if let Some(literal) = self.nullish_literal(&bin.right) {
            return Some((&bin.left, literal));
        }
        self.nullish_literal(&bin.left)
            .map(|literal| (&*bin.right, literal))
    }

    fn nullish_literal(&self, expr: &Expr) -> Option<NullishLiteral> {
        match unparen(expr) {
            Expr::Lit(Lit::Null(_)) => Some(NullishLiteral::Null),
            Expr::Ident(ident)
                if ident.sym.as_str() == "undefined" && self.model.resolve(ident).is_none() =>
            {
                Some(NullishLiteral::Undefined)
            }
            Expr::Unary(unary) if unary.op == UnaryOp::Void => Some(NullishLiteral::Undefined),
            _ => None,
        }
    }

    fn eval_assign(&mut self, assign: &AssignExpr, state: &ProgramState) -> Vec<Outcome> {
        match &assign.left {
            AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                let target = self.tracked_symbol(&binding.id);
                let assign_when = match assign.op {
                    AssignOp::Assign => {
                        return self
                            .eval(&assign.right, state)
                            .into_iter()
                            .map(|value| self.write(target, value))
                            .collect();
                    }
                    AssignOp::AndAssign => Constraint::TRUTHY,
                    AssignOp::OrAssign => Constraint::FALSY,
                    AssignOp::NullishAssign => Constraint::NULLISH,
                    _ => {
                        return self
                            .eval(&assign.right, state)
                            .into_iter()
                            .map(|value| self.write(target, value.with_value(AbstractValue::NotNull)))
                            .collect();
                    }
                };
                let current = self.read(&binding.id, state);
                let mut outcomes = Vec::new();
                if let Some(kept) = current.restrict(assign_when.complement()) {
                    push_unique(&mut outcomes, kept);
                }
                if let Some(next) = current.restrict(assign_when) {
                    for value in self.eval(&assign.right, &next.state) {
                        push_unique(&mut outcomes, self.write(target, value));
                    }
                }
                outcomes
            }
            AssignTarget::Simple(SimpleAssignTarget::Member(member)) => {
                let value = match assign.op {
                    AssignOp::Assign => None,
                    AssignOp::AndAssign | AssignOp::OrAssign | AssignOp::NullishAssign => {
                        Some(AbstractValue::Unknown)
                    }
                    _ => Some(AbstractValue::NotNull),
                };
                let mut outcomes = Vec::new();
                for object in self.eval_member(member, state) {
                    for result in self.eval(&assign.right, &object.state) {
                        let result = match value {
                            Some(value) => result.with_value(value),
                            None => Outcome {
                                origin: None,
                                ..result
                            },
                        };
                        push_unique(&mut outcomes, result);
                    }
                }
                outcomes
            }
            AssignTarget::Simple(_) => self
                .eval(&assign.right, state)
                .into_iter()
                .map(|o| o.with_value(AbstractValue::Unknown))
                .collect(),
            AssignTarget::Pat(pattern) => {
                let idents = assigned_idents(pattern);
                let mut outcomes = Vec::new();
                for value in self.eval(&assign.right, state) {
                    let Some(value) =
                        self.dereference(DereferenceKind::Destructure, assign.right.span(), value)
                    else {
                        continue;
                    };
                    let state = idents.iter().fold(value.state.clone(), |state, ident| {
                        self.clear(ident, state)
                    });
                    push_unique(&mut outcomes, Outcome::new(state, value.value));
                }
                outcomes
            }
        }
    }

    fn eval_member(&mut self, member: &MemberExpr, state: &ProgramState) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for object in self.eval(&member.obj, state) {
            let Some(object) =
                self.dereference(DereferenceKind::Member, member.obj.span(), object)
            else {
                continue;
            };
            for result in self.eval_member_prop(&member.prop, object.state) {
                push_unique(&mut outcomes, result);
            }
        }
        outcomes
    }

    fn eval_member_prop(&mut self, prop: &MemberProp, state: ProgramState) -> Vec<Outcome> {
        match prop {
            MemberProp::Computed(key) => self
                .eval(&key.expr, &state)
                .into_iter()
                .map(|o| o.with_value(AbstractValue::Unknown))
                .collect(),
            _ => vec![Outcome::new(state, AbstractValue::Unknown)],
        }
    }

    /// Outcomes of an optional chain, each flagged with whether the chain
    /// short-circuited to `undefined` before reaching this link.
    fn eval_chain(&mut self, expr: &Expr, state: &ProgramState) -> Vec<(Outcome, bool)> {
        let Expr::OptChain(chain) = expr else {
            return self
                .eval(expr, state)
                .into_iter()
                .map(|outcome| (outcome, false))
                .collect();
        };

        let (base, kind) = match &*chain.base {
            OptChainBase::Member(member) => (&*member.obj, DereferenceKind::Member),
            OptChainBase::Call(call) => (&*call.callee, DereferenceKind::Call),
        };

        let mut results = Vec::new();
        for (outcome, short_circuited) in self.eval_chain(base, state) {
            if short_circuited {
                push_unique(&mut results, (outcome, true));
                continue;
            }
            let outcome = if chain.optional {
                if let Some(nullish) = outcome.restrict(Constraint::NULLISH) {
                    push_unique(
                        &mut results,
                        (nullish.with_value(AbstractValue::Undefined), true),
                    );
                }
                match outcome.restrict(Constraint::NOT_NULLISH) {
                    Some(present) => present,
                    None => continue,
                }
            } else {
                outcome
            };
            let Some(outcome) = self.dereference(kind, base.span(), outcome) else {
                continue;
            };
            let next = match &*chain.base {
                OptChainBase::Member(member) => self.eval_member_prop(&member.prop, outcome.state),
                OptChainBase::Call(call) => {
                    with_value(self.eval_args(&call.args, vec![outcome.state]), AbstractValue::Unknown)
                }
            };
            for result in next {
                push_unique(&mut results, (result, false));
            }
        }
        results
    }

    fn eval_call(&mut self, call: &CallExpr, state: &ProgramState) -> Vec<Outcome> {
        let states = match &call.callee {
            Callee::Expr(callee) => self.eval_callee(DereferenceKind::Call, callee, state),
            Callee::Super(_) | Callee::Import(_) => vec![state.clone()],
        };
        with_value(self.eval_args(&call.args, states), AbstractValue::Unknown)
    }

    fn eval_new(&mut self, new: &NewExpr, state: &ProgramState) -> Vec<Outcome> {
        let states = self.eval_callee(DereferenceKind::New, &new.callee, state);
        let states = match &new.args {
            Some(args) => self.eval_args(args, states),
            None => states,
        };
        with_value(states, AbstractValue::Truthy)
    }

    fn eval_callee(
        &mut self,
        kind: DereferenceKind,
        callee: &Expr,
        state: &ProgramState,
    ) -> Vec<ProgramState> {
        let mut states = Vec::new();
        for outcome in self.eval(callee, state) {
            if let Some(outcome) = self.dereference(kind, callee.span(), outcome) {
                push_unique(&mut states, outcome.state);
            }
        }
        states
    }

    fn eval_args(&mut self, args: &[ExprOrSpread], states: Vec<ProgramState>) -> Vec<ProgramState> {
        args.iter().fold(states, |states, arg| self.eval_arg(arg, states))
    }

    fn eval_arg(&mut self, arg: &ExprOrSpread, states: Vec<ProgramState>) -> Vec<ProgramState> {
        let mut next = Vec::new();
        for state in &states {
            for outcome in self.eval(&arg.expr, state) {
                let outcome = if arg.spread.is_some() {
                    match self.dereference(DereferenceKind::Spread, arg.expr.span(), outcome) {
                        Some(outcome) => outcome,
                        None => continue,
                    }
                } else {
                    outcome
                };
                push_unique(&mut next, outcome.state);
            }
        }
        self.bound_states(next)
    }

    /// Evaluates `expr` from every state, keeping only the resulting states.
    fn eval_states(&mut self, expr: &Expr, states: Vec<ProgramState>) -> Vec<ProgramState> {
        let mut next = Vec::new();
        for state in &states {
            for outcome in self.eval(expr, state) {
                push_unique(&mut next, outcome.state);
            }
        }
        self.bound_states(next)
    }

    fn eval_sequence(
        &mut self,
        exprs: &[&Expr],
        state: &ProgramState,
        value: AbstractValue,
    ) -> Vec<Outcome> {
        let states = exprs
            .iter()
            .fold(vec![state.clone()], |states, expr| self.eval_states(expr, states));
        with_value(states, value)
    }

    fn eval_class(&mut self, class: &Class, state: &ProgramState) -> Vec<Outcome> {
        let states = match &class.super_class {
            Some(super_class) => self.eval_states(super_class, vec![state.clone()]),
            None => vec![state.clone()],
        };
        let states = states
            .iter()
            .map(|state| self.forget_closure(class.span, state))
            .collect();
        with_value(states, AbstractValue::Truthy)
    }

    fn declare(
        &mut self,
        declarator: &VarDeclarator,
        kind: VarDeclKind,
        state: &ProgramState,
    ) -> Vec<ProgramState> {
        match (&declarator.name, &declarator.init) {
            (Pat::Ident(binding), Some(init)) => {
                let target = self.tracked_symbol(&binding.id);
                let outcomes: Vec<Outcome> = self
                    .eval(init, state)
                    .into_iter()
                    .map(|value| self.write(target, value))
                    .collect();
                states_of(outcomes)
            }
            (Pat::Ident(binding), None) => match (kind, self.tracked_symbol(&binding.id)) {
                (VarDeclKind::Var, _) | (_, None) => vec![state.clone()],
                (_, Some(symbol)) => vec![state.set(symbol, AbstractValue::Undefined)],
            },
            (pattern, Some(init)) => {
                let mut states = Vec::new();
                for value in self.eval(init, state) {
                    if let Some(value) =
                        self.dereference(DereferenceKind::Destructure, init.span(), value)
                    {
                        push_unique(&mut states, self.clear_bindings(pattern, value.state));
                    }
                }
                states
            }
            (pattern, None) => vec![self.clear_bindings(pattern, state.clone())],
        }
    }

    fn bind_head(&self, head: &ForHead, state: &ProgramState) -> ProgramState {
        match head {
            ForHead::VarDecl(var) => var
                .decls
                .iter()
                .fold(state.clone(), |state, decl| self.clear_bindings(&decl.name, state)),
            ForHead::UsingDecl(using) => using
                .decls
                .iter()
                .fold(state.clone(), |state, decl| self.clear_bindings(&decl.name, state)),
            ForHead::Pat(pat) => self.clear_bindings(pat, state.clone()),
        }
    }

    /// Every tracked binding in `pat` becomes `Unknown`.
    fn clear_bindings(&self, pat: &Pat, state: ProgramState) -> ProgramState {
        binding_idents(pat)
            .into_iter()
            .fold(state, |state, ident| self.clear(ident, state))
    }

    fn clear(&self, ident: &Ident, state: ProgramState) -> ProgramState {
        match self.tracked_symbol(ident) {
            Some(symbol) => state.set(symbol, AbstractValue::Unknown),
            None => state,
        }
    }

    /// Once a closure exists it may run at any later call, so every tracked
    /// symbol it writes stops being tracked.
    fn forget_closure(&self, span: Span, state: &ProgramState) -> ProgramState {
        let Some(scope) = self.model.scope_of_node(span) else {
            return state.clone();
        };
        self.tracked
            .written_by(scope)
            .fold(state.clone(), |state, symbol| state.forget(symbol))
    }

    fn forget_closures_in(&self, expr: &Expr, state: &ProgramState) -> ProgramState {
        let mut closures = ClosureSpans::default();
        expr.visit_with(&mut closures);
        closures
            .spans
            .into_iter()
            .fold(state.clone(), |state, span| self.forget_closure(span, &state))
    }

    fn mentions_tracked(&self, expr: &Expr) -> bool {
        let mut finder = TrackedMentions {
            evaluator: self,
            found: false,
        };
        expr.visit_with(&mut finder);
        finder.found
    }

    fn bound(&self, outcomes: Vec<Outcome>) -> Vec<Outcome> {
        if outcomes.len() <= self.max_outcomes {
            return outcomes;
        }
        let mut iter = outcomes.into_iter();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let merged = iter.fold(first, |acc, outcome| Outcome {
            state: acc.state.merge(&outcome.state),
            value: acc.value.merge(outcome.value),
            origin: acc.origin.filter(|&origin| outcome.origin == Some(origin)),
        });
        vec![merged]
    }

    fn bound_states(&self, states: Vec<ProgramState>) -> Vec<ProgramState> {
        if states.len() <= self.max_outcomes {
            return states;
        }
        let mut iter = states.into_iter();
        match iter.next() {
            Some(first) => vec![iter.fold(first, |acc, state| acc.merge(&state))],
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NullishLiteral {
    Null,
    Undefined,
}

fn literal_value(lit: &Lit) -> AbstractValue {
    match lit {
        Lit::Null(_) => AbstractValue::Null,
        Lit::Bool(b) => AbstractValue::from_bool(b.value),
        Lit::Num(n) if n.value == 0.0 || n.value.is_nan() => AbstractValue::Nully,
        Lit::Str(s) if s.value.to_string().is_empty() => AbstractValue::Nully,
        Lit::Num(_) | Lit::Str(_) | Lit::Regex(_) | Lit::JSXText(_) => AbstractValue::Truthy,
        Lit::BigInt(_) => AbstractValue::NotNull,
    }
}

fn assigned_idents(pattern: &AssignTargetPat) -> Vec<&Ident> {
    match pattern {
        AssignTargetPat::Array(array) => array
            .elems
            .iter()
            .flatten()
            .flat_map(binding_idents)
            .collect(),
        AssignTargetPat::Object(object) => object
            .props
            .iter()
            .flat_map(|prop| match prop {
                ObjectPatProp::KeyValue(kv) => binding_idents(&kv.value),
                ObjectPatProp::Assign(assign) => vec![&assign.key.id],
                ObjectPatProp::Rest(rest) => binding_idents(&rest.arg),
            })
            .collect(),
        AssignTargetPat::Invalid(_) => Vec::new(),
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn states_of(outcomes: Vec<Outcome>) -> Vec<ProgramState> {
    let mut states = Vec::new();
    for outcome in outcomes {
        push_unique(&mut states, outcome.state);
    }
    states
}

fn with_value(states: Vec<ProgramState>, value: AbstractValue) -> Vec<Outcome> {
    states
        .into_iter()
        .map(|state| Outcome::new(state, value))
        .collect()
}

/// Spans of the function-like nodes directly inside an expression.
#[derive(Default)]
struct ClosureSpans {
    spans: Vec<Span>,
}

impl Visit for ClosureSpans {
    fn visit_function(&mut self, node: &Function) {
        self.spans.push(node.span);
    }

    fn visit_arrow_expr(&mut self, node: &ArrowExpr) {
        self.spans.push(node.span);
    }

    fn visit_class(&mut self, node: &Class) {
        self.spans.push(node.span);
    }

    fn visit_getter_prop(&mut self, node: &GetterProp) {
        self.spans.push(node.span);
    }

    fn visit_setter_prop(&mut self, node: &SetterProp) {
        self.spans.push(node.span);
    }
}

struct TrackedMentions<'v, 'e> {
    evaluator: &'v Evaluator<'e>,
    found: bool,
}

impl Visit for TrackedMentions<'_, '_> {
    fn visit_ident(&mut self, node: &Ident) {
        if self.evaluator.tracked_symbol(node).is_some() {
            self.found = true;
        }
    }

    fn visit_function(&mut self, _node: &Function) {}

    fn visit_arrow_expr(&mut self, _node: &ArrowExpr) {}

    fn visit_class(&mut self, _node: &Class) {}
}
