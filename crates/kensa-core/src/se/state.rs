//! Program states
//!
//! An immutable map from tracked symbols to abstract values at one program
//! point on one explored path. Every transition returns a new state.

use std::collections::{BTreeMap, BTreeSet};

use crate::semantic::SymbolId;

use super::value::AbstractValue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProgramState {
    /// `Unknown` is never stored: an absent symbol reads as `Unknown`.
    values: BTreeMap<SymbolId, AbstractValue>,
    /// Symbols a closure may write at any time. They always read as `Unknown`.
    escaped: BTreeSet<SymbolId>,
}

impl ProgramState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: SymbolId) -> AbstractValue {
        if self.escaped.contains(&symbol) {
            return AbstractValue::Unknown;
        }
        self.values
            .get(&symbol)
            .copied()
            .unwrap_or(AbstractValue::Unknown)
    }

    pub fn set(&self, symbol: SymbolId, value: AbstractValue) -> ProgramState {
        if self.escaped.contains(&symbol) || self.get(symbol) == value {
            return self.clone();
        }
        let mut next = self.clone();
        if value == AbstractValue::Unknown {
            next.values.remove(&symbol);
        } else {
            next.values.insert(symbol, value);
        }
        next
    }

    /// Pointwise join. A symbol present in only one operand joins with the
    /// other side's implicit `Unknown` and disappears.
    pub fn merge(&self, other: &ProgramState) -> ProgramState {
        if self == other {
            return self.clone();
        }
        let values = self
            .values
            .iter()
            .filter_map(|(&symbol, &value)| {
                other.values.get(&symbol).and_then(|&theirs| {
                    let merged = value.merge(theirs);
                    (merged != AbstractValue::Unknown).then_some((symbol, merged))
                })
            })
            .collect();
        let escaped = self.escaped.union(&other.escaped).copied().collect();
        ProgramState { values, escaped }
    }

    /// Stops tracking `symbol` for the rest of the path.
    pub fn forget(&self, symbol: SymbolId) -> ProgramState {
        if self.escaped.contains(&symbol) {
            return self.clone();
        }
        let mut next = self.clone();
        next.values.remove(&symbol);
        next.escaped.insert(symbol);
        next
    }

    pub fn is_escaped(&self, symbol: SymbolId) -> bool {
        self.escaped.contains(&symbol)
    }

    /// Drops every value whose symbol is not in `live`.
    pub fn restrict(&self, live: &BTreeSet<SymbolId>) -> ProgramState {
        if self.values.keys().all(|s| live.contains(s)) {
            return self.clone();
        }
        ProgramState {
            values: self
                .values
                .iter()
                .filter(|(s, _)| live.contains(s))
                .map(|(&s, &v)| (s, v))
                .collect(),
            escaped: self.escaped.clone(),
        }
    }

    /// Keeps only the values that agree with `reference`, turning every
    /// divergent symbol into `Unknown`.
    pub fn widen(&self, reference: &ProgramState) -> ProgramState {
        ProgramState {
            values: self
                .values
                .iter()
                .filter(|(s, v)| reference.get(**s) == **v)
                .map(|(&s, &v)| (s, v))
                .collect(),
            escaped: self.escaped.union(&reference.escaped).copied().collect(),
        }
    }

    pub fn tracked(&self) -> impl Iterator<Item = (SymbolId, AbstractValue)> + '_ {
        self.values.iter().map(|(&s, &v)| (s, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{DeclarationKind, ScopeKind, ScopeTree, SymbolKind, SymbolTable};
    use swc_common::DUMMY_SP;

    fn symbols(names: &[&str]) -> Vec<SymbolId> {
        let mut tree = ScopeTree::new();
        let scope = tree.create_scope(ScopeKind::Function, None, DUMMY_SP);
        let mut table = SymbolTable::new();
        names
            .iter()
            .map(|name| {
                table.declare(
                    name,
                    SymbolKind::Variable,
                    DeclarationKind::Var,
                    scope,
                    DUMMY_SP,
                )
            })
            .collect()
    }

    #[test]
    fn absent_symbol_reads_unknown() {
        let x = symbols(&["x"])[0];
        let state = ProgramState::new();

        assert_eq!(state.get(x), AbstractValue::Unknown);
        assert!(state.is_empty());
    }

    #[test]
    fn set_returns_new_state_and_leaves_original() {
        let ids = symbols(&["x", "y"]);
        let (x, y) = (ids[0], ids[1]);
        let original = ProgramState::new().set(x, AbstractValue::Null);

        let next = original.set(y, AbstractValue::Truthy);

        assert_eq!(original.get(y), AbstractValue::Unknown);
        assert_eq!(next.get(x), AbstractValue::Null);
        assert_eq!(next.get(y), AbstractValue::Truthy);
    }

    #[test]
    fn setting_unknown_removes_entry() {
        let x = symbols(&["x"])[0];
        let state = ProgramState::new()
            .set(x, AbstractValue::Null)
            .set(x, AbstractValue::Unknown);

        assert_eq!(state, ProgramState::new());
    }

    #[test]
    fn merge_with_itself_is_identity() {
        let ids = symbols(&["x", "y"]);
        let (x, y) = (ids[0], ids[1]);
        let state = ProgramState::new()
            .set(x, AbstractValue::Null)
            .set(y, AbstractValue::Boolean);

        assert_eq!(state.merge(&state), state);
    }

    #[test]
    fn merge_is_pointwise() {
        let ids = symbols(&["x", "y"]);
        let (x, y) = (ids[0], ids[1]);
        let a = ProgramState::new()
            .set(x, AbstractValue::Null)
            .set(y, AbstractValue::True);
        let b = ProgramState::new().set(x, AbstractValue::Undefined);

        let merged = a.merge(&b);

        assert_eq!(merged.get(x), AbstractValue::UndefinedOrNull);
        assert_eq!(merged.get(y), AbstractValue::Unknown);
        assert_eq!(merged, b.merge(&a));
    }

    #[test]
    fn forgotten_symbol_ignores_later_writes() {
        let x = symbols(&["x"])[0];
        let state = ProgramState::new()
            .set(x, AbstractValue::Null)
            .forget(x)
            .set(x, AbstractValue::Undefined);

        assert!(state.is_escaped(x));
        assert_eq!(state.get(x), AbstractValue::Unknown);
    }

    #[test]
    fn states_differing_on_dead_symbols_become_equal() {
        let ids = symbols(&["x", "y"]);
        let (x, y) = (ids[0], ids[1]);
        let a = ProgramState::new()
            .set(x, AbstractValue::Null)
            .set(y, AbstractValue::True);
        let b = ProgramState::new()
            .set(x, AbstractValue::Null)
            .set(y, AbstractValue::False);
        let live = BTreeSet::from([x]);

        assert_ne!(a, b);
        assert_eq!(a.restrict(&live), b.restrict(&live));
    }

    #[test]
    fn widen_drops_divergent_symbols() {
        let ids = symbols(&["x", "y"]);
        let (x, y) = (ids[0], ids[1]);
        let entry = ProgramState::new()
            .set(x, AbstractValue::Undefined)
            .set(y, AbstractValue::Null);
        let later = ProgramState::new()
            .set(x, AbstractValue::NotNull)
            .set(y, AbstractValue::Null);

        let widened = later.widen(&entry);

        assert_eq!(widened.get(x), AbstractValue::Unknown);
        assert_eq!(widened.get(y), AbstractValue::Null);
    }
}
