//! Symbolic execution engine
//!
//! Explores every function of a module path by path, tracking for each
//! local binding whether it may be `null`, `undefined`, truthy or falsy.
//! Detectors subscribe to the exploration through [`Observer`].

pub mod explorer;
pub mod liveness;
pub mod narrowing;
pub mod observer;
pub mod state;
pub mod tracking;
pub mod value;

pub use explorer::{RunSummary, SymbolicEngine};
pub use observer::{
    Condition, Dereference, DereferenceKind, FunctionContext, FunctionOutcome, Observer,
};
pub use state::ProgramState;
pub use value::{AbstractValue, Truthiness};

/// Internal invariant violations. They abort the analysis of one function
/// only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("block {block} ends with a test but has no branch targets")]
    MissingBranch { block: usize },
    #[error("block {block} is not part of the control flow graph")]
    UnknownBlock { block: usize },
    #[error("block {block} has a test before its last element")]
    ConditionOutsideBranch { block: usize },
}
