//! Kensa core library
//!
//! Path-sensitive symbolic execution over JavaScript/TypeScript functions,
//! with detectors for null dereferences, type errors on nully values and
//! conditions that always evaluate the same way.

pub mod analysis;
pub mod config;
pub mod diagnostic;
pub mod disable_comments;
pub mod parser;
pub mod rules;
pub mod se;
pub mod semantic;

pub use analysis::AnalysisEngine;
pub use diagnostic::Diagnostic;
pub use parser::ParsedFile;
