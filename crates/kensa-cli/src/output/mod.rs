//! Diagnostic formatters

pub mod json;
pub mod pretty;
pub mod text;

use clap::ValueEnum;
use kensa_core::se::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, with a source excerpt under each finding
    Pretty,
    /// One line per finding
    Text,
    Json,
}

/// Engine bookkeeping summed over every analyzed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineTotals {
    pub functions: usize,
    pub degraded: usize,
    pub failed: usize,
}

impl EngineTotals {
    pub fn add(&mut self, summary: &RunSummary) {
        self.functions += summary.functions;
        self.degraded += summary.degraded;
        self.failed += summary.failed;
    }
}
