//! Annotation harness for the JavaScript fixtures in `tests/fixtures/`
//!
//! Annotations live in trailing comments:
//! - `// Noncompliant [[sc=7;ec=8]] {{message}}` expects exactly one finding
//!   on the line; the location and message parts are optional
//! - `// FP` expects a finding the code does not deserve
//! - `// OK`, `// Compliant` and `// FN` expect no finding
//! - `// PS x=NULL y=UNKNOWN` checks the value of each symbol merged over
//!   every state reaching the first element of the line

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use kensa_core::config::EngineConfig;
use kensa_core::parser::ParsedFile;
use kensa_core::se::{AbstractValue, FunctionContext, Observer, ProgramState, SymbolicEngine};
use kensa_core::semantic::SymbolId;
use kensa_core::{AnalysisEngine, Diagnostic};
use regex::Regex;
use swc_common::{BytePos, Span};

pub const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

static FINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//\s*(Noncompliant|FP)\b(.*)$").expect("Invalid regex pattern"));
static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[sc=(\d+);ec=(\d+)\]\]").expect("Invalid regex pattern"));
static MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.+?)\}\}").expect("Invalid regex pattern"));
static CLEAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//\s*(OK|Compliant|FN)\b").expect("Invalid regex pattern"));
static STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//\s*PS\s+(.+)$").expect("Invalid regex pattern"));
static BINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)=(\w+)").expect("Invalid regex pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFinding {
    pub columns: Option<(usize, usize)>,
    pub message: Option<String>,
}

#[derive(Debug, Default)]
pub struct Expectations {
    pub findings: BTreeMap<usize, ExpectedFinding>,
    pub clean: Vec<usize>,
    pub states: BTreeMap<usize, Vec<(String, AbstractValue)>>,
}

impl Expectations {
    pub fn parse(source: &str) -> Self {
        let mut expectations = Self::default();

        for (index, text) in source.lines().enumerate() {
            let line = index + 1;

            if let Some(captures) = FINDING.captures(text) {
                let rest = &captures[2];
                let columns = LOCATION.captures(rest).map(|c| {
                    (
                        c[1].parse().expect("start column"),
                        c[2].parse().expect("end column"),
                    )
                });
                let message = MESSAGE.captures(rest).map(|c| c[1].to_string());
                expectations
                    .findings
                    .insert(line, ExpectedFinding { columns, message });
            } else if CLEAN.is_match(text) {
                expectations.clean.push(line);
            }

            if let Some(captures) = STATE.captures(text) {
                let bindings = BINDING
                    .captures_iter(&captures[1])
                    .map(|c| {
                        let value = c[2]
                            .parse::<AbstractValue>()
                            .unwrap_or_else(|e| panic!("line {line}: {e}"));
                        (c[1].to_string(), value)
                    })
                    .collect();
                expectations.states.insert(line, bindings);
            }
        }

        expectations
    }
}

pub fn read_fixture(name: &str) -> String {
    let path = Path::new(FIXTURES_DIR).join(name);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

pub fn fixture_names() -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(FIXTURES_DIR)
        .expect("Failed to read fixtures directory")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".js"))
        .collect();
    names.sort();
    names
}

/// Analyzes fixture `name` and panics with every annotation mismatch.
pub fn check_fixture(name: &str) {
    let source = read_fixture(name);
    let file = ParsedFile::from_source(name, &source);
    assert!(
        file.errors().is_empty(),
        "fixture {name} has syntax errors: {:?}",
        file.errors()
    );

    let expectations = Expectations::parse(&source);
    let diagnostics = AnalysisEngine::new().analyze(&file);

    let mut failures = check_findings(&expectations, &diagnostics);
    failures.extend(check_states(&file, &expectations.states));

    assert!(
        failures.is_empty(),
        "{name} does not match its annotations:\n{}",
        failures.join("\n")
    );
}

fn check_findings(expectations: &Expectations, diagnostics: &[Diagnostic]) -> Vec<String> {
    let mut by_line: BTreeMap<usize, Vec<&Diagnostic>> = BTreeMap::new();
    for diagnostic in diagnostics {
        by_line.entry(diagnostic.line).or_default().push(diagnostic);
    }

    let mut failures = Vec::new();
    for (line, expected) in &expectations.findings {
        let found = by_line.get(line).map(Vec::as_slice).unwrap_or_default();
        let [finding] = found else {
            failures.push(format!(
                "line {line}: expected one finding, got {}",
                describe(found)
            ));
            continue;
        };
        if let Some((start, end)) = expected.columns
            && (finding.column, finding.end_column) != (start, end)
        {
            failures.push(format!(
                "line {line}: expected columns {start}..{end}, got {}..{}",
                finding.column, finding.end_column
            ));
        }
        if let Some(message) = &expected.message
            && &finding.message != message
        {
            failures.push(format!(
                "line {line}: expected message {message:?}, got {:?}",
                finding.message
            ));
        }
    }

    for (line, found) in &by_line {
        if expectations.findings.contains_key(line) {
            continue;
        }
        let reason = if expectations.clean.contains(line) {
            "marked clean but got"
        } else {
            "unannotated"
        };
        failures.push(format!("line {line}: {reason} {}", describe(found)));
    }

    failures
}

fn describe(found: &[&Diagnostic]) -> String {
    if found.is_empty() {
        return "nothing".to_string();
    }
    found
        .iter()
        .map(|d| format!("{} {:?}", d.rule_id, d.message))
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_states(
    file: &ParsedFile,
    expected: &BTreeMap<usize, Vec<(String, AbstractValue)>>,
) -> Vec<String> {
    if expected.is_empty() {
        return Vec::new();
    }
    let Some(module) = file.module() else {
        return vec!["no module to explore".to_string()];
    };

    let mut probe = StateProbe {
        file,
        watched: expected,
        scope: HashMap::new(),
        seen: HashMap::new(),
    };
    SymbolicEngine::new(EngineConfig::default()).run(module, &mut probe);

    let mut failures = Vec::new();
    for (line, bindings) in expected {
        let Some((_, values)) = probe.seen.get(line) else {
            failures.push(format!("line {line}: never reached"));
            continue;
        };
        for (symbol, value) in bindings {
            match values.get(symbol) {
                Some(actual) if actual == value => {}
                Some(actual) => failures.push(format!(
                    "line {line}: expected {symbol}={value}, got {symbol}={actual}"
                )),
                None => failures.push(format!("line {line}: {symbol} is not tracked")),
            }
        }
    }
    failures
}

/// Records watched symbols before the first element of each watched line.
struct StateProbe<'a> {
    file: &'a ParsedFile,
    watched: &'a BTreeMap<usize, Vec<(String, AbstractValue)>>,
    scope: HashMap<String, SymbolId>,
    seen: HashMap<usize, (BytePos, HashMap<String, AbstractValue>)>,
}

impl Observer for StateProbe<'_> {
    fn start_function(&mut self, function: &FunctionContext<'_>) {
        self.scope = function
            .tracked
            .iter()
            .map(|&symbol| (function.symbol_name(symbol).to_string(), symbol))
            .collect();
    }

    fn before_element(&mut self, span: Span, state: &ProgramState) {
        let line = self.file.position(span.lo).line;
        let Some(bindings) = self.watched.get(&line) else {
            return;
        };

        let entry = self
            .seen
            .entry(line)
            .or_insert_with(|| (span.lo, HashMap::new()));
        if span.lo > entry.0 {
            return;
        }
        if span.lo < entry.0 {
            *entry = (span.lo, HashMap::new());
        }

        for (symbol, _) in bindings {
            let Some(&id) = self.scope.get(symbol) else {
                continue;
            };
            let value = state.get(id);
            entry
                .1
                .entry(symbol.clone())
                .and_modify(|merged| *merged = merged.merge(value))
                .or_insert(value);
        }
    }
}
