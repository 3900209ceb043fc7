use std::hint::black_box;
use std::time::Instant;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use kensa_core::analysis::AnalysisEngine;
use kensa_core::config::EngineConfig;
use kensa_core::parser::ParsedFile;
use kensa_core::se::{Observer, SymbolicEngine};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

/// One function with `branches` independent `if`s, each assigning a local
/// that stays live until the end.
fn generate_branchy_function(branches: usize) -> String {
    let mut code = String::with_capacity(branches * 80);
    code.push_str("function branchy(c) {\n");
    for i in 0..branches {
        code.push_str(&format!(
            "  var v{i};\n  if (c({i})) {{\n    v{i} = null;\n  }} else {{\n    v{i} = load({i});\n  }}\n"
        ));
    }
    let all: Vec<String> = (0..branches).map(|i| format!("v{i}")).collect();
    code.push_str(&format!("  return use({});\n}}\n", all.join(", ")));
    code
}

fn generate_functions(count: usize) -> String {
    let mut code = String::with_capacity(count * 300);
    for i in 0..count {
        code.push_str(&format!(
            r#"function handler{i}(request, options) {{
  var result;
  if (request && request.body) {{
    result = parse(request.body);
  }}
  for (const item of options.items || []) {{
    if (item == null) {{
      continue;
    }}
    item.process(result);
  }}
  try {{
    result = transform(result);
  }} catch (err) {{
    log(err.message);
  }}
  return result != null ? result.value : undefined;
}}

"#
        ));
    }
    code
}

fn read_fixture(path: &str) -> String {
    std::fs::read_to_string(format!("{}/{}", FIXTURES_DIR, path))
        .unwrap_or_else(|_| panic!("Failed to read fixture: {}", path))
}

struct NullObserver;

impl Observer for NullObserver {}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    let engine = SymbolicEngine::new(EngineConfig::default());

    for branches in [4, 8, 12, 16] {
        let file = ParsedFile::from_source("branchy.js", &generate_branchy_function(branches));
        let Some(module) = file.module() else {
            panic!("generated code failed to parse");
        };
        group.bench_with_input(
            BenchmarkId::new("independent_branches", branches),
            &branches,
            |b, _| b.iter(|| engine.run(black_box(module), &mut NullObserver)),
        );
    }

    let code = generate_functions(50);
    let lines = code.lines().count();
    let file = ParsedFile::from_source("handlers.js", &code);
    let Some(module) = file.module() else {
        panic!("generated code failed to parse");
    };
    group.throughput(Throughput::Elements(lines as u64));
    group.bench_function("50_functions", |b| {
        b.iter(|| engine.run(black_box(module), &mut NullObserver))
    });

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    let engine = AnalysisEngine::new();

    for name in ["null_dereference.js", "constant_condition.js", "path_explosion.js"] {
        let file = ParsedFile::from_source(name, &read_fixture(name));
        group.bench_function(name, |b| b.iter(|| engine.analyze(black_box(&file))));
    }

    let code = generate_functions(50);
    group.bench_function("parse_and_analyze_50_functions", |b| {
        b.iter(|| {
            let file = ParsedFile::from_source(black_box("handlers.js"), black_box(&code));
            engine.analyze(&file)
        })
    });

    group.finish();
}

fn bench_latency_percentiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("latency");
    let engine = AnalysisEngine::new();
    let code = generate_branchy_function(16);

    group.bench_function("p95_branchy_parse_analyze", |b| {
        b.iter_custom(|iters| {
            let mut durations: Vec<_> = (0..iters)
                .map(|_| {
                    let start = Instant::now();
                    let file = ParsedFile::from_source(black_box("branchy.js"), black_box(&code));
                    let _ = engine.analyze(black_box(&file));
                    start.elapsed()
                })
                .collect();
            durations.sort();
            let p95_idx = ((iters as f64) * 0.95) as usize;
            let p95_idx = p95_idx.min(durations.len().saturating_sub(1));
            durations[p95_idx]
        })
    });

    group.finish();
}

criterion_group!(benches, bench_engine, bench_analysis, bench_latency_percentiles);
criterion_main!(benches);
