//! Check command - analyzes JavaScript/TypeScript files

use crate::output::json::JsonFormatter;
use crate::output::pretty::PrettyFormatter;
use crate::output::text::TextFormatter;
use crate::output::{EngineTotals, OutputFormat};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kensa_core::analysis::AnalysisEngine;
use kensa_core::config::load_config_or_default_with_warnings;
use kensa_core::diagnostic::Diagnostic;
use kensa_core::parser::{ParsedFile, SUPPORTED_EXTENSIONS};
use kensa_core::rules::Severity;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to file or directory to analyze
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Output format for diagnostics
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,

    /// Fail on warnings (exit code 1)
    #[arg(long)]
    pub fail_on_warnings: bool,

    /// Filter diagnostics by minimum severity level (error, warning, info, hint)
    #[arg(long, value_name = "LEVEL")]
    pub severity: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Everything one `check` run produced, before it is printed.
#[derive(Debug)]
pub struct CheckReport {
    pub diagnostics: Vec<Diagnostic>,
    pub sources: HashMap<String, String>,
    pub total_files: usize,
    pub totals: EngineTotals,
}

impl CheckReport {
    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        self.configure_colors();

        let Some((report, engine)) = self.execute()? else {
            println!("No JavaScript/TypeScript files found.");
            return Ok(());
        };

        let analyzed_path = self.path.to_string_lossy().to_string();
        match self.format {
            OutputFormat::Json => {
                let formatter = JsonFormatter::with_registry(engine.registry());
                println!(
                    "{}",
                    formatter.format(
                        &report.diagnostics,
                        report.total_files,
                        &analyzed_path,
                        report.totals
                    )
                );
            }
            OutputFormat::Text => print!("{}", TextFormatter.format(&report.diagnostics)),
            OutputFormat::Pretty => {
                let formatter = PrettyFormatter::with_sources(report.sources.clone());
                print!("{}", formatter.format(&report.diagnostics));
            }
        }

        let has_errors = report.count(Severity::Error) > 0;
        let has_warnings = report.count(Severity::Warning) > 0 && self.fail_on_warnings;

        if has_errors || has_warnings {
            process::exit(1);
        }

        Ok(())
    }

    /// Analyzes every supported file under the path. `None` when there is
    /// nothing to analyze.
    fn execute(&self) -> Result<Option<(CheckReport, AnalysisEngine)>> {
        let span = info_span!("check", path = %self.path.display());
        let _enter = span.enter();

        let config_result = load_config_or_default_with_warnings(&self.path);
        for warning in &config_result.warnings {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }
        let config = config_result.config;

        let files = discover_files(&self.path)?;
        if files.is_empty() {
            return Ok(None);
        }
        info!(files = files.len(), "analyzing");

        let engine = AnalysisEngine::with_config(&config);
        let min_severity = self.parse_severity()?;

        let results: Vec<_> = files
            .par_iter()
            .filter_map(|file| {
                let content = match fs::read_to_string(file) {
                    Ok(content) => content,
                    Err(err) => {
                        warn!(file = %file.display(), error = %err, "skipping unreadable file");
                        return None;
                    }
                };
                let name = file.to_string_lossy().to_string();
                let parsed = ParsedFile::from_source(&name, &content);
                let analysis = engine.analyze_file(&parsed);
                debug!(
                    file = %name,
                    functions = analysis.summary.functions,
                    degraded = analysis.summary.degraded,
                    failed = analysis.summary.failed,
                    diagnostics = analysis.diagnostics.len(),
                    "analyzed"
                );
                Some((name, content, analysis))
            })
            .collect();

        let mut report = CheckReport {
            diagnostics: Vec::new(),
            sources: HashMap::new(),
            total_files: files.len(),
            totals: EngineTotals::default(),
        };
        for (name, content, analysis) in results {
            report.totals.add(&analysis.summary);
            report.diagnostics.extend(
                analysis
                    .diagnostics
                    .into_iter()
                    .filter(|d| severity_level(&d.severity) >= severity_level(&min_severity)),
            );
            report.sources.insert(name, content);
        }

        if report.totals.degraded > 0 || report.totals.failed > 0 {
            info!(
                degraded = report.totals.degraded,
                failed = report.totals.failed,
                "some functions were not fully explored"
            );
        }

        Ok(Some((report, engine)))
    }

    fn parse_severity(&self) -> Result<Severity> {
        match self.severity.as_deref() {
            Some("error") => Ok(Severity::Error),
            Some("warning") => Ok(Severity::Warning),
            Some("info") => Ok(Severity::Info),
            Some("hint") => Ok(Severity::Hint),
            Some(other) => anyhow::bail!(
                "Invalid severity '{}'. Valid values: error, warning, info, hint",
                other
            ),
            None => Ok(Severity::Hint),
        }
    }

    fn configure_colors(&self) {
        let no_color_env = std::env::var("NO_COLOR").is_ok();
        if self.no_color || no_color_env {
            colored::control::set_override(false);
        }
    }
}

fn discover_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        if is_supported_file(path) {
            return Ok(vec![path.to_path_buf()]);
        } else {
            return Ok(vec![]);
        }
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_supported_file(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    Ok(files)
}

fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || name == "node_modules")
        .unwrap_or(false)
}

fn severity_level(severity: &Severity) -> u8 {
    match severity {
        Severity::Error => 4,
        Severity::Warning => 3,
        Severity::Info => 2,
        Severity::Hint => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn args(path: &Path) -> CheckArgs {
        CheckArgs {
            path: path.to_path_buf(),
            format: OutputFormat::Json,
            fail_on_warnings: false,
            severity: None,
            no_color: true,
        }
    }

    fn write_file(path: &Path, content: &str) {
        let mut file = File::create(path).unwrap();
        write!(file, "{}", content).unwrap();
    }

    #[test]
    fn discover_files_finds_single_js_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.js");
        File::create(&file_path).unwrap();

        let files = discover_files(&file_path).unwrap();

        assert_eq!(files, vec![file_path]);
    }

    #[test]
    fn discover_files_finds_files_in_directory() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.js")).unwrap();
        File::create(dir.path().join("b.ts")).unwrap();
        File::create(dir.path().join("c.mjs")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 3);
    }

    #[test]
    fn discover_files_ignores_unsupported_extensions() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("test.js")).unwrap();
        File::create(dir.path().join("readme.md")).unwrap();
        File::create(dir.path().join("config.json")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
    }

    #[test]
    fn discover_files_skips_hidden_directories_and_node_modules() {
        let dir = tempdir().unwrap();
        for skipped in [".git", "node_modules"] {
            let skipped_dir = dir.path().join(skipped);
            fs::create_dir(&skipped_dir).unwrap();
            File::create(skipped_dir.join("dep.js")).unwrap();
        }
        File::create(dir.path().join("src.js")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().contains("src.js"));
    }

    #[test]
    fn discover_files_is_recursive_and_sorted() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("src");
        fs::create_dir(&subdir).unwrap();
        File::create(dir.path().join("root.js")).unwrap();
        File::create(subdir.join("nested.ts")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 2);
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn discover_files_rejects_missing_path() {
        let dir = tempdir().unwrap();

        assert!(discover_files(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn is_supported_file_matches_parser_extensions() {
        assert!(is_supported_file(Path::new("test.js")));
        assert!(is_supported_file(Path::new("test.cjs")));
        assert!(is_supported_file(Path::new("test.tsx")));
        assert!(!is_supported_file(Path::new("test.md")));
        assert!(!is_supported_file(Path::new("Makefile")));
    }

    #[test]
    fn severity_level_ordering() {
        assert!(severity_level(&Severity::Error) > severity_level(&Severity::Warning));
        assert!(severity_level(&Severity::Warning) > severity_level(&Severity::Info));
        assert!(severity_level(&Severity::Info) > severity_level(&Severity::Hint));
    }

    #[test]
    fn parse_severity_accepts_known_levels() {
        let dir = tempdir().unwrap();
        let mut check = args(dir.path());
        check.severity = Some("error".to_string());

        assert_eq!(check.parse_severity().unwrap(), Severity::Error);
    }

    #[test]
    fn parse_severity_rejects_unknown_levels() {
        let dir = tempdir().unwrap();
        let mut check = args(dir.path());
        check.severity = Some("fatal".to_string());

        assert!(check.parse_severity().is_err());
    }

    #[test]
    fn execute_reports_findings_with_sources() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("app.js");
        write_file(
            &file_path,
            "function f() {\n  var a;\n  if (a) {}\n  var x = null;\n  x.y;\n}\n",
        );

        let (report, _) = args(dir.path()).execute().unwrap().unwrap();

        let ids: Vec<&str> = report.diagnostics.iter().map(|d| d.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["B003", "B001"]);
        assert_eq!(report.total_files, 1);
        assert_eq!(report.totals.functions, 1);
        assert_eq!(report.count(Severity::Error), 1);
        assert!(report.sources.contains_key(&file_path.to_string_lossy().to_string()));
    }

    #[test]
    fn execute_filters_by_severity() {
        let dir = tempdir().unwrap();
        write_file(
            &dir.path().join("app.js"),
            "function f() { var a; if (a) {} }\n",
        );
        let mut check = args(dir.path());
        check.severity = Some("error".to_string());

        let (report, _) = check.execute().unwrap().unwrap();

        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn execute_honors_config_file() {
        let dir = tempdir().unwrap();
        write_file(
            &dir.path().join("kensa.toml"),
            "[rules]\ndisabled = [\"constant-condition\"]\n",
        );
        write_file(
            &dir.path().join("app.js"),
            "function f() { var a; if (a) {} }\n",
        );

        let (report, _) = args(dir.path()).execute().unwrap().unwrap();

        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn execute_with_no_files_returns_none() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        assert!(args(dir.path()).execute().unwrap().is_none());
    }
}
