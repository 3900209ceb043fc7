//! Parser front end over SWC
//!
//! Parses a source file into a module in error-recovering mode and keeps
//! what later passes need to turn spans back into source positions.

use std::ops::Range;
use std::sync::OnceLock;

use swc_common::sync::Lrc;
use swc_common::{BytePos, FileName, SourceMap, Span, Spanned};
use swc_ecma_ast::{ModuleItem, Program};
use swc_ecma_parser::{EsSyntax, Syntax, TsSyntax, parse_file_as_program};

use crate::disable_comments::DisableDirectives;

pub use swc_ecma_ast::{EsVersion, Module};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
}

pub fn detect_language(filename: &str) -> Language {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();

    match ext.as_str() {
        "ts" | "mts" | "cts" => Language::TypeScript,
        "tsx" => Language::Tsx,
        "jsx" => Language::Jsx,
        _ => Language::JavaScript,
    }
}

/// Extensions `kensa check` picks up when walking a directory.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"];

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub span_lo: u32,
    pub span_hi: u32,
    pub message: String,
}

#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<Module>,
    pub errors: Vec<ParseError>,
    /// Position of the first byte of the source in span coordinates.
    pub start_pos: BytePos,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.module.is_some()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub filename: String,
    pub language: Language,
    pub line_count: usize,
    pub has_errors: bool,
}

/// A 1-based line and column. Columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

pub struct ParsedFile {
    source: String,
    metadata: FileMetadata,
    ast_module: Option<Module>,
    errors: Vec<ParseError>,
    start_pos: BytePos,
    line_ranges: OnceLock<Vec<Range<usize>>>,
    disable_directives: DisableDirectives,
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("metadata", &self.metadata)
            .field("has_module", &self.ast_module.is_some())
            .field("error_count", &self.errors.len())
            .finish()
    }
}

impl ParsedFile {
    pub fn from_source(filename: &str, source: &str) -> Self {
        let language = detect_language(filename);
        let parse_result = Parser::for_file(filename).parse_module_recovering(source);
        let disable_directives = DisableDirectives::from_source(source);

        let line_count = if source.is_empty() {
            0
        } else {
            source.lines().count()
        };

        let metadata = FileMetadata {
            filename: filename.to_string(),
            language,
            line_count,
            has_errors: parse_result.has_errors(),
        };

        Self {
            source: source.to_string(),
            metadata,
            ast_module: parse_result.module,
            errors: parse_result.errors,
            start_pos: parse_result.start_pos,
            line_ranges: OnceLock::new(),
            disable_directives,
        }
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn module(&self) -> Option<&Module> {
        self.ast_module.as_ref()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn disable_directives(&self) -> &DisableDirectives {
        &self.disable_directives
    }

    pub fn get_line(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 {
            return None;
        }
        self.line_ranges()
            .get(line_number - 1)
            .map(|range| &self.source[range.clone()])
    }

    /// Byte offset of `pos` into the source text.
    pub fn offset(&self, pos: BytePos) -> usize {
        (pos.0.saturating_sub(self.start_pos.0) as usize).min(self.source.len())
    }

    pub fn position(&self, pos: BytePos) -> Position {
        let offset = self.offset(pos);
        let ranges = self.line_ranges();
        let index = ranges
            .partition_point(|range| range.start <= offset)
            .saturating_sub(1);
        let line_start = ranges.get(index).map_or(0, |range| range.start);
        let column = self
            .source
            .get(line_start..offset)
            .map_or(0, |prefix| prefix.chars().count());
        Position {
            line: index + 1,
            column: column + 1,
        }
    }

    /// Start and exclusive end of a span.
    pub fn span_positions(&self, span: Span) -> (Position, Position) {
        (self.position(span.lo), self.position(span.hi))
    }

    pub fn span_text(&self, span: Span) -> &str {
        let lo = self.offset(span.lo);
        let hi = self.offset(span.hi).max(lo);
        self.source.get(lo..hi).unwrap_or("")
    }

    fn line_ranges(&self) -> &[Range<usize>] {
        self.line_ranges.get_or_init(|| build_line_ranges(&self.source))
    }
}

fn build_line_ranges(source: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;

    for (i, c) in source.char_indices() {
        if c == '\n' {
            let end = if source[..i].ends_with('\r') { i - 1 } else { i };
            ranges.push(start..end);
            start = i + 1;
        }
    }
    ranges.push(start..source.len());

    ranges
}

#[derive(Debug, Clone, Default)]
pub struct ParserBuilder {
    jsx: bool,
    typescript: bool,
    decorators: bool,
}

impl ParserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jsx(mut self, enabled: bool) -> Self {
        self.jsx = enabled;
        self
    }

    pub fn typescript(mut self, enabled: bool) -> Self {
        self.typescript = enabled;
        self
    }

    pub fn decorators(mut self, enabled: bool) -> Self {
        self.decorators = enabled;
        self
    }

    pub fn build(self) -> Parser {
        let syntax = if self.typescript {
            Syntax::Typescript(TsSyntax {
                tsx: self.jsx,
                decorators: self.decorators,
                ..Default::default()
            })
        } else {
            Syntax::Es(EsSyntax {
                jsx: self.jsx,
                decorators: self.decorators,
                ..Default::default()
            })
        };

        Parser { syntax }
    }
}

#[derive(Debug, Clone)]
pub struct Parser {
    syntax: Syntax,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            syntax: Syntax::Es(Default::default()),
        }
    }

    pub fn for_file(filename: &str) -> Self {
        match detect_language(filename) {
            Language::JavaScript => Self::builder().decorators(true).build(),
            Language::TypeScript => Self::builder().typescript(true).decorators(true).build(),
            Language::Jsx => Self::builder().jsx(true).decorators(true).build(),
            Language::Tsx => Self::builder()
                .typescript(true)
                .jsx(true)
                .decorators(true)
                .build(),
        }
    }

    pub fn builder() -> ParserBuilder {
        ParserBuilder::new()
    }

    pub fn parse_module_recovering(&self, code: &str) -> ParseResult {
        let source_map: Lrc<SourceMap> = Default::default();
        let fm = source_map
            .new_source_file(FileName::Custom("input.js".into()).into(), code.to_string());

        let mut recovered_errors = Vec::new();
        // Files without import/export parse as sloppy scripts.
        let result = parse_file_as_program(
            &fm,
            self.syntax,
            EsVersion::latest(),
            None,
            &mut recovered_errors,
        );

        let to_parse_error = |e: swc_ecma_parser::error::Error| {
            let span = e.span();
            let loc = source_map.lookup_char_pos(span.lo);
            ParseError {
                line: loc.line,
                column: loc.col_display + 1,
                span_lo: span.lo.0,
                span_hi: span.hi.0,
                message: e.kind().msg().to_string(),
            }
        };

        let mut errors: Vec<ParseError> = recovered_errors.into_iter().map(to_parse_error).collect();
        let module = match result {
            Ok(Program::Module(module)) => Some(module),
            Ok(Program::Script(script)) => Some(Module {
                span: script.span,
                body: script.body.into_iter().map(ModuleItem::Stmt).collect(),
                shebang: script.shebang,
            }),
            Err(e) => {
                errors.push(to_parse_error(e));
                None
            }
        };

        ParseResult {
            module,
            errors,
            start_pos: fm.start_pos,
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swc_ecma_ast::{Decl, Stmt};

    #[test]
    fn parse_function_declaration() {
        let result = Parser::new().parse_module_recovering("function foo() { return 42; }");

        assert!(result.is_ok());
        assert!(!result.has_errors());
        assert_eq!(result.module.unwrap().body.len(), 1);
    }

    #[test]
    fn fatal_error_leaves_no_module() {
        let result = Parser::new().parse_module_recovering("const = ;");

        assert!(!result.is_ok());
        let error = &result.errors[0];
        assert_eq!(error.line, 1);
        assert!(error.column > 0);
        assert!(!error.message.is_empty());
    }

    #[test]
    fn sloppy_scripts_parse_cleanly() {
        for code in [
            "function f(o) { with (o) { a = 1; } }",
            "var mode = 010;",
            "function g() { arguments = null; }",
        ] {
            let result = Parser::new().parse_module_recovering(code);
            assert!(!result.has_errors(), "{code}: {:?}", result.errors);
            assert!(result.module.is_some());
        }
    }

    #[test]
    fn module_syntax_keeps_declarations() {
        let result = Parser::new().parse_module_recovering("import a from 'a';\nexport const b = a;");

        assert!(!result.has_errors());
        let module = result.module.unwrap();
        assert!(module.body.iter().all(|item| matches!(item, ModuleItem::ModuleDecl(_))));
    }

    #[test]
    fn dialect_follows_extension() {
        let ts = ParsedFile::from_source("types.ts", "interface User { id: number }");
        let tsx = ParsedFile::from_source("app.tsx", "const App = (): JSX.Element => <div />;");
        let jsx = ParsedFile::from_source("app.jsx", "const el = <div>{x}</div>;");

        assert!(!ts.metadata().has_errors);
        assert!(!tsx.metadata().has_errors);
        assert!(!jsx.metadata().has_errors);
        assert_eq!(tsx.metadata().language, Language::Tsx);
    }

    #[test]
    fn detect_language_from_extension() {
        assert_eq!(detect_language("file.js"), Language::JavaScript);
        assert_eq!(detect_language("file.mjs"), Language::JavaScript);
        assert_eq!(detect_language("file.jsx"), Language::Jsx);
        assert_eq!(detect_language("file.mts"), Language::TypeScript);
        assert_eq!(detect_language("file.tsx"), Language::Tsx);
        assert_eq!(detect_language("unknown"), Language::JavaScript);
    }

    #[test]
    fn spans_map_to_one_based_positions() {
        let file = ParsedFile::from_source("test.js", "var a;\n  if (a) {}\n");
        let module = file.module().unwrap();
        let ModuleItem::Stmt(Stmt::If(if_stmt)) = &module.body[1] else {
            panic!("expected if statement");
        };

        let (start, end) = file.span_positions(if_stmt.test.span());

        assert_eq!(start, Position { line: 2, column: 7 });
        assert_eq!(end, Position { line: 2, column: 8 });
        assert_eq!(file.span_text(if_stmt.test.span()), "a");
    }

    #[test]
    fn span_text_of_declaration() {
        let file = ParsedFile::from_source("test.js", "const answer = 42;");
        let module = file.module().unwrap();
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = &module.body[0] else {
            panic!("expected variable declaration");
        };

        assert_eq!(file.span_text(var.decls[0].name.span()), "answer");
    }

    #[test]
    fn get_line_handles_crlf() {
        let file = ParsedFile::from_source("test.js", "a;\r\nb;\r\n");

        assert_eq!(file.get_line(1), Some("a;"));
        assert_eq!(file.get_line(2), Some("b;"));
        assert_eq!(file.get_line(0), None);
        assert_eq!(file.metadata().line_count, 2);
    }
}
