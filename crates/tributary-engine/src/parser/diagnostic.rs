//! Parse diagnostics and their rendering with source context

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity as CsSeverity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::Buffer;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::parser::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A message attached to a location in a header
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub path: PathBuf,
    pub span: Span,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            path: path.into(),
            span,
            notes: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>, path: impl Into<PathBuf>, span: Span) -> Self {
        Self::new(Severity::Error, message, path, span)
    }

    pub fn warning(message: impl Into<String>, path: impl Into<PathBuf>, span: Span) -> Self {
        Self::new(Severity::Warning, message, path, span)
    }

    pub fn info(message: impl Into<String>, path: impl Into<PathBuf>, span: Span) -> Self {
        Self::new(Severity::Info, message, path, span)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Lower an error to a warning, leaving other severities alone
    pub fn downgrade(mut self) -> Self {
        if self.severity == Severity::Error {
            self.severity = Severity::Warning;
        }
        self
    }

    fn to_codespan(&self, file_id: usize) -> CsDiagnostic<usize> {
        let severity = match self.severity {
            Severity::Info => CsSeverity::Note,
            Severity::Warning => CsSeverity::Warning,
            Severity::Error => CsSeverity::Error,
        };
        CsDiagnostic::new(severity)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(file_id, self.span.start..self.span.end)])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.path.display(),
            self.span.line,
            self.span.column,
            self.severity,
            self.message
        )
    }
}

/// Render diagnostics with source snippets.
///
/// `sources` maps a path to the text it was parsed from. Diagnostics whose
/// file is unknown, or whose span no longer fits the text, fall back to the
/// single-line form.
pub fn render(diagnostics: &[&Diagnostic], sources: &FxHashMap<PathBuf, String>) -> String {
    let mut files = SimpleFiles::new();
    let mut ids: FxHashMap<&Path, usize> = FxHashMap::default();
    let mut buffer = Buffer::no_color();
    let config = term::Config::default();
    let mut fallback = String::new();

    for diagnostic in diagnostics {
        let file_id = match sources.get(&diagnostic.path) {
            Some(text) if diagnostic.span.end <= text.len() => {
                *ids.entry(diagnostic.path.as_path()).or_insert_with(|| {
                    files.add(diagnostic.path.display().to_string(), text.clone())
                })
            }
            _ => {
                fallback.push_str(&diagnostic.to_string());
                fallback.push('\n');
                continue;
            }
        };

        if term::emit(&mut buffer, &config, &files, &diagnostic.to_codespan(file_id)).is_err() {
            fallback.push_str(&diagnostic.to_string());
            fallback.push('\n');
        }
    }

    let mut rendered = String::from_utf8_lossy(buffer.as_slice()).into_owned();
    rendered.push_str(&fallback);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diag = Diagnostic::warning("Skipped declaration", "core/a.hpp", Span::new(0, 3, 4, 9));
        assert_eq!(diag.to_string(), "core/a.hpp:4:9: warning: Skipped declaration");
    }

    #[test]
    fn test_downgrade() {
        let diag = Diagnostic::error("bad", "a.hpp", Span::default()).downgrade();
        assert_eq!(diag.severity, Severity::Warning);
        assert!(!diag.is_error());
        let info = Diagnostic::info("fyi", "a.hpp", Span::default()).downgrade();
        assert_eq!(info.severity, Severity::Info);
    }

    #[test]
    fn test_render_with_snippet() {
        let mut sources = FxHashMap::default();
        sources.insert(PathBuf::from("a.hpp"), "struct A {\n  int x\n".to_string());
        let diag = Diagnostic::error("Expected ';'", "a.hpp", Span::new(17, 18, 2, 7));
        let rendered = render(&[&diag], &sources);
        assert!(rendered.contains("error: Expected ';'"));
        assert!(rendered.contains("a.hpp:2:7"));
    }

    #[test]
    fn test_render_unknown_file_falls_back() {
        let diag = Diagnostic::error("Cannot read file", "missing.hpp", Span::default());
        let rendered = render(&[&diag], &FxHashMap::default());
        assert_eq!(rendered, "missing.hpp:0:0: error: Cannot read file\n");
    }
}
