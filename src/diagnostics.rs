use crate::language::{errors::SyntaxErrors, span::Span};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// Where the engine sends its findings. The engine never prints, never
/// panics and never aborts; everything goes through here.
pub trait DiagnosticsSink {
    fn report(&mut self, severity: Severity, message: String, span: Span);
}

#[derive(Clone, Debug)]
pub struct Reported {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

/// Sink that keeps everything for later emission or inspection.
#[derive(Debug, Default)]
pub struct CollectedDiagnostics {
    pub entries: Vec<Reported>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.severity == Severity::Error)
    }
}

impl DiagnosticsSink for CollectedDiagnostics {
    fn report(&mut self, severity: Severity, message: String, span: Span) {
        self.entries.push(Reported {
            severity,
            message,
            span,
        });
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
struct EngineDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

pub fn emit(path: &str, source: &str, entries: &[Reported]) {
    for entry in entries {
        let diagnostic = EngineDiagnostic {
            src: NamedSource::new(path, source.to_string()),
            span: entry.span.to_source_span(),
            help: None,
            message: entry.message.clone(),
            label: entry.severity.to_string(),
        };
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

pub fn emit_syntax_errors(path: &str, source: &str, errors: &SyntaxErrors) {
    for err in &errors.errors {
        let diagnostic = EngineDiagnostic {
            src: NamedSource::new(path, source.to_string()),
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: Severity::Error.to_string(),
        };
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collected_sink_keeps_order_and_severity() {
        let mut sink = CollectedDiagnostics::new();
        sink.report(Severity::Note, "first".into(), Span::new(0, 1));
        sink.report(Severity::Error, "second".into(), Span::new(2, 3));
        assert_eq!(sink.entries.len(), 2);
        assert_eq!(sink.entries[0].message, "first");
        assert!(sink.has_errors());
    }

    #[test]
    fn notes_alone_are_not_errors() {
        let mut sink = CollectedDiagnostics::new();
        sink.report(Severity::Note, "info".into(), Span::new(0, 0));
        assert!(!sink.has_errors());
    }
}
