//! The diagnostic channel (C7): structured, accumulated program errors,
//! kept entirely separate from the precondition-violation panics in
//! `vsem::di`. Rendering follows `abstraps::core::ir`'s colored, indented
//! `Display` impls — `yansi` for emphasis, `indenter` for nested text.

use crate::ir::SourceSpan;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use yansi::Paint;

static COLOR_ENABLED: AtomicBool = AtomicBool::new(true);

/// Rendering configuration for the diagnostic channel — the one tunable
/// surface it exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub color: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions { color: true }
    }
}

impl DiagnosticOptions {
    /// Install this configuration as the process-wide rendering setting.
    /// `Display::fmt` takes no extra arguments, so a global is the only
    /// way to thread this through `{}`-formatting; every other part of
    /// the pass stays free of global state.
    pub fn apply(self) {
        COLOR_ENABLED.store(self.color, Ordering::Relaxed);
        if self.color {
            Paint::enable();
        } else {
            Paint::disable();
        }
    }
}

/// Disable ANSI coloring in rendered diagnostics — for non-TTY output
/// (CI logs, test assertions on `Display` output).
pub fn diagnostics_color_disable() {
    DiagnosticOptions { color: false }.apply();
}

fn color_enabled() -> bool {
    COLOR_ENABLED.load(Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A rendered source window: the lines surrounding a diagnostic's primary
/// span, with the offending line flagged by number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceWindow {
    pub lines: Vec<(u32, String)>,
    pub highlight_line: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub primary: SourceSpan,
    pub window: Option<SourceWindow>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, primary: SourceSpan) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            primary,
            window: None,
        }
    }

    pub fn with_window(mut self, window: SourceWindow) -> Self {
        self.window = Some(window);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if color_enabled() {
            writeln!(f, "{}: {}", Paint::red(self.severity).bold(), self.message)?;
            write!(f, "  {} {}", Paint::blue("-->").bold(), self.primary)?;
        } else {
            writeln!(f, "{}: {}", self.severity, self.message)?;
            write!(f, "  --> {}", self.primary)?;
        }
        let Some(window) = &self.window else {
            return writeln!(f);
        };
        writeln!(f)?;
        let mut indented = indenter::indented(f).with_str("  | ");
        for (line_no, text) in &window.lines {
            if *line_no == window.highlight_line && color_enabled() {
                writeln!(indented, "{}", Paint::yellow(text).bold())?;
            } else {
                writeln!(indented, "{text}")?;
            }
        }
        Ok(())
    }
}

/// The accumulating diagnostic buffer. `DefiniteInitializationPass` fills
/// one of these per run and folds it into `PassOutcome`.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl fmt::Display for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_accumulates_in_order() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::error("use of uninitialized object", SourceSpan::new("a.val", 1, 1)));
        sink.push(Diagnostic::error("use of consumed object", SourceSpan::new("a.val", 2, 1)));
        assert_eq!(sink.len(), 2);
        let messages: Vec<_> = sink.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["use of uninitialized object", "use of consumed object"]);
    }

    #[test]
    fn disabling_color_strips_ansi_escapes_from_rendering() {
        let diagnostic = Diagnostic::error("use of consumed object", SourceSpan::new("a.val", 3, 1));
        DiagnosticOptions { color: false }.apply();
        assert!(!diagnostic.to_string().contains('\x1b'));
        DiagnosticOptions::default().apply();
    }
}
