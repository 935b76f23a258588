//! Diagnostic accumulation for cell and structural errors.
//!
//! Parsing never unwinds: every operation that can reject input takes a
//! [`BadVal`] and reports through it, returning `None` as its result. The
//! reporter tracks the current source name and line number so that callers
//! deep in a parse do not have to thread location context explicitly.

use std::fmt;

/// Severity of a reported diagnostic. Warnings are logged but never
/// contribute to the error count that decides overall pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    /// Parse from a validator `level` string. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "warn" | "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// Where formatted diagnostics go.
///
/// `Log` forwards to the `tracing` subscriber; `Memory` buffers messages for
/// assertions in tests and for report emission; `Discard` drops everything
/// and is used by probes that only care whether a parse succeeds
/// (e.g. `Registry::is_builtin_type`).
#[derive(Debug, Default)]
pub enum Sink {
    #[default]
    Log,
    Memory(Vec<String>),
    Discard,
}

/// Mutable diagnostic accumulator carried through every parse.
#[derive(Debug, Default)]
pub struct BadVal {
    pub source_name: String,
    pub line_no: usize,
    errors: usize,
    warnings: usize,
    sink: Sink,
}

impl BadVal {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            line_no: 0,
            ..Self::default()
        }
    }

    /// A reporter that buffers messages instead of logging them.
    pub fn buffering(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            sink: Sink::Memory(Vec::new()),
            ..Self::default()
        }
    }

    /// A reporter that silently drops everything. Probe use only.
    pub fn discarding() -> Self {
        Self {
            sink: Sink::Discard,
            ..Self::default()
        }
    }

    /// Reposition the reporter at a new source location.
    pub fn at(&mut self, source_name: impl Into<String>, line_no: usize) {
        self.source_name = source_name.into();
        self.line_no = line_no;
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// Buffered messages, if this reporter was created with [`BadVal::buffering`].
    pub fn messages(&self) -> &[String] {
        match &self.sink {
            Sink::Memory(msgs) => msgs,
            _ => &[],
        }
    }

    /// Report a bad value and increment the error count.
    ///
    /// `kind` names what was expected ("type", "integer", "record field"),
    /// `value` is the offending input, `reason` an optional explanation.
    pub fn fail(&mut self, kind: &str, value: &str, reason: Option<&str>) {
        let msg = self.format(kind, value, reason);
        self.emit(Severity::Error, &msg);
        self.errors += 1;
    }

    /// Report a suspicious value without affecting the error count.
    pub fn warn(&mut self, kind: &str, value: &str, reason: Option<&str>) {
        let msg = self.format(kind, value, reason);
        self.emit(Severity::Warning, &msg);
        self.warnings += 1;
    }

    /// Report a free-form message at error severity (structural and loader
    /// diagnostics that are not tied to a single cell value).
    pub fn fail_msg(&mut self, message: &str) {
        let msg = format!("{} in {} on line {}", message, self.source_name, self.line_no);
        self.emit(Severity::Error, &msg);
        self.errors += 1;
    }

    /// Free-form warning counterpart of [`BadVal::fail_msg`].
    pub fn warn_msg(&mut self, message: &str) {
        let msg = format!("{} in {} on line {}", message, self.source_name, self.line_no);
        self.emit(Severity::Warning, &msg);
        self.warnings += 1;
    }

    fn format(&self, kind: &str, value: &str, reason: Option<&str>) -> String {
        // Double space after the kind is part of the stable message format.
        match reason {
            Some(r) => format!(
                "Bad {}  in {} on line {}: '{}' ({})",
                kind, self.source_name, self.line_no, value, r
            ),
            None => format!(
                "Bad {}  in {} on line {}: '{}'",
                kind, self.source_name, self.line_no, value
            ),
        }
    }

    fn emit(&mut self, severity: Severity, msg: &str) {
        match &mut self.sink {
            Sink::Log => match severity {
                Severity::Error => tracing::error!("{msg}"),
                Severity::Warning => tracing::warn!("{msg}"),
            },
            Sink::Memory(msgs) => msgs.push(format!("{severity} {msg}")),
            Sink::Discard => {}
        }
    }
}
