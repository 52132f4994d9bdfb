//! Central diagnostic sink (spec §7, ambient per SPEC_FULL.md §D).
//!
//! Every stage reports through a [`Sink`] instead of failing fast. The sink
//! also forwards each record to the `log` facade so a host binary gets
//! ordinary log output for free; the structured records remain the source
//! of truth for exit-status decisions.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: &'static str,
    pub component: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Some(c) => write!(f, "[{}] {} ({c}): {}", self.stage, self.severity, self.message),
            None => write!(f, "[{}] {}: {}", self.stage, self.severity, self.message),
        }
    }
}

/// Insertion-ordered diagnostic collector. One sink is threaded through the
/// whole pipeline; nothing aborts on its own, stages just keep recording.
#[derive(Debug, Default)]
pub struct Sink {
    records: Vec<Diagnostic>,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, severity: Severity, stage: &'static str, component: Option<String>, message: impl Into<String>) {
        let diag = Diagnostic { severity, stage, component, message: message.into() };
        match diag.severity {
            Severity::Warning => log::warn!("{diag}"),
            Severity::Error => log::error!("{diag}"),
            Severity::Fatal => log::error!("{diag}"),
        }
        self.records.push(diag);
    }

    pub fn warn(&mut self, stage: &'static str, component: Option<String>, message: impl Into<String>) {
        self.push(Severity::Warning, stage, component, message);
    }

    pub fn error(&mut self, stage: &'static str, component: Option<String>, message: impl Into<String>) {
        self.push(Severity::Error, stage, component, message);
    }

    /// Records a fatal diagnostic. Callers must still propagate an `Err` up
    /// to the driver themselves; this only makes the sink aware of it.
    pub fn fatal(&mut self, stage: &'static str, component: Option<String>, message: impl Into<String>) {
        self.push(Severity::Fatal, stage, component, message);
    }

    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|d| d.severity >= Severity::Error).count()
    }

    pub fn has_fatal(&self) -> bool {
        self.records.iter().any(|d| d.severity == Severity::Fatal)
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("empty path segment in {0:?}")]
    EmptySegment(String),
    #[error("cannot insert through non-map value at {0:?}")]
    NotAMap(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    #[error("malformed numeric literal {0:?}")]
    BadNumber(String),
}
