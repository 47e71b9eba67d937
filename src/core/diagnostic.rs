//! Purpose: Observability hook for failures the channel contract masks.
//! Exports: `Diagnostic`, `DiagnosticKind`, `DiagnosticSink`, `TracingSink`, `MemorySink`,
//! `diagnostic_json`.
//! Role: `RecordChannel` reports masked open failures and drop-time close failures here.
//! Invariants: Reporting never alters channel state and never fails.
//! Invariants: The JSON envelope is additive-only once published.
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

use crate::core::error::{Error, ErrorKind};
use crate::core::mode::Mode;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiagnosticKind {
    /// `open` could not acquire the file; the channel stays handle-less.
    OpenFailed,
    /// `open` was called on a disposed channel and did nothing.
    OpenIgnored,
    /// Releasing a handle failed during implicit disposal.
    CloseFailed,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::OpenFailed => "open_failed",
            DiagnosticKind::OpenIgnored => "open_ignored",
            DiagnosticKind::CloseFailed => "close_failed",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: Option<PathBuf>,
    pub mode: Option<Mode>,
    pub error_kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn from_error(kind: DiagnosticKind, mode: Option<Mode>, err: &Error) -> Self {
        Self {
            kind,
            path: err.path().map(|path| path.to_path_buf()),
            mode,
            error_kind: err.kind(),
            message: err.to_string(),
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Default sink: one `warn` event per diagnostic.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!(
            kind = diagnostic.kind.as_str(),
            path = ?diagnostic.path,
            mode = ?diagnostic.mode,
            error_kind = ?diagnostic.error_kind,
            "{}",
            diagnostic.message
        );
    }
}

/// Keeps every diagnostic in memory; clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}

pub fn diagnostic_json(diagnostic: &Diagnostic) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(diagnostic.kind.as_str()));
    inner.insert(
        "path".to_string(),
        diagnostic
            .path
            .as_ref()
            .map(|path| json!(path.to_string_lossy()))
            .unwrap_or(Value::Null),
    );
    inner.insert(
        "mode".to_string(),
        diagnostic
            .mode
            .map(|mode| json!(mode.to_string()))
            .unwrap_or(Value::Null),
    );
    inner.insert(
        "error_kind".to_string(),
        json!(format!("{:?}", diagnostic.error_kind)),
    );
    inner.insert("message".to_string(), json!(diagnostic.message));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}
