//! Purpose: Define the stable public Rust API boundary for tabchannel.
//! Exports: Channel, record, mode, diagnostic, and error types needed by callers.
//! Role: Public, additive-only surface over the core modules.
//! Invariants: Re-exports only; no behavior lives here.

pub use crate::core::channel::{RecordChannel, Records};
pub use crate::core::diagnostic::{
    Diagnostic, DiagnosticKind, DiagnosticSink, MemorySink, TracingSink, diagnostic_json,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::mode::{Mode, ModeFlags};
pub use crate::core::record::{FIELD_SEPARATOR, LINE_ENDING, Record};
