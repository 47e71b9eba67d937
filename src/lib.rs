//! Purpose: Tab-delimited two-column record channel used by address-file pipelines.
//! Exports: `core` (channel, codec, modes, diagnostics, errors), `api`, `abi`.
//! Role: Library backing the `tabchannel` CLI and the C ABI for non-Rust callers.
//! Invariants: `api` is the stable surface; `core` paths may move between releases.
//! Invariants: Open failures are masked by contract; every other failure is returned.
pub mod abi;
pub mod api;
pub mod core;
