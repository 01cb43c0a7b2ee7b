//! Purpose: Shared library crate used by the `jsonframe` CLI and tests.
//! Exports: `core` (scalar codec, framing, presence, pipe, errors) and `api` (records,
//! default strategies, validation, RPC, related-symbol counting).
//! Role: Library backing the binary; `api` is the supported surface.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
//! Invariants: Core never depends on a concrete transport; only `Read`/`Write`.
pub mod api;
pub mod core;
mod json;
