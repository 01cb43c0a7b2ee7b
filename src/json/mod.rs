//! Purpose: Internal JSON boundary shared by the framer, the scalar codec, and the drivers.
//! Exports: `parse` (decode helpers + failure categories) and `errors` (mapping to `Error`).
//! Role: Single seam so callsites never classify serde_json failures ad hoc.
//! Invariants: Every serde_json error reaching a caller passes through `errors`.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod errors;
pub(crate) mod parse;
