//! Purpose: Define the stable public Rust API boundary for jsonframe.
//! Exports: Codec and framer types plus the record, default-resolution, RPC, and
//! related-symbol layers built on them.
//! Role: Public, additive-only surface used by the CLI, the HTTP driver, and tests.
//! Invariants: Every fallible operation returns `Error`; nothing panics on bad input.

pub mod defaults;
pub mod records;
pub mod related;
pub mod rpc;
mod validation;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::measure::{Measurement, Unit, decode_scalar, encode_scalar};
pub use crate::core::pipe::{PipeReader, PipeWriter, pipe};
pub use crate::core::presence::Presence;
pub use crate::core::stream::{FrameStyle, Records, StreamDecoder, StreamEncoder};
pub use defaults::{DefaultStrategy, resolve_start_vm};
pub use records::{Event, StartVm, StartVmRequest, sample_events};
pub use related::{RelatedClient, count_related};
pub use rpc::{Dispatcher, RpcRequest, call_in_memory};
pub use validation::{ValidationIssue, ValidationReport, ValidationStatus};
