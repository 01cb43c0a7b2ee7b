//! Purpose: Toy RPC whose request and reply travel as framed JSON over a shared buffer.
//! Exports: `RpcRequest`, `Dispatcher`, `Handler`, `ADD`, `add`, `send_request`,
//! `read_reply`, `call_in_memory`.
//! Role: Demonstrates one stream carrying records of different types in turn.
//! Invariants: Requests and replies use `FrameStyle::Lines`, so a decoder dropped after
//! one value never swallows the first byte of the next.
//! Invariants: Unknown functions fail with `Usage`; no reply is written for them.

use std::collections::{BTreeMap, VecDeque};
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::core::stream::{FrameStyle, StreamDecoder, StreamEncoder};

pub const ADD: &str = "add";

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct RpcRequest {
    #[serde(alias = "Func")]
    pub func: String,
    #[serde(alias = "Args")]
    pub args: Vec<i64>,
}

impl RpcRequest {
    pub fn new(func: impl Into<String>, args: Vec<i64>) -> Self {
        Self {
            func: func.into(),
            args,
        }
    }
}

pub type Handler = Box<dyn Fn(&[i64]) -> Result<i64, Error> + Send + Sync>;

pub fn add(a: i64, b: i64) -> Result<i64, Error> {
    a.checked_add(b).ok_or_else(|| {
        Error::new(ErrorKind::Validation).with_message(format!("add({a}, {b}) overflows i64"))
    })
}

pub struct Dispatcher {
    handlers: BTreeMap<String, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(ADD, |args| match args {
            [a, b] => add(*a, *b),
            _ => Err(arity_error(ADD, 2, args.len())),
        });
        dispatcher
    }

    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&[i64]) -> Result<i64, Error> + Send + Sync + 'static,
    {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn dispatch(&self, request: &RpcRequest) -> Result<i64, Error> {
        let Some(handler) = self.handlers.get(&request.func) else {
            tracing::warn!(func = %request.func, "unknown rpc function");
            let known = self.functions().collect::<Vec<_>>().join(", ");
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unknown function: {}", request.func))
                .with_hint(format!("available functions: {known}")));
        };
        tracing::debug!(func = %request.func, args = ?request.args, "dispatching rpc call");
        handler(&request.args)
    }

    /// Read one request from `channel`, run it, and write the reply back to it.
    pub fn serve_one<S: Read + Write>(&self, channel: &mut S) -> Result<i64, Error> {
        let request: RpcRequest = StreamDecoder::new(&mut *channel)
            .next_record()?
            .ok_or_else(|| {
                Error::new(ErrorKind::MalformedRecord).with_message("missing rpc request")
            })?;
        let out = self.dispatch(&request)?;
        StreamEncoder::with_style(&mut *channel, FrameStyle::Lines).encode(&out)?;
        Ok(out)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_builtins()
    }
}

pub fn send_request<W: Write>(sink: W, request: &RpcRequest) -> Result<(), Error> {
    StreamEncoder::with_style(sink, FrameStyle::Lines).encode(request)
}

pub fn read_reply<R: Read>(source: R) -> Result<i64, Error> {
    StreamDecoder::new(source)
        .next_record()?
        .ok_or_else(|| Error::new(ErrorKind::MalformedRecord).with_message("missing rpc reply"))
}

/// Round-trip one call through a single in-memory buffer playing the network.
pub fn call_in_memory(dispatcher: &Dispatcher, request: &RpcRequest) -> Result<i64, Error> {
    let mut network = VecDeque::new();
    send_request(&mut network, request)?;
    dispatcher.serve_one(&mut network)?;
    read_reply(&mut network)
}

fn arity_error(func: &str, expected: usize, got: usize) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("{func} expects {expected} arguments, got {got}"))
}

#[cfg(test)]
mod tests {
    use super::{ADD, Dispatcher, RpcRequest, call_in_memory, read_reply, send_request};
    use crate::core::error::ErrorKind;
    use std::collections::VecDeque;

    #[test]
    fn add_round_trips_through_buffer() {
        let dispatcher = Dispatcher::with_builtins();
        let result =
            call_in_memory(&dispatcher, &RpcRequest::new(ADD, vec![27, 15])).expect("call");
        assert_eq!(result, 42);
    }

    #[test]
    fn request_wire_shape_is_func_and_args() {
        let mut network = Vec::new();
        send_request(&mut network, &RpcRequest::new(ADD, vec![1, 2])).expect("send");
        assert_eq!(network, b"{\"func\":\"add\",\"args\":[1,2]}\n");
    }

    #[test]
    fn capitalized_keys_are_accepted() {
        let mut network = VecDeque::from(b"{\"Func\":\"add\",\"Args\":[2,3]}".to_vec());
        let out = Dispatcher::with_builtins()
            .serve_one(&mut network)
            .expect("serve");
        assert_eq!(out, 5);
        assert_eq!(read_reply(&mut network).expect("reply"), 5);
    }

    #[test]
    fn unknown_function_is_usage_error() {
        let request = RpcRequest::new("mul", vec![2, 3]);
        let err = call_in_memory(&Dispatcher::with_builtins(), &request).expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.hint(), Some("available functions: add"));
    }

    #[test]
    fn wrong_arity_is_usage_error() {
        let err = call_in_memory(&Dispatcher::with_builtins(), &RpcRequest::new(ADD, vec![1]))
            .expect_err("arity");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn overflow_is_reported() {
        let err = call_in_memory(
            &Dispatcher::with_builtins(),
            &RpcRequest::new(ADD, vec![i64::MAX, 1]),
        )
        .expect_err("overflow");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn registered_functions_are_dispatched() {
        let mut dispatcher = Dispatcher::with_builtins();
        dispatcher.register("sum", |args| Ok(args.iter().sum()));
        let result = call_in_memory(&dispatcher, &RpcRequest::new("sum", vec![1, 2, 3, 4]))
            .expect("sum");
        assert_eq!(result, 10);
        assert_eq!(dispatcher.functions().collect::<Vec<_>>(), ["add", "sum"]);
    }
}
