//! Purpose: Hold top-level CLI command dispatch for `jsonframe`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Stream commands write framed bytes straight to stdout, never re-rendered.
//! Invariants: A decode failure still leaves every earlier record on stdout.

use std::io::Write;
use std::net::SocketAddr;

use jsonframe::api::{
    Dispatcher, Event, FrameStyle, RelatedClient, RpcRequest, StreamDecoder, StreamEncoder, Unit,
    call_in_memory, decode_scalar, encode_scalar, resolve_start_vm, sample_events,
};

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "jsonframe", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Value { command } => match command {
            ValueCommand::Encode { amount, unit } => {
                let encoded = encode_scalar(&Measurement::new(amount, Unit::parse(&unit)))?;
                emit_json(Value::String(encoded));
                Ok(RunOutcome::ok())
            }
            ValueCommand::Decode { scalar } => {
                let value = if scalar.starts_with('"') {
                    Measurement::from_json_bytes(scalar.as_bytes())?
                } else {
                    decode_scalar(&scalar)?
                };
                emit_json(measurement_json(&value));
                Ok(RunOutcome::ok())
            }
        },
        Command::Events { lines } => {
            let style = if lines {
                FrameStyle::Lines
            } else {
                FrameStyle::Concatenated
            };
            let stdout = io::stdout();
            let mut encoder = StreamEncoder::with_style(stdout.lock(), style);
            encoder.encode_all(sample_events().iter())?;
            Ok(RunOutcome::ok())
        }
        Command::Decode { kind } => {
            let stdin = io::stdin();
            let mut decoder = StreamDecoder::buffered(stdin.lock());
            let stdout = io::stdout();
            let mut out = StreamEncoder::with_style(stdout.lock(), FrameStyle::Lines);
            match kind {
                DecodeKind::Event => {
                    for event in decoder.records::<Event>() {
                        out.encode(&event?)?;
                    }
                }
                DecodeKind::Value => {
                    for value in decoder.records::<Value>() {
                        out.encode(&value?)?;
                    }
                }
            }
            Ok(RunOutcome::ok())
        }
        Command::StartVm {
            input,
            strategy,
            default_count,
        } => {
            let resolved = resolve_start_vm(input.as_bytes(), strategy.into(), default_count)?;
            emit_json(json!({
                "image": resolved.image,
                "count": resolved.count,
                "strategy": DefaultStrategy::from(strategy).as_str(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Rpc { func, args } => {
            let request = RpcRequest::new(func, args);
            let result = call_in_memory(&Dispatcher::with_builtins(), &request)?;
            emit_json(json!({
                "func": request.func,
                "args": request.args,
                "result": result,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Serve {
            bind,
            interval_ms,
            allow_non_loopback,
            max_streams,
        } => {
            let bind: SocketAddr = bind.parse().map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("invalid bind address")
                    .with_hint("Use a host:port value like 127.0.0.1:8080.")
            })?;
            let config = serve::ServeConfig {
                bind,
                interval_ms,
                allow_non_loopback,
                max_concurrent_streams: max_streams,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
        Command::Related {
            symbol,
            url_template,
            json,
        } => {
            let counts = RelatedClient::with_url_template(url_template).related(&symbol)?;
            if json {
                emit_json(json!(counts));
            } else if !counts.is_empty() {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{}", render_counts(&counts)).map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write output")
                        .with_source(err)
                })?;
            }
            Ok(RunOutcome::ok())
        }
    }
}
