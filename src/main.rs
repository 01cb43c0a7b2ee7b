//! Purpose: `jsonframe` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Record streams go to stdout exactly as the framer writes them.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::io::{self, IsTerminal};

use clap::error::ErrorKind as ClapErrorKind;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::aot::Shell;
use serde::Serialize;
use serde_json::{Value, json};

mod command_dispatch;
mod serve;

use jsonframe::api::{
    DefaultStrategy, Error, ErrorKind, Measurement, defaults::DEFAULT_VM_COUNT,
    related::DEFAULT_URL_TEMPLATE, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Help, version, and bare invocations print clap's own text.
        Err(err)
            if !err.use_stderr()
                || err.kind() == ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand =>
        {
            err.print().map_err(|io_err| {
                let err = Error::new(ErrorKind::Io)
                    .with_message("failed to write help")
                    .with_source(io_err);
                (err, ColorMode::Auto)
            })?;
            return Ok(RunOutcome::with_code(err.exit_code()));
        }
        Err(err) => {
            let usage = Error::new(ErrorKind::Usage)
                .with_message(clap_error_summary(&err))
                .with_hint(clap_error_hint(&err));
            return Err((usage, ColorMode::Auto));
        }
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "jsonframe",
    version,
    about = "Unit-tagged scalars and streams of JSON records",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Records travel as back-to-back JSON values on a byte stream.

Mental model:
  - `events` writes a record stream
  - `decode` reads one from stdin
  - `value` converts a single measurement scalar
"#,
    after_help = r#"EXAMPLES
  $ jsonframe value encode 2.1 meter          # "2.100000meter"
  $ jsonframe events --lines | jsonframe decode
  $ jsonframe start-vm '{"image":"debian:bookworm-slim"}' --strategy map
  $ jsonframe rpc add 27 15

LEARN MORE
  $ jsonframe <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        global = true,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DecodeKind {
    Event,
    Value,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StrategyCli {
    Presence,
    Map,
    Preset,
}

impl From<StrategyCli> for DefaultStrategy {
    fn from(value: StrategyCli) -> Self {
        match value {
            StrategyCli::Presence => DefaultStrategy::Presence,
            StrategyCli::Map => DefaultStrategy::Map,
            StrategyCli::Preset => DefaultStrategy::Preset,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Encode or decode a unit-tagged measurement scalar",
        after_help = r#"EXAMPLES
  $ jsonframe value encode 2.1 meter
  $ jsonframe value encode -- -0.5 inch
  $ jsonframe value decode 2.100000meter"#
    )]
    Value {
        #[command(subcommand)]
        command: ValueCommand,
    },
    #[command(
        about = "Write the sample event feed to stdout",
        long_about = r#"Write the sample event feed to stdout as framed JSON records.

By default records follow each other with no delimiter. Use --lines for JSONL."#
    )]
    Events {
        #[arg(long, help = "Terminate each record with a newline (JSONL)")]
        lines: bool,
    },
    #[command(
        about = "Read a record stream from stdin and re-emit one record per line",
        after_help = r#"EXAMPLES
  $ jsonframe events | jsonframe decode
  $ printf '{"a":1} [2] 3' | jsonframe decode --kind value"#
    )]
    Decode {
        #[arg(
            long,
            value_enum,
            default_value = "event",
            help = "Record type to decode each value into"
        )]
        kind: DecodeKind,
    },
    #[command(
        name = "start-vm",
        about = "Resolve a start-vm request, applying the default count",
        long_about = r#"Resolve a start-vm request, applying the default count.

Strategies:
  presence  count decoded as present/absent; absent takes the default
  map       decode into a JSON object, check shapes, inject the default
  preset    start from the default and let the input overwrite it

Only presence and map can tell an explicit 0 from a missing count."#
    )]
    StartVm {
        #[arg(help = "Request JSON, e.g. '{\"image\":\"debian:bookworm-slim\"}'")]
        input: String,
        #[arg(long, value_enum, default_value = "presence", help = "Default strategy")]
        strategy: StrategyCli,
        #[arg(
            long,
            default_value_t = DEFAULT_VM_COUNT,
            allow_negative_numbers = true,
            help = "Count used when the request has none"
        )]
        default_count: i64,
    },
    #[command(
        about = "Round-trip one call through an in-memory buffer",
        after_help = r#"EXAMPLES
  $ jsonframe rpc add 27 15"#
    )]
    Rpc {
        #[arg(help = "Function name")]
        func: String,
        #[arg(allow_negative_numbers = true, help = "Integer arguments")]
        args: Vec<i64>,
    },
    #[command(
        about = "Serve the event feed over HTTP",
        long_about = r#"Serve the event feed over HTTP.

Endpoints:
  GET /events   sample feed as JSONL, flushed per record
  GET /healthz  {"ok":true}

Log verbosity follows RUST_LOG (default: info)."#
    )]
    Serve {
        #[arg(long, default_value = serve::DEFAULT_BIND, help = "Bind address host:port")]
        bind: String,
        #[arg(
            long,
            default_value_t = serve::DEFAULT_INTERVAL_MS,
            help = "Delay between records in milliseconds"
        )]
        interval_ms: u64,
        #[arg(long, help = "Allow binding to a non-loopback address")]
        allow_non_loopback: bool,
        #[arg(
            long,
            default_value_t = serve::DEFAULT_MAX_STREAMS,
            help = "Maximum concurrent /events streams"
        )]
        max_streams: usize,
    },
    #[command(
        about = "Count symbols mentioned alongside SYMBOL in its stream feed",
        after_help = r#"EXAMPLES
  $ jsonframe related AAPL
  $ jsonframe related AAPL --json"#
    )]
    Related {
        #[arg(help = "Ticker symbol, e.g. AAPL")]
        symbol: String,
        #[arg(
            long,
            default_value = DEFAULT_URL_TEMPLATE,
            help = "Feed URL with a {symbol} placeholder"
        )]
        url_template: String,
        #[arg(long, help = "Emit counts as a JSON object")]
        json: bool,
    },
    #[command(
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ jsonframe completion bash > ~/.local/share/bash-completion/completions/jsonframe
  $ jsonframe completion zsh > ~/.zfunc/_jsonframe
  $ jsonframe completion fish > ~/.config/fish/completions/jsonframe.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ValueCommand {
    #[command(about = "Encode AMOUNT and UNIT as a JSON scalar")]
    Encode {
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        unit: String,
    },
    #[command(about = "Decode a scalar such as 2.1meter (quotes optional)")]
    Decode { scalar: String },
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check that the input and output streams are still open.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint("This is a bug; re-run with RUST_LOG=debug and report it.")
}

fn measurement_json(value: &Measurement) -> Value {
    json!({
        "amount": value.amount,
        "unit": value.unit.as_str(),
        "known_unit": value.unit.is_known(),
    })
}

fn render_counts(counts: &BTreeMap<String, u64>) -> String {
    counts
        .iter()
        .map(|(symbol, count)| format!("{symbol:>10} {count}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

/// Everything a diagnostic shows, in display order.
#[derive(Serialize)]
struct ErrorReport {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    causes: Vec<String>,
}

impl ErrorReport {
    fn from_error(err: &Error) -> Self {
        let message = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| default_message(err.kind()).to_string());
        let mut causes = Vec::new();
        let mut cur = err.source();
        while let Some(source) = cur {
            causes.push(source.to_string());
            cur = source.source();
        }
        Self {
            kind: format!("{:?}", err.kind()),
            message,
            hint: err.hint().map(str::to_string),
            offset: err.offset(),
            causes,
        }
    }
}

fn default_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::MalformedScalar => "malformed scalar",
        ErrorKind::MalformedRecord => "malformed record",
        ErrorKind::Validation => "validation failed",
        ErrorKind::Io => "i/o error",
    }
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
    } else {
        eprintln!("{}", error_json(err));
    }
}

fn error_json(err: &Error) -> Value {
    json!({ "error": ErrorReport::from_error(err) })
}

fn error_text(err: &Error, use_color: bool) -> String {
    const RED: &str = "31";
    const YELLOW: &str = "33";
    let label = |text: &str, code: &str| {
        if use_color {
            format!("\u{1b}[{code}m{text}\u{1b}[0m")
        } else {
            text.to_string()
        }
    };

    let report = ErrorReport::from_error(err);
    let mut lines = vec![format!("{} {}", label("error:", RED), report.message)];
    if let Some(hint) = &report.hint {
        lines.push(format!("{} {hint}", label("hint:", YELLOW)));
    }
    if let Some(offset) = report.offset {
        lines.push(format!("{} {offset}", label("offset:", YELLOW)));
    }
    if let Some(cause) = report.causes.first() {
        lines.push(format!("{} {cause}", label("caused by:", YELLOW)));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `jsonframe --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "jsonframe") else {
        return "Try `jsonframe --help`.".to_string();
    };

    let parts = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect::<Vec<_>>();

    if parts.is_empty() {
        return "Try `jsonframe --help`.".to_string();
    }
    format!("Try `jsonframe {} --help`.", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::{Cli, Error, ErrorKind, clap_error_hint, error_json, error_text, render_counts};
    use clap::{CommandFactory, Parser};
    use std::collections::BTreeMap;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn clap_hint_names_the_subcommand() {
        let err = Cli::try_parse_from(["jsonframe", "value", "encode", "2.1"])
            .err()
            .expect("missing unit");
        assert_eq!(clap_error_hint(&err), "Try `jsonframe value encode --help`.");
    }

    #[test]
    fn error_json_carries_kind_hint_and_offset() {
        let err = Error::new(ErrorKind::MalformedScalar)
            .with_message("unexpected characters after amount")
            .with_hint("input: 2.5meter!")
            .with_offset(3);
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "MalformedScalar");
        assert_eq!(value["error"]["hint"], "input: 2.5meter!");
        assert_eq!(value["error"]["offset"], 3);
    }

    #[test]
    fn error_json_lists_causes_and_defaults_message() {
        let err = Error::new(ErrorKind::Io).with_source(std::io::Error::other("pipe closed"));
        let value = error_json(&err);
        assert_eq!(value["error"]["message"], "i/o error");
        assert_eq!(value["error"]["causes"][0], "pipe closed");
        assert!(value["error"].get("hint").is_none());
    }

    #[test]
    fn error_text_without_color_is_plain() {
        let err = Error::new(ErrorKind::Validation).with_message("invalid start_vm");
        assert_eq!(error_text(&err, false), "error: invalid start_vm");
    }

    #[test]
    fn counts_render_right_aligned() {
        let counts = BTreeMap::from([("GOOG".to_string(), 1), ("MSFT".to_string(), 2)]);
        assert_eq!(render_counts(&counts), "      GOOG 1\n      MSFT 2");
    }
}
