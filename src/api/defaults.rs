//! Purpose: Resolve omitted fields of a `StartVm` request to their defaults.
//! Exports: `DefaultStrategy`, `resolve_start_vm`, `resolve_with_presence`,
//! `resolve_with_map`, `resolve_with_preset`, `validate_start_vm`.
//! Role: Caller-level policy layered over the decoder, which itself never defaults.
//! Invariants: Every strategy validates the resolved request before returning it.
//! Invariants: Presence and map strategies keep an explicit `0` apart from an absent count.
//! Notes: The preset strategy cannot tell `"count":0` from an absent count; the input
//! always overwrites the preset, so an explicit `0` resolves to `0`.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::records::{StartVm, StartVmRequest};
use super::validation::{ValidationReport, issue};
use crate::core::error::{Error, ErrorKind};
use crate::core::stream::{StreamDecoder, overlay_record};
use crate::json::errors::decode_error;

pub const DEFAULT_VM_COUNT: i64 = 1;
pub const MAX_VM_COUNT: i64 = 100;

const RECORD_NAME: &str = "start_vm";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DefaultStrategy {
    #[default]
    Presence,
    Map,
    Preset,
}

impl DefaultStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            DefaultStrategy::Presence => "presence",
            DefaultStrategy::Map => "map",
            DefaultStrategy::Preset => "preset",
        }
    }
}

impl fmt::Display for DefaultStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefaultStrategy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "presence" => Ok(DefaultStrategy::Presence),
            "map" => Ok(DefaultStrategy::Map),
            "preset" => Ok(DefaultStrategy::Preset),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unknown default strategy: {other}"))
                .with_hint("expected one of: presence, map, preset")),
        }
    }
}

pub fn resolve_start_vm(
    input: &[u8],
    strategy: DefaultStrategy,
    default_count: i64,
) -> Result<StartVm, Error> {
    tracing::debug!(%strategy, default_count, "resolving start_vm request");
    match strategy {
        DefaultStrategy::Presence => resolve_with_presence(input, default_count),
        DefaultStrategy::Map => resolve_with_map(input, default_count),
        DefaultStrategy::Preset => resolve_with_preset(input, default_count),
    }
}

/// Decode with `count` as `Presence<i64>`; an absent count takes `default_count`.
pub fn resolve_with_presence(input: &[u8], default_count: i64) -> Result<StartVm, Error> {
    let request: StartVmRequest = decode_one(input)?;
    let resolved = request.resolve(default_count);
    validate_start_vm(&resolved)?;
    Ok(resolved)
}

/// Decode into a JSON object, check field shapes by hand, inject the default when
/// `count` is missing, then convert.
pub fn resolve_with_map(input: &[u8], default_count: i64) -> Result<StartVm, Error> {
    let value: Value = decode_one(input)?;
    let Value::Object(mut fields) = value else {
        return Err(Error::new(ErrorKind::MalformedRecord)
            .with_message("start_vm request must be a JSON object"));
    };

    let report = ValidationReport::new(RECORD_NAME).with_issues(shape_issues(&fields));
    report.into_result()?;

    if !fields.contains_key("count") {
        fields.insert("count".to_string(), Value::from(default_count));
    }
    let resolved: StartVm =
        serde_json::from_value(Value::Object(fields)).map_err(|err| decode_error(err, RECORD_NAME))?;
    validate_start_vm(&resolved)?;
    Ok(resolved)
}

/// Start from a record whose count already holds the default and let the input
/// overwrite whatever it supplies.
pub fn resolve_with_preset(input: &[u8], default_count: i64) -> Result<StartVm, Error> {
    let value: Value = decode_one(input)?;
    let base = StartVm {
        image: String::new(),
        count: default_count,
    };
    let resolved = overlay_record(base, value, RECORD_NAME)?;
    validate_start_vm(&resolved)?;
    Ok(resolved)
}

pub fn validate_start_vm(request: &StartVm) -> Result<(), Error> {
    let mut report = ValidationReport::new(RECORD_NAME);
    if request.image.trim().is_empty() {
        report.push(issue("image", "required", "must not be empty"));
    }
    if request.count < 0 {
        report.push(issue(
            "count",
            "out_of_range",
            format!("must be >= 0, got {}", request.count),
        ));
    } else if request.count > MAX_VM_COUNT {
        report.push(issue(
            "count",
            "out_of_range",
            format!("must be <= {MAX_VM_COUNT}, got {}", request.count),
        ));
    }
    report.into_result()
}

fn decode_one<T: serde::de::DeserializeOwned>(input: &[u8]) -> Result<T, Error> {
    let mut decoder = StreamDecoder::new(input);
    let request = decoder.next_record()?.ok_or_else(|| {
        Error::new(ErrorKind::MalformedRecord)
            .with_message("empty start_vm request")
            .with_hint("pass a JSON object such as {\"image\":\"debian:bookworm-slim\"}")
    })?;
    decoder.finish()?;
    Ok(request)
}

fn shape_issues(fields: &Map<String, Value>) -> Vec<super::validation::ValidationIssue> {
    let mut issues = Vec::new();
    if let Some(image) = fields.get("image") {
        if !image.is_string() {
            issues.push(issue(
                "image",
                "type_mismatch",
                format!("expected string, got {}", type_name(image)),
            ));
        }
    }
    if let Some(count) = fields.get("count") {
        if count.as_i64().is_none() {
            issues.push(issue(
                "count",
                "type_mismatch",
                format!("expected integer, got {}", type_name(count)),
            ));
        }
    }
    issues
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_VM_COUNT, DefaultStrategy, MAX_VM_COUNT, resolve_start_vm, resolve_with_map,
        resolve_with_presence, resolve_with_preset,
    };
    use crate::core::error::ErrorKind;

    const ALL: [DefaultStrategy; 3] = [
        DefaultStrategy::Presence,
        DefaultStrategy::Map,
        DefaultStrategy::Preset,
    ];

    #[test]
    fn absent_count_takes_default_under_every_strategy() {
        let input = br#"{"image":"debian:bookworm-slim"}"#;
        for strategy in ALL {
            let resolved = resolve_start_vm(input, strategy, DEFAULT_VM_COUNT).expect("resolve");
            assert_eq!(resolved.image, "debian:bookworm-slim");
            assert_eq!(resolved.count, 1, "{strategy}");
        }
    }

    #[test]
    fn explicit_zero_is_kept_by_every_strategy() {
        let input = br#"{"image":"debian:bookworm-slim","count":0}"#;
        assert_eq!(resolve_with_presence(input, 1).expect("presence").count, 0);
        assert_eq!(resolve_with_map(input, 1).expect("map").count, 0);
        // Input always overwrites the preset.
        assert_eq!(resolve_with_preset(input, 1).expect("preset").count, 0);
    }

    #[test]
    fn negative_count_is_a_validation_failure() {
        let input = br#"{"image":"debian:bookworm-slim","count":-1}"#;
        for strategy in ALL {
            let err = resolve_start_vm(input, strategy, 1).expect_err("negative");
            assert_eq!(err.kind(), ErrorKind::Validation, "{strategy}");
            assert!(err.message().unwrap_or_default().contains("count"));
        }
    }

    #[test]
    fn count_above_max_is_rejected() {
        let input = format!(r#"{{"image":"alpine","count":{}}}"#, MAX_VM_COUNT + 1);
        for strategy in ALL {
            let err = resolve_start_vm(input.as_bytes(), strategy, 1).expect_err("too many");
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn missing_image_is_rejected() {
        for strategy in ALL {
            let err = resolve_start_vm(br#"{"count":2}"#, strategy, 1).expect_err("image");
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert!(err.message().unwrap_or_default().contains("image"));
        }
    }

    #[test]
    fn map_strategy_reports_shape_issues() {
        let err = resolve_with_map(br#"{"image":7,"count":"two"}"#, 1).expect_err("shape");
        assert_eq!(err.kind(), ErrorKind::Validation);
        let message = err.message().unwrap_or_default();
        assert!(message.contains("image: expected string, got integer"));
        assert!(message.contains("count: expected integer, got string"));
    }

    #[test]
    fn typed_strategies_report_shape_as_malformed_record() {
        let input = br#"{"image":"alpine","count":"two"}"#;
        for strategy in [DefaultStrategy::Presence, DefaultStrategy::Preset] {
            let err = resolve_start_vm(input, strategy, 1).expect_err("shape");
            assert_eq!(err.kind(), ErrorKind::MalformedRecord, "{strategy}");
        }
    }

    #[test]
    fn empty_input_is_malformed() {
        for strategy in ALL {
            let err = resolve_start_vm(b"  ", strategy, 1).expect_err("empty");
            assert_eq!(err.kind(), ErrorKind::MalformedRecord);
        }
    }

    #[test]
    fn data_after_the_request_is_malformed() {
        let input = br#"{"image":"alpine","count":2} {"count":-5} garbage"#;
        for strategy in ALL {
            let err = resolve_start_vm(input, strategy, 1).expect_err("trailing");
            assert_eq!(err.kind(), ErrorKind::MalformedRecord, "{strategy}");
            assert_eq!(err.message(), Some("unexpected data after record"));
        }
        let padded = b"\n  {\"image\":\"alpine\"}\n\n";
        assert_eq!(resolve_with_presence(padded, 1).expect("padded").count, 1);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let input = br#"{"image":"alpine","count":3,"region":"eu"}"#;
        for strategy in ALL {
            assert_eq!(resolve_start_vm(input, strategy, 1).expect("ok").count, 3);
        }
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("map".parse::<DefaultStrategy>().expect("map"), DefaultStrategy::Map);
        let err = "guess".parse::<DefaultStrategy>().expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
