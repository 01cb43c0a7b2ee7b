//! Purpose: Encode and decode unit-tagged measurements as atomic JSON string scalars.
//! Exports: `Measurement`, `Unit`, `encode_scalar`, `decode_scalar`, `SCALAR_PRECISION`.
//! Role: Custom serde codec invoked whenever a record carries a `Measurement` field.
//! Invariants: Encoded amounts always carry exactly `SCALAR_PRECISION` fractional digits.
//! Invariants: Unknown alphabetic unit tags survive decode as `Unit::Other`.
//! Invariants: Non-finite amounts never reach the wire.
use std::fmt;
use std::hash::{Hash, Hasher};

use bstr::ByteSlice;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::json::parse::{self, SCALAR_ERROR_MARKER};

/// Fractional digits emitted by `encode_scalar`.
pub const SCALAR_PRECISION: usize = 6;

// Smallest payload with a numeric part and a unit character, e.g. `1m`.
const MIN_SCALAR_LEN: usize = 2;
const MAX_SNIPPET_BYTES: usize = 32;

/// Unit tag of a `Measurement`. Equality and hashing go through the tag text, so
/// `Unit::Other("meter")` and `Unit::Meter` are the same unit.
#[derive(Clone, Debug)]
pub enum Unit {
    Meter,
    Inch,
    Other(String),
}

impl Unit {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "meter" => Unit::Meter,
            "inch" => Unit::Inch,
            other => Unit::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Unit::Meter => "meter",
            Unit::Inch => "inch",
            Unit::Other(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self.as_str(), "meter" | "inch")
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Unit {}

impl Hash for Unit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Unit::parse(&tag))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub amount: f64,
    pub unit: Unit,
}

impl Measurement {
    pub fn new(amount: f64, unit: Unit) -> Self {
        let unit = match unit {
            Unit::Other(tag) => Unit::parse(&tag),
            known => known,
        };
        Self { amount, unit }
    }

    pub fn meters(amount: f64) -> Self {
        Self::new(amount, Unit::Meter)
    }

    pub fn inches(amount: f64) -> Self {
        Self::new(amount, Unit::Inch)
    }

    /// Decode a raw JSON scalar, quotes included, as received from the wire.
    pub fn from_json_bytes(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < MIN_SCALAR_LEN {
            return Err(malformed("value too small").with_hint(snippet_hint(raw)));
        }
        let payload: String = parse::from_slice(raw).map_err(|err| {
            malformed("scalar must be a JSON string")
                .with_hint(snippet_hint(raw))
                .with_source(err)
        })?;
        decode_scalar(&payload)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.prec$}{}",
            self.amount,
            self.unit,
            prec = SCALAR_PRECISION
        )
    }
}

pub fn encode_scalar(value: &Measurement) -> Result<String, Error> {
    if !value.amount.is_finite() {
        return Err(malformed("amount must be finite"));
    }
    let tag = value.unit.as_str();
    if tag.is_empty() {
        return Err(malformed("unit tag must not be empty"));
    }
    if !tag.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(malformed("unit tag must be ASCII letters").with_hint(format!("unit: {tag}")));
    }
    Ok(value.to_string())
}

pub fn decode_scalar(payload: &str) -> Result<Measurement, Error> {
    if payload.len() < MIN_SCALAR_LEN {
        return Err(malformed("value too small").with_hint(snippet_hint(payload.as_bytes())));
    }
    let split = numeric_prefix_len(payload.as_bytes());
    if split == 0 {
        return Err(malformed("missing numeric amount").with_hint(snippet_hint(payload.as_bytes())));
    }
    let (number, tag) = payload.split_at(split);
    if tag.is_empty() {
        return Err(malformed("missing unit tag").with_hint(snippet_hint(payload.as_bytes())));
    }
    if !tag.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(malformed("unexpected characters after amount")
            .with_hint(snippet_hint(payload.as_bytes()))
            .with_offset(split as u64));
    }
    let amount: f64 = number.parse().map_err(|err| {
        malformed("amount is not a number")
            .with_hint(snippet_hint(payload.as_bytes()))
            .with_source(err)
    })?;
    if !amount.is_finite() {
        return Err(malformed("amount must be finite").with_hint(snippet_hint(payload.as_bytes())));
    }
    Ok(Measurement::new(amount, Unit::parse(tag)))
}

// Length of the maximal leading `[+-]?digits[.digits][(e|E)[+-]?digits]` run.
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let mut pos = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        pos += 1;
    }
    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let mut digits = pos - int_start;
    if pos < bytes.len() && bytes[pos] == b'.' {
        let frac_start = pos + 1;
        let mut end = frac_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        digits += end - frac_start;
        pos = end;
    }
    if digits == 0 {
        return 0;
    }
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut end = pos + 1;
        if end < bytes.len() && matches!(bytes[end], b'+' | b'-') {
            end += 1;
        }
        let exp_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        // A bare `e` belongs to the unit tag (e.g. `2em`).
        if end > exp_start {
            pos = end;
        }
    }
    pos
}

fn malformed(message: &str) -> Error {
    Error::new(ErrorKind::MalformedScalar).with_message(message)
}

fn snippet_hint(raw: &[u8]) -> String {
    let text = raw.to_str_lossy();
    if text.len() <= MAX_SNIPPET_BYTES {
        return format!("input: {text}");
    }
    let mut end = MAX_SNIPPET_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("input: {}...", &text[..end])
}

fn serde_message(err: &Error) -> String {
    format!(
        "{SCALAR_ERROR_MARKER}: {}",
        err.message().unwrap_or("invalid value")
    )
}

impl Serialize for Measurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = encode_scalar(self).map_err(|err| ser::Error::custom(serde_message(&err)))?;
        serializer.serialize_str(&encoded)
    }
}

struct MeasurementVisitor;

impl Visitor<'_> for MeasurementVisitor {
    type Value = Measurement;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a unit-suffixed scalar string such as \"2.1meter\"")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Measurement, E> {
        decode_scalar(value).map_err(|err| E::custom(serde_message(&err)))
    }
}

impl<'de> Deserialize<'de> for Measurement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(MeasurementVisitor)
    }
}
