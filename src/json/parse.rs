//! Purpose: Provide the internal JSON decode entrypoints and failure categories.
//! Exports: `from_slice`, `ParseFailureCategory`, `categorize_error`, `hint_for_error`.
//! Role: Parser boundary that centralizes serde_json usage details.
//! Invariants: Categories are derived from serde_json's classification, except scalar codec
//! failures, which are recognized by a message that starts with `SCALAR_ERROR_MARKER`.
//! Invariants: Input text echoed inside a serde message never selects the scalar category.
//! Notes: Kept free of crate imports so tests can include it by path.

use serde::de::DeserializeOwned;
use serde_json::error::Category;

/// Prefix of serde error messages raised by the scalar codec.
pub(crate) const SCALAR_ERROR_MARKER: &str = "malformed scalar";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ParseFailureCategory {
    Syntax,
    TypeMismatch,
    Truncated,
    Scalar,
    Io,
    Unknown,
}

impl ParseFailureCategory {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ParseFailureCategory::Syntax => "syntax",
            ParseFailureCategory::TypeMismatch => "type-mismatch",
            ParseFailureCategory::Truncated => "truncated",
            ParseFailureCategory::Scalar => "scalar",
            ParseFailureCategory::Io => "io",
            ParseFailureCategory::Unknown => "unknown",
        }
    }
}

pub(crate) fn from_slice<T: DeserializeOwned>(input: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(input)
}

pub(crate) fn categorize_error(err: &serde_json::Error) -> ParseFailureCategory {
    if categorize_message(&err.to_string()) == ParseFailureCategory::Scalar {
        return ParseFailureCategory::Scalar;
    }
    match err.classify() {
        Category::Io => ParseFailureCategory::Io,
        Category::Syntax => ParseFailureCategory::Syntax,
        Category::Data => ParseFailureCategory::TypeMismatch,
        Category::Eof => ParseFailureCategory::Truncated,
    }
}

pub(crate) fn categorize_message(message: &str) -> ParseFailureCategory {
    // serde_json messages lead with serde's own wording, so only codec errors start this way.
    if message.starts_with(SCALAR_ERROR_MARKER) {
        return ParseFailureCategory::Scalar;
    }
    let lower = message.to_ascii_lowercase();
    if lower.contains("eof while parsing") {
        ParseFailureCategory::Truncated
    } else if lower.contains("invalid type")
        || lower.contains("invalid value")
        || lower.contains("missing field")
        || lower.contains("unknown variant")
    {
        ParseFailureCategory::TypeMismatch
    } else if lower.contains("expected") || lower.contains("trailing") {
        ParseFailureCategory::Syntax
    } else {
        ParseFailureCategory::Unknown
    }
}

pub(crate) fn hint_for_error(err: &serde_json::Error, context: &str) -> String {
    let category = categorize_error(err);
    if err.line() == 0 {
        return format!("parse category: {}; context: {context}", category.label());
    }
    format!(
        "parse category: {}; context: {context}; line {} column {}",
        category.label(),
        err.line(),
        err.column()
    )
}
