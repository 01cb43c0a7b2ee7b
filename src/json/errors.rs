// Map serde_json failures onto the crate error taxonomy.
use crate::core::error::{Error, ErrorKind};
use crate::json::parse::{self, ParseFailureCategory};

pub(crate) fn decode_error(err: serde_json::Error, context: &str) -> Error {
    let hint = parse::hint_for_error(&err, context);
    let (kind, message) = match parse::categorize_error(&err) {
        ParseFailureCategory::Io => (ErrorKind::Io, "failed to read record stream"),
        ParseFailureCategory::Scalar => (ErrorKind::MalformedScalar, "invalid scalar in record"),
        ParseFailureCategory::TypeMismatch => {
            (ErrorKind::MalformedRecord, "record field has incompatible type")
        }
        ParseFailureCategory::Truncated => (ErrorKind::MalformedRecord, "truncated record"),
        ParseFailureCategory::Syntax | ParseFailureCategory::Unknown => {
            (ErrorKind::MalformedRecord, "invalid record json")
        }
    };
    Error::new(kind)
        .with_message(message)
        .with_hint(hint)
        .with_source(err)
}

pub(crate) fn encode_error(err: serde_json::Error, context: &str) -> Error {
    let kind = match parse::categorize_error(&err) {
        ParseFailureCategory::Scalar => ErrorKind::MalformedScalar,
        ParseFailureCategory::Io => ErrorKind::Io,
        _ => ErrorKind::MalformedRecord,
    };
    Error::new(kind)
        .with_message(format!("failed to encode {context}"))
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{decode_error, encode_error};
    use crate::core::error::ErrorKind;
    use crate::core::measure::Measurement;
    use serde_json::Value;

    #[test]
    fn syntax_and_truncation_are_malformed_records() {
        let err = serde_json::from_str::<Value>(r#"{"a":}"#).unwrap_err();
        assert_eq!(decode_error(err, "test").kind(), ErrorKind::MalformedRecord);

        let err = serde_json::from_str::<Value>(r#"{"a":1"#).unwrap_err();
        let mapped = decode_error(err, "test");
        assert_eq!(mapped.kind(), ErrorKind::MalformedRecord);
        assert_eq!(mapped.message(), Some("truncated record"));
    }

    #[test]
    fn scalar_failures_keep_their_kind() {
        let err = serde_json::from_str::<Measurement>(r#""x""#).unwrap_err();
        assert_eq!(decode_error(err, "test").kind(), ErrorKind::MalformedScalar);

        let err = serde_json::to_vec(&Measurement::meters(f64::NAN)).unwrap_err();
        assert_eq!(encode_error(err, "record").kind(), ErrorKind::MalformedScalar);
    }
}
