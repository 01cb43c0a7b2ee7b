//! Purpose: Count symbols mentioned alongside a queried symbol in a stream-feed reply.
//! Exports: `RelatedClient`, `StreamReply`, `count_related`, `DEFAULT_URL_TEMPLATE`.
//! Role: HTTP client over ureq whose response body is read through the stream decoder.
//! Invariants: The queried symbol never appears in the counts (ASCII case-insensitive).
//! Invariants: Symbols are validated before they are substituted into the URL.
#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::core::error::{Error, ErrorKind};
use crate::core::stream::StreamDecoder;

pub const DEFAULT_URL_TEMPLATE: &str = "https://api.stocktwits.com/api/2/streams/symbol/{symbol}.json";

const SYMBOL_PLACEHOLDER: &str = "{symbol}";
const MAX_SYMBOL_LEN: usize = 16;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct StreamReply {
    pub messages: Vec<StreamMessage>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct StreamMessage {
    pub symbols: Vec<SymbolRef>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SymbolRef {
    pub symbol: String,
}

/// Decode one reply from `reply` and tally every symbol except `symbol`.
pub fn count_related<R: Read>(reply: R, symbol: &str) -> Result<BTreeMap<String, u64>, Error> {
    let mut decoder = StreamDecoder::buffered(reply);
    let reply: StreamReply = decoder.next_record()?.ok_or_else(|| {
        Error::new(ErrorKind::MalformedRecord).with_message("empty stream-feed reply")
    })?;
    decoder.finish()?;
    let mut related = BTreeMap::new();
    for message in reply.messages {
        for mention in message.symbols {
            if mention.symbol.is_empty() || mention.symbol.eq_ignore_ascii_case(symbol) {
                continue;
            }
            *related.entry(mention.symbol).or_insert(0) += 1;
        }
    }
    Ok(related)
}

#[derive(Clone)]
pub struct RelatedClient {
    agent: ureq::Agent,
    url_template: String,
}

impl RelatedClient {
    pub fn new() -> Self {
        Self::with_url_template(DEFAULT_URL_TEMPLATE)
    }

    pub fn with_url_template(template: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build();
        Self {
            agent,
            url_template: template.into(),
        }
    }

    pub fn url_for(&self, symbol: &str) -> Result<Url, Error> {
        ensure_symbol(symbol)?;
        if !self.url_template.contains(SYMBOL_PLACEHOLDER) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("url template is missing the {symbol} placeholder")
                .with_hint(format!("template: {}", self.url_template)));
        }
        let raw = self.url_template.replace(SYMBOL_PLACEHOLDER, symbol);
        Url::parse(&raw).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid url")
                .with_hint(format!("url: {raw}"))
                .with_source(err)
        })
    }

    pub fn related(&self, symbol: &str) -> Result<BTreeMap<String, u64>, Error> {
        let url = self.url_for(symbol)?;
        tracing::debug!(%url, "fetching stream-feed reply");
        let response = self
            .agent
            .get(url.as_str())
            .set("Accept", "application/json")
            .call();
        match response {
            Ok(resp) => count_related(resp.into_reader(), symbol),
            Err(ureq::Error::Status(code, _)) => Err(Error::new(error_kind_from_status(code))
                .with_message(format!("remote error status {code}"))
                .with_hint(format!("url: {url}"))),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_source(err)),
        }
    }
}

impl Default for RelatedClient {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_symbol(symbol: &str) -> Result<(), Error> {
    let valid = !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'));
    if valid {
        return Ok(());
    }
    Err(Error::new(ErrorKind::Usage)
        .with_message(format!("invalid symbol: {symbol:?}"))
        .with_hint("symbols are 1-16 ASCII letters, digits, '.', '-' or '_'"))
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400..=499 => ErrorKind::Usage,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{RelatedClient, count_related};
    use crate::core::error::ErrorKind;

    const REPLY: &str = r#"{
        "symbol": {"symbol": "AAPL"},
        "messages": [
            {"id": 1, "symbols": [{"symbol": "AAPL"}, {"symbol": "MSFT"}]},
            {"id": 2, "symbols": [{"symbol": "aapl"}, {"symbol": "GOOG"}, {"symbol": "MSFT"}]},
            {"id": 3}
        ]
    }"#;

    #[test]
    fn counts_exclude_queried_symbol() {
        let counts = count_related(REPLY.as_bytes(), "AAPL").expect("count");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["MSFT"], 2);
        assert_eq!(counts["GOOG"], 1);
        assert!(!counts.contains_key("AAPL"));
        assert!(!counts.contains_key("aapl"));
    }

    #[test]
    fn empty_reply_is_malformed() {
        let err = count_related("".as_bytes(), "AAPL").expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let err = count_related(r#"{"messages":{}}"#.as_bytes(), "AAPL").expect_err("shape");
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    }

    #[test]
    fn data_after_the_reply_is_malformed() {
        let err = count_related("{\"messages\":[]} not json".as_bytes(), "AAPL")
            .expect_err("trailing");
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);

        let counts = count_related("{\"messages\":[]}\n".as_bytes(), "AAPL").expect("newline");
        assert!(counts.is_empty());
    }

    #[test]
    fn url_substitutes_symbol() {
        let client = RelatedClient::with_url_template("http://127.0.0.1:9/s/{symbol}.json");
        let url = client.url_for("AAPL").expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9/s/AAPL.json");
    }

    #[test]
    fn bad_symbols_and_templates_are_usage_errors() {
        let client = RelatedClient::new();
        for symbol in ["", "A/B", "../etc", "WAYTOOLONGSYMBOLNAME"] {
            let err = client.url_for(symbol).expect_err(symbol);
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
        let client = RelatedClient::with_url_template("http://127.0.0.1:9/feed.json");
        assert_eq!(
            client.url_for("AAPL").expect_err("template").kind(),
            ErrorKind::Usage
        );
    }
}
