//! Purpose: Frame a sequence of records as back-to-back JSON values on a byte stream.
//! Exports: `FrameStyle`, `StreamEncoder`, `StreamDecoder`, `Records`, `overlay_record`.
//! Role: Transport-agnostic framer used by the event feed, the pipe, and the RPC demo.
//! Invariants: Encoder writes nothing for a record that fails to serialize.
//! Invariants: Encoder flushes the sink after every record.
//! Invariants: Decoder reads at most one byte past the current value.
//! Invariants: Decoder is terminated by the first failure; later pulls yield `None`.
use std::io::{self, BufReader, Read, Write};
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::{Deserialize, DeserializeOwned};
use serde_json::de::IoRead;
use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::json::errors::{decode_error, encode_error};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FrameStyle {
    /// Values follow each other with no delimiter.
    #[default]
    Concatenated,
    /// Each value is terminated by a single `\n` (JSONL).
    Lines,
}

fn io_error(err: io::Error, message: &str) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_source(err)
}

pub struct StreamEncoder<W: Write> {
    sink: W,
    style: FrameStyle,
    scratch: Vec<u8>,
    written: u64,
}

impl<W: Write> StreamEncoder<W> {
    pub fn new(sink: W) -> Self {
        Self::with_style(sink, FrameStyle::default())
    }

    pub fn with_style(sink: W, style: FrameStyle) -> Self {
        Self {
            sink,
            style,
            scratch: Vec::new(),
            written: 0,
        }
    }

    pub fn records_written(&self) -> u64 {
        self.written
    }

    /// Serialize one record, write it, and flush the sink.
    pub fn encode<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<(), Error> {
        self.scratch.clear();
        serde_json::to_writer(&mut self.scratch, record)
            .map_err(|err| encode_error(err, "record"))?;
        if self.style == FrameStyle::Lines {
            self.scratch.push(b'\n');
        }
        self.sink
            .write_all(&self.scratch)
            .map_err(|err| io_error(err, "failed to write record"))?;
        self.sink
            .flush()
            .map_err(|err| io_error(err, "failed to flush record"))?;
        self.written += 1;
        Ok(())
    }

    /// Encode records in order, stopping at the first failure.
    pub fn encode_all<I>(&mut self, records: I) -> Result<u64, Error>
    where
        I: IntoIterator,
        I::Item: Serialize,
    {
        let mut count = 0u64;
        for record in records {
            self.encode(&record)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

pub struct StreamDecoder<R: Read> {
    de: serde_json::Deserializer<IoRead<R>>,
    read: u64,
    done: bool,
}

impl<R: Read> StreamDecoder<R> {
    /// Decode straight from `source`; every byte is pulled with its own `read` call.
    pub fn new(source: R) -> Self {
        Self {
            de: serde_json::Deserializer::from_reader(source),
            read: 0,
            done: false,
        }
    }

    pub fn records_read(&self) -> u64 {
        self.read
    }

    pub fn is_terminated(&self) -> bool {
        self.done
    }

    /// Pull the next record; `Ok(None)` marks a clean end of stream.
    pub fn next_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, Error> {
        if self.done {
            return Ok(None);
        }
        // `end` consumes whitespace and succeeds only at end of input.
        match self.de.end() {
            Ok(()) => {
                self.done = true;
                return Ok(None);
            }
            Err(err) if err.is_io() => {
                self.done = true;
                return Err(decode_error(err, &self.context()));
            }
            Err(_) => {}
        }
        match T::deserialize(&mut self.de) {
            Ok(record) => {
                self.read += 1;
                Ok(Some(record))
            }
            Err(err) => {
                self.done = true;
                Err(decode_error(err, &self.context()))
            }
        }
    }

    /// Require the source to hold nothing but whitespace from here on.
    pub fn finish(&mut self) -> Result<(), Error> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        match self.de.end() {
            Ok(()) => Ok(()),
            Err(err) if err.is_io() => Err(decode_error(err, &self.context())),
            Err(err) => Err(Error::new(ErrorKind::MalformedRecord)
                .with_message("unexpected data after record")
                .with_hint(format!("context: after record {}", self.read))
                .with_source(err)),
        }
    }

    /// Pull the next record as an untyped JSON value.
    pub fn next_value(&mut self) -> Result<Option<Value>, Error> {
        self.next_record::<Value>()
    }

    /// Pull the next record and apply it over `base`; fields missing from input keep
    /// the values `base` already holds.
    pub fn next_onto<T>(&mut self, base: T) -> Result<Option<T>, Error>
    where
        T: Serialize + DeserializeOwned,
    {
        let context = self.context();
        match self.next_value()? {
            Some(input) => overlay_record(base, input, &context).map(Some),
            None => Ok(None),
        }
    }

    pub fn records<T: DeserializeOwned>(&mut self) -> Records<'_, R, T> {
        Records {
            decoder: self,
            _marker: PhantomData,
        }
    }

    fn context(&self) -> String {
        format!("record {}", self.read + 1)
    }
}

impl<R: Read> StreamDecoder<BufReader<R>> {
    /// Decode through a `BufReader`, for sources where small reads are expensive.
    pub fn buffered(source: R) -> Self {
        Self::new(BufReader::new(source))
    }
}

pub struct Records<'a, R: Read, T> {
    decoder: &'a mut StreamDecoder<R>,
    _marker: PhantomData<fn() -> T>,
}

impl<R: Read, T: DeserializeOwned> Iterator for Records<'_, R, T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_record().transpose()
    }
}

/// Rebuild `base` with every field that `input` supplies; nested objects merge.
pub fn overlay_record<T>(base: T, input: Value, context: &str) -> Result<T, Error>
where
    T: Serialize + DeserializeOwned,
{
    let Value::Object(input) = input else {
        return Err(Error::new(ErrorKind::MalformedRecord)
            .with_message("record must be a JSON object")
            .with_hint(format!("context: {context}")));
    };
    let mut merged = serde_json::to_value(&base).map_err(|err| encode_error(err, "base record"))?;
    let Value::Object(target) = &mut merged else {
        return Err(Error::new(ErrorKind::Internal)
            .with_message("base record does not serialize to a JSON object"));
    };
    merge_object(target, input);
    T::deserialize(merged).map_err(|err| decode_error(err, context))
}

fn merge_object(target: &mut Map<String, Value>, input: Map<String, Value>) {
    for (key, value) in input {
        match value {
            Value::Object(incoming) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge_object(existing, incoming),
                _ => {
                    target.insert(key, Value::Object(incoming));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}
