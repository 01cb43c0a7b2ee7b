//! Purpose: Concrete record types exchanged over the framer.
//! Exports: `Event`, `Vm`, `CompactVm`, `Account`, `User`, `StartVm`, `StartVmRequest`,
//! `LogEntry`, `Reading`, `sample_events`, `rfc3339`.
//! Role: Each type demonstrates one per-field serialization directive.
//! Invariants: Field names on the wire are fixed by the serde attributes below.
//! Invariants: Types marked `#[serde(default)]` leave missing fields at their zero value.
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::measure::Measurement;
use crate::core::presence::Presence;

/// Pointer event published on the event feed.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f64,
    pub y: f64,
}

impl Event {
    pub fn new(kind: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            kind: kind.into(),
            x,
            y,
        }
    }
}

/// The fixed feed served by `events` and `GET /events`.
pub fn sample_events() -> Vec<Event> {
    vec![
        Event::new("click", 100.0, 200.0),
        Event::new("move", 101.0, 202.0),
        Event::new("move", 102.0, 203.0),
        Event::new("move", 103.0, 204.0),
        Event::new("move", 104.0, 204.0),
        Event::new("click", 104.0, 204.0),
    ]
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Vm {
    pub id: String,
    pub cpus: i64,
    pub memory: i64,
}

/// `Vm` with empty/zero fields left out of the encoding.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CompactVm {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub cpus: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub memory: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Login record whose wire name differs from the field name.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Account {
    #[serde(rename = "name")]
    pub login: String,
    #[serde(alias = "UID")]
    pub uid: i64,
}

/// User whose token never leaves the process.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct User {
    pub login: String,
    pub id: i64,
    #[serde(skip)]
    pub token: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct StartVm {
    pub image: String,
    pub count: i64,
}

/// `StartVm` as received, with the count's presence preserved.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct StartVmRequest {
    pub image: String,
    #[serde(skip_serializing_if = "Presence::is_absent")]
    pub count: Presence<i64>,
}

impl StartVmRequest {
    pub fn resolve(self, default_count: i64) -> StartVm {
        StartVm {
            image: self.image,
            count: self.count.unwrap_or(default_count),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(with = "rfc3339")]
    pub time: OffsetDateTime,
    pub level: String,
    pub message: String,
}

/// A named measurement; `value` goes through the scalar codec.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Reading {
    pub name: String,
    pub value: Measurement,
}

/// RFC 3339 timestamps as JSON strings.
pub mod rfc3339 {
    use serde::de::{self, Deserialize, Deserializer};
    use serde::ser::{self, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let text = value.format(&Rfc3339).map_err(ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&text, &Rfc3339).map_err(de::Error::custom)
    }
}
