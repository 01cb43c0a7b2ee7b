//! Purpose: Distinguish "field absent from input" from "field present with a zero value".
//! Exports: `Presence`.
//! Role: Field wrapper used by records whose defaults carry business meaning.
//! Invariants: A missing key decodes to `Absent`; any supplied value decodes to `Present`.
//! Invariants: `Absent` fields are skipped on encode when paired with `skip_serializing_if`.
//! Notes: Fields must also carry `#[serde(default)]` so a missing key reaches `Default`.
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Presence<T> {
    #[default]
    Absent,
    Present(T),
}

impl<T> Presence<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Presence::Absent)
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Presence::Absent => default,
            Presence::Present(value) => value,
        }
    }
}

impl<T: Serialize> Serialize for Presence<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Presence::Absent => serializer.serialize_none(),
            Presence::Present(value) => value.serialize(serializer),
        }
    }
}

// Only reached when the key exists, so an explicit `null` is checked against `T`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Presence<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Presence::Present)
    }
}
