//! Serde support for message types.
//!
//! `Payload` stores its bytes in an inline array too large for derive, so it
//! serializes as a plain byte sequence; the other types derive.

use crate::message::{Payload, MAX_PAYLOAD_LEN};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

impl Serialize for Payload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self.as_slice())
    }
}

struct PayloadVisitor;

impl<'de> Visitor<'de> for PayloadVisitor {
    type Value = Payload;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "at most {MAX_PAYLOAD_LEN} payload bytes")
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Payload, E>
    where
        E: de::Error,
    {
        Payload::new(v).map_err(de::Error::custom)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Payload, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        let mut buf = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PAYLOAD_LEN));
        while let Some(byte) = seq.next_element::<u8>()? {
            buf.push(byte);
        }
        Payload::new(&buf).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D>(deserializer: D) -> Result<Payload, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_bytes(PayloadVisitor)
    }
}
