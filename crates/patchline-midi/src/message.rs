//! Queued MIDI messages with inline payload storage.

use crate::error::{Error, Result};
use std::fmt;

/// Hard upper bound on payload storage. Clients may enforce a lower cap,
/// never a higher one.
pub const MAX_PAYLOAD_LEN: usize = 1024;

/// Opaque port identity issued by a driver.
///
/// Only the dispatch key inside [`Message`] and a map key elsewhere; it is
/// never dereferenced, so a stale id after port teardown is harmless by
/// construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortId(u64);

impl PortId {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// MIDI payload bytes in a fixed-capacity inline buffer.
///
/// Inline storage makes every queued message a fixed-size pool slot, so
/// moving messages through the queues never allocates.
#[derive(Clone, Copy)]
pub struct Payload {
    len: u16,
    bytes: [u8; MAX_PAYLOAD_LEN],
}

impl Payload {
    /// Copy `data` in, rejecting anything longer than [`MAX_PAYLOAD_LEN`].
    pub fn new(data: &[u8]) -> Result<Self> {
        Self::bounded(data, MAX_PAYLOAD_LEN)
    }

    /// Copy `data` in, enforcing a cap at or below the storage bound.
    pub fn bounded(data: &[u8], max: usize) -> Result<Self> {
        let max = max.min(MAX_PAYLOAD_LEN);
        if data.len() > max {
            return Err(Error::PayloadTooLarge {
                len: data.len(),
                max,
            });
        }
        let mut bytes = [0u8; MAX_PAYLOAD_LEN];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self {
            len: data.len() as u16,
            bytes,
        })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            len: 0,
            bytes: [0u8; MAX_PAYLOAD_LEN],
        }
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Payload {}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({:02x?})", self.as_slice())
    }
}

/// One queued MIDI message: where it goes, when, and its bytes.
///
/// `time` is in frames. For a pending outbound message it counts frames until
/// delivery, relative to the start of the next period to be processed, and is
/// re-based as periods elapse. For a captured inbound message it is the
/// event's offset within its capture period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    pub port: PortId,
    pub time: u64,
    pub payload: Payload,
}

impl Message {
    #[inline]
    pub fn new(port: PortId, time: u64, payload: Payload) -> Self {
        Self {
            port,
            time,
            payload,
        }
    }
}
