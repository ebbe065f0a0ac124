//! Types for decoded front-end event records

use bon::Builder;

/// Identifier of the readout channel a record came from.
pub type ChannelId = u8;

/// Channel assigned to trigger words; lies outside the 7-bit front-end range.
pub const TRIGGER_CHANNEL: ChannelId = 0x80;

/// A pixel hit taken from a data record. Column and row are 1-based, as
/// reported by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Builder)]
pub struct Hit {
    pub column: u16,
    pub row: u16,
    pub tot: u8,
}

/// Payload of a single raw data word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Hit(Hit),
    DataHeader { bcid: u16 },
    Trigger { number: u32 },
    Other(u32),
}

/// One decoded record of the readout stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub channel: ChannelId,
    pub payload: Payload,
}

impl EventRecord {
    pub fn new(channel: ChannelId, payload: Payload) -> Self {
        Self { channel, payload }
    }

    pub fn hit(channel: ChannelId, column: u16, row: u16, tot: u8) -> Self {
        Self::new(channel, Payload::Hit(Hit { column, row, tot }))
    }

    pub fn as_hit(&self) -> Option<&Hit> {
        match &self.payload {
            Payload::Hit(hit) => Some(hit),
            _ => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.payload, Payload::Hit(_))
    }

    pub fn kind(&self) -> &'static str {
        match self.payload {
            Payload::Hit(_) => "hit",
            Payload::DataHeader { .. } => "data_header",
            Payload::Trigger { .. } => "trigger",
            Payload::Other(_) => "other",
        }
    }
}
