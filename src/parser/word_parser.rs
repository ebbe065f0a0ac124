//! Decoding of 32-bit readout words.
//!
//! Word layout as delivered by the readout FIFO:
//! - bit 31 set: trigger word, bits 30..0 carry the trigger number
//! - otherwise bits 30..24 carry the channel and bits 23..0 the front-end word
//!
//! Front-end words of interest:
//! - data header: `0xE9` in bits 23..16, BCID in bits 9..0
//! - data record: column in bits 23..17, row in bits 16..8, ToT in bits 7..4

use crate::error::TuneError;
use crate::types::event::{ChannelId, EventRecord, Hit, Payload, TRIGGER_CHANNEL};
use winnow::{Parser, binary::le_u32, combinator::repeat, error::ContextError};

const TRIGGER_WORD_FLAG: u32 = 0x8000_0000;
const TRIGGER_NUMBER_MASK: u32 = 0x7FFF_FFFF;
const CHANNEL_MASK: u32 = 0x7F00_0000;
const FE_WORD_MASK: u32 = 0x00FF_FFFF;
const DATA_HEADER_MASK: u32 = 0x00FF_0000;
const DATA_HEADER: u32 = 0x00E9_0000;
const BCID_MASK: u32 = 0x0000_03FF;
const COLUMN_MASK: u32 = 0x00FE_0000;
const ROW_MASK: u32 = 0x0001_FF00;
const TOT_MASK: u32 = 0x0000_00F0;
const NO_SECOND_HIT: u32 = 0x0000_000F;

/// Largest column/row a data record can address.
const MAX_COLUMN: u32 = 80;
const MAX_ROW: u32 = 336;

/// Parses one little-endian readout word.
pub fn parse_raw_word(input: &mut &[u8]) -> Result<u32, ContextError> {
    le_u32.parse_next(input)
}

/// Parses as many complete little-endian words as the input holds. A trailing
/// partial word is left in `input`.
pub fn parse_raw_words(input: &mut &[u8]) -> Result<Vec<u32>, ContextError> {
    repeat(0.., le_u32).parse_next(input)
}

/// Decodes a raw byte dump into records; trailing bytes are an error.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<EventRecord>, TuneError> {
    let mut input = bytes;
    let words = parse_raw_words(&mut input)
        .map_err(|e| TuneError::Decode(format!("invalid raw word stream: {:?}", e)))?;
    if !input.is_empty() {
        return Err(TuneError::Decode(format!(
            "{} trailing bytes after the last complete word",
            input.len()
        )));
    }
    Ok(decode_words(&words))
}

pub fn decode_words(words: &[u32]) -> Vec<EventRecord> {
    words.iter().map(|&word| decode_word(word)).collect()
}

pub fn decode_word(word: u32) -> EventRecord {
    if word & TRIGGER_WORD_FLAG != 0 {
        return EventRecord::new(
            TRIGGER_CHANNEL,
            Payload::Trigger {
                number: word & TRIGGER_NUMBER_MASK,
            },
        );
    }

    let channel = ((word & CHANNEL_MASK) >> 24) as ChannelId;
    let fe_word = word & FE_WORD_MASK;
    let payload = if fe_word & DATA_HEADER_MASK == DATA_HEADER {
        Payload::DataHeader {
            bcid: (fe_word & BCID_MASK) as u16,
        }
    } else if let Some(hit) = decode_data_record(fe_word) {
        Payload::Hit(hit)
    } else {
        Payload::Other(fe_word)
    };
    EventRecord::new(channel, payload)
}

fn decode_data_record(fe_word: u32) -> Option<Hit> {
    let column = (fe_word & COLUMN_MASK) >> 17;
    let row = (fe_word & ROW_MASK) >> 8;
    if !(1..=MAX_COLUMN).contains(&column) || !(1..=MAX_ROW).contains(&row) {
        return None;
    }
    Some(
        Hit::builder()
            .column(column as u16)
            .row(row as u16)
            .tot(((fe_word & TOT_MASK) >> 4) as u8)
            .build(),
    )
}

/// Encodes a hit as a data record word with an empty second-hit slot.
pub fn data_record_word(channel: ChannelId, hit: &Hit) -> u32 {
    ((channel as u32) << 24) & CHANNEL_MASK
        | ((hit.column as u32) << 17) & COLUMN_MASK
        | ((hit.row as u32) << 8) & ROW_MASK
        | ((hit.tot as u32) << 4) & TOT_MASK
        | NO_SECOND_HIT
}

pub fn data_header_word(channel: ChannelId, bcid: u16) -> u32 {
    ((channel as u32) << 24) & CHANNEL_MASK | DATA_HEADER | (bcid as u32 & BCID_MASK)
}

pub fn trigger_word(number: u32) -> u32 {
    TRIGGER_WORD_FLAG | (number & TRIGGER_NUMBER_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_record_fields() {
        // channel 4, column 12, row 300, ToT 7
        let word = 0x0400_0000 | (12 << 17) | (300 << 8) | (7 << 4) | 0xF;
        let record = decode_word(word);
        assert_eq!(record.channel, 4);
        assert_eq!(
            record.as_hit(),
            Some(&Hit {
                column: 12,
                row: 300,
                tot: 7
            })
        );
    }

    #[test]
    fn headers_and_triggers_are_not_hits() {
        let header = decode_word(data_header_word(3, 0x155));
        assert_eq!(header.channel, 3);
        assert_eq!(header.payload, Payload::DataHeader { bcid: 0x155 });

        let trigger = decode_word(trigger_word(1234));
        assert_eq!(trigger.channel, TRIGGER_CHANNEL);
        assert_eq!(trigger.payload, Payload::Trigger { number: 1234 });
    }

    #[test]
    fn out_of_matrix_records_are_kept_as_other() {
        // column field 0 is not a valid data record
        let record = decode_word(0x0400_0000 | (5 << 8));
        assert!(matches!(record.payload, Payload::Other(_)));
    }

    #[test]
    fn encoded_hit_decodes_back() {
        let hit = Hit::builder().column(80).row(336).tot(13).build();
        assert_eq!(decode_word(data_record_word(4, &hit)).as_hit(), Some(&hit));
    }

    #[test]
    fn parses_little_endian_stream() {
        let words = [trigger_word(1), data_header_word(4, 2)];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let records = parse_records(&bytes).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload, Payload::Trigger { number: 1 });

        let mut truncated = bytes.clone();
        truncated.pop();
        assert!(matches!(
            parse_records(&truncated),
            Err(TuneError::Decode(_))
        ));
    }
}
