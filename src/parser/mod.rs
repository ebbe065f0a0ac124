//! Raw readout data parsing

pub mod word_parser;

// Re-export the parsing functions
pub use word_parser::{
    data_header_word, data_record_word, decode_word, decode_words, parse_raw_word,
    parse_raw_words, parse_records, trigger_word,
};
