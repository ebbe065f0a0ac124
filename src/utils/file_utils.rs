use crate::error::TuneError;
use crate::parser::parse_records;
use crate::types::EventRecord;
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;

/// Read a binary file using memory mapping, so large raw dumps are not
/// copied into RAM before decoding.
pub fn read_binary_file_mmap(path: impl AsRef<Path>) -> io::Result<Mmap> {
    let file = File::open(path)?;
    // Safety: the raw dump is not modified while the mmap is active
    unsafe { Mmap::map(&file) }
}

/// Decodes every record of a raw word dump.
pub fn read_raw_records(path: impl AsRef<Path>) -> Result<Vec<EventRecord>, TuneError> {
    let path = path.as_ref();
    let mmap = read_binary_file_mmap(path)?;
    parse_records(&mmap).map_err(|e| match e {
        TuneError::Decode(msg) => TuneError::Decode(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Writes words as a little-endian raw dump.
pub fn write_raw_words(path: impl AsRef<Path>, words: &[u32]) -> io::Result<()> {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(path, bytes)
}
