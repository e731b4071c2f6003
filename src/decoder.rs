//! Bus monitor recording decoder

use std::fmt;
use std::iter::FusedIterator;
use std::slice::ChunksExact;

use crate::core::{BmEntry, EntryType};
use crate::error::{BmError, Result};
use crate::layout::ENTRY_SIZE;
use crate::message::{BmMessage, MessageGrouper};
use crate::words::{CommandWord, DataWord, ErrorWord, StatusWord, TimeTagHigh, TimeTagLow};

/// Line printed ahead of every time tag high in a dump
const MESSAGE_SEPARATOR: &str = "---------------";

/// Decode a recording buffer into its entries
///
/// The buffer must hold a whole number of 4-byte little-endian words. The
/// returned iterator is lazy and can be cloned to restart decoding from the
/// same position.
pub fn decode_entries(buffer: &[u8]) -> Result<Entries<'_>> {
    if buffer.len() % ENTRY_SIZE != 0 {
        return Err(BmError::malformed_buffer(buffer.len()));
    }
    Ok(Entries {
        chunks: buffer.chunks_exact(ENTRY_SIZE),
    })
}

/// Render a single entry as one human readable line
pub fn interpret_entry(entry: &BmEntry) -> String {
    entry.to_string()
}

/// Lazy iterator over the entries of a recording buffer
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    chunks: ChunksExact<'a, u8>,
}

impl Iterator for Entries<'_> {
    type Item = BmEntry;

    fn next(&mut self) -> Option<BmEntry> {
        self.chunks
            .next()
            .map(|chunk| BmEntry::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl FusedIterator for Entries<'_> {}

impl fmt::Display for BmEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entry_type = self.entry_type();
        let tag = format!("{}:", entry_type.mnemonic());
        write!(f, "{:<8} ", tag)?;

        match entry_type {
            EntryType::Error => {
                let err = ErrorWord::from(self.word16());
                write!(f, "0x{:04X} ({})", err.raw(), err)
            }
            EntryType::TimeTagLow => {
                write!(f, "0x{:08X} ({})", self.payload(), TimeTagLow::from(self.payload()))
            }
            EntryType::TimeTagHigh => {
                write!(f, "0x{:08X} ({})", self.payload(), TimeTagHigh::from(self.payload()))
            }
            EntryType::CommandWord1Primary
            | EntryType::CommandWord2Primary
            | EntryType::CommandWord1Secondary
            | EntryType::CommandWord2Secondary => {
                let cw = CommandWord::from(self.word16());
                write!(f, "0x{:4X} ({})", cw.raw(), cw)
            }
            EntryType::DataWordPrimary | EntryType::DataWordSecondary => {
                let dw = DataWord::from_payload(self.payload());
                write!(f, "0x{:04X} ({:4.2} us)", dw.value, dw.gap_us())
            }
            EntryType::StatusWordPrimary | EntryType::StatusWordSecondary => {
                let sw = StatusWord::from(self.word16());
                write!(f, "0x{:04X} ({})", sw.raw(), sw)
            }
            EntryType::Invalid | EntryType::Reserved(_) => write!(f, "0x{:08X}", self.raw()),
        }
    }
}

/// Bus monitor recording decoder
#[derive(Debug, Clone)]
pub struct Decoder {
    /// Accept empty buffers instead of failing
    pub allow_empty: bool,
    /// Print a separator line before each time tag high in dumps
    pub separate_messages: bool,
    /// Drop structurally incomplete messages when grouping
    pub strict: bool,
}

impl Decoder {
    /// Create a decoder with the default settings
    pub fn new() -> Self {
        DecoderBuilder::new().build()
    }

    /// Decode a buffer, enforcing the empty-buffer setting
    pub fn decode<'a>(&self, buffer: &'a [u8]) -> Result<Entries<'a>> {
        if buffer.is_empty() && !self.allow_empty {
            return Err(BmError::empty_buffer("recording buffer holds no entries"));
        }
        let entries = decode_entries(buffer)?;
        log::debug!(
            "decoding {} bytes ({} entries)",
            buffer.len(),
            entries.len()
        );
        Ok(entries)
    }

    /// Render every entry of a buffer, one line each
    pub fn dump(&self, buffer: &[u8]) -> Result<String> {
        let mut out = String::new();

        for entry in self.decode(buffer)? {
            match entry.entry_type() {
                EntryType::TimeTagHigh if self.separate_messages => {
                    out.push_str(MESSAGE_SEPARATOR);
                    out.push('\n');
                }
                EntryType::Reserved(code) => {
                    log::warn!("reserved entry type {:#x} in recording", code);
                }
                _ => {}
            }
            out.push_str(&interpret_entry(&entry));
            out.push('\n');
        }

        Ok(out)
    }

    /// Decode a buffer and regroup its entries into bus transactions
    pub fn messages(&self, buffer: &[u8]) -> Result<Vec<BmMessage>> {
        let entries = self.decode(buffer)?;
        Ok(MessageGrouper::new().strict(self.strict).group(entries))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring a [`Decoder`]
pub struct DecoderBuilder {
    allow_empty: bool,
    separate_messages: bool,
    strict: bool,
}

impl DecoderBuilder {
    /// Create a new decoder builder
    pub fn new() -> Self {
        DecoderBuilder {
            allow_empty: false,
            separate_messages: true,
            strict: false,
        }
    }

    /// Accept empty buffers
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Separate messages in dumps
    pub fn separate_messages(mut self, separate: bool) -> Self {
        self.separate_messages = separate;
        self
    }

    /// Drop incomplete messages when grouping
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Build the decoder
    pub fn build(self) -> Decoder {
        Decoder {
            allow_empty: self.allow_empty,
            separate_messages: self.separate_messages,
            strict: self.strict,
        }
    }
}

impl Default for DecoderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
