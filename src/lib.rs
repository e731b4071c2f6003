//! # MIL-STD-1553B Bus Monitor Decoder
//!
//! A Rust library for decoding the low-speed bus monitor recordings produced by
//! MIL-STD-1553B interface boards.
//!
//! A recording is a flat stream of 32-bit little-endian words. The top nibble of
//! each word tags the entry (time tag, command, data, status or error word on the
//! primary or secondary bus) and the remaining bits carry its payload. This
//! library provides:
//!
//! - Decoding of recording buffers into typed entries
//! - Human readable labels for command, status and error words
//! - Reconstruction of bus transactions from the entry stream
//! - Traffic statistics
//! - Encoding of entries back into recording buffers
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use milstd1553b_bm::{decode_entries, group_into_messages, interpret_entry};
//!
//! // TTHIGH, TTLOW, CW1 (RT3 receive SA13 one word), DW, SW
//! let words: [u32; 5] = [0x3000_0000, 0x2010_01F4, 0x8000_19A1, 0xA004_0001, 0xB000_1800];
//! let buffer: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
//!
//! for entry in decode_entries(&buffer)? {
//!     println!("{}", interpret_entry(&entry));
//! }
//!
//! let messages = group_into_messages(decode_entries(&buffer)?);
//! assert_eq!(messages.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod message;
pub mod stats;
pub mod words;

pub use crate::core::{BmEntry, Bus, EntryType};
pub use decoder::{decode_entries, interpret_entry, Decoder, DecoderBuilder, Entries};
pub use encoding::EntryEncoder;
pub use error::{BmError, Result};
pub use message::{group_into_messages, BmMessage, MessageGrouper, TransferKind};
pub use stats::{MonitorStats, RtTraffic};
pub use words::{CommandWord, DataWord, ErrorFlag, ErrorWord, StatusWord, TimeTag};

/// Bus monitor recording layout constants
pub mod layout {
    /// Size of one recorded entry in bytes
    pub const ENTRY_SIZE: usize = 4;

    /// Position of the entry type nibble
    pub const TYPE_SHIFT: u32 = 28;

    /// Payload bits below the type nibble
    pub const PAYLOAD_MASK: u32 = 0x03FF_FFFF;

    /// Data word gap resolution in microseconds
    pub const GAP_RESOLUTION_US: f64 = 0.25;

    /// Broadcast RT address
    pub const BROADCAST_ADDRESS: u8 = 31;
}
