//! Core types of the bus monitor recording format

use crate::layout;

/// Bus identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bus {
    /// Primary bus (bus A)
    Primary,
    /// Secondary bus (bus B)
    Secondary,
}

impl std::fmt::Display for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bus::Primary => write!(f, "Primary"),
            Bus::Secondary => write!(f, "Secondary"),
        }
    }
}

/// Entry type carried in the top nibble of every recorded word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntryType {
    /// Slot not yet updated by the monitor (code 0)
    Invalid,
    /// Error word (code 1)
    Error,
    /// Time tag low: seconds and microseconds (code 2)
    TimeTagLow,
    /// Time tag high: days, hours and minutes (code 3)
    TimeTagHigh,
    /// Reserved codes 4..7, kept with their raw code
    Reserved(u8),
    /// First command word on the primary bus (code 8)
    CommandWord1Primary,
    /// Second command word of an RT-to-RT transfer on the primary bus (code 9)
    CommandWord2Primary,
    /// Data word on the primary bus (code 0xA)
    DataWordPrimary,
    /// Status word on the primary bus (code 0xB)
    StatusWordPrimary,
    /// First command word on the secondary bus (code 0xC)
    CommandWord1Secondary,
    /// Second command word on the secondary bus (code 0xD)
    CommandWord2Secondary,
    /// Data word on the secondary bus (code 0xE)
    DataWordSecondary,
    /// Status word on the secondary bus (code 0xF)
    StatusWordSecondary,
}

impl EntryType {
    /// Map a 4-bit type code to its entry type. Only the low nibble is used.
    pub fn from_code(code: u8) -> Self {
        match code & 0xF {
            0x0 => EntryType::Invalid,
            0x1 => EntryType::Error,
            0x2 => EntryType::TimeTagLow,
            0x3 => EntryType::TimeTagHigh,
            0x8 => EntryType::CommandWord1Primary,
            0x9 => EntryType::CommandWord2Primary,
            0xA => EntryType::DataWordPrimary,
            0xB => EntryType::StatusWordPrimary,
            0xC => EntryType::CommandWord1Secondary,
            0xD => EntryType::CommandWord2Secondary,
            0xE => EntryType::DataWordSecondary,
            0xF => EntryType::StatusWordSecondary,
            reserved => EntryType::Reserved(reserved),
        }
    }

    /// The 4-bit type code
    pub fn code(&self) -> u8 {
        match self {
            EntryType::Invalid => 0x0,
            EntryType::Error => 0x1,
            EntryType::TimeTagLow => 0x2,
            EntryType::TimeTagHigh => 0x3,
            EntryType::Reserved(code) => *code & 0xF,
            EntryType::CommandWord1Primary => 0x8,
            EntryType::CommandWord2Primary => 0x9,
            EntryType::DataWordPrimary => 0xA,
            EntryType::StatusWordPrimary => 0xB,
            EntryType::CommandWord1Secondary => 0xC,
            EntryType::CommandWord2Secondary => 0xD,
            EntryType::DataWordSecondary => 0xE,
            EntryType::StatusWordSecondary => 0xF,
        }
    }

    /// Bus the entry was observed on, for bus word types
    pub fn bus(&self) -> Option<Bus> {
        match self.code() {
            0x8..=0xB => Some(Bus::Primary),
            0xC..=0xF => Some(Bus::Secondary),
            _ => None,
        }
    }

    /// First command word on either bus
    pub fn is_command_word_1(&self) -> bool {
        matches!(
            self,
            EntryType::CommandWord1Primary | EntryType::CommandWord1Secondary
        )
    }

    /// Second (transmit) command word of an RT-to-RT transfer on either bus
    pub fn is_command_word_2(&self) -> bool {
        matches!(
            self,
            EntryType::CommandWord2Primary | EntryType::CommandWord2Secondary
        )
    }

    /// Data word on either bus
    pub fn is_data_word(&self) -> bool {
        matches!(
            self,
            EntryType::DataWordPrimary | EntryType::DataWordSecondary
        )
    }

    /// Status word on either bus
    pub fn is_status_word(&self) -> bool {
        matches!(
            self,
            EntryType::StatusWordPrimary | EntryType::StatusWordSecondary
        )
    }

    /// Short mnemonic used as the prefix of interpreted lines
    pub fn mnemonic(&self) -> &'static str {
        match self {
            EntryType::Invalid => "INVALID",
            EntryType::Error => "ERROR",
            EntryType::TimeTagLow => "TTLOW",
            EntryType::TimeTagHigh => "TTHIGH",
            EntryType::Reserved(_) => "Reserved",
            EntryType::CommandWord1Primary => "CW1_PRI",
            EntryType::CommandWord2Primary => "CW2_PRI",
            EntryType::DataWordPrimary => "DW_PRI",
            EntryType::StatusWordPrimary => "SW_PRI",
            EntryType::CommandWord1Secondary => "CW1_SEC",
            EntryType::CommandWord2Secondary => "CW2_SEC",
            EntryType::DataWordSecondary => "DW_SEC",
            EntryType::StatusWordSecondary => "SW_SEC",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A single bus monitor entry
///
/// Format (32-bit little-endian word):
/// - Bits 31-28: entry type
/// - Bits 27-26: unused
/// - Bits 25-0: payload, interpreted according to the entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BmEntry {
    /// Raw 32-bit word as recorded
    raw: u32,
    /// Type decoded from the top nibble
    entry_type: EntryType,
}

impl BmEntry {
    /// Decode a recorded word. Never fails: every nibble maps to a type.
    pub fn from_word(raw: u32) -> Self {
        let entry_type = EntryType::from_code((raw >> layout::TYPE_SHIFT) as u8);
        BmEntry { raw, entry_type }
    }

    /// Decode an entry from its 4 little-endian bytes
    pub fn from_le_bytes(bytes: [u8; layout::ENTRY_SIZE]) -> Self {
        Self::from_word(u32::from_le_bytes(bytes))
    }

    /// Get the raw 32-bit word
    pub fn raw(&self) -> u32 {
        self.raw
    }

    /// Get the entry type
    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Get the payload bits below the type nibble
    pub fn payload(&self) -> u32 {
        self.raw & layout::PAYLOAD_MASK
    }

    /// The 16-bit bus word carried by command, status, data and error entries
    pub fn word16(&self) -> u16 {
        (self.raw & 0xFFFF) as u16
    }

    /// Bus the entry was observed on, if any
    pub fn bus(&self) -> Option<Bus> {
        self.entry_type.bus()
    }
}
