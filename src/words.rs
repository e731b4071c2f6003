//! Typed views of bus monitor entry payloads
//!
//! Every recorded entry carries either a 16-bit bus word (command, status,
//! data, error) or a time tag. The types here decode those payloads into
//! named fields and render the labels used by the monitor display.

use bitfield::bitfield;
use std::fmt;

use crate::layout;

/// Mode code subaddresses (0 and 31 both select mode codes)
const MODE_CODE_SUBADDRESSES: [u8; 2] = [0, 31];

bitfield! {
    /// A MIL-STD-1553B command word as recorded by the monitor
    ///
    /// Format:
    /// - Bits 15-11: RT address
    /// - Bit 10: Transmit/Receive flag (1 = transmit)
    /// - Bits 9-5: Subaddress or mode code indicator
    /// - Bits 4-0: Word count, or mode code when the subaddress is 0 or 31
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CommandWord(u16);
    impl Debug;
    pub u8, rt_address, set_rt_address: 15, 11;
    pub bool, transmit, set_transmit: 10;
    pub u8, sub_address, set_sub_address: 9, 5;
    pub u8, word_count, set_word_count: 4, 0;
}

impl From<u16> for CommandWord {
    fn from(raw: u16) -> Self {
        CommandWord(raw)
    }
}

impl CommandWord {
    /// Get the raw 16-bit word
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// Check if the subaddress field selects a mode code
    pub fn is_mode_code(&self) -> bool {
        MODE_CODE_SUBADDRESSES.contains(&self.sub_address())
    }

    /// Mode code number, if this is a mode command
    pub fn mode_code(&self) -> Option<u8> {
        if self.is_mode_code() {
            Some(self.word_count())
        } else {
            None
        }
    }

    /// Check if the command is addressed to the broadcast RT (31)
    pub fn is_broadcast(&self) -> bool {
        self.rt_address() == layout::BROADCAST_ADDRESS
    }

    /// Number of data words the transfer carries
    ///
    /// A word count field of 0 means 32 words. Mode codes 16..31 carry a
    /// single data word, the others none.
    pub fn data_word_count(&self) -> usize {
        match self.mode_code() {
            Some(code) if code >= 16 => 1,
            Some(_) => 0,
            None if self.word_count() == 0 => 32,
            None => self.word_count() as usize,
        }
    }

    /// Canonical label `C<rt>_<R|T>_<sa>_<wc>`, or `N/A` for an empty word
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CommandWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("N/A");
        }
        write!(
            f,
            "C{:02}_{}_{:02}_{:02}",
            self.rt_address(),
            if self.transmit() { 'T' } else { 'R' },
            self.sub_address(),
            self.word_count()
        )
    }
}

bitfield! {
    /// A MIL-STD-1553B status word as recorded by the monitor
    ///
    /// Format:
    /// - Bits 15-11: RT address
    /// - Bit 10: Message error
    /// - Bit 9: Instrumentation
    /// - Bit 8: Service request
    /// - Bits 7-5: Reserved
    /// - Bit 4: Broadcast command received
    /// - Bit 3: Busy
    /// - Bit 2: Subsystem flag
    /// - Bit 1: Dynamic bus control acceptance
    /// - Bit 0: Terminal flag
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StatusWord(u16);
    impl Debug;
    pub u8, rt_address, set_rt_address: 15, 11;
    pub u16, flag_bits, set_flag_bits: 10, 0;
    pub bool, message_error, set_message_error: 10;
    pub bool, instrumentation, set_instrumentation: 9;
    pub bool, service_request, set_service_request: 8;
    pub u8, reserved, set_reserved: 7, 5;
    pub bool, broadcast_received, set_broadcast_received: 4;
    pub bool, busy, set_busy: 3;
    pub bool, subsystem_flag, set_subsystem_flag: 2;
    pub bool, dynamic_bus_control, set_dynamic_bus_control: 1;
    pub bool, terminal_flag, set_terminal_flag: 0;
}

/// Status flag suffixes in ascending bit order
const STATUS_SUFFIXES: [&str; 11] = [
    "_TF", "_DBCA", "_SSF", "_BUSY", "_BCR", "_RES1", "_RES2", "_RES3", "_SRQ", "_INST", "_ME",
];

impl From<u16> for StatusWord {
    fn from(raw: u16) -> Self {
        StatusWord(raw)
    }
}

impl StatusWord {
    /// Get the raw 16-bit word
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// Check if no status flag is raised ("clear status")
    pub fn is_clear(&self) -> bool {
        self.flag_bits() == 0
    }

    /// Label `S<rt>` followed by `_CS` or the raised flag suffixes
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}", self.rt_address())?;
        if self.is_clear() {
            return f.write_str("_CS");
        }
        let flags = self.flag_bits();
        for (bit, suffix) in STATUS_SUFFIXES.iter().enumerate() {
            if flags & (1 << bit) != 0 {
                f.write_str(suffix)?;
            }
        }
        Ok(())
    }
}

/// A single condition reported by a monitor error word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorFlag {
    /// General error indication (bit 15)
    Error,
    /// Error on the alternate bus (bit 14)
    AlternateBus,
    /// Fewer data words than commanded (bit 13)
    WordCountLow,
    /// More data words than commanded (bit 12)
    WordCountHigh,
    /// Status word exception (bit 11)
    StatusWord,
    /// Status word address mismatch (bit 10)
    Address,
    /// Response before the minimum gap time (bit 9)
    EarlyResponse,
    /// Illegal command word (bit 8)
    IllegalCommand,
    /// Activity on both buses (bit 7)
    BothBuses,
    /// Inter-word gap (bit 6)
    Gap,
    /// Invalid sync (bit 5)
    InvalidSync,
    /// Parity error (bit 4)
    Parity,
    /// Too few bits in a word (bit 3)
    BitCountLow,
    /// Too many bits in a word (bit 2)
    BitCountHigh,
    /// Manchester encoding error (bit 1)
    Manchester,
    /// No response from the RT (bit 0)
    NoResponse,
}

impl ErrorFlag {
    /// All flags in descending bit order, the display order
    pub const ALL: [ErrorFlag; 16] = [
        ErrorFlag::Error,
        ErrorFlag::AlternateBus,
        ErrorFlag::WordCountLow,
        ErrorFlag::WordCountHigh,
        ErrorFlag::StatusWord,
        ErrorFlag::Address,
        ErrorFlag::EarlyResponse,
        ErrorFlag::IllegalCommand,
        ErrorFlag::BothBuses,
        ErrorFlag::Gap,
        ErrorFlag::InvalidSync,
        ErrorFlag::Parity,
        ErrorFlag::BitCountLow,
        ErrorFlag::BitCountHigh,
        ErrorFlag::Manchester,
        ErrorFlag::NoResponse,
    ];

    /// Classification order when a message reports a single error
    pub const PRIORITY: [ErrorFlag; 15] = [
        ErrorFlag::NoResponse,
        ErrorFlag::Manchester,
        ErrorFlag::BitCountHigh,
        ErrorFlag::BitCountLow,
        ErrorFlag::Parity,
        ErrorFlag::InvalidSync,
        ErrorFlag::Gap,
        ErrorFlag::BothBuses,
        ErrorFlag::IllegalCommand,
        ErrorFlag::EarlyResponse,
        ErrorFlag::Address,
        ErrorFlag::StatusWord,
        ErrorFlag::WordCountHigh,
        ErrorFlag::WordCountLow,
        ErrorFlag::AlternateBus,
    ];

    /// Bit position within the error word
    pub fn bit(&self) -> u8 {
        15 - ErrorFlag::ALL
            .iter()
            .position(|flag| flag == self)
            .unwrap_or_default() as u8
    }

    /// Mask of this flag within the error word
    pub fn mask(&self) -> u16 {
        1 << self.bit()
    }

    /// Label fragment; the general error bit has no leading underscore
    pub fn mnemonic(&self) -> &'static str {
        match self {
            ErrorFlag::Error => "E",
            ErrorFlag::AlternateBus => "_AlternateBus",
            ErrorFlag::WordCountLow => "_WordCountLow",
            ErrorFlag::WordCountHigh => "_WordCountHigh",
            ErrorFlag::StatusWord => "_SW",
            ErrorFlag::Address => "_Address",
            ErrorFlag::EarlyResponse => "_EarlyResp",
            ErrorFlag::IllegalCommand => "_IllegalCW",
            ErrorFlag::BothBuses => "_BothBusses",
            ErrorFlag::Gap => "_Gap",
            ErrorFlag::InvalidSync => "_InvSync",
            ErrorFlag::Parity => "_Parity",
            ErrorFlag::BitCountLow => "_BitCountLow",
            ErrorFlag::BitCountHigh => "_BitCountHigh",
            ErrorFlag::Manchester => "_Manchester",
            ErrorFlag::NoResponse => "_NoResp",
        }
    }
}

impl fmt::Display for ErrorFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic().trim_start_matches('_'))
    }
}

/// Error word recorded by the monitor, a 16-bit flag set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorWord(u16);

impl From<u16> for ErrorWord {
    fn from(raw: u16) -> Self {
        ErrorWord(raw)
    }
}

impl ErrorWord {
    /// Get the raw 16-bit word
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// Check if a flag is set
    pub fn contains(&self, flag: ErrorFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    /// Set flags in descending bit order
    pub fn flags(&self) -> impl Iterator<Item = ErrorFlag> + '_ {
        ErrorFlag::ALL.iter().copied().filter(|flag| self.contains(*flag))
    }

    /// The single flag a message is classified by, if any
    pub fn primary_flag(&self) -> Option<ErrorFlag> {
        ErrorFlag::PRIORITY
            .iter()
            .copied()
            .find(|flag| self.contains(*flag))
    }

    /// Label made of the set flags' mnemonics, e.g. `E_Parity_NoResp`
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ErrorWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in self.flags() {
            f.write_str(flag.mnemonic())?;
        }
        Ok(())
    }
}

bitfield! {
    /// Time tag low: bits 25-20 seconds, bits 19-0 microseconds
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TimeTagLow(u32);
    impl Debug;
    pub u8, seconds, set_seconds: 25, 20;
    pub u32, microseconds, set_microseconds: 19, 0;
}

impl From<u32> for TimeTagLow {
    fn from(payload: u32) -> Self {
        TimeTagLow(payload & layout::PAYLOAD_MASK)
    }
}

impl TimeTagLow {
    /// Get the raw 26-bit time tag low payload
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimeTagLow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}.{:06}s", self.seconds(), self.microseconds())
    }
}

bitfield! {
    /// Time tag high: bits 19-11 days, bits 10-6 hours, bits 5-0 minutes
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct TimeTagHigh(u32);
    impl Debug;
    pub u16, days, set_days: 19, 11;
    pub u8, hours, set_hours: 10, 6;
    pub u8, minutes, set_minutes: 5, 0;
}

impl From<u32> for TimeTagHigh {
    fn from(payload: u32) -> Self {
        TimeTagHigh(payload & layout::PAYLOAD_MASK)
    }
}

impl TimeTagHigh {
    /// Get the raw 26-bit time tag high payload
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimeTagHigh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}d:{:02}h:{:02}m",
            self.days(),
            self.hours(),
            self.minutes()
        )
    }
}

/// Complete time tag assembled from a high and a low entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeTag {
    pub high: TimeTagHigh,
    pub low: TimeTagLow,
}

impl TimeTag {
    /// Time since the start of the year in microseconds
    pub fn as_micros(&self) -> u64 {
        let minutes = self.high.days() as u64 * 24 * 60
            + self.high.hours() as u64 * 60
            + self.high.minutes() as u64;
        (minutes * 60 + self.low.seconds() as u64) * 1_000_000 + self.low.microseconds() as u64
    }
}

impl fmt::Display for TimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.high, self.low)
    }
}

/// Data word with the gap measured before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataWord {
    /// 16-bit data value
    pub value: u16,
    /// Gap in quarter microseconds (9 bits)
    pub gap_ticks: u16,
}

impl DataWord {
    /// Split a data entry payload into value and gap
    pub fn from_payload(payload: u32) -> Self {
        DataWord {
            value: (payload & 0xFFFF) as u16,
            gap_ticks: ((payload >> 16) & 0x1FF) as u16,
        }
    }

    /// Gap before the word in microseconds
    pub fn gap_us(&self) -> f64 {
        self.gap_ticks as f64 * layout::GAP_RESOLUTION_US
    }
}
