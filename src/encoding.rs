//! Encoding of bus monitor entries back into the recording format

use crate::core::{BmEntry, Bus, EntryType};
use crate::error::{BmError, Result};
use crate::layout::{ENTRY_SIZE, PAYLOAD_MASK, TYPE_SHIFT};
use crate::words::{CommandWord, ErrorWord, StatusWord, TimeTagHigh, TimeTagLow};

/// Encoder producing recorded words and recording buffers
pub struct EntryEncoder;

impl EntryEncoder {
    /// Build a recorded word as `(type << 28) | payload`
    pub fn encode_word(entry_type: EntryType, payload: u32) -> Result<u32> {
        if let EntryType::Reserved(code) = entry_type {
            if !(0x4..=0x7).contains(&code) {
                return Err(BmError::invalid_field(format!(
                    "Reserved entry type code {:#x} outside [0x4, 0x7]",
                    code
                )));
            }
        }
        if payload & !PAYLOAD_MASK != 0 {
            return Err(BmError::invalid_field(format!(
                "Payload {:#x} exceeds mask {:#x}",
                payload, PAYLOAD_MASK
            )));
        }
        Ok(((entry_type.code() as u32) << TYPE_SHIFT) | payload)
    }

    /// Build an entry from its type and payload
    pub fn entry(entry_type: EntryType, payload: u32) -> Result<BmEntry> {
        Self::encode_word(entry_type, payload).map(BmEntry::from_word)
    }

    /// Build a command word from its fields
    pub fn command_word(
        rt: u8,
        transmit: bool,
        sub_address: u8,
        word_count: u8,
    ) -> Result<CommandWord> {
        check_width("RT address", rt as u32, 5)?;
        check_width("Sub-address", sub_address as u32, 5)?;
        check_width("Word count", word_count as u32, 5)?;

        let mut cw = CommandWord::default();
        cw.set_rt_address(rt);
        cw.set_transmit(transmit);
        cw.set_sub_address(sub_address);
        cw.set_word_count(word_count);
        Ok(cw)
    }

    /// Build a status word from the RT address and flag bits 0..10
    pub fn status_word(rt: u8, flags: u16) -> Result<StatusWord> {
        check_width("RT address", rt as u32, 5)?;
        check_width("Status flags", flags as u32, 11)?;

        let mut sw = StatusWord::default();
        sw.set_rt_address(rt);
        sw.set_flag_bits(flags);
        Ok(sw)
    }

    /// Command word entry; `second` selects the RT-to-RT transmit command
    pub fn command_entry(bus: Bus, second: bool, cw: CommandWord) -> BmEntry {
        let entry_type = match (bus, second) {
            (Bus::Primary, false) => EntryType::CommandWord1Primary,
            (Bus::Primary, true) => EntryType::CommandWord2Primary,
            (Bus::Secondary, false) => EntryType::CommandWord1Secondary,
            (Bus::Secondary, true) => EntryType::CommandWord2Secondary,
        };
        word16_entry(entry_type, cw.raw())
    }

    /// Status word entry
    pub fn status_entry(bus: Bus, sw: StatusWord) -> BmEntry {
        let entry_type = match bus {
            Bus::Primary => EntryType::StatusWordPrimary,
            Bus::Secondary => EntryType::StatusWordSecondary,
        };
        word16_entry(entry_type, sw.raw())
    }

    /// Data word entry with the gap before it in quarter microseconds
    pub fn data_entry(bus: Bus, value: u16, gap_ticks: u16) -> Result<BmEntry> {
        check_width("Gap", gap_ticks as u32, 9)?;
        let entry_type = match bus {
            Bus::Primary => EntryType::DataWordPrimary,
            Bus::Secondary => EntryType::DataWordSecondary,
        };
        Self::entry(entry_type, ((gap_ticks as u32) << 16) | value as u32)
    }

    /// Error word entry
    pub fn error_entry(err: ErrorWord) -> BmEntry {
        word16_entry(EntryType::Error, err.raw())
    }

    /// Time tag high and low entries, in recording order
    pub fn time_tag_entries(
        days: u16,
        hours: u8,
        minutes: u8,
        seconds: u8,
        microseconds: u32,
    ) -> Result<[BmEntry; 2]> {
        check_range("Days", days as u32, 366)?;
        check_range("Hours", hours as u32, 23)?;
        check_range("Minutes", minutes as u32, 59)?;
        check_range("Seconds", seconds as u32, 59)?;
        check_range("Microseconds", microseconds, 999_999)?;

        let mut high = TimeTagHigh::default();
        high.set_days(days);
        high.set_hours(hours);
        high.set_minutes(minutes);

        let mut low = TimeTagLow::default();
        low.set_seconds(seconds);
        low.set_microseconds(microseconds);

        Ok([
            Self::entry(EntryType::TimeTagHigh, high.raw())?,
            Self::entry(EntryType::TimeTagLow, low.raw())?,
        ])
    }

    /// Serialize entries into a recording buffer
    pub fn encode_entries(entries: &[BmEntry]) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(entries.len() * ENTRY_SIZE);
        for entry in entries {
            buffer.extend_from_slice(&entry.raw().to_le_bytes());
        }
        buffer
    }
}

fn word16_entry(entry_type: EntryType, word: u16) -> BmEntry {
    BmEntry::from_word(((entry_type.code() as u32) << TYPE_SHIFT) | word as u32)
}

fn check_width(name: &str, value: u32, bits: u32) -> Result<()> {
    check_range(name, value, (1 << bits) - 1)
}

fn check_range(name: &str, value: u32, max: u32) -> Result<()> {
    if value > max {
        return Err(BmError::invalid_field(format!(
            "{} {} out of range [0, {}]",
            name, value, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_entries;

    #[test]
    fn test_encode_word_roundtrip() -> Result<()> {
        for code in 0u8..16 {
            let entry_type = EntryType::from_code(code);
            for payload in [0, 1, 0x1234, 0x0155_5555, PAYLOAD_MASK] {
                let entry = BmEntry::from_word(EntryEncoder::encode_word(entry_type, payload)?);
                assert_eq!(entry.entry_type(), entry_type);
                assert_eq!(entry.payload(), payload);
            }
        }
        Ok(())
    }

    #[test]
    fn test_encode_word_rejects_wide_payload() {
        let result = EntryEncoder::encode_word(EntryType::Error, PAYLOAD_MASK + 1);
        assert!(matches!(result, Err(BmError::InvalidField(_))));
    }

    #[test]
    fn test_encode_word_rejects_non_reserved_code() -> Result<()> {
        for code in [0x0, 0x3, 0x8, 0xF, 0x15] {
            let result = EntryEncoder::encode_word(EntryType::Reserved(code), 1);
            assert!(matches!(result, Err(BmError::InvalidField(_))));
        }
        for code in 0x4..=0x7 {
            let word = EntryEncoder::encode_word(EntryType::Reserved(code), 1)?;
            assert_eq!(BmEntry::from_word(word).entry_type(), EntryType::Reserved(code));
        }
        Ok(())
    }

    #[test]
    fn test_command_word_fields() -> Result<()> {
        let cw = EntryEncoder::command_word(3, false, 13, 1)?;
        assert_eq!(cw.raw(), 0x19A1);
        assert_eq!(cw.label(), "C03_R_13_01");

        assert!(EntryEncoder::command_word(32, false, 1, 1).is_err());
        assert!(EntryEncoder::command_word(1, true, 1, 32).is_err());
        Ok(())
    }

    #[test]
    fn test_status_word_fields() -> Result<()> {
        let sw = EntryEncoder::status_word(5, 1 << 3)?;
        assert_eq!(sw.raw(), 0x2808);
        assert!(EntryEncoder::status_word(5, 0x800).is_err());
        Ok(())
    }

    #[test]
    fn test_time_tag_entries() -> Result<()> {
        let [high, low] = EntryEncoder::time_tag_entries(2, 3, 4, 1, 500)?;
        assert_eq!(high.raw(), 0x3000_10C4);
        assert_eq!(low.raw(), 0x2010_01F4);
        assert!(EntryEncoder::time_tag_entries(0, 24, 0, 0, 0).is_err());
        Ok(())
    }

    #[test]
    fn test_encode_entries_decodes_back() -> Result<()> {
        let cw = EntryEncoder::command_word(3, false, 13, 1)?;
        let entries = vec![
            EntryEncoder::command_entry(Bus::Secondary, false, cw),
            EntryEncoder::data_entry(Bus::Secondary, 0xBEEF, 8)?,
            EntryEncoder::status_entry(Bus::Secondary, EntryEncoder::status_word(3, 0)?),
            EntryEncoder::error_entry(ErrorWord::from(0x8010)),
        ];

        let buffer = EntryEncoder::encode_entries(&entries);
        assert_eq!(buffer.len(), entries.len() * ENTRY_SIZE);
        assert_eq!(&buffer[..4], &[0xA1, 0x19, 0x00, 0xC0]);

        let decoded: Vec<BmEntry> = decode_entries(&buffer)?.collect();
        assert_eq!(decoded, entries);
        Ok(())
    }
}
