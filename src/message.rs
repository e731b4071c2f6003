//! Bus transactions reconstructed from monitor entries

use std::fmt;
use std::mem;

use crate::core::{BmEntry, Bus, EntryType};
use crate::words::{
    CommandWord, DataWord, ErrorFlag, ErrorWord, StatusWord, TimeTag, TimeTagHigh, TimeTagLow,
};

/// Data words per row in a message listing
const DATA_WORDS_PER_ROW: usize = 8;

/// Kind of bus transfer a message represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferKind {
    /// Bus controller sends data to a remote terminal
    BcToRt { rt: u8, sub_address: u8 },
    /// Remote terminal sends data to the bus controller
    RtToBc { rt: u8, sub_address: u8 },
    /// One remote terminal sends data to another
    RtToRt {
        tx_rt: u8,
        tx_sub_address: u8,
        rx_rt: u8,
        rx_sub_address: u8,
    },
    /// Mode command
    ModeCode { rt: u8, code: u8 },
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::BcToRt { rt, sub_address } => {
                write!(f, "BC to RT{} SA{}", rt, sub_address)
            }
            TransferKind::RtToBc { rt, sub_address } => {
                write!(f, "RT{} SA{} to BC", rt, sub_address)
            }
            TransferKind::RtToRt {
                tx_rt,
                tx_sub_address,
                rx_rt,
                rx_sub_address,
            } => write!(
                f,
                "RT{} SA{} to RT{} SA{}",
                tx_rt, tx_sub_address, rx_rt, rx_sub_address
            ),
            TransferKind::ModeCode { rt, code } => write!(f, "RT{} MC{}", rt, code),
        }
    }
}

/// A bus transaction rebuilt from a run of monitor entries
///
/// Any field may be missing when the recording was truncated or the
/// transfer failed; see [`BmMessage::is_complete`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BmMessage {
    /// Bus of the first command word
    pub bus: Option<Bus>,
    /// First command word
    pub command: Option<CommandWord>,
    /// Second command word (transmit side of an RT-to-RT transfer)
    pub command2: Option<CommandWord>,
    /// Data words in arrival order
    pub data: Vec<DataWord>,
    /// Status words in arrival order (two for RT-to-RT)
    pub status: Vec<StatusWord>,
    /// Error words reported by the monitor
    pub errors: Vec<ErrorWord>,
    pub time_tag_high: Option<TimeTagHigh>,
    pub time_tag_low: Option<TimeTagLow>,
}

impl BmMessage {
    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.command.is_none()
            && self.command2.is_none()
            && self.data.is_empty()
            && self.status.is_empty()
            && self.errors.is_empty()
            && self.time_tag_high.is_none()
            && self.time_tag_low.is_none()
    }

    /// A command word followed by data, status or error content
    pub fn is_complete(&self) -> bool {
        self.command.is_some()
            && (!self.data.is_empty() || !self.status.is_empty() || !self.errors.is_empty())
    }

    /// Full time tag, when both halves were recorded
    pub fn time_tag(&self) -> Option<TimeTag> {
        match (self.time_tag_high, self.time_tag_low) {
            (Some(high), Some(low)) => Some(TimeTag { high, low }),
            _ => None,
        }
    }

    /// Classify the transfer from its command words
    pub fn transfer_kind(&self) -> Option<TransferKind> {
        let command = self.command?;

        if let Some(transmit) = self.command2 {
            return Some(TransferKind::RtToRt {
                tx_rt: transmit.rt_address(),
                tx_sub_address: transmit.sub_address(),
                rx_rt: command.rt_address(),
                rx_sub_address: command.sub_address(),
            });
        }

        let rt = command.rt_address();
        let kind = match command.mode_code() {
            Some(code) => TransferKind::ModeCode { rt, code },
            None if command.transmit() => TransferKind::RtToBc {
                rt,
                sub_address: command.sub_address(),
            },
            None => TransferKind::BcToRt {
                rt,
                sub_address: command.sub_address(),
            },
        };
        Some(kind)
    }

    /// All error flags reported for the message, merged
    pub fn error_word(&self) -> ErrorWord {
        ErrorWord::from(self.errors.iter().fold(0u16, |acc, err| acc | err.raw()))
    }

    /// Check if the monitor reported any error
    pub fn has_error(&self) -> bool {
        self.error_word().raw() != 0
    }

    /// The error the message is classified by
    pub fn error_code(&self) -> Option<ErrorFlag> {
        self.error_word().primary_flag()
    }

    /// RT addresses taking part in the transfer
    pub fn rt_addresses(&self) -> Vec<u8> {
        let mut addresses: Vec<u8> = self
            .command
            .iter()
            .chain(self.command2.iter())
            .map(|cw| cw.rt_address())
            .collect();
        addresses.dedup();
        addresses
    }
}

impl fmt::Display for BmMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TT: {} {} ",
            self.time_tag_high.unwrap_or_default(),
            self.time_tag_low.unwrap_or_default()
        )?;

        match self.transfer_kind() {
            Some(kind) => write!(f, "{}", kind)?,
            None => f.write_str("no command")?,
        }

        for row in self.data.chunks(DATA_WORDS_PER_ROW) {
            f.write_str("\n")?;
            for word in row {
                write!(f, "0x{:04X}, ", word.value)?;
            }
        }

        if let Some(flag) = self.error_code() {
            write!(f, "\nError: {}", flag)?;
        }
        Ok(())
    }
}

/// Group entries into messages with the lenient default policy
pub fn group_into_messages<I>(entries: I) -> Vec<BmMessage>
where
    I: IntoIterator<Item = BmEntry>,
{
    MessageGrouper::new().group(entries)
}

/// Stateful forward scan rebuilding bus transactions from entries
///
/// A first command word opens a message. Data, status and second command
/// words attach to the open message. Time tags precede the command word they
/// belong to, so they are held back and handed to the next message; error
/// words attach to the open message unless the next one has already started
/// collecting metadata.
///
/// Entries can be pushed across several buffers; call
/// [`MessageGrouper::finish`] after the last one.
#[derive(Debug, Default)]
pub struct MessageGrouper {
    strict: bool,
    current: Option<BmMessage>,
    pending: BmMessage,
    orphans: usize,
}

impl MessageGrouper {
    /// Create a lenient grouper
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop incomplete messages instead of emitting them
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Number of data, status or second command words seen outside a message
    pub fn orphans(&self) -> usize {
        self.orphans
    }

    /// Feed one entry; returns a message when the entry closes one
    pub fn push(&mut self, entry: BmEntry) -> Option<BmMessage> {
        let entry_type = entry.entry_type();

        match entry_type {
            t if t.is_command_word_1() => {
                let mut next = mem::take(&mut self.pending);
                next.bus = entry.bus();
                next.command = Some(CommandWord::from(entry.word16()));
                self.current
                    .replace(next)
                    .and_then(|previous| self.accept(previous))
            }
            t if t.is_command_word_2() => {
                match self.current.as_mut() {
                    Some(message) => message.command2 = Some(CommandWord::from(entry.word16())),
                    None => self.orphan(entry),
                }
                None
            }
            t if t.is_data_word() => {
                match self.current.as_mut() {
                    Some(message) => message.data.push(DataWord::from_payload(entry.payload())),
                    None => self.orphan(entry),
                }
                None
            }
            t if t.is_status_word() => {
                match self.current.as_mut() {
                    Some(message) => message.status.push(StatusWord::from(entry.word16())),
                    None => self.orphan(entry),
                }
                None
            }
            EntryType::Error => {
                let err = ErrorWord::from(entry.word16());
                match self.current.as_mut() {
                    Some(message) if self.pending.is_empty() => message.errors.push(err),
                    _ => self.pending.errors.push(err),
                }
                None
            }
            EntryType::TimeTagHigh => {
                // a second time tag high before any command closes the
                // metadata-only message collected so far
                let closed = if self.pending.time_tag_high.is_some() {
                    let previous = mem::take(&mut self.pending);
                    self.accept(previous)
                } else {
                    None
                };
                self.pending.time_tag_high = Some(TimeTagHigh::from(entry.payload()));
                closed
            }
            EntryType::TimeTagLow => {
                self.pending.time_tag_low = Some(TimeTagLow::from(entry.payload()));
                None
            }
            _ => {
                log::trace!("skipping {} entry {:#010x}", entry_type, entry.raw());
                None
            }
        }
    }

    /// Flush the open message and any pending metadata
    pub fn finish(&mut self) -> Vec<BmMessage> {
        let mut out = Vec::new();
        if let Some(message) = self.current.take() {
            out.extend(self.accept(message));
        }
        let pending = mem::take(&mut self.pending);
        if !pending.is_empty() {
            out.extend(self.accept(pending));
        }
        out
    }

    /// Group a complete sequence of entries
    pub fn group<I>(mut self, entries: I) -> Vec<BmMessage>
    where
        I: IntoIterator<Item = BmEntry>,
    {
        let mut messages: Vec<BmMessage> = entries
            .into_iter()
            .filter_map(|entry| self.push(entry))
            .collect();
        messages.extend(self.finish());
        log::debug!(
            "grouped {} messages ({} orphan entries)",
            messages.len(),
            self.orphans
        );
        messages
    }

    fn accept(&self, message: BmMessage) -> Option<BmMessage> {
        if self.strict && !message.is_complete() {
            log::debug!("dropping incomplete message: {:?}", message.command);
            return None;
        }
        Some(message)
    }

    fn orphan(&mut self, entry: BmEntry) {
        self.orphans += 1;
        log::trace!(
            "{} entry {:#010x} outside a message",
            entry.entry_type(),
            entry.raw()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(words: &[u32]) -> Vec<BmEntry> {
        words.iter().map(|w| BmEntry::from_word(*w)).collect()
    }

    // RT 3 receive SA 13, two words; then status from RT 3
    const TRANSACTION: [u32; 4] = [0x8000_19A2, 0xA004_0001, 0xA004_0002, 0xB000_1800];

    #[test]
    fn test_group_repeated_transactions() {
        for n in 1..5 {
            let words: Vec<u32> = TRANSACTION.iter().copied().cycle().take(4 * n).collect();
            let messages = group_into_messages(entries(&words));
            assert_eq!(messages.len(), n);
            for message in &messages {
                assert!(message.command.is_some());
                assert_eq!(message.status.len(), 1);
                assert_eq!(message.data.len(), 2);
                assert!(message.is_complete());
            }
        }
    }

    #[test]
    fn test_time_tags_belong_to_next_command() {
        let words = [
            0x3000_0001, // TTHIGH minute 1
            0x2000_0010, // TTLOW
            0x8000_19A2,
            0xA004_0001,
            0xB000_1800,
            0x3000_0002, // TTHIGH minute 2
            0x2000_0020,
            0x8000_2C20, // RT 5 transmit SA 1
            0xB000_2800,
        ];
        let messages = group_into_messages(entries(&words));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].time_tag_high.map(|t| t.minutes()), Some(1));
        assert_eq!(messages[0].time_tag_low.map(|t| t.raw()), Some(0x10));
        assert_eq!(messages[1].time_tag_high.map(|t| t.minutes()), Some(2));
        assert!(messages[1].time_tag().is_some());
    }

    #[test]
    fn test_errors_attach_as_metadata() {
        // RT 1 transmit, no response
        let words = [0x3000_0000, 0x2000_0000, 0x8000_0C21, 0x1000_8001];
        let messages = group_into_messages(entries(&words));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].has_error());
        assert_eq!(messages[0].error_code(), Some(ErrorFlag::NoResponse));
        assert_eq!(
            messages[0].transfer_kind(),
            Some(TransferKind::RtToBc { rt: 1, sub_address: 1 })
        );
    }

    #[test]
    fn test_truncated_trailing_message() {
        let mut words = TRANSACTION.to_vec();
        words.extend([0x3000_0000, 0x2000_0000, 0x8000_19A2]);

        let lenient = group_into_messages(entries(&words));
        assert_eq!(lenient.len(), 2);
        assert!(lenient[1].command.is_some());
        assert!(!lenient[1].is_complete());

        let strict = MessageGrouper::new().strict(true).group(entries(&words));
        assert_eq!(strict.len(), 1);
    }

    #[test]
    fn test_bare_command_closed_by_next() {
        // broadcast synchronize mode code has no data and no status
        let mut words = vec![0x8000_F801];
        words.extend(TRANSACTION);

        let lenient = group_into_messages(entries(&words));
        assert_eq!(lenient.len(), 2);
        assert!(lenient[0].command.map(|cw| cw.is_broadcast()).unwrap_or(false));

        let strict = MessageGrouper::new().strict(true).group(entries(&words));
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].status.len(), 1);
    }

    #[test]
    fn test_trailing_metadata_only() {
        let mut words = TRANSACTION.to_vec();
        words.extend([0x3000_0000, 0x2000_0000]);

        let lenient = group_into_messages(entries(&words));
        assert_eq!(lenient.len(), 2);
        assert!(lenient[1].command.is_none());
        assert!(!lenient[1].is_complete());

        let strict = MessageGrouper::new().strict(true).group(entries(&words));
        assert_eq!(strict.len(), 1);
    }

    #[test]
    fn test_orphans_before_first_command() {
        let mut words = vec![0xA004_0001, 0xB000_1800];
        words.extend(TRANSACTION);

        let mut grouper = MessageGrouper::new();
        let mut messages: Vec<BmMessage> =
            entries(&words).into_iter().filter_map(|e| grouper.push(e)).collect();
        messages.extend(grouper.finish());

        assert_eq!(messages.len(), 1);
        assert_eq!(grouper.orphans(), 2);
    }

    #[test]
    fn test_second_command_before_first_is_orphan() {
        let mut words = vec![0x9000_3D21]; // CW2: RT7 T SA9 WC1
        words.extend(TRANSACTION);

        let mut grouper = MessageGrouper::new();
        let mut messages: Vec<BmMessage> =
            entries(&words).into_iter().filter_map(|e| grouper.push(e)).collect();
        messages.extend(grouper.finish());

        assert_eq!(grouper.orphans(), 1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].command2, None);
        assert_eq!(
            messages[0].transfer_kind(),
            Some(TransferKind::BcToRt { rt: 3, sub_address: 13 })
        );
    }

    #[test]
    fn test_error_after_next_time_tag_goes_to_next_message() {
        let words = [
            0x3000_0000, // TTHIGH
            0x2000_0000, // TTLOW
            0x8000_19A1, // RT 3 receive SA 13, one word
            0xA004_0001,
            0xB000_1800,
            0x3000_0001, // TTHIGH of the next message
            0x1000_8001, // error recorded with the next message's metadata
            0x2000_0000,
            0x8000_2C20, // RT 5 transmit SA 1
        ];
        let messages = group_into_messages(entries(&words));

        assert_eq!(messages.len(), 2);
        assert!(messages[0].errors.is_empty());
        assert!(!messages[0].has_error());
        assert_eq!(messages[1].errors.len(), 1);
        assert_eq!(messages[1].error_code(), Some(ErrorFlag::NoResponse));
        assert_eq!(messages[1].time_tag_high.map(|t| t.minutes()), Some(1));
    }

    #[test]
    fn test_rt_to_rt() {
        // RT 2 receive SA 4 from RT 7 transmit SA 9, one word
        let words = [
            0x8000_1081, // CW1: RT2 R SA4 WC1
            0x9000_3D21, // CW2: RT7 T SA9 WC1
            0xB000_3800, // SW RT7
            0xA004_ABCD,
            0xB000_1000, // SW RT2
        ];
        let messages = group_into_messages(entries(&words));
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.status.len(), 2);
        assert_eq!(message.rt_addresses(), vec![2, 7]);
        assert_eq!(
            message.transfer_kind(),
            Some(TransferKind::RtToRt {
                tx_rt: 7,
                tx_sub_address: 9,
                rx_rt: 2,
                rx_sub_address: 4,
            })
        );
        assert_eq!(
            message.transfer_kind().map(|k| k.to_string()),
            Some("RT7 SA9 to RT2 SA4".to_string())
        );
    }

    #[test]
    fn test_mode_code_and_secondary_bus() {
        // secondary bus, RT 4 transmit mode code 2
        let words = [0xC000_2402, 0xF000_2000];
        let messages = group_into_messages(entries(&words));
        assert_eq!(messages[0].bus, Some(Bus::Secondary));
        assert_eq!(
            messages[0].transfer_kind(),
            Some(TransferKind::ModeCode { rt: 4, code: 2 })
        );
    }

    #[test]
    fn test_invalid_and_reserved_ignored() {
        let mut words = vec![0x0000_0000, 0x4000_0001];
        words.extend(TRANSACTION);
        words.push(0x7000_0000);
        let messages = group_into_messages(entries(&words));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data.len(), 2);
    }

    #[test]
    fn test_message_display() {
        let mut words = vec![0x3000_0000, 0x2000_0000 | (1 << 20) | 500];
        words.extend(TRANSACTION);
        let messages = group_into_messages(entries(&words));
        assert_eq!(
            messages[0].to_string(),
            "TT: 000d:00h:00m 01.000500s BC to RT3 SA13\n0x0001, 0x0002, "
        );
    }
}
