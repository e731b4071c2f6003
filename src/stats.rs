//! Traffic statistics over monitor recordings

use std::collections::BTreeMap;
use std::fmt;

use crate::core::{BmEntry, Bus, EntryType};
use crate::layout::ENTRY_SIZE;
use crate::message::BmMessage;

/// Traffic seen for one Remote Terminal
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RtTraffic {
    /// Address of the RT
    pub address: u8,
    /// Number of messages addressed to or sent by the RT
    pub message_count: u32,
    /// Number of those messages the monitor flagged with an error
    pub error_count: u32,
    /// Number of status words with any flag raised
    pub flagged_status_count: u32,
}

impl RtTraffic {
    /// Create empty traffic counters for an RT
    pub fn new(address: u8) -> Self {
        RtTraffic {
            address,
            ..Default::default()
        }
    }

    /// Error rate (0.0 to 1.0)
    pub fn error_rate(&self) -> f32 {
        if self.message_count > 0 {
            self.error_count as f32 / self.message_count as f32
        } else {
            0.0
        }
    }
}

/// Aggregated statistics for a recording
///
/// Counters are updated incrementally, so one instance can follow a
/// recording delivered over several buffers.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitorStats {
    /// Entry counts indexed by type code
    entries_by_code: [u64; 16],
    /// Number of messages recorded
    pub message_count: u64,
    /// Number of messages missing their command or any follow-up
    pub incomplete_count: u64,
    /// Messages whose first command word was on the primary bus
    pub primary_count: u64,
    /// Messages whose first command word was on the secondary bus
    pub secondary_count: u64,
    /// Messages the monitor flagged with an error
    pub error_message_count: u64,
    /// Per-RT traffic
    rts: BTreeMap<u8, RtTraffic>,
}

impl MonitorStats {
    /// Create empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Build entry statistics from a sequence of entries
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = BmEntry>,
    {
        let mut stats = Self::new();
        stats.record_entries(entries);
        stats
    }

    /// Build message statistics from a sequence of messages
    pub fn from_messages<'a, I>(messages: I) -> Self
    where
        I: IntoIterator<Item = &'a BmMessage>,
    {
        let mut stats = Self::new();
        for message in messages {
            stats.record_message(message);
        }
        stats
    }

    /// Count one entry
    pub fn record_entry(&mut self, entry: &BmEntry) {
        let entry_type = entry.entry_type();
        if let EntryType::Reserved(code) = entry_type {
            log::debug!("counting reserved entry type {:#x}", code);
        }
        self.entries_by_code[entry_type.code() as usize] += 1;
    }

    /// Count a sequence of entries
    pub fn record_entries<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = BmEntry>,
    {
        for entry in entries {
            self.record_entry(&entry);
        }
    }

    /// Count one message and attribute it to the RTs involved
    pub fn record_message(&mut self, message: &BmMessage) {
        self.message_count += 1;
        if !message.is_complete() {
            self.incomplete_count += 1;
        }
        match message.bus {
            Some(Bus::Primary) => self.primary_count += 1,
            Some(Bus::Secondary) => self.secondary_count += 1,
            None => {}
        }

        let has_error = message.has_error();
        if has_error {
            self.error_message_count += 1;
        }

        for address in message.rt_addresses() {
            let rt = self
                .rts
                .entry(address)
                .or_insert_with(|| RtTraffic::new(address));
            rt.message_count += 1;
            if has_error {
                rt.error_count += 1;
            }
        }

        for status in &message.status {
            if status.is_clear() {
                continue;
            }
            let address = status.rt_address();
            self.rts
                .entry(address)
                .or_insert_with(|| RtTraffic::new(address))
                .flagged_status_count += 1;
        }
    }

    /// Number of entries of a given type
    pub fn entry_count(&self, entry_type: EntryType) -> u64 {
        self.entries_by_code[entry_type.code() as usize]
    }

    /// Total number of entries counted
    pub fn total_entries(&self) -> u64 {
        self.entries_by_code.iter().sum()
    }

    /// Size of the counted entries in bytes
    pub fn total_bytes(&self) -> u64 {
        self.total_entries() * ENTRY_SIZE as u64
    }

    /// Traffic for an RT, if it was seen
    pub fn rt(&self, address: u8) -> Option<&RtTraffic> {
        self.rts.get(&address)
    }

    /// Traffic for all RTs seen, by ascending address
    pub fn rts(&self) -> impl Iterator<Item = &RtTraffic> {
        self.rts.values()
    }

    /// Error rate over all messages (0.0 to 1.0)
    pub fn error_rate(&self) -> f32 {
        if self.message_count > 0 {
            self.error_message_count as f32 / self.message_count as f32
        } else {
            0.0
        }
    }
}

impl fmt::Display for MonitorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Monitor received {:.2} KB with {} transfers",
            self.total_bytes() as f64 / 1024.0,
            self.message_count
        )
    }
}
