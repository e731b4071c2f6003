use milstd1553b_bm::{
    decode_entries, BmEntry, BmError, Bus, Decoder, DecoderBuilder, EntryEncoder, EntryType,
    ErrorFlag, ErrorWord, MessageGrouper, MonitorStats, Result, TransferKind,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// BC to RT3 SA13 with `words` data words, RT3 answers with a clear status
fn bc_to_rt(minute: u8, words: u16) -> Result<Vec<BmEntry>> {
    let mut entries = EntryEncoder::time_tag_entries(0, 0, minute, 0, 0)?.to_vec();
    let cw = EntryEncoder::command_word(3, false, 13, words as u8)?;
    entries.push(EntryEncoder::command_entry(Bus::Primary, false, cw));
    for value in 0..words {
        entries.push(EntryEncoder::data_entry(Bus::Primary, value, 4)?);
    }
    entries.push(EntryEncoder::status_entry(
        Bus::Primary,
        EntryEncoder::status_word(3, 0)?,
    ));
    Ok(entries)
}

/// RT5 SA1 to BC on the secondary bus, RT5 never answers
fn rt_to_bc_no_response(minute: u8) -> Result<Vec<BmEntry>> {
    let mut entries = EntryEncoder::time_tag_entries(0, 0, minute, 0, 0)?.to_vec();
    let cw = EntryEncoder::command_word(5, true, 1, 2)?;
    entries.push(EntryEncoder::command_entry(Bus::Secondary, false, cw));
    entries.push(EntryEncoder::error_entry(ErrorWord::from(
        ErrorFlag::Error.mask() | ErrorFlag::NoResponse.mask(),
    )));
    Ok(entries)
}

fn recording() -> Result<Vec<u8>> {
    let mut entries = Vec::new();
    entries.extend(bc_to_rt(1, 2)?);
    entries.extend(rt_to_bc_no_response(2)?);
    entries.extend(bc_to_rt(3, 4)?);
    Ok(EntryEncoder::encode_entries(&entries))
}

#[test]
fn decode_recording_end_to_end() -> Result<()> {
    init_logger();
    let buffer = recording()?;

    let entries: Vec<BmEntry> = decode_entries(&buffer)?.collect();
    assert_eq!(entries.len(), buffer.len() / 4);
    assert_eq!(entries[2].entry_type(), EntryType::CommandWord1Primary);

    let messages = Decoder::new().messages(&buffer)?;
    assert_eq!(messages.len(), 3);

    assert_eq!(
        messages[0].transfer_kind(),
        Some(TransferKind::BcToRt { rt: 3, sub_address: 13 })
    );
    assert_eq!(messages[0].data.len(), 2);
    assert_eq!(messages[0].time_tag_high.map(|t| t.minutes()), Some(1));

    assert_eq!(messages[1].bus, Some(Bus::Secondary));
    assert_eq!(messages[1].error_code(), Some(ErrorFlag::NoResponse));
    assert_eq!(messages[1].time_tag_high.map(|t| t.minutes()), Some(2));

    assert_eq!(messages[2].data.len(), 4);
    assert_eq!(messages[2].status[0].label(), "S03_CS");
    Ok(())
}

#[test]
fn dump_recording() -> Result<()> {
    init_logger();
    let buffer = recording()?;
    let dump = Decoder::new().dump(&buffer)?;

    assert_eq!(dump.matches("---------------").count(), 3);
    assert!(dump.contains("CW1_PRI: 0x19A2 (C03_R_13_02)"));
    assert!(dump.contains("CW1_SEC: 0x2C22 (C05_T_01_02)"));
    assert!(dump.contains("ERROR:   0x8001 (E_NoResp)"));
    assert!(dump.contains("DW_PRI:  0x0003 (1.00 us)"));
    Ok(())
}

#[test]
fn statistics_over_recording() -> Result<()> {
    init_logger();
    let buffer = recording()?;

    let mut stats = MonitorStats::from_entries(decode_entries(&buffer)?);
    for message in Decoder::new().messages(&buffer)? {
        stats.record_message(&message);
    }

    assert_eq!(stats.total_bytes(), buffer.len() as u64);
    assert_eq!(stats.entry_count(EntryType::TimeTagHigh), 3);
    assert_eq!(stats.message_count, 3);
    assert_eq!(stats.error_message_count, 1);
    assert_eq!(stats.rt(3).map(|rt| rt.message_count), Some(2));
    assert_eq!(stats.rt(5).map(|rt| rt.error_rate()), Some(1.0));
    Ok(())
}

#[test]
fn grouping_across_buffers() -> Result<()> {
    init_logger();
    let buffer = recording()?;
    // split in the middle of the second message
    let (first, second) = buffer.split_at(4 * 8);

    let mut grouper = MessageGrouper::new();
    let mut messages = Vec::new();
    for block in [first, second] {
        messages.extend(decode_entries(block)?.filter_map(|e| grouper.push(e)));
    }
    messages.extend(grouper.finish());

    assert_eq!(messages, Decoder::new().messages(&buffer)?);
    Ok(())
}

#[test]
fn rejects_malformed_and_empty_buffers() {
    init_logger();
    let mut buffer = recording().unwrap();
    buffer.pop();

    assert!(matches!(
        decode_entries(&buffer),
        Err(BmError::MalformedBuffer { .. })
    ));
    assert!(matches!(
        Decoder::new().dump(&[]),
        Err(BmError::EmptyBuffer(_))
    ));
    assert_eq!(
        DecoderBuilder::new().allow_empty(true).build().dump(&[]),
        Ok(String::new())
    );
}

#[test]
fn strict_grouping_drops_truncated_tail() -> Result<()> {
    init_logger();
    let mut buffer = recording()?;
    // keep only the time tags and command word of the last message
    buffer.truncate(buffer.len() - 4 * 5);

    let lenient = Decoder::new().messages(&buffer)?;
    let strict = DecoderBuilder::new().strict(true).build().messages(&buffer)?;
    assert_eq!(lenient.len(), 3);
    assert_eq!(strict.len(), 2);
    Ok(())
}

#[cfg(feature = "serde")]
#[test]
fn messages_serialize_to_json() -> Result<()> {
    let buffer = recording()?;
    let messages = Decoder::new().messages(&buffer)?;
    let json = serde_json::to_string(&messages).expect("serialize");
    let back: Vec<milstd1553b_bm::BmMessage> = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, messages);
    Ok(())
}
