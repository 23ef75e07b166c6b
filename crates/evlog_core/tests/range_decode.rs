use evlog_core::consts::*;
use evlog_core::{Catalog, EngineConfig, LengthTable, LogError, LogReader, LogWriter, TimeBase};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_log(dir: &Path, name: &str, f: impl FnOnce(&mut LogWriter<Vec<u8>>)) -> PathBuf {
    let mut w = LogWriter::in_memory();
    f(&mut w);
    let p = dir.join(name);
    std::fs::write(&p, w.into_bytes()).unwrap();
    p
}

fn mixed(w: &mut LogWriter<Vec<u8>>) {
    w.session_start().unwrap();
    w.status(1).unwrap();
    for i in 0..40u16 {
        w.tick(i.wrapping_mul(4001)).unwrap();
        w.voltage(3000 + i).unwrap();
        w.temperature(-200 + i as i16 * 17).unwrap();
        if i % 3 == 0 {
            w.label(&format!("run-{i}")).unwrap();
        }
        if i % 5 == 0 {
            w.message("hello world").unwrap();
            w.sync().unwrap();
        }
        if i % 7 == 0 {
            w.record(CODE_DIAGNOSTIC, &[1, 2, 3]).unwrap();
            w.button(i * 13, 2).unwrap();
            w.overflow().unwrap();
        }
        w.position(-(i as i32), i as i32 * 10).unwrap();
        w.counter(i as u8).unwrap();
    }
    w.status(7).unwrap();
}

#[test]
fn index_covers_every_record() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "mixed.bin", mixed);
    let r = LogReader::open(&p).unwrap();
    let data = std::fs::read(&p).unwrap();
    let catalog = Catalog::builtin();

    let n = r.total_events();
    assert!(n > 300);
    for i in 0..n {
        let start = r.offset_of(i).unwrap();
        let end = r.offset_of(i + 1).unwrap_or(data.len() as u64);
        assert_eq!(end - start, 1 + catalog.length_of(data[start as usize]) as u64, "event {i}");
    }
    assert_eq!(r.stats().scanned_bytes, data.len() as u64);
    assert!(r.stats().unresolved.is_empty());
}

#[test]
fn single_record_decode_consumes_its_span() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "mixed.bin", mixed);
    let r = LogReader::open(&p).unwrap();
    for i in 0..r.total_events() {
        let recs = r.decode(i, i + 1);
        assert_eq!(recs.len(), 1);
        let (start, end) = r.index().span_of(i).unwrap();
        assert_eq!(recs[0].index, i);
        assert_eq!(recs[0].raw_offset, start);
        assert_eq!(recs[0].consumed(), end - start);
    }
}

#[test]
fn tick_reconstruction_without_and_with_wrap() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "ticks.bin", |w| {
        w.tick(100).unwrap();
        w.tick(150).unwrap();
    });
    let times: Vec<u64> = LogReader::open(&p).unwrap().decode(0, 2).iter().map(|r| r.time_ns).collect();
    assert_eq!(times, [0, 100_000]);

    let p = write_log(dir.path(), "wrap.bin", |w| {
        w.tick(150).unwrap();
        w.tick(20).unwrap();
    });
    let times: Vec<u64> = LogReader::open(&p).unwrap().decode(0, 2).iter().map(|r| r.time_ns).collect();
    assert_eq!(times, [0, 130_812_000]);
}

#[test]
fn split_string_and_mid_string_access() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "hello.bin", |w| w.label("HELLO").unwrap());
    let r = LogReader::open(&p).unwrap();
    assert_eq!(r.total_events(), 6);

    let full = r.decode(0, 6);
    assert_eq!(full[0].rendered, "label <i>begin</i>");
    assert!(full[1..5].iter().all(|rec| rec.rendered.is_empty() && rec.raw_bytes.len() == 2));
    assert!(full[5].rendered.contains("\"HELLO\""));

    let window = r.decode(3, 6);
    assert_eq!(window.len(), 3);
    assert_eq!(window[0].index, 3);
    assert_eq!(window[2], full[5]);
}

#[test]
fn every_suffix_matches_linear_decode() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "mixed.bin", mixed);
    let cfg = EngineConfig { checkpoint_interval: 16, time_base: TimeBase::Absolute, ..Default::default() };
    let r = LogReader::open_with(&p, Catalog::builtin(), cfg).unwrap();
    let n = r.total_events();
    let full = r.decode(0, n);
    assert_eq!(full.len() as u64, n);
    for start in (0..n).step_by(3) {
        let end = (start + 25).min(n);
        let part = r.decode(start, end);
        assert_eq!(part.as_slice(), &full[start as usize..end as usize], "range [{start}, {end})");
    }
}

/// Label and message characters alternating, each string closing at a
/// different point than the other.
fn interleaved(w: &mut LogWriter<Vec<u8>>) {
    for round in 0..12u16 {
        w.tick(round * 500).unwrap();
        let label = format!("L{round}abc");
        let message = format!("m{round}");
        let (l, m) = (label.as_bytes(), message.as_bytes());
        for i in 0..l.len().max(m.len()) {
            if let Some(&c) = l.get(i) {
                w.record(CODE_LABEL_CHAR, &[c]).unwrap();
            }
            if let Some(&c) = m.get(i) {
                w.record(CODE_MESSAGE_CHAR, &[c]).unwrap();
            }
            if i + 1 == m.len() {
                w.record(CODE_MESSAGE_CHAR, &[STRING_TERMINATOR]).unwrap();
            }
        }
        w.record(CODE_LABEL_CHAR, &[STRING_TERMINATOR]).unwrap();
        if round % 4 == 3 {
            w.counter(round as u8).unwrap();
        }
    }
}

#[test]
fn other_field_terminator_inside_open_string() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "lm.bin", |w| {
        w.record(CODE_LABEL_CHAR, b"a").unwrap();
        w.record(CODE_MESSAGE_CHAR, b"x").unwrap();
        w.record(CODE_MESSAGE_CHAR, &[0]).unwrap();
        w.record(CODE_LABEL_CHAR, b"b").unwrap();
        w.record(CODE_LABEL_CHAR, &[0]).unwrap();
    });
    let r = LogReader::open(&p).unwrap();
    let full = r.decode(0, 5);
    assert_eq!(full[2].rendered, "message \"x\"");
    assert_eq!(full[4].rendered, "label \"ab\"");

    let window = r.decode(3, 5);
    assert_eq!(window.len(), 2);
    assert_eq!(window[1].rendered, full[4].rendered);
    assert_eq!(window[1].raw_bytes, full[4].raw_bytes);
}

#[test]
fn interleaved_strings_match_linear_decode_in_every_window() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "interleaved.bin", interleaved);
    let cfg = EngineConfig { checkpoint_interval: 8, ..Default::default() };
    let r = LogReader::open_with(&p, Catalog::builtin(), cfg).unwrap();
    let n = r.total_events();
    let full = r.decode_with(0, n, TimeBase::Absolute);
    assert_eq!(full.len() as u64, n);
    assert!(full.iter().any(|rec| rec.rendered == "label \"L7abc\""));

    for start in 0..n {
        for end in [start + 1, start + 5, n] {
            let end = end.min(n);
            let expected = &full[start as usize..end as usize];

            let absolute = r.decode_with(start, end, TimeBase::Absolute);
            assert_eq!(absolute.as_slice(), expected, "absolute [{start}, {end})");

            let session = r.decode_with(start, end, TimeBase::Session);
            assert_eq!(session.len(), expected.len(), "session [{start}, {end})");
            for (got, want) in session.iter().zip(expected) {
                assert_eq!((got.index, &got.rendered, &got.raw_bytes), (want.index, &want.rendered, &want.raw_bytes));
            }
        }
    }
}

#[test]
fn session_time_base_restarts_at_adjusted_start() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "s.bin", |w| {
        w.tick(0).unwrap();
        w.tick(10).unwrap();
        w.tick(20).unwrap();
        w.counter(1).unwrap();
    });
    let r = LogReader::open(&p).unwrap();
    let session: Vec<u64> = r.decode(2, 4).iter().map(|x| x.time_ns).collect();
    assert_eq!(session, [0, 1]);
    let absolute: Vec<u64> = r.decode_with(2, 4, TimeBase::Absolute).iter().map(|x| x.time_ns).collect();
    assert_eq!(absolute, [40_000, 40_001]);
}

#[test]
fn repeated_decodes_are_identical() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "mixed.bin", mixed);
    let r = LogReader::open(&p).unwrap();
    let a = r.decode(17, 120);
    let b = r.decode(17, 120);
    assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
}

#[test]
fn unknown_type_passes_through() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "u.bin", |w| {
        w.record(CODE_DIAGNOSTIC, &[7, 8, 9]).unwrap();
        w.counter(1).unwrap();
    });
    let r = LogReader::open(&p).unwrap();
    assert_eq!(r.offset_of(1), Some(4));
    let recs = r.decode(0, 2);
    assert_eq!(recs[0].raw_bytes, vec![CODE_DIAGNOSTIC, 7, 8, 9]);
    assert_eq!(recs[1].rendered, "counter 1");
}

#[test]
fn strict_mode_rejects_unresolved_codes() {
    let dir = tempdir().unwrap();
    let p = write_log(dir.path(), "bad.bin", |w| {
        w.counter(1).unwrap();
        w.record(0x99, &[]).unwrap();
    });
    let lenient = LogReader::open(&p).unwrap();
    assert_eq!(lenient.stats().unresolved.get(&0x99), Some(&1));

    let cfg = EngineConfig { strict_types: true, ..Default::default() };
    match LogReader::open_with(&p, Catalog::builtin(), cfg) {
        Err(LogError::UnresolvedType { code, offset }) => assert_eq!((code, offset), (0x99, 2)),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("strict open should fail"),
    }
}

#[test]
fn injected_length_table_drives_indexing() {
    let dir = tempdir().unwrap();
    let table_path = dir.path().join("lengths.json");
    let mut entries = LengthTable::builtin().entries().to_vec();
    entries.push(evlog_core::LengthEntry { code: 0x99, length: 2, name: Some("vendor".into()) });
    let table = LengthTable::from_entries(entries).unwrap();
    std::fs::write(&table_path, table.to_json_pretty().unwrap()).unwrap();

    let p = write_log(dir.path(), "vendor.bin", |w| {
        w.record(0x99, &[1, 2]).unwrap();
        w.counter(3).unwrap();
    });
    let loaded = LengthTable::load(&table_path).unwrap();
    let r = LogReader::open_with(&p, Catalog::new(&loaded).unwrap(), EngineConfig::default()).unwrap();
    assert_eq!(r.total_events(), 2);
    assert_eq!(r.decode(0, 2)[0].rendered, "unrecognized type 0x99 (2 bytes)");
}

#[test]
fn empty_log_decodes_nothing() {
    let dir = tempdir().unwrap();
    let p = dir.path().join("empty.bin");
    std::fs::write(&p, b"").unwrap();
    let r = LogReader::open(&p).unwrap();
    assert_eq!(r.total_events(), 0);
    assert!(r.decode(0, 10).is_empty());
    assert_eq!(r.record_range_for(0, 1), None);
}
