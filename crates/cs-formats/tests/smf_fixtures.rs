//! Integration tests for the SMF loader against files built in memory.

use cs_formats::{decode_track, load_smf, locate_header, read_digest, read_structure, write_digest, FormatError, Pass};
use cs_ir::{Division, SequenceInfo, TempoMap, TimerConfig, TrackEventRecord};
use pretty_assertions::assert_eq;

/// Timer units in one beat at 120 bpm.
const BEAT_UNITS: u32 = 12_582_900;

fn smf(format: u16, division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&format.to_be_bytes());
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&division.to_be_bytes());
    for track in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
        buf.extend_from_slice(track);
    }
    buf
}

fn vlq(mut value: u32) -> Vec<u8> {
    let mut out = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        out.insert(0, (value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    out
}

/// Track body from (delta ticks, event bytes) pairs, end-of-track appended.
fn track(events: &[(u32, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (delta, bytes) in events {
        out.extend(vlq(*delta));
        out.extend_from_slice(bytes);
    }
    out.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    out
}

fn tempo(us: u32) -> [u8; 6] {
    let b = us.to_be_bytes();
    [0xFF, 0x51, 0x03, b[1], b[2], b[3]]
}

fn two_track_file() -> Vec<u8> {
    let conductor = track(&[
        (0, &[0xFF, 0x03, 0x04, b'S', b'o', b'n', b'g']),
        (0, &[0xFF, 0x58, 0x04, 3, 2, 24, 8]),
        (0, &tempo(500_000)),
        (96, &tempo(250_000)),
    ]);
    let melody = track(&[
        (0, &[0x90, 60, 100]),
        (96, &[60, 0]),
        (0, &[0xC0, 12]),
        (96, &[0x90, 62, 100]),
        (0, &[0x80, 62, 64]),
    ]);
    smf(1, 96, &[conductor, melody])
}

#[test]
fn loads_info_and_records() {
    let seq = load_smf(&two_track_file()).unwrap();
    assert_eq!(seq.track_count(), 2);
    assert_eq!(seq.record_count(0), 0);
    assert_eq!(seq.record_count(1), 5);
    assert_eq!(seq.info.format, 1);
    assert_eq!(seq.info.division, Division::TicksPerBeat(96));
    assert_eq!(seq.info.title.as_str(), "Song");
    assert_eq!(seq.info.time_signature.numerator, 3);
    assert_eq!(seq.info.bpm(), 120);
    assert_eq!(seq.info.tempo_changes, 2);

    let records: Vec<TrackEventRecord> = seq.track_records(1).collect();
    assert_eq!(
        records,
        vec![
            TrackEventRecord::long(0, 0x90, 60, 100),
            TrackEventRecord::long(BEAT_UNITS, 0x80, 60, 0x7F),
            TrackEventRecord::short(0, 0xC0, 12),
            // second beat runs at double tempo
            TrackEventRecord::long(BEAT_UNITS / 2, 0x90, 62, 100),
            TrackEventRecord::long(0, 0x80, 62, 64),
        ]
    );
    assert_eq!(seq.info.total_units, (BEAT_UNITS + BEAT_UNITS / 2) as u64);
}

#[test]
fn count_pass_matches_written_records() {
    let file = two_track_file();
    let seq = load_smf(&file).unwrap();
    let structure = read_structure(&file, locate_header(&file).unwrap()).unwrap();

    let mut tempo = TempoMap::new(structure.division, TimerConfig::default());
    let mut info = SequenceInfo::default();
    for (i, chunk) in structure.chunks.iter().enumerate() {
        let counted = decode_track(&file, chunk, &mut Pass::Count { tempo: &mut tempo, info: &mut info }).unwrap();
        assert_eq!(counted.records, seq.record_count(i));
        assert_eq!(seq.track_records(i).count() as u32, counted.records);
    }
    assert_eq!(seq.tables.total_records(), 5);
}

#[test]
fn gaps_wider_than_a_delta_become_rests() {
    // 96 ticks per beat at 120 bpm: 19200 ticks = 100 s, 38400 ticks = 200 s
    let body = track(&[
        (0, &[0x90, 60, 100]),
        (19_200, &[0x80, 60, 0]),
        (19_200, &[0x90, 62, 100]),
        (38_400, &[0x80, 62, 0]),
    ]);
    let seq = load_smf(&smf(0, 96, &[body])).unwrap();
    let hundred_seconds = 100 * 25_165_800u32;
    let two_hundred_seconds = 200 * 25_165_800u64;

    let records: Vec<TrackEventRecord> = seq.track_records(0).collect();
    assert_eq!(
        records,
        vec![
            TrackEventRecord::long(0, 0x90, 60, 100),
            TrackEventRecord::long(hundred_seconds, 0x80, 60, 0),
            TrackEventRecord::long(hundred_seconds, 0x90, 62, 100),
            TrackEventRecord::rest(u32::MAX),
            TrackEventRecord::long((two_hundred_seconds - u32::MAX as u64) as u32, 0x80, 62, 0),
        ]
    );
    let played: u64 = records.iter().map(|r| r.delta as u64).sum();
    assert_eq!(played, seq.info.total_units);
    assert_eq!(seq.info.total_seconds, 400.0);
    assert_eq!(seq.tables.total_records(), 5);
}

#[test]
fn table_ranges_do_not_overlap() {
    let a = track(&[(0, &[0x90, 60, 1]), (1, &[0x80, 60, 0])]);
    let b = track(&[(0, &[0x91, 61, 1])]);
    let c = track(&[(0, &[0x92, 62, 1]), (1, &[0x82, 62, 0]), (1, &[0xC2, 3])]);
    let seq = load_smf(&smf(1, 48, &[a, b, c])).unwrap();

    let ranges: Vec<_> = seq.tables.iter().map(|t| t.byte_range()).collect();
    for (i, r) in ranges.iter().enumerate() {
        for other in &ranges[i + 1..] {
            assert!(r.end <= other.start || other.end <= r.start, "{r:?} overlaps {other:?}");
        }
    }
    assert_eq!(seq.arena.len(), seq.tables.total_bytes());
}

#[test]
fn format_zero_single_track() {
    let body = track(&[(0, &[0x99, 36, 90]), (48, &[0x89, 36, 0])]);
    let seq = load_smf(&smf(0, 48, &[body])).unwrap();
    assert_eq!(seq.record_count(0), 2);
    assert_eq!(seq.record(0, 1).map(|r| r.delta), Some(BEAT_UNITS));
}

#[test]
fn format_two_is_accepted() {
    let body = track(&[(0, &[0x90, 60, 1])]);
    let seq = load_smf(&smf(2, 96, &[body.clone(), body])).unwrap();
    assert_eq!(seq.track_count(), 2);
}

#[test]
fn unknown_chunks_are_not_tracks() {
    let first = track(&[(0, &[0x90, 60, 1])]);
    let second = track(&[(0, &[0x91, 61, 1]), (1, &[0x81, 61, 0])]);
    let mut file = smf(1, 96, &[first]);
    file[11] = 2;
    file.extend_from_slice(b"XFIH");
    file.extend_from_slice(&3u32.to_be_bytes());
    file.extend_from_slice(&[1, 2, 3]);
    file.extend_from_slice(b"MTrk");
    file.extend_from_slice(&(second.len() as u32).to_be_bytes());
    file.extend_from_slice(&second);

    let structure = read_structure(&file, 0).unwrap();
    assert_eq!(structure.chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1]);
    let seq = load_smf(&file).unwrap();
    assert_eq!(seq.track_count(), 2);
    assert_eq!(seq.record_count(0), 1);
    assert_eq!(seq.record_count(1), 2);
}

#[test]
fn missing_header() {
    assert_eq!(load_smf(b"not a midi file at all").unwrap_err(), FormatError::InvalidHeader);
}

#[test]
fn unsupported_format() {
    assert_eq!(load_smf(&smf(3, 96, &[])).unwrap_err(), FormatError::UnsupportedVersion(3));
}

#[test]
fn declared_length_past_buffer() {
    let mut file = smf(0, 96, &[vec![0x00, 0x90, 60, 100]]);
    // claim a longer chunk than is present
    let len_at = file.len() - 4 - 4;
    file[len_at..len_at + 4].copy_from_slice(&40u32.to_be_bytes());
    assert_eq!(load_smf(&file).unwrap_err(), FormatError::UnexpectedEof);
}

#[test]
fn missing_track_chunk() {
    let mut file = smf(1, 96, &[track(&[])]);
    // header promises two tracks
    file[11] = 2;
    assert_eq!(load_smf(&file).unwrap_err(), FormatError::UnexpectedEof);
}

#[test]
fn digest_round_trip_from_smf() {
    let seq = load_smf(&two_track_file()).unwrap();
    let mut out = Vec::new();
    write_digest(&mut out, &seq).unwrap();
    let back = read_digest(&out).unwrap();
    assert_eq!(back.tables, seq.tables);
    assert_eq!(back.track_records(1).collect::<Vec<_>>(), seq.track_records(1).collect::<Vec<_>>());
    assert_eq!(back.info.total_units, seq.info.total_units);
}
