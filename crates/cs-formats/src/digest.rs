//! Digest files: a note-track sequence saved after decoding.
//!
//! Layout is a little-endian u16 track count, one u16 record count per
//! track, then every track's packed records back to back. Loading a digest
//! skips all SMF parsing and tempo conversion.

use std::io::{Cursor, Write};

use binrw::{binrw, BinRead, BinWrite};
use cs_ir::{EventArena, Sequence, SequenceInfo, TimerConfig, TrackTableSet};
use tracing::debug;

use crate::FormatError;

#[binrw]
#[brw(little)]
#[derive(Debug, PartialEq, Eq)]
struct DigestHeader {
    #[bw(calc = record_counts.len() as u16)]
    track_count: u16,
    #[br(count = track_count)]
    record_counts: Vec<u16>,
}

/// Encode `seq` as digest bytes.
pub fn digest_bytes(seq: &Sequence) -> Result<Vec<u8>, FormatError> {
    if seq.track_count() > u16::MAX as usize {
        return Err(FormatError::DigestOverflow);
    }
    let record_counts = seq
        .tables
        .iter()
        .map(|t| u16::try_from(t.record_count).map_err(|_| FormatError::DigestOverflow))
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Cursor::new(Vec::with_capacity(2 + record_counts.len() * 2 + seq.arena.len()));
    DigestHeader { record_counts }
        .write(&mut out)
        .map_err(|_| FormatError::DigestOverflow)?;
    let mut bytes = out.into_inner();
    bytes.extend_from_slice(seq.arena.as_bytes());
    Ok(bytes)
}

/// Write `seq` as a digest to `w`.
pub fn write_digest(w: &mut impl Write, seq: &Sequence) -> std::io::Result<usize> {
    let bytes = digest_bytes(seq).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    w.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Rebuild a sequence from digest bytes.
pub fn read_digest(buffer: &[u8]) -> Result<Sequence, FormatError> {
    let mut cursor = Cursor::new(buffer);
    let header = DigestHeader::read(&mut cursor).map_err(FormatError::from_header)?;
    let counts: Vec<u32> = header.record_counts.iter().map(|&c| c as u32).collect();
    let tables = TrackTableSet::from_counts(&counts);

    let start = cursor.position() as usize;
    let end = start + tables.total_bytes();
    let body = buffer.get(start..end).ok_or(FormatError::UnexpectedEof)?;
    let arena = EventArena::from_bytes(body.to_vec());

    let mut seq = Sequence {
        info: SequenceInfo {
            format: 1,
            track_count: counts.len() as u16,
            ..SequenceInfo::default()
        },
        tables,
        arena,
    };
    seq.info.total_units = (0..seq.track_count())
        .map(|t| seq.track_records(t).map(|r| r.delta as u64).sum::<u64>())
        .max()
        .unwrap_or(0);
    seq.info.total_seconds = TimerConfig::default().seconds(seq.info.total_units);

    debug!(tracks = seq.track_count(), records = seq.tables.total_records(), "loaded digest");
    Ok(seq)
}
