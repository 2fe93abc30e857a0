//! Standard MIDI File decoding.
//!
//! Loading runs two passes over every track chunk. The count pass sizes each
//! track's table and collects file-wide facts (tempo changes, time signature,
//! title); the write pass fills the arena with records whose deltas are
//! already converted to timer units through the finished tempo map.
//!
//! A gap wider than a record's `u32` delta is split across rest records
//! followed by the event. Tracks long enough to need rests are measured
//! again with the finished tempo map before the arena is sized.

use std::io::Cursor;

use binrw::BinRead;
use cs_ir::message::{meta, CHANNEL_PRESSURE, META, NOTE_OFF, NOTE_ON, PROGRAM_CHANGE, RELEASE_VELOCITY, SYSEX, SYSEX_ESCAPE};
use cs_ir::{
    Division, EventArena, Sequence, SequenceInfo, TempoMap, TimeSignature, TimerConfig, TrackEventRecord,
    TrackEventTable, TrackTableSet,
};
use tracing::{debug, warn};

use crate::FormatError;

/// How far into the buffer the header may start (some files carry a RIFF
/// wrapper or junk in front).
const HEADER_SEARCH_WINDOW: usize = 64;

/// Widest gap one record can carry.
const MAX_DELTA: u64 = u32::MAX as u64;

/// Rests needed ahead of an event `units` after its predecessor, and the
/// delta left for the event itself.
fn split_delta(units: u64) -> (u64, u32) {
    let rests = units.saturating_sub(1) / MAX_DELTA;
    (rests, (units - rests * MAX_DELTA) as u32)
}

#[derive(BinRead, Debug)]
#[br(big, magic = b"MThd")]
struct HeaderChunk {
    size: u32,
    format: u16,
    track_count: u16,
    division: u16,
}

#[derive(BinRead, Debug)]
#[br(big)]
struct ChunkHeader {
    tag: [u8; 4],
    length: u32,
}

/// One track chunk's data, by absolute offsets into the file buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackChunk {
    pub index: u16,
    /// Offset of the first event byte.
    pub start: usize,
    /// Declared length; may run past the end of a damaged file.
    pub len: usize,
}

impl TrackChunk {
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.len)
    }
}

/// Header fields and track chunk locations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmfStructure {
    pub format: u16,
    pub division: Division,
    pub chunks: Vec<TrackChunk>,
}

/// Offset of the `MThd` tag within the first 64 bytes.
pub fn locate_header(buffer: &[u8]) -> Result<usize, FormatError> {
    let window = &buffer[..buffer.len().min(HEADER_SEARCH_WINDOW + 4)];
    window
        .windows(4)
        .position(|w| w == b"MThd")
        .ok_or(FormatError::InvalidHeader)
}

/// Parse the header chunk at `start` and walk the track chunks after it.
pub fn read_structure(buffer: &[u8], start: usize) -> Result<SmfStructure, FormatError> {
    let tail = buffer.get(start..).ok_or(FormatError::UnexpectedEof)?;
    let header = HeaderChunk::read(&mut Cursor::new(tail)).map_err(FormatError::from_header)?;

    if header.format > 2 {
        return Err(FormatError::UnsupportedVersion(header.format as u32));
    }
    if header.format == 2 {
        warn!("format 2 file: tracks will play simultaneously");
    }

    let mut pos = start + 8 + header.size as usize;
    let mut chunks = Vec::with_capacity(header.track_count as usize);
    while chunks.len() < header.track_count as usize {
        let bytes = buffer.get(pos..).ok_or(FormatError::UnexpectedEof)?;
        let chunk = ChunkHeader::read(&mut Cursor::new(bytes)).map_err(FormatError::from_header)?;
        let data_start = pos + 8;
        pos = data_start.saturating_add(chunk.length as usize);
        if &chunk.tag != b"MTrk" {
            warn!(offset = data_start - 8, tag = ?chunk.tag, "skipping unknown chunk");
            continue;
        }
        chunks.push(TrackChunk {
            index: chunks.len() as u16,
            start: data_start,
            len: chunk.length as usize,
        });
    }

    Ok(SmfStructure {
        format: header.format,
        division: Division::from_raw(header.division),
        chunks,
    })
}

/// One decoded item from a track chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackItem<'a> {
    /// Channel voice message, normalized.
    Channel { tick: u64, byte_count: u8, message: [u8; 3] },
    Tempo { tick: u64, us_per_beat: u32 },
    TimeSignature(TimeSignature),
    TrackName(&'a [u8]),
    /// End-of-track meta; the track stops here.
    End { tick: u64 },
}

/// Streams the events of one track chunk.
pub struct TrackDecoder<'a> {
    buffer: &'a [u8],
    pos: usize,
    end: usize,
    tick: u64,
    last_status: Option<u8>,
    done: bool,
}

impl<'a> TrackDecoder<'a> {
    pub fn new(buffer: &'a [u8], chunk: &TrackChunk) -> Self {
        Self {
            buffer,
            pos: chunk.start,
            end: chunk.end(),
            tick: 0,
            last_status: None,
            done: false,
        }
    }

    /// Absolute tick of the last event read.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn byte(&mut self) -> Result<u8, FormatError> {
        let b = *self.buffer.get(self.pos).ok_or(FormatError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    /// Variable-length quantity, at most four bytes.
    fn vlq(&mut self) -> Result<u32, FormatError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let b = self.byte()?;
            value = (value << 7) | (b & 0x7F) as u32;
            if b & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    fn payload(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let end = self.pos.checked_add(len).ok_or(FormatError::UnexpectedEof)?;
        let bytes = self.buffer.get(self.pos..end).ok_or(FormatError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    /// Next item, or `None` once the chunk or the track has ended.
    pub fn next_item(&mut self) -> Result<Option<TrackItem<'a>>, FormatError> {
        while !self.done && self.pos < self.end {
            self.tick += self.vlq()? as u64;
            let offset = self.pos;
            let lead = self.byte()?;

            match lead {
                META => {
                    let kind = self.byte()?;
                    let len = self.vlq()? as usize;
                    let data = self.payload(len)?;
                    match kind {
                        meta::END_OF_TRACK => {
                            self.done = true;
                            return Ok(Some(TrackItem::End { tick: self.tick }));
                        }
                        meta::SET_TEMPO if data.len() >= 3 => {
                            let us_per_beat = u32::from_be_bytes([0, data[0], data[1], data[2]]);
                            return Ok(Some(TrackItem::Tempo { tick: self.tick, us_per_beat }));
                        }
                        meta::TIME_SIGNATURE if data.len() >= 4 => {
                            return Ok(Some(TrackItem::TimeSignature(TimeSignature {
                                numerator: data[0],
                                denominator_pow: data[1],
                                clocks_per_click: data[2],
                                thirty_seconds_per_quarter: data[3],
                            })));
                        }
                        meta::TRACK_NAME => return Ok(Some(TrackItem::TrackName(data))),
                        _ => {}
                    }
                }
                SYSEX | SYSEX_ESCAPE => {
                    let len = self.vlq()? as usize;
                    self.payload(len)?;
                }
                0x80..=0xEF => {
                    self.last_status = Some(lead);
                    let first = self.byte()?;
                    return self.channel_message(lead, first).map(Some);
                }
                0x00..=0x7F => {
                    let status = self.last_status.ok_or(FormatError::MissingRunningStatus { offset })?;
                    return self.channel_message(status, lead).map(Some);
                }
                status => return Err(FormatError::UnknownStatus { status, offset }),
            }
        }
        Ok(None)
    }

    fn channel_message(&mut self, status: u8, first: u8) -> Result<TrackItem<'a>, FormatError> {
        let kind = status & 0xF0;
        if kind == PROGRAM_CHANGE || kind == CHANNEL_PRESSURE {
            return Ok(TrackItem::Channel {
                tick: self.tick,
                byte_count: 2,
                message: [status, first, 0],
            });
        }
        let second = self.byte()?;
        let message = if kind == NOTE_ON && second == 0 {
            [NOTE_OFF | (status & 0x0F), first, RELEASE_VELOCITY]
        } else {
            [status, first, second]
        };
        Ok(TrackItem::Channel {
            tick: self.tick,
            byte_count: 3,
            message,
        })
    }
}

/// Work done by one pass over a track.
pub enum Pass<'p> {
    /// Count records and collect file-wide facts.
    Count {
        tempo: &'p mut TempoMap,
        info: &'p mut SequenceInfo,
    },
    /// Recount records with the finished tempo map, rests included.
    Measure { tempo: &'p TempoMap },
    /// Emit records into the track's slice of the arena.
    Write {
        tempo: &'p TempoMap,
        table: &'p TrackEventTable,
        arena: &'p mut EventArena,
    },
}

/// What a pass saw in one track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackSummary {
    pub records: u32,
    /// Absolute tick of the last event, end-of-track included.
    pub end_tick: u64,
}

/// Decode one track chunk in the given pass.
pub fn decode_track(buffer: &[u8], chunk: &TrackChunk, pass: &mut Pass<'_>) -> Result<TrackSummary, FormatError> {
    let mut decoder = TrackDecoder::new(buffer, chunk);
    let mut summary = TrackSummary::default();
    let mut prev_tick = 0u64;

    while let Some(item) = decoder.next_item()? {
        match (item, &mut *pass) {
            (TrackItem::Channel { tick, byte_count, message }, Pass::Write { tempo, table, arena }) => {
                let (rests, delta) = split_delta(tempo.delta_units(prev_tick, tick));
                prev_tick = tick;
                let rest = TrackEventRecord::rest(u32::MAX);
                let record = TrackEventRecord { delta, byte_count, message };
                for record in std::iter::repeat(&rest).take(rests as usize).chain([&record]) {
                    if !arena.write(table, summary.records, record) {
                        warn!(track = chunk.index, index = summary.records, "record beyond counted table");
                    }
                    summary.records += 1;
                }
            }
            (TrackItem::Channel { tick, .. }, Pass::Measure { tempo }) => {
                let (rests, _) = split_delta(tempo.delta_units(prev_tick, tick));
                prev_tick = tick;
                summary.records += rests as u32 + 1;
            }
            (TrackItem::Channel { .. }, Pass::Count { .. }) => summary.records += 1,
            (TrackItem::Tempo { tick, us_per_beat }, Pass::Count { tempo, .. }) => tempo.push(tick, us_per_beat),
            (TrackItem::TimeSignature(sig), Pass::Count { info, .. }) => info.time_signature = sig,
            (TrackItem::TrackName(name), Pass::Count { info, .. }) if info.title.is_empty() => {
                info.set_title(String::from_utf8_lossy(name).trim());
            }
            _ => {}
        }
    }

    summary.end_tick = decoder.tick();
    Ok(summary)
}

/// Load a Standard MIDI File with the default timer.
pub fn load_smf(buffer: &[u8]) -> Result<Sequence, FormatError> {
    load_smf_with(buffer, &TimerConfig::default())
}

/// Load a Standard MIDI File, converting deltas to `timer` units.
pub fn load_smf_with(buffer: &[u8], timer: &TimerConfig) -> Result<Sequence, FormatError> {
    let start = locate_header(buffer)?;
    let structure = read_structure(buffer, start)?;

    let mut info = SequenceInfo {
        format: structure.format,
        track_count: structure.chunks.len() as u16,
        division: structure.division,
        ..SequenceInfo::default()
    };
    let mut tempo = TempoMap::new(structure.division, *timer);
    let mut tables = TrackTableSet::with_tracks(info.track_count);
    let mut end_ticks = Vec::with_capacity(structure.chunks.len());

    for (i, chunk) in structure.chunks.iter().enumerate() {
        let summary = decode_track(
            buffer,
            chunk,
            &mut Pass::Count {
                tempo: &mut tempo,
                info: &mut info,
            },
        )?;
        if let Some(table) = tables.get_mut(i) {
            table.record_count = summary.records;
        }
        end_ticks.push(summary.end_tick);
    }

    tempo.finalize();

    for ((i, chunk), &end_tick) in structure.chunks.iter().enumerate().zip(&end_ticks) {
        if tempo.units_at(end_tick) <= MAX_DELTA {
            continue;
        }
        let summary = decode_track(buffer, chunk, &mut Pass::Measure { tempo: &tempo })?;
        if let Some(table) = tables.get_mut(i) {
            if summary.records != table.record_count {
                debug!(track = chunk.index, rests = summary.records.saturating_sub(table.record_count), "long gaps split into rests");
            }
            table.record_count = summary.records;
        }
    }

    tables.compute_offsets();
    let mut arena = EventArena::for_tables(&tables);

    for (chunk, table) in structure.chunks.iter().zip(tables.iter()) {
        let summary = decode_track(
            buffer,
            chunk,
            &mut Pass::Write {
                tempo: &tempo,
                table,
                arena: &mut arena,
            },
        )?;
        if summary.records != table.record_count {
            warn!(track = chunk.index, counted = table.record_count, written = summary.records, "pass mismatch");
        }
    }

    info.us_per_beat = tempo.initial_us_per_beat();
    info.tempo_changes = tempo.changes().len();
    info.total_units = end_ticks.iter().map(|&t| tempo.units_at(t)).max().unwrap_or(0);
    info.total_seconds = timer.seconds(info.total_units);

    debug!(
        format = info.format,
        tracks = info.track_count,
        records = tables.total_records(),
        bpm = info.bpm(),
        seconds = info.total_seconds,
        "loaded note-track file"
    );

    Ok(Sequence { info, tables, arena })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(start: usize, bytes: &[u8]) -> TrackChunk {
        TrackChunk {
            index: 0,
            start,
            len: bytes.len(),
        }
    }

    fn items(bytes: &[u8]) -> Result<Vec<TrackItem<'_>>, FormatError> {
        let mut dec = TrackDecoder::new(bytes, &chunk(0, bytes));
        let mut out = Vec::new();
        while let Some(item) = dec.next_item()? {
            out.push(item);
        }
        Ok(out)
    }

    #[test]
    fn header_found_after_junk() {
        let mut buf = vec![0u8; 20];
        buf.extend_from_slice(b"MThd");
        assert_eq!(locate_header(&buf), Ok(20));
    }

    #[test]
    fn header_outside_window_rejected() {
        let mut buf = vec![0u8; 100];
        buf.extend_from_slice(b"MThd");
        assert_eq!(locate_header(&buf), Err(FormatError::InvalidHeader));
    }

    #[test]
    fn vlq_multi_byte_delta() {
        // delta 0x81 0x00 = 128 ticks
        let bytes = [0x81, 0x00, 0x90, 60, 100];
        let got = items(&bytes).unwrap();
        assert_eq!(
            got,
            vec![TrackItem::Channel {
                tick: 128,
                byte_count: 3,
                message: [0x90, 60, 100]
            }]
        );
    }

    #[test]
    fn running_status_and_zero_velocity() {
        let bytes = [0x00, 0x91, 60, 100, 0x05, 60, 0, 0x05, 62, 90];
        let got = items(&bytes).unwrap();
        assert_eq!(
            got,
            vec![
                TrackItem::Channel { tick: 0, byte_count: 3, message: [0x91, 60, 100] },
                TrackItem::Channel { tick: 5, byte_count: 3, message: [0x81, 60, 0x7F] },
                TrackItem::Channel { tick: 10, byte_count: 3, message: [0x91, 62, 90] },
            ]
        );
    }

    #[test]
    fn two_byte_messages() {
        let bytes = [0x00, 0xC2, 5, 0x00, 0xD2, 0x40];
        let got = items(&bytes).unwrap();
        assert_eq!(
            got,
            vec![
                TrackItem::Channel { tick: 0, byte_count: 2, message: [0xC2, 5, 0] },
                TrackItem::Channel { tick: 0, byte_count: 2, message: [0xD2, 0x40, 0] },
            ]
        );
    }

    #[test]
    fn meta_and_sysex_are_skipped() {
        let bytes = [
            0x00, 0xFF, 0x01, 0x03, b'a', b'b', b'c', // text
            0x00, 0xF0, 0x02, 0x7E, 0xF7, // sysex
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // tempo 500000
            0x00, 0xFF, 0x2F, 0x00, // end
            0x00, 0x90, 1, 1, // after end: ignored
        ];
        let got = items(&bytes).unwrap();
        assert_eq!(
            got,
            vec![
                TrackItem::Tempo { tick: 0, us_per_beat: 500_000 },
                TrackItem::End { tick: 0 },
            ]
        );
    }

    #[test]
    fn missing_running_status() {
        let bytes = [0x00, 60, 100];
        assert_eq!(items(&bytes), Err(FormatError::MissingRunningStatus { offset: 1 }));
    }

    #[test]
    fn unknown_status() {
        let bytes = [0x00, 0xF3, 1];
        assert_eq!(items(&bytes), Err(FormatError::UnknownStatus { status: 0xF3, offset: 1 }));
    }

    #[test]
    fn truncated_message_is_eof() {
        let bytes = [0x00, 0x90, 60];
        assert_eq!(items(&bytes), Err(FormatError::UnexpectedEof));
    }
}
