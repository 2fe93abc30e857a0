//! A loaded note-track file.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::record::TrackEventRecord;
use crate::table::{EventArena, TrackTableSet};
use crate::timing::{bpm_for, Division, DEFAULT_US_PER_BEAT};

/// Maximum stored title length in bytes.
pub const TITLE_CAPACITY: usize = 64;

/// Time signature meta values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Denominator as a power of two (2 = quarter note).
    pub denominator_pow: u8,
    pub clocks_per_click: u8,
    pub thirty_seconds_per_quarter: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator_pow: 2,
            clocks_per_click: 24,
            thirty_seconds_per_quarter: 8,
        }
    }
}

/// Header and summary facts about a note-track file.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceInfo {
    pub format: u16,
    pub track_count: u16,
    pub division: Division,
    pub time_signature: TimeSignature,
    /// Tempo in effect at the start.
    pub us_per_beat: u32,
    pub tempo_changes: usize,
    pub title: ArrayString<TITLE_CAPACITY>,
    /// Length of the longest track in timer units.
    pub total_units: u64,
    pub total_seconds: f64,
}

impl Default for SequenceInfo {
    fn default() -> Self {
        Self {
            format: 0,
            track_count: 0,
            division: Division::default(),
            time_signature: TimeSignature::default(),
            us_per_beat: DEFAULT_US_PER_BEAT,
            tempo_changes: 0,
            title: ArrayString::new(),
            total_units: 0,
            total_seconds: 0.0,
        }
    }
}

impl SequenceInfo {
    pub fn bpm(&self) -> u32 {
        bpm_for(self.us_per_beat)
    }

    /// Store a title, truncated at a character boundary.
    pub fn set_title(&mut self, text: &str) {
        self.title.clear();
        for ch in text.chars() {
            if self.title.try_push(ch).is_err() {
                break;
            }
        }
    }
}

/// Decoded tables, records and info for one note-track file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    pub info: SequenceInfo,
    pub tables: TrackTableSet,
    pub arena: EventArena,
}

impl Sequence {
    /// Build a sequence directly from per-track record lists.
    pub fn from_tracks(tracks: &[&[TrackEventRecord]]) -> Self {
        let counts: Vec<u32> = tracks.iter().map(|t| t.len() as u32).collect();
        let tables = TrackTableSet::from_counts(&counts);
        let mut arena = EventArena::for_tables(&tables);
        for (table, records) in tables.iter().zip(tracks) {
            for (i, rec) in records.iter().enumerate() {
                arena.write(table, i as u32, rec);
            }
        }
        let info = SequenceInfo {
            track_count: tracks.len() as u16,
            ..SequenceInfo::default()
        };
        Self { info, tables, arena }
    }

    pub fn track_count(&self) -> usize {
        self.tables.len()
    }

    pub fn record_count(&self, track: usize) -> u32 {
        self.tables.get(track).map_or(0, |t| t.record_count)
    }

    /// Record `index` of `track`, if present.
    pub fn record(&self, track: usize, index: u32) -> Option<TrackEventRecord> {
        let table = self.tables.get(track)?;
        self.arena.record(table, index)
    }

    /// Iterate one track's records in order.
    pub fn track_records(&self, track: usize) -> impl Iterator<Item = TrackEventRecord> + '_ {
        let count = self.record_count(track);
        (0..count).filter_map(move |i| self.record(track, i))
    }
}
