//! Per-track record tables and the shared event arena.
//!
//! Tables are built in two passes: the first counts records per track, then
//! [`TrackTableSet::compute_offsets`] lays the tracks out back to back and the
//! arena is sized exactly once. The second pass fills records in place.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use crate::record::{TrackEventRecord, RECORD_SIZE};

/// Location and size of one track's records inside the arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackEventTable {
    pub track_index: u16,
    /// Fixed after the counting pass.
    pub record_count: u32,
    /// Byte offset of the first record in the arena.
    pub base_offset: usize,
}

impl TrackEventTable {
    pub fn new(track_index: u16) -> Self {
        Self {
            track_index,
            record_count: 0,
            base_offset: 0,
        }
    }

    /// Byte range occupied by this track in the arena.
    pub fn byte_range(&self) -> Range<usize> {
        self.base_offset..self.base_offset + self.byte_len()
    }

    pub fn byte_len(&self) -> usize {
        self.record_count as usize * RECORD_SIZE
    }

    /// Byte offset of record `index` (no bounds check).
    pub fn record_offset(&self, index: u32) -> usize {
        self.base_offset + index as usize * RECORD_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

/// All track tables of one loaded file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackTableSet {
    tables: Vec<TrackEventTable>,
}

impl TrackTableSet {
    /// One empty table per track.
    pub fn with_tracks(track_count: u16) -> Self {
        Self {
            tables: (0..track_count).map(TrackEventTable::new).collect(),
        }
    }

    /// Build from known record counts, offsets computed.
    pub fn from_counts(counts: &[u32]) -> Self {
        let mut set = Self {
            tables: counts
                .iter()
                .enumerate()
                .map(|(i, &record_count)| TrackEventTable {
                    track_index: i as u16,
                    record_count,
                    base_offset: 0,
                })
                .collect(),
        };
        set.compute_offsets();
        set
    }

    /// Assign each table the byte offset after all earlier tables.
    pub fn compute_offsets(&mut self) {
        let mut offset = 0;
        for table in &mut self.tables {
            table.base_offset = offset;
            offset += table.byte_len();
        }
    }

    pub fn total_records(&self) -> u64 {
        self.tables.iter().map(|t| t.record_count as u64).sum()
    }

    /// Arena size required for all tables.
    pub fn total_bytes(&self) -> usize {
        self.tables.iter().map(|t| t.byte_len()).sum()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, track: usize) -> Option<&TrackEventTable> {
        self.tables.get(track)
    }

    pub fn get_mut(&mut self, track: usize) -> Option<&mut TrackEventTable> {
        self.tables.get_mut(track)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, TrackEventTable> {
        self.tables.iter()
    }
}

/// Contiguous record storage for every track of a file.
///
/// Sized once from the counting pass and never grown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventArena {
    bytes: Vec<u8>,
}

impl EventArena {
    /// Allocate zeroed storage for every table in `tables`.
    pub fn for_tables(tables: &TrackTableSet) -> Self {
        Self {
            bytes: vec![0; tables.total_bytes()],
        }
    }

    /// Wrap pre-packed record bytes (digest files).
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read record `index` of `table`. `None` past the table end.
    pub fn record(&self, table: &TrackEventTable, index: u32) -> Option<TrackEventRecord> {
        if index >= table.record_count {
            return None;
        }
        let start = table.record_offset(index);
        let chunk = self.bytes.get(start..start + RECORD_SIZE)?;
        let mut raw = [0u8; RECORD_SIZE];
        raw.copy_from_slice(chunk);
        Some(TrackEventRecord::from_bytes(&raw))
    }

    /// Write record `index` of `table`. Returns false if it falls outside the arena.
    pub fn write(&mut self, table: &TrackEventTable, index: u32, record: &TrackEventRecord) -> bool {
        if index >= table.record_count {
            return false;
        }
        let start = table.record_offset(index);
        match self.bytes.get_mut(start..start + RECORD_SIZE) {
            Some(slot) => {
                slot.copy_from_slice(&record.to_bytes());
                true
            }
            None => false,
        }
    }
}
