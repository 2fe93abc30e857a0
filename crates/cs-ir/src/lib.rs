//! Core sequence types for chipseq.
//!
//! This crate defines the data model shared by the decoders and the
//! playback engine: packed track event records, the per-track tables that
//! locate them in one arena, tempo conversion to hardware timer units, and
//! decoded register streams.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod analysis;
mod backend;
pub mod message;
mod record;
mod sequence;
mod stream;
mod table;
mod timing;

pub use analysis::{analyze, SequenceFeatures};
pub use backend::{Backend, MidiPort, UnknownBackend};
pub use message::MessageKind;
pub use record::{TrackEventRecord, RECORD_SIZE};
pub use sequence::{Sequence, SequenceInfo, TimeSignature, TITLE_CAPACITY};
pub use stream::{FmMode, RegisterStream, StreamHeader};
pub use table::{EventArena, TrackEventTable, TrackTableSet};
pub use timing::{
    bpm_for, Division, TempoChange, TempoMap, TimerConfig, DEFAULT_TICKS_PER_BEAT,
    DEFAULT_US_PER_BEAT, STREAM_SAMPLE_RATE, TIMER_MAX_RELOAD, TIMER_UNITS_PER_SECOND,
};
