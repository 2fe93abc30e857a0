//! Playback engine for chipseq.
//!
//! Merges decoded note tracks in time order, waits out the gaps on the
//! hardware timer and hands each event to a [`Dispatcher`] that owns the
//! voices of the selected backend. Register streams take the shorter route
//! through [`RegisterStreamPlayer`].

extern crate alloc;

pub mod chunker;
mod dispatch;
mod pump;
pub mod scheduler;
mod stream_player;
mod voice_bank;

pub use dispatch::{Dispatcher, VoiceSelect};
pub use pump::{EventPump, Flow, NoPump, StepLimit, StopFlag};
pub use scheduler::{EventSink, MergeScheduler, PlaybackSession, RunOutcome, SchedulerState};
pub use stream_player::{
    decode as decode_stream_command, RegisterStreamCursor, RegisterStreamPlayer, StreamCommand, StreamStep,
    FRAME_50HZ, FRAME_60HZ,
};
pub use voice_bank::{SlotId, VoiceBank, VoiceSlot, MAX_SLOTS};
