//! Multi-track merge scheduling.
//!
//! Every track keeps a "time remaining" until its next record. Each step
//! picks the track with the least time remaining (lowest index on ties),
//! waits that long on the hardware timer, dispatches the record, and charges
//! the elapsed time against every other active track. The per-track deltas
//! therefore never need to be merged into one timeline up front.

use alloc::vec;
use alloc::vec::Vec;

use cs_hw::HardwareTimer;
use cs_ir::{Sequence, TrackEventRecord};
use tracing::{debug, trace};

use crate::chunker;
use crate::pump::{EventPump, Flow};

/// Receives records in playback order.
pub trait EventSink {
    /// `at` is the absolute playback time in timer units.
    fn dispatch(&mut self, at: u64, track: usize, record: &TrackEventRecord);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn dispatch(&mut self, at: u64, track: usize, record: &TrackEventRecord) {
        (**self).dispatch(at, track, record)
    }
}

/// Cursor and remaining time for every track of one loaded sequence.
///
/// Sized at construction; priming, stepping and resetting never allocate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackSession {
    cursors: Vec<u32>,
    /// `None` once the track has no records left.
    remaining: Vec<Option<u32>>,
    elapsed: u64,
    dispatched: u64,
}

impl PlaybackSession {
    pub fn new(seq: &Sequence) -> Self {
        let tracks = seq.track_count();
        Self {
            cursors: vec![0; tracks],
            remaining: vec![None; tracks],
            elapsed: 0,
            dispatched: 0,
        }
    }

    /// Load each track's first delta.
    pub fn prime(&mut self, seq: &Sequence) {
        for (track, slot) in self.remaining.iter_mut().enumerate() {
            *slot = seq.record(track, self.cursors[track]).map(|r| r.delta);
        }
    }

    /// Rewind every cursor for replay.
    pub fn reset(&mut self) {
        self.cursors.fill(0);
        self.remaining.fill(None);
        self.elapsed = 0;
        self.dispatched = 0;
    }

    /// Track with the least time remaining, and that time.
    ///
    /// Ties go to the lowest track index; a zero stops the scan early.
    pub fn select(&self) -> Option<(usize, u32)> {
        let mut best: Option<(usize, u32)> = None;
        for (track, r) in self.remaining.iter().enumerate() {
            let Some(r) = *r else { continue };
            if best.map_or(true, |(_, b)| r < b) {
                best = Some((track, r));
                if r == 0 {
                    break;
                }
            }
        }
        best
    }

    /// Move past the dispatched record of `track` and charge `consumed`
    /// to every other active track.
    pub fn advance(&mut self, seq: &Sequence, track: usize, consumed: u32) {
        self.cursors[track] += 1;
        self.remaining[track] = seq.record(track, self.cursors[track]).map(|r| r.delta);
        for (i, r) in self.remaining.iter_mut().enumerate() {
            if i == track {
                continue;
            }
            if let Some(r) = r {
                *r = r.saturating_sub(consumed);
            }
        }
        self.dispatched += 1;
    }

    pub fn cursor(&self, track: usize) -> Option<u32> {
        self.cursors.get(track).copied()
    }

    pub fn remaining(&self, track: usize) -> Option<u32> {
        self.remaining.get(track).copied().flatten()
    }

    /// True when every track is exhausted.
    pub fn is_drained(&self) -> bool {
        self.remaining.iter().all(Option::is_none)
    }

    /// Absolute playback time in timer units.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

/// Scheduler position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Priming,
    Selecting,
    /// Waiting `units` before dispatching from `track`.
    Waiting { track: usize, units: u32 },
    Dispatching { track: usize, units: u32 },
    Drained,
}

/// How a [`MergeScheduler::run`] call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Drained,
    Cancelled,
}

/// Merges the tracks of a [`Sequence`] into one timed dispatch stream.
pub struct MergeScheduler {
    session: PlaybackSession,
    state: SchedulerState,
}

impl MergeScheduler {
    /// Scheduler for `seq`. Pass the same sequence to every `step`/`run`.
    pub fn new(seq: &Sequence) -> Self {
        Self {
            session: PlaybackSession::new(seq),
            state: SchedulerState::Priming,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn is_drained(&self) -> bool {
        self.state == SchedulerState::Drained
    }

    /// Back to the start for replay.
    pub fn reset(&mut self) {
        self.session.reset();
        self.state = SchedulerState::Priming;
    }

    /// Perform one state transition and return the new state.
    pub fn step<T, S>(&mut self, seq: &Sequence, timer: &mut T, sink: &mut S) -> SchedulerState
    where
        T: HardwareTimer + ?Sized,
        S: EventSink + ?Sized,
    {
        self.state = match self.state {
            SchedulerState::Priming => {
                self.session.prime(seq);
                SchedulerState::Selecting
            }
            SchedulerState::Selecting => match self.session.select() {
                None => {
                    debug!(dispatched = self.session.dispatched, "sequence drained");
                    SchedulerState::Drained
                }
                Some((track, 0)) => SchedulerState::Dispatching { track, units: 0 },
                Some((track, units)) => SchedulerState::Waiting { track, units },
            },
            SchedulerState::Waiting { track, units } => {
                chunker::wait(timer, units as u64);
                self.session.elapsed += units as u64;
                SchedulerState::Dispatching { track, units }
            }
            SchedulerState::Dispatching { track, units } => {
                let cursor = self.session.cursors[track];
                if let Some(record) = seq.record(track, cursor) {
                    trace!(track, cursor, at = self.session.elapsed, msg = ?record.bytes(), "dispatch");
                    sink.dispatch(self.session.elapsed, track, &record);
                }
                self.session.advance(seq, track, units);
                SchedulerState::Selecting
            }
            SchedulerState::Drained => SchedulerState::Drained,
        };
        self.state
    }

    /// Step until drained, polling `pump` before every selection.
    pub fn run<T, S, P>(
        &mut self,
        seq: &Sequence,
        timer: &mut T,
        sink: &mut S,
        pump: &mut P,
    ) -> RunOutcome
    where
        T: HardwareTimer + ?Sized,
        S: EventSink + ?Sized,
        P: EventPump + ?Sized,
    {
        loop {
            match self.state {
                SchedulerState::Drained => return RunOutcome::Drained,
                SchedulerState::Selecting => {
                    if pump.poll() == Flow::Stop {
                        debug!(at = self.session.elapsed, "playback cancelled");
                        return RunOutcome::Cancelled;
                    }
                }
                _ => {}
            }
            self.step(seq, timer, sink);
        }
    }
}
