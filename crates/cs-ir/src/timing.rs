//! Conversion between musical time and hardware timer units.
//!
//! The timer counts at a fixed rate ([`TIMER_UNITS_PER_SECOND`]) and its
//! comparator holds at most 24 bits, so any longer delay must be chunked by
//! the engine. Conversions here work on absolute positions so per-event
//! rounding never accumulates.

use alloc::vec::Vec;

/// Largest value the 24-bit comparator accepts (about 0.667 s).
pub const TIMER_MAX_RELOAD: u32 = 0x00FF_FFFF;
/// Timer units per second (25.1658 units per microsecond).
pub const TIMER_UNITS_PER_SECOND: u32 = 25_165_800;
/// Tempo assumed until a set-tempo event says otherwise (120 BPM).
pub const DEFAULT_US_PER_BEAT: u32 = 500_000;
/// Division assumed when a header is absent or zero.
pub const DEFAULT_TICKS_PER_BEAT: u16 = 48;
/// Sample clock of register-stream wait commands.
pub const STREAM_SAMPLE_RATE: u32 = 44_100;

/// Timer rate and comparator width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerConfig {
    pub units_per_second: u32,
    pub max_reload: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            units_per_second: TIMER_UNITS_PER_SECOND,
            max_reload: TIMER_MAX_RELOAD,
        }
    }
}

impl TimerConfig {
    pub fn units_for_micros(&self, micros: u64) -> u64 {
        (micros as u128 * self.units_per_second as u128 / 1_000_000) as u64
    }

    /// Timer units covered by `samples` at the stream sample rate.
    pub fn units_for_samples(&self, samples: u64) -> u64 {
        (samples as u128 * self.units_per_second as u128 / STREAM_SAMPLE_RATE as u128) as u64
    }

    pub fn seconds(&self, units: u64) -> f64 {
        units as f64 / self.units_per_second as f64
    }
}

/// Time division from a note-track header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Division {
    TicksPerBeat(u16),
    /// Absolute timing; tempo events do not apply.
    Smpte { frames_per_second: u8, ticks_per_frame: u8 },
}

impl Division {
    /// Decode the 16-bit header field.
    pub fn from_raw(raw: u16) -> Self {
        if raw & 0x8000 != 0 {
            let fps = (raw >> 8) as u8 as i8;
            Division::Smpte {
                frames_per_second: fps.unsigned_abs(),
                ticks_per_frame: (raw & 0xFF) as u8,
            }
        } else if raw == 0 {
            Division::TicksPerBeat(DEFAULT_TICKS_PER_BEAT)
        } else {
            Division::TicksPerBeat(raw)
        }
    }

    pub fn ticks_per_beat(&self) -> Option<u16> {
        match self {
            Division::TicksPerBeat(t) => Some(*t),
            Division::Smpte { .. } => None,
        }
    }
}

impl Default for Division {
    fn default() -> Self {
        Division::TicksPerBeat(DEFAULT_TICKS_PER_BEAT)
    }
}

/// A tempo change at an absolute tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoChange {
    pub tick: u64,
    pub us_per_beat: u32,
}

/// Beats-per-minute for a tempo in microseconds per beat.
pub fn bpm_for(us_per_beat: u32) -> u32 {
    if us_per_beat == 0 {
        0
    } else {
        60_000_000 / us_per_beat
    }
}

/// Tempo changes of a whole file, keyed by absolute tick.
///
/// Changes are collected from every track, so a tempo event in one track
/// moves the timing of all tracks from that tick on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TempoMap {
    division: Division,
    timer: TimerConfig,
    changes: Vec<TempoChange>,
}

impl TempoMap {
    pub fn new(division: Division, timer: TimerConfig) -> Self {
        Self {
            division,
            timer,
            changes: Vec::new(),
        }
    }

    pub fn division(&self) -> Division {
        self.division
    }

    pub fn timer(&self) -> TimerConfig {
        self.timer
    }

    /// Record a change. Call [`finalize`](Self::finalize) once all are in.
    pub fn push(&mut self, tick: u64, us_per_beat: u32) {
        self.changes.push(TempoChange { tick, us_per_beat });
    }

    /// Order changes by tick; equal ticks keep insertion order, last wins.
    pub fn finalize(&mut self) {
        self.changes.sort_by_key(|c| c.tick);
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Tempo in effect at tick 0.
    pub fn initial_us_per_beat(&self) -> u32 {
        self.changes
            .iter()
            .take_while(|c| c.tick == 0)
            .last()
            .map_or(DEFAULT_US_PER_BEAT, |c| c.us_per_beat)
    }

    /// Absolute timer units at `tick`.
    pub fn units_at(&self, tick: u64) -> u64 {
        match self.division {
            Division::Smpte {
                frames_per_second,
                ticks_per_frame,
            } => {
                // 29 means 29.97 drop-frame
                let fps_x100: u128 = if frames_per_second == 29 {
                    2997
                } else {
                    frames_per_second as u128 * 100
                };
                let ticks_per_sec_x100 = fps_x100 * ticks_per_frame.max(1) as u128;
                (tick as u128 * self.timer.units_per_second as u128 * 100 / ticks_per_sec_x100) as u64
            }
            Division::TicksPerBeat(tpb) => {
                let mut units = 0u64;
                let mut seg_start = 0u64;
                let mut us_per_beat = DEFAULT_US_PER_BEAT;
                for change in &self.changes {
                    if change.tick >= tick {
                        break;
                    }
                    units += self.segment_units(change.tick - seg_start, us_per_beat, tpb);
                    seg_start = change.tick;
                    us_per_beat = change.us_per_beat;
                }
                units + self.segment_units(tick - seg_start, us_per_beat, tpb)
            }
        }
    }

    /// Timer units between two absolute ticks (`from <= to`).
    pub fn delta_units(&self, from: u64, to: u64) -> u64 {
        self.units_at(to).saturating_sub(self.units_at(from))
    }

    fn segment_units(&self, ticks: u64, us_per_beat: u32, tpb: u16) -> u64 {
        let num = ticks as u128 * us_per_beat as u128 * self.timer.units_per_second as u128;
        (num / (1_000_000u128 * tpb.max(1) as u128)) as u64
    }
}
