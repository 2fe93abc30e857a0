//! Register-stream (VGM) playback.
//!
//! Commands are decoded one at a time from the stream's command bytes. FM
//! register writes go straight to the OPL3; waits are converted from 44.1 kHz
//! samples to timer units and block through the chunker. Commands for other
//! chips are skipped by their fixed operand lengths.

use cs_hw::chips::opl3;
use cs_hw::{HardwareTimer, Registers};
use cs_ir::{RegisterStream, TimerConfig};
use tracing::{debug, warn};

use crate::chunker;
use crate::pump::{EventPump, Flow};
use crate::scheduler::RunOutcome;

/// Samples in one 60 Hz frame.
pub const FRAME_60HZ: u32 = 735;
/// Samples in one 50 Hz frame.
pub const FRAME_50HZ: u32 = 882;

/// One decoded stream command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamCommand {
    /// FM register write; addresses at or above 0x100 are port 1.
    Write { addr: u16, value: u8 },
    Wait { samples: u32 },
    End,
    /// Command for hardware we do not drive, or an embedded data block.
    Skip,
}

/// Decode the command at `pos`. Returns the command and the position of the
/// next one, or `None` if the command runs past the end of `bytes`.
pub fn decode(bytes: &[u8], pos: usize) -> Option<(StreamCommand, usize)> {
    let op = *bytes.get(pos)?;
    let operand = |i: usize| bytes.get(pos + i).copied();
    let fixed = |len: usize, cmd: StreamCommand| {
        if pos + len <= bytes.len() {
            Some((cmd, pos + len))
        } else {
            None
        }
    };

    match op {
        0x5A | 0x5E => fixed(3, StreamCommand::Write { addr: operand(1)? as u16, value: operand(2)? }),
        0x5F => fixed(3, StreamCommand::Write { addr: 0x100 | operand(1)? as u16, value: operand(2)? }),
        0x61 => {
            let samples = u16::from_le_bytes([operand(1)?, operand(2)?]) as u32;
            fixed(3, StreamCommand::Wait { samples })
        }
        0x62 => fixed(1, StreamCommand::Wait { samples: FRAME_60HZ }),
        0x63 => fixed(1, StreamCommand::Wait { samples: FRAME_50HZ }),
        0x66 => fixed(1, StreamCommand::End),
        0x67 => {
            // 0x67 0x66 type size32 data...
            let size = u32::from_le_bytes([operand(3)?, operand(4)?, operand(5)?, operand(6)?]) as usize;
            fixed(7usize.checked_add(size)?, StreamCommand::Skip)
        }
        0x70..=0x7F => fixed(1, StreamCommand::Wait { samples: (op & 0x0F) as u32 + 1 }),
        0x80..=0x8F => fixed(1, StreamCommand::Wait { samples: (op & 0x0F) as u32 }),
        0x30..=0x3F | 0x4F | 0x50 => fixed(2, StreamCommand::Skip),
        0x40..=0x4E | 0x51..=0x59 | 0x5B..=0x5D | 0xA0 | 0xB0..=0xC8 => fixed(3, StreamCommand::Skip),
        0xC9..=0xDF => fixed(4, StreamCommand::Skip),
        0xE0..=0xFF => fixed(5, StreamCommand::Skip),
        _ => fixed(1, StreamCommand::Skip),
    }
}

/// Position within a stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterStreamCursor {
    /// Offset into the command bytes.
    pub pos: usize,
    /// Samples waited since the start or the last loop point.
    pub samples: u64,
    /// Completed jumps back to the loop point.
    pub loops_done: u32,
}

impl RegisterStreamCursor {
    pub fn looped_once(&self) -> bool {
        self.loops_done > 0
    }
}

/// Outcome of one [`RegisterStreamPlayer::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamStep {
    Wrote { addr: u16, value: u8 },
    Waited { samples: u32 },
    Skipped,
    Looped,
    Ended,
}

/// Plays a [`RegisterStream`] into the OPL3.
pub struct RegisterStreamPlayer {
    cursor: RegisterStreamCursor,
    iterations: u32,
    timer: TimerConfig,
    ended: bool,
    writes: u64,
    elapsed: u64,
}

impl RegisterStreamPlayer {
    /// Player that runs the looped section until the stream has been played
    /// `iterations` times in total (at least once).
    pub fn new(iterations: u32, timer: TimerConfig) -> Self {
        Self {
            cursor: RegisterStreamCursor::default(),
            iterations: iterations.max(1),
            timer,
            ended: false,
            writes: 0,
            elapsed: 0,
        }
    }

    pub fn cursor(&self) -> RegisterStreamCursor {
        self.cursor
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Register writes performed so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Timer units waited so far, across loops.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.cursor = RegisterStreamCursor::default();
        self.ended = false;
        self.writes = 0;
        self.elapsed = 0;
    }

    /// Put the chip in the mode the stream was recorded for.
    pub fn prepare<R: Registers>(&self, stream: &RegisterStream, regs: &mut R) {
        debug!(mode = ?stream.fm_mode(), bytes = stream.commands.len(), "preparing register stream");
        opl3::set_mode(regs, stream.fm_mode());
    }

    /// Execute one command.
    pub fn step<R, T>(&mut self, stream: &RegisterStream, regs: &mut R, timer: &mut T) -> StreamStep
    where
        R: Registers,
        T: HardwareTimer + ?Sized,
    {
        if self.ended {
            return StreamStep::Ended;
        }
        if self.cursor.pos >= stream.commands.len() {
            return self.terminate(stream);
        }
        let Some((cmd, next)) = decode(&stream.commands, self.cursor.pos) else {
            warn!(pos = self.cursor.pos, "truncated stream command");
            self.ended = true;
            return StreamStep::Ended;
        };
        self.cursor.pos = next;

        match cmd {
            StreamCommand::Write { addr, value } => {
                opl3::write(regs, addr, value);
                self.writes += 1;
                StreamStep::Wrote { addr, value }
            }
            StreamCommand::Wait { samples } => {
                let before = self.timer.units_for_samples(self.cursor.samples);
                self.cursor.samples += samples as u64;
                let after = self.timer.units_for_samples(self.cursor.samples);
                chunker::wait(timer, after - before);
                self.elapsed += after - before;
                StreamStep::Waited { samples }
            }
            StreamCommand::Skip => StreamStep::Skipped,
            StreamCommand::End => self.terminate(stream),
        }
    }

    /// Step until the stream ends, polling `pump` before every command.
    pub fn run<R, T, P>(
        &mut self,
        stream: &RegisterStream,
        regs: &mut R,
        timer: &mut T,
        pump: &mut P,
    ) -> RunOutcome
    where
        R: Registers,
        T: HardwareTimer + ?Sized,
        P: EventPump + ?Sized,
    {
        loop {
            if pump.poll() == Flow::Stop {
                debug!(pos = self.cursor.pos, "stream cancelled");
                return RunOutcome::Cancelled;
            }
            if self.step(stream, regs, timer) == StreamStep::Ended {
                return RunOutcome::Drained;
            }
        }
    }

    fn terminate(&mut self, stream: &RegisterStream) -> StreamStep {
        match stream.loop_offset {
            Some(target) if self.cursor.loops_done + 1 < self.iterations => {
                self.cursor.pos = target;
                self.cursor.samples = 0;
                self.cursor.loops_done += 1;
                debug!(target, loops = self.cursor.loops_done, "stream looped");
                StreamStep::Looped
            }
            _ => {
                self.ended = true;
                StreamStep::Ended
            }
        }
    }
}
