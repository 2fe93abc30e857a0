//! Polyphonic note dispatch to the sound backends.
//!
//! MIDI traffic is forwarded byte for byte. The chip backends have a fixed
//! number of voices, so note-ons claim a slot from the backend's
//! [`VoiceBank`] and note-offs release the slot holding that note. A note
//! that finds no free slot, or has no pitch table entry on the backend, is
//! dropped without touching the hardware.

use cs_hw::chips::{midi, opl3, psg, sid};
use cs_hw::Registers;
use cs_ir::message::{NOTE_OFF, NOTE_ON, RELEASE_VELOCITY};
use cs_ir::{Backend, MessageKind, MidiPort, TrackEventRecord};
use tracing::{debug, trace};

use crate::scheduler::EventSink;
use crate::voice_bank::{SlotId, VoiceBank};

/// How a note picks its voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceSelect {
    /// First free unreserved slot.
    Pooled,
    /// This slot, regardless of reservation (rhythm voices).
    Fixed(SlotId),
}

/// Routes note traffic to one active backend.
pub struct Dispatcher<R: Registers> {
    regs: R,
    backend: Backend,
    midi_port: MidiPort,
    sid: VoiceBank,
    psg: VoiceBank,
    opl3: VoiceBank,
    sid_instrument: sid::SidInstrument,
    opl3_patch: opl3::Opl3Patch,
    /// Channel whose notes all play on the last voice of a chip bank.
    rhythm: Option<u8>,
    dropped: u64,
}

impl<R: Registers> Dispatcher<R> {
    pub fn new(regs: R, backend: Backend, midi_port: MidiPort) -> Self {
        Self {
            regs,
            backend,
            midi_port,
            sid: VoiceBank::new(sid::VOICES),
            psg: VoiceBank::new(psg::VOICES),
            opl3: VoiceBank::new(opl3::VOICES),
            sid_instrument: sid::INSTRUMENTS[0],
            opl3_patch: opl3::Opl3Patch::ORGAN,
            rhythm: None,
            dropped: 0,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn midi_port(&self) -> MidiPort {
        self.midi_port
    }

    /// Silence the current backend and switch to another.
    pub fn set_backend(&mut self, backend: Backend) {
        if backend != self.backend {
            self.silence();
            self.backend = backend;
        }
    }

    pub fn set_sid_instrument(&mut self, inst: sid::SidInstrument) {
        self.sid_instrument = inst;
    }

    pub fn set_opl3_patch(&mut self, patch: opl3::Opl3Patch) {
        self.opl3_patch = patch;
    }

    /// Give `channel` a voice of its own. The last slot of every chip bank is
    /// reserved for it; `None` hands the slot back to the pool.
    pub fn set_rhythm_channel(&mut self, channel: Option<u8>) {
        for bank in [&mut self.sid, &mut self.psg, &mut self.opl3] {
            if let Some(last) = bank.capacity().checked_sub(1) {
                if channel.is_some() {
                    bank.reserve(last);
                } else {
                    bank.unreserve(last);
                }
            }
        }
        self.rhythm = channel.map(|c| c & 0x0F);
    }

    pub fn rhythm_channel(&self) -> Option<u8> {
        self.rhythm
    }

    /// Put the active backend into a known, silent, playable state.
    pub fn initialize(&mut self) {
        debug!(backend = %self.backend, "initializing backend");
        match self.backend {
            Backend::Midi => midi::reset_instruments(&mut self.regs, self.midi_port),
            Backend::Sid => {
                sid::clear_registers(&mut self.regs);
                sid::apply_instrument(&mut self.regs, &self.sid_instrument);
            }
            Backend::Psg => psg::shut_all(&mut self.regs),
            Backend::Opl3 => {
                opl3::initialize(&mut self.regs);
                for ch in 0..opl3::VOICES {
                    opl3::set_patch(&mut self.regs, ch, &self.opl3_patch);
                }
            }
        }
    }

    /// Start `note`. Returns the slot used, or `None` when the note was dropped
    /// (or forwarded untracked to MIDI).
    pub fn note_on(&mut self, select: VoiceSelect, channel: u8, note: u8, velocity: u8) -> Option<SlotId> {
        if note == 0 {
            return None;
        }
        if velocity == 0 {
            return self.note_off(select, channel, note);
        }
        if self.backend == Backend::Midi {
            midi::send(&mut self.regs, self.midi_port, &[NOTE_ON | (channel & 0x0F), note, velocity]);
            return None;
        }
        if !self.in_range(note) {
            trace!(backend = %self.backend, note, "note outside pitch table, dropped");
            self.dropped += 1;
            return None;
        }
        let backend = self.backend;
        let bank = self.bank_for(backend)?;
        let slot = match select {
            VoiceSelect::Pooled => bank.allocate(note),
            VoiceSelect::Fixed(slot) => bank.assign(slot, note),
        };
        let Some(slot) = slot else {
            trace!(backend = %backend, note, "no free voice, dropped");
            self.dropped += 1;
            return None;
        };
        self.key(slot, note, velocity, true);
        Some(slot)
    }

    /// Stop `note`. Returns the slot freed, if any.
    pub fn note_off(&mut self, select: VoiceSelect, channel: u8, note: u8) -> Option<SlotId> {
        if self.backend == Backend::Midi {
            midi::send(&mut self.regs, self.midi_port, &[NOTE_OFF | (channel & 0x0F), note, RELEASE_VELOCITY]);
            return None;
        }
        let bank = self.bank_for(self.backend)?;
        let slot = match select {
            VoiceSelect::Pooled => bank.release(note)?,
            VoiceSelect::Fixed(slot) => {
                bank.clear(slot)?;
                slot
            }
        };
        self.key(slot, note, 0, false);
        Some(slot)
    }

    /// Forward raw bytes to the MIDI FIFO. Program changes also go to the other FIFO.
    pub fn send_midi(&mut self, bytes: &[u8]) {
        midi::send(&mut self.regs, self.midi_port, bytes);
        if bytes.first().and_then(|&s| MessageKind::from_status(s)) == Some(MessageKind::ProgramChange) {
            midi::send(&mut self.regs, self.midi_port.other(), bytes);
        }
    }

    /// Key off every voice on the active backend and free all slots.
    pub fn silence(&mut self) {
        match self.backend {
            Backend::Midi => midi::shut_all_channels(&mut self.regs, self.midi_port),
            Backend::Sid => sid::shut_all(&mut self.regs),
            Backend::Psg => psg::shut_all(&mut self.regs),
            Backend::Opl3 => opl3::quiet_all(&mut self.regs),
        }
        self.sid.release_all();
        self.psg.release_all();
        self.opl3.release_all();
    }

    pub fn bank(&self, backend: Backend) -> Option<&VoiceBank> {
        match backend {
            Backend::Midi => None,
            Backend::Sid => Some(&self.sid),
            Backend::Psg => Some(&self.psg),
            Backend::Opl3 => Some(&self.opl3),
        }
    }

    /// Mark a slot as reserved for fixed assignment.
    pub fn reserve(&mut self, backend: Backend, slot: SlotId) {
        if let Some(bank) = self.bank_for(backend) {
            bank.reserve(slot);
        }
    }

    pub fn unreserve(&mut self, backend: Backend, slot: SlotId) {
        if let Some(bank) = self.bank_for(backend) {
            bank.unreserve(slot);
        }
    }

    /// Notes dropped for lack of a voice or a pitch entry.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn registers(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn into_registers(self) -> R {
        self.regs
    }

    fn bank_for(&mut self, backend: Backend) -> Option<&mut VoiceBank> {
        match backend {
            Backend::Midi => None,
            Backend::Sid => Some(&mut self.sid),
            Backend::Psg => Some(&mut self.psg),
            Backend::Opl3 => Some(&mut self.opl3),
        }
    }

    fn select_for(&self, channel: u8) -> VoiceSelect {
        match (self.rhythm, self.bank(self.backend)) {
            (Some(rhythm), Some(bank)) if rhythm == channel && bank.capacity() > 0 => {
                VoiceSelect::Fixed(bank.capacity() - 1)
            }
            _ => VoiceSelect::Pooled,
        }
    }

    fn in_range(&self, note: u8) -> bool {
        match self.backend {
            Backend::Midi => true,
            Backend::Sid => sid::frequency(note).is_some(),
            Backend::Psg => psg::divider(note).is_some(),
            Backend::Opl3 => opl3::pitch(note).is_some(),
        }
    }

    fn key(&mut self, slot: SlotId, note: u8, velocity: u8, on: bool) {
        match self.backend {
            Backend::Midi => {}
            Backend::Sid => {
                sid::note(&mut self.regs, slot, note, self.sid_instrument.ctrl, on);
            }
            Backend::Psg => {
                if on {
                    psg::note_on(&mut self.regs, slot, note, velocity);
                } else {
                    psg::note_off(&mut self.regs, slot);
                }
            }
            Backend::Opl3 => {
                opl3::note(&mut self.regs, slot, note, on);
            }
        }
    }
}

impl<R: Registers> EventSink for Dispatcher<R> {
    fn dispatch(&mut self, _at: u64, _track: usize, record: &TrackEventRecord) {
        if record.is_rest() {
            return;
        }
        if self.backend == Backend::Midi {
            self.send_midi(record.bytes());
            return;
        }
        let channel = record.channel();
        let select = self.select_for(channel);
        let [_, note, velocity] = record.message;
        match MessageKind::from_status(record.status()) {
            Some(MessageKind::NoteOn) => {
                self.note_on(select, channel, note, velocity);
            }
            Some(MessageKind::NoteOff) => {
                self.note_off(select, channel, note);
            }
            _ => trace!(status = record.status(), "message has no chip mapping"),
        }
    }
}
