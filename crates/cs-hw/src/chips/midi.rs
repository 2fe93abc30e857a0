//! MIDI synth FIFOs.

use crate::map::{MIDI_FIFO, MIDI_FIFO_ALT};
use crate::registers::Registers;
use cs_ir::message::{CC_ALL_NOTES_OFF, CONTROL_CHANGE, PROGRAM_CHANGE};
use cs_ir::MidiPort;

pub fn fifo(port: MidiPort) -> u16 {
    match port {
        MidiPort::Primary => MIDI_FIFO,
        MidiPort::Alternate => MIDI_FIFO_ALT,
    }
}

/// Push raw message bytes to a FIFO.
pub fn send<R: Registers>(regs: &mut R, port: MidiPort, bytes: &[u8]) {
    let addr = fifo(port);
    for &b in bytes {
        regs.poke(addr, b);
    }
}

/// Program 0 on all sixteen channels.
pub fn reset_instruments<R: Registers>(regs: &mut R, port: MidiPort) {
    for ch in 0..16u8 {
        send(regs, port, &[PROGRAM_CHANGE | ch, 0]);
    }
}

/// All-notes-off on every channel.
pub fn shut_all_channels<R: Registers>(regs: &mut R, port: MidiPort) {
    for ch in 0..16u8 {
        send(regs, port, &[CONTROL_CHANGE | ch, CC_ALL_NOTES_OFF, 0]);
    }
}
