//! PSG pair (SN76489-style): three tone channels per chip.
//!
//! Slots 0-2 use the left chip and 3-5 the right. A tone is set with a latch
//! byte carrying the low divider nibble followed by a data byte with the high
//! six bits; attenuation is a separate latch byte (0 = loudest, 15 = off).

use crate::map::*;
use crate::registers::Registers;

pub const VOICES: usize = 6;

pub const LOWEST_NOTE: u8 = 45;
pub const HIGHEST_NOTE: u8 = LOWEST_NOTE + 63;

const DIV_LOW: [u8; 64] = [
    0x09, 0x00, 0x0A, 0x07, 0x07, 0x0A, 0x0F, 0x07, 0x01, 0x0D, 0x0B, 0x0B, 0x0C, 0x00, 0x05, 0x0C,
    0x04, 0x0D, 0x08, 0x03, 0x00, 0x0E, 0x0D, 0x0D, 0x0E, 0x00, 0x02, 0x06, 0x0A, 0x0E, 0x04, 0x0A,
    0x00, 0x07, 0x0F, 0x07, 0x0F, 0x08, 0x01, 0x0B, 0x05, 0x0F, 0x0A, 0x05, 0x00, 0x0C, 0x07, 0x03,
    0x00, 0x0C, 0x09, 0x05, 0x02, 0x00, 0x0D, 0x0A, 0x08, 0x06, 0x04, 0x02, 0x00, 0x0E, 0x0C, 0x0B,
];

const DIV_HIGH: [u8; 64] = [
    0x3F, 0x3C, 0x38, 0x35, 0x32, 0x2F, 0x2C, 0x2A, 0x28, 0x25, 0x23, 0x21, 0x1F, 0x1E, 0x1C, 0x1A,
    0x19, 0x17, 0x16, 0x15, 0x14, 0x12, 0x11, 0x10, 0x0F, 0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0B, 0x0A,
    0x0A, 0x09, 0x08, 0x08, 0x07, 0x07, 0x07, 0x06, 0x06, 0x05, 0x05, 0x05, 0x05, 0x04, 0x04, 0x04,
    0x04, 0x03, 0x03, 0x03, 0x03, 0x03, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x01, 0x01, 0x01,
];

/// Divider bytes `(lo nibble, hi six bits)` for `note`, if in range.
pub fn divider(note: u8) -> Option<(u8, u8)> {
    let idx = note.checked_sub(LOWEST_NOTE)? as usize;
    Some((*DIV_LOW.get(idx)?, *DIV_HIGH.get(idx)?))
}

/// Chip address and channel bits for `slot`.
pub fn slot_target(slot: usize) -> (u16, u8) {
    let addr = if slot > 2 { PSG_RIGHT } else { PSG_LEFT };
    (addr, PSG_CHANNEL_BITS[slot % 3])
}

/// Attenuation for a MIDI velocity.
pub fn attenuation(velocity: u8) -> u8 {
    PSG_SILENCE - ((velocity & 0x7F) >> 3)
}

/// Start a tone on `slot`. Returns false (no writes) if `note` is out of range.
pub fn note_on<R: Registers>(regs: &mut R, slot: usize, note: u8, velocity: u8) -> bool {
    let Some((lo, hi)) = divider(note) else {
        return false;
    };
    let (addr, chan) = slot_target(slot);
    regs.poke(addr, 0x80 | chan | lo);
    regs.poke(addr, hi);
    regs.poke(addr, 0x90 | chan | attenuation(velocity));
    true
}

/// Fully attenuate `slot`.
pub fn note_off<R: Registers>(regs: &mut R, slot: usize) {
    let (addr, chan) = slot_target(slot);
    regs.poke(addr, 0x90 | chan | PSG_SILENCE);
}

/// Silence every channel on both chips, noise included.
pub fn shut_all<R: Registers>(regs: &mut R) {
    for addr in [PSG_LEFT, PSG_RIGHT] {
        for chan in [0x00, 0x20, 0x40, 0x60] {
            regs.poke(addr, 0x90 | chan | PSG_SILENCE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::RecordingBus;

    #[test]
    fn a2_divider_matches_clock() {
        // 110 Hz at 3.579545 MHz: 3579545 / (32 * 110) = 1017 = 0x3F9
        assert_eq!(divider(45), Some((0x09, 0x3F)));
        assert_eq!(divider(44), None);
        assert_eq!(divider(HIGHEST_NOTE + 1), None);
    }

    #[test]
    fn right_chip_for_upper_slots() {
        assert_eq!(slot_target(0), (PSG_LEFT, 0x00));
        assert_eq!(slot_target(4), (PSG_RIGHT, 0x20));
    }

    #[test]
    fn note_on_latches_tone_then_volume() {
        let mut bus = RecordingBus::new();
        assert!(note_on(&mut bus, 2, 45, 0x7F));
        let bytes: Vec<u8> = bus.writes_to(PSG_LEFT).collect();
        assert_eq!(bytes, vec![0x80 | 0x40 | 0x09, 0x3F, 0x90 | 0x40]);
    }

    #[test]
    fn note_off_is_full_attenuation() {
        let mut bus = RecordingBus::new();
        note_off(&mut bus, 3);
        assert_eq!(bus.writes_to(PSG_RIGHT).collect::<Vec<_>>(), vec![0x9F]);
    }
}
