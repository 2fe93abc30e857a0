//! SID pair: two chips, three voices each.
//!
//! Voice slots 0-2 live on the first chip and 3-5 on the second.

use crate::map::*;
use crate::registers::Registers;

pub const VOICES: usize = 6;

/// Lowest note with a frequency table entry.
pub const LOWEST_NOTE: u8 = 11;
/// Highest note with a frequency table entry.
pub const HIGHEST_NOTE: u8 = LOWEST_NOTE + 95;

const FREQ_HIGH: [u8; 96] = [
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02,
    0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x03, 0x03, 0x03, 0x03, 0x03, 0x04,
    0x04, 0x04, 0x04, 0x05, 0x05, 0x05, 0x06, 0x06, 0x06, 0x07, 0x07, 0x08,
    0x08, 0x08, 0x09, 0x0A, 0x0A, 0x0B, 0x0C, 0x0C, 0x0D, 0x0E, 0x0F, 0x10,
    0x10, 0x11, 0x13, 0x14, 0x15, 0x16, 0x18, 0x19, 0x1A, 0x1C, 0x1E, 0x20,
    0x21, 0x23, 0x26, 0x28, 0x2A, 0x2D, 0x30, 0x32, 0x35, 0x39, 0x3C, 0x40,
    0x43, 0x47, 0x4C, 0x50, 0x55, 0x5A, 0x60, 0x65, 0x6B, 0x72, 0x78, 0x80,
    0x87, 0x8F, 0x98, 0xA1, 0xAB, 0xB5, 0xC0, 0xCB, 0xD7, 0xE4, 0xF1, 0x00,
];

const FREQ_LOW: [u8; 96] = [
    0x0F, 0x1F, 0x30, 0x43, 0x56, 0x6A, 0x80, 0x96, 0xAF, 0xC8, 0xE3, 0x00,
    0x1F, 0x3F, 0x61, 0x86, 0xAC, 0xD5, 0x00, 0x2D, 0x5E, 0x91, 0xC7, 0x01,
    0x3E, 0x7F, 0xC3, 0x0C, 0x58, 0xAA, 0x00, 0x5B, 0xBC, 0x23, 0x8F, 0x02,
    0x7C, 0xFE, 0x86, 0x18, 0xB1, 0x54, 0x00, 0xB7, 0x78, 0x46, 0x1F, 0x05,
    0xF9, 0xFC, 0x0D, 0x30, 0x63, 0xA8, 0x01, 0x6E, 0xF1, 0x8C, 0x3F, 0x0B,
    0xF3, 0xF8, 0x1A, 0x60, 0xC6, 0x51, 0x02, 0xDD, 0xE3, 0x18, 0x7E, 0x16,
    0xE7, 0xF0, 0x35, 0xC0, 0x8D, 0xA3, 0x05, 0xBB, 0xC7, 0x30, 0xFD, 0x2D,
    0xCE, 0xE1, 0x6A, 0x80, 0x1A, 0x46, 0x0B, 0x77, 0x8F, 0x61, 0xFA, 0x5B,
];

/// Voice and chip-wide settings applied to every voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SidInstrument {
    pub name: &'static str,
    pub max_volume: u8,
    pub pwd_lo: u8,
    pub pwd_hi: u8,
    pub attack_decay: u8,
    pub sustain_release: u8,
    /// Waveform bits; the gate bit is added on note-on.
    pub ctrl: u8,
    pub fcf_lo: u8,
    pub fcf_hi: u8,
    pub frr: u8,
}

const fn instrument(name: &'static str, v: [u8; 6]) -> SidInstrument {
    SidInstrument {
        name,
        max_volume: v[0],
        pwd_lo: v[1],
        pwd_hi: v[2],
        attack_decay: v[3],
        sustain_release: v[4],
        ctrl: v[5],
        fcf_lo: 0,
        fcf_hi: 0,
        frr: 0,
    }
}

pub const INSTRUMENTS: [SidInstrument; 5] = [
    instrument("triangle", [0x0F, 0x44, 0x00, 0x27, 0x5B, 0x10]),
    instrument("sawtooth", [0x0F, 0x88, 0x00, 0x09, 0x00, 0x20]),
    instrument("pulse", [0x0F, 0x00, 0x08, 0x00, 0x40, 0x40]),
    instrument("noise", [0x0F, 0x44, 0x00, 0x70, 0x00, 0x80]),
    instrument("pad", [0x0A, 0x90, 0x04, 0xD6, 0xBA, 0x40]),
];

/// Frequency register pair `(lo, hi)` for `note`, if in range.
pub fn frequency(note: u8) -> Option<(u8, u8)> {
    let idx = note.checked_sub(LOWEST_NOTE)? as usize;
    Some((*FREQ_LOW.get(idx)?, *FREQ_HIGH.get(idx)?))
}

/// Base address of voice `slot` (0-5).
pub fn voice_base(slot: usize) -> u16 {
    let chip = if slot > 2 { SID2 } else { SID1 };
    chip + SID_VOICE_OFFSETS[slot % 3]
}

/// Zero every register on both chips.
pub fn clear_registers<R: Registers>(regs: &mut R) {
    for reg in 0..=SID_LAST_REG {
        regs.poke(SID1 + reg, 0);
        regs.poke(SID2 + reg, 0);
    }
}

/// Program all six voices and both chips' filter/volume with `inst`.
pub fn apply_instrument<R: Registers>(regs: &mut R, inst: &SidInstrument) {
    for slot in 0..VOICES {
        let base = voice_base(slot);
        regs.poke(base + SID_LO_PWDC, inst.pwd_lo);
        regs.poke(base + SID_HI_PWDC, inst.pwd_hi);
        regs.poke(base + SID_ATK_DEC, inst.attack_decay);
        regs.poke(base + SID_SUS_REL, inst.sustain_release);
        regs.poke(base + SID_CTRL, inst.ctrl);
    }
    for chip in [SID1, SID2] {
        regs.poke(chip + SID_FCF_LO, inst.fcf_lo);
        regs.poke(chip + SID_FCF_HI, inst.fcf_hi);
        regs.poke(chip + SID_FRR, inst.frr);
        regs.poke(chip + SID_FM_VC, inst.max_volume);
    }
}

/// Set pitch and gate for `slot`. Returns false (no writes) if `note` is out of range.
pub fn note<R: Registers>(regs: &mut R, slot: usize, note: u8, ctrl: u8, on: bool) -> bool {
    let Some((lo, hi)) = frequency(note) else {
        return false;
    };
    let base = voice_base(slot);
    regs.poke(base + SID_LO_B, lo);
    regs.poke(base + SID_HI_B, hi);
    regs.poke(base + SID_CTRL, if on { ctrl | 0x01 } else { ctrl & 0xFE });
    true
}

/// Clear the gate bit on every voice.
pub fn shut_all<R: Registers>(regs: &mut R) {
    for slot in 0..VOICES {
        let addr = voice_base(slot) + SID_CTRL;
        let ctrl = regs.peek(addr);
        regs.poke(addr, ctrl & 0xFE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{RecordingBus, RegWrite};

    #[test]
    fn slots_split_across_chips() {
        assert_eq!(voice_base(0), 0xD400);
        assert_eq!(voice_base(2), 0xD40E);
        assert_eq!(voice_base(3), 0xD500);
        assert_eq!(voice_base(5), 0xD50E);
    }

    #[test]
    fn frequency_range() {
        assert_eq!(frequency(10), None);
        assert_eq!(frequency(11), Some((0x0F, 0x01)));
        assert_eq!(frequency(HIGHEST_NOTE), Some((0x5B, 0x00)));
        assert_eq!(frequency(HIGHEST_NOTE + 1), None);
    }

    #[test]
    fn note_on_writes_pitch_then_gated_ctrl() {
        let mut bus = RecordingBus::new();
        assert!(note(&mut bus, 4, 60, 0x20, true));
        let (lo, hi) = frequency(60).unwrap();
        assert_eq!(
            bus.writes(),
            &[
                RegWrite { addr: 0xD507, value: lo },
                RegWrite { addr: 0xD508, value: hi },
                RegWrite { addr: 0xD50B, value: 0x21 },
            ]
        );
    }

    #[test]
    fn out_of_range_note_writes_nothing() {
        let mut bus = RecordingBus::new();
        assert!(!note(&mut bus, 0, 5, 0x10, true));
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn shut_all_clears_only_gate() {
        let mut bus = RecordingBus::new();
        note(&mut bus, 1, 60, 0x40, true);
        shut_all(&mut bus);
        assert_eq!(bus.peek(voice_base(1) + SID_CTRL), 0x40);
    }
}
