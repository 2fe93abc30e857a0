//! OPL3 (YMF262) FM chip, driven as nine two-operator channels on port 0.

use crate::map::*;
use crate::registers::Registers;
use cs_ir::FmMode;

pub const VOICES: usize = 9;

/// F-numbers for one octave, starting at C.
pub const FNUMS: [u16; 12] = [
    0x205, 0x223, 0x244, 0x267, 0x28B, 0x2B2, 0x2DB, 0x306, 0x334, 0x365, 0x399, 0x3CF,
];

/// Lowest note whose block number is non-negative.
pub const LOWEST_NOTE: u8 = 19;
/// Highest note whose block number fits in three bits.
pub const HIGHEST_NOTE: u8 = 114;

/// Two-operator voice settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opl3Patch {
    pub op1_tvskf: u8,
    pub op2_tvskf: u8,
    pub op1_kslvol: u8,
    pub op2_kslvol: u8,
    pub op1_ad: u8,
    pub op2_ad: u8,
    pub op1_sr: u8,
    pub op2_sr: u8,
    pub op1_wav: u8,
    pub op2_wav: u8,
    /// Feedback/connection plus the left/right output bits.
    pub feed: u8,
}

impl Opl3Patch {
    /// Plain sustained sine-ish organ tone on both speakers.
    pub const ORGAN: Opl3Patch = Opl3Patch {
        op1_tvskf: 0x21,
        op2_tvskf: 0x21,
        op1_kslvol: 0x1F,
        op2_kslvol: 0x00,
        op1_ad: 0xF2,
        op2_ad: 0xF2,
        op1_sr: 0x54,
        op2_sr: 0x56,
        op1_wav: 0x00,
        op2_wav: 0x00,
        feed: 0x30,
    };
}

/// Write one register. Addresses at or above 0x100 go to port 1.
pub fn write<R: Registers>(regs: &mut R, addr: u16, value: u8) {
    if addr < 0x100 {
        regs.poke(OPL_ADDR_L, addr as u8);
    } else {
        regs.poke(OPL_ADDR_H, (addr & 0xFF) as u8);
    }
    regs.poke(OPL_DATA, value);
}

/// `(fnum, block)` for `note`, if in range.
pub fn pitch(note: u8) -> Option<(u16, u8)> {
    if !(LOWEST_NOTE..=HIGHEST_NOTE).contains(&note) {
        return None;
    }
    let shifted = note as u16 + 5;
    Some((FNUMS[(shifted % 12) as usize], (shifted / 12 - 2) as u8))
}

/// Operator-register offset of the first operator of `channel` (0-8).
pub fn operator_offset(channel: usize) -> u16 {
    let mut offset = channel as u16;
    if channel > 2 {
        offset += 5;
    }
    if channel > 5 {
        offset += 5;
    }
    offset
}

/// Reset the chip into OPL3 mode with all channels keyed off.
pub fn initialize<R: Registers>(regs: &mut R) {
    write(regs, OPL_EN, 0x20);
    write(regs, OPL_T1, 0x00);
    write(regs, OPL_T2, 0x00);
    write(regs, OPL_FOE, 0x00);
    write(regs, OPL_OPL3, 0x01);
    write(regs, OPL_CSW, 0x00);
    write(regs, OPL_PERC, 0x00);
    for ch in 0..VOICES as u16 {
        write(regs, OPL_CH_FEED | ch, 0x30);
        write(regs, 0x100 | OPL_CH_FEED | ch, 0x30);
    }
    quiet_all(regs);
}

/// Select OPL2 or OPL3 register behavior.
pub fn set_mode<R: Registers>(regs: &mut R, mode: FmMode) {
    write(regs, OPL_OPL3, matches!(mode, FmMode::Opl3) as u8);
}

/// Load `patch` into `channel` on port 0.
pub fn set_patch<R: Registers>(regs: &mut R, channel: usize, patch: &Opl3Patch) {
    let op = operator_offset(channel);
    let pairs = [
        (OPL_OP_WAV, patch.op1_wav, patch.op2_wav),
        (OPL_OP_TVSKF, patch.op1_tvskf, patch.op2_tvskf),
        (OPL_OP_KSLVOL, patch.op1_kslvol, patch.op2_kslvol),
        (OPL_OP_AD, patch.op1_ad, patch.op2_ad),
        (OPL_OP_SR, patch.op1_sr, patch.op2_sr),
    ];
    for (base, op1, op2) in pairs {
        write(regs, base + op, op1);
        write(regs, base + op + 3, op2);
    }
    write(regs, OPL_CH_FEED + channel as u16, patch.feed);
}

/// Key a channel on or off. Returns false (no writes) if `note` is out of range.
pub fn note<R: Registers>(regs: &mut R, channel: usize, note: u8, on: bool) -> bool {
    let Some((fnum, block)) = pitch(note) else {
        return false;
    };
    let ch = channel as u16;
    write(regs, OPL_CH_F_LO + ch, (fnum & 0xFF) as u8);
    let key = if on { 0x20 } else { 0x00 };
    write(regs, OPL_CH_KBF_HI + ch, ((fnum >> 8) & 0x03) as u8 | (block << 2) | key);
    true
}

/// Clear key-on on every channel of both ports.
pub fn quiet_all<R: Registers>(regs: &mut R) {
    for ch in 0..VOICES as u16 {
        write(regs, OPL_CH_KBF_HI | ch, 0x00);
    }
    for ch in 0..VOICES as u16 {
        write(regs, 0x100 | OPL_CH_KBF_HI | ch, 0x00);
    }
}
