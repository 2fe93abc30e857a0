//! F256 I/O register addresses used by the sequencer.

// Machine identification
pub const VKY_MID: u16 = 0xD6A7;

// Timer 0 (24-bit comparator)
pub const TM0_CTRL: u16 = 0xD650;
pub const TM0_CMP_CTRL: u16 = 0xD654;
pub const TM0_CMP_L: u16 = 0xD655;
pub const TM0_CMP_M: u16 = 0xD656;
pub const TM0_CMP_H: u16 = 0xD657;

pub const TM_CTRL_ENABLE: u8 = 0x01;
pub const TM_CTRL_CLEAR: u8 = 0x02;
pub const TM_CTRL_UP_DOWN: u8 = 0x08;
pub const TM_CTRL_INTEN: u8 = 0x80;

// Interrupt controller
pub const INT_PEND_0: u16 = 0xD660;
pub const INT_TIMER_0: u8 = 0x10;

// SID pair
pub const SID1: u16 = 0xD400;
pub const SID2: u16 = 0xD500;
pub const SID_VOICE_OFFSETS: [u16; 3] = [0x00, 0x07, 0x0E];
pub const SID_LO_B: u16 = 0x00;
pub const SID_HI_B: u16 = 0x01;
pub const SID_LO_PWDC: u16 = 0x02;
pub const SID_HI_PWDC: u16 = 0x03;
pub const SID_CTRL: u16 = 0x04;
pub const SID_ATK_DEC: u16 = 0x05;
pub const SID_SUS_REL: u16 = 0x06;
pub const SID_FCF_LO: u16 = 0x14;
pub const SID_FCF_HI: u16 = 0x15;
pub const SID_FRR: u16 = 0x17;
pub const SID_FM_VC: u16 = 0x18;
pub const SID_LAST_REG: u16 = 0x18;

// PSG pair
pub const PSG_LEFT: u16 = 0xD600;
pub const PSG_RIGHT: u16 = 0xD610;
pub const PSG_CHANNEL_BITS: [u8; 3] = [0x00, 0x20, 0x40];
pub const PSG_SILENCE: u8 = 0x0F;

// OPL3
pub const OPL_ADDR_L: u16 = 0xD580;
pub const OPL_DATA: u16 = 0xD581;
pub const OPL_ADDR_H: u16 = 0xD582;

pub const OPL_EN: u16 = 0x01;
pub const OPL_T1: u16 = 0x02;
pub const OPL_T2: u16 = 0x03;
pub const OPL_CSW: u16 = 0x08;
pub const OPL_PERC: u16 = 0xBD;
pub const OPL_FOE: u16 = 0x104;
pub const OPL_OPL3: u16 = 0x105;

pub const OPL_CH_F_LO: u16 = 0xA0;
pub const OPL_CH_KBF_HI: u16 = 0xB0;
pub const OPL_CH_FEED: u16 = 0xC0;
pub const OPL_OP_TVSKF: u16 = 0x20;
pub const OPL_OP_KSLVOL: u16 = 0x40;
pub const OPL_OP_AD: u16 = 0x60;
pub const OPL_OP_SR: u16 = 0x80;
pub const OPL_OP_WAV: u16 = 0xE0;

// MIDI synth FIFOs
pub const MIDI_FIFO: u16 = 0xDDA1;
pub const MIDI_FIFO_ALT: u16 = 0xDDB1;
