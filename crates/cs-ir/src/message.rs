//! MIDI status byte classification.

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;

pub const SYSEX: u8 = 0xF0;
pub const SYSEX_ESCAPE: u8 = 0xF7;
pub const META: u8 = 0xFF;

/// Velocity written into note-offs synthesized from zero-velocity note-ons.
pub const RELEASE_VELOCITY: u8 = 0x7F;

/// Controller number for "all notes off".
pub const CC_ALL_NOTES_OFF: u8 = 0x7B;

/// Meta event types the decoder acts on.
pub mod meta {
    pub const TRACK_NAME: u8 = 0x03;
    pub const END_OF_TRACK: u8 = 0x2F;
    pub const SET_TEMPO: u8 = 0x51;
    pub const TIME_SIGNATURE: u8 = 0x58;
}

/// Kind of channel-voice message, by status high nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    NoteOff,
    NoteOn,
    PolyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
}

impl MessageKind {
    /// Classify a channel-voice status byte. `None` for data bytes and system messages.
    pub const fn from_status(status: u8) -> Option<Self> {
        Some(match status & 0xF0 {
            NOTE_OFF => Self::NoteOff,
            NOTE_ON => Self::NoteOn,
            POLY_PRESSURE => Self::PolyPressure,
            CONTROL_CHANGE => Self::ControlChange,
            PROGRAM_CHANGE => Self::ProgramChange,
            CHANNEL_PRESSURE => Self::ChannelPressure,
            PITCH_BEND => Self::PitchBend,
            _ => return None,
        })
    }

    /// Total message length including the status byte.
    pub const fn byte_count(self) -> u8 {
        match self {
            Self::ProgramChange | Self::ChannelPressure => 2,
            _ => 3,
        }
    }
}
