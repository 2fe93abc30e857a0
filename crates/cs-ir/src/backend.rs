//! Sound generation backends.

use core::fmt;
use core::str::FromStr;

/// A family of sound hardware the dispatcher can drive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Backend {
    /// External or built-in MIDI synthesizer (raw bytes to a FIFO).
    #[default]
    Midi,
    /// Pair of SID chips, 3 voices each.
    Sid,
    /// Pair of PSG chips, 3 tone channels each.
    Psg,
    /// OPL3 FM chip, 9 two-operator channels.
    Opl3,
}

impl Backend {
    pub const ALL: [Backend; 4] = [Backend::Midi, Backend::Sid, Backend::Psg, Backend::Opl3];

    /// Number of tracked voices. `None` for MIDI, which is not tracked.
    pub const fn voice_count(self) -> Option<usize> {
        match self {
            Backend::Midi => None,
            Backend::Sid => Some(6),
            Backend::Psg => Some(6),
            Backend::Opl3 => Some(9),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Backend::Midi => "midi",
            Backend::Sid => "sid",
            Backend::Psg => "psg",
            Backend::Opl3 => "opl3",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognized backend name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownBackend;

impl fmt::Display for UnknownBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected one of: midi, sid, psg, opl3")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownBackend {}

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or(UnknownBackend)
    }
}

/// Which MIDI FIFO receives note traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MidiPort {
    #[default]
    Primary,
    Alternate,
}

impl MidiPort {
    pub const fn other(self) -> Self {
        match self {
            MidiPort::Primary => MidiPort::Alternate,
            MidiPort::Alternate => MidiPort::Primary,
        }
    }
}
