use cs_hw::chips::sid;
use cs_ir::{Backend, MidiPort, TimerConfig};

/// Playback settings shared by every load and play.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Where note-track files are sent. Register streams always go to the OPL3.
    pub backend: Backend,
    pub midi_port: MidiPort,
    pub timer: TimerConfig,
    /// Total passes over a looping register stream.
    pub stream_iterations: u32,
    /// Index into [`sid::INSTRUMENTS`].
    pub sid_instrument: usize,
    /// Zero-based channel played on a reserved chip voice (drums).
    pub rhythm_channel: Option<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Midi,
            midi_port: MidiPort::Primary,
            timer: TimerConfig::default(),
            stream_iterations: 2,
            sid_instrument: 0,
            rhythm_channel: None,
        }
    }
}

impl EngineConfig {
    /// The configured SID instrument, falling back to the first.
    pub fn sid_instrument(&self) -> sid::SidInstrument {
        sid::INSTRUMENTS
            .get(self.sid_instrument)
            .copied()
            .unwrap_or(sid::INSTRUMENTS[0])
    }
}
