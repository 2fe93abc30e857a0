//! Sequence feature analysis: scans decoded records to report what a file uses.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use crate::message::MessageKind;
use crate::sequence::Sequence;

/// Summary of features used in a sequence.
pub struct SequenceFeatures {
    pub tracks: usize,
    pub records: u64,
    pub total_notes: usize,
    pub note_range: Option<(u8, u8)>,
    pub channels_used: BTreeSet<u8>,
    pub programs_used: BTreeSet<u8>,
    pub has_controllers: bool,
    pub has_pitch_bend: bool,
    /// Most notes sounding at once across all tracks.
    pub peak_polyphony: usize,
}

/// Analyze a sequence and return a summary of which features it uses.
pub fn analyze(seq: &Sequence) -> SequenceFeatures {
    let mut features = SequenceFeatures {
        tracks: seq.track_count(),
        records: seq.tables.total_records(),
        total_notes: 0,
        note_range: None,
        channels_used: BTreeSet::new(),
        programs_used: BTreeSet::new(),
        has_controllers: false,
        has_pitch_bend: false,
        peak_polyphony: 0,
    };

    // (absolute time, +1 on / -1 off); offs sort first at equal times
    let mut edges: Vec<(u64, i8)> = Vec::new();

    for track in 0..seq.track_count() {
        let mut now = 0u64;
        for rec in seq.track_records(track) {
            now += rec.delta as u64;
            let Some(kind) = MessageKind::from_status(rec.status()) else {
                continue;
            };
            features.channels_used.insert(rec.channel());
            match kind {
                MessageKind::NoteOn => {
                    let n = rec.message[1];
                    features.total_notes += 1;
                    features.note_range = Some(match features.note_range {
                        Some((lo, hi)) => (lo.min(n), hi.max(n)),
                        None => (n, n),
                    });
                    edges.push((now, 1));
                }
                MessageKind::NoteOff => edges.push((now, -1)),
                MessageKind::ProgramChange => {
                    features.programs_used.insert(rec.message[1]);
                }
                MessageKind::ControlChange => features.has_controllers = true,
                MessageKind::PitchBend => features.has_pitch_bend = true,
                MessageKind::PolyPressure | MessageKind::ChannelPressure => {}
            }
        }
    }

    edges.sort_unstable();
    let mut sounding: usize = 0;
    for (_, step) in edges {
        if step > 0 {
            sounding += 1;
            features.peak_polyphony = features.peak_polyphony.max(sounding);
        } else {
            sounding = sounding.saturating_sub(1);
        }
    }

    features
}

impl fmt::Display for SequenceFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tracks:   {} ({} records)", self.tracks, self.records)?;
        writeln!(f, "Notes:    {} total", self.total_notes)?;
        if let Some((lo, hi)) = self.note_range {
            writeln!(f, "Range:    {} - {} (MIDI)", lo, hi)?;
        }
        writeln!(f, "Polyphony: {} peak", self.peak_polyphony)?;

        if self.channels_used.is_empty() {
            writeln!(f, "Channels: (none)")?;
        } else {
            let chans: Vec<alloc::string::String> =
                self.channels_used.iter().map(|c| alloc::format!("{}", c + 1)).collect();
            writeln!(f, "Channels: {}", chans.join(", "))?;
        }

        if !self.programs_used.is_empty() {
            let progs: Vec<alloc::string::String> =
                self.programs_used.iter().map(|p| alloc::format!("{}", p)).collect();
            writeln!(f, "Programs: {}", progs.join(", "))?;
        }

        writeln!(
            f,
            "Messages: Notes{}{}",
            if self.has_controllers { ", Controllers" } else { "" },
            if self.has_pitch_bend { ", PitchBend" } else { "" },
        )
    }
}
