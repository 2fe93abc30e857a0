//! End-to-end note-track playback: SMF bytes through the loader, merge
//! scheduler and dispatcher into a recording bus.

use cs_engine::{Dispatcher, EventSink, MergeScheduler, NoPump, RunOutcome};
use cs_hw::map::{MIDI_FIFO, MIDI_FIFO_ALT};
use cs_hw::{RecordingBus, VirtualTimer};
use cs_ir::{Backend, MidiPort, TrackEventRecord};
use cs_master::{Controller, EngineConfig};
use pretty_assertions::assert_eq;

fn smf(division: u16, tracks: &[&[u8]]) -> Vec<u8> {
    let mut buf = b"MThd\0\0\0\x06\0\x01".to_vec();
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&division.to_be_bytes());
    for body in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(body.len() as u32 + 4).to_be_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    }
    buf
}

/// Units for `ticks` at 96 ticks per beat and 120 bpm.
fn units(ticks: u64) -> u64 {
    ticks * 500_000 * 25_165_800 / (96 * 1_000_000)
}

#[derive(Default)]
struct Log {
    events: Vec<(u64, usize, [u8; 3])>,
}

impl EventSink for Log {
    fn dispatch(&mut self, at: u64, track: usize, record: &TrackEventRecord) {
        self.events.push((at, track, record.message));
    }
}

#[test]
fn scenario_two_tracks_interleave() {
    // track 0: on64 at 5, off64 at 10; track 1: on60 at 0, off60 at 10
    let file = smf(
        96,
        &[
            &[0x05, 0x90, 64, 100, 0x05, 0x80, 64, 0x40],
            &[0x00, 0x90, 60, 100, 0x0A, 0x80, 60, 0x40],
        ],
    );
    let seq = cs_formats::load_smf(&file).unwrap();
    let mut log = Log::default();
    let mut timer = VirtualTimer::new();
    let outcome = MergeScheduler::new(&seq).run(&seq, &mut timer, &mut log, &mut NoPump);

    assert_eq!(outcome, RunOutcome::Drained);
    assert_eq!(
        log.events,
        vec![
            (0, 1, [0x90, 60, 100]),
            (units(5), 0, [0x90, 64, 100]),
            (units(10), 0, [0x80, 64, 0x40]),
            (units(10), 1, [0x80, 60, 0x40]),
        ]
    );
    assert_eq!(timer.elapsed(), units(10));
}

#[test]
fn dispatch_times_are_prefix_sums_of_deltas() {
    let file = smf(
        96,
        &[
            &[0x00, 0x90, 60, 1, 0x30, 0x80, 60, 0, 0x81, 0x00, 0x90, 62, 1, 0x07, 0x80, 62, 0],
            &[0x11, 0x91, 50, 1, 0x83, 0x60, 0x81, 50, 0],
            &[0x60, 0xC2, 4, 0x01, 0x92, 70, 1, 0x01, 0x82, 70, 0],
        ],
    );
    let seq = cs_formats::load_smf(&file).unwrap();
    let mut log = Log::default();
    MergeScheduler::new(&seq).run(&seq, &mut VirtualTimer::new(), &mut log, &mut NoPump);

    for track in 0..seq.track_count() {
        let mut sum = 0u64;
        let expected: Vec<u64> = seq
            .track_records(track)
            .map(|r| {
                sum += r.delta as u64;
                sum
            })
            .collect();
        let got: Vec<u64> = log.events.iter().filter(|e| e.1 == track).map(|e| e.0).collect();
        assert_eq!(got, expected, "track {track}");
    }
    // merged stream never goes back in time
    assert!(log.events.windows(2).all(|w| w[0].0 <= w[1].0));
}

/// `count` notes struck together on channel 0, released a beat later.
fn chord(count: u8) -> Vec<u8> {
    let mut body = Vec::new();
    for i in 0..count {
        body.extend_from_slice(&[0x00, 0x90, 48 + i, 100]);
    }
    body.extend_from_slice(&[0x60, 0x80, 48, 0]);
    for i in 1..count {
        body.extend_from_slice(&[0x00, 0x80, 48 + i, 0]);
    }
    body
}

fn render(file: &[u8], config: EngineConfig) -> cs_master::RenderLog {
    let mut ctl = Controller::new(config);
    ctl.load(file).unwrap();
    ctl.render_log().unwrap()
}

#[test]
fn sid_drops_the_seventh_voice() {
    let log = render(&smf(96, &[chord(7).as_slice()]), EngineConfig { backend: Backend::Sid, ..Default::default() });
    assert_eq!(log.report.dropped, 1);
    assert_eq!(log.report.events, 14);
}

#[test]
fn psg_drops_the_seventh_voice() {
    let log = render(&smf(96, &[chord(7).as_slice()]), EngineConfig { backend: Backend::Psg, ..Default::default() });
    assert_eq!(log.report.dropped, 1);
}

#[test]
fn opl3_holds_nine_voices() {
    let nine = render(&smf(96, &[chord(9).as_slice()]), EngineConfig { backend: Backend::Opl3, ..Default::default() });
    assert_eq!(nine.report.dropped, 0);
    let ten = render(&smf(96, &[chord(10).as_slice()]), EngineConfig { backend: Backend::Opl3, ..Default::default() });
    assert_eq!(ten.report.dropped, 1);
}

#[test]
fn voices_are_all_free_after_playback() {
    let seq = cs_formats::load_smf(&smf(96, &[chord(6).as_slice(), chord(3).as_slice()])).unwrap();
    for backend in [Backend::Sid, Backend::Psg, Backend::Opl3] {
        let mut dispatcher = Dispatcher::new(RecordingBus::without_log(), backend, MidiPort::Primary);
        dispatcher.initialize();
        MergeScheduler::new(&seq).run(&seq, &mut VirtualTimer::new(), &mut dispatcher, &mut NoPump);
        let bank = dispatcher.bank(backend).unwrap();
        assert_eq!(bank.active_count(), 0, "{backend}");
    }
}

#[test]
fn alternate_port_carries_notes_and_mirrors_program_changes() {
    let file = smf(96, &[&[0x00, 0xC3, 9, 0x00, 0x93, 60, 100, 0x10, 0x83, 60, 0]]);
    let log = render(&file, EngineConfig { midi_port: MidiPort::Alternate, ..Default::default() });

    let alt: Vec<u8> = log.writes.iter().filter(|w| w.addr == MIDI_FIFO_ALT).map(|w| w.value).collect();
    let primary: Vec<u8> = log.writes.iter().filter(|w| w.addr == MIDI_FIFO).map(|w| w.value).collect();
    // 32 bytes of program resets lead the alternate FIFO
    assert_eq!(&alt[32..40], &[0xC3, 9, 0x93, 60, 100, 0x83, 60, 0]);
    assert_eq!(primary, vec![0xC3, 9]);
}

#[test]
fn long_silence_keeps_later_notes_on_time() {
    // gaps of 100 s and 200 s at 96 ticks per beat, 120 bpm
    let file = smf(
        96,
        &[&[
            0x00, 0x90, 60, 100, 0x81, 0x96, 0x00, 0x80, 60, 0, 0x81, 0x96, 0x00, 0x90, 62, 100, 0x82, 0xAC, 0x00,
            0x80, 62, 0,
        ]],
    );
    let seq = cs_formats::load_smf(&file).unwrap();
    let mut log = Log::default();
    MergeScheduler::new(&seq).run(&seq, &mut VirtualTimer::new(), &mut log, &mut NoPump);
    let last = log.events.iter().rev().find(|e| e.2 == [0x80, 62, 0]).map(|e| e.0);
    assert_eq!(last, Some(400 * 25_165_800));

    let render = render(&file, EngineConfig::default());
    assert_eq!(render.report.elapsed_units, seq.info.total_units);
    let fifo: Vec<u8> = render.writes.iter().filter(|w| w.addr == MIDI_FIFO).map(|w| w.value).collect();
    assert_eq!(&fifo[32..44], &[0x90, 60, 100, 0x80, 60, 0, 0x90, 62, 100, 0x80, 62, 0]);
    assert_eq!(fifo.len(), 32 + 12 + 48);
}

#[test]
fn rhythm_channel_keeps_a_voice_for_drums() {
    let drums: &[u8] = &[0x00, 0x99, 62, 100, 0x60, 0x89, 62, 0];
    let config = EngineConfig {
        backend: Backend::Sid,
        rhythm_channel: Some(9),
        ..Default::default()
    };
    let five = render(&smf(96, &[chord(5).as_slice(), drums]), config);
    assert_eq!(five.report.dropped, 0);
    let six = render(&smf(96, &[chord(6).as_slice(), drums]), config);
    assert_eq!(six.report.dropped, 1);
}
