//! Headless controller for chipseq.
//!
//! Loads a file of any supported kind, checks the target backend against the
//! machine's capabilities, and plays it either on a background thread in real
//! time or synchronously against caller-supplied registers and timer.

mod config;
mod progress;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cs_engine::{Dispatcher, EventPump, MergeScheduler, RegisterStreamPlayer, RunOutcome, StopFlag};
use cs_formats::FileKind;
use cs_hw::chips::opl3;
use cs_hw::{Capabilities, HardwareTimer, HostTimer, RecordingBus, Registers, TraceBus, VirtualTimer};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use config::EngineConfig;
pub use cs_formats::FormatError;
pub use cs_hw::{DeviceError, RegWrite};
pub use cs_ir::{Backend, MidiPort, RegisterStream, Sequence};
pub use progress::ProgressTimer;

/// Why a controller request failed.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("no file loaded")]
    NothingLoaded,
    #[error("playback already running")]
    AlreadyPlaying,
}

/// A decoded file ready to play.
#[derive(Clone, Debug)]
pub enum LoadedFile {
    NoteTrack(Arc<Sequence>),
    RegisterStream(Arc<RegisterStream>),
}

impl LoadedFile {
    /// Backend the file will be played on under `config`.
    pub fn target(&self, config: &EngineConfig) -> Backend {
        match self {
            LoadedFile::NoteTrack(_) => config.backend,
            LoadedFile::RegisterStream(_) => Backend::Opl3,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        match self {
            LoadedFile::NoteTrack(seq) => seq.info.total_seconds,
            LoadedFile::RegisterStream(stream) => stream.duration_seconds(),
        }
    }

    /// Expected length of one pass in timer units.
    pub fn total_units(&self, config: &EngineConfig) -> u64 {
        match self {
            LoadedFile::NoteTrack(seq) => seq.info.total_units,
            LoadedFile::RegisterStream(stream) => config.timer.units_for_samples(stream.header.total_samples as u64),
        }
    }
}

/// Summary of one finished or cancelled playthrough.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayReport {
    pub outcome: RunOutcome,
    /// Timer units waited.
    pub elapsed_units: u64,
    /// Events dispatched (note tracks) or register writes (streams).
    pub events: u64,
    /// Notes dropped for lack of a voice or pitch.
    pub dropped: u64,
    /// Completed jumps to a stream's loop point.
    pub loops: u32,
}

/// Register writes captured by an offline render.
#[derive(Clone, Debug)]
pub struct RenderLog {
    pub writes: Vec<RegWrite>,
    pub report: PlayReport,
}

/// Where a background playthrough has got to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub elapsed_units: u64,
    pub total_units: u64,
    pub elapsed_seconds: f64,
}

/// Headless controller: owns the loaded file and the playback thread.
pub struct Controller {
    config: EngineConfig,
    capabilities: Capabilities,
    loaded: Option<LoadedFile>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop: StopFlag,
    elapsed: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    total_units: u64,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    /// Controller for a host where every backend is available.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_capabilities(config, Capabilities::all())
    }

    pub fn with_capabilities(config: EngineConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
            loaded: None,
            playback: None,
        }
    }

    /// Read the machine ID through `regs` and keep the result.
    pub fn probe<R: Registers>(&mut self, regs: &mut R) -> Capabilities {
        self.capabilities = cs_hw::probe(regs);
        info!(machine = self.capabilities.machine_id, caps = ?self.capabilities, "probed hardware");
        self.capabilities
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Select the note-track backend. Refused if the machine lacks it.
    pub fn set_backend(&mut self, backend: Backend) -> Result<(), ControllerError> {
        self.capabilities.require(backend)?;
        self.config.backend = backend;
        Ok(())
    }

    pub fn set_midi_port(&mut self, port: MidiPort) {
        self.config.midi_port = port;
    }

    // --- Loading ---

    pub fn loaded(&self) -> Option<&LoadedFile> {
        self.loaded.as_ref()
    }

    /// Decode `data`, replacing whatever was loaded. Stops playback first.
    pub fn load(&mut self, data: &[u8]) -> Result<&LoadedFile, ControllerError> {
        self.stop();
        self.loaded = None;
        let file = match cs_formats::sniff(data) {
            FileKind::NoteTrack => LoadedFile::NoteTrack(Arc::new(cs_formats::load_smf_with(data, &self.config.timer)?)),
            FileKind::RegisterStream => LoadedFile::RegisterStream(Arc::new(cs_formats::load_vgm(data)?)),
            FileKind::Digest => LoadedFile::NoteTrack(Arc::new(cs_formats::read_digest(data)?)),
        };
        debug!(seconds = file.duration_seconds(), "file loaded");
        Ok(self.loaded.insert(file))
    }

    // --- Real-time playback ---

    /// Start playing on a background thread against traced registers and
    /// the wall clock.
    pub fn play(&mut self) -> Result<(), ControllerError> {
        if self.is_playing() {
            return Err(ControllerError::AlreadyPlaying);
        }
        self.stop();
        let file = self.loaded.clone().ok_or(ControllerError::NothingLoaded)?;
        self.capabilities.require(file.target(&self.config))?;

        let config = self.config;
        let stop = StopFlag::new();
        let elapsed = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let total_units = file.total_units(&config);

        let mut pump = stop.clone();
        let units = elapsed.clone();
        let done = finished.clone();

        let thread = std::thread::spawn(move || {
            let mut timer = HostTimer::new(config.timer);
            let report = play_file(&file, &config, TraceBus::new(), &mut ProgressTimer::new(&mut timer, &units), &mut pump);
            info!(outcome = ?report.outcome, events = report.events, dropped = report.dropped, "playback ended");
            done.store(true, Ordering::Relaxed);
        });

        self.playback = Some(PlaybackHandle {
            stop,
            elapsed,
            finished,
            total_units,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Play synchronously on the calling thread.
    pub fn play_with<R, T, P>(&self, regs: R, timer: &mut T, pump: &mut P) -> Result<PlayReport, ControllerError>
    where
        R: Registers,
        T: HardwareTimer + ?Sized,
        P: EventPump + ?Sized,
    {
        let file = self.loaded.as_ref().ok_or(ControllerError::NothingLoaded)?;
        self.capabilities.require(file.target(&self.config))?;
        Ok(play_file(file, &self.config, regs, timer, pump))
    }

    /// Request a stop and wait for the playback thread to wind down.
    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop.request_stop();
            if let Some(handle) = pb.thread.take() {
                if handle.join().is_err() {
                    warn!("playback thread panicked");
                }
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    pub fn progress(&self) -> Option<Progress> {
        let pb = self.playback.as_ref()?;
        let elapsed_units = pb.elapsed.load(Ordering::Relaxed);
        Some(Progress {
            elapsed_units,
            total_units: pb.total_units,
            elapsed_seconds: self.config.timer.seconds(elapsed_units),
        })
    }

    // --- Offline rendering ---

    /// Play instantly into a recording bus and return every register write.
    pub fn render_log(&self) -> Result<RenderLog, ControllerError> {
        let mut bus = RecordingBus::new();
        let mut timer = VirtualTimer::new();
        let report = self.play_with(&mut bus, &mut timer, &mut cs_engine::NoPump)?;
        Ok(RenderLog {
            writes: bus.take_writes(),
            report,
        })
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn play_file<R, T, P>(file: &LoadedFile, config: &EngineConfig, regs: R, timer: &mut T, pump: &mut P) -> PlayReport
where
    R: Registers,
    T: HardwareTimer + ?Sized,
    P: EventPump + ?Sized,
{
    match file {
        LoadedFile::NoteTrack(seq) => play_sequence(seq, config, regs, timer, pump),
        LoadedFile::RegisterStream(stream) => play_stream(stream, config, regs, timer, pump),
    }
}

fn play_sequence<R, T, P>(seq: &Sequence, config: &EngineConfig, regs: R, timer: &mut T, pump: &mut P) -> PlayReport
where
    R: Registers,
    T: HardwareTimer + ?Sized,
    P: EventPump + ?Sized,
{
    let mut dispatcher = Dispatcher::new(regs, config.backend, config.midi_port);
    dispatcher.set_sid_instrument(config.sid_instrument());
    dispatcher.set_rhythm_channel(config.rhythm_channel);
    dispatcher.initialize();

    let mut scheduler = MergeScheduler::new(seq);
    let outcome = without_alloc(|| scheduler.run(seq, timer, &mut dispatcher, pump));
    dispatcher.silence();

    PlayReport {
        outcome,
        elapsed_units: scheduler.session().elapsed(),
        events: scheduler.session().dispatched(),
        dropped: dispatcher.dropped(),
        loops: 0,
    }
}

fn play_stream<R, T, P>(stream: &RegisterStream, config: &EngineConfig, mut regs: R, timer: &mut T, pump: &mut P) -> PlayReport
where
    R: Registers,
    T: HardwareTimer + ?Sized,
    P: EventPump + ?Sized,
{
    let mut player = RegisterStreamPlayer::new(config.stream_iterations, config.timer);
    player.prepare(stream, &mut regs);

    let outcome = without_alloc(|| player.run(stream, &mut regs, timer, pump));
    opl3::quiet_all(&mut regs);

    PlayReport {
        outcome,
        elapsed_units: player.elapsed(),
        events: player.writes(),
        dropped: 0,
        loops: player.cursor().loops_done,
    }
}

#[cfg(feature = "alloc_check")]
fn without_alloc<T>(f: impl FnOnce() -> T) -> T {
    assert_no_alloc::assert_no_alloc(f)
}

#[cfg(not(feature = "alloc_check"))]
fn without_alloc<T>(f: impl FnOnce() -> T) -> T {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_hw::map::{MIDI_FIFO, OPL_ADDR_L};
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    /// One note on channel 0 lasting `ticks` at 96 ticks per beat.
    fn one_note(ticks: &[u8]) -> Vec<u8> {
        let mut body = vec![0x00, 0x90, 60, 100];
        body.extend_from_slice(ticks);
        body.extend_from_slice(&[0x80, 60, 64, 0x00, 0xFF, 0x2F, 0x00]);
        let mut file = b"MThd\0\0\0\x06\0\0\0\x01\0\x60MTrk".to_vec();
        file.extend_from_slice(&(body.len() as u32).to_be_bytes());
        file.extend(body);
        file
    }

    fn looping_vgm() -> Vec<u8> {
        let mut file = vec![0u8; 0x40];
        file[..4].copy_from_slice(b"Vgm ");
        file[0x08..0x0C].copy_from_slice(&0x150u32.to_le_bytes());
        file[0x1C..0x20].copy_from_slice(&(0x40u32 - 0x1C).to_le_bytes());
        file[0x34..0x38].copy_from_slice(&0x0Cu32.to_le_bytes());
        file.extend_from_slice(&[0x5E, 0x20, 0x01, 0x62, 0x66]);
        file
    }

    #[test]
    fn renders_note_track_to_midi_fifo() {
        let mut ctl = Controller::new(EngineConfig::default());
        ctl.load(&one_note(&[0x60])).unwrap();
        let log = ctl.render_log().unwrap();

        let fifo: Vec<u8> = log.writes.iter().filter(|w| w.addr == MIDI_FIFO).map(|w| w.value).collect();
        // 16 program resets, the note, then all-notes-off on 16 channels
        assert_eq!(fifo.len(), 32 + 6 + 48);
        assert_eq!(&fifo[32..38], &[0x90, 60, 100, 0x80, 60, 64]);
        assert_eq!(log.report.outcome, RunOutcome::Drained);
        assert_eq!(log.report.events, 2);
        assert_eq!(log.report.elapsed_units, 12_582_900);
    }

    #[test]
    fn renders_register_stream_with_one_loop() {
        let mut ctl = Controller::new(EngineConfig::default());
        assert!(matches!(ctl.load(&looping_vgm()).unwrap(), LoadedFile::RegisterStream(_)));
        let log = ctl.render_log().unwrap();

        assert_eq!(log.report.loops, 1);
        assert_eq!(log.report.events, 2);
        assert_eq!(log.report.elapsed_units, 2 * 0x66666);
        let regs: Vec<u8> = log.writes.iter().filter(|w| w.addr == OPL_ADDR_L).map(|w| w.value).collect();
        assert_eq!(regs.iter().filter(|&&r| r == 0x20).count(), 2);
    }

    #[test]
    fn play_requires_a_file() {
        let mut ctl = Controller::new(EngineConfig::default());
        assert!(matches!(ctl.play(), Err(ControllerError::NothingLoaded)));
        assert!(matches!(ctl.render_log(), Err(ControllerError::NothingLoaded)));
    }

    #[test]
    fn unavailable_backend_is_refused() {
        let mut ctl = Controller::with_capabilities(EngineConfig::default(), Capabilities::none());
        assert!(matches!(
            ctl.set_backend(Backend::Sid),
            Err(ControllerError::Device(DeviceError::Unavailable(Backend::Sid)))
        ));
        ctl.load(&looping_vgm()).unwrap();
        assert!(matches!(ctl.render_log(), Err(ControllerError::Device(_))));
    }

    #[test]
    fn load_error_is_reported() {
        let mut ctl = Controller::new(EngineConfig::default());
        assert!(matches!(ctl.load(b"MThd\0\0"), Err(ControllerError::Format(FormatError::UnexpectedEof))));
        assert!(ctl.loaded().is_none());
    }

    #[test]
    fn background_playback_finishes() {
        let mut ctl = Controller::new(EngineConfig::default());
        // two ticks at 120 bpm: about 10 ms
        ctl.load(&one_note(&[0x02])).unwrap();
        ctl.play().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !ctl.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(ctl.is_finished());
        assert!(!ctl.is_playing());
        let progress = ctl.progress().unwrap();
        assert_eq!(progress.elapsed_units, progress.total_units);
    }

    #[test]
    fn second_play_while_running_is_refused() {
        let mut ctl = Controller::new(EngineConfig::default());
        // 384 ticks: two seconds
        ctl.load(&one_note(&[0x83, 0x00])).unwrap();
        ctl.play().unwrap();
        assert!(matches!(ctl.play(), Err(ControllerError::AlreadyPlaying)));
        ctl.stop();
        assert!(!ctl.is_playing());
        assert!(ctl.progress().is_none());
    }
}
