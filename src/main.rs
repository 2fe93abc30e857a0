//! chipseq CLI: inspect, play and pre-digest sequencer files.
//!
//! Usage:
//!   chipseq info song.mid
//!   chipseq play song.mid --backend opl3
//!   chipseq play tune.vgm --loops 3 --dry-run
//!   chipseq play song.mid --backend sid --rhythm-channel 10
//!   chipseq digest song.mid song.dig

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cs_hw::chips::sid;
use cs_master::{Backend, Controller, EngineConfig, LoadedFile, MidiPort};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chipseq")]
#[command(author, version, about = "Note-track and register-stream sequencer for F256 sound hardware")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print header and content summary of a file
    Info {
        file: PathBuf,
    },

    /// Play a file in real time, or render it instantly with --dry-run
    Play {
        file: PathBuf,

        /// Backend for note-track files (midi, sid, psg, opl3)
        #[arg(short, long, default_value_t = Backend::Midi)]
        backend: Backend,

        /// Send MIDI to the second synth FIFO
        #[arg(long)]
        alt_port: bool,

        /// Total passes over a looping register stream
        #[arg(short, long, default_value_t = 2)]
        loops: u32,

        /// SID instrument index
        #[arg(long, default_value_t = 0)]
        sid_instrument: usize,

        /// Play this MIDI channel (1-16) on its own reserved chip voice
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
        rhythm_channel: Option<u8>,

        /// Render against a recording bus and virtual timer instead
        #[arg(long)]
        dry_run: bool,
    },

    /// Save a MIDI file's decoded tables as a digest
    Digest {
        input: PathBuf,
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Info { file } => info(&file),
        Commands::Play {
            file,
            backend,
            alt_port,
            loops,
            sid_instrument,
            rhythm_channel,
            dry_run,
        } => {
            if sid_instrument >= sid::INSTRUMENTS.len() {
                bail!("SID instrument must be below {}", sid::INSTRUMENTS.len());
            }
            let config = EngineConfig {
                backend,
                midi_port: if alt_port { MidiPort::Alternate } else { MidiPort::Primary },
                stream_iterations: loops,
                sid_instrument,
                rhythm_channel: rhythm_channel.map(|c| c - 1),
                ..EngineConfig::default()
            };
            play(&file, config, dry_run)
        }
        Commands::Digest { input, output } => digest(&input, &output),
    }
}

fn load(path: &Path, config: EngineConfig) -> Result<Controller> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut ctl = Controller::new(config);
    ctl.load(&data)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(ctl)
}

fn info(path: &Path) -> Result<()> {
    let ctl = load(path, EngineConfig::default())?;
    match ctl.loaded().context("nothing loaded")? {
        LoadedFile::NoteTrack(seq) => {
            let info = &seq.info;
            println!("Title:    {}", if info.title.is_empty() { "(untitled)" } else { info.title.as_str() });
            println!("Format:   {}", info.format);
            println!("Division: {:?}", info.division);
            println!("Tempo:    {} BPM ({} changes)", info.bpm(), info.tempo_changes);
            println!(
                "Meter:    {}/{}",
                info.time_signature.numerator,
                1u32 << info.time_signature.denominator_pow.min(31)
            );
            println!("Length:   {:.2} s", info.total_seconds);
            println!();
            print!("{}", cs_ir::analyze(seq));
        }
        LoadedFile::RegisterStream(stream) => {
            let h = &stream.header;
            println!("Version:  {}.{:02x}", h.version >> 8, h.version & 0xFF);
            println!("Chip:     {:?}", stream.fm_mode());
            println!("Length:   {:.2} s ({} samples)", stream.duration_seconds(), h.total_samples);
            match stream.loop_offset {
                Some(offset) => println!("Loop:     {} samples from command byte {}", h.loop_samples, offset),
                None => println!("Loop:     none"),
            }
            println!("Commands: {} bytes", stream.commands.len());
        }
    }
    Ok(())
}

fn play(path: &Path, config: EngineConfig, dry_run: bool) -> Result<()> {
    let mut ctl = load(path, config)?;
    debug!(?config, dry_run, "starting playback");

    if dry_run {
        let log = ctl.render_log()?;
        let r = log.report;
        println!("Outcome:  {:?}", r.outcome);
        println!("Events:   {} ({} dropped)", r.events, r.dropped);
        println!("Loops:    {}", r.loops);
        println!("Writes:   {}", log.writes.len());
        println!("Elapsed:  {:.2} s", config.timer.seconds(r.elapsed_units));
        return Ok(());
    }

    ctl.play()?;
    println!("Playing...");
    while ctl.is_playing() {
        if let Some(p) = ctl.progress() {
            print!("\r{:7.2} s", p.elapsed_seconds);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    ctl.stop();
    println!("\rDone.          ");
    Ok(())
}

fn digest(input: &Path, output: &Path) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let seq = cs_formats::load_smf(&data).with_context(|| format!("failed to parse {}", input.display()))?;
    let mut file = std::fs::File::create(output).with_context(|| format!("failed to create {}", output.display()))?;
    let written = cs_formats::write_digest(&mut file, &seq)?;
    println!("{} bytes written to {}", written, output.display());
    Ok(())
}
