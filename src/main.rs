use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::Write;

use neo_pulse::audio::BufferSource;
use neo_pulse::midi::{self, CompositionSettings, MidiEvent, Playhead};
use neo_pulse::neo::{self, NeoRecord};
use neo_pulse::{TickInput, VisualizerConfig, VisualizerSession};

#[derive(Parser)]
#[command(name = "neo-pulse")]
#[command(about = "Drives near-Earth object visuals from audio and MIDI, headless")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the visual pipeline at a fixed frame rate and report what happened
    Run(RunArgs),
    /// Turn NEO close approaches into a MIDI event list
    Compose(ComposeArgs),
    /// Write the default configuration
    Config {
        #[arg(long, short, default_value = "neo_pulse.json")]
        output: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// NEO feed JSON (NeoWs feed or array of objects)
    #[arg(long)]
    neo: String,

    /// WAV file to analyze while running
    #[arg(long)]
    audio: Option<String>,

    /// Capture the default input device instead of a file (needs the
    /// `live-input` feature)
    #[arg(long, conflicts_with = "audio")]
    live: bool,

    /// MIDI event list (JSON)
    #[arg(long, conflicts_with = "compose")]
    events: Option<String>,

    /// Generate MIDI events from the NEO data itself
    #[arg(long)]
    compose: bool,

    /// Configuration file
    #[arg(long)]
    config: Option<String>,

    /// Frames to run (0 = until audio or events run out)
    #[arg(long, default_value = "0")]
    frames: usize,

    #[arg(long, default_value = "60")]
    fps: f32,

    /// MIDI sync offset in seconds, overrides the config
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<f64>,

    /// Write a JSON report here
    #[arg(long, short)]
    output: Option<String>,
}

#[derive(Args)]
struct ComposeArgs {
    #[arg(long)]
    neo: String,

    #[arg(long, short, default_value = "neo_events.json")]
    output: String,

    #[arg(long, default_value = "3.0")]
    minutes: f64,

    #[arg(long, default_value = "A")]
    key: String,

    #[arg(long, default_value = "minor_pentatonic")]
    mode: String,

    #[arg(long, default_value = "60.0")]
    modulation_every: f64,
}

#[derive(Debug, Serialize)]
struct FrameSummary {
    timestamp: f64,
    loudness: f32,
    mean_pulse: f32,
    fired: usize,
    surged: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    objects: usize,
    bands: usize,
    frames: usize,
    frame_rate: f32,
    total_fired: usize,
    flashes: usize,
    pending_events: usize,
    frame_data: Vec<FrameSummary>,
}

const MAX_DEFAULT_SECONDS: f64 = 600.0;

fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => VisualizerConfig::load(path)?,
        None => VisualizerConfig::default(),
    };
    if let Some(offset) = args.offset {
        config.midi_offset_seconds = offset;
    }
    config.validate()?;

    let records = neo::load_records(&args.neo)?;
    let mut session = VisualizerSession::new(config.clone())?;
    session.set_objects(records.clone());

    let mut duration = 0.0f64;
    if let Some(path) = &args.audio {
        let source = BufferSource::from_wav(path)?;
        duration = duration.max(source.duration_seconds());
        session.attach_source(Box::new(source));
    }
    if args.live {
        attach_live(&mut session, &config)?;
    }

    let events: Vec<MidiEvent> = match (&args.events, args.compose) {
        (Some(path), _) => midi::load_events(path)?,
        (None, true) => midi::compose(&records, &CompositionSettings::default()),
        (None, false) => Vec::new(),
    };
    if let Some(last) = events.iter().map(|e| e.time).reduce(f64::max) {
        duration = duration.max(last + 1.0);
    }
    session.load_midi(events);

    let fps = if args.fps.is_finite() && args.fps > 0.0 { args.fps } else { 60.0 };
    let frames = if args.frames > 0 {
        args.frames
    } else {
        if duration <= 0.0 {
            warn!("Nothing to play; running one second of silence");
            duration = 1.0;
        }
        (duration.min(MAX_DEFAULT_SECONDS) * fps as f64).ceil() as usize
    };

    info!("Running {} frames at {} fps for {} objects", frames, fps, records.len());

    let dt = 1.0 / fps;
    let mut playhead = Playhead::new(config.midi_offset_seconds);
    let mut frame_data = Vec::with_capacity(frames);
    let mut total_fired = 0;
    let mut flashes = 0;

    for _ in 0..frames {
        playhead.advance(dt as f64);
        let output = session.tick(TickInput {
            playhead_seconds: playhead.position(),
            offset_seconds: playhead.offset(),
            dt,
        });

        total_fired += output.fired.len();
        if output.surged {
            flashes += 1;
        }
        let mean_pulse = if output.visuals.is_empty() {
            0.0
        } else {
            output.visuals.iter().map(|v| v.pulse).sum::<f32>() / output.visuals.len() as f32
        };
        frame_data.push(FrameSummary {
            timestamp: playhead.position(),
            loudness: output.loudness,
            mean_pulse,
            fired: output.fired.len(),
            surged: output.surged,
        });
    }

    let report = RunReport {
        objects: records.len(),
        bands: config.band_count(),
        frames,
        frame_rate: fps,
        total_fired,
        flashes,
        pending_events: session.scheduler().pending(),
        frame_data,
    };

    info!("✅ Run complete");
    info!("  Objects: {} across {} bands", report.objects, report.bands);
    info!("  MIDI events fired: {} ({} still pending)", report.total_fired, report.pending_events);
    info!("  Loudness flashes: {}", report.flashes);

    if let Some(path) = &args.output {
        let json_output = serde_json::to_string_pretty(&report)?;
        let mut file = File::create(path)?;
        file.write_all(json_output.as_bytes())?;
        info!("📄 Report written to: {}", path);
    }

    Ok(())
}

#[cfg(feature = "live-input")]
fn attach_live(session: &mut VisualizerSession, config: &VisualizerConfig) -> Result<()> {
    let source = neo_pulse::audio::LiveSource::new(config.fft_size)?;
    session.attach_source(Box::new(source));
    Ok(())
}

#[cfg(not(feature = "live-input"))]
fn attach_live(_session: &mut VisualizerSession, _config: &VisualizerConfig) -> Result<()> {
    anyhow::bail!("--live needs a build with the live-input feature")
}

fn compose(args: ComposeArgs) -> Result<()> {
    let records: Vec<NeoRecord> = neo::load_records(&args.neo)?;
    let settings = CompositionSettings {
        minutes: args.minutes,
        key: args.key,
        mode: args.mode,
        modulation_every: args.modulation_every,
        ..Default::default()
    };

    let events = midi::compose(&records, &settings);
    let hazards = records.iter().filter(|r| r.hazardous).count();
    midi::save_events(&events, &args.output)?;
    info!(
        "Saved {} with {} notes and {} drum hits",
        args.output,
        events.len() - hazards,
        hazards
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Compose(args) => compose(args),
        Command::Config { output } => {
            VisualizerConfig::default().save(&output)?;
            info!("Default configuration written to {}", output);
            Ok(())
        }
    }
}
