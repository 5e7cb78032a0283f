//! # string-tuner - command-line host for the tuner core
//!
//! Owns everything the core leaves to its host: picking the cadence,
//! reading the instrument/key selection, and rendering results.
//!
//! ## Modes
//! - **listen**: live microphone input; one tick per captured frame
//! - **simulate**: a synthetic tone paced by a timer, no device needed
//! - **instruments** / **config**: inspect the tables and settings in use

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Receiver;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tuner_core::{
    AudioFrame, DetectionResult, Detector, FrameSource, NoteTable, PitchClass, Selection,
    TunerConfig, TunerError, audio, meter::MeterSettings, signal::SyntheticSource, transpose,
};

#[derive(Debug, Parser)]
#[command(
    name = "string-tuner",
    version,
    about = "Open-string tuner for rabeca, violin and friends"
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON instrument table (defaults to the built-in instruments)
    #[arg(long, global = true)]
    instruments: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List instruments and their strings in a key
    Instruments {
        /// Key to transpose to (defaults to each instrument's own key)
        #[arg(long)]
        key: Option<PitchClass>,
    },
    /// Print the effective configuration as JSON
    Config,
    /// Tune from the default input device
    Listen {
        #[command(flatten)]
        session: SessionArgs,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Tune a synthetic sine tone
    Simulate {
        #[command(flatten)]
        session: SessionArgs,

        /// Tone frequency in Hz
        #[arg(long)]
        frequency: f32,

        /// Tone amplitude in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,

        /// Milliseconds between ticks
        #[arg(long, default_value_t = 50)]
        interval_ms: u64,
    },
}

#[derive(Debug, Args)]
struct SessionArgs {
    #[arg(long, default_value = "Rabeca")]
    instrument: String,

    #[arg(long, default_value = "A")]
    key: PitchClass,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Frame size override
    #[arg(long)]
    frame_size: Option<usize>,

    /// Print results as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::debug!("[MAIN] Starting string-tuner {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => TunerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TunerConfig::default(),
    };
    let table = match &cli.instruments {
        Some(path) => NoteTable::load(path)
            .with_context(|| format!("loading instruments {}", path.display()))?,
        None => NoteTable::builtin().clone(),
    };

    match cli.command {
        Command::Instruments { key } => {
            list_instruments(&table, key);
            Ok(())
        }
        Command::Config => {
            println!("{}", config.to_json()?);
            Ok(())
        }
        Command::Listen { session, seconds } => {
            apply_overrides(&mut config, &session)?;
            listen(&config, table, &session, seconds)
        }
        Command::Simulate {
            session,
            frequency,
            amplitude,
            interval_ms,
        } => {
            apply_overrides(&mut config, &session)?;
            let source =
                SyntheticSource::new(frequency, amplitude, config.sample_rate, config.frame_size);
            let mut paced = Paced::new(source, Duration::from_millis(interval_ms.max(1)));
            let detector = build_detector(&config, table, &session)?;
            run_session(&detector, &mut paced, &config.meter, &session)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn apply_overrides(config: &mut TunerConfig, session: &SessionArgs) -> Result<()> {
    if let Some(frame_size) = session.frame_size {
        config.frame_size = frame_size;
    }
    config.validate().context("invalid configuration")?;
    Ok(())
}

fn build_detector(
    config: &TunerConfig,
    table: NoteTable,
    session: &SessionArgs,
) -> Result<Detector> {
    let selection = Selection::new(session.instrument.clone(), session.key);
    Detector::new(config, Arc::new(table), &selection).context("cannot start detection")
}

fn listen(
    config: &TunerConfig,
    table: NoteTable,
    session: &SessionArgs,
    seconds: Option<f64>,
) -> Result<()> {
    let detector = build_detector(config, table, session)?;
    let mut capture = audio::start_audio_capture(config)?;

    if let Some(seconds) = seconds {
        let stop = capture.stop_handle();
        let duration = Duration::try_from_secs_f64(seconds).context("invalid --seconds")?;
        thread::spawn(move || {
            thread::sleep(duration);
            log::info!("[MAIN] Time is up, stopping");
            stop.stop();
        });
    }

    let outcome = run_session(&detector, capture.source(), &config.meter, session);
    capture.close();
    outcome
}

fn run_session<S: FrameSource + ?Sized>(
    detector: &Detector,
    source: &mut S,
    meter: &MeterSettings,
    session: &SessionArgs,
) -> Result<()> {
    let mut ticks = 0;
    let outcome = detector.run(source, |result| {
        ticks += 1;
        if session.json {
            match serde_json::to_string(result) {
                Ok(line) => println!("{line}"),
                Err(e) => log::error!("[MAIN] Cannot serialize result: {}", e),
            }
        } else {
            println!("{}", render(result, meter));
        }
        match session.ticks {
            Some(limit) if ticks >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    });

    match outcome {
        Ok(()) => Ok(()),
        Err(e @ TunerError::CaptureUnavailable(_)) => Err(e).context("audio capture failed"),
        Err(e) => Err(e.into()),
    }
}

/// One line per tick: note, frequency, clamped cents, needle and tuning flag.
fn render(result: &DetectionResult, meter: &MeterSettings) -> String {
    match result.reading() {
        Some(reading) => format!(
            "{:<2} {:>8.2} Hz  {:>+6.1} cents  {:>+5.1}°{}",
            reading.note,
            reading.frequency,
            meter.clamp_cents(reading.cents_offset),
            meter.needle_angle(reading.cents_offset),
            if meter.in_tune(reading.cents_offset) { "  [in tune]" } else { "" }
        ),
        None => "--     0.00 Hz    +0.0 cents   +0.0°".to_string(),
    }
}

fn list_instruments(table: &NoteTable, key: Option<PitchClass>) {
    for profile in &table.instruments {
        let reference = transpose::reference_pitch_class(profile);
        let key = key.unwrap_or(reference);
        let notes = transpose::for_key(profile, key);
        let strings: Vec<String> = notes
            .notes()
            .iter()
            .map(|n| format!("{} {:.2}", n.name, n.frequency))
            .collect();
        println!(
            "{:<12} key {:<2} ({:+} st)  {}",
            profile.name,
            key,
            notes.semitones(),
            strings.join(" | ")
        );
    }
}

/// Paces a frame source with an external clock: one frame per tick of a
/// `crossbeam_channel::tick` timer.
struct Paced<S> {
    inner: S,
    clock: Receiver<Instant>,
}

impl<S: FrameSource> Paced<S> {
    fn new(inner: S, interval: Duration) -> Self {
        Self {
            inner,
            clock: crossbeam_channel::tick(interval),
        }
    }
}

impl<S: FrameSource> FrameSource for Paced<S> {
    fn next_frame(&mut self) -> tuner_core::error::Result<Option<AudioFrame>> {
        self.clock
            .recv()
            .map_err(|_| TunerError::CaptureUnavailable("simulation clock stopped".into()))?;
        self.inner.next_frame()
    }
}
