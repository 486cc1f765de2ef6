use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use lesson_engine::time::{format_timestamp, format_timestamp_centis, parse_timestamp};
use lesson_engine::{
    EngineError, JsonFilePreferences, MemoryPreferences, PlaybackMachine, PlaybackMode,
    PollSample, PreferenceStore, Result, SessionConfig, SessionHandle, Transcript,
    TranscriptSegment,
};
use lesson_player::{SimulatedMedia, SimulatedPlayerFactory};
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lesson", about = "Lesson transcript and playback tools")]
struct Cli {
    /// Session timing overrides (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a transcript, optionally resolving the line at a timestamp.
    Inspect {
        file: PathBuf,
        /// Position as `HH:MM:SS[.fff]`.
        #[arg(long)]
        at: Option<String>,
    },
    /// Feed a position stream (seconds) through the playback state machine.
    Replay {
        file: PathBuf,
        #[arg(long, value_delimiter = ',', required = true, value_parser = parse_seconds)]
        positions: Vec<f64>,
    },
    /// Strip annotations, collapse whitespace and clip overlaps.
    Normalize {
        file: PathBuf,
        /// Write here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Play a transcript against a simulated player and print line changes.
    Simulate {
        file: PathBuf,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// How long to play, in seconds.
        #[arg(long, default_value_t = 10.0, value_parser = parse_wait)]
        seconds: f64,
        /// Preference file that remembers the playback mode.
        #[arg(long)]
        prefs: Option<PathBuf>,
        /// Toggle the playback mode after this many seconds.
        #[arg(long, value_parser = parse_wait)]
        switch_after: Option<f64>,
    },
}

/// Accepts a finite, non-negative number of seconds.
fn parse_seconds(value: &str) -> std::result::Result<f64, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number of seconds"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("`{value}` must be a finite, non-negative number of seconds"));
    }
    Ok(seconds)
}

/// Simulated runs are capped at a day of virtual playback.
const MAX_WAIT_SECS: f64 = 86_400.0;

fn parse_wait(value: &str) -> std::result::Result<f64, String> {
    let seconds = parse_seconds(value)?;
    if seconds > MAX_WAIT_SECS {
        return Err(format!("`{value}` exceeds {MAX_WAIT_SECS} seconds"));
    }
    Ok(seconds)
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Video,
    Audio,
}

impl From<ModeArg> for PlaybackMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Video => Self::Video,
            ModeArg::Audio => Self::Audio,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };

    match cli.command {
        Commands::Inspect { file, at } => inspect(&file, at.as_deref()),
        Commands::Replay { file, positions } => replay(&file, &positions),
        Commands::Normalize { file, output } => normalize(&file, output.as_deref()),
        Commands::Simulate {
            file,
            mode,
            seconds,
            prefs,
            switch_after,
        } => {
            let mode = mode.map(PlaybackMode::from);
            simulate(&file, config, mode, seconds, prefs, switch_after).await
        }
    }
}

fn inspect(file: &Path, at: Option<&str>) -> Result<()> {
    let transcript = Transcript::from_json_file(file)?;
    let segments = transcript.segments();
    let zero_width = segments.iter().filter(|segment| segment.is_zero_width()).count();
    let end_ms = segments.iter().map(|segment| segment.end_ms).max().unwrap_or(0);

    println!("segments:   {}", transcript.len());
    println!("span:       {}", format_timestamp(end_ms));
    println!("sorted:     {}", transcript.is_sorted());
    println!("zero-width: {zero_width}");

    if let Some(at) = at {
        let position_ms = parse_timestamp(at)?;
        println!("at {}:", format_timestamp_centis(position_ms));
        println!("  exact:     {}", describe(&transcript, transcript.resolve_exact(position_ms)));
        println!(
            "  gap-aware: {}",
            describe(&transcript, transcript.resolve_gap_aware(position_ms))
        );
    }
    Ok(())
}

fn replay(file: &Path, positions: &[f64]) -> Result<()> {
    let transcript = Arc::new(Transcript::from_json_file(file)?);
    let mut machine = PlaybackMachine::new(PlaybackMode::Audio);
    machine.begin_initialize(Arc::clone(&transcript), PlaybackMode::Audio);
    machine.finish_initialize();

    for &seconds in positions {
        machine.apply_sample(&PollSample {
            position_secs: Some(seconds),
            ..PollSample::default()
        });
        let state = machine.state();
        println!(
            "{} -> {}",
            format_timestamp_centis(state.position_ms),
            describe(&transcript, state.current_segment_index)
        );
    }
    Ok(())
}

fn normalize(file: &Path, output: Option<&Path>) -> Result<()> {
    let transcript = Transcript::from_json_file(file)?.normalized();
    let json = serde_json::to_string_pretty(&transcript.to_document())
        .map_err(|source| EngineError::TranscriptFormat { path: None, source })?;

    match output {
        Some(path) => std::fs::write(path, json).map_err(|source| EngineError::TranscriptIo {
            path: path.to_path_buf(),
            source,
        })?,
        None => println!("{json}"),
    }
    Ok(())
}

async fn simulate(
    file: &Path,
    config: SessionConfig,
    mode: Option<PlaybackMode>,
    seconds: f64,
    prefs_path: Option<PathBuf>,
    switch_after: Option<f64>,
) -> Result<()> {
    let transcript = Arc::new(Transcript::from_json_file(file)?);
    let prefs: Arc<dyn PreferenceStore> = match prefs_path {
        Some(path) => Arc::new(JsonFilePreferences::new(path)),
        None => Arc::new(MemoryPreferences::new()),
    };
    let mode = mode.unwrap_or_else(|| prefs.playback_mode());

    let end_ms = transcript
        .segments()
        .iter()
        .map(|segment| segment.end_ms)
        .max()
        .filter(|end_ms| *end_ms > 0)
        .unwrap_or(60_000);
    let factory = Arc::new(SimulatedPlayerFactory::new(SimulatedMedia::new(
        end_ms as f64 / 1_000.0,
    )));

    let session = SessionHandle::spawn(factory, Arc::clone(&prefs), config);
    session
        .initialize(file.display().to_string(), Arc::clone(&transcript), mode)
        .await?;
    session.play().await?;
    info!(%mode, seconds, "simulated playback started");

    let mut updates = session.subscribe();
    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
    let mut switch_at =
        switch_after.map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    let mut last_index = None;
    loop {
        let pending_switch = switch_at;
        tokio::select! {
            changed = tokio::time::timeout_at(deadline, updates.changed()) => {
                if !matches!(changed, Ok(Ok(()))) {
                    break;
                }
                let state = updates.borrow_and_update().state.clone();
                if state.current_segment_index != last_index {
                    last_index = state.current_segment_index;
                    println!(
                        "[{}] {}",
                        format_timestamp(state.position_ms),
                        describe(&transcript, last_index)
                    );
                }
                if !state.is_playing && state.duration_ms > 0 && state.position_ms >= state.duration_ms {
                    break;
                }
            }
            _ = sleep_until_switch(pending_switch) => {
                switch_at = None;
                let next = session.snapshot().state.mode.toggled();
                session.switch_mode(next).await?;
                println!("switched to {next} mode");
            }
        }
    }

    session.dispose().await
}

async fn sleep_until_switch(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn describe(transcript: &Transcript, index: Option<usize>) -> String {
    match index.and_then(|index| transcript.get(index)) {
        Some(segment) => describe_segment(segment),
        None => "-".to_string(),
    }
}

fn describe_segment(segment: &TranscriptSegment) -> String {
    if segment.is_narration() {
        format!("#{} {}", segment.index, segment.text)
    } else {
        format!("#{} {}: {}", segment.index, segment.speaker, segment.text)
    }
}
