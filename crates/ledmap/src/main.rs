//! LedMap command line
//!
//! Loads the configuration and the points document, then drives the
//! Art-Net transmitter with a playback session, a test pattern or a blackout.

mod logging_setup;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use ledmap_control::{ArtNetTransmitter, TestPattern, TransmitterConfig};
use ledmap_core::{
    load_points, ColorCorrector, FrameRenderer, LedConfig, MappingOptions, PointLayout,
    PointMapper,
};
use ledmap_media::{
    ColorSweepSource, DmxRecorder, DmxRecording, FrameSource, PlaybackEvent, PlaybackSession,
    PlaybackSupervisor, ReplaySource, SessionKind, SessionSettings, SourceFrame,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ledmap", version, about = "Art-Net LED mapping and playback")]
struct Cli {
    /// Configuration file (.json or .toml); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a recording, or the color sweep when none is given.
    Play(PlayArgs),
    /// Hold a static test pattern on every universe.
    TestPattern(TestPatternArgs),
    /// Hold all channels at zero.
    Blackout(HoldArgs),
    /// Render the color sweep through the mapping into a DMX recording.
    Record(RecordArgs),
    /// Print the mapped layout as JSON.
    Layout(LayoutArgs),
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Points document JSON.
    #[arg(long)]
    points: PathBuf,

    /// DMX recording JSON to replay.
    #[arg(long)]
    recording: Option<PathBuf>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<f32>,

    /// Playback speed multiplier.
    #[arg(long)]
    speed: Option<f32>,

    /// Passes over the source, 0 for unbounded.
    #[arg(long)]
    loops: Option<u32>,

    /// Frames per hue rotation of the color sweep.
    #[arg(long, default_value_t = 90)]
    period: u32,
}

#[derive(Parser, Debug)]
struct TestPatternArgs {
    /// red, green, blue, white, yellow, cyan, magenta or gradient.
    pattern: String,

    #[command(flatten)]
    hold: HoldArgs,
}

#[derive(Parser, Debug)]
struct HoldArgs {
    /// Points document JSON.
    #[arg(long)]
    points: PathBuf,

    /// How long to hold, in seconds.
    #[arg(long, default_value_t = 5.0)]
    duration: f32,
}

#[derive(Parser, Debug)]
struct RecordArgs {
    /// Points document JSON.
    #[arg(long)]
    points: PathBuf,

    /// Output recording JSON.
    #[arg(long)]
    out: PathBuf,

    /// Frames per hue rotation; one rotation is recorded.
    #[arg(long, default_value_t = 90)]
    period: u32,
}

#[derive(Parser, Debug)]
struct LayoutArgs {
    /// Points document JSON.
    #[arg(long)]
    points: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LedConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LedConfig::default(),
    };
    let _log_guard = logging_setup::init(&config.logging)?;

    match cli.cmd {
        Command::Play(args) => cmd_play(&config, args),
        Command::TestPattern(args) => cmd_test_pattern(&config, args),
        Command::Blackout(args) => cmd_blackout(&config, args),
        Command::Record(args) => cmd_record(&config, args),
        Command::Layout(args) => cmd_layout(&config, args),
    }
}

fn map_layout(config: &LedConfig, points: &Path) -> anyhow::Result<PointLayout> {
    let document = load_points(points)
        .with_context(|| format!("Failed to load points {}", points.display()))?;
    let layout = PointMapper::new(MappingOptions::from_config(config))?.map(&document)?;
    info!(
        "Mapped {} points into {} universes",
        layout.total_points(),
        layout.required_universes
    );
    Ok(layout)
}

fn open_transmitter(config: &LedConfig, layout: &PointLayout) -> anyhow::Result<ArtNetTransmitter> {
    let tx_config = TransmitterConfig::from_layout(config, layout)?;
    ArtNetTransmitter::with_udp(tx_config).context("Failed to open Art-Net transmitter")
}

fn seconds(secs: f32) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f32(secs).with_context(|| format!("Invalid duration: {}", secs))
}

fn print_stats(transmitter: &ArtNetTransmitter) -> anyhow::Result<()> {
    let stats = transmitter.get_network_stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn cmd_play(config: &LedConfig, args: PlayArgs) -> anyhow::Result<()> {
    let layout = Arc::new(map_layout(config, &args.points)?);
    let transmitter = Arc::new(open_transmitter(config, &layout)?);
    let supervisor = PlaybackSupervisor::new(
        transmitter.clone(),
        layout.clone(),
        ColorCorrector::from_config(config),
        Duration::from_millis(config.playback.join_timeout_ms),
    );

    let mut settings = SessionSettings::from_config(&config.playback);
    if let Some(speed) = args.speed {
        settings.speed = speed;
    }
    if let Some(loops) = args.loops {
        settings.max_loops = loops;
    }

    let session = match &args.recording {
        Some(path) => {
            let recording = DmxRecording::load(path)
                .with_context(|| format!("Failed to load recording {}", path.display()))?;
            if recording.frame_len != transmitter.config().frame_len {
                warn!(
                    "Recording frames are {} bytes, layout expects {}",
                    recording.frame_len,
                    transmitter.config().frame_len
                );
            }
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "recording".to_string());
            let source = ReplaySource::new(name.clone(), Arc::new(recording));
            PlaybackSession::new(name, SessionKind::Replay, Box::new(source))
        }
        None => {
            let source =
                ColorSweepSource::new(layout.canvas.width, layout.canvas.height, args.period);
            PlaybackSession::new("color-sweep", SessionKind::Generator, Box::new(source))
        }
    }
    .with_settings(settings);

    let deadline = args.duration.map(seconds).transpose()?.map(|d| Instant::now() + d);
    let events = supervisor.events();
    supervisor.start(session)?;

    loop {
        let wait = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) => left.min(Duration::from_millis(500)),
                None => break,
            },
            None => Duration::from_millis(500),
        };
        match events.recv_timeout(wait) {
            Ok(PlaybackEvent::Completed { name, loops, .. }) => {
                info!("'{}' finished after {} loops", name, loops);
                break;
            }
            Ok(event) => info!("{:?}", event),
            Err(_) => {}
        }
    }

    supervisor.shutdown();
    print_stats(&transmitter)
}

fn hold(transmitter: &ArtNetTransmitter, secs: f32) -> anyhow::Result<()> {
    thread::sleep(seconds(secs)?);
    transmitter.shutdown();
    print_stats(transmitter)
}

fn cmd_test_pattern(config: &LedConfig, args: TestPatternArgs) -> anyhow::Result<()> {
    let pattern: TestPattern = args.pattern.parse()?;
    let layout = map_layout(config, &args.hold.points)?;
    let transmitter = open_transmitter(config, &layout)?;
    transmitter.test_pattern(pattern)?;
    hold(&transmitter, args.hold.duration)
}

fn cmd_blackout(config: &LedConfig, args: HoldArgs) -> anyhow::Result<()> {
    let layout = map_layout(config, &args.points)?;
    let transmitter = open_transmitter(config, &layout)?;
    transmitter.blackout()?;
    hold(&transmitter, args.duration)
}

fn cmd_record(config: &LedConfig, args: RecordArgs) -> anyhow::Result<()> {
    let layout = Arc::new(map_layout(config, &args.points)?);
    let mut renderer = FrameRenderer::new(layout.clone(), ColorCorrector::from_config(config));
    let mut source =
        ColorSweepSource::new(layout.canvas.width, layout.canvas.height, args.period).finite();

    let mut recorder = DmxRecorder::new(config.fps as f32);
    while let Some(frame) = source.next_frame() {
        let dmx = match frame {
            SourceFrame::Rgb(rgb) => renderer.render(&rgb).to_vec(),
            SourceFrame::Dmx(dmx) => dmx,
        };
        recorder.record(&dmx)?;
    }

    let recording = recorder.finish()?;
    recording
        .save(&args.out)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    println!(
        "Recorded {} frames ({:.1}s) to {}",
        recording.frames.len(),
        recording.duration_secs(),
        args.out.display()
    );
    Ok(())
}

fn cmd_layout(config: &LedConfig, args: LayoutArgs) -> anyhow::Result<()> {
    let layout = map_layout(config, &args.points)?;
    let tx_config = TransmitterConfig::from_layout(config, &layout)?;
    let summary = serde_json::json!({
        "canvas": layout.canvas,
        "points": layout.total_points(),
        "dropped_points": layout.dropped_points,
        "objects": layout.objects.len(),
        "total_channels": layout.total_channels,
        "required_universes": layout.required_universes,
        "universes": {
            "first": config.start_universe,
            "count": tx_config.universe_count(),
            "channels_per_universe": tx_config.channels_per_universe,
        },
        "boundary_shift": layout.boundary_shift.map(|shift| serde_json::json!({
            "object": shift.object_index,
            "boundary": shift.boundary,
            "gap": shift.gap,
        })),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
