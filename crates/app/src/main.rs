use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use xsrc_core::{
    estimate_from_pcm, Analysis, AppConfig, BeatBus, ClipRange, FrameClock, LocalFileAdapter,
    MappingMatrix, MusicUniforms, PcmProvider, SourceAdapter, SourceRegistry, XsrcError,
};

fn main() -> xsrc_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Resolve { url } => run_resolve(&config, &url),
        Commands::Tempo { input } => run_tempo(&config, &input),
        Commands::Frames {
            seed,
            duration,
            energy,
        } => run_frames(&config, &seed, duration, energy),
        Commands::Snap {
            seed,
            start_ms,
            end_ms,
        } => run_snap(&seed, start_ms, end_ms),
    }
}

fn run_resolve(config: &AppConfig, url: &str) -> xsrc_core::Result<()> {
    tracing::info!(url, "resolving");
    let registry = SourceRegistry::with_defaults();
    let resolved = registry.resolve(url, &config.estimation)?;
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

fn run_tempo(config: &AppConfig, input: &Path) -> xsrc_core::Result<()> {
    tracing::info!(?input, "estimating tempo");
    let adapter = LocalFileAdapter::new();
    let url = input.to_string_lossy();
    let source_id = adapter
        .parse_url(&url)
        .ok_or_else(|| XsrcError::UnrecognisedUrl(url.to_string()))?;
    let pcm = adapter.read_pcm(&source_id)?;
    let analysis = estimate_from_pcm(&pcm, &config.estimation);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn run_frames(
    config: &AppConfig,
    seed: &SeedArgs,
    duration: f64,
    energy: Option<f32>,
) -> xsrc_core::Result<()> {
    let mut bus = seed.build_bus()?;
    let clock = FrameClock::new(config.playback.frame_rate);
    let mut mappings = MappingMatrix::with_default_routes();
    let energy = energy
        .or_else(|| bus.analysis().and_then(|analysis| analysis.energy).map(|e| e as f32))
        .unwrap_or(0.0);

    tracing::info!(
        duration,
        frame_rate = clock.frame_rate(),
        tempo = bus.tempo(),
        official = bus.has_official_beats(),
        "emitting frames"
    );

    for time in clock.frame_times(duration) {
        bus.set_current_time(time);
        let snapshot = bus.current();
        let uniforms = MusicUniforms::from_snapshot(&snapshot, energy);
        mappings.apply_from_uniforms(&uniforms);
        let line = json!({
            "snapshot": snapshot,
            "uniforms": uniforms,
            "parameters": mappings.updates(),
        });
        println!("{line}");
    }
    Ok(())
}

fn run_snap(seed: &SeedArgs, start_ms: u64, end_ms: u64) -> xsrc_core::Result<()> {
    let bus = seed.build_bus()?;
    let track_id = seed
        .analysis
        .as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "clip".to_string());
    let clip = ClipRange::new(track_id, start_ms, end_ms)?;
    let snapped = clip.snap_to_downbeats(&bus);
    println!("{}", serde_json::to_string_pretty(&snapped)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat-synchronised visuals for streamed tracks", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// How the beat engine is seeded before a run.
#[derive(clap::Args, Debug)]
struct SeedArgs {
    /// Analysis JSON to load into the beat engine.
    #[arg(short, long)]
    analysis: Option<PathBuf>,
    /// Tempo to use when no analysis file is given.
    #[arg(short, long)]
    tempo: Option<f64>,
}

impl SeedArgs {
    fn build_bus(&self) -> xsrc_core::Result<BeatBus> {
        let mut bus = BeatBus::new();
        match (&self.analysis, self.tempo) {
            (Some(path), _) => bus.set_analysis(Analysis::load(path)?)?,
            (None, Some(tempo)) => bus.set_analysis(Analysis::with_tempo(tempo))?,
            (None, None) => {}
        }
        Ok(bus)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a track URL and print its metadata and analysis.
    Resolve { url: String },
    /// Estimate tempo and energy from a WAV file.
    Tempo { input: PathBuf },
    /// Print one JSON line of beat state and uniforms per frame.
    Frames {
        #[command(flatten)]
        seed: SeedArgs,
        /// Length of the run in seconds.
        #[arg(short, long)]
        duration: f64,
        /// Energy uniform; defaults to the analysis energy.
        #[arg(short, long)]
        energy: Option<f32>,
    },
    /// Snap a clip range to the surrounding downbeats.
    Snap {
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        start_ms: u64,
        #[arg(long)]
        end_ms: u64,
    },
}
