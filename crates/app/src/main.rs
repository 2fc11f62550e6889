use std::path::{Path, PathBuf};

use acoustic_monitor_core::{
    AppConfig, Capture, ChartKind, Monitor, MonitorError, RefreshPacer, SyntheticCapture, ViewKind,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

fn main() -> acoustic_monitor_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Live(args) => run_live(args),
        Commands::InitConfig { output } => run_init_config(&output),
    }
}

fn run_live(args: LiveArgs) -> acoustic_monitor_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(chart) = args.chart {
        config.controls.chart_kind = chart.into();
    }
    tracing::info!(source = ?args.source, frames = args.frames, "starting live mode");

    let mut monitor = Monitor::new(&config)?;
    if let Some(view) = args.expand {
        monitor.toggle_expand(view.into());
    }
    for _ in 0..args.zoom {
        for kind in ViewKind::ALL {
            monitor.zoom_in(kind);
        }
    }

    let mut capture = build_capture(args.source, &config)?;
    if let Err(err) = monitor.start_capture(capture.as_mut()) {
        tracing::warn!(error = %err, "continuing without an input source");
    }

    let mut pacer = RefreshPacer::new(config.refresh.rate_hz);
    for _ in 0..args.frames {
        if !monitor.is_capturing() {
            tracing::info!("no live source; stopping frame loop");
            break;
        }
        pacer.wait();
        let report = monitor.render_frame();
        if report.state_changed {
            tracing::info!(state = %report.state, "process state");
        }
    }

    monitor.stop_capture(capture.as_mut());
    tracing::info!(
        frames = monitor.scheduler().frame(),
        dropped = pacer.dropped(),
        "frame loop finished"
    );

    for view in monitor.views() {
        tracing::info!(
            view = %view.kind(),
            height = monitor.layout().display_height(view.kind()),
            "{}",
            view.caption()
        );
    }

    if let Some(dir) = &args.snapshot_dir {
        write_snapshots(&monitor, dir)?;
    }
    if args.export {
        monitor.export_results();
    }

    println!("Process state: {} ({})", monitor.state(), monitor.state().tone());
    for event in monitor.events().iter() {
        println!("{event}");
    }
    Ok(())
}

fn build_capture(source: SourceArg, config: &AppConfig) -> acoustic_monitor_core::Result<Box<dyn Capture>> {
    match source {
        SourceArg::Synthetic => Ok(Box::new(SyntheticCapture::new(config.synthetic.clone()))),
        #[cfg(feature = "device")]
        SourceArg::Device => Ok(Box::new(acoustic_monitor_core::DeviceCapture::new())),
        #[cfg(not(feature = "device"))]
        SourceArg::Device => Err(MonitorError::msg(
            "built without device support; rebuild with `--features device`",
        )),
    }
}

fn write_snapshots(monitor: &Monitor, dir: &Path) -> acoustic_monitor_core::Result<()> {
    std::fs::create_dir_all(dir)?;
    for view in monitor.views() {
        let path = dir.join(format!("{}.svg", view.kind().id()));
        std::fs::write(&path, view.surface().to_svg())?;
        tracing::info!(path = %path.display(), "snapshot written");
    }
    Ok(())
}

fn run_init_config(output: &Path) -> acoustic_monitor_core::Result<()> {
    tracing::info!(?output, "writing default configuration");
    let json = AppConfig::default().to_json()?;
    std::fs::write(output, json).map_err(MonitorError::from)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Live acoustic signal monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse a live input and classify the process state.
    Live(LiveArgs),
    /// Write the default configuration as JSON.
    InitConfig {
        /// Destination of the configuration file.
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct LiveArgs {
    /// JSON configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Where the audio comes from.
    #[arg(short, long, value_enum, default_value_t = SourceArg::Synthetic)]
    source: SourceArg,
    /// Number of display refreshes to run.
    #[arg(short, long, default_value_t = 300)]
    frames: u64,
    /// Spectrum chart kind, overriding the configuration.
    #[arg(long, value_enum)]
    chart: Option<ChartArg>,
    /// Zoom steps applied to every view before starting.
    #[arg(long, default_value_t = 0)]
    zoom: u8,
    /// View to show expanded.
    #[arg(long, value_enum)]
    expand: Option<ViewArg>,
    /// Directory receiving one SVG per view after the run.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Record an export request once the run finishes.
    #[arg(long)]
    export: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    Synthetic,
    Device,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ChartArg {
    Line,
    Bar,
}

impl From<ChartArg> for ChartKind {
    fn from(value: ChartArg) -> Self {
        match value {
            ChartArg::Line => ChartKind::Line,
            ChartArg::Bar => ChartKind::Bar,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
    Waveform,
    Spectrum,
    Derivative,
}

impl From<ViewArg> for ViewKind {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Waveform => ViewKind::Waveform,
            ViewArg::Spectrum => ViewKind::Spectrum,
            ViewArg::Derivative => ViewKind::Derivative,
        }
    }
}
