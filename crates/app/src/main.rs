use std::{path::PathBuf, rc::Rc};

use clap::{Parser, Subcommand};
use timetree_core::{Stage, StageConfig, TimeEvent, Timeline, TimelineOptions};
use tracing_subscriber::EnvFilter;

fn main() -> timetree_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            ticks,
            interval,
            json,
        } => {
            let mut settings = match config {
                Some(path) => StageConfig::load(path)?,
                None => StageConfig::default(),
            };
            if let Some(ticks) = ticks {
                settings.ticks = ticks;
            }
            if let Some(interval) = interval {
                settings.frame_interval_ms = interval;
            }
            run_demo(&settings, json)
        }
        Commands::Defaults => {
            let raw = serde_json::to_string_pretty(&StageConfig::default())?;
            println!("{raw}");
            Ok(())
        }
    }
}

fn run_demo(settings: &StageConfig, json: bool) -> timetree_core::Result<()> {
    tracing::info!(ticks = settings.ticks, interval = settings.frame_interval_ms, "starting demo");

    let mut stage = Stage::init();
    let intro = Rc::new(TimeEvent::new(500.0).on_render(log_phase("intro")));
    let outro = Rc::new(
        TimeEvent::new(400.0)
            .with_scale(2.0)?
            .on_render(log_phase("outro")),
    );
    let pulse = Rc::new(TimeEvent::in_frames(30.0).on_render(log_phase("pulse")));

    let act = Timeline::new(TimelineOptions::default());
    act.add(intro)?.at(0.0).add(outro)?.at(500.0);

    stage.root().add(act)?.at(100.0);
    stage.frame_root().add(pulse)?.at(10.0);

    let last = stage.run(settings);
    tracing::info!(
        time = last.time,
        frame = last.frame,
        duration = stage.root().summary().duration,
        "demo finished"
    );

    if json {
        let report = serde_json::json!({
            "time": stage.root().summary(),
            "frame": stage.frame_root().summary(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn log_phase(label: &'static str) -> impl Fn(&TimeEvent, f64) {
    move |event: &TimeEvent, elapsed: f64| {
        tracing::debug!(label, elapsed, phase = ?event.phase(), progress = event.progress(), "render");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Hierarchical timeline scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a small demo tree and drive it with the ticker.
    Run {
        /// JSON file with stage settings.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of ticks to emit, overriding the configuration.
        #[arg(short, long)]
        ticks: Option<u32>,
        /// Milliseconds between ticks, overriding the configuration.
        #[arg(short, long)]
        interval: Option<f64>,
        /// Print the final state of both roots as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the default stage settings.
    Defaults,
}
