//! radiohost CLI: run a pipeline script, run the FM receiver demo, print version.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use radiohost_core::{version, version_info, Context, ContextConfig};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Broadcast FM receiver: RTL-SDR source, tuner, discriminator, de-emphasis,
/// decimator, audio sink.
const FMRADIO_TEMPLATE: &str = r#"local frequency = {frequency}
local offset = -600e3
return radio.CompositeBlock():connect(
    radio.RtlSdrSource(frequency + offset, 2048000),
    radio.TunerBlock(offset, 190e3, 10),
    radio.FrequencyDiscriminatorBlock(6.0),
    radio.FMDeemphasisFilterBlock(75e-6),
    radio.DecimatorBlock(15e3, 4),
    radio.PulseAudioSink()
)"#;

#[derive(Parser, Debug)]
#[command(name = "radiohost", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a script, start its Pipeline and wait for it to finish.
    Run {
        /// Script that returns a Pipeline.
        script: PathBuf,
        /// Directory searched for the radio library (repeatable).
        #[arg(long = "library-path", value_name = "DIR")]
        library_path: Vec<PathBuf>,
        /// TOML context configuration.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Stop the Pipeline after this many seconds.
        #[arg(long, value_name = "SECS", value_parser = parse_duration)]
        duration: Option<Duration>,
    },
    /// Receive a broadcast FM station.
    Fmradio {
        /// Station frequency in Hz, e.g. 91.1e6.
        frequency: f64,
        #[arg(long = "library-path", value_name = "DIR")]
        library_path: Vec<PathBuf>,
    },
    /// Print version and commit.
    Version,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            script,
            library_path,
            config,
            duration,
        } => {
            let config = resolve_config(config.as_deref(), library_path)?;
            let source = std::fs::read_to_string(&script)
                .with_context(|| format!("read script {}", script.display()))?;
            run(&config, &source, duration)
        }
        Command::Fmradio {
            frequency,
            library_path,
        } => {
            let config = resolve_config(None, library_path)?;
            let source = FMRADIO_TEMPLATE.replace("{frequency}", &frequency.to_string());
            run(&config, &source, None)
        }
        Command::Version => {
            println!("{} ({})", version(), version_info().commit_id);
            Ok(())
        }
    }
}

/// Non-negative, finite seconds.
fn parse_duration(arg: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = arg.parse::<f64>().map_err(|e| e.to_string())?;
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// File (if any), then environment, then command-line directories first.
fn resolve_config(path: Option<&Path>, library_path: Vec<PathBuf>) -> Result<ContextConfig> {
    let mut config = match path {
        Some(p) => ContextConfig::load_path(p)?,
        None => ContextConfig::default(),
    }
    .with_env()?;
    let mut dirs = library_path;
    dirs.append(&mut config.library_path);
    config.library_path = dirs;
    Ok(config)
}

fn run(config: &ContextConfig, source: &str, duration: Option<Duration>) -> Result<()> {
    let mut ctx = Context::with_config(config).context("create context")?;
    ctx.load(source).context("load script")?;
    ctx.start().context("start pipeline")?;
    tracing::info!("pipeline started");

    if let Some(duration) = duration {
        let deadline = Instant::now() + duration;
        while ctx.status().context("query status")? {
            if Instant::now() >= deadline {
                tracing::info!(?duration, "deadline reached, stopping pipeline");
                ctx.stop().context("stop pipeline")?;
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    ctx.wait().context("wait for pipeline")?;
    tracing::info!("pipeline finished");
    Ok(())
}
