mod osc;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oscsig_core::{EventRouter, TreeView};
use oscsig_store::{
    Config, FrameRecorder, PeriodicHandle, PlaybackRouter, count_frames, frame_path,
    load_frame, spawn_periodic, start_idle_decay,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "oscsig", about = "Route, record and replay OSC streams as smoothed signal trees")]
struct Cli {
    /// TOML config file (defaults to $OSCSIG_CONFIG when set)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive OSC into a live tree with idle decay
    Listen {
        /// UDP port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Print the tree as a JSON line every SECS seconds
        #[arg(long, value_name = "SECS")]
        print_every: Option<f64>,

        /// Stop after SECS seconds instead of waiting for ctrl-c
        #[arg(long, value_name = "SECS")]
        duration: Option<f64>,
    },

    /// Record incoming OSC as numbered frame files
    Record {
        /// Output directory (recreated empty)
        dir: PathBuf,

        /// UDP port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Frames per second
        #[arg(long)]
        frame_rate: Option<f64>,

        /// Stop after SECS seconds instead of waiting for ctrl-c
        #[arg(long, value_name = "SECS")]
        duration: Option<f64>,
    },

    /// Replay a recording, printing the given addresses every frame
    Play {
        /// Recording directory
        dir: PathBuf,

        /// Addresses to print, e.g. /hand/1/pos
        addresses: Vec<String>,

        /// Frames per second
        #[arg(long)]
        frame_rate: Option<f64>,

        /// Frames to read ahead (defaults to one second)
        #[arg(long)]
        buffer: Option<usize>,

        /// Play once instead of looping
        #[arg(long)]
        no_loop: bool,

        /// Stop after SECS seconds instead of waiting for ctrl-c
        #[arg(long, value_name = "SECS")]
        duration: Option<f64>,
    },

    /// Print the value at an address in one recorded frame
    Inspect {
        /// Recording directory
        dir: PathBuf,

        /// Address to read
        address: String,

        /// Frame index
        #[arg(long, default_value_t = 0)]
        frame: usize,
    },

    /// Show frame count and addresses of a recording
    Info {
        /// Recording directory
        dir: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("OSCSIG_CONFIG").ok().map(PathBuf::from));
    Config::load_or_default(path.as_deref()).context("failed to load config")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Listen {
            port,
            print_every,
            duration,
        } => cmd_listen(&config, *port, *print_every, *duration).await,
        Commands::Record {
            dir,
            port,
            frame_rate,
            duration,
        } => cmd_record(&config, dir, *port, *frame_rate, *duration).await,
        Commands::Play {
            dir,
            addresses,
            frame_rate,
            buffer,
            no_loop,
            duration,
        } => cmd_play(&config, dir, addresses, *frame_rate, *buffer, *no_loop, *duration).await,
        Commands::Inspect {
            dir,
            address,
            frame,
        } => cmd_inspect(dir, address, *frame),
        Commands::Info { dir } => cmd_info(dir),
    }
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("--{flag} must be a non-negative number of seconds"))
}

/// Wait for ctrl-c, or for `duration` to elapse when one is given.
async fn wait_for_shutdown(duration: Option<Duration>) -> Result<()> {
    match duration {
        Some(duration) => tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            signal = tokio::signal::ctrl_c() => signal.context("failed to listen for ctrl-c")?,
        },
        None => tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?,
    }
    tracing::info!("shutting down");
    Ok(())
}

async fn stop(handle: Option<PeriodicHandle>) -> Result<()> {
    if let Some(handle) = handle {
        handle.join().await.context("periodic task failed")?;
    }
    Ok(())
}

async fn cmd_listen(
    config: &Config,
    port: Option<u16>,
    print_every: Option<f64>,
    duration: Option<f64>,
) -> Result<()> {
    let duration = duration.map(|d| seconds("duration", d)).transpose()?;
    let print_every = print_every
        .map(|p| seconds("print-every", p))
        .transpose()?;
    let mut listen = config.listen.clone();
    if let Some(port) = port {
        listen.port = port;
    }
    let router = Arc::new(EventRouter::new(
        listen.tree_config().context("invalid listen settings")?,
    ));

    let socket = osc::bind(&listen.socket_addr()).await?;
    let token = CancellationToken::new();
    let receiver = tokio::spawn(osc::receive(socket, Arc::clone(&router), token.clone()));
    let decay = start_idle_decay(Arc::clone(&router)).context("failed to start idle decay")?;
    let printer = match print_every {
        Some(period) => {
            let router = Arc::clone(&router);
            let handle = spawn_periodic("snapshot print", period, move || {
                match router.snapshot().to_json() {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!("failed to serialize snapshot: {e}"),
                }
            })
            .context("invalid --print-every")?;
            Some(handle)
        }
        None => None,
    };

    wait_for_shutdown(duration).await?;
    token.cancel();
    let routed = receiver.await.context("OSC receiver failed")?;
    stop(decay).await?;
    stop(printer).await?;

    println!("routed {routed} events into {} nodes", router.tree().len());
    Ok(())
}

async fn cmd_record(
    config: &Config,
    dir: &Path,
    port: Option<u16>,
    frame_rate: Option<f64>,
    duration: Option<f64>,
) -> Result<()> {
    let duration = duration.map(|d| seconds("duration", d)).transpose()?;
    let mut listen = config.listen.clone();
    if let Some(port) = port {
        listen.port = port;
    }
    let mut record = config.record.clone();
    if let Some(rate) = frame_rate {
        record.frame_rate = rate;
    }
    let router = Arc::new(EventRouter::new(
        record.tree_config().context("invalid record settings")?,
    ));
    let recorder = FrameRecorder::create(dir, record.frame_rate, Arc::clone(&router))
        .with_context(|| format!("failed to prepare {}", dir.display()))?;

    let socket = osc::bind(&listen.socket_addr()).await?;
    let token = CancellationToken::new();
    let receiver = tokio::spawn(osc::receive(socket, router, token.clone()));
    let recording = recorder.start().context("failed to start recording")?;

    wait_for_shutdown(duration).await?;
    token.cancel();
    let routed = receiver.await.context("OSC receiver failed")?;
    let (_, summary) = recording.stop().await.context("failed to finish recording")?;

    println!(
        "recorded {} frames to {} ({routed} events)",
        summary.frames,
        summary.dir.display()
    );
    if summary.failures > 0 {
        eprintln!("warning: {} frames could not be written", summary.failures);
    }
    Ok(())
}

async fn cmd_play(
    config: &Config,
    dir: &Path,
    addresses: &[String],
    frame_rate: Option<f64>,
    buffer: Option<usize>,
    no_loop: bool,
    duration: Option<f64>,
) -> Result<()> {
    let duration = duration.map(|d| seconds("duration", d)).transpose()?;
    let mut playback = config.playback.clone();
    if let Some(rate) = frame_rate {
        playback.frame_rate = rate;
    }
    if buffer.is_some() {
        playback.buffer = buffer;
    }
    if no_loop {
        playback.looping = false;
    }

    let router = Arc::new(
        PlaybackRouter::open(dir, playback.frame_rate, playback.buffer, playback.looping)
            .with_context(|| format!("failed to open {}", dir.display()))?,
    );
    let player = router.start().context("failed to start playback")?;
    let printer = if addresses.is_empty() {
        None
    } else {
        let router = Arc::clone(&router);
        let addresses = addresses.to_vec();
        let handle = spawn_periodic("value print", router.period(), move || {
            let line: serde_json::Map<String, serde_json::Value> = addresses
                .iter()
                .map(|address| {
                    let values = router.values(address).unwrap_or_default();
                    (address.clone(), serde_json::Value::from(values))
                })
                .collect();
            println!("{}", serde_json::Value::Object(line));
        })
        .context("failed to start printer")?;
        Some(handle)
    };

    wait_for_shutdown(duration).await?;
    stop(printer).await?;
    player.join().await.context("playback task failed")?;
    Ok(())
}

fn cmd_inspect(dir: &Path, address: &str, frame: usize) -> Result<()> {
    let path = frame_path(dir, frame);
    let value = load_frame(&path)
        .with_context(|| format!("failed to read frame {frame} from {}", dir.display()))?
        .get(address)
        .to_json()
        .context("failed to serialize value")?;
    println!("{value}");
    Ok(())
}

fn cmd_info(dir: &Path) -> Result<()> {
    let total = count_frames(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    println!("frames:  {total}");
    if total == 0 {
        return Ok(());
    }
    let first = load_frame(&frame_path(dir, 0)).context("failed to read first frame")?;
    let leaves = first.leaves();
    println!("leaves:  {}", leaves.len());
    for (address, values) in leaves {
        println!("  {address} {values:?}");
    }
    Ok(())
}
