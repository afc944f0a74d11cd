//! tre-play - stream an audio track through the engine's audio device
//!
//! Exercises the full streaming path: decoder, stream voice ring, drain
//! thread and cpal output. Runs a 30 Hz tick calling `Device::update` until
//! the track ends or Ctrl+C is pressed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tre_audio::output::AudioOutput;
use tre_audio::{DecoderStreamSource, Device, StreamSource, VoiceControl};
use tre_common::units::FRAME_DURATION;
use tre_common::EngineConfig;

/// Command-line arguments for tre-play
#[derive(Parser, Debug)]
#[command(name = "tre-play")]
#[command(about = "Stream an audio track through the TRE audio device")]
#[command(version)]
struct Args {
    /// Audio file (or archive, with --section-offset/--section-len)
    file: Option<PathBuf>,

    /// Output device name (overrides the configuration file)
    #[arg(short, long, env = "TRE_AUDIO_DEVICE")]
    device: Option<String>,

    /// Restart the track when it ends
    #[arg(short = 'l', long = "loop")]
    looping: bool,

    /// Start position in seconds
    #[arg(short, long, default_value_t = 0.0)]
    seek: f64,

    /// Fade in over this many milliseconds
    #[arg(long, value_name = "MS")]
    fade_in: Option<u64>,

    /// Byte offset of the track inside an archive file
    #[arg(long, requires = "section_len")]
    section_offset: Option<u64>,

    /// Byte length of the track inside an archive file
    #[arg(long, requires = "section_offset")]
    section_len: Option<u64>,

    /// Format hint for archived tracks (e.g. "ogg", "wav")
    #[arg(long)]
    format: Option<String>,

    /// Configuration file
    #[arg(short, long, env = "TRE_CONFIG")]
    config: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tre_audio=debug,tre_world=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "tre-play {} ({} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("TRE_GIT_HASH"),
        env!("TRE_BUILD_PROFILE"),
        env!("TRE_BUILD_TIMESTAMP")
    );

    if args.list_devices {
        for name in AudioOutput::list_devices().context("Failed to enumerate audio devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let file = args
        .file
        .clone()
        .context("No audio file given (see --help)")?;

    let mut config = EngineConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    if args.device.is_some() {
        config.audio.device = args.device.clone();
    }

    let source = open_source(&args, &file, config.audio.stream_sample_rate)?;
    if let Some(duration) = source.duration() {
        info!("Track length {:.1}s", duration.as_secs_f64());
    }

    let mut device = Device::new(&config.audio);
    let stream = device
        .create_default_stream(Box::new(source), Duration::from_secs_f64(args.seek.max(0.0)))
        .context("Failed to start stream")?;
    stream.set_looping(args.looping);

    if let Some(ms) = args.fade_in {
        stream.set_local_gain(0.0);
        let voice: Arc<dyn VoiceControl> = stream.clone();
        device.fade_gain(
            voice,
            1.0,
            config.audio.music_fade_curve,
            Duration::from_millis(ms),
        );
    }

    info!("Playing {}", file.display());

    let mut tick = tokio::time::interval(FRAME_DURATION);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tick.tick() => {
                device.update();
                if stream.is_stopped() && !stream.is_looping() {
                    info!("Playback finished at {:.1}s", stream.position().as_secs_f64());
                    break;
                }
            }
        }
    }

    device.remove_stream(&stream);
    info!("Shutdown complete");
    Ok(())
}

fn open_source(args: &Args, file: &Path, rate: Option<u32>) -> Result<DecoderStreamSource> {
    match (args.section_offset, args.section_len) {
        (Some(offset), Some(len)) => {
            DecoderStreamSource::from_file_section(file, offset, len, args.format.as_deref(), rate)
                .with_context(|| format!("Failed to open section of {}", file.display()))
        }
        _ => DecoderStreamSource::from_file(file, rate)
            .with_context(|| format!("Failed to open {}", file.display())),
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
