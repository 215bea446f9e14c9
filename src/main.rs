use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use voicegraph::audio::{MicrophoneConfig, MicrophoneFactory};
use voicegraph::http::ElementFactory;
use voicegraph::playback::{AudioOutput, MediaElement, Player};
use voicegraph::transcribe::{Dispatcher, HttpTranscriber, TranscribeOptions};
use voicegraph::{create_router, AppState, Config, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "voicegraph", about = "Real-time voice segmentation and transcription")]
struct Args {
    /// Configuration file (without extension)
    #[arg(long, default_value = "config/voicegraph")]
    config: String,

    /// Input device name (overrides the configured device)
    #[arg(long)]
    device: Option<String>,

    /// Bind address override, e.g. 127.0.0.1:8090
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);

    // One token for the whole pipeline; cancelling it aborts every in-flight
    // dispatch and stops the monitor and ticker tasks.
    let cancel = CancellationToken::new();

    let transcriber = HttpTranscriber::new(
        cfg.transcribe.endpoint.clone(),
        Duration::from_secs(cfg.transcribe.timeout_secs),
    )?;
    let dispatcher = Dispatcher::new(
        Arc::new(transcriber),
        TranscribeOptions::from(&cfg.transcribe),
        cancel.clone(),
    );

    let mic_config = MicrophoneConfig {
        device: args.device.or_else(|| cfg.audio.device.clone()),
        target_sample_rate: cfg.audio.sample_rate,
        target_channels: cfg.audio.channels,
        frame_duration_ms: cfg.audio.frame_duration_ms,
    };
    let backend = MicrophoneFactory::create(mic_config)?;

    let pipeline = Pipeline::launch(cfg.capture.clone(), backend, dispatcher, cancel.clone()).await;
    if pipeline.device_error() {
        warn!("Microphone unavailable; capture is disabled for this session");
    }

    let elements: ElementFactory = match AudioOutput::open() {
        Ok(output) => {
            let output = Arc::new(output);
            Arc::new(move |media| {
                output
                    .element(media)
                    .map(|e| Box::new(e) as Box<dyn MediaElement>)
            })
        }
        Err(e) => {
            warn!("Audio output unavailable: {:#}; playback disabled", e);
            Arc::new(|_media: Vec<u8>| -> Result<Box<dyn MediaElement>> {
                Err(anyhow!("audio output unavailable"))
            })
        }
    };

    let media_dir = PathBuf::from(&cfg.media.media_dir);
    let state = AppState::new(
        pipeline.clone(),
        Arc::new(Player::new()),
        elements,
        media_dir,
    );
    let app = create_router(state);

    let bind = args
        .bind
        .unwrap_or_else(|| format!("{}:{}", cfg.service.http.bind, cfg.service.http.port));
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    info!("HTTP server listening on {}", bind);

    let shutdown = {
        let pipeline = pipeline.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
            pipeline.shutdown();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
