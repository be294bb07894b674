//! Price Whisperer Binary
//!
//! Starts the narrated price ticker.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin price-whisperer
//! ```
//!
//! # Environment Variables
//!
//! ## Required (one of)
//! - `WHISPER_FEED_URL`: WebSocket tick feed (`ws://` or `wss://`)
//! - `WHISPER_REPLAY_FILE`: JSON-lines file to replay
//!
//! ## Optional
//! - `WHISPER_CHAIN`: Chain of the token (default: ethereum)
//! - `WHISPER_TOKEN_ADDRESS`: Token contract (default: stETH)
//! - `WHISPER_REPLAY_INTERVAL_MS`: Replay pace (default: 1000)
//! - `WHISPER_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `NARRATION_ENABLED`: Speak price moves (default: true)
//! - `NARRATION_MIN_INTERVAL_MS`: Minimum gap between narrations (default: 2000)
//! - `NARRATION_MAX_RETRIES`: Retries after a failed utterance (default: 3)
//! - `NARRATION_RETRY_DELAY_MS`: Delay between attempts (default: 1000)
//! - `NARRATION_VOICE`: Preferred voice name or id
//! - `NARRATION_COMMAND`: Synthesizer executable, or `log` (default: espeak-ng)
//! - `ANIMATION_REAP_INTERVAL_MS`: Departing price reap interval (default: 1000)
//! - `ANIMATION_FADE_MS`: Departing price transition length (default: 1500)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: price-whisperer)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use price_whisperer::application::ports::DisplayPort;
use price_whisperer::infrastructure::health::{HealthServer, HealthServerState};
use price_whisperer::infrastructure::{feed, speech, telemetry};
use price_whisperer::{
    AnimationQueue, AnimationReaper, DisplayState, NarrationEngine, PricePipeline, StreamExit,
    StreamSupervisor, VoiceToggle, WhispererConfig, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    load_dotenv();

    // Initialize telemetry (tracing + optional OpenTelemetry)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Price Whisperer");
    if !provider_installed {
        tracing::debug!("rustls crypto provider was already installed");
    }

    // Initialize Prometheus metrics
    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed, metrics disabled");
    }

    let config = WhispererConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Display and departing prices
    let animations = AnimationQueue::shared();
    let display = Arc::new(DisplayState::new(
        Arc::clone(&animations),
        config.animation.fade,
    ));

    let reaper = AnimationReaper::new(
        Arc::clone(&animations),
        config.animation.reap_interval,
        display.visibility_predicate(),
    )
    .spawn(shutdown_token.clone());

    // Narration
    let voice = Arc::new(VoiceToggle::new(config.narration.enabled));
    let narration = Arc::new(NarrationEngine::new(
        speech::speech_backend(&config.narration.command),
        config.narration.engine_config(),
    ));

    // Health server
    if config.server.health_port == 0 {
        tracing::info!("Health server disabled");
    } else {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&display),
            Arc::clone(&voice),
            Some(Arc::clone(&narration)),
        ));
        let health_server =
            HealthServer::new(config.server.health_port, health_state, shutdown_token.clone());

        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    // Price subscription
    let supervisor = StreamSupervisor::new(feed::tick_source(&config.feed), config.instrument)
        .with_narration(Arc::clone(&narration));

    let display_port: Arc<dyn DisplayPort> = display;
    let pipeline =
        PricePipeline::new(display_port, animations, voice).with_narration(narration);

    let mut subscription = pipeline.start(&supervisor);
    tracing::info!(subscription_id = %subscription.id(), "Price Whisperer ready");

    let exit = tokio::select! {
        exit = subscription.join() => exit,
        () = await_shutdown() => None,
    };

    subscription.cancel();
    shutdown_token.cancel();
    if let Err(e) = reaper.await {
        tracing::warn!(error = %e, "Animation reaper task failed");
    }

    match exit {
        Some(StreamExit::Failed(error)) => {
            tracing::error!(error = %error, "Price Whisperer stopped after a feed failure");
            Err(error.into())
        }
        Some(StreamExit::Ended) => {
            tracing::info!("Price feed finished, Price Whisperer stopped");
            Ok(())
        }
        Some(StreamExit::Canceled) | None => {
            tracing::info!("Price Whisperer stopped");
            Ok(())
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &WhispererConfig) {
    tracing::info!(
        feed = config.feed.as_str(),
        instrument = %config.instrument,
        narration_enabled = config.narration.enabled,
        narration_command = %config.narration.command,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        min_interval_ms = config.narration.min_interval.as_millis(),
        max_retries = config.narration.max_retries,
        retry_delay_ms = config.narration.retry_delay.as_millis(),
        voice = config.narration.voice.as_deref().unwrap_or("auto"),
        reap_interval_ms = config.animation.reap_interval.as_millis(),
        fade_ms = config.animation.fade.as_millis(),
        "Narration and animation settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
