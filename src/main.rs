//! Reflection Probe - guided emotional reflection over a message channel
//!
//! A respondent driver and a prompt engine exchange JSON events on two
//! topics; the driver walks one participant through up to three
//! follow-up questions per emotion.

mod channel;
mod cli;
mod config;
mod driver;
mod emotion;
mod engine;
mod protocol;
mod response_log;
mod session;

use channel::MemoryChannel;
use config::ReflectionConfig;
use driver::RespondentDriver;
use engine::{PromptEngine, TemplateGenerator};
use response_log::{JsonlResponseLog, NoopResponseLog, ResponseLog};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reflection_probe=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ReflectionConfig::from_env();
    tracing::info!(
        reply_timeout_secs = config.reply_timeout.as_secs(),
        reply_retries = config.reply_retries,
        channel_capacity = config.channel_capacity,
        "Configuration loaded"
    );

    let response_log: Arc<dyn ResponseLog> = match &config.responses_path {
        Some(path) => {
            let log = JsonlResponseLog::new(path.clone());
            tracing::info!(path = %log.path().display(), "Recording exchanges");
            Arc::new(log)
        }
        None => Arc::new(NoopResponseLog),
    };

    let channel = Arc::new(MemoryChannel::new(config.channel_capacity));
    let shutdown = CancellationToken::new();

    // Ctrl-C finishes the run the same way 'F' does
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing");
            ctrl_c_token.cancel();
        }
    });

    let engine = PromptEngine::new(TemplateGenerator, Arc::clone(&channel))
        .spawn(shutdown.clone())
        .await?;
    let driver =
        RespondentDriver::spawn(channel, response_log, &config, shutdown.clone()).await?;

    let lines = cli::spawn_stdin_reader(config.channel_capacity);
    let result = cli::run_session(std::io::stdout(), lines, driver).await;

    shutdown.cancel();
    if let Err(e) = engine.await {
        tracing::error!(error = %e, "Prompt engine task failed");
    }

    let state = result?;
    tracing::info!(completed = state.ledger.len(), "Session ended");
    Ok(())
}
