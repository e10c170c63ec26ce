use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use audio_core::{AssemblerConfig, AudioAssembler, OpenAiSpeech, DEFAULT_CHUNK_SIZE};
use exam_core::{LlmClient, Translator};
use tokio::net::TcpListener;
use tracing::info;

use exam_server::{build_router, AppState, ExamCaches, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting exam server...");

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, llm_timeout={}s, audio_workers={}",
        config.port, config.rate_limit_per_minute, config.llm_timeout_secs, config.audio_workers
    );

    let llm = Arc::new(LlmClient::from_env()?);
    info!("Using LLM model {}", llm.model());

    let speech = OpenAiSpeech::from_env().context("speech synthesis is not configured")?;
    let assembler = AudioAssembler::new(
        Arc::new(speech),
        AssemblerConfig {
            workers: config.audio_workers,
            silence: config.silence_range(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        },
    );

    let caches = ExamCaches::from_llm(Arc::clone(&llm), config.llm_timeout());
    if config.prewarm_caches {
        info!("Prewarming exam caches");
        caches.prewarm();
    }

    let state = AppState::new(config.clone(), caches, Arc::clone(&llm) as Arc<dyn Translator>, llm, assembler);
    let app = build_router(state)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
