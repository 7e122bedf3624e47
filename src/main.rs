//! Wiring & DI. Entry point: load config, bootstrap adapters, inject into services, serve HTTP.
//! No business logic here.

use dotenv::dotenv;
use learn_assist::adapters::ai::OpenAiAdapter;
use learn_assist::adapters::http::{AppState, router};
use learn_assist::adapters::persistence::SqliteRepo;
use learn_assist::ports::ChatCompletionPort;
use learn_assist::shared::AppConfig;
use learn_assist::usecases::ChangeFeed;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::{self, ctrl_c};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let data_path = PathBuf::from(cfg.data_dir_or_default());
    let repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );

    // A missing key is not fatal: assistant endpoints degrade to fallback payloads.
    if cfg.is_ai_configured() {
        info!(
            model = %cfg.ai_model_or_default(),
            url = %cfg.ai_api_url_or_default(),
            timeout_secs = cfg.ai_timeout().as_secs(),
            "AI assistant enabled"
        );
    } else {
        warn!("LEARN_ASSIST_AI_API_KEY / OPENAI_API_KEY not set; AI endpoints will return fallbacks");
    }
    let chat: Arc<dyn ChatCompletionPort> = Arc::new(
        OpenAiAdapter::new(
            cfg.ai_api_url_or_default(),
            cfg.ai_api_key(),
            cfg.ai_model_or_default(),
            cfg.ai_timeout(),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?,
    );

    let feed = ChangeFeed::new(cfg.feed_capacity_or_default());
    let state = AppState::new(chat, repo, feed);
    state
        .profiles
        .seed_admins(&cfg.admin_ids_list())
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    state.warm().await.map_err(|e| anyhow::anyhow!("{}", e))?;

    let address = cfg.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, "server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
