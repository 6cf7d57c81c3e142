use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use intake_assist::channels::TelegramGateway;
use intake_assist::config::{Config, DeploymentMode};
use intake_assist::intake::InMemoryStageStore;
use intake_assist::llm::{CompletionFallback, OpenAiConfig, OpenAiProvider};
use intake_assist::orchestrator::Orchestrator;
use intake_assist::server::{self, AppState};
use intake_assist::store::LibSqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    eprintln!("🤖 Intake Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mode: {}", config.mode);
    eprintln!("   Model: {}", config.model);
    eprintln!("   Listening on: http://0.0.0.0:{}", config.port);
    eprintln!("   Database: {}\n", config.db_path);

    let db = Arc::new(LibSqlBackend::new_local(Path::new(&config.db_path)).await?);

    let provider = OpenAiProvider::new(
        OpenAiConfig::new(config.openai_api_key.clone()).with_model(config.model.clone()),
    );
    let fallback = CompletionFallback::new(Arc::new(provider), config.completion_timeout);

    let gateway = Arc::new(TelegramGateway::new(config.telegram_token.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        db,
        Arc::new(InMemoryStageStore::new()),
        fallback,
        Arc::clone(&gateway) as Arc<dyn intake_assist::channels::Gateway>,
    ));

    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
        webhook_token: config.telegram_token.clone(),
    };

    match config.mode {
        DeploymentMode::Webhook => {
            let url = config
                .webhook_url()
                .ok_or_else(|| anyhow::anyhow!("SERVER_URL required in webhook mode"))?;
            gateway.set_webhook(&url).await?;

            let app = server::routes(state, true);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
            tracing::info!(port = config.port, "Webhook server started");
            axum::serve(listener, app).await?;
        }
        DeploymentMode::Polling => {
            // Telegram rejects getUpdates while a webhook is registered.
            if let Err(e) = gateway.delete_webhook().await {
                tracing::warn!(error = %e, "Could not delete webhook before polling");
            }

            // Health probe stays up even without the webhook route.
            let app = server::routes(state, false);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
            tokio::spawn(async move {
                tracing::info!("Health server started");
                axum::serve(listener, app).await.ok();
            });

            let mut updates = gateway.start_polling();
            while let Some(incoming) = updates.next().await {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    orchestrator
                        .handle_message(&incoming.chat_id, &incoming.text)
                        .await;
                });
            }
        }
    }

    Ok(())
}
