//! pairbridge - main entry point.

use std::sync::Arc;

use clap::Parser;
use secrecy::ExposeSecret;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pairbridge::{
    cli::{Cli, Command, run_pairs_command},
    config::{Config, RelayConfig},
    dispatcher::Dispatcher,
    messenger::Outbox,
    observability::create_observer,
    pairing::PairingStore,
    relay::ForwardRelay,
    server::{WebhookState, start_server},
    telegram::{SetWebhook, TelegramClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv(); // Load .env if present
    let cli = Cli::parse();

    // Handle non-relay commands first (they don't need the full setup)
    if !cli.should_run_relay()
        && let Some(Command::Pairs(pairs_cmd)) = cli.command
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .init();

        return run_pairs_command(pairs_cmd).await;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pairbridge=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::from_env()?;
    let observer = create_observer(&config.observability);

    let client = Arc::new(TelegramClient::new(
        &config.telegram.api_url,
        config.telegram.bot_token.clone(),
        config.telegram.delivery_timeout,
    )?);
    let outbox = Outbox::new(
        client.clone(),
        config.telegram.delivery_timeout,
        observer.clone(),
    );

    let dispatcher = match &config.relay {
        RelayConfig::Pair { pairs_file } => {
            let store = Arc::new(PairingStore::load(pairs_file.clone()));
            let pairs = store.pair_count().await;
            tracing::info!(path = %pairs_file.display(), pairs, "Pairing relay ready");
            Dispatcher::pair(store, outbox)
        }
        RelayConfig::Forward { target, source } => {
            tracing::info!(target_chat = *target, source_chat = ?source, "Forward relay ready");
            Dispatcher::forward(ForwardRelay::new(*target, *source, outbox.clone()), outbox)
        }
    };
    let dispatcher = Arc::new(dispatcher);

    let addr = config.http.bind_addr()?;
    let server = start_server(
        addr,
        WebhookState {
            dispatcher: dispatcher.clone(),
            secret: config.http.webhook_secret.clone(),
        },
    )
    .await?;

    let webhook_url = config.http.webhook_url();
    let registration = SetWebhook {
        url: &webhook_url,
        secret_token: config.http.webhook_secret.expose_secret(),
        allowed_updates: dispatcher.allowed_updates(),
        drop_pending_updates: true,
    };
    match client.set_webhook(&registration).await {
        Ok(()) => tracing::info!(
            base_url = %config.http.base_url,
            "Webhook registered"
        ),
        Err(e) => tracing::error!(error = %e, "Failed to register webhook"),
    }

    match client.get_me().await {
        Ok(me) => tracing::info!(
            bot = me.username.as_deref().unwrap_or(&me.first_name),
            "Relay running"
        ),
        Err(e) => tracing::warn!(error = %e, "Could not fetch bot identity"),
    }

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    server.shutdown().await;
    observer.flush();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
