//! Application wiring and lifecycle.
//!
//! [`CampaignApp::build`] loads the code registry, opens storage, checks the
//! bot token and assembles the store. [`CampaignApp::run`] polls Telegram until
//! Ctrl+C or SIGTERM, then stops the poller and drains in-flight effects.

use crate::config::Config;
use crate::policy::LockoutPolicy;
use crate::reducer::{RegistrationEnvironment, RegistrationReducer};
use crate::registry::{CodeRegistry, RegistryError};
use crate::session::SessionStore;
use crate::stores::{CampaignStorage, InMemoryCampaignStore, PostgresCampaignStore, StorageError};
use crate::transport::{TelegramMessenger, UpdatePoller};
use crate::types::UserId;
use crate::CampaignStore;
use campaign_core::environment::SystemClock;
use campaign_runtime::StoreError;
use campaign_telegram::{TelegramClient, TelegramError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Startup and shutdown failures
#[derive(Debug, Error)]
pub enum AppError {
    /// The code registry could not be loaded
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Storage could not be opened or migrated
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Telegram rejected the bot
    #[error(transparent)]
    Telegram(#[from] TelegramError),

    /// Effects were still running when the shutdown timeout elapsed
    #[error(transparent)]
    Shutdown(#[from] StoreError),
}

/// A fully wired bot, ready to run
pub struct CampaignApp {
    config: Config,
    client: Arc<TelegramClient>,
    store: CampaignStore,
}

impl CampaignApp {
    /// Wire the application from `config`
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the registry file is unreadable or invalid,
    /// storage cannot be reached, or the bot token is rejected.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let registry = Arc::new(CodeRegistry::load(&config.campaign.codes_file)?);

        let storage: Arc<dyn CampaignStorage> = if let Some(postgres) = &config.postgres {
            info!(max_connections = postgres.max_connections, "Connecting to PostgreSQL");
            let store = PostgresCampaignStore::connect(&postgres.url, postgres.max_connections).await?;
            store.migrate().await?;
            info!("PostgreSQL storage ready");
            Arc::new(store)
        } else {
            warn!("DATABASE_URL not set, registrations are kept in memory only");
            Arc::new(InMemoryCampaignStore::new())
        };

        let client = Arc::new(TelegramClient::new(config.telegram.token.clone()));
        let bot = client.get_me().await?;
        info!(bot = bot.username.as_deref().unwrap_or(&bot.first_name), "Bot authenticated");

        let policy = LockoutPolicy::new(config.campaign.lockout_max_attempts, config.lockout_cooldown());

        let environment = RegistrationEnvironment::new(
            registry,
            storage,
            Arc::new(TelegramMessenger::new(Arc::clone(&client))),
            Arc::new(SystemClock),
            UserId(config.campaign.admin_id),
        )
        .with_policy(policy)
        .with_social_links(config.campaign.social_links.clone());

        let store = CampaignStore::new(SessionStore::new(), RegistrationReducer::new(), environment);

        Ok(Self {
            config,
            client,
            store,
        })
    }

    /// The store driving the conversation
    #[must_use]
    pub const fn store(&self) -> &CampaignStore {
        &self.store
    }

    /// Poll until a shutdown signal, then shut down gracefully
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Telegram`] if the bot token is revoked while
    /// running, or [`AppError::Shutdown`] if effects outlive the shutdown
    /// timeout.
    pub async fn run(self) -> Result<(), AppError> {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let mut poller = UpdatePoller::new(Arc::clone(&self.client), self.store.clone(), shutdown_rx)
            .with_poll_timeout(self.config.telegram.poll_timeout)
            .spawn();
        info!("Campaign bot running");

        let mut poller_result = None;
        tokio::select! {
            () = shutdown_signal() => {}
            result = &mut poller => poller_result = Some(result),
        }

        info!("Initiating graceful shutdown...");
        let _ = shutdown_tx.send(());

        let poller_result = match poller_result {
            Some(result) => result,
            None => poller.await,
        };
        let outcome = match poller_result {
            Ok(result) => result.map_err(AppError::from),
            Err(e) => {
                error!(error = %e, "Update poller task failed");
                Ok(())
            },
        };

        let timeout = self.config.shutdown_timeout();
        self.store.shutdown(timeout).await?;

        info!("Graceful shutdown complete");
        outcome
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
