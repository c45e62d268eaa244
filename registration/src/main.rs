//! Campaign registration bot.
//!
//! Long-polls Telegram and runs the registration dialogue until Ctrl+C or
//! SIGTERM.

use registration::app::CampaignApp;
use registration::config::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,registration=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting campaign bot");

    let config = Config::from_env()?;
    info!(
        admin = config.campaign.admin_id,
        codes_file = %config.campaign.codes_file.display(),
        persistent = config.postgres.is_some(),
        "Configuration loaded"
    );

    CampaignApp::build(config).await?.run().await?;

    Ok(())
}
