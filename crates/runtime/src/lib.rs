use anyhow::{Context, Result};
use curalink_auth::Authenticator;
use curalink_config::AppConfig;
use curalink_research::ResearchClients;
use curalink_storage::{initialize_storage, Database, SessionTracker};
use tracing::{info, warn};

pub mod controller;

pub use controller::{ActiveUser, AppController, ControllerError, Page};

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the application needs, opened once from configuration and
/// handed to whoever drives it.
#[derive(Clone)]
pub struct AppServices {
    pub database: Database,
    pub sessions: SessionTracker,
    pub authenticator: Authenticator,
    pub research: ResearchClients,
}

impl AppServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let state = initialize_storage(&config.storage, &config.session)
            .await
            .with_context(|| format!("failed to open local storage at {}", config.storage.url))?;

        let research =
            ResearchClients::from_config(config).context("failed to build research clients")?;

        if !research.gemini.has_api_key() {
            warn!("no Gemini API key configured, summaries will use fallback text");
        }

        info!(
            storage = %config.storage.url,
            users = state.database.user_count().await,
            "services ready"
        );

        Ok(Self {
            authenticator: Authenticator::new(state.database.clone()),
            database: state.database,
            sessions: state.sessions,
            research,
        })
    }

    pub fn controller(&self) -> AppController {
        AppController::new(self.clone())
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
