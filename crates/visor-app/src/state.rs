//! Application state initialization.
//!
//! Wires configuration, persistence, the credential chain, the HTTP
//! gateway, the simulated devices, and the orchestrator into one
//! `AppState` shared by every command.

use std::sync::Arc;

use anyhow::Context;

use visor_core::credentials::CredentialStore;
use visor_core::gateway::BoxGateway;
use visor_core::session::{ActiveModeOrchestrator, DeviceSet, SessionConfig};
use visor_infra::config::{agent_registry, default_data_dir, load_config};
use visor_infra::credentials::default_credential_chain;
use visor_infra::device::{LogSpeechSink, SimAudioSource, SimPhotoSource};
use visor_infra::gateway::HttpGateway;
use visor_infra::sqlite::{DatabasePool, SqlitePreferenceStore, SqliteThreadStore, pool};
use visor_types::agent::AgentRegistry;

pub type Orchestrator =
    ActiveModeOrchestrator<BoxGateway, SqliteThreadStore, SqlitePreferenceStore>;

pub struct AppState {
    pub registry: AgentRegistry,
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<SqliteThreadStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = default_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("could not create data dir {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        let registry = agent_registry(&config);

        let db_pool = DatabasePool::new(&pool::database_url(&data_dir))
            .await
            .context("could not open the visor database")?;
        let store = Arc::new(SqliteThreadStore::new(db_pool.clone()));
        let prefs = Arc::new(SqlitePreferenceStore::new(db_pool));

        let credentials = Arc::new(default_credential_chain(&config.gateway, &data_dir));
        let gateway = HttpGateway::new(
            &config.gateway,
            credentials.bearer_token(),
            config.retry.clone(),
        )
        .context("could not build the gateway client")?;

        let devices = DeviceSet {
            audio: Arc::new(SimAudioSource::new(config.audio.sample_rate)),
            photo: Arc::new(SimPhotoSource::new()),
            speech: Arc::new(LogSpeechSink::new()),
        };

        let orchestrator = Arc::new(ActiveModeOrchestrator::new(
            Arc::new(BoxGateway::new(gateway)),
            store.clone(),
            prefs,
            credentials,
            devices,
            SessionConfig::from_config(&config),
        ));

        // Advisory housekeeping; expiry is also enforced lazily on read.
        if let Err(err) = orchestrator.threads().cleanup_expired().await {
            tracing::debug!(%err, "startup thread sweep failed");
        }

        Ok(Self {
            registry,
            orchestrator,
            store,
        })
    }
}
