pub mod config;
pub mod credential;
pub mod dashboard;
pub mod gemini_client;
pub mod ids;
pub mod models;
pub mod patients;
pub mod profile;
pub mod request;
pub mod store;
pub mod submitter;
pub mod workflow;


use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use credential::Credential;
use store::RecordStore;
use submitter::{AnalysisMode, Submitter};

/// Config, store and credential, resolved once at startup
pub struct App {
    pub config: Config,
    pub store: RecordStore,
    pub credential: Credential,
}

impl App {
    /// Open the file-backed record store
    pub fn open(config: Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let store = RecordStore::on_disk(&data_dir);
        info!("Record store: {:?}", data_dir);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: RecordStore) -> Self {
        let credential = Credential::load(&store);
        Self {
            config,
            store,
            credential,
        }
    }

    /// Pick the analysis mode from the credential and build the submitter.
    ///
    /// Only analysis needs this, so a bad endpoint in the config doesn't get
    /// in the way of the other commands.
    pub fn submitter(&self) -> Result<Submitter> {
        let mode = AnalysisMode::select(&self.credential, &self.config)
            .context("Failed to set up analysis backend")?;
        if mode.is_simulated() {
            info!("No API key configured, analyses will be simulated");
        }
        Ok(Submitter::from_mode(mode, self.config.generation.clone()))
    }
}
