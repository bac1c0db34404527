use smartscript_core::{AppConfig, AppConfigExt, RuleStore};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::simulation::Simulation;

/// Handles of long-running tasks owned by the CLI
#[derive(Default)]
pub struct BackgroundTasks {
    pub watcher: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn stop_watcher(&mut self) {
        if let Some(handle) = self.watcher.take() {
            handle.abort();
        }
    }
}

/// Holds all shared state for the CLI application.
/// This is a lightweight container - logic lives in the individual state types.
#[derive(Clone)]
pub struct CliContext {
    pub config: Arc<RwLock<AppConfig>>,
    pub simulation: Arc<Mutex<Simulation>>,
    pub tasks: Arc<Mutex<BackgroundTasks>>,
}

impl CliContext {
    pub fn new() -> Self {
        Self::with_config(AppConfig::load())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let simulation = Simulation::new(Arc::new(RuleStore::new()), config.engine.clone());
        Self {
            config: Arc::new(RwLock::new(config)),
            simulation: Arc::new(Mutex::new(simulation)),
            tasks: Arc::new(Mutex::new(BackgroundTasks::default())),
        }
    }

    /// Install a freshly loaded store into the running simulation.
    pub async fn install_store(&self, store: RuleStore) {
        self.simulation.lock().await.replace_store(Arc::new(store));
    }

    /// Drop every spawned entity and start over with the current store.
    pub async fn reset_simulation(&self) {
        let engine = self.config.read().await.engine.clone();
        let mut sim = self.simulation.lock().await;
        let store = Arc::clone(sim.store());
        *sim = Simulation::new(store, engine);
    }
}

impl Default for CliContext {
    fn default() -> Self {
        Self::new()
    }
}
