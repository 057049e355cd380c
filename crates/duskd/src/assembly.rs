//! Wiring of the store, notifier, and scheduler from one configuration.

use std::sync::Arc;

use tracing::info;

use dusk_core::DuskConfig;
use dusk_scheduler::{Evaluator, PostponementHandler};
use dusk_state::StateStore;

/// Everything the subcommands need, built once.
pub struct Components {
    pub config: Arc<DuskConfig>,
    pub store: StateStore,
    pub evaluator: Arc<Evaluator>,
    pub postponer: Arc<PostponementHandler>,
}

impl Components {
    pub fn assemble(config: DuskConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        std::fs::create_dir_all(&config.daemon.data_dir)?;
        let db_path = config.daemon.data_dir.join("dusk.redb");
        let store = StateStore::open(&db_path, &config.token_store_name)?;
        info!(path = ?db_path, token_table = %config.token_store_name, "state store opened");

        let notifier = dusk_notify::from_config(&config)?;
        match &config.notifier.webhook_url {
            Some(url) => info!(%url, "notices go to the mail relay"),
            None => info!("no mail relay configured; notices are only logged"),
        }

        let repo = Arc::new(store.clone());
        let evaluator = Arc::new(Evaluator::new(
            config.clone(),
            repo.clone(),
            repo.clone(),
            notifier,
        ));
        let postponer = Arc::new(PostponementHandler::new(config.clone(), repo.clone(), repo));

        Ok(Self {
            config,
            store,
            evaluator,
            postponer,
        })
    }

    pub fn api_state(&self) -> dusk_api::ApiState {
        dusk_api::ApiState {
            store: self.store.clone(),
            evaluator: self.evaluator.clone(),
            postponer: self.postponer.clone(),
        }
    }
}
