use std::sync::Arc;

use crate::{
    audio::AmbientLibrary, configs::Config, gateway::Connector, session::SessionRegistry,
};

/// Top-level application state.
pub struct AppState {
    pub config: Config,
    pub library: Arc<AmbientLibrary>,
    pub registry: SessionRegistry,
    pub connector: Arc<dyn Connector>,
}

impl AppState {
    pub fn new(config: Config, library: AmbientLibrary, connector: Arc<dyn Connector>) -> Arc<Self> {
        Arc::new(Self {
            config,
            library: Arc::new(library),
            registry: SessionRegistry::new(),
            connector,
        })
    }
}
