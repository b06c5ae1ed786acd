// Biblioteca do back-office de lotes
// Expõe módulos para uso em testes e no binário

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;
use tokio::sync::RwLock;

use services::{BoletoClient, CobrancaClient, CobrancaError, DocumentStorage, LifecycleManager, LoteRepository};

/// Repositório compartilhado; escritas são serializadas pelo lock
pub type SharedRepository = Arc<RwLock<Box<dyn LoteRepository>>>;

// AppState é definido aqui para ser compartilhado
#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub repo: SharedRepository,
    pub lifecycle: LifecycleManager,
    pub storage: Arc<dyn DocumentStorage>,
    pub cobranca: CobrancaClient,
    pub boleto: BoletoClient,
}

impl AppState {
    pub fn new(
        settings: config::Settings,
        repo: Box<dyn LoteRepository>,
        storage: Arc<dyn DocumentStorage>,
    ) -> Result<Self, CobrancaError> {
        Ok(Self {
            lifecycle: LifecycleManager::new(settings.policy.clone()),
            cobranca: CobrancaClient::new(&settings.webhooks)?,
            boleto: BoletoClient::new(&settings.webhooks)?,
            repo: Arc::new(RwLock::new(repo)),
            storage,
            settings,
        })
    }
}
