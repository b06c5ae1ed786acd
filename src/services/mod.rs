pub mod cadastro;
pub mod cobranca;
pub mod export;
pub mod import;
pub mod indicadores;
pub mod lifecycle;
pub mod notas_fiscais;
pub mod storage;
pub mod store;

pub use cadastro::CadastroError;
pub use cobranca::{empresas_pendentes, BoletoClient, CobrancaClient, CobrancaError};
pub use lifecycle::{LifecycleError, LifecycleManager};
pub use storage::{DocumentStorage, LocalStorage};
pub use store::{LoteFilter, LoteRepository, MemoryRepository};
