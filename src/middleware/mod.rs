/// Middleware layer para o Axum router
///
/// - Autenticação por chave de API
/// - Contexto de sessão (usuário, papel e empresas vinculadas)

pub mod api_key;
pub mod session;

pub use api_key::require_api_key;
pub use session::resolve_session;
