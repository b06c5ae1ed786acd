// Handlers HTTP do back-office
pub mod cadastros;
pub mod cobrancas;
pub mod health;
pub mod imports;
pub mod indicadores;
pub mod lotes;
pub mod notas_fiscais;

pub use health::*;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::middleware::{require_api_key, resolve_session};
use crate::models::{SessionContext, UserRole};
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub(crate) const OPERACIONAL: &[UserRole] = &[UserRole::Operacional];
pub(crate) const FINANCEIRO: &[UserRole] = &[UserRole::Financeiro];
pub(crate) const FINANCEIRO_OU_OPERACIONAL: &[UserRole] = &[UserRole::Financeiro, UserRole::Operacional];

/// Administradores passam sempre
pub(crate) fn require_roles(session: &SessionContext, roles: &[UserRole]) -> AppResult<()> {
    if session.has_any_role(roles) {
        return Ok(());
    }
    tracing::warn!("🚫 Papel {} sem acesso (exige {:?})", session.role, roles);
    Err(AppError::Forbidden(format!(
        "Papel '{}' não tem permissão para esta operação",
        session.role
    )))
}

pub(crate) fn require_empresa(session: &SessionContext, empresa_id: Uuid) -> AppResult<()> {
    if session.can_access_empresa(empresa_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Empresa fora do escopo do usuário".to_string()))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    // Rotas de negócio: chave de API + sessão
    let protected = Router::new()
        .route("/imports/colaboradores", post(imports::preview_colaboradores))
        .route("/imports/empresas", post(imports::import_empresas))
        .route("/lotes", get(lotes::list_lotes).post(lotes::create_lote))
        .route("/lotes/faturar", post(lotes::faturar_lotes))
        .route("/lotes/planilhas", post(lotes::export_planilhas))
        .route("/lotes/:id", get(lotes::get_lote).delete(lotes::delete_lote))
        .route(
            "/lotes/:id/colaboradores",
            put(lotes::replace_colaboradores).post(lotes::add_colaborador),
        )
        .route(
            "/lotes/:id/colaboradores/:cpf",
            put(lotes::update_colaborador).delete(lotes::remove_colaborador),
        )
        .route("/lotes/:id/enviar", post(lotes::enviar_seguradora))
        .route("/lotes/:id/retorno", post(lotes::retorno_seguradora))
        .route("/lotes/:id/faturar", post(lotes::faturar_lote))
        .route("/lotes/:id/resolver", post(lotes::resolver_pendencia))
        .route("/lotes/:id/rejeitar", post(lotes::rejeitar_pendencia))
        .route("/lotes/:id/pendencias", get(lotes::aviso_pendencia))
        .route("/lotes/:id/boleto", post(lotes::gerar_boleto))
        .route("/lotes/:id/cartao", put(lotes::cadastro_cartao))
        .route("/lotes/:id/planilha", get(lotes::export_planilha))
        .route(
            "/cobrancas",
            get(cobrancas::list_cobrancas).post(cobrancas::disparar_cobranca),
        )
        .route("/cobrancas/pendentes", get(cobrancas::list_pendentes))
        .route("/empresas/:id/obras", get(cadastros::list_obras).post(cadastros::criar_obra))
        .route("/empresas/:id/ativo", put(cadastros::set_ativo))
        .route("/usuarios/:id/empresas", put(cadastros::replace_vinculos))
        .route("/indicadores", get(indicadores::get_indicadores))
        .route("/notas-fiscais", get(notas_fiscais::list_notas_fiscais))
        .route("/notas-fiscais/:id", put(notas_fiscais::update_nota_fiscal))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_session))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        // Health checks (públicos)
        .route("/health", get(health_check))
        .route("/status", get(status_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
