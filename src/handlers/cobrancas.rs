use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{require_roles, OPERACIONAL};
use crate::models::{CobrancaHistorico, SessionContext, TipoCobranca};
use crate::services::cobranca::empresas_pendentes;
use crate::utils::logging::*;
use crate::utils::normalization::{competencia_atual, competencias_around, format_competencia, parse_competencia};
use crate::utils::{AppError, AppResult};
use crate::AppState;

/// Histórico exibido na tela de cobranças
const HISTORICO_LIMIT: usize = 20;

fn resolve_competencia(raw: Option<&str>) -> AppResult<String> {
    match raw {
        None => Ok(competencia_atual()),
        Some(raw) => parse_competencia(raw)
            .and_then(|(m, y)| format_competencia(m, y))
            .ok_or_else(|| AppError::ValidationError(format!("Competência inválida: \"{}\"", raw))),
    }
}

#[derive(Debug, Deserialize)]
pub struct PendentesQuery {
    pub competencia: Option<String>,
}

/// Meses oferecidos na escolha da competência, antes e depois do atual
const COMPETENCIAS_RAIO: i32 = 3;

/// Empresas ativas que ainda não enviaram lista na competência
pub async fn list_pendentes(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<PendentesQuery>,
) -> AppResult<Json<Value>> {
    require_roles(&session, OPERACIONAL)?;
    let competencia = resolve_competencia(query.competencia.as_deref())?;
    let empresas = empresas_pendentes(&**state.repo.read().await, &competencia);
    Ok(Json(json!({
        "competencia": competencia,
        "empresas": empresas,
        "total": empresas.len(),
        "competencias": competencias_around(chrono::Local::now().date_naive(), COMPETENCIAS_RAIO)
    })))
}

pub async fn list_cobrancas(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> AppResult<Json<Vec<CobrancaHistorico>>> {
    require_roles(&session, OPERACIONAL)?;
    let mut historico = state.repo.read().await.list_cobrancas();
    historico.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    historico.truncate(HISTORICO_LIMIT);
    Ok(Json(historico))
}

#[derive(Debug, Deserialize)]
pub struct DispararRequest {
    pub competencia: Option<String>,
    #[serde(default)]
    pub tipo: TipoCobranca,
    /// Sem seleção, todas as empresas pendentes são notificadas
    pub empresa_ids: Option<Vec<Uuid>>,
}

pub async fn disparar_cobranca(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<DispararRequest>,
) -> AppResult<Json<CobrancaHistorico>> {
    log_request_received("/cobrancas", "POST");
    require_roles(&session, OPERACIONAL)?;

    let competencia = resolve_competencia(body.competencia.as_deref())?;
    let mut empresas = empresas_pendentes(&**state.repo.read().await, &competencia);
    if let Some(ids) = &body.empresa_ids {
        empresas.retain(|e| ids.contains(&e.id));
    }

    let historico = state
        .cobranca
        .disparar(&competencia, body.tipo, &empresas, Some(session.user_id))
        .await?;

    state.repo.write().await.insert_cobranca(historico.clone());
    Ok(Json(historico))
}
