use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{require_empresa, require_roles, OPERACIONAL};
use crate::models::{Empresa, Obra, SessionContext, UserRole};
use crate::services::cadastro::{create_obra, replace_user_links, set_empresa_ativo};
use crate::utils::logging::*;
use crate::utils::AppResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VinculosRequest {
    pub role: UserRole,
    #[serde(default)]
    pub empresa_ids: Vec<Uuid>,
}

/// Substitui as empresas vinculadas a um usuário (somente administradores)
pub async fn replace_vinculos(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<VinculosRequest>,
) -> AppResult<Json<Value>> {
    log_request_received("/usuarios/:id/empresas", "PUT");
    require_roles(&session, &[])?;

    let mut repo = state.repo.write().await;
    let empresa_ids = replace_user_links(&mut **repo, user_id, body.role, &body.empresa_ids)?;
    Ok(Json(json!({
        "user_id": user_id,
        "role": body.role,
        "empresa_ids": empresa_ids
    })))
}

pub async fn list_obras(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(empresa_id): Path<Uuid>,
) -> AppResult<Json<Vec<Obra>>> {
    if session.role.is_staff() {
        require_roles(&session, OPERACIONAL)?;
    } else {
        require_empresa(&session, empresa_id)?;
    }
    let repo = state.repo.read().await;
    repo.get_empresa(empresa_id)?;
    Ok(Json(repo.list_obras(empresa_id)))
}

#[derive(Debug, Deserialize)]
pub struct ObraRequest {
    pub nome: String,
}

pub async fn criar_obra(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(empresa_id): Path<Uuid>,
    Json(body): Json<ObraRequest>,
) -> AppResult<(StatusCode, Json<Obra>)> {
    log_request_received("/empresas/:id/obras", "POST");
    require_roles(&session, OPERACIONAL)?;

    let mut repo = state.repo.write().await;
    let obra = create_obra(&mut **repo, empresa_id, &body.nome)?;
    Ok((StatusCode::CREATED, Json(obra)))
}

#[derive(Debug, Deserialize)]
pub struct AtivoRequest {
    pub ativo: bool,
}

/// Ativa ou desativa a empresa; inativas deixam de receber cobrança
pub async fn set_ativo(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(empresa_id): Path<Uuid>,
    Json(body): Json<AtivoRequest>,
) -> AppResult<Json<Empresa>> {
    log_request_received("/empresas/:id/ativo", "PUT");
    require_roles(&session, OPERACIONAL)?;

    let mut repo = state.repo.write().await;
    let empresa = set_empresa_ativo(&mut **repo, empresa_id, body.ativo)?;
    log_info(&format!(
        "🏢 Empresa {} {}",
        empresa.nome,
        if empresa.ativo { "ativada" } else { "desativada" }
    ));
    Ok(Json(empresa))
}
