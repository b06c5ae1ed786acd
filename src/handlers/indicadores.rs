use axum::{extract::State, response::Json, Extension};
use std::sync::Arc;

use super::{require_roles, FINANCEIRO_OU_OPERACIONAL};
use crate::models::SessionContext;
use crate::services::indicadores::{indicadores, Indicadores};
use crate::utils::AppResult;
use crate::AppState;

pub async fn get_indicadores(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> AppResult<Json<Indicadores>> {
    require_roles(&session, FINANCEIRO_OU_OPERACIONAL)?;
    Ok(Json(indicadores(&**state.repo.read().await)))
}
