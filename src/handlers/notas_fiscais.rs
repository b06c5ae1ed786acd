use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::{require_roles, FINANCEIRO};
use crate::models::{NotaFiscal, SessionContext};
use crate::services::notas_fiscais::{list_notas, resumo, update_nota, NotaFiscalFilter, NotaFiscalUpdate};
use crate::utils::logging::*;
use crate::utils::AppResult;
use crate::AppState;

pub async fn list_notas_fiscais(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Query(filter): Query<NotaFiscalFilter>,
) -> AppResult<Json<Value>> {
    require_roles(&session, FINANCEIRO)?;
    let notas = list_notas(&**state.repo.read().await, &filter);
    Ok(Json(json!({
        "resumo": resumo(&notas),
        "notas": notas
    })))
}

pub async fn update_nota_fiscal(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<NotaFiscalUpdate>,
) -> AppResult<Json<NotaFiscal>> {
    log_request_received("/notas-fiscais/:id", "PUT");
    require_roles(&session, FINANCEIRO)?;

    let mut repo = state.repo.write().await;
    let nota = update_nota(&mut **repo, id, body)?;
    log_info(&format!(
        "🧾 Nota do lote {}: nf={} boleto={} pago={}",
        nota.lote_id, nota.nf_emitida, nota.boleto_gerado, nota.pago
    ));
    Ok(Json(nota))
}
