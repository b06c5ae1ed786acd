use axum::{body::Bytes, extract::State, response::Json, Extension};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;

use super::{require_roles, OPERACIONAL};
use crate::models::{Empresa, SessionContext};
use crate::services::import::{import_companies, normalize_rows, read_workbook, ImportError};
use crate::utils::logging::*;
use crate::utils::validators::clean_org_tax_id;
use crate::utils::AppResult;
use crate::AppState;

/// Pré-visualização da planilha de colaboradores (nada é gravado)
///
/// O corpo da requisição é o arquivo .xlsx/.xls/.ods.
pub async fn preview_colaboradores(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let start_time = Instant::now();
    log_request_received("/imports/colaboradores", "POST");
    require_roles(&session, OPERACIONAL)?;

    let sheets = read_workbook(&body)?;
    let outcome = normalize_rows(&sheets, state.lifecycle.policy())?;

    log_request_processed("/imports/colaboradores", 200, start_time.elapsed().as_millis() as u64);
    Ok(Json(json!({
        "sheet": outcome.sheet,
        "header_row": outcome.header_row,
        "total_rows": outcome.total_rows,
        "valid_count": outcome.valid_records.len(),
        "invalid_rows": outcome.invalid_row_count(),
        "valid_records": outcome.valid_records,
        "errors": outcome.errors
    })))
}

/// Importa empresas da planilha; linhas válidas são cadastradas
pub async fn import_empresas(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    log_request_received("/imports/empresas", "POST");
    require_roles(&session, OPERACIONAL)?;

    let sheets = read_workbook(&body)?;
    let sheet = sheets.first().ok_or(ImportError::EmptyWorkbook)?;

    let mut repo = state.repo.write().await;
    let existing: HashSet<String> = repo
        .list_empresas()
        .iter()
        .map(|e| clean_org_tax_id(&e.cnpj))
        .collect();
    let outcome = import_companies(sheet, &existing, state.lifecycle.policy().strict_checksum)?;

    let mut inseridas = Vec::with_capacity(outcome.valid_records.len());
    for row in outcome.valid_records {
        let empresa = Empresa::from(row);
        repo.insert_empresa(empresa.clone())?;
        inseridas.push(empresa);
    }

    log_info(&format!(
        "🏢 {} empresa(s) importada(s), {} erro(s)",
        inseridas.len(),
        outcome.errors.len()
    ));
    Ok(Json(json!({
        "inseridas": inseridas,
        "errors": outcome.errors
    })))
}
