use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use super::{require_empresa, require_roles, FINANCEIRO, OPERACIONAL};
use crate::models::{Colaborador, Lote, LoteStatus, SessionContext, UserRole};
use crate::services::export::{build_workbook, export_zip, history_file_name, ExportContext, ModeloPlanilha, ZipFailure, ZipSource};
use crate::services::import::{validate_fields, ColaboradorInput};
use crate::services::lifecycle::{BulkReport, InsurerDecision, InsurerOutcome, ReplaceOutcome};
use crate::services::notas_fiscais::registrar_boleto;
use crate::services::store::LoteFilter;
use crate::utils::logging::*;
use crate::utils::normalization::{format_competencia, parse_competencia, strip_accents};
use crate::utils::validators::normalize_tax_id;
use crate::utils::{AppError, AppResult};
use crate::AppState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Valida os colaboradores informados; qualquer erro rejeita o lote inteiro
fn validate_inputs(state: &AppState, inputs: &[ColaboradorInput]) -> AppResult<Vec<Colaborador>> {
    let policy = state.lifecycle.policy();
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    let mut records = Vec::with_capacity(inputs.len());

    for (i, input) in inputs.iter().enumerate() {
        match validate_fields(i + 1, &input.to_raw(), policy, &seen) {
            Ok(record) => {
                seen.insert(record.cpf.clone());
                records.push(record);
            }
            Err(errs) => issues.extend(errs),
        }
    }

    if !issues.is_empty() {
        log_validation_error("colaboradores", &format!("{} erro(s) de validação", issues.len()));
        return Err(AppError::ImportRejected {
            message: "Colaboradores com dados inválidos".to_string(),
            issues,
        });
    }
    Ok(records)
}

fn validate_one(state: &AppState, input: &ColaboradorInput) -> AppResult<Colaborador> {
    validate_inputs(state, std::slice::from_ref(input))?
        .pop()
        .ok_or_else(|| AppError::ValidationError("Colaborador não informado".to_string()))
}

/// Aceita "Março/2025" com ou sem acento e devolve a forma canônica
fn canonical_competencia(raw: &str) -> AppResult<String> {
    parse_competencia(raw)
        .and_then(|(month, year)| format_competencia(month, year))
        .ok_or_else(|| AppError::ValidationError(format!("Competência inválida: \"{}\"", raw)))
}

async fn load_visible(state: &AppState, session: &SessionContext, id: Uuid) -> AppResult<Lote> {
    let lote = state.repo.read().await.get_lote(id)?;
    require_empresa(session, lote.empresa_id)?;
    Ok(lote)
}

#[derive(Debug, Deserialize)]
pub struct ListLotesQuery {
    pub status: Option<String>,
    pub competencia: Option<String>,
    pub empresa_id: Option<Uuid>,
}

pub async fn list_lotes(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<ListLotesQuery>,
) -> AppResult<Json<Value>> {
    require_roles(&session, &[UserRole::Operacional, UserRole::Financeiro, UserRole::Cliente])?;

    let status = query
        .status
        .as_deref()
        .map(LoteStatus::from_str)
        .transpose()
        .map_err(AppError::ValidationError)?;
    let competencia = query.competencia.as_deref().map(canonical_competencia).transpose()?;

    let filter = LoteFilter {
        status,
        competencia,
        empresa_id: query.empresa_id,
        // Cliente só enxerga as próprias empresas
        empresa_ids: (!session.role.is_staff()).then(|| session.empresa_ids().to_vec()),
    };

    let lotes = state.repo.read().await.list_lotes(&filter);
    Ok(Json(json!({
        "lotes": lotes,
        "total": lotes.len()
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateLoteRequest {
    pub empresa_id: Uuid,
    pub obra_id: Option<Uuid>,
    pub competencia: String,
    pub colaboradores: Vec<ColaboradorInput>,
}

pub async fn create_lote(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<CreateLoteRequest>,
) -> AppResult<(StatusCode, Json<Lote>)> {
    let start_time = Instant::now();
    log_request_received("/lotes", "POST");
    require_roles(&session, OPERACIONAL)?;

    let competencia = canonical_competencia(&body.competencia)?;
    let records = validate_inputs(&state, &body.colaboradores)?;

    let lote = {
        let mut repo = state.repo.write().await;
        state
            .lifecycle
            .submit_roster(&mut **repo, body.empresa_id, body.obra_id, &competencia, records)?
    };

    log_request_processed("/lotes", 201, start_time.elapsed().as_millis() as u64);
    Ok((StatusCode::CREATED, Json(lote)))
}

pub async fn get_lote(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let lote = load_visible(&state, &session, id).await?;
    let colaboradores = state.repo.read().await.list_members(id);
    Ok(Json(json!({
        "lote": lote,
        "colaboradores": colaboradores
    })))
}

pub async fn delete_lote(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_roles(&session, OPERACIONAL)?;
    let mut repo = state.repo.write().await;
    state.lifecycle.delete_batch(&mut **repo, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRequest {
    pub colaboradores: Vec<ColaboradorInput>,
}

pub async fn replace_colaboradores(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReplaceRequest>,
) -> AppResult<Json<ReplaceOutcome>> {
    require_roles(&session, OPERACIONAL)?;
    let records = validate_inputs(&state, &body.colaboradores)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.replace_members(&mut **repo, id, records)?))
}

pub async fn add_colaborador(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ColaboradorInput>,
) -> AppResult<Json<Lote>> {
    require_roles(&session, OPERACIONAL)?;
    let record = validate_one(&state, &body)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.add_member(&mut **repo, id, record)?))
}

pub async fn update_colaborador(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path((id, cpf)): Path<(Uuid, String)>,
    Json(body): Json<ColaboradorInput>,
) -> AppResult<Json<Lote>> {
    require_roles(&session, OPERACIONAL)?;
    let record = validate_one(&state, &body)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.update_member(&mut **repo, id, &cpf, record)?))
}

pub async fn remove_colaborador(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path((id, cpf)): Path<(Uuid, String)>,
) -> AppResult<Json<Lote>> {
    require_roles(&session, OPERACIONAL)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.remove_member(&mut **repo, id, &normalize_tax_id(&cpf))?))
}

pub async fn enviar_seguradora(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lote>> {
    log_request_received("/lotes/:id/enviar", "POST");
    require_roles(&session, OPERACIONAL)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.send_to_insurer(&mut **repo, state.storage.as_ref(), id)?))
}

#[derive(Debug, Deserialize)]
pub struct RetornoRequest {
    #[serde(default)]
    pub decisoes: Vec<InsurerDecision>,
}

pub async fn retorno_seguradora(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<RetornoRequest>,
) -> AppResult<Json<InsurerOutcome>> {
    log_request_received("/lotes/:id/retorno", "POST");
    require_roles(&session, OPERACIONAL)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.apply_insurer_response(&mut **repo, id, &body.decisoes)?))
}

pub async fn faturar_lote(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lote>> {
    require_roles(&session, FINANCEIRO)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.invoice(&mut **repo, id)?))
}

#[derive(Debug, Deserialize)]
pub struct FaturarLotesRequest {
    pub lote_ids: Vec<Uuid>,
}

pub async fn faturar_lotes(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<FaturarLotesRequest>,
) -> AppResult<Json<BulkReport>> {
    require_roles(&session, FINANCEIRO)?;
    if body.lote_ids.is_empty() {
        return Err(AppError::ValidationError("Nenhum lote selecionado".to_string()));
    }
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.invoice_many(&mut **repo, &body.lote_ids)))
}

pub async fn resolver_pendencia(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lote>> {
    require_roles(&session, OPERACIONAL)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.resolve_pendency(&mut **repo, id)?))
}

pub async fn rejeitar_pendencia(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_roles(&session, OPERACIONAL)?;
    let mut repo = state.repo.write().await;
    state.lifecycle.reject_pendency(&mut **repo, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Equipe operacional ou o próprio cliente
pub async fn aviso_pendencia(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    require_roles(&session, &[UserRole::Operacional, UserRole::Cliente])?;
    load_visible(&state, &session, id).await?;
    let repo = state.repo.read().await;
    let notice = state.lifecycle.pendency_notice(&**repo, id)?;
    Ok(Json(json!(notice)))
}

#[derive(Debug, Deserialize)]
pub struct CartaoRequest {
    pub cadastrado: bool,
}

pub async fn cadastro_cartao(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<CartaoRequest>,
) -> AppResult<Json<Lote>> {
    require_roles(&session, OPERACIONAL)?;
    let mut repo = state.repo.write().await;
    Ok(Json(state.lifecycle.toggle_card_registration(&mut **repo, id, body.cadastrado)?))
}

/// Gera o boleto de um lote faturado e guarda o link no lote
pub async fn gerar_boleto(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Lote>> {
    log_request_received("/lotes/:id/boleto", "POST");
    require_roles(&session, FINANCEIRO)?;

    let lote = state.repo.read().await.get_lote(id)?;
    if lote.status != LoteStatus::Faturado {
        return Err(AppError::Conflict(format!(
            "Boleto só pode ser gerado para lote faturado (status atual: {})",
            lote.status
        )));
    }

    // Sem lock durante a chamada externa
    let boleto_url = state.boleto.gerar(id).await?;

    let mut repo = state.repo.write().await;
    let mut lote = repo.get_lote(id)?;
    lote.boleto_url = Some(boleto_url.clone());
    lote.touch();
    repo.update_lote(&lote)?;
    registrar_boleto(&mut **repo, id, &boleto_url)?;

    log_info(&format!("🧾 Boleto gerado para o lote {}", id));
    Ok(Json(lote))
}

#[derive(Debug, Deserialize)]
pub struct PlanilhaQuery {
    #[serde(default)]
    pub modelo: ModeloPlanilha,
}

fn attachment(content_type: &str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", strip_accents(file_name)),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Planilha de um lote no modelo pedido
pub async fn export_planilha(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<PlanilhaQuery>,
) -> AppResult<Response> {
    let lote = load_visible(&state, &session, id).await?;
    let (empresa, members) = {
        let repo = state.repo.read().await;
        (repo.get_empresa(lote.empresa_id)?, repo.list_members(id))
    };

    let bytes = build_workbook(query.modelo, ExportContext::from(&empresa), &members)?;
    Ok(attachment(
        XLSX_CONTENT_TYPE,
        &history_file_name(&empresa.nome, &lote.competencia),
        bytes,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ExportPlanilhasRequest {
    pub lote_ids: Vec<Uuid>,
    #[serde(default)]
    pub modelo: ModeloPlanilha,
}

/// ZIP com uma planilha por lote; lotes com problema são contados em X-Lotes-Falhas
pub async fn export_planilhas(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<ExportPlanilhasRequest>,
) -> AppResult<Response> {
    if !session.role.is_staff() {
        return Err(AppError::Forbidden("Exportação em lote restrita à equipe interna".to_string()));
    }

    let mut falhas: Vec<ZipFailure> = Vec::new();
    let mut sources = Vec::new();
    {
        let repo = state.repo.read().await;
        for &lote_id in &body.lote_ids {
            let source = repo.get_lote(lote_id).and_then(|lote| {
                let empresa = repo.get_empresa(lote.empresa_id)?;
                let members = repo.list_members(lote_id);
                Ok(ZipSource { lote, empresa, members })
            });
            match source {
                Ok(source) => sources.push(source),
                Err(e) => falhas.push(ZipFailure {
                    lote_id,
                    erro: e.to_string(),
                }),
            }
        }
    }

    let report = export_zip(body.modelo, &sources)?;
    falhas.extend(report.falhas);
    if !falhas.is_empty() {
        log_warning(&format!("⚠️ {} lote(s) fora do ZIP", falhas.len()));
    }

    let mut response = attachment("application/zip", "historico_lotes.zip", report.bytes);
    let headers = response.headers_mut();
    headers.insert("X-Lotes-Incluidos", report.incluidos.len().into());
    headers.insert("X-Lotes-Falhas", falhas.len().into());
    Ok(response)
}
