/// Middleware de autenticação por chave de API
///
/// Valida o header X-Api-Key contra `auth.api_key` (ou `ADMIN_API_KEY`).
/// Protege todas as rotas de negócio; apenas /health fica aberto.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// # Respostas
///
/// - **200 OK**: chave válida, segue para o handler
/// - **401 Unauthorized**: chave ausente ou inválida
/// - **503 Service Unavailable**: chave não configurada em produção
///
/// Em desenvolvimento, sem chave configurada, o acesso é liberado com warning.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let provided_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let expected_key = state.settings.auth.api_key.as_deref();

    let is_production = std::env::var("RUST_ENV")
        .unwrap_or_else(|_| "development".to_string())
        == "production";

    match (expected_key, provided_key, is_production) {
        (Some(expected), Some(provided), _) if expected == provided => {
            tracing::debug!("✅ API key accepted");
            Ok(next.run(request).await)
        }

        (Some(_), provided, _) => {
            tracing::warn!(
                "❌ Access denied - Invalid or missing {}: {:?}",
                API_KEY_HEADER,
                provided.map(|_| "<redacted>")
            );
            Err(unauthorized_response())
        }

        (None, _, false) => {
            tracing::warn!(
                "⚠️  auth.api_key not configured - Allowing access in development mode. \
                 Configure ADMIN_API_KEY in production!"
            );
            Ok(next.run(request).await)
        }

        (None, _, true) => {
            tracing::error!("🚨 auth.api_key not configured in production! Blocking access.");
            Err(service_unavailable_response())
        }
    }
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "Unauthorized",
            "message": "Missing or invalid X-Api-Key header",
            "status": 401
        })),
    )
        .into_response()
}

fn service_unavailable_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "Service Unavailable",
            "message": "API key not configured on server",
            "status": 503
        })),
    )
        .into_response()
}
