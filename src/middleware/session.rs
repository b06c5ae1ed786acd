/// Middleware que monta o `SessionContext` de cada requisição
///
/// A identidade chega nos headers X-User-Id e X-User-Role (definidos pelo
/// gateway de autenticação). Para clientes, os vínculos com empresas são
/// carregados do repositório a cada requisição.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{SessionContext, UserRole};
use crate::utils::AppError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Lê a identidade dos headers
pub fn identity_from_headers(headers: &HeaderMap) -> Result<(Uuid, UserRole), AppError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))?
        .parse::<Uuid>()
        .map_err(|_| AppError::Unauthorized(format!("Invalid {} header", USER_ID_HEADER)))?;

    let role = header(headers, USER_ROLE_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", USER_ROLE_HEADER)))?
        .parse::<UserRole>()
        .map_err(AppError::Unauthorized)?;

    Ok((user_id, role))
}

pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let (user_id, role) = match identity_from_headers(&headers) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("❌ Sessão rejeitada: {}", e);
            return e.into_response();
        }
    };

    let mut session = SessionContext::new(user_id, role);
    if !role.is_staff() && session.needs_refresh() {
        let repo = state.repo.read().await;
        session.refresh(repo.empresas_for_user(user_id));
    }

    tracing::debug!(
        "Sessão {} ({}) com {} empresa(s) vinculada(s)",
        user_id,
        role,
        session.empresa_ids().len()
    );

    request.extensions_mut().insert(session);
    next.run(request).await
}
