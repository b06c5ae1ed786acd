use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::services::store::LoteFilter;
use crate::utils::logging::*;
use crate::AppState;

pub async fn health_check() -> Json<Value> {
    log_health_check();

    Json(json!({
        "status": "healthy",
        "service": "lotes-backoffice",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn status_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (lotes, empresas) = {
        let repo = state.repo.read().await;
        (repo.list_lotes(&LoteFilter::default()).len(), repo.list_empresas().len())
    };
    let webhooks = &state.settings.webhooks;

    Json(json!({
        "service": "lotes-backoffice",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()),
        "lotes": lotes,
        "empresas": empresas,
        "policy": {
            "per_head_rate": state.settings.policy.per_head_rate,
            "helper_salary_threshold": state.settings.policy.helper_salary_threshold,
            "strict_checksum": state.settings.policy.strict_checksum
        },
        "integrations": {
            "cobranca_configured": webhooks.cobranca_url.is_some(),
            "boleto_configured": webhooks.boleto_url.is_some(),
            "api_key_configured": state.settings.auth.api_key.is_some()
        }
    }))
}
