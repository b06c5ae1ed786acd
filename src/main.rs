/// Back-office de lotes de benefícios
///
/// - Importação de planilhas de colaboradores e empresas
/// - Ciclo de vida dos lotes mensais (entrada, seguradora, pendências, faturamento)
/// - Exportação das planilhas da seguradora e do histórico em ZIP
/// - Disparo de cobranças e geração de boletos via webhooks

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use lotes_backoffice::config::Settings;
use lotes_backoffice::handlers::router;
use lotes_backoffice::services::{LocalStorage, MemoryRepository};
use lotes_backoffice::utils::{logging::*, AppError};
use lotes_backoffice::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    if dotenv_loaded {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    let settings = Settings::new()
        .map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;

    log_config_loaded(&std::env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()));
    log_info(&format!(
        "💲 Valor por vida: {} | faixa de ajudante abaixo de {}",
        settings.policy.per_head_rate, settings.policy.helper_salary_threshold
    ));

    let storage = Arc::new(LocalStorage::from_settings(&settings.storage));
    log_info(&format!("📁 Planilhas gravadas em {}", settings.storage.export_dir));

    // TODO: trocar pelo repositório do backend relacional quando o adaptador existir
    let repo = Box::new(MemoryRepository::new());
    log_warning("⚠️  Usando repositório em memória: dados não sobrevivem a reinício");

    if settings.webhooks.cobranca_url.is_none() {
        log_warning("⚠️  webhooks.cobranca_url não configurado: disparo de cobranças desabilitado");
    }

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(settings.server.port);
    let host = settings.server.host.clone();

    let app_state = Arc::new(AppState::new(settings, repo, storage)?);
    let app = router(app_state);

    let listener = TcpListener::bind(format!("{}:{}", host, port)).await?;

    log_server_startup(port);
    log_server_ready(port);

    // Graceful shutdown com signal handling
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("🛑 Server shut down gracefully");
    Ok(())
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error(&format!("Falha ao instalar handler de Ctrl+C: {}", e));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log_error(&format!("Falha ao instalar handler de SIGTERM: {}", e));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log_info("🛑 Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            log_info("🛑 Received SIGTERM, shutting down gracefully...");
        }
    }
}
