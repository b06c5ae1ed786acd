use tracing::{info, warn, error, debug};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_lote_transition(lote_id: &str, from: &str, to: &str) {
    info!("🔁 Lote {}: {} → {}", lote_id, from, to);
}

pub fn log_import_summary(valid: usize, invalid: usize) {
    info!("📥 Planilha processada: {} válidos, {} com erro", valid, invalid);
}

pub fn log_webhook_error(endpoint: &str, status: Option<u16>, error: &str) {
    error!("Webhook error: {} - Status: {:?} - Error: {}", endpoint, status, error);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 Lotes back-office server starting on port {}", port);
}

pub fn log_server_ready(port: u16) {
    info!("✅ Server ready and listening on http://0.0.0.0:{}", port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
