use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub policy: PolicySettings,
    pub webhooks: WebhookSettings,
    pub storage: StorageSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Regras de negócio configuráveis por implantação
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PolicySettings {
    /// Valor cobrado por colaborador aprovado
    pub per_head_rate: Decimal,
    /// Salários abaixo deste valor são classificados como Ajudante
    pub helper_salary_threshold: Decimal,
    /// Exige dígitos verificadores válidos no CPF importado
    #[serde(default)]
    pub strict_checksum: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            per_head_rate: Decimal::from(50),
            helper_salary_threshold: Decimal::from(2000),
            strict_checksum: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WebhookSettings {
    pub cobranca_url: Option<String>,
    pub cobranca_followup_url: Option<String>,
    pub boleto_url: Option<String>,
    /// Modelo de e-mail repassado ao fluxo de cobrança
    pub template_url: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageSettings {
    pub export_dir: String,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AuthSettings {
    pub api_key: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Self::defaults()?
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        // Variáveis legadas, sem prefixo
        if let Ok(key) = std::env::var("ADMIN_API_KEY") {
            builder = builder.set_override("auth.api_key", key)?;
        }
        if let Ok(url) = std::env::var("N8N_WEBHOOK_URL") {
            builder = builder.set_override("webhooks.cobranca_url", url)?;
        }

        // LOTES__POLICY__PER_HEAD_RATE=60, LOTES__SERVER__PORT=9000 ...
        builder = builder.add_source(
            Environment::with_prefix("LOTES")
                .prefix_separator("__")
                .separator("__"),
        );

        let s = builder.build()?;

        s.try_deserialize()
    }

    /// Valores padrão para subir o serviço sem nenhum arquivo de configuração
    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("policy.per_head_rate", "50")?
            .set_default("policy.helper_salary_threshold", "2000")?
            .set_default("policy.strict_checksum", false)?
            .set_default("webhooks.timeout_seconds", 30)?
            .set_default("storage.export_dir", "./data/exports")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.policy, PolicySettings::default());
        assert_eq!(settings.webhooks.timeout_seconds, 30);
        assert!(settings.webhooks.cobranca_url.is_none());
        assert!(settings.auth.api_key.is_none());
    }
}
