//! Clientes dos webhooks de automação (n8n)
//!
//! - Cobrança em massa: empresas ativas que ainda não enviaram a lista da competência
//! - Geração de boleto de um lote faturado

use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::WebhookSettings;
use crate::models::{CobrancaHistorico, Empresa, EmpresaDestinatario, TipoCobranca};
use crate::services::store::{LoteFilter, LoteRepository, StoreError};
use crate::utils::logging::{log_info, log_webhook_error};

#[derive(Debug, Error)]
pub enum CobrancaError {
    #[error("Nenhuma empresa para notificar")]
    NoRecipients,

    #[error("Webhook não configurado: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Webhook respondeu {status}: {body}")]
    Webhook { status: u16, body: String },

    #[error("Falha na chamada ao webhook: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Resposta inesperada do webhook: {0}")]
    InvalidResponse(String),
}

/// Empresas ativas sem nenhum lote na competência, em ordem alfabética
pub fn empresas_pendentes<R: LoteRepository + ?Sized>(repo: &R, competencia: &str) -> Vec<Empresa> {
    let com_lote: HashSet<Uuid> = repo
        .list_lotes(&LoteFilter {
            competencia: Some(competencia.to_string()),
            ..Default::default()
        })
        .into_iter()
        .map(|l| l.empresa_id)
        .collect();

    repo.list_empresas()
        .into_iter()
        .filter(|e| e.ativo && !com_lote.contains(&e.id))
        .collect()
}

fn build_http_client(settings: &WebhookSettings) -> Result<Client, CobrancaError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(settings.timeout_seconds.max(1)))
        .build()?)
}

async fn check_status(response: reqwest::Response, webhook: &str) -> Result<reqwest::Response, CobrancaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log_webhook_error(webhook, Some(status.as_u16()), &body);
    Err(CobrancaError::Webhook {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Serialize)]
struct CobrancaPayload<'a> {
    competencia: &'a str,
    template_url: Option<&'a str>,
    empresas: &'a [EmpresaDestinatario],
}

#[derive(Clone)]
pub struct CobrancaClient {
    client: Client,
    settings: WebhookSettings,
}

impl CobrancaClient {
    pub fn new(settings: &WebhookSettings) -> Result<Self, CobrancaError> {
        Ok(Self {
            client: build_http_client(settings)?,
            settings: settings.clone(),
        })
    }

    /// Lembretes usam o webhook próprio quando configurado
    fn webhook_url(&self, tipo: TipoCobranca) -> Result<&str, CobrancaError> {
        let url = match tipo {
            TipoCobranca::Proximas => self
                .settings
                .cobranca_followup_url
                .as_deref()
                .or(self.settings.cobranca_url.as_deref()),
            TipoCobranca::Primeira => self.settings.cobranca_url.as_deref(),
        };
        url.ok_or_else(|| CobrancaError::NotConfigured("webhooks.cobranca_url".to_string()))
    }

    /// Envia a campanha e devolve o registro de histórico a ser gravado
    ///
    /// Empresas sem e-mail de contato ficam de fora do disparo.
    pub async fn disparar(
        &self,
        competencia: &str,
        tipo: TipoCobranca,
        empresas: &[Empresa],
        disparado_por: Option<Uuid>,
    ) -> Result<CobrancaHistorico, CobrancaError> {
        let destinatarios: Vec<EmpresaDestinatario> = empresas
            .iter()
            .filter(|e| !e.emails_contato.is_empty())
            .map(|e| EmpresaDestinatario {
                nome: e.nome.clone(),
                emails: e.emails_contato.clone(),
            })
            .collect();
        if destinatarios.is_empty() {
            return Err(CobrancaError::NoRecipients);
        }

        let url = self.webhook_url(tipo)?;
        let payload = CobrancaPayload {
            competencia,
            template_url: self.settings.template_url.as_deref(),
            empresas: &destinatarios,
        };

        log_info(&format!(
            "📧 Disparando cobrança ({:?}) de {} para {} empresa(s)",
            tipo,
            competencia,
            destinatarios.len()
        ));

        let response = self.client.post(url).json(&payload).send().await?;
        check_status(response, "cobranca").await?;

        Ok(CobrancaHistorico {
            id: Uuid::new_v4(),
            competencia: competencia.to_string(),
            tipo,
            total_empresas: destinatarios.len(),
            empresas_notificadas: destinatarios.into_iter().map(|d| d.nome).collect(),
            disparado_por,
            created_at: Utc::now(),
        })
    }
}

#[derive(Clone)]
pub struct BoletoClient {
    client: Client,
    url: Option<String>,
}

impl BoletoClient {
    pub fn new(settings: &WebhookSettings) -> Result<Self, CobrancaError> {
        Ok(Self {
            client: build_http_client(settings)?,
            url: settings.boleto_url.clone(),
        })
    }

    /// Pede o boleto do lote e devolve a URL gerada
    pub async fn gerar(&self, lote_id: Uuid) -> Result<String, CobrancaError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| CobrancaError::NotConfigured("webhooks.boleto_url".to_string()))?;

        let response = self
            .client
            .post(url)
            .json(&json!({ "loteId": lote_id }))
            .send()
            .await?;
        let response = check_status(response, "boleto").await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| CobrancaError::InvalidResponse(e.to_string()))?;

        // Cada fluxo devolve o link com um nome diferente
        ["boleto_url", "bankSlipUrl", "invoiceUrl"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| CobrancaError::InvalidResponse(format!("sem URL de boleto: {}", body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lote;
    use crate::services::store::MemoryRepository;
    use httpmock::prelude::*;

    fn settings(server: &MockServer) -> WebhookSettings {
        WebhookSettings {
            cobranca_url: Some(server.url("/webhook/cobranca")),
            cobranca_followup_url: Some(server.url("/webhook/cobranca-posteriores")),
            boleto_url: Some(server.url("/webhook/gerar-boleto")),
            template_url: Some("https://files.example.com/modelo.html".to_string()),
            timeout_seconds: 5,
        }
    }

    fn empresa(nome: &str, email: Option<&str>) -> Empresa {
        let mut e = Empresa::new(nome, "11222333000181");
        e.emails_contato = email.map(|m| vec![m.to_string()]).unwrap_or_default();
        e
    }

    #[tokio::test]
    async fn test_disparar_primeira_cobranca() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/webhook/cobranca")
                    .json_body(json!({
                        "competencia": "Março/2025",
                        "template_url": "https://files.example.com/modelo.html",
                        "empresas": [{"nome": "Alfa", "emails": ["rh@alfa.com.br"]}]
                    }));
                then.status(200).json_body(json!({"ok": true}));
            })
            .await;

        let client = CobrancaClient::new(&settings(&server)).unwrap();
        let empresas = vec![empresa("Alfa", Some("rh@alfa.com.br")), empresa("Sem Email", None)];
        let historico = client
            .disparar("Março/2025", TipoCobranca::Primeira, &empresas, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(historico.total_empresas, 1);
        assert_eq!(historico.empresas_notificadas, vec!["Alfa".to_string()]);
        assert_eq!(historico.tipo, TipoCobranca::Primeira);
    }

    #[tokio::test]
    async fn test_disparar_proximas_usa_webhook_proprio() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/webhook/cobranca-posteriores");
                then.status(200);
            })
            .await;

        let client = CobrancaClient::new(&settings(&server)).unwrap();
        client
            .disparar("Março/2025", TipoCobranca::Proximas, &[empresa("Alfa", Some("a@a.com"))], Some(Uuid::new_v4()))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_disparar_sem_destinatarios() {
        let server = MockServer::start_async().await;
        let client = CobrancaClient::new(&settings(&server)).unwrap();
        let err = client
            .disparar("Março/2025", TipoCobranca::Primeira, &[empresa("Sem Email", None)], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CobrancaError::NoRecipients));
    }

    #[tokio::test]
    async fn test_disparar_webhook_falha() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/webhook/cobranca");
                then.status(500).body("workflow error");
            })
            .await;

        let client = CobrancaClient::new(&settings(&server)).unwrap();
        let err = client
            .disparar("Março/2025", TipoCobranca::Primeira, &[empresa("Alfa", Some("a@a.com"))], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CobrancaError::Webhook { status: 500, ref body } if body == "workflow error"));
    }

    #[tokio::test]
    async fn test_disparar_sem_configuracao() {
        let client = CobrancaClient::new(&WebhookSettings {
            timeout_seconds: 5,
            ..Default::default()
        })
        .unwrap();
        let err = client
            .disparar("Março/2025", TipoCobranca::Primeira, &[empresa("Alfa", Some("a@a.com"))], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CobrancaError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_boleto_aceita_nomes_alternativos() {
        let server = MockServer::start_async().await;
        let lote_id = Uuid::new_v4();
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/webhook/gerar-boleto")
                    .json_body(json!({ "loteId": lote_id }));
                then.status(200)
                    .json_body(json!({ "bankSlipUrl": "https://banco.example.com/boleto/1.pdf" }));
            })
            .await;

        let client = BoletoClient::new(&settings(&server)).unwrap();
        let url = client.gerar(lote_id).await.unwrap();
        mock.assert_async().await;
        assert_eq!(url, "https://banco.example.com/boleto/1.pdf");
    }

    #[tokio::test]
    async fn test_boleto_sem_url_na_resposta() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/webhook/gerar-boleto");
                then.status(200).json_body(json!({ "status": "processando" }));
            })
            .await;

        let client = BoletoClient::new(&settings(&server)).unwrap();
        let err = client.gerar(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CobrancaError::InvalidResponse(_)));
    }

    #[test]
    fn test_empresas_pendentes() {
        let mut repo = MemoryRepository::new();
        let com_lote = empresa("Alfa", Some("a@a.com"));
        let sem_lote = Empresa::new("Beta", "45723174000110");
        let mut inativa = Empresa::new("Gama", "04252011000110");
        inativa.ativo = false;
        for e in [&com_lote, &sem_lote, &inativa] {
            repo.insert_empresa(e.clone()).unwrap();
        }
        repo.insert_lote(Lote::new(com_lote.id, None, "Março/2025")).unwrap();

        let pendentes = empresas_pendentes(&repo, "Março/2025");
        assert_eq!(pendentes.len(), 1);
        assert_eq!(pendentes[0].id, sem_lote.id);

        assert_eq!(empresas_pendentes(&repo, "Abril/2025").len(), 2);
    }
}
