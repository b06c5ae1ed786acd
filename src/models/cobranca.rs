use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primeiro disparo do mês ou lembrete seguinte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipoCobranca {
    #[default]
    Primeira,
    Proximas,
}

/// Destinatário da campanha de cobrança
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpresaDestinatario {
    pub nome: String,
    pub emails: Vec<String>,
}

/// Registro de cada disparo de cobrança
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CobrancaHistorico {
    pub id: Uuid,
    pub competencia: String,
    pub tipo: TipoCobranca,
    pub total_empresas: usize,
    pub empresas_notificadas: Vec<String>,
    pub disparado_por: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprovadoResumo {
    pub nome: String,
    pub cpf: String,
    pub motivo: Option<String>,
}

/// Aviso de pendência enviado ao cliente quando a seguradora reprova colaboradores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendencyNotice {
    pub lote_id: Uuid,
    pub empresa_id: Uuid,
    pub competencia: String,
    pub total_aprovados: u32,
    pub total_reprovados: u32,
    pub reprovados: Vec<ReprovadoResumo>,
    pub nome_obra: Option<String>,
    pub created_at: DateTime<Utc>,
}
