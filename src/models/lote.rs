//! Lote: unidade de envio à seguradora por empresa, obra e competência

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::colaborador::ColaboradorLote;

/// Estados do ciclo de vida de um lote
///
/// `Entrada → EmAnaliseSeguradora → {ComPendencia | Concluido} → Faturado`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoteStatus {
    #[serde(rename = "aguardando_processamento")]
    Entrada,
    EmAnaliseSeguradora,
    ComPendencia,
    Concluido,
    Faturado,
}

impl LoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoteStatus::Entrada => "aguardando_processamento",
            LoteStatus::EmAnaliseSeguradora => "em_analise_seguradora",
            LoteStatus::ComPendencia => "com_pendencia",
            LoteStatus::Concluido => "concluido",
            LoteStatus::Faturado => "faturado",
        }
    }

    /// Colaboradores não podem ser editados durante a análise nem após o faturamento
    pub fn accepts_member_edits(&self) -> bool {
        !matches!(self, LoteStatus::Faturado | LoteStatus::EmAnaliseSeguradora)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoteStatus::Faturado)
    }
}

impl fmt::Display for LoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "aguardando_processamento" | "entrada" => Ok(LoteStatus::Entrada),
            "em_analise_seguradora" => Ok(LoteStatus::EmAnaliseSeguradora),
            "com_pendencia" => Ok(LoteStatus::ComPendencia),
            "concluido" => Ok(LoteStatus::Concluido),
            "faturado" => Ok(LoteStatus::Faturado),
            other => Err(format!("status de lote desconhecido: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lote {
    pub id: Uuid,
    pub empresa_id: Uuid,
    pub obra_id: Option<Uuid>,
    pub competencia: String,
    pub status: LoteStatus,
    pub total_colaboradores: u32,
    pub total_reprovados: u32,
    pub total_aprovados: u32,
    pub valor_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub enviado_seguradora_em: Option<DateTime<Utc>>,
    /// Planilha enviada à seguradora
    pub arquivo_url: Option<String>,
    pub nota_fiscal_url: Option<String>,
    pub boleto_url: Option<String>,
    pub adendo_url: Option<String>,
    #[serde(default)]
    pub cadastro_cartao: bool,
}

impl Lote {
    pub fn new(empresa_id: Uuid, obra_id: Option<Uuid>, competencia: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            empresa_id,
            obra_id,
            competencia: competencia.into(),
            status: LoteStatus::Entrada,
            total_colaboradores: 0,
            total_reprovados: 0,
            total_aprovados: 0,
            valor_total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            enviado_seguradora_em: None,
            arquivo_url: None,
            nota_fiscal_url: None,
            boleto_url: None,
            adendo_url: None,
            cadastro_cartao: false,
        }
    }

    /// Mesma empresa, mesma obra (inclusive ausência de obra) e mesma competência
    pub fn same_slot(&self, empresa_id: Uuid, obra_id: Option<Uuid>, competencia: &str) -> bool {
        self.empresa_id == empresa_id && self.obra_id == obra_id && self.competencia == competencia
    }

    /// Recalcula os totais a partir do conjunto atual de colaboradores
    pub fn recompute_totals(&mut self, members: &[ColaboradorLote], rate: Decimal) {
        let total = members.len() as u32;
        let reprovados = members.iter().filter(|m| m.is_rejected()).count() as u32;
        self.apply_counts(total, reprovados, rate);
    }

    /// Recalcula aprovados e valor a partir dos contadores já gravados
    pub fn recompute_value(&mut self, rate: Decimal) {
        self.apply_counts(self.total_colaboradores, self.total_reprovados, rate);
    }

    fn apply_counts(&mut self, total: u32, reprovados: u32, rate: Decimal) {
        let reprovados = reprovados.min(total);
        self.total_colaboradores = total;
        self.total_reprovados = reprovados;
        self.total_aprovados = total - reprovados;
        self.valor_total = Decimal::from(self.total_aprovados) * rate;
        self.updated_at = Utc::now();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
