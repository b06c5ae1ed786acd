//! Acompanhamento financeiro de um lote faturado: nota fiscal, boleto e pagamento

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lote::Lote;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotaFiscal {
    pub id: Uuid,
    pub lote_id: Uuid,
    pub empresa_id: Uuid,
    pub obra_id: Option<Uuid>,
    pub competencia: String,
    pub numero_vidas: u32,
    pub valor_total: Decimal,
    pub nf_emitida: bool,
    pub nf_url: Option<String>,
    pub nf_emitida_em: Option<DateTime<Utc>>,
    pub boleto_gerado: bool,
    pub boleto_url: Option<String>,
    pub boleto_gerado_em: Option<DateTime<Utc>>,
    pub pago: bool,
    pub pago_em: Option<DateTime<Utc>>,
}

impl NotaFiscal {
    /// Registro em aberto para um lote recém-faturado
    pub fn for_lote(lote: &Lote) -> Self {
        Self {
            id: Uuid::new_v4(),
            lote_id: lote.id,
            empresa_id: lote.empresa_id,
            obra_id: lote.obra_id,
            competencia: lote.competencia.clone(),
            numero_vidas: lote.total_aprovados,
            valor_total: lote.valor_total,
            nf_emitida: false,
            nf_url: None,
            nf_emitida_em: None,
            boleto_gerado: false,
            boleto_url: None,
            boleto_gerado_em: None,
            pago: false,
            pago_em: None,
        }
    }
}
