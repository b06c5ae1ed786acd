//! Acompanhamento das notas fiscais dos lotes faturados
//!
//! Cada lote faturado ganha um registro em aberto. O financeiro marca a
//! emissão da nota, o boleto e o pagamento; cada marcação guarda o momento
//! em que foi feita e desmarcar limpa o momento.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Lote, NotaFiscal};
use crate::services::store::{LoteRepository, StoreResult};
use crate::utils::normalization::competencia_sort_key;

/// Campos alteráveis; `None` mantém o valor atual
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotaFiscalUpdate {
    pub nf_emitida: Option<bool>,
    pub nf_url: Option<String>,
    pub boleto_gerado: Option<bool>,
    pub pago: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotaFiscalFilter {
    pub competencia: Option<String>,
    pub nf_emitida: Option<bool>,
    pub boleto_gerado: Option<bool>,
}

impl NotaFiscalFilter {
    fn matches(&self, nota: &NotaFiscal) -> bool {
        self.competencia.as_deref().map_or(true, |c| nota.competencia == c)
            && self.nf_emitida.map_or(true, |v| nota.nf_emitida == v)
            && self.boleto_gerado.map_or(true, |v| nota.boleto_gerado == v)
    }
}

/// Indicadores do painel de notas fiscais
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotaFiscalResumo {
    pub total: usize,
    pub nf_emitidas: usize,
    pub boletos_gerados: usize,
    pub pagos: usize,
    pub boletos_nao_pagos: usize,
    pub pct_nf: u32,
    pub pct_boleto: u32,
    pub pct_pago_total: u32,
    pub pct_pago_boleto: u32,
}

/// Percentual inteiro arredondado (meio para cima); zero quando não há base
fn percent(part: usize, base: usize) -> u32 {
    if base == 0 {
        return 0;
    }
    ((part * 200 + base) / (base * 2)) as u32
}

pub fn resumo(notas: &[NotaFiscal]) -> NotaFiscalResumo {
    let total = notas.len();
    let nf_emitidas = notas.iter().filter(|n| n.nf_emitida).count();
    let boletos_gerados = notas.iter().filter(|n| n.boleto_gerado).count();
    let pagos = notas.iter().filter(|n| n.pago).count();

    NotaFiscalResumo {
        total,
        nf_emitidas,
        boletos_gerados,
        pagos,
        boletos_nao_pagos: boletos_gerados.saturating_sub(pagos),
        pct_nf: percent(nf_emitidas, total),
        pct_boleto: percent(boletos_gerados, total),
        pct_pago_total: percent(pagos, total),
        pct_pago_boleto: percent(pagos, boletos_gerados),
    }
}

/// Notas filtradas, competências mais recentes primeiro
pub fn list_notas<R: LoteRepository + ?Sized>(repo: &R, filter: &NotaFiscalFilter) -> Vec<NotaFiscal> {
    let mut notas: Vec<NotaFiscal> = repo.list_notas_fiscais().into_iter().filter(|n| filter.matches(n)).collect();
    notas.sort_by(|a, b| competencia_sort_key(&b.competencia).cmp(&competencia_sort_key(&a.competencia)));
    notas
}

/// Cria o registro em aberto do lote, se ainda não existir
pub fn abrir_para_lote<R: LoteRepository + ?Sized>(repo: &mut R, lote: &Lote) -> StoreResult<NotaFiscal> {
    if let Some(existing) = repo.nota_fiscal_for_lote(lote.id) {
        return Ok(existing);
    }
    let nota = NotaFiscal::for_lote(lote);
    repo.insert_nota_fiscal(nota.clone())?;
    Ok(nota)
}

pub fn update_nota<R: LoteRepository + ?Sized>(
    repo: &mut R,
    id: Uuid,
    update: NotaFiscalUpdate,
) -> StoreResult<NotaFiscal> {
    let mut nota = repo.get_nota_fiscal(id)?;
    let now = Utc::now();

    if let Some(emitida) = update.nf_emitida {
        nota.nf_emitida = emitida;
        nota.nf_emitida_em = emitida.then_some(now);
    }
    if let Some(url) = update.nf_url {
        nota.nf_url = Some(url).filter(|u| !u.trim().is_empty());
    }
    if let Some(pago) = update.pago {
        nota.pago = pago;
        nota.pago_em = pago.then_some(now);
    }
    if let Some(gerado) = update.boleto_gerado {
        nota.boleto_gerado = gerado;
        nota.boleto_gerado_em = gerado.then_some(now);
        if !gerado {
            // Boleto descartado: o lote também perde o link
            nota.boleto_url = None;
            let mut lote = repo.get_lote(nota.lote_id)?;
            lote.boleto_url = None;
            lote.touch();
            repo.update_lote(&lote)?;
        }
    }

    repo.update_nota_fiscal(&nota)?;
    Ok(nota)
}

/// Registra o boleto gerado pelo webhook na nota do lote
pub fn registrar_boleto<R: LoteRepository + ?Sized>(
    repo: &mut R,
    lote_id: Uuid,
    boleto_url: &str,
) -> StoreResult<NotaFiscal> {
    let lote = repo.get_lote(lote_id)?;
    let mut nota = abrir_para_lote(repo, &lote)?;
    nota.boleto_url = Some(boleto_url.to_string());
    nota.boleto_gerado = true;
    nota.boleto_gerado_em = Some(Utc::now());
    repo.update_nota_fiscal(&nota)?;
    Ok(nota)
}
