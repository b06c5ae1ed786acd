//! Indicadores por competência: vidas e valor dos lotes já processados

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::LoteStatus;
use crate::services::store::{LoteFilter, LoteRepository};
use crate::utils::normalization::competencia_sort_key;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicadorCompetencia {
    pub competencia: String,
    pub vidas: u64,
    pub valor: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Indicadores {
    /// Ordem cronológica, da competência mais antiga para a mais recente
    pub competencias: Vec<IndicadorCompetencia>,
    pub total_vidas: u64,
    pub media_vidas: u64,
    pub vidas_ultimo_mes: u64,
}

/// Soma vidas e valor dos lotes concluídos e faturados de cada competência
pub fn indicadores<R: LoteRepository + ?Sized>(repo: &R) -> Indicadores {
    let mut por_competencia: HashMap<String, IndicadorCompetencia> = HashMap::new();

    for status in [LoteStatus::Concluido, LoteStatus::Faturado] {
        let filter = LoteFilter {
            status: Some(status),
            ..Default::default()
        };
        for lote in repo.list_lotes(&filter) {
            let entry = por_competencia
                .entry(lote.competencia.clone())
                .or_insert_with(|| IndicadorCompetencia {
                    competencia: lote.competencia.clone(),
                    vidas: 0,
                    valor: Decimal::ZERO,
                });
            entry.vidas += u64::from(lote.total_colaboradores);
            entry.valor += lote.valor_total;
        }
    }

    let mut competencias: Vec<IndicadorCompetencia> = por_competencia.into_values().collect();
    competencias.sort_by_key(|c| competencia_sort_key(&c.competencia));

    let total_vidas: u64 = competencias.iter().map(|c| c.vidas).sum();
    let count = competencias.len() as u64;
    let media_vidas = if count == 0 { 0 } else { (total_vidas * 2 + count) / (count * 2) };
    let vidas_ultimo_mes = competencias.last().map_or(0, |c| c.vidas);

    Indicadores {
        competencias,
        total_vidas,
        media_vidas,
        vidas_ultimo_mes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lote;
    use crate::services::store::MemoryRepository;
    use uuid::Uuid;

    fn lote(repo: &mut MemoryRepository, competencia: &str, status: LoteStatus, vidas: u32) {
        let mut l = Lote::new(Uuid::new_v4(), None, competencia);
        l.status = status;
        l.total_colaboradores = vidas;
        l.recompute_value(Decimal::from(50));
        repo.insert_lote(l).unwrap();
    }

    #[test]
    fn test_grouped_and_sorted_chronologically() {
        let mut repo = MemoryRepository::new();
        lote(&mut repo, "Janeiro/2025", LoteStatus::Faturado, 10);
        lote(&mut repo, "Dezembro/2024", LoteStatus::Concluido, 4);
        lote(&mut repo, "Janeiro/2025", LoteStatus::Concluido, 5);
        lote(&mut repo, "Fevereiro/2025", LoteStatus::Entrada, 100);
        lote(&mut repo, "Fevereiro/2025", LoteStatus::ComPendencia, 100);

        let ind = indicadores(&repo);
        let nomes: Vec<&str> = ind.competencias.iter().map(|c| c.competencia.as_str()).collect();
        assert_eq!(nomes, vec!["Dezembro/2024", "Janeiro/2025"]);
        assert_eq!(ind.competencias[1].vidas, 15);
        assert_eq!(ind.competencias[1].valor, Decimal::from(750));
        assert_eq!(ind.total_vidas, 19);
        assert_eq!(ind.media_vidas, 10);
        assert_eq!(ind.vidas_ultimo_mes, 15);
    }

    #[test]
    fn test_empty_repository() {
        let repo = MemoryRepository::new();
        assert_eq!(indicadores(&repo), Indicadores::default());
    }
}
