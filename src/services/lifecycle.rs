//! Ciclo de vida dos lotes
//!
//! `Entrada → EmAnaliseSeguradora → {ComPendencia | Concluido} → Faturado`
//!
//! Toda operação valida as pré-condições antes de gravar qualquer coisa:
//! uma falha deixa lotes, colaboradores e cadastro como estavam.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

use crate::config::PolicySettings;
use crate::models::{
    Colaborador, ColaboradorLote, Lote, LoteStatus, PendencyNotice, ReprovadoResumo, StatusCadastro,
    StatusSeguradora,
};
use crate::services::export::{build_workbook, roster_file_name, ExportContext, ExportError, ModeloPlanilha};
use crate::services::notas_fiscais::abrir_para_lote;
use crate::services::storage::{DocumentStorage, StorageError};
use crate::services::store::{LoteFilter, LoteRepository, StoreError};
use crate::utils::logging::log_lote_transition;
use crate::utils::validators::{normalize_tax_id, validate_tax_id};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("lote {0} not found")]
    NotFound(Uuid),

    #[error("empresa {0} not found")]
    EmpresaNotFound(Uuid),

    #[error("obra {0} not found")]
    ObraNotFound(Uuid),

    #[error("invalid transition on lote {id}: {operation} requires {expected}, current status is {from}")]
    InvalidTransition {
        id: Uuid,
        from: LoteStatus,
        operation: &'static str,
        expected: String,
    },

    #[error("lote {0} has no members")]
    EmptyRoster(Uuid),

    #[error("no members informed")]
    NoRecords,

    #[error("no target found for pendency {id}")]
    NoTargetFound { id: Uuid },

    #[error("ambiguous target for pendency {id}: {count} candidate batches")]
    AmbiguousTarget { id: Uuid, count: usize },

    #[error("lote {existing} is already {status} for this company, work-site and competência")]
    SlotBusy { existing: Uuid, status: LoteStatus },

    #[error("CPF {cpf} is not a member of lote {lote_id}")]
    UnknownMember { lote_id: Uuid, cpf: String },

    #[error("invalid CPF: {0}")]
    InvalidTaxId(String),

    #[error("CPF {cpf} is already a member of lote {lote_id}")]
    DuplicateMember { lote_id: Uuid, cpf: String },

    #[error("insurer response for lote {lote_id} has CPFs outside the batch: {}", .cpfs.join(", "))]
    UnknownDecisions { lote_id: Uuid, cpfs: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Decisão da seguradora para um colaborador
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurerDecision {
    pub cpf: String,
    pub aprovado: bool,
    pub motivo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaceOutcome {
    pub lote: Lote,
    /// CPFs do cadastro da empresa/obra fora da nova relação (status desligado)
    pub desligados: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsurerOutcome {
    pub lote: Lote,
    pub pendencia: Option<Lote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub lote_id: Uuid,
    pub erro: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub faturados: Vec<Lote>,
    pub falhas: Vec<BulkFailure>,
}

#[derive(Debug, Clone)]
pub struct LifecycleManager {
    policy: PolicySettings,
}

impl LifecycleManager {
    pub fn new(policy: PolicySettings) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicySettings {
        &self.policy
    }

    fn rate(&self) -> Decimal {
        self.policy.per_head_rate
    }

    // ------------------------------------------------------------------
    // Entrada de colaboradores
    // ------------------------------------------------------------------

    /// Cria o lote de entrada da empresa/obra/competência ou incorpora os
    /// registros ao lote de entrada já existente (CPF repetido atualiza).
    pub fn submit_roster<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        empresa_id: Uuid,
        obra_id: Option<Uuid>,
        competencia: &str,
        records: Vec<Colaborador>,
    ) -> LifecycleResult<Lote> {
        repo.get_empresa(empresa_id)
            .map_err(|_| LifecycleError::EmpresaNotFound(empresa_id))?;
        if let Some(id) = obra_id {
            match repo.get_obra(id) {
                Ok(obra) if obra.empresa_id == empresa_id => {}
                _ => return Err(LifecycleError::ObraNotFound(id)),
            }
        }
        let records = dedupe_records(records)?;

        let slot: Vec<Lote> = repo
            .list_lotes(&LoteFilter {
                empresa_id: Some(empresa_id),
                ..Default::default()
            })
            .into_iter()
            .filter(|l| l.same_slot(empresa_id, obra_id, competencia))
            .collect();

        if let Some(busy) = slot.iter().find(|l| {
            matches!(
                l.status,
                LoteStatus::EmAnaliseSeguradora | LoteStatus::ComPendencia | LoteStatus::Concluido
            )
        }) {
            return Err(LifecycleError::SlotBusy {
                existing: busy.id,
                status: busy.status,
            });
        }

        let mut lote = match slot.into_iter().find(|l| l.status == LoteStatus::Entrada) {
            Some(existing) => {
                tracing::info!("🔀 Incorporando {} registro(s) ao lote {}", records.len(), existing.id);
                existing
            }
            None => {
                let lote = Lote::new(empresa_id, obra_id, competencia);
                repo.insert_lote(lote.clone())?;
                tracing::info!("🆕 Lote {} criado para {}", lote.id, competencia);
                lote
            }
        };

        let current = repo.list_members(lote.id);
        for record in records {
            let colaborador_id = repo.upsert_registry(empresa_id, obra_id, &record);
            match current.iter().find(|m| m.dados.cpf == record.cpf) {
                Some(existing) => {
                    let mut updated = existing.clone();
                    updated.dados = record;
                    updated.colaborador_id = Some(colaborador_id);
                    repo.update_member(&updated)?;
                }
                None => repo.insert_member(ColaboradorLote::aprovado(lote.id, Some(colaborador_id), record))?,
            }
        }

        lote.recompute_totals(&repo.list_members(lote.id), self.rate());
        repo.update_lote(&lote)?;
        Ok(lote)
    }

    pub fn add_member<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        lote_id: Uuid,
        record: Colaborador,
    ) -> LifecycleResult<Lote> {
        let mut lote = load(&*repo, lote_id)?;
        require_editable(&lote, "add_member")?;
        check_tax_id(&record.cpf)?;

        let members = repo.list_members(lote_id);
        if members.iter().any(|m| m.dados.cpf == record.cpf) {
            return Err(LifecycleError::DuplicateMember {
                lote_id,
                cpf: record.cpf,
            });
        }

        let colaborador_id = repo.upsert_registry(lote.empresa_id, lote.obra_id, &record);
        repo.insert_member(ColaboradorLote::aprovado(lote_id, Some(colaborador_id), record))?;

        lote.recompute_totals(&repo.list_members(lote_id), self.rate());
        repo.update_lote(&lote)?;
        Ok(lote)
    }

    pub fn update_member<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        lote_id: Uuid,
        cpf: &str,
        record: Colaborador,
    ) -> LifecycleResult<Lote> {
        let mut lote = load(&*repo, lote_id)?;
        require_editable(&lote, "update_member")?;
        check_tax_id(&record.cpf)?;

        let cpf = normalize_tax_id(cpf);
        let members = repo.list_members(lote_id);
        let mut member = find_member(&members, lote_id, &cpf)?.clone();
        if record.cpf != cpf && members.iter().any(|m| m.dados.cpf == record.cpf) {
            return Err(LifecycleError::DuplicateMember {
                lote_id,
                cpf: record.cpf,
            });
        }

        member.colaborador_id = Some(repo.upsert_registry(lote.empresa_id, lote.obra_id, &record));
        member.dados = record;
        repo.update_member(&member)?;

        lote.recompute_totals(&repo.list_members(lote_id), self.rate());
        repo.update_lote(&lote)?;
        Ok(lote)
    }

    pub fn remove_member<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        lote_id: Uuid,
        cpf: &str,
    ) -> LifecycleResult<Lote> {
        let mut lote = load(&*repo, lote_id)?;
        require_editable(&lote, "remove_member")?;

        let cpf = normalize_tax_id(cpf);
        let members = repo.list_members(lote_id);
        let member = find_member(&members, lote_id, &cpf)?;
        repo.delete_member(member.id)?;

        lote.recompute_totals(&repo.list_members(lote_id), self.rate());
        repo.update_lote(&lote)?;
        Ok(lote)
    }

    /// Substitui a relação inteira do lote
    ///
    /// Quem está no cadastro da empresa/obra e não aparece na nova relação
    /// passa a `desligado`. Repetir a mesma relação produz o mesmo resultado.
    pub fn replace_members<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        lote_id: Uuid,
        records: Vec<Colaborador>,
    ) -> LifecycleResult<ReplaceOutcome> {
        let mut lote = load(&*repo, lote_id)?;
        require_editable(&lote, "replace_members")?;
        let records = dedupe_records(records)?;

        let roster: HashSet<String> = records.iter().map(|r| r.cpf.clone()).collect();
        let new_members: Vec<ColaboradorLote> = records
            .into_iter()
            .map(|record| {
                let colaborador_id = repo.upsert_registry(lote.empresa_id, lote.obra_id, &record);
                ColaboradorLote::aprovado(lote_id, Some(colaborador_id), record)
            })
            .collect();
        repo.replace_lote_members(lote_id, new_members)?;

        let mut desligados = Vec::new();
        for entry in repo.list_registry(lote.empresa_id, lote.obra_id) {
            if roster.contains(&entry.dados.cpf) {
                continue;
            }
            if entry.status == StatusCadastro::Ativo {
                repo.set_registry_status(entry.id, StatusCadastro::Desligado)?;
            }
            desligados.push(entry.dados.cpf);
        }
        desligados.sort();

        lote.recompute_totals(&repo.list_members(lote_id), self.rate());
        repo.update_lote(&lote)?;

        tracing::info!(
            "🔄 Lote {}: relação substituída ({} colaboradores, {} desligados)",
            lote_id,
            lote.total_colaboradores,
            desligados.len()
        );
        Ok(ReplaceOutcome { lote, desligados })
    }

    // ------------------------------------------------------------------
    // Transições
    // ------------------------------------------------------------------

    /// `Entrada → EmAnaliseSeguradora`: gera a planilha Alba e registra onde ficou
    pub fn send_to_insurer<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        storage: &dyn DocumentStorage,
        lote_id: Uuid,
    ) -> LifecycleResult<Lote> {
        let mut lote = load(&*repo, lote_id)?;
        require(&lote, &[LoteStatus::Entrada], "send_to_insurer")?;

        let members = repo.list_members(lote_id);
        if members.is_empty() {
            return Err(LifecycleError::EmptyRoster(lote_id));
        }
        let empresa = repo
            .get_empresa(lote.empresa_id)
            .map_err(|_| LifecycleError::EmpresaNotFound(lote.empresa_id))?;

        let bytes = build_workbook(ModeloPlanilha::PadraoAlba, ExportContext::from(&empresa), &members)?;
        let url = storage.put(&roster_file_name(&empresa.nome, &lote.competencia), &bytes)?;

        let from = lote.status;
        lote.status = LoteStatus::EmAnaliseSeguradora;
        lote.arquivo_url = Some(url);
        lote.enviado_seguradora_em = Some(Utc::now());
        lote.touch();
        repo.update_lote(&lote)?;

        log_lote_transition(&lote_id.to_string(), from.as_str(), lote.status.as_str());
        Ok(lote)
    }

    /// `EmAnaliseSeguradora → Concluido [+ ComPendencia]`
    ///
    /// Colaboradores sem decisão são aprovados. Reprovados são copiados para
    /// um novo lote com pendência; o original fica só com os aprovados.
    pub fn apply_insurer_response<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        lote_id: Uuid,
        decisions: &[InsurerDecision],
    ) -> LifecycleResult<InsurerOutcome> {
        let mut lote = load(&*repo, lote_id)?;
        require(&lote, &[LoteStatus::EmAnaliseSeguradora], "apply_insurer_response")?;

        let members = repo.list_members(lote_id);
        let known: HashSet<&str> = members.iter().map(|m| m.dados.cpf.as_str()).collect();
        let decisions: HashMap<String, &InsurerDecision> =
            decisions.iter().map(|d| (normalize_tax_id(&d.cpf), d)).collect();

        let mut unknown: Vec<String> = decisions
            .keys()
            .filter(|cpf| !known.contains(cpf.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(LifecycleError::UnknownDecisions { lote_id, cpfs: unknown });
        }

        let (rejected, approved): (Vec<ColaboradorLote>, Vec<ColaboradorLote>) = members
            .into_iter()
            .partition(|m| decisions.get(&m.dados.cpf).map_or(false, |d| !d.aprovado));

        let pendencia = if rejected.is_empty() {
            None
        } else {
            let mut pendencia = Lote::new(lote.empresa_id, lote.obra_id, lote.competencia.clone());
            pendencia.status = LoteStatus::ComPendencia;
            let copies: Vec<ColaboradorLote> = rejected
                .iter()
                .map(|m| {
                    let motivo = decisions.get(&m.dados.cpf).and_then(|d| d.motivo.clone());
                    ColaboradorLote {
                        id: Uuid::new_v4(),
                        lote_id: pendencia.id,
                        status_seguradora: StatusSeguradora::Reprovado,
                        motivo_reprovacao_seguradora: motivo,
                        created_at: Utc::now(),
                        ..m.clone()
                    }
                })
                .collect();
            pendencia.recompute_totals(&copies, self.rate());
            repo.insert_lote(pendencia.clone())?;
            repo.replace_lote_members(pendencia.id, copies)?;
            Some(pendencia)
        };

        let from = lote.status;
        lote.status = LoteStatus::Concluido;
        lote.recompute_totals(&approved, self.rate());
        repo.replace_lote_members(lote_id, approved)?;
        repo.update_lote(&lote)?;
        log_lote_transition(&lote_id.to_string(), from.as_str(), lote.status.as_str());

        if let Some(p) = &pendencia {
            tracing::warn!("⚠️ Lote {}: {} colaborador(es) reprovado(s), pendência {}", lote_id, p.total_colaboradores, p.id);
            let notice = self.build_notice(&*repo, p)?;
            repo.insert_notice(notice);
        }

        Ok(InsurerOutcome { lote, pendencia })
    }

    /// `Concluido → Faturado`: valor = (colaboradores − reprovados) × valor por vida
    pub fn invoice<R: LoteRepository + ?Sized>(&self, repo: &mut R, lote_id: Uuid) -> LifecycleResult<Lote> {
        let mut lote = load(&*repo, lote_id)?;
        require(&lote, &[LoteStatus::Concluido], "invoice")?;

        let from = lote.status;
        lote.recompute_value(self.rate());
        lote.status = LoteStatus::Faturado;
        repo.update_lote(&lote)?;
        abrir_para_lote(repo, &lote)?;

        log_lote_transition(&lote_id.to_string(), from.as_str(), lote.status.as_str());
        Ok(lote)
    }

    /// Fatura vários lotes em sequência; falhas são acumuladas e o laço continua
    pub fn invoice_many<R: LoteRepository + ?Sized>(&self, repo: &mut R, lote_ids: &[Uuid]) -> BulkReport {
        let mut report = BulkReport::default();
        for &lote_id in lote_ids {
            match self.invoice(repo, lote_id) {
                Ok(lote) => report.faturados.push(lote),
                Err(e) => {
                    tracing::warn!("⚠️ Falha ao faturar lote {}: {}", lote_id, e);
                    report.falhas.push(BulkFailure {
                        lote_id,
                        erro: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            "💰 Faturamento em massa: {} faturado(s), {} falha(s)",
            report.faturados.len(),
            report.falhas.len()
        );
        report
    }

    // ------------------------------------------------------------------
    // Pendências
    // ------------------------------------------------------------------

    /// Incorpora os colaboradores da pendência (como aprovados) ao lote
    /// concluído/faturado da mesma empresa, obra e competência e apaga a pendência
    pub fn resolve_pendency<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        pendency_id: Uuid,
    ) -> LifecycleResult<Lote> {
        let pendencia = load(&*repo, pendency_id)?;
        require(&pendencia, &[LoteStatus::ComPendencia], "resolve_pendency")?;

        let mut target = find_target(&*repo, &pendencia)?;
        let target_members = repo.list_members(target.id);

        for member in repo.list_members(pendency_id) {
            let existing = target_members.iter().find(|m| m.dados.cpf == member.dados.cpf);
            let moved = ColaboradorLote {
                id: existing.map(|m| m.id).unwrap_or_else(Uuid::new_v4),
                lote_id: target.id,
                status_seguradora: StatusSeguradora::Aprovado,
                motivo_reprovacao_seguradora: None,
                ..member
            };
            match existing {
                Some(_) => repo.update_member(&moved)?,
                None => repo.insert_member(moved)?,
            }
        }

        target.recompute_totals(&repo.list_members(target.id), self.rate());
        repo.update_lote(&target)?;
        repo.delete_lote(pendency_id)?;

        tracing::info!("✅ Pendência {} resolvida no lote {}", pendency_id, target.id);
        Ok(target)
    }

    /// Descarta a pendência e seus colaboradores
    pub fn reject_pendency<R: LoteRepository + ?Sized>(&self, repo: &mut R, pendency_id: Uuid) -> LifecycleResult<()> {
        let pendencia = load(&*repo, pendency_id)?;
        require(&pendencia, &[LoteStatus::ComPendencia], "reject_pendency")?;
        repo.delete_lote(pendency_id)?;
        tracing::info!("🗑️ Pendência {} rejeitada", pendency_id);
        Ok(())
    }

    /// Aviso ao cliente sobre os reprovados de uma pendência
    pub fn pendency_notice<R: LoteRepository + ?Sized>(
        &self,
        repo: &R,
        pendency_id: Uuid,
    ) -> LifecycleResult<PendencyNotice> {
        let pendencia = load(&*repo, pendency_id)?;
        require(&pendencia, &[LoteStatus::ComPendencia], "pendency_notice")?;
        self.build_notice(repo, &pendencia)
    }

    fn build_notice<R: LoteRepository + ?Sized>(&self, repo: &R, pendencia: &Lote) -> LifecycleResult<PendencyNotice> {
        let reprovados: Vec<ReprovadoResumo> = repo
            .list_members(pendencia.id)
            .into_iter()
            .map(|m| ReprovadoResumo {
                nome: m.dados.nome,
                cpf: m.dados.cpf,
                motivo: m.motivo_reprovacao_seguradora,
            })
            .collect();
        let total_aprovados = find_target(&*repo, pendencia).map(|t| t.total_aprovados).unwrap_or(0);
        let nome_obra = pendencia
            .obra_id
            .and_then(|id| repo.get_obra(id).ok())
            .map(|o| o.nome);

        Ok(PendencyNotice {
            lote_id: pendencia.id,
            empresa_id: pendencia.empresa_id,
            competencia: pendencia.competencia.clone(),
            total_aprovados,
            total_reprovados: reprovados.len() as u32,
            reprovados,
            nome_obra,
            created_at: Utc::now(),
        })
    }

    // ------------------------------------------------------------------
    // Manutenção
    // ------------------------------------------------------------------

    pub fn delete_batch<R: LoteRepository + ?Sized>(&self, repo: &mut R, lote_id: Uuid) -> LifecycleResult<()> {
        let lote = load(&*repo, lote_id)?;
        if lote.status.is_terminal() {
            return Err(LifecycleError::InvalidTransition {
                id: lote_id,
                from: lote.status,
                operation: "delete_batch",
                expected: "a non-invoiced batch".to_string(),
            });
        }
        repo.delete_lote(lote_id)?;
        tracing::info!("🗑️ Lote {} excluído", lote_id);
        Ok(())
    }

    pub fn toggle_card_registration<R: LoteRepository + ?Sized>(
        &self,
        repo: &mut R,
        lote_id: Uuid,
        cadastrado: bool,
    ) -> LifecycleResult<Lote> {
        let mut lote = load(&*repo, lote_id)?;
        lote.cadastro_cartao = cadastrado;
        lote.touch();
        repo.update_lote(&lote)?;
        Ok(lote)
    }
}

fn load<R: LoteRepository + ?Sized>(repo: &R, lote_id: Uuid) -> LifecycleResult<Lote> {
    repo.get_lote(lote_id).map_err(|e| match e {
        StoreError::NotFound { .. } => LifecycleError::NotFound(lote_id),
        other => other.into(),
    })
}

fn require(lote: &Lote, allowed: &[LoteStatus], operation: &'static str) -> LifecycleResult<()> {
    if allowed.contains(&lote.status) {
        return Ok(());
    }
    Err(LifecycleError::InvalidTransition {
        id: lote.id,
        from: lote.status,
        operation,
        expected: allowed.iter().map(LoteStatus::as_str).collect::<Vec<_>>().join(" | "),
    })
}

fn require_editable(lote: &Lote, operation: &'static str) -> LifecycleResult<()> {
    if lote.status.accepts_member_edits() {
        return Ok(());
    }
    Err(LifecycleError::InvalidTransition {
        id: lote.id,
        from: lote.status,
        operation,
        expected: "aguardando_processamento | com_pendencia | concluido".to_string(),
    })
}

fn check_tax_id(cpf: &str) -> LifecycleResult<()> {
    if validate_tax_id(cpf) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTaxId(cpf.to_string()))
    }
}

fn find_member<'a>(members: &'a [ColaboradorLote], lote_id: Uuid, cpf: &str) -> LifecycleResult<&'a ColaboradorLote> {
    members
        .iter()
        .find(|m| m.dados.cpf == cpf)
        .ok_or_else(|| LifecycleError::UnknownMember {
            lote_id,
            cpf: cpf.to_string(),
        })
}

/// CPFs inválidos barram a operação; repetidos ficam com o primeiro
fn dedupe_records(records: Vec<Colaborador>) -> LifecycleResult<Vec<Colaborador>> {
    if records.is_empty() {
        return Err(LifecycleError::NoRecords);
    }
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        check_tax_id(&record.cpf)?;
        if seen.insert(record.cpf.clone()) {
            unique.push(record);
        }
    }
    Ok(unique)
}

/// Único lote concluído ou faturado da mesma empresa, obra e competência
fn find_target<R: LoteRepository + ?Sized>(repo: &R, pendencia: &Lote) -> LifecycleResult<Lote> {
    let mut candidates: Vec<Lote> = repo
        .list_lotes(&LoteFilter {
            empresa_id: Some(pendencia.empresa_id),
            ..Default::default()
        })
        .into_iter()
        .filter(|l| {
            l.id != pendencia.id
                && l.same_slot(pendencia.empresa_id, pendencia.obra_id, &pendencia.competencia)
                && matches!(l.status, LoteStatus::Concluido | LoteStatus::Faturado)
        })
        .collect();

    match candidates.len() {
        0 => Err(LifecycleError::NoTargetFound { id: pendencia.id }),
        1 => Ok(candidates.remove(0)),
        count => Err(LifecycleError::AmbiguousTarget {
            id: pendencia.id,
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classificacao, Empresa, Obra, Sexo};
    use crate::services::storage::LocalStorage;
    use crate::services::store::MemoryRepository;
    use chrono::NaiveDate;

    const CPFS: [&str; 4] = ["11144477735", "52998224725", "39053344705", "86288366757"];

    fn record(nome: &str, cpf: &str) -> Colaborador {
        Colaborador {
            nome: nome.to_string(),
            cpf: cpf.to_string(),
            sexo: Sexo::Masculino,
            data_nascimento: NaiveDate::from_ymd_opt(1988, 8, 8).unwrap(),
            salario: Decimal::from(2100),
            classificacao_salario: Classificacao::Profissional,
        }
    }

    fn roster(n: usize) -> Vec<Colaborador> {
        CPFS.iter().take(n).enumerate().map(|(i, cpf)| record(&format!("COLABORADOR {}", i), cpf)).collect()
    }

    fn setup() -> (MemoryRepository, LifecycleManager, Empresa) {
        let mut repo = MemoryRepository::new();
        let empresa = Empresa::new("Construtora Horizonte", "11222333000181");
        repo.insert_empresa(empresa.clone()).unwrap();
        (repo, LifecycleManager::new(PolicySettings::default()), empresa)
    }

    fn with_status(repo: &mut MemoryRepository, lote: &Lote, status: LoteStatus) -> Lote {
        let mut lote = lote.clone();
        lote.status = status;
        repo.update_lote(&lote).unwrap();
        lote
    }

    #[test]
    fn test_invoice_scenario_100_members_10_rejected() {
        let (mut repo, manager, empresa) = setup();
        let mut lote = Lote::new(empresa.id, None, "Março/2025");
        lote.status = LoteStatus::Concluido;
        lote.total_colaboradores = 100;
        lote.total_reprovados = 10;
        repo.insert_lote(lote.clone()).unwrap();

        let faturado = manager.invoice(&mut repo, lote.id).unwrap();
        assert_eq!(faturado.status, LoteStatus::Faturado);
        assert_eq!(faturado.valor_total, Decimal::from(4500));
        assert_eq!(faturado.total_aprovados, 90);

        let nota = repo.nota_fiscal_for_lote(lote.id).unwrap();
        assert_eq!(nota.numero_vidas, 90);
        assert_eq!(nota.valor_total, Decimal::from(4500));
        assert!(!nota.nf_emitida && !nota.boleto_gerado && !nota.pago);

        // Faturado nunca volta
        let err = manager.invoice(&mut repo, lote.id).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { from: LoteStatus::Faturado, .. }));
    }

    #[test]
    fn test_resolve_pendency_without_target_leaves_pendency_untouched() {
        let (mut repo, manager, empresa) = setup();
        let mut pendencia = Lote::new(empresa.id, None, "Março/2025");
        pendencia.status = LoteStatus::ComPendencia;
        repo.insert_lote(pendencia.clone()).unwrap();
        repo.insert_member(ColaboradorLote::aprovado(pendencia.id, None, record("A", CPFS[0]))).unwrap();

        let err = manager.resolve_pendency(&mut repo, pendencia.id).unwrap_err();
        assert!(matches!(err, LifecycleError::NoTargetFound { .. }));
        assert!(err.to_string().contains("no target found"));

        assert_eq!(repo.get_lote(pendencia.id).unwrap(), pendencia);
        assert_eq!(repo.list_members(pendencia.id).len(), 1);
    }

    #[test]
    fn test_resolve_pendency_ambiguous_target() {
        let (mut repo, manager, empresa) = setup();
        for status in [LoteStatus::Concluido, LoteStatus::Faturado] {
            let mut l = Lote::new(empresa.id, None, "Março/2025");
            l.status = status;
            repo.insert_lote(l).unwrap();
        }
        let mut pendencia = Lote::new(empresa.id, None, "Março/2025");
        pendencia.status = LoteStatus::ComPendencia;
        repo.insert_lote(pendencia.clone()).unwrap();

        let err = manager.resolve_pendency(&mut repo, pendencia.id).unwrap_err();
        assert!(matches!(err, LifecycleError::AmbiguousTarget { count: 2, .. }));
        assert!(repo.get_lote(pendencia.id).is_ok());
    }

    #[test]
    fn test_full_lifecycle_with_pendency() {
        let (mut repo, manager, empresa) = setup();
        let obra = Obra {
            id: Uuid::new_v4(),
            empresa_id: empresa.id,
            nome: "Obra Norte".to_string(),
        };
        repo.insert_obra(obra.clone()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None);

        let lote = manager
            .submit_roster(&mut repo, empresa.id, Some(obra.id), "Março/2025", roster(4))
            .unwrap();
        assert_eq!(lote.status, LoteStatus::Entrada);
        assert_eq!(lote.valor_total, Decimal::from(200));

        let enviado = manager.send_to_insurer(&mut repo, &storage, lote.id).unwrap();
        assert_eq!(enviado.status, LoteStatus::EmAnaliseSeguradora);
        assert!(enviado.enviado_seguradora_em.is_some());
        let arquivo = enviado.arquivo_url.clone().unwrap();
        assert!(arquivo.ends_with("LISTA_CONSTRUTORA_HORIZONTE_Março-2025.xlsx"));
        assert!(std::path::Path::new(&arquivo).exists());

        let decisions = vec![
            InsurerDecision {
                cpf: "529.982.247-25".to_string(),
                aprovado: false,
                motivo: Some("Idade acima do limite".to_string()),
            },
            InsurerDecision {
                cpf: CPFS[0].to_string(),
                aprovado: true,
                motivo: None,
            },
        ];
        let outcome = manager.apply_insurer_response(&mut repo, lote.id, &decisions).unwrap();
        assert_eq!(outcome.lote.status, LoteStatus::Concluido);
        assert_eq!(outcome.lote.total_colaboradores, 3);
        assert_eq!(outcome.lote.valor_total, Decimal::from(150));

        let pendencia = outcome.pendencia.unwrap();
        assert_eq!(pendencia.status, LoteStatus::ComPendencia);
        assert_eq!(pendencia.total_colaboradores, 1);
        assert_eq!(pendencia.total_reprovados, 1);
        let rejeitados = repo.list_members(pendencia.id);
        assert_eq!(rejeitados[0].dados.cpf, CPFS[1]);
        assert_eq!(rejeitados[0].motivo_reprovacao_seguradora.as_deref(), Some("Idade acima do limite"));

        let notices = repo.list_notices(empresa.id);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].total_aprovados, 3);
        assert_eq!(notices[0].nome_obra.as_deref(), Some("Obra Norte"));
        assert_eq!(notices[0].reprovados[0].cpf, CPFS[1]);

        let alvo = manager.resolve_pendency(&mut repo, pendencia.id).unwrap();
        assert_eq!(alvo.id, lote.id);
        assert_eq!(alvo.total_colaboradores, 4);
        assert_eq!(alvo.total_reprovados, 0);
        assert_eq!(alvo.valor_total, Decimal::from(200));
        assert!(repo.get_lote(pendencia.id).is_err());
        assert!(repo
            .list_members(lote.id)
            .iter()
            .all(|m| m.status_seguradora == StatusSeguradora::Aprovado && m.motivo_reprovacao_seguradora.is_none()));

        let faturado = manager.invoice(&mut repo, lote.id).unwrap();
        assert_eq!(faturado.valor_total, Decimal::from(200));
    }

    #[test]
    fn test_unknown_decisions_change_nothing() {
        let (mut repo, manager, empresa) = setup();
        let lote = manager.submit_roster(&mut repo, empresa.id, None, "Abril/2025", roster(2)).unwrap();
        let lote = with_status(&mut repo, &lote, LoteStatus::EmAnaliseSeguradora);

        let decisions = vec![InsurerDecision {
            cpf: CPFS[3].to_string(),
            aprovado: false,
            motivo: None,
        }];
        let err = manager.apply_insurer_response(&mut repo, lote.id, &decisions).unwrap_err();
        assert!(matches!(err, LifecycleError::UnknownDecisions { ref cpfs, .. } if cpfs == &vec![CPFS[3].to_string()]));
        assert_eq!(repo.get_lote(lote.id).unwrap().status, LoteStatus::EmAnaliseSeguradora);
        assert_eq!(repo.list_lotes(&LoteFilter::default()).len(), 1);
    }

    #[test]
    fn test_send_empty_roster_fails_without_transition() {
        let (mut repo, manager, empresa) = setup();
        let lote = Lote::new(empresa.id, None, "Maio/2025");
        repo.insert_lote(lote.clone()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None);

        let err = manager.send_to_insurer(&mut repo, &storage, lote.id).unwrap_err();
        assert!(matches!(err, LifecycleError::EmptyRoster(id) if id == lote.id));
        assert_eq!(repo.get_lote(lote.id).unwrap().status, LoteStatus::Entrada);
    }

    #[test]
    fn test_send_requires_entrada() {
        let (mut repo, manager, empresa) = setup();
        let lote = manager.submit_roster(&mut repo, empresa.id, None, "Maio/2025", roster(1)).unwrap();
        let lote = with_status(&mut repo, &lote, LoteStatus::Concluido);
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None);

        let err = manager.send_to_insurer(&mut repo, &storage, lote.id).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition { operation: "send_to_insurer", from: LoteStatus::Concluido, .. }
        ));
    }

    #[test]
    fn test_submit_merges_into_open_intake_batch() {
        let (mut repo, manager, empresa) = setup();
        let first = manager.submit_roster(&mut repo, empresa.id, None, "Junho/2025", roster(2)).unwrap();

        let mut segunda = vec![record("NOME CORRIGIDO", CPFS[0]), record("NOVO", CPFS[2])];
        segunda.push(record("REPETIDO NA ENTRADA", CPFS[2]));
        let merged = manager.submit_roster(&mut repo, empresa.id, None, "Junho/2025", segunda).unwrap();

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.total_colaboradores, 3);
        let members = repo.list_members(first.id);
        let corrigido = members.iter().find(|m| m.dados.cpf == CPFS[0]).unwrap();
        assert_eq!(corrigido.dados.nome, "NOME CORRIGIDO");
        let novo = members.iter().find(|m| m.dados.cpf == CPFS[2]).unwrap();
        assert_eq!(novo.dados.nome, "NOVO");

        // outra obra é outro lote
        let obra = Obra {
            id: Uuid::new_v4(),
            empresa_id: empresa.id,
            nome: "Obra Leste".to_string(),
        };
        repo.insert_obra(obra.clone()).unwrap();
        let outra = manager
            .submit_roster(&mut repo, empresa.id, Some(obra.id), "Junho/2025", roster(1))
            .unwrap();
        assert_ne!(outra.id, first.id);
        assert_eq!(outra.obra_id, Some(obra.id));
    }

    #[test]
    fn test_submit_rejects_unknown_obra() {
        let (mut repo, manager, empresa) = setup();
        let desconhecida = Uuid::new_v4();
        let err = manager
            .submit_roster(&mut repo, empresa.id, Some(desconhecida), "Junho/2025", roster(1))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ObraNotFound(id) if id == desconhecida));

        // obra de outra empresa também não serve
        let outra = Empresa::new("Construtora Aurora", "45723174000110");
        repo.insert_empresa(outra.clone()).unwrap();
        let obra_alheia = Obra {
            id: Uuid::new_v4(),
            empresa_id: outra.id,
            nome: "Obra Aurora".to_string(),
        };
        repo.insert_obra(obra_alheia.clone()).unwrap();
        let err = manager
            .submit_roster(&mut repo, empresa.id, Some(obra_alheia.id), "Junho/2025", roster(1))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ObraNotFound(_)));
        assert!(repo.list_lotes(&LoteFilter::default()).is_empty());
    }

    #[test]
    fn test_out_of_range_birth_date_never_reaches_export() {
        use crate::services::import::{normalize_rows, Cell, Sheet};

        let (mut repo, manager, empresa) = setup();
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), None);
        fn row(cells: &[&str]) -> Vec<Cell> {
            cells.iter().map(|c| Cell::Text(c.to_string())).collect()
        }
        let sheet = Sheet::new(
            "Plan1",
            vec![
                row(&["Nome", "CPF", "Nascimento"]),
                row(&["Antigo", "11144477735", "15/03/1850"]),
                row(&["Valido", "52998224725", "08/08/1988"]),
            ],
        );
        let report = normalize_rows(&[sheet], manager.policy()).unwrap();
        assert_eq!(report.invalid_row_count(), 1);

        let lote = manager
            .submit_roster(&mut repo, empresa.id, None, "Setembro/2025", report.valid_records)
            .unwrap();
        assert_eq!(lote.total_colaboradores, 1);
        let enviado = manager.send_to_insurer(&mut repo, &storage, lote.id).unwrap();
        assert_eq!(enviado.status, LoteStatus::EmAnaliseSeguradora);
        assert!(enviado.arquivo_url.is_some());
    }

    #[test]
    fn test_submit_conflicts_with_batch_in_analysis() {
        let (mut repo, manager, empresa) = setup();
        let lote = manager.submit_roster(&mut repo, empresa.id, None, "Julho/2025", roster(1)).unwrap();
        with_status(&mut repo, &lote, LoteStatus::EmAnaliseSeguradora);

        let err = manager
            .submit_roster(&mut repo, empresa.id, None, "Julho/2025", roster(2))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::SlotBusy { existing, .. } if existing == lote.id));

        // lote faturado libera a competência para um novo lote
        with_status(&mut repo, &lote, LoteStatus::Faturado);
        let novo = manager.submit_roster(&mut repo, empresa.id, None, "Julho/2025", roster(2)).unwrap();
        assert_ne!(novo.id, lote.id);
    }

    #[test]
    fn test_submit_unknown_company() {
        let (mut repo, manager, _) = setup();
        let err = manager
            .submit_roster(&mut repo, Uuid::new_v4(), None, "Julho/2025", roster(1))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::EmpresaNotFound(_)));
    }

    #[test]
    fn test_replace_members_is_idempotent() {
        let (mut repo, manager, empresa) = setup();
        let lote = manager.submit_roster(&mut repo, empresa.id, None, "Agosto/2025", roster(4)).unwrap();

        let nova = roster(2);
        let first = manager.replace_members(&mut repo, lote.id, nova.clone()).unwrap();
        let members_first: Vec<Colaborador> = repo.list_members(lote.id).into_iter().map(|m| m.dados).collect();

        let second = manager.replace_members(&mut repo, lote.id, nova).unwrap();
        let members_second: Vec<Colaborador> = repo.list_members(lote.id).into_iter().map(|m| m.dados).collect();

        assert_eq!(members_first, members_second);
        assert_eq!(first.desligados, second.desligados);
        assert_eq!(first.desligados, vec![CPFS[2].to_string(), CPFS[3].to_string()]);
        assert_eq!(second.lote.total_colaboradores, 2);

        let registry = repo.list_registry(empresa.id, None);
        let desligado = registry.iter().find(|r| r.dados.cpf == CPFS[3]).unwrap();
        assert_eq!(desligado.status, StatusCadastro::Desligado);
        let ativo = registry.iter().find(|r| r.dados.cpf == CPFS[0]).unwrap();
        assert_eq!(ativo.status, StatusCadastro::Ativo);

        // quem volta na relação é reativado
        let terceira = manager.replace_members(&mut repo, lote.id, roster(3)).unwrap();
        assert_eq!(terceira.desligados, vec![CPFS[3].to_string()]);
        let reativado = repo
            .list_registry(empresa.id, None)
            .into_iter()
            .find(|r| r.dados.cpf == CPFS[2])
            .unwrap();
        assert_eq!(reativado.status, StatusCadastro::Ativo);
    }

    #[test]
    fn test_member_edits() {
        let (mut repo, manager, empresa) = setup();
        let lote = manager.submit_roster(&mut repo, empresa.id, None, "Setembro/2025", roster(1)).unwrap();

        let lote_after = manager.add_member(&mut repo, lote.id, record("NOVO", CPFS[1])).unwrap();
        assert_eq!(lote_after.total_colaboradores, 2);

        let err = manager.add_member(&mut repo, lote.id, record("OUTRO", CPFS[1])).unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateMember { .. }));

        let err = manager.add_member(&mut repo, lote.id, record("RUIM", "11111111111")).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTaxId(_)));

        let updated = manager
            .update_member(&mut repo, lote.id, "529.982.247-25", record("RENOMEADO", CPFS[1]))
            .unwrap();
        assert_eq!(updated.total_colaboradores, 2);
        assert!(repo.list_members(lote.id).iter().any(|m| m.dados.nome == "RENOMEADO"));

        let removed = manager.remove_member(&mut repo, lote.id, CPFS[0]).unwrap();
        assert_eq!(removed.total_colaboradores, 1);
        assert_eq!(removed.valor_total, Decimal::from(50));

        let err = manager.remove_member(&mut repo, lote.id, CPFS[3]).unwrap_err();
        assert!(matches!(err, LifecycleError::UnknownMember { .. }));

        let faturado = with_status(&mut repo, &removed, LoteStatus::Faturado);
        let err = manager.add_member(&mut repo, faturado.id, record("TARDE", CPFS[2])).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn test_invoice_many_continues_on_error() {
        let (mut repo, manager, empresa) = setup();
        let mut ids = Vec::new();
        for status in [LoteStatus::Concluido, LoteStatus::Entrada, LoteStatus::Concluido] {
            let mut l = Lote::new(empresa.id, None, "Outubro/2025");
            l.status = status;
            l.total_colaboradores = 2;
            ids.push(l.id);
            repo.insert_lote(l).unwrap();
        }
        ids.push(Uuid::new_v4());

        let report = manager.invoice_many(&mut repo, &ids);
        assert_eq!(report.faturados.len(), 2);
        assert_eq!(report.falhas.len(), 2);
        assert_eq!(report.falhas[0].lote_id, ids[1]);
        assert_eq!(report.falhas[1].lote_id, ids[3]);
        assert!(report.faturados.iter().all(|l| l.valor_total == Decimal::from(100)));
    }

    #[test]
    fn test_reject_and_delete() {
        let (mut repo, manager, empresa) = setup();
        let mut pendencia = Lote::new(empresa.id, None, "Novembro/2025");
        pendencia.status = LoteStatus::ComPendencia;
        repo.insert_lote(pendencia.clone()).unwrap();
        repo.insert_member(ColaboradorLote::aprovado(pendencia.id, None, record("A", CPFS[0]))).unwrap();

        manager.reject_pendency(&mut repo, pendencia.id).unwrap();
        assert!(repo.get_lote(pendencia.id).is_err());
        assert!(repo.list_members(pendencia.id).is_empty());

        let mut faturado = Lote::new(empresa.id, None, "Novembro/2025");
        faturado.status = LoteStatus::Faturado;
        repo.insert_lote(faturado.clone()).unwrap();
        assert!(matches!(
            manager.delete_batch(&mut repo, faturado.id),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            manager.reject_pendency(&mut repo, faturado.id),
            Err(LifecycleError::InvalidTransition { .. })
        ));

        let entrada = Lote::new(empresa.id, None, "Dezembro/2025");
        repo.insert_lote(entrada.clone()).unwrap();
        manager.delete_batch(&mut repo, entrada.id).unwrap();
        assert!(matches!(manager.delete_batch(&mut repo, entrada.id), Err(LifecycleError::NotFound(_))));
    }

    #[test]
    fn test_toggle_card_registration() {
        let (mut repo, manager, empresa) = setup();
        let lote = Lote::new(empresa.id, None, "Março/2025");
        repo.insert_lote(lote.clone()).unwrap();
        let lote = manager.toggle_card_registration(&mut repo, lote.id, true).unwrap();
        assert!(lote.cadastro_cartao);
        assert!(repo.get_lote(lote.id).unwrap().cadastro_cartao);
    }
}
