//! Acesso ao backend relacional
//!
//! O núcleo não conhece o banco hospedado: fala com ele pelo trait
//! `LoteRepository`. As linhas chegam tipadas (serde) e saem como entidades
//! de domínio. O `MemoryRepository` atende o serviço em desenvolvimento e os
//! testes.

use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CobrancaHistorico, Colaborador, ColaboradorCadastro, ColaboradorLote, Empresa, Lote, LoteStatus,
    NotaFiscal, Obra, PendencyNotice, StatusCadastro, UserCompanyLink,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} não encontrado")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} já cadastrado: {key}")]
    Duplicate { entity: &'static str, key: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filtro de listagem de lotes
#[derive(Debug, Clone, Default)]
pub struct LoteFilter {
    pub status: Option<LoteStatus>,
    pub competencia: Option<String>,
    pub empresa_id: Option<Uuid>,
    /// Restringe às empresas vinculadas (clientes)
    pub empresa_ids: Option<Vec<Uuid>>,
}

impl LoteFilter {
    fn matches(&self, lote: &Lote) -> bool {
        self.status.map_or(true, |s| lote.status == s)
            && self.competencia.as_deref().map_or(true, |c| lote.competencia == c)
            && self.empresa_id.map_or(true, |e| lote.empresa_id == e)
            && self
                .empresa_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&lote.empresa_id))
    }
}

pub trait LoteRepository: Send + Sync {
    // Lotes
    fn insert_lote(&mut self, lote: Lote) -> StoreResult<()>;
    fn get_lote(&self, id: Uuid) -> StoreResult<Lote>;
    fn update_lote(&mut self, lote: &Lote) -> StoreResult<()>;
    /// Remove o lote e os colaboradores vinculados a ele
    fn delete_lote(&mut self, id: Uuid) -> StoreResult<()>;
    fn list_lotes(&self, filter: &LoteFilter) -> Vec<Lote>;

    // Colaboradores do lote
    fn list_members(&self, lote_id: Uuid) -> Vec<ColaboradorLote>;
    fn insert_member(&mut self, member: ColaboradorLote) -> StoreResult<()>;
    fn update_member(&mut self, member: &ColaboradorLote) -> StoreResult<()>;
    fn delete_member(&mut self, member_id: Uuid) -> StoreResult<()>;
    /// Substitui todos os colaboradores do lote
    fn replace_lote_members(&mut self, lote_id: Uuid, members: Vec<ColaboradorLote>) -> StoreResult<()>;

    // Cadastro canônico de colaboradores
    /// Insere ou atualiza pela chave (empresa, CPF); o registro volta a ficar ativo
    fn upsert_registry(&mut self, empresa_id: Uuid, obra_id: Option<Uuid>, dados: &Colaborador) -> Uuid;
    fn list_registry(&self, empresa_id: Uuid, obra_id: Option<Uuid>) -> Vec<ColaboradorCadastro>;
    fn set_registry_status(&mut self, id: Uuid, status: StatusCadastro) -> StoreResult<()>;

    // Empresas, obras e vínculos
    fn insert_empresa(&mut self, empresa: Empresa) -> StoreResult<()>;
    fn get_empresa(&self, id: Uuid) -> StoreResult<Empresa>;
    fn update_empresa(&mut self, empresa: &Empresa) -> StoreResult<()>;
    fn list_empresas(&self) -> Vec<Empresa>;
    fn insert_obra(&mut self, obra: Obra) -> StoreResult<()>;
    fn get_obra(&self, id: Uuid) -> StoreResult<Obra>;
    fn list_obras(&self, empresa_id: Uuid) -> Vec<Obra>;
    /// Substitui todos os vínculos do usuário
    fn set_user_links(&mut self, user_id: Uuid, empresa_ids: &[Uuid]);
    fn empresas_for_user(&self, user_id: Uuid) -> Vec<Uuid>;

    // Notas fiscais
    fn insert_nota_fiscal(&mut self, nota: NotaFiscal) -> StoreResult<()>;
    fn get_nota_fiscal(&self, id: Uuid) -> StoreResult<NotaFiscal>;
    fn nota_fiscal_for_lote(&self, lote_id: Uuid) -> Option<NotaFiscal>;
    fn update_nota_fiscal(&mut self, nota: &NotaFiscal) -> StoreResult<()>;
    fn list_notas_fiscais(&self) -> Vec<NotaFiscal>;

    // Histórico de cobranças e avisos
    fn insert_cobranca(&mut self, registro: CobrancaHistorico);
    fn list_cobrancas(&self) -> Vec<CobrancaHistorico>;
    fn insert_notice(&mut self, notice: PendencyNotice);
    fn list_notices(&self, empresa_id: Uuid) -> Vec<PendencyNotice>;
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    lotes: HashMap<Uuid, Lote>,
    members: Vec<ColaboradorLote>,
    registry: Vec<ColaboradorCadastro>,
    empresas: HashMap<Uuid, Empresa>,
    obras: HashMap<Uuid, Obra>,
    links: Vec<UserCompanyLink>,
    notas_fiscais: Vec<NotaFiscal>,
    cobrancas: Vec<CobrancaHistorico>,
    notices: Vec<PendencyNotice>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(entity: &'static str, id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

impl LoteRepository for MemoryRepository {
    fn insert_lote(&mut self, lote: Lote) -> StoreResult<()> {
        if self.lotes.contains_key(&lote.id) {
            return Err(StoreError::Duplicate {
                entity: "lote",
                key: lote.id.to_string(),
            });
        }
        self.lotes.insert(lote.id, lote);
        Ok(())
    }

    fn get_lote(&self, id: Uuid) -> StoreResult<Lote> {
        self.lotes.get(&id).cloned().ok_or_else(|| not_found("lote", id))
    }

    fn update_lote(&mut self, lote: &Lote) -> StoreResult<()> {
        let slot = self.lotes.get_mut(&lote.id).ok_or_else(|| not_found("lote", lote.id))?;
        *slot = lote.clone();
        Ok(())
    }

    fn delete_lote(&mut self, id: Uuid) -> StoreResult<()> {
        self.lotes.remove(&id).ok_or_else(|| not_found("lote", id))?;
        self.members.retain(|m| m.lote_id != id);
        Ok(())
    }

    fn list_lotes(&self, filter: &LoteFilter) -> Vec<Lote> {
        let mut lotes: Vec<Lote> = self.lotes.values().filter(|l| filter.matches(l)).cloned().collect();
        lotes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        lotes
    }

    fn list_members(&self, lote_id: Uuid) -> Vec<ColaboradorLote> {
        self.members.iter().filter(|m| m.lote_id == lote_id).cloned().collect()
    }

    fn insert_member(&mut self, member: ColaboradorLote) -> StoreResult<()> {
        if !self.lotes.contains_key(&member.lote_id) {
            return Err(not_found("lote", member.lote_id));
        }
        self.members.push(member);
        Ok(())
    }

    fn update_member(&mut self, member: &ColaboradorLote) -> StoreResult<()> {
        let slot = self
            .members
            .iter_mut()
            .find(|m| m.id == member.id)
            .ok_or_else(|| not_found("colaborador do lote", member.id))?;
        *slot = member.clone();
        Ok(())
    }

    fn delete_member(&mut self, member_id: Uuid) -> StoreResult<()> {
        let before = self.members.len();
        self.members.retain(|m| m.id != member_id);
        if self.members.len() == before {
            return Err(not_found("colaborador do lote", member_id));
        }
        Ok(())
    }

    fn replace_lote_members(&mut self, lote_id: Uuid, members: Vec<ColaboradorLote>) -> StoreResult<()> {
        if !self.lotes.contains_key(&lote_id) {
            return Err(not_found("lote", lote_id));
        }
        self.members.retain(|m| m.lote_id != lote_id);
        self.members.extend(members.into_iter().map(|mut m| {
            m.lote_id = lote_id;
            m
        }));
        Ok(())
    }

    fn upsert_registry(&mut self, empresa_id: Uuid, obra_id: Option<Uuid>, dados: &Colaborador) -> Uuid {
        let now = Utc::now();
        if let Some(existing) = self
            .registry
            .iter_mut()
            .find(|r| r.empresa_id == empresa_id && r.dados.cpf == dados.cpf)
        {
            existing.obra_id = obra_id;
            existing.dados = dados.clone();
            existing.status = StatusCadastro::Ativo;
            existing.updated_at = now;
            return existing.id;
        }

        let id = Uuid::new_v4();
        self.registry.push(ColaboradorCadastro {
            id,
            empresa_id,
            obra_id,
            dados: dados.clone(),
            status: StatusCadastro::Ativo,
            updated_at: now,
        });
        id
    }

    fn list_registry(&self, empresa_id: Uuid, obra_id: Option<Uuid>) -> Vec<ColaboradorCadastro> {
        self.registry
            .iter()
            .filter(|r| r.empresa_id == empresa_id && r.obra_id == obra_id)
            .cloned()
            .collect()
    }

    fn set_registry_status(&mut self, id: Uuid, status: StatusCadastro) -> StoreResult<()> {
        let entry = self
            .registry
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("colaborador", id))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(())
    }

    fn insert_empresa(&mut self, empresa: Empresa) -> StoreResult<()> {
        if self.empresas.values().any(|e| e.cnpj == empresa.cnpj) {
            return Err(StoreError::Duplicate {
                entity: "empresa",
                key: empresa.cnpj,
            });
        }
        self.empresas.insert(empresa.id, empresa);
        Ok(())
    }

    fn get_empresa(&self, id: Uuid) -> StoreResult<Empresa> {
        self.empresas.get(&id).cloned().ok_or_else(|| not_found("empresa", id))
    }

    fn update_empresa(&mut self, empresa: &Empresa) -> StoreResult<()> {
        let slot = self
            .empresas
            .get_mut(&empresa.id)
            .ok_or_else(|| not_found("empresa", empresa.id))?;
        *slot = empresa.clone();
        Ok(())
    }

    fn list_empresas(&self) -> Vec<Empresa> {
        let mut empresas: Vec<Empresa> = self.empresas.values().cloned().collect();
        empresas.sort_by(|a, b| a.nome.cmp(&b.nome));
        empresas
    }

    fn insert_obra(&mut self, obra: Obra) -> StoreResult<()> {
        if !self.empresas.contains_key(&obra.empresa_id) {
            return Err(not_found("empresa", obra.empresa_id));
        }
        self.obras.insert(obra.id, obra);
        Ok(())
    }

    fn get_obra(&self, id: Uuid) -> StoreResult<Obra> {
        self.obras.get(&id).cloned().ok_or_else(|| not_found("obra", id))
    }

    fn list_obras(&self, empresa_id: Uuid) -> Vec<Obra> {
        let mut obras: Vec<Obra> = self.obras.values().filter(|o| o.empresa_id == empresa_id).cloned().collect();
        obras.sort_by(|a, b| a.nome.cmp(&b.nome));
        obras
    }

    fn set_user_links(&mut self, user_id: Uuid, empresa_ids: &[Uuid]) {
        self.links.retain(|l| l.user_id != user_id);
        self.links.extend(empresa_ids.iter().map(|&empresa_id| UserCompanyLink { user_id, empresa_id }));
    }

    fn empresas_for_user(&self, user_id: Uuid) -> Vec<Uuid> {
        self.links
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| l.empresa_id)
            .collect()
    }

    fn insert_nota_fiscal(&mut self, nota: NotaFiscal) -> StoreResult<()> {
        if self.notas_fiscais.iter().any(|n| n.lote_id == nota.lote_id) {
            return Err(StoreError::Duplicate {
                entity: "nota fiscal",
                key: nota.lote_id.to_string(),
            });
        }
        self.notas_fiscais.push(nota);
        Ok(())
    }

    fn get_nota_fiscal(&self, id: Uuid) -> StoreResult<NotaFiscal> {
        self.notas_fiscais
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| not_found("nota fiscal", id))
    }

    fn nota_fiscal_for_lote(&self, lote_id: Uuid) -> Option<NotaFiscal> {
        self.notas_fiscais.iter().find(|n| n.lote_id == lote_id).cloned()
    }

    fn update_nota_fiscal(&mut self, nota: &NotaFiscal) -> StoreResult<()> {
        let slot = self
            .notas_fiscais
            .iter_mut()
            .find(|n| n.id == nota.id)
            .ok_or_else(|| not_found("nota fiscal", nota.id))?;
        *slot = nota.clone();
        Ok(())
    }

    fn list_notas_fiscais(&self) -> Vec<NotaFiscal> {
        self.notas_fiscais.clone()
    }

    fn insert_cobranca(&mut self, registro: CobrancaHistorico) {
        self.cobrancas.push(registro);
    }

    fn list_cobrancas(&self) -> Vec<CobrancaHistorico> {
        self.cobrancas.clone()
    }

    fn insert_notice(&mut self, notice: PendencyNotice) {
        self.notices.push(notice);
    }

    fn list_notices(&self, empresa_id: Uuid) -> Vec<PendencyNotice> {
        self.notices
            .iter()
            .filter(|n| n.empresa_id == empresa_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classificacao, Sexo};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn colaborador(cpf: &str, nome: &str) -> Colaborador {
        Colaborador {
            nome: nome.to_string(),
            cpf: cpf.to_string(),
            sexo: Sexo::Masculino,
            data_nascimento: NaiveDate::from_ymd_opt(1985, 3, 10).unwrap(),
            salario: Decimal::from(3000),
            classificacao_salario: Classificacao::Profissional,
        }
    }

    #[test]
    fn test_delete_lote_cascades_members() {
        let mut repo = MemoryRepository::new();
        let lote = Lote::new(Uuid::new_v4(), None, "Março/2025");
        let id = lote.id;
        repo.insert_lote(lote).unwrap();
        repo.insert_member(ColaboradorLote::aprovado(id, None, colaborador("11144477735", "A")))
            .unwrap();
        assert_eq!(repo.list_members(id).len(), 1);

        repo.delete_lote(id).unwrap();
        assert!(repo.list_members(id).is_empty());
        assert!(matches!(repo.get_lote(id), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_registry_upsert_by_company_and_cpf() {
        let mut repo = MemoryRepository::new();
        let empresa = Uuid::new_v4();
        let first = repo.upsert_registry(empresa, None, &colaborador("11144477735", "ANTIGO"));
        repo.set_registry_status(first, StatusCadastro::Desligado).unwrap();

        let second = repo.upsert_registry(empresa, None, &colaborador("11144477735", "NOVO"));
        assert_eq!(first, second);

        let registry = repo.list_registry(empresa, None);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry[0].dados.nome, "NOVO");
        assert_eq!(registry[0].status, StatusCadastro::Ativo);
    }

    #[test]
    fn test_duplicate_cnpj_rejected() {
        let mut repo = MemoryRepository::new();
        repo.insert_empresa(Empresa::new("A", "11222333000181")).unwrap();
        let err = repo.insert_empresa(Empresa::new("B", "11222333000181")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { entity: "empresa", .. }));
    }

    #[test]
    fn test_user_links_are_replaced() {
        let mut repo = MemoryRepository::new();
        let user = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        repo.set_user_links(user, &[a, b]);
        assert_eq!(repo.empresas_for_user(user), vec![a, b]);

        repo.set_user_links(user, &[b]);
        assert_eq!(repo.empresas_for_user(user), vec![b]);

        repo.set_user_links(user, &[]);
        assert!(repo.empresas_for_user(user).is_empty());
    }

    #[test]
    fn test_one_nota_fiscal_per_lote() {
        let mut repo = MemoryRepository::new();
        let lote = Lote::new(Uuid::new_v4(), None, "Março/2025");
        repo.insert_nota_fiscal(NotaFiscal::for_lote(&lote)).unwrap();
        let err = repo.insert_nota_fiscal(NotaFiscal::for_lote(&lote)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { entity: "nota fiscal", .. }));
        assert!(repo.nota_fiscal_for_lote(lote.id).is_some());
    }

    #[test]
    fn test_list_lotes_filter() {
        let mut repo = MemoryRepository::new();
        let empresa = Uuid::new_v4();
        let mut faturado = Lote::new(empresa, None, "Março/2025");
        faturado.status = LoteStatus::Faturado;
        repo.insert_lote(faturado).unwrap();
        repo.insert_lote(Lote::new(empresa, None, "Abril/2025")).unwrap();
        repo.insert_lote(Lote::new(Uuid::new_v4(), None, "Abril/2025")).unwrap();

        let filter = LoteFilter {
            competencia: Some("Abril/2025".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list_lotes(&filter).len(), 2);

        let filter = LoteFilter {
            status: Some(LoteStatus::Faturado),
            empresa_ids: Some(vec![empresa]),
            ..Default::default()
        };
        assert_eq!(repo.list_lotes(&filter).len(), 1);
    }
}
