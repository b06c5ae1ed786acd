//! Cadastros de apoio: vínculos usuário-empresa, obras e situação da empresa

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Empresa, Obra, UserRole};
use crate::services::store::{LoteRepository, StoreError};

#[derive(Debug, Error)]
pub enum CadastroError {
    #[error("empresa {0} not found")]
    EmpresaNotFound(Uuid),

    #[error("Usuários cliente precisam ter pelo menos uma empresa vinculada")]
    ClienteSemEmpresa,

    #[error("Nome da obra é obrigatório")]
    NomeObraVazio,

    #[error("Obra \"{0}\" já cadastrada para a empresa")]
    ObraDuplicada(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CadastroResult<T> = Result<T, CadastroError>;

fn require_empresa<R: LoteRepository + ?Sized>(repo: &R, empresa_id: Uuid) -> CadastroResult<Empresa> {
    repo.get_empresa(empresa_id).map_err(|e| match e {
        StoreError::NotFound { .. } => CadastroError::EmpresaNotFound(empresa_id),
        other => other.into(),
    })
}

/// Substitui os vínculos do usuário com empresas
///
/// Cliente precisa de ao menos uma empresa; os demais papéis não mantêm
/// vínculos, a lista é descartada. Devolve os vínculos gravados.
pub fn replace_user_links<R: LoteRepository + ?Sized>(
    repo: &mut R,
    user_id: Uuid,
    role: UserRole,
    empresa_ids: &[Uuid],
) -> CadastroResult<Vec<Uuid>> {
    if role != UserRole::Cliente {
        repo.set_user_links(user_id, &[]);
        return Ok(Vec::new());
    }

    let mut ids: Vec<Uuid> = Vec::with_capacity(empresa_ids.len());
    for &id in empresa_ids {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(CadastroError::ClienteSemEmpresa);
    }
    for &id in &ids {
        require_empresa(&*repo, id)?;
    }

    repo.set_user_links(user_id, &ids);
    tracing::info!("🔗 Usuário {} vinculado a {} empresa(s)", user_id, ids.len());
    Ok(ids)
}

pub fn create_obra<R: LoteRepository + ?Sized>(repo: &mut R, empresa_id: Uuid, nome: &str) -> CadastroResult<Obra> {
    let nome = nome.trim();
    if nome.is_empty() {
        return Err(CadastroError::NomeObraVazio);
    }
    require_empresa(&*repo, empresa_id)?;
    if repo
        .list_obras(empresa_id)
        .iter()
        .any(|o| o.nome.eq_ignore_ascii_case(nome))
    {
        return Err(CadastroError::ObraDuplicada(nome.to_string()));
    }

    let obra = Obra {
        id: Uuid::new_v4(),
        empresa_id,
        nome: nome.to_string(),
    };
    repo.insert_obra(obra.clone())?;
    tracing::info!("🏗️ Obra {} criada para a empresa {}", obra.nome, empresa_id);
    Ok(obra)
}

/// Empresas inativas saem das campanhas de cobrança
pub fn set_empresa_ativo<R: LoteRepository + ?Sized>(
    repo: &mut R,
    empresa_id: Uuid,
    ativo: bool,
) -> CadastroResult<Empresa> {
    let mut empresa = require_empresa(&*repo, empresa_id)?;
    empresa.ativo = ativo;
    repo.update_empresa(&empresa)?;
    Ok(empresa)
}
