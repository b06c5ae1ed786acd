use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Empresa {
    pub id: Uuid,
    /// CNPJ com 14 dígitos, sem máscara
    pub cnpj: String,
    pub nome: String,
    #[serde(default)]
    pub emails_contato: Vec<String>,
    pub telefone: Option<String>,
    pub ativo: bool,
}

impl Empresa {
    pub fn new(nome: impl Into<String>, cnpj: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cnpj: cnpj.into(),
            nome: nome.into(),
            emails_contato: Vec::new(),
            telefone: None,
            ativo: true,
        }
    }
}

/// Obra (canteiro) de uma empresa
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obra {
    pub id: Uuid,
    pub empresa_id: Uuid,
    pub nome: String,
}

/// Vínculo N:N entre usuário da plataforma e empresa
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCompanyLink {
    pub user_id: Uuid,
    pub empresa_id: Uuid,
}

/// Linha da planilha de cadastro de empresas, já validada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpresaImport {
    pub nome: String,
    pub cnpj: String,
    pub email_contato: Option<String>,
    pub telefone: Option<String>,
}

impl From<EmpresaImport> for Empresa {
    fn from(row: EmpresaImport) -> Self {
        let mut empresa = Empresa::new(row.nome, row.cnpj);
        empresa.emails_contato = row.email_contato.into_iter().collect();
        empresa.telefone = row.telefone;
        empresa
    }
}
