//! Contexto de sessão explícito, construído a cada requisição
//!
//! Não existe estado global de papel/usuário: o middleware monta um
//! `SessionContext` por requisição e carrega os vínculos do cliente antes
//! de entregá-lo ao handler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    AdminMaster,
    Admin,
    Operacional,
    Financeiro,
    Cliente,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::AdminMaster => "admin_master",
            UserRole::Admin => "admin",
            UserRole::Operacional => "operacional",
            UserRole::Financeiro => "financeiro",
            UserRole::Cliente => "cliente",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::AdminMaster | UserRole::Admin)
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, UserRole::Cliente)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin_master" => Ok(UserRole::AdminMaster),
            "admin" => Ok(UserRole::Admin),
            "operacional" => Ok(UserRole::Operacional),
            "financeiro" => Ok(UserRole::Financeiro),
            "cliente" => Ok(UserRole::Cliente),
            other => Err(format!("papel desconhecido: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub role: UserRole,
    empresa_ids: Vec<Uuid>,
    links_loaded: bool,
}

impl SessionContext {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id,
            role,
            empresa_ids: Vec::new(),
            links_loaded: false,
        }
    }

    pub fn with_empresas(mut self, empresa_ids: Vec<Uuid>) -> Self {
        self.refresh(empresa_ids);
        self
    }

    /// Administradores passam por qualquer verificação de papel
    pub fn has_any_role(&self, roles: &[UserRole]) -> bool {
        self.role.is_admin() || roles.contains(&self.role)
    }

    /// Equipe interna enxerga todas as empresas; cliente só as vinculadas
    pub fn can_access_empresa(&self, empresa_id: Uuid) -> bool {
        self.role.is_staff() || self.empresa_ids.contains(&empresa_id)
    }

    pub fn empresa_ids(&self) -> &[Uuid] {
        &self.empresa_ids
    }

    pub fn needs_refresh(&self) -> bool {
        !self.links_loaded
    }

    pub fn refresh(&mut self, empresa_ids: Vec<Uuid>) {
        self.empresa_ids = empresa_ids;
        self.links_loaded = true;
    }
}
