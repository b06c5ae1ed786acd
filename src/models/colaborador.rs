//! Colaboradores: registro importado, membro de lote e cadastro canônico

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sexo {
    #[default]
    Masculino,
    Feminino,
}

impl Sexo {
    /// Interpreta "M", "masc", "Feminino" etc.; qualquer outro valor vira Masculino
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "feminino" | "fem" | "f" => Sexo::Feminino,
            _ => Sexo::Masculino,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sexo::Masculino => "Masculino",
            Sexo::Feminino => "Feminino",
        }
    }
}

/// Classificação salarial derivada do salário
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classificacao {
    Ajudante,
    Profissional,
}

impl Classificacao {
    pub fn from_salary(salario: Decimal, limite_ajudante: Decimal) -> Self {
        if salario < limite_ajudante {
            Classificacao::Ajudante
        } else {
            Classificacao::Profissional
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classificacao::Ajudante => "Ajudante",
            Classificacao::Profissional => "Profissional",
        }
    }
}

/// Registro de colaborador já validado e normalizado
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colaborador {
    pub nome: String,
    /// CPF com 11 dígitos, sem máscara
    pub cpf: String,
    pub sexo: Sexo,
    pub data_nascimento: NaiveDate,
    pub salario: Decimal,
    pub classificacao_salario: Classificacao,
}

/// Situação do colaborador no retorno da seguradora
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSeguradora {
    Aprovado,
    Reprovado,
}

/// Colaborador vinculado a um lote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColaboradorLote {
    pub id: Uuid,
    pub lote_id: Uuid,
    /// Registro correspondente no cadastro canônico, quando existir
    pub colaborador_id: Option<Uuid>,
    #[serde(flatten)]
    pub dados: Colaborador,
    pub status_seguradora: StatusSeguradora,
    pub motivo_reprovacao_seguradora: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ColaboradorLote {
    pub fn aprovado(lote_id: Uuid, colaborador_id: Option<Uuid>, dados: Colaborador) -> Self {
        Self {
            id: Uuid::new_v4(),
            lote_id,
            colaborador_id,
            dados,
            status_seguradora: StatusSeguradora::Aprovado,
            motivo_reprovacao_seguradora: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.status_seguradora == StatusSeguradora::Reprovado
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCadastro {
    Ativo,
    Desligado,
}

/// Cadastro canônico do colaborador por empresa/obra, compartilhado entre lotes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColaboradorCadastro {
    pub id: Uuid,
    pub empresa_id: Uuid,
    pub obra_id: Option<Uuid>,
    #[serde(flatten)]
    pub dados: Colaborador,
    pub status: StatusCadastro,
    pub updated_at: DateTime<Utc>,
}
