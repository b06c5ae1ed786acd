use serde::{Deserialize, Serialize};

/// Erro de validação de uma linha da planilha; nunca é persistido
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportIssue {
    /// Linha na planilha, começando em 1
    pub linha: usize,
    pub campo: String,
    pub valor: String,
    pub erro: String,
}

impl ImportIssue {
    pub fn new(linha: usize, campo: &str, valor: &str, erro: impl Into<String>) -> Self {
        Self {
            linha,
            campo: campo.to_string(),
            valor: valor.to_string(),
            erro: erro.into(),
        }
    }
}
