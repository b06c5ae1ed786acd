//! Funções de normalização de texto e de competência
//!
//! Cabeçalhos de planilha chegam com acentos, espaços e pontuação variados;
//! nomes de arquivo precisam ser ASCII; competências seguem o formato
//! "Mês/Ano" em português.

use chrono::{Datelike, NaiveDate};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Remove acentos, converte para lowercase, remove espaços extras e caracteres especiais
/// usando NFKD (Normalization Form Compatibility Decomposition)
///
/// # Exemplos
/// ```
/// use lotes_backoffice::utils::normalization::normalize_string;
///
/// assert_eq!(normalize_string("João & Silva Ltda."), "joao silva ltda");
/// assert_eq!(normalize_string("  Anne   Souza  "), "anne souza");
/// ```
pub fn normalize_string(input: &str) -> String {
    strip_accents(input)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove marcas diacríticas mantendo o restante do texto
pub fn strip_accents(input: &str) -> String {
    input.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Normaliza um cabeçalho de planilha: minúsculas, sem acento, só `[a-z0-9]`
///
/// # Exemplos
/// ```
/// use lotes_backoffice::utils::normalization::normalize_header;
///
/// assert_eq!(normalize_header("Data de Nascimento"), "datadenascimento");
/// assert_eq!(normalize_header("Salário (R$)"), "salarior");
/// assert_eq!(normalize_header("C.P.F."), "cpf");
/// ```
pub fn normalize_header(input: &str) -> String {
    strip_accents(input)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Nome seguro para arquivo: sem acento, só alfanuméricos, espaços viram `_`,
/// tudo em maiúsculas
///
/// # Exemplos
/// ```
/// use lotes_backoffice::utils::normalization::file_name_slug;
///
/// assert_eq!(file_name_slug("Construtora São João Ltda."), "CONSTRUTORA_SAO_JOAO_LTDA");
/// assert_eq!(file_name_slug("   "), "EMPRESA");
/// ```
pub fn file_name_slug(input: &str) -> String {
    let cleaned: String = strip_accents(input)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let slug = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase();
    if slug.is_empty() {
        "EMPRESA".to_string()
    } else {
        slug
    }
}

const MESES: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho",
    "Julho", "Agosto", "Setembro", "Outubro", "Novembro", "Dezembro",
];

/// Formata a competência no padrão "Mês/Ano" (mês de 1 a 12)
pub fn format_competencia(month: u32, year: i32) -> Option<String> {
    let name = MESES.get(month.checked_sub(1)? as usize)?;
    Some(format!("{}/{}", name, year))
}

/// Interpreta "Março/2025" (com ou sem acento, qualquer caixa) em (mês, ano)
///
/// # Exemplos
/// ```
/// use lotes_backoffice::utils::normalization::parse_competencia;
///
/// assert_eq!(parse_competencia("Março/2025"), Some((3, 2025)));
/// assert_eq!(parse_competencia("marco/2025"), Some((3, 2025)));
/// assert_eq!(parse_competencia("Lista Geral"), None);
/// ```
pub fn parse_competencia(input: &str) -> Option<(u32, i32)> {
    let (mes, ano) = input.trim().split_once('/')?;
    let mes = normalize_string(mes);
    let month = MESES
        .iter()
        .position(|m| normalize_string(m) == mes)
        .map(|i| i as u32 + 1)?;
    let year = ano.trim().parse::<i32>().ok()?;
    (year >= 1900).then_some((month, year))
}

/// Chave de ordenação cronológica; competências inválidas vão para o início
pub fn competencia_sort_key(input: &str) -> (i32, u32) {
    parse_competencia(input)
        .map(|(m, y)| (y, m))
        .unwrap_or((0, 0))
}

/// Competência do mês de `today`
pub fn competencia_for(today: NaiveDate) -> String {
    format_competencia(today.month(), today.year()).unwrap_or_default()
}

/// Competência vigente
pub fn competencia_atual() -> String {
    competencia_for(chrono::Local::now().date_naive())
}

/// Competências de `radius` meses antes até `radius` meses depois de `today`
pub fn competencias_around(today: NaiveDate, radius: i32) -> Vec<String> {
    let base = today.year() * 12 + today.month0() as i32;
    (-radius..=radius)
        .filter_map(|offset| {
            let idx = base + offset;
            format_competencia((idx.rem_euclid(12) + 1) as u32, idx.div_euclid(12))
        })
        .collect()
}
