//! Validadores e normalizadores de campos de planilha
//!
//! Funções puras, sem efeitos colaterais: CPF, CNPJ, valores monetários,
//! datas e e-mail. Nenhuma delas falha; entradas inválidas resultam em
//! `false`, zero ou na data sentinela, e cabe ao chamador sinalizar o erro
//! quando a origem não estava vazia.

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static DATA_BR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2,4})$").expect("regex de data BR válida"));

static DATA_ISO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[T ].*)?$").expect("regex de data ISO válida")
});

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("regex de e-mail válida"));

/// Ano pivô para datas com dois dígitos: acima dele é 19xx, senão 20xx
const PIVOT_ANO: u32 = 50;

/// Faixa de anos aceita em qualquer formato de data; a planilha exportada
/// não representa datas anteriores a 1900
const ANOS_VALIDOS: std::ops::RangeInclusive<i32> = 1900..=2100;

fn within_range(date: NaiveDate) -> Option<NaiveDate> {
    ANOS_VALIDOS.contains(&chrono::Datelike::year(&date)).then_some(date)
}

/// Data usada quando a data de nascimento não pode ser interpretada
pub fn sentinel_birth_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

fn only_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn all_same_digit(digits: &str) -> bool {
    let mut chars = digits.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => true,
    }
}

/// Remove tudo que não é dígito e completa com zeros à esquerda até 11 posições
///
/// # Exemplos
/// ```
/// use lotes_backoffice::utils::validators::normalize_tax_id;
///
/// assert_eq!(normalize_tax_id("123.456.789-09"), "12345678909");
/// assert_eq!(normalize_tax_id("1234567890"), "01234567890");
/// ```
pub fn normalize_tax_id(raw: &str) -> String {
    format!("{:0>11}", only_digits(raw))
}

/// Validação mínima de CPF: exatamente 11 dígitos e não todos repetidos.
///
/// O contrato completo inclui os dígitos verificadores; veja
/// [`verify_tax_id_checksum`]. O importador aplica a verificação completa
/// quando `strict_checksum` está habilitado na política.
pub fn validate_tax_id(normalized: &str) -> bool {
    normalized.len() == 11
        && normalized.chars().all(|c| c.is_ascii_digit())
        && !all_same_digit(normalized)
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rest = sum % 11;
    if rest < 2 {
        0
    } else {
        11 - rest
    }
}

fn to_digit_vec(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Validação completa de CPF (módulo 11 nos dois dígitos verificadores)
pub fn verify_tax_id_checksum(normalized: &str) -> bool {
    if !validate_tax_id(normalized) {
        return false;
    }
    let d = to_digit_vec(normalized);
    let first = check_digit(&d[..9], &[10, 9, 8, 7, 6, 5, 4, 3, 2]);
    let second = check_digit(&d[..10], &[11, 10, 9, 8, 7, 6, 5, 4, 3, 2]);
    d[9] == first && d[10] == second
}

/// Validação mínima de CNPJ: 14 dígitos após limpeza e não todos repetidos
pub fn validate_org_tax_id(raw: &str) -> bool {
    let digits = only_digits(raw);
    digits.len() == 14 && !all_same_digit(&digits)
}

/// Validação completa de CNPJ (dígitos verificadores)
pub fn verify_org_tax_id_checksum(raw: &str) -> bool {
    if !validate_org_tax_id(raw) {
        return false;
    }
    let d = to_digit_vec(&only_digits(raw));
    let first = check_digit(&d[..12], &[5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    let second = check_digit(&d[..13], &[6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    d[12] == first && d[13] == second
}

/// Converte um valor monetário em texto para `Decimal`
///
/// Aceita `R$ 1.234,56`, `1234.56` e números simples. Havendo vírgula, ela é
/// o separador decimal e os pontos são de milhar. Sem vírgula, um único ponto
/// seguido de exatamente três dígitos também é separador de milhar.
/// Entradas que não puderem ser interpretadas (ou negativas) resultam em zero.
///
/// # Exemplos
/// ```
/// use lotes_backoffice::utils::validators::normalize_currency;
/// use rust_decimal::Decimal;
///
/// assert_eq!(normalize_currency("R$ 1.234,56"), Decimal::new(123456, 2));
/// assert_eq!(normalize_currency("1234.56"), Decimal::new(123456, 2));
/// assert_eq!(normalize_currency("abc"), Decimal::ZERO);
/// ```
pub fn normalize_currency(raw: &str) -> Decimal {
    let mut s: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if s.contains(',') {
        s = s.replace('.', "").replacen(',', ".", 1);
    } else if s.contains('.') {
        let parts: Vec<&str> = s.split('.').collect();
        let thousands = parts.len() > 2 || (parts.len() == 2 && parts[1].len() == 3);
        if thousands {
            s = s.replace('.', "");
        }
    }

    match Decimal::from_str(&s) {
        Ok(value) if value.is_sign_positive() => value,
        _ => Decimal::ZERO,
    }
}

/// Converte o número serial de data de planilha em data de calendário
///
/// Considera o dia fictício 29/02/1900 das planilhas (serial 60) e aceita
/// somente anos entre 1900 e 2100.
pub fn parse_serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let days = serial.floor() as i64;
    if days == 60 {
        return None;
    }
    let base = if days < 60 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    within_range(base.checked_add_signed(Duration::days(days))?)
}

/// Interpreta datas `DD/MM/AAAA` (ou `DD/MM/AA`), seriais de planilha e ISO
///
/// Retorna `None` quando a entrada está vazia, não forma uma data real ou
/// cai fora dos anos 1900 a 2100.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = DATA_BR.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year_raw = &caps[3];
        let year: i32 = match year_raw.len() {
            2 => {
                let yy: u32 = year_raw.parse().ok()?;
                if yy > PIVOT_ANO {
                    1900 + yy as i32
                } else {
                    2000 + yy as i32
                }
            }
            4 => year_raw.parse().ok()?,
            _ => return None,
        };
        return NaiveDate::from_ymd_opt(year, month, day).and_then(within_range);
    }

    if let Ok(serial) = s.parse::<f64>() {
        return parse_serial_date(serial);
    }

    if let Some(caps) = DATA_ISO.captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).and_then(within_range);
    }

    None
}

/// Como [`parse_date`], mas cai na data sentinela (2000-01-01)
pub fn normalize_date(raw: &str) -> NaiveDate {
    parse_date(raw).unwrap_or_else(sentinel_birth_date)
}

/// E-mail opcional: vazio é aceito
pub fn is_valid_email(email: &str) -> bool {
    email.is_empty() || EMAIL.is_match(email)
}

/// Formata CPF como `000.000.000-00`; devolve os dígitos se não tiver 11
pub fn format_cpf(raw: &str) -> String {
    let d = only_digits(raw);
    if d.len() != 11 {
        return d;
    }
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
}

/// Formata CNPJ como `00.000.000/0000-00`; devolve os dígitos se não tiver 14
pub fn format_cnpj(raw: &str) -> String {
    let d = only_digits(raw);
    if d.len() != 14 {
        return d;
    }
    format!(
        "{}.{}.{}/{}-{}",
        &d[0..2],
        &d[2..5],
        &d[5..8],
        &d[8..12],
        &d[12..14]
    )
}

/// Apenas os dígitos de um CNPJ
pub fn clean_org_tax_id(raw: &str) -> String {
    only_digits(raw)
}
