//! Normalização de planilhas de colaboradores e de empresas
//!
//! A planilha chega com cabeçalhos livres ("Nome do Funcionário", "C.P.F.",
//! "Remuneração"...). O cabeçalho é procurado nas primeiras linhas de cada
//! aba, as colunas são resolvidas por sinônimos e cada linha é validada.
//! Nada é persistido aqui: o resultado volta ao operador para revisão.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Cursor;
use thiserror::Error;

use crate::config::PolicySettings;
use crate::models::{Classificacao, Colaborador, EmpresaImport, ImportIssue, Sexo};
use crate::utils::normalization::normalize_header;
use crate::utils::validators::{
    clean_org_tax_id, format_cpf, is_valid_email, normalize_currency, normalize_tax_id, parse_date,
    parse_serial_date, sentinel_birth_date, validate_org_tax_id, validate_tax_id, verify_org_tax_id_checksum,
    verify_tax_id_checksum,
};

/// Quantas linhas do topo de cada aba são examinadas atrás do cabeçalho
const HEADER_SCAN_ROWS: usize = 5;

const NOME_SYNONYMS: &[&str] = &["nome", "funcionario", "colaborador"];
const CPF_SYNONYMS: &[&str] = &["cpf", "documento"];
const SALARIO_SYNONYMS: &[&str] = &["salario", "vencimento", "remuneracao"];
const NASCIMENTO_SYNONYMS: &[&str] = &["nascimento", "data", "dtnasc"];
const SEXO_SYNONYMS: &[&str] = &["sexo", "genero"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Colunas 'Nome' e 'CPF' não encontradas")]
    ColumnsNotFound,

    #[error("Arquivo vazio ou sem dados válidos")]
    EmptyWorkbook,

    #[error("Erro ao processar arquivo: {0}")]
    Unreadable(String),
}

/// Célula de planilha já desacoplada do leitor
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Texto da célula; números inteiros saem sem casas decimais
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            // Datas do Excel são números seriais
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }
}

impl From<&serde_json::Value> for Cell {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Cell::Empty,
            serde_json::Value::Bool(b) => Cell::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            serde_json::Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Uma aba da planilha
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    /// Linha (0-based) da planilha onde `rows[0]` começa
    pub row_offset: usize,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            row_offset: 0,
            rows,
        }
    }

    /// Número da linha como o operador vê na planilha (começa em 1)
    fn sheet_row(&self, index: usize) -> usize {
        self.row_offset + index + 1
    }
}

/// Lê todas as abas de um arquivo .xlsx/.xls/.ods
pub fn read_workbook(bytes: &[u8]) -> Result<Vec<Sheet>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ImportError::Unreadable(e.to_string()))?;
        let row_offset = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let rows = range
            .rows()
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();
        sheets.push(Sheet {
            name,
            row_offset,
            rows,
        });
    }

    tracing::debug!("Planilha lida: {} aba(s)", sheets.len());
    Ok(sheets)
}

/// Resultado da normalização, entregue ao operador antes de gravar
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOutcome {
    pub valid_records: Vec<Colaborador>,
    pub errors: Vec<ImportIssue>,
    /// Linhas de dados não vazias abaixo do cabeçalho
    pub total_rows: usize,
    pub sheet: String,
    /// Linha do cabeçalho na planilha (começa em 1)
    pub header_row: usize,
}

impl ImportOutcome {
    /// Linhas distintas com pelo menos um erro
    pub fn invalid_row_count(&self) -> usize {
        self.errors.iter().map(|e| e.linha).collect::<HashSet<_>>().len()
    }
}

/// Índices das colunas reconhecidas no cabeçalho
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    nome: usize,
    cpf: usize,
    salario: Option<usize>,
    nascimento: Option<usize>,
    sexo: Option<usize>,
}

fn find_column(headers: &[String], synonyms: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| synonyms.iter().any(|s| h.contains(s)))
}

fn resolve_columns(row: &[Cell]) -> Option<ColumnMap> {
    let headers: Vec<String> = row.iter().map(|c| normalize_header(&c.as_text())).collect();
    Some(ColumnMap {
        nome: find_column(&headers, NOME_SYNONYMS)?,
        cpf: find_column(&headers, CPF_SYNONYMS)?,
        salario: find_column(&headers, SALARIO_SYNONYMS),
        nascimento: find_column(&headers, NASCIMENTO_SYNONYMS),
        sexo: find_column(&headers, SEXO_SYNONYMS),
    })
}

/// Primeira aba com cabeçalho reconhecível e o índice da linha do cabeçalho
fn discover_header(sheets: &[Sheet]) -> Option<(&Sheet, usize, ColumnMap)> {
    sheets.iter().find_map(|sheet| {
        sheet
            .rows
            .iter()
            .take(HEADER_SCAN_ROWS)
            .enumerate()
            .find_map(|(i, row)| resolve_columns(row).map(|cols| (sheet, i, cols)))
    })
}

/// Campos brutos de um colaborador; `None` indica coluna ausente
#[derive(Debug, Clone, PartialEq)]
pub struct RawFields {
    pub nome: String,
    pub cpf: String,
    pub nascimento: Option<Cell>,
    pub salario: Option<Cell>,
    pub sexo: Option<String>,
}

/// Colaborador informado manualmente (inclusão ou edição no lote)
#[derive(Debug, Clone, Deserialize)]
pub struct ColaboradorInput {
    pub nome: String,
    pub cpf: String,
    pub sexo: Option<String>,
    pub data_nascimento: Option<String>,
    /// Aceita número ou texto no formato brasileiro
    pub salario: Option<serde_json::Value>,
}

impl ColaboradorInput {
    pub fn to_raw(&self) -> RawFields {
        RawFields {
            nome: self.nome.clone(),
            cpf: self.cpf.clone(),
            nascimento: self.data_nascimento.clone().map(Cell::Text),
            salario: self.salario.as_ref().map(Cell::from),
            sexo: self.sexo.clone(),
        }
    }
}

fn cell_to_date(cell: &Cell) -> Option<chrono::NaiveDate> {
    match cell {
        Cell::Number(n) => parse_serial_date(*n),
        other => parse_date(&other.as_text()),
    }
}

fn cell_to_salary(cell: &Cell) -> Decimal {
    match cell {
        Cell::Number(n) => Decimal::from_f64(*n)
            .map(|d| d.round_dp(2))
            .filter(|d| !d.is_sign_negative())
            .unwrap_or(Decimal::ZERO),
        other => normalize_currency(&other.as_text()),
    }
}

/// Valida os campos de um colaborador
///
/// `seen` contém os CPFs já aceitos na mesma importação; duplicados são erro.
pub fn validate_fields(
    linha: usize,
    fields: &RawFields,
    policy: &PolicySettings,
    seen: &HashSet<String>,
) -> Result<Colaborador, Vec<ImportIssue>> {
    let mut issues = Vec::new();

    let nome = fields.nome.trim().to_uppercase();
    if nome.is_empty() {
        issues.push(ImportIssue::new(linha, "Nome", &fields.nome, "Nome está vazio"));
    }

    let cpf_raw = fields.cpf.trim();
    let cpf = normalize_tax_id(cpf_raw);
    if cpf_raw.is_empty() || cpf.chars().all(|c| c == '0') {
        issues.push(ImportIssue::new(linha, "CPF", cpf_raw, "CPF está vazio"));
    } else if cpf.len() != 11 {
        issues.push(ImportIssue::new(
            linha,
            "CPF",
            cpf_raw,
            format!("CPF inválido: \"{}\" (deve ter 11 dígitos)", cpf_raw),
        ));
    } else if !validate_tax_id(&cpf) || (policy.strict_checksum && !verify_tax_id_checksum(&cpf)) {
        issues.push(ImportIssue::new(
            linha,
            "CPF",
            cpf_raw,
            format!("CPF inválido: \"{}\"", format_cpf(&cpf)),
        ));
    } else if seen.contains(&cpf) {
        issues.push(ImportIssue::new(
            linha,
            "CPF",
            cpf_raw,
            format!("CPF duplicado na planilha: \"{}\"", format_cpf(&cpf)),
        ));
    }

    let data_nascimento = match &fields.nascimento {
        Some(cell) if !cell.is_empty() => match cell_to_date(cell) {
            Some(date) => date,
            None => {
                let raw = cell.as_text();
                issues.push(ImportIssue::new(
                    linha,
                    "Nascimento",
                    &raw,
                    format!("Data inválida: \"{}\"", raw),
                ));
                sentinel_birth_date()
            }
        },
        _ => sentinel_birth_date(),
    };

    let salario = match &fields.salario {
        Some(cell) if !cell.is_empty() => {
            let value = cell_to_salary(cell);
            if value <= Decimal::ZERO {
                let raw = cell.as_text();
                issues.push(ImportIssue::new(
                    linha,
                    "Salário",
                    &raw,
                    format!("Valor inválido: \"{}\"", raw),
                ));
            }
            value
        }
        _ => Decimal::ZERO,
    };

    if !issues.is_empty() {
        return Err(issues);
    }

    Ok(Colaborador {
        nome,
        cpf,
        sexo: fields.sexo.as_deref().map(Sexo::normalize).unwrap_or_default(),
        data_nascimento,
        salario,
        classificacao_salario: Classificacao::from_salary(salario, policy.helper_salary_threshold),
    })
}

fn cell_at(row: &[Cell], idx: usize) -> Cell {
    row.get(idx).cloned().unwrap_or(Cell::Empty)
}

/// Normaliza a planilha de colaboradores em registros válidos e erros por linha
pub fn normalize_rows(sheets: &[Sheet], policy: &PolicySettings) -> Result<ImportOutcome, ImportError> {
    let (sheet, header_idx, cols) = discover_header(sheets).ok_or(ImportError::ColumnsNotFound)?;

    let mut outcome = ImportOutcome {
        sheet: sheet.name.clone(),
        header_row: sheet.sheet_row(header_idx),
        ..Default::default()
    };
    let mut seen = HashSet::new();

    for (idx, row) in sheet.rows.iter().enumerate().skip(header_idx + 1) {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        outcome.total_rows += 1;

        let fields = RawFields {
            nome: cell_at(row, cols.nome).as_text(),
            cpf: cell_at(row, cols.cpf).as_text(),
            nascimento: cols.nascimento.map(|i| cell_at(row, i)),
            salario: cols.salario.map(|i| cell_at(row, i)),
            sexo: cols.sexo.map(|i| cell_at(row, i).as_text()),
        };

        match validate_fields(sheet.sheet_row(idx), &fields, policy, &seen) {
            Ok(record) => {
                seen.insert(record.cpf.clone());
                outcome.valid_records.push(record);
            }
            Err(issues) => outcome.errors.extend(issues),
        }
    }

    crate::utils::logging::log_import_summary(outcome.valid_records.len(), outcome.invalid_row_count());
    Ok(outcome)
}

/// Resultado da importação de empresas
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmpresaImportOutcome {
    pub valid_records: Vec<EmpresaImport>,
    pub errors: Vec<ImportIssue>,
}

/// Planilha de empresas: colunas nome, cnpj, email_contato, telefone na primeira linha
///
/// CNPJs já cadastrados (ou repetidos na própria planilha) são rejeitados.
/// Com `strict_checksum` os dígitos verificadores também são conferidos.
pub fn import_companies(
    sheet: &Sheet,
    existing_cnpjs: &HashSet<String>,
    strict_checksum: bool,
) -> Result<EmpresaImportOutcome, ImportError> {
    let header = sheet.rows.first().ok_or(ImportError::EmptyWorkbook)?;
    let headers: Vec<String> = header.iter().map(|c| normalize_header(&c.as_text())).collect();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let col_nome = position("nome");
    let col_cnpj = position("cnpj");
    let col_email = position("emailcontato").or_else(|| position("email"));
    let col_telefone = position("telefone");

    let data_rows: Vec<(usize, &Vec<Cell>)> = sheet
        .rows
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| !row.iter().all(Cell::is_empty))
        .collect();
    if data_rows.is_empty() {
        return Err(ImportError::EmptyWorkbook);
    }

    let text = |row: &[Cell], col: Option<usize>| col.map(|i| cell_at(row, i).as_text()).unwrap_or_default();

    let mut outcome = EmpresaImportOutcome::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, row) in data_rows {
        let linha = sheet.sheet_row(idx);
        let nome = text(row, col_nome);
        let cnpj = text(row, col_cnpj);
        let email = text(row, col_email);
        let telefone = text(row, col_telefone);
        let mut issues = Vec::new();

        if nome.is_empty() {
            issues.push(ImportIssue::new(linha, "nome", &nome, "Nome é obrigatório"));
        }

        let cleaned = clean_org_tax_id(&cnpj);
        if cnpj.is_empty() {
            issues.push(ImportIssue::new(linha, "cnpj", &cnpj, "CNPJ é obrigatório"));
        } else if !validate_org_tax_id(&cnpj) {
            issues.push(ImportIssue::new(linha, "cnpj", &cnpj, "CNPJ inválido (deve ter 14 dígitos)"));
        } else if strict_checksum && !verify_org_tax_id_checksum(&cnpj) {
            issues.push(ImportIssue::new(linha, "cnpj", &cnpj, "CNPJ inválido (dígitos verificadores)"));
        } else if existing_cnpjs.contains(&cleaned) {
            issues.push(ImportIssue::new(linha, "cnpj", &cnpj, "CNPJ já cadastrado no sistema"));
        } else if seen.contains(&cleaned) {
            issues.push(ImportIssue::new(linha, "cnpj", &cnpj, "CNPJ duplicado na planilha"));
        }

        if !email.is_empty() && !is_valid_email(&email) {
            issues.push(ImportIssue::new(linha, "email_contato", &email, "Email inválido"));
        }

        if issues.is_empty() {
            seen.insert(cleaned.clone());
            outcome.valid_records.push(EmpresaImport {
                nome,
                cnpj: cleaned,
                email_contato: Some(email).filter(|e| !e.is_empty()),
                telefone: Some(telefone).filter(|t| !t.is_empty()),
            });
        } else {
            outcome.errors.extend(issues);
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| if c.is_empty() { Cell::Empty } else { text(c) }).collect()
    }

    fn policy() -> PolicySettings {
        PolicySettings::default()
    }

    #[test]
    fn test_header_discovered_below_title_rows() {
        let sheet = Sheet::new(
            "Plan1",
            vec![
                row(&["RELAÇÃO DE FUNCIONÁRIOS - MARÇO"]),
                row(&[]),
                row(&["Nome do Funcionário", "C.P.F.", "Salário", "Data Nasc.", "Gênero"]),
                row(&["joão da silva", "111.444.777-35", "R$ 1.500,00", "10/05/1990", "M"]),
                row(&["maria souza", "529.982.247-25", "2.500,00", "01/02/85", "F"]),
            ],
        );

        let outcome = normalize_rows(&[sheet], &policy()).unwrap();
        assert_eq!(outcome.header_row, 3);
        assert_eq!(outcome.total_rows, 2);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

        let joao = &outcome.valid_records[0];
        assert_eq!(joao.nome, "JOÃO DA SILVA");
        assert_eq!(joao.cpf, "11144477735");
        assert_eq!(joao.salario, Decimal::new(150000, 2));
        assert_eq!(joao.classificacao_salario, Classificacao::Ajudante);
        assert_eq!(joao.data_nascimento, NaiveDate::from_ymd_opt(1990, 5, 10).unwrap());

        let maria = &outcome.valid_records[1];
        assert_eq!(maria.sexo, Sexo::Feminino);
        assert_eq!(maria.classificacao_salario, Classificacao::Profissional);
        assert_eq!(maria.data_nascimento, NaiveDate::from_ymd_opt(1985, 2, 1).unwrap());
    }

    #[test]
    fn test_columns_not_found() {
        let sheet = Sheet::new("Plan1", vec![row(&["Produto", "Quantidade"]), row(&["Cimento", "10"])]);
        assert_eq!(normalize_rows(&[sheet], &policy()).unwrap_err(), ImportError::ColumnsNotFound);
    }

    #[test]
    fn test_header_beyond_scan_window_is_ignored() {
        let mut rows: Vec<Vec<Cell>> = (0..5).map(|_| row(&["titulo"])).collect();
        rows.push(row(&["Nome", "CPF"]));
        let sheet = Sheet::new("Plan1", rows);
        assert_eq!(normalize_rows(&[sheet], &policy()).unwrap_err(), ImportError::ColumnsNotFound);
    }

    #[test]
    fn test_second_sheet_used_when_first_has_no_header() {
        let capa = Sheet::new("Capa", vec![row(&["Empresa XYZ"])]);
        let dados = Sheet::new("Dados", vec![row(&["Colaborador", "Documento"]), row(&["Ana", "11144477735"])]);
        let outcome = normalize_rows(&[capa, dados], &policy()).unwrap();
        assert_eq!(outcome.sheet, "Dados");
        assert_eq!(outcome.valid_records.len(), 1);
    }

    #[test]
    fn test_duplicate_cpf_first_wins() {
        let sheet = Sheet::new(
            "Plan1",
            vec![
                row(&["Nome", "CPF"]),
                row(&["Primeiro", "123.456.789-00"]),
                row(&["Segundo", "123.456.789-00"]),
            ],
        );
        let outcome = normalize_rows(&[sheet], &policy()).unwrap();
        assert_eq!(outcome.valid_records.len(), 1);
        assert_eq!(outcome.valid_records[0].nome, "PRIMEIRO");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].linha, 3);
        assert!(outcome.errors[0].erro.contains("duplicado"));
    }

    #[test]
    fn test_strict_checksum_policy() {
        let sheet = Sheet::new("Plan1", vec![row(&["Nome", "CPF"]), row(&["Teste", "123.456.789-00"])]);
        let strict = PolicySettings {
            strict_checksum: true,
            ..PolicySettings::default()
        };
        let outcome = normalize_rows(&[sheet], &strict).unwrap();
        assert!(outcome.valid_records.is_empty());
        assert_eq!(outcome.errors[0].erro, "CPF inválido: \"123.456.789-00\"");
    }

    #[test]
    fn test_valid_and_invalid_counts() {
        let sheet = Sheet::new(
            "Plan1",
            vec![
                row(&["Nome", "CPF", "Nascimento", "Salario"]),
                row(&["Ok Um", "11144477735", "10/05/1990", "1800"]),
                row(&["", "52998224725", "", ""]),
                row(&["Ok Dois", "52998224725", "1990-01-01", ""]),
                row(&["Cpf Curto", "111111111111111", "", ""]),
                row(&["Repetido", "00000000000", "", ""]),
                row(&["Data Ruim", "39053344705", "31/04/2024", ""]),
                row(&["Salario Ruim", "86288366757", "", "abc"]),
                row(&["", "", "", ""]),
            ],
        );
        let outcome = normalize_rows(&[sheet], &policy()).unwrap();
        assert_eq!(outcome.valid_records.len(), 2);
        assert_eq!(outcome.invalid_row_count(), 5);
        assert_eq!(outcome.total_rows, 7);
        assert!(outcome.valid_records.len() + outcome.invalid_row_count() <= outcome.total_rows);

        let data_ruim = outcome.errors.iter().find(|e| e.linha == 7).unwrap();
        assert_eq!(data_ruim.campo, "Nascimento");
        let salario_ruim = outcome.errors.iter().find(|e| e.linha == 8).unwrap();
        assert_eq!(salario_ruim.campo, "Salário");
        let vazio = outcome.errors.iter().find(|e| e.linha == 6).unwrap();
        assert_eq!(vazio.erro, "CPF está vazio");
    }

    #[test]
    fn test_birth_date_before_1900_is_rejected() {
        let sheet = Sheet::new(
            "Plan1",
            vec![
                row(&["Nome", "CPF", "Nascimento"]),
                row(&["Antigo", "11144477735", "15/03/1850"]),
                row(&["Iso Antigo", "52998224725", "0001-01-01"]),
                row(&["Valido", "39053344705", "01/01/1900"]),
            ],
        );
        let outcome = normalize_rows(&[sheet], &policy()).unwrap();
        assert_eq!(outcome.valid_records.len(), 1);
        assert_eq!(outcome.valid_records[0].nome, "VALIDO");
        assert_eq!(outcome.invalid_row_count(), 2);
        assert!(outcome.errors.iter().all(|e| e.campo == "Nascimento"));
        assert_eq!(outcome.errors[0].erro, "Data inválida: \"15/03/1850\"");
    }

    #[test]
    fn test_missing_optional_columns_default() {
        let sheet = Sheet::new("Plan1", vec![row(&["Nome", "CPF"]), row(&["Sem Extras", "11144477735"])]);
        let outcome = normalize_rows(&[sheet], &policy()).unwrap();
        let record = &outcome.valid_records[0];
        assert_eq!(record.sexo, Sexo::Masculino);
        assert_eq!(record.salario, Decimal::ZERO);
        assert_eq!(record.data_nascimento, sentinel_birth_date());
        assert_eq!(record.classificacao_salario, Classificacao::Ajudante);
    }

    #[test]
    fn test_numeric_cells() {
        let sheet = Sheet {
            name: "Plan1".to_string(),
            row_offset: 4,
            rows: vec![
                row(&["Nome", "CPF", "Nascimento", "Salário"]),
                vec![text("Numérico"), Cell::Number(11144477735.0), Cell::Number(33000.0), Cell::Number(2345.678)],
            ],
        };
        let outcome = normalize_rows(&[sheet], &policy()).unwrap();
        assert_eq!(outcome.header_row, 5);
        let record = &outcome.valid_records[0];
        assert_eq!(record.cpf, "11144477735");
        assert_eq!(record.data_nascimento, NaiveDate::from_ymd_opt(1990, 5, 7).unwrap());
        assert_eq!(record.salario, Decimal::new(234568, 2));
    }

    #[test]
    fn test_manual_input_validation() {
        let input = ColaboradorInput {
            nome: "carlos".to_string(),
            cpf: "111.444.777-35".to_string(),
            sexo: Some("Masculino".to_string()),
            data_nascimento: Some("1980-12-31".to_string()),
            salario: Some(serde_json::json!(4200.5)),
        };
        let record = validate_fields(1, &input.to_raw(), &policy(), &HashSet::new()).unwrap();
        assert_eq!(record.nome, "CARLOS");
        assert_eq!(record.salario, Decimal::new(42005, 1));

        let bad = ColaboradorInput {
            cpf: "1234567890123".to_string(),
            ..input
        };
        let issues = validate_fields(1, &bad.to_raw(), &policy(), &HashSet::new()).unwrap_err();
        assert_eq!(issues[0].campo, "CPF");
    }

    #[test]
    fn test_import_companies() {
        let sheet = Sheet::new(
            "Modelo",
            vec![
                row(&["nome", "cnpj", "email_contato", "telefone"]),
                row(&["Construtora A", "11.222.333/0001-81", "contato@a.com.br", "(11) 99999-9999"]),
                row(&["", "11222333000181", "", ""]),
                row(&["Construtora B", "1122233300018", "", ""]),
                row(&["Construtora C", "45.723.174/0001-10", "", ""]),
                row(&["Construtora D", "06.990.590/0001-23", "email-invalido", ""]),
            ],
        );
        let existing: HashSet<String> = ["45723174000110".to_string()].into_iter().collect();
        let outcome = import_companies(&sheet, &existing, false).unwrap();

        assert_eq!(outcome.valid_records.len(), 1);
        assert_eq!(outcome.valid_records[0].cnpj, "11222333000181");
        assert_eq!(outcome.valid_records[0].email_contato.as_deref(), Some("contato@a.com.br"));

        let erros: Vec<(usize, &str)> = outcome.errors.iter().map(|e| (e.linha, e.erro.as_str())).collect();
        assert!(erros.contains(&(3, "Nome é obrigatório")));
        assert!(erros.contains(&(3, "CNPJ duplicado na planilha")));
        assert!(erros.contains(&(4, "CNPJ inválido (deve ter 14 dígitos)")));
        assert!(erros.contains(&(5, "CNPJ já cadastrado no sistema")));
        assert!(erros.contains(&(6, "Email inválido")));
    }

    #[test]
    fn test_import_companies_strict_checksum() {
        let sheet = Sheet::new(
            "Modelo",
            vec![
                row(&["nome", "cnpj"]),
                row(&["Construtora A", "11.222.333/0001-81"]),
                row(&["Construtora B", "11.222.333/0001-82"]),
            ],
        );

        let outcome = import_companies(&sheet, &HashSet::new(), true).unwrap();
        assert_eq!(outcome.valid_records.len(), 1);
        assert_eq!(outcome.valid_records[0].cnpj, "11222333000181");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].linha, 3);
        assert_eq!(outcome.errors[0].erro, "CNPJ inválido (dígitos verificadores)");

        // sem a conferência estrita o dígito errado passa
        let lenient = import_companies(&sheet, &HashSet::new(), false).unwrap();
        assert_eq!(lenient.valid_records.len(), 2);
    }

    #[test]
    fn test_import_companies_empty_sheet() {
        let sheet = Sheet::new("Modelo", vec![row(&["nome", "cnpj"])]);
        assert_eq!(
            import_companies(&sheet, &HashSet::new(), false).unwrap_err(),
            ImportError::EmptyWorkbook
        );
    }

    #[test]
    fn test_read_workbook_rejects_garbage() {
        assert!(matches!(read_workbook(b"not a spreadsheet"), Err(ImportError::Unreadable(_))));
    }
}
