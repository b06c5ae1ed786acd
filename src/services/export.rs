//! Geração das planilhas de relação de vidas (.xlsx) e do pacote ZIP
//!
//! Dois modelos: Alba (enviado à seguradora) e Clube (cartão de benefícios).
//! Colaboradores são deduplicados por CPF, mantendo o registro mais recente,
//! e ordenados por nome.

use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, ExcelDateTime, Format, FormatAlign, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use uuid::Uuid;
use zip::write::SimpleFileOptions;

use crate::models::{Colaborador, ColaboradorLote, Empresa, Lote};
use crate::utils::normalization::{file_name_slug, strip_accents};
use crate::utils::validators::{format_cnpj, format_cpf};

const SHEET_NAME: &str = "Relação de Vidas";
const COLUMN_WIDTH: f64 = 37.11;
const HEADER_FILL: u32 = 0x203455;
const DATE_FORMAT: &str = "dd/mm/yyyy";
const MONEY_FORMAT: &str = "#,##0.00";

const ALBA_HEADERS: [&str; 7] = [
    "NOME",
    "SEXO",
    "CPF",
    "DATA NASCIMENTO",
    "SALARIO",
    "CLASSIFICACAO SALARIAL",
    "CNPJ",
];
const CLUBE_HEADERS: [&str; 5] = ["NOME", "CPF", "PLANO", "DATA NASCIMENTO", "EXPIRAÇÃO"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Não há colaboradores neste lote para exportar")]
    EmptyRoster,

    #[error("Nenhum arquivo válido gerado")]
    NothingToExport,

    #[error("Falha ao gerar planilha: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Falha ao gerar ZIP: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Falha de E/S: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeloPlanilha {
    #[default]
    PadraoAlba,
    PadraoClube,
}

/// Dados da empresa que entram na planilha
#[derive(Debug, Clone, Copy)]
pub struct ExportContext<'a> {
    pub empresa_nome: &'a str,
    pub empresa_cnpj: &'a str,
}

impl<'a> From<&'a Empresa> for ExportContext<'a> {
    fn from(empresa: &'a Empresa) -> Self {
        Self {
            empresa_nome: &empresa.nome,
            empresa_cnpj: &empresa.cnpj,
        }
    }
}

/// Um registro por CPF (o mais recente) em ordem alfabética
pub fn prepare_rows(members: &[ColaboradorLote]) -> Vec<&Colaborador> {
    let mut ordered: Vec<&ColaboradorLote> = members.iter().collect();
    ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut seen = HashSet::new();
    let mut rows: Vec<&Colaborador> = ordered
        .into_iter()
        .filter(|m| seen.insert(m.dados.cpf.clone()))
        .map(|m| &m.dados)
        .collect();

    rows.sort_by_cached_key(|c| (strip_accents(&c.nome).to_uppercase(), c.nome.clone()));
    rows
}

fn excel_date(date: chrono::NaiveDate) -> Result<ExcelDateTime, XlsxError> {
    use chrono::Datelike;
    ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8)
}

/// Gera o .xlsx do modelo escolhido em memória
pub fn build_workbook(
    modelo: ModeloPlanilha,
    ctx: ExportContext<'_>,
    members: &[ColaboradorLote],
) -> Result<Vec<u8>, ExportError> {
    let rows = prepare_rows(members);
    if rows.is_empty() {
        return Err(ExportError::EmptyRoster);
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center);
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    let money_format = Format::new().set_num_format(MONEY_FORMAT);

    let headers: &[&str] = match modelo {
        ModeloPlanilha::PadraoAlba => &ALBA_HEADERS,
        ModeloPlanilha::PadraoClube => &CLUBE_HEADERS,
    };
    for (col, title) in headers.iter().enumerate() {
        sheet.set_column_width(col as u16, COLUMN_WIDTH)?;
        sheet.write_string_with_format(0, col as u16, *title, &header_format)?;
    }

    match modelo {
        ModeloPlanilha::PadraoAlba => {
            let cnpj = format_cnpj(ctx.empresa_cnpj);
            for (i, c) in rows.iter().enumerate() {
                let row = (i + 1) as u32;
                sheet.write_string(row, 0, c.nome.to_uppercase())?;
                sheet.write_string(row, 1, c.sexo.as_str())?;
                sheet.write_string(row, 2, format_cpf(&c.cpf))?;
                sheet.write_datetime_with_format(row, 3, &excel_date(c.data_nascimento)?, &date_format)?;
                sheet.write_number_with_format(row, 4, c.salario.to_f64().unwrap_or(0.0), &money_format)?;
                sheet.write_string(row, 5, c.classificacao_salario.as_str())?;
                sheet.write_string(row, 6, &cnpj)?;
            }
        }
        ModeloPlanilha::PadraoClube => {
            let nome_empresa = if ctx.empresa_nome.trim().is_empty() {
                "EMPRESA"
            } else {
                ctx.empresa_nome
            };
            let plano = format!("SINTEPAV-{}", nome_empresa);
            let expiracao = ExcelDateTime::from_ymd(2040, 1, 1)?;
            for (i, c) in rows.iter().enumerate() {
                let row = (i + 1) as u32;
                sheet.write_string(row, 0, c.nome.to_uppercase())?;
                sheet.write_string(row, 1, format_cpf(&c.cpf))?;
                sheet.write_string(row, 2, &plano)?;
                sheet.write_datetime_with_format(row, 3, &excel_date(c.data_nascimento)?, &date_format)?;
                sheet.write_datetime_with_format(row, 4, &expiracao, &date_format)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Caminho da planilha enviada à seguradora: `lotes/LISTA_{EMPRESA}_{Mês-Ano}.xlsx`
pub fn roster_file_name(empresa_nome: &str, competencia: &str) -> String {
    format!(
        "lotes/LISTA_{}_{}.xlsx",
        file_name_slug(empresa_nome),
        competencia.replace('/', "-")
    )
}

/// Nome de cada planilha dentro do ZIP de histórico
pub fn history_file_name(empresa_nome: &str, competencia: &str) -> String {
    format!(
        "HISTORICO_{}_{}.xlsx",
        file_name_slug(empresa_nome),
        competencia.replace('/', "-")
    )
}

/// Lote pronto para entrar no ZIP
#[derive(Debug, Clone)]
pub struct ZipSource {
    pub lote: Lote,
    pub empresa: Empresa,
    pub members: Vec<ColaboradorLote>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ZipFailure {
    pub lote_id: Uuid,
    pub erro: String,
}

#[derive(Debug, Clone, Default)]
pub struct ZipReport {
    pub bytes: Vec<u8>,
    pub incluidos: Vec<Uuid>,
    pub falhas: Vec<ZipFailure>,
}

/// Gera um ZIP com uma planilha por lote
///
/// Lotes que falham (ou estão vazios) entram em `falhas` e o restante segue.
pub fn export_zip(modelo: ModeloPlanilha, sources: &[ZipSource]) -> Result<ZipReport, ExportError> {
    let mut report = ZipReport::default();
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let mut names = HashSet::new();

        for source in sources {
            let bytes = match build_workbook(modelo, ExportContext::from(&source.empresa), &source.members) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("⚠️ Lote {} ignorado no ZIP: {}", source.lote.id, e);
                    report.falhas.push(ZipFailure {
                        lote_id: source.lote.id,
                        erro: e.to_string(),
                    });
                    continue;
                }
            };

            let mut name = history_file_name(&source.empresa.nome, &source.lote.competencia);
            if !names.insert(name.clone()) {
                // Mesma empresa e competência em obras diferentes
                name = name.replace(".xlsx", &format!("_{}.xlsx", &source.lote.id.simple().to_string()[..8]));
                names.insert(name.clone());
            }

            zip.start_file(name, options)?;
            zip.write_all(&bytes)?;
            report.incluidos.push(source.lote.id);
        }

        zip.finish()?;
    }

    if report.incluidos.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    report.bytes = buf.into_inner();
    Ok(report)
}
