use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::info;

use super::BenefitsUploadService;
use super::spreadsheet::{self, Row, SpreadsheetError};
use crate::models::{Environment, InsertionScript, UploadDescription, iso_millis};

/// Columns of the upload template and the ERP interface column each feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Code,
    Name,
    TypeCode,
    SubtypeCode,
    CenterCode,
    Active,
}

impl Field {
    const ALL: [Field; 6] = [
        Field::Code,
        Field::Name,
        Field::TypeCode,
        Field::SubtypeCode,
        Field::CenterCode,
        Field::Active,
    ];

    fn header(self) -> &'static str {
        match self {
            Field::Code => "CODIGO",
            Field::Name => "NOMBRE",
            Field::TypeCode => "TIPO",
            Field::SubtypeCode => "SUBTIPO",
            Field::CenterCode => "CENTRO",
            Field::Active => "ACTIVO",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Field::Code => "BENEFIT_CODE",
            Field::Name => "BENEFIT_NAME",
            Field::TypeCode => "BENEFIT_TYPE_CODE",
            Field::SubtypeCode => "BENEFIT_SUBTYPE_CODE",
            Field::CenterCode => "CENTER_CODE",
            Field::Active => "ACTIVE",
        }
    }

    fn required(self) -> bool {
        !matches!(self, Field::CenterCode | Field::Active)
    }
}

#[derive(Debug, Error)]
pub enum InsertionError {
    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("The Excel has no header row")]
    Empty,

    #[error("The Excel is missing the required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Row {row}: column '{column}' can not be empty")]
    MissingValue { row: u32, column: &'static str },

    #[error("The Excel has no benefits to load")]
    NoRows,
}

/// Trims, upper-cases and strips Spanish accents so "Código" matches CODIGO.
fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'A',
            'é' | 'É' => 'E',
            'í' | 'Í' => 'I',
            'ó' | 'Ó' => 'O',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'U',
            ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

fn sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn sql_flag(value: &str) -> &'static str {
    match value.trim().to_uppercase().as_str() {
        "" | "S" | "SI" | "SÍ" | "1" | "TRUE" | "X" => "1",
        _ => "0",
    }
}

/// Builds one INSERT per data row of `rows`, whose first non-blank row is
/// the header.
pub fn build_statements(
    rows: &[Row],
    environment: Environment,
    table: &str,
) -> Result<Vec<String>, InsertionError> {
    let mut rows = rows.iter().filter(|row| !row.is_blank());
    let header = rows.next().ok_or(InsertionError::Empty)?;

    let headers: Vec<String> = header.cells.iter().map(|h| normalize_header(h)).collect();
    let mut columns: Vec<(Field, usize)> = Vec::new();
    for field in Field::ALL {
        match headers.iter().position(|h| h == field.header()) {
            Some(index) => columns.push((field, index)),
            None if field.required() => return Err(InsertionError::MissingColumn(field.header())),
            None => (),
        }
    }

    let column_list = columns
        .iter()
        .map(|(field, _)| field.column())
        .chain(columns.iter().all(|(f, _)| *f != Field::Active).then_some("ACTIVE"))
        .collect::<Vec<_>>()
        .join(", ");
    let target = format!("{}.{}", environment.schema(), table);

    let mut statements = Vec::new();
    for row in rows {
        let mut values = Vec::with_capacity(columns.len() + 1);
        for &(field, index) in &columns {
            let raw = row.cell(index).trim();
            let value = match field {
                Field::Active => sql_flag(raw).to_string(),
                _ if raw.is_empty() && field.required() => {
                    return Err(InsertionError::MissingValue {
                        row: row.number,
                        column: field.header(),
                    });
                }
                _ if raw.is_empty() => "NULL".to_string(),
                _ => sql_string(raw),
            };
            values.push(value);
        }
        if columns.iter().all(|(f, _)| *f != Field::Active) {
            values.push("1".to_string());
        }

        statements.push(format!(
            "INSERT INTO {} ({}) VALUES ({});",
            target,
            column_list,
            values.join(", ")
        ));
    }

    if statements.is_empty() {
        return Err(InsertionError::NoRows);
    }
    Ok(statements)
}

/// Default insertion routine: parses the staged workbook and renders the
/// ERP interface INSERT script for the requested environment.
pub struct ErpInsertionService {
    table: String,
}

impl ErpInsertionService {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

#[async_trait]
impl BenefitsUploadService for ErpInsertionService {
    async fn erp_interface_insertions(&self, upload: &UploadDescription) -> Result<InsertionScript> {
        let bytes = tokio::fs::read(&upload.path)
            .await
            .with_context(|| format!("Failed to read uploaded file {}", upload.filename))?;

        let environment = upload.environment;
        let table = self.table.clone();
        let statements = tokio::task::spawn_blocking(move || -> Result<Vec<String>, InsertionError> {
            let rows = spreadsheet::read_first_sheet(&bytes)?;
            build_statements(&rows, environment, &table)
        })
        .await
        .context("Spreadsheet parsing task failed")??;

        let script = format!(
            "-- Benefits load for {} from '{}'\n-- Generated at {}\n{}\n",
            environment,
            upload.filename,
            iso_millis(Utc::now()),
            statements.join("\n")
        );

        info!(
            "🧾 Generated {} insertions for {} ({})",
            statements.len(),
            upload.filename,
            environment
        );

        Ok(InsertionScript {
            environment,
            filename: upload.filename.clone(),
            table: format!("{}.{}", environment.schema(), self.table),
            rows: statements.len(),
            statements,
            script,
        })
    }
}
