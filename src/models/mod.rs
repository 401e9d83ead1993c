use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::entities::{benefits, centers};
use crate::utils::validation::ValidationError;

/// Target deployment of the generated insertion script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum Environment {
    #[serde(rename = "PRO")]
    Pro,
    #[default]
    #[serde(rename = "PRE")]
    Pre,
    #[serde(rename = "CAPA")]
    Capa,
    #[serde(rename = "DES")]
    Des,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Pro,
        Environment::Pre,
        Environment::Capa,
        Environment::Des,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Pro => "PRO",
            Environment::Pre => "PRE",
            Environment::Capa => "CAPA",
            Environment::Des => "DES",
        }
    }

    /// Database schema holding the ERP interface tables of this environment.
    pub fn schema(&self) -> String {
        format!("SINA_{}", self.as_str())
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new(
                    "INVALID_ENVIRONMENT",
                    "Environment parameter must be 'PRO' or 'PRE' or 'CAPA' or 'DES'",
                )
            })
    }
}

/// What the insertion routine needs to know about a staged upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescription {
    pub environment: Environment,
    pub filename: String,
    pub path: PathBuf,
}

/// SQL produced from an uploaded benefits spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InsertionScript {
    pub environment: Environment,
    pub filename: String,
    pub table: String,
    pub rows: usize,
    pub statements: Vec<String>,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitQueryFilter {
    pub benefit_name: Option<String>,
    pub benefit_code: Option<String>,
    pub benefit_type_code: Option<String>,
    pub benefit_subtype_code: Option<String>,
    pub active: bool,
    pub start_created_date: Option<DateTime<Utc>>,
    pub end_created_date: DateTime<Utc>,
    pub deleted: bool,
    pub page: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenterQueryFilter {
    pub center_name: Option<String>,
    pub center_code: Option<String>,
    pub external: bool,
    pub deleted: bool,
    pub page: u64,
    pub size: u64,
}

/// One page of a collection query.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(BenefitPage = Page<BenefitResponse>, CenterPage = Page<CenterResponse>)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u64, size: u64, total: u64) -> Self {
        let pages = if size == 0 { 0 } else { total.div_ceil(size) };
        Self {
            items,
            page,
            size,
            total,
            pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BenefitResponse {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub type_code: Option<String>,
    pub subtype_code: Option<String>,
    pub active: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<benefits::Model> for BenefitResponse {
    fn from(model: benefits::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            type_code: model.type_code,
            subtype_code: model.subtype_code,
            active: model.active,
            deleted: model.deleted,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CenterResponse {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub external: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<centers::Model> for CenterResponse {
    fn from(model: centers::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            external: model.external,
            deleted: model.deleted,
            created_at: model.created_at,
        }
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T10:15:30.123Z`.
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
