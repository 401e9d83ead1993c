use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::models::{BenefitQueryFilter, CenterQueryFilter, Environment};
use crate::utils::validation::ValidationError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 20;

fn default_environment() -> String {
    Environment::default().to_string()
}

fn default_page() -> u64 {
    DEFAULT_PAGE
}

fn default_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// Target environment: PRO, PRE, CAPA or DES.
    #[serde(default = "default_environment")]
    pub environment: String,
}

#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct BenefitsQuery {
    pub benefit_name: Option<String>,
    pub benefit_code: Option<String>,
    pub benefit_type_code: Option<String>,
    pub benefit_subtype_code: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub start_created_date: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`; defaults to the request time.
    pub end_created_date: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be greater than or equal to 1"))]
    pub page: u64,
    #[serde(default = "default_size")]
    #[validate(range(min = 1, message = "size must be greater than or equal to 1"))]
    pub size: u64,
}

#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct CentersQuery {
    pub center_name: Option<String>,
    pub center_code: Option<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be greater than or equal to 1"))]
    pub page: u64,
    #[serde(default = "default_size")]
    #[validate(range(min = 1, message = "size must be greater than or equal to 1"))]
    pub size: u64,
}

/// Empty strings from HTML forms count as "not given".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(field: &str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| {
            ValidationError::new(
                "INVALID_DATE",
                format!(
                    "{} must be an ISO-8601 date (e.g. 2024-01-31T10:00:00.000Z), got '{}'",
                    field, value
                ),
            )
        })
}

fn check_pagination(
    validated: Result<(), validator::ValidationErrors>,
    page: u64,
    size: u64,
    max_page_size: u64,
) -> Result<(), ValidationError> {
    validated.map_err(|e| ValidationError::new("INVALID_PAGINATION", e.to_string()))?;
    if size > max_page_size {
        return Err(ValidationError::new(
            "INVALID_PAGINATION",
            format!("size must be less than or equal to {}", max_page_size),
        ));
    }
    // The row offset is bound as a signed 64-bit integer.
    if page.checked_mul(size).is_none_or(|end| end > i64::MAX as u64) {
        return Err(ValidationError::new(
            "INVALID_PAGINATION",
            format!("page {} is out of range for size {}", page, size),
        ));
    }
    Ok(())
}

impl BenefitsQuery {
    /// Resolves defaults against `now`, the time the request is processed.
    pub fn into_filter(
        self,
        now: DateTime<Utc>,
        max_page_size: u64,
    ) -> Result<BenefitQueryFilter, ValidationError> {
        check_pagination(self.validate(), self.page, self.size, max_page_size)?;

        let start_created_date = non_empty(self.start_created_date)
            .map(|v| parse_date("start_created_date", &v))
            .transpose()?;
        let end_created_date = match non_empty(self.end_created_date) {
            Some(v) => parse_date("end_created_date", &v)?,
            None => now,
        };

        Ok(BenefitQueryFilter {
            benefit_name: non_empty(self.benefit_name),
            benefit_code: non_empty(self.benefit_code),
            benefit_type_code: non_empty(self.benefit_type_code),
            benefit_subtype_code: non_empty(self.benefit_subtype_code),
            active: self.active,
            start_created_date,
            end_created_date,
            deleted: self.deleted,
            page: self.page,
            size: self.size,
        })
    }
}

impl CentersQuery {
    pub fn into_filter(self, max_page_size: u64) -> Result<CenterQueryFilter, ValidationError> {
        check_pagination(self.validate(), self.page, self.size, max_page_size)?;

        Ok(CenterQueryFilter {
            center_name: non_empty(self.center_name),
            center_code: non_empty(self.center_code),
            external: self.external,
            deleted: self.deleted,
            page: self.page,
            size: self.size,
        })
    }
}
