pub mod benefits;
pub mod centers;
pub mod insertion;
pub mod spreadsheet;
pub mod staging;

use anyhow::Result;
use async_trait::async_trait;
use sea_orm::sea_query::LikeExpr;

use crate::models::{
    BenefitQueryFilter, BenefitResponse, CenterQueryFilter, CenterResponse, InsertionScript, Page,
    UploadDescription,
};

/// Turns a staged benefits spreadsheet into ERP interface insertions.
#[async_trait]
pub trait BenefitsUploadService: Send + Sync {
    async fn erp_interface_insertions(&self, upload: &UploadDescription) -> Result<InsertionScript>;
}

#[async_trait]
pub trait BenefitsService: Send + Sync {
    async fn benefits(&self, filter: &BenefitQueryFilter) -> Result<Page<BenefitResponse>>;
}

#[async_trait]
pub trait CentersService: Send + Sync {
    async fn centers(&self, filter: &CenterQueryFilter) -> Result<Page<CenterResponse>>;
}

const LIKE_ESCAPE: char = '\\';

/// Lower-cased `%value%` pattern in which `%`, `_` and the escape character
/// match themselves.
pub(crate) fn contains_pattern(value: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for c in value.to_lowercase().chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}
