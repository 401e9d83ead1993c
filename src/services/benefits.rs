use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
    sea_query::{Expr, Func},
};

use super::{BenefitsService, contains_pattern};
use crate::entities::{benefits, prelude::*};
use crate::models::{BenefitQueryFilter, BenefitResponse, Page};

pub struct OrmBenefitsService {
    db: DatabaseConnection,
}

impl OrmBenefitsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn condition(filter: &BenefitQueryFilter) -> Condition {
    let mut cond = Condition::all()
        .add(benefits::Column::Active.eq(filter.active))
        .add(benefits::Column::Deleted.eq(filter.deleted))
        .add(benefits::Column::CreatedAt.lte(filter.end_created_date));

    if let Some(start) = filter.start_created_date {
        cond = cond.add(benefits::Column::CreatedAt.gte(start));
    }
    if let Some(ref name) = filter.benefit_name {
        cond = cond.add(
            Expr::expr(Func::lower(Expr::col(benefits::Column::Name)))
                .like(contains_pattern(name)),
        );
    }
    if let Some(ref code) = filter.benefit_code {
        cond = cond.add(benefits::Column::Code.eq(code));
    }
    if let Some(ref type_code) = filter.benefit_type_code {
        cond = cond.add(benefits::Column::TypeCode.eq(type_code));
    }
    if let Some(ref subtype_code) = filter.benefit_subtype_code {
        cond = cond.add(benefits::Column::SubtypeCode.eq(subtype_code));
    }

    cond
}

#[async_trait]
impl BenefitsService for OrmBenefitsService {
    async fn benefits(&self, filter: &BenefitQueryFilter) -> Result<Page<BenefitResponse>> {
        let paginator = Benefits::find()
            .filter(condition(filter))
            .order_by_asc(benefits::Column::Code)
            .order_by_asc(benefits::Column::Id)
            .paginate(&self.db, filter.size);

        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(filter.page.saturating_sub(1))
            .await?
            .into_iter()
            .map(BenefitResponse::from)
            .collect();

        tracing::debug!(
            page = filter.page,
            size = filter.size,
            total,
            "Fetched benefits page"
        );

        Ok(Page::new(items, filter.page, filter.size, total))
    }
}
