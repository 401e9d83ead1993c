use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
    sea_query::{Expr, Func},
};

use super::{CentersService, contains_pattern};
use crate::entities::{centers, prelude::*};
use crate::models::{CenterQueryFilter, CenterResponse, Page};

pub struct OrmCentersService {
    db: DatabaseConnection,
}

impl OrmCentersService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CentersService for OrmCentersService {
    async fn centers(&self, filter: &CenterQueryFilter) -> Result<Page<CenterResponse>> {
        let mut cond = Condition::all()
            .add(centers::Column::External.eq(filter.external))
            .add(centers::Column::Deleted.eq(filter.deleted));

        if let Some(ref name) = filter.center_name {
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col(centers::Column::Name)))
                    .like(contains_pattern(name)),
            );
        }
        if let Some(ref code) = filter.center_code {
            cond = cond.add(centers::Column::Code.eq(code));
        }

        let paginator = Centers::find()
            .filter(cond)
            .order_by_asc(centers::Column::Code)
            .order_by_asc(centers::Column::Id)
            .paginate(&self.db, filter.size);

        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(filter.page.saturating_sub(1))
            .await?
            .into_iter()
            .map(CenterResponse::from)
            .collect();

        Ok(Page::new(items, filter.page, filter.size, total))
    }
}
