use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::{StockCounters, StockKey};

/// The `stock_summary` table: running counters per (warehouse, source, item, batch).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_summary")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub warehouse: String,
    pub source: String,
    pub item: String,
    pub batch: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub received: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub transferred_in: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub consumed: Decimal,
    pub actor: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn key(&self) -> StockKey {
        StockKey::new(&self.warehouse, &self.source, &self.item, &self.batch)
    }

    pub fn counters(&self) -> StockCounters {
        StockCounters::new(self.received, self.transferred_in, self.consumed)
    }

    pub fn available(&self) -> Decimal {
        self.counters().available()
    }
}
