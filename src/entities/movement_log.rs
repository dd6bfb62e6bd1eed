use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The `movement_log` table: one row per (document, line, direction).
///
/// Rows are never updated except for `cancelled`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movement_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub doc_type: String,
    pub doc_no: String,
    pub line_no: i32,
    pub cancelled: bool,
    pub doc_date: NaiveDate,
    pub warehouse: String,
    pub source: String,
    pub item: String,
    pub batch: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty_in: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty_in2: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty_out: Decimal,
    pub remark: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
