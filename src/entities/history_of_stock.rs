use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The `history_of_stock` table: known (item, batch, source) identities and the
/// document line that introduced each one.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "history_of_stock")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub item: String,
    pub batch: String,
    pub source: String,
    pub cancelled: bool,
    pub doc_type: String,
    pub doc_no: String,
    pub line_no: i32,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
