use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::FulfillmentStatus;

/// Material transfer: stock leaves `warehouse` for `to_warehouse`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "material_transfer_headers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    pub warehouse: String,
    pub to_warehouse: String,
    pub remark: Option<String>,
    pub status: FulfillmentStatus,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::material_transfer_lines::Entity")]
    Lines,
}

impl Related<super::material_transfer_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
