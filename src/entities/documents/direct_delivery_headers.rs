use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::DeliveryKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "direct_delivery_headers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    pub kind: DeliveryKind,
    pub warehouse: String,
    pub counterparty: Option<String>,
    pub remark: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::direct_delivery_lines::Entity")]
    Lines,
}

impl Related<super::direct_delivery_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
