use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "material_request_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub doc_no: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub line_no: i32,
    pub item: String,
    pub batch: String,
    pub source: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    pub cancelled: bool,
    /// True until a purchase order request line references this line.
    pub open: bool,
    pub remark: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material_request_headers::Entity",
        from = "Column::DocNo",
        to = "super::material_request_headers::Column::DocNo"
    )]
    Header,
}

impl Related<super::material_request_headers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Header.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
