use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr, EntityTrait};

use super::{line_intent, StockDocument};
use crate::{
    entities::documents::{
        material_receive_headers, material_receive_lines, material_transfer_headers,
        material_transfer_lines, stock_mutation_headers, stock_mutation_lines,
    },
    models::{
        Direction, DocumentLine, DocumentType, FulfillmentStatus, LineFlag, MaterialReceive,
        MaterialTransfer, MovementIntent, StockMutation,
    },
};

/// Stock leaves the source warehouse when the transfer is created; it arrives
/// only when a material receive is booked against it.
#[async_trait]
impl StockDocument for MaterialTransfer {
    const DOC_TYPE: DocumentType = DocumentType::MaterialTransfer;

    fn doc_no(&self) -> &str {
        &self.doc_no
    }

    fn doc_date(&self) -> NaiveDate {
        self.doc_date
    }

    fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    fn movement_intents(&self) -> Vec<MovementIntent> {
        self.lines
            .iter()
            .map(|line| {
                line_intent(
                    Self::DOC_TYPE,
                    &self.doc_no,
                    self.doc_date,
                    &self.warehouse,
                    line,
                    Direction::Consumed,
                )
            })
            .collect()
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = material_transfer_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            to_warehouse: Set(self.to_warehouse.clone()),
            remark: Set(self.remark.clone()),
            status: Set(FulfillmentStatus::Outstanding),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        material_transfer_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| material_transfer_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            success: Set(LineFlag::Success.value_for(false)),
            remark: Set(line.remark.clone()),
        });
        material_transfer_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StockDocument for MaterialReceive {
    const DOC_TYPE: DocumentType = DocumentType::MaterialReceive;

    fn doc_no(&self) -> &str {
        &self.doc_no
    }

    fn doc_date(&self) -> NaiveDate {
        self.doc_date
    }

    fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    fn movement_intents(&self) -> Vec<MovementIntent> {
        self.lines
            .iter()
            .map(|line| {
                line_intent(
                    Self::DOC_TYPE,
                    &self.doc_no,
                    self.doc_date,
                    &self.warehouse,
                    line,
                    Direction::TransferredIn,
                )
            })
            .collect()
    }

    /// The transfer must have been sent from `from_warehouse` to this warehouse.
    fn upstream_header_match(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("warehouse", self.from_warehouse.as_str()),
            ("to_warehouse", self.warehouse.as_str()),
        ]
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = material_receive_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            from_warehouse: Set(self.from_warehouse.clone()),
            remark: Set(self.remark.clone()),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        material_receive_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| material_receive_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            upstream_doc_no: Set(line.upstream.as_ref().map(|up| up.doc_no.clone())),
            upstream_line_no: Set(line.upstream.as_ref().map(|up| up.line_no)),
            remark: Set(line.remark.clone()),
        });
        material_receive_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}

/// Both legs of the move are posted by the one document.
#[async_trait]
impl StockDocument for StockMutation {
    const DOC_TYPE: DocumentType = DocumentType::StockMutation;

    fn doc_no(&self) -> &str {
        &self.doc_no
    }

    fn doc_date(&self) -> NaiveDate {
        self.doc_date
    }

    fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    fn movement_intents(&self) -> Vec<MovementIntent> {
        self.lines
            .iter()
            .flat_map(|line| {
                [
                    line_intent(
                        Self::DOC_TYPE,
                        &self.doc_no,
                        self.doc_date,
                        &self.warehouse,
                        line,
                        Direction::Consumed,
                    ),
                    line_intent(
                        Self::DOC_TYPE,
                        &self.doc_no,
                        self.doc_date,
                        &self.to_warehouse,
                        line,
                        Direction::TransferredIn,
                    ),
                ]
            })
            .collect()
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = stock_mutation_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            to_warehouse: Set(self.to_warehouse.clone()),
            remark: Set(self.remark.clone()),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        stock_mutation_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| stock_mutation_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            remark: Set(line.remark.clone()),
        });
        stock_mutation_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}
