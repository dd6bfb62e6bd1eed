use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr, EntityTrait};

use super::{line_intent, StockDocument};
use crate::{
    entities::documents::{
        direct_delivery_headers, direct_delivery_lines, direct_receipt_headers,
        direct_receipt_lines, stock_adjustment_headers, stock_adjustment_lines,
    },
    models::{
        DirectDelivery, DirectReceipt, Direction, DocumentLine, DocumentType, MovementIntent,
        StockAdjustment,
    },
};

/// Positive lines are booked as received, negative lines as consumed.
#[async_trait]
impl StockDocument for StockAdjustment {
    const DOC_TYPE: DocumentType = DocumentType::StockAdjustment;

    fn doc_no(&self) -> &str {
        &self.doc_no
    }

    fn doc_date(&self) -> NaiveDate {
        self.doc_date
    }

    fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    fn signed_quantities() -> bool {
        true
    }

    fn movement_intents(&self) -> Vec<MovementIntent> {
        self.lines
            .iter()
            .map(|line| {
                let direction = if line.quantity > Decimal::ZERO {
                    Direction::Received
                } else {
                    Direction::Consumed
                };
                line_intent(
                    Self::DOC_TYPE,
                    &self.doc_no,
                    self.doc_date,
                    &self.warehouse,
                    line,
                    direction,
                )
            })
            .collect()
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = stock_adjustment_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            reason: Set(self.reason.clone()),
            remark: Set(self.remark.clone()),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        stock_adjustment_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| stock_adjustment_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            remark: Set(line.remark.clone()),
        });
        stock_adjustment_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StockDocument for DirectReceipt {
    const DOC_TYPE: DocumentType = DocumentType::DirectReceipt;

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
                    Direction::Received,
                )
            })
            .collect()
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = direct_receipt_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            kind: Set(self.kind),
            warehouse: Set(self.warehouse.clone()),
            counterparty: Set(self.counterparty.clone()),
            remark: Set(self.remark.clone()),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        direct_receipt_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| direct_receipt_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            remark: Set(line.remark.clone()),
        });
        direct_receipt_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StockDocument for DirectDelivery {
    const DOC_TYPE: DocumentType = DocumentType::DirectDelivery;

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
        let header = direct_delivery_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            kind: Set(self.kind),
            warehouse: Set(self.warehouse.clone()),
            counterparty: Set(self.counterparty.clone()),
            remark: Set(self.remark.clone()),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        direct_delivery_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| direct_delivery_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            remark: Set(line.remark.clone()),
        });
        direct_delivery_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}
