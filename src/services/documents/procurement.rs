use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr, EntityTrait};

use super::{line_intent, StockDocument};
use crate::{
    entities::documents::{
        material_request_headers, material_request_lines, purchase_order_headers,
        purchase_order_lines, purchase_order_request_headers, purchase_order_request_lines,
        purchase_receipt_headers, purchase_receipt_lines, purchase_return_headers,
        purchase_return_lines,
    },
    models::{
        Direction, DocumentLine, DocumentType, FulfillmentStatus, LineFlag, MaterialRequest,
        MovementIntent, PurchaseOrder, PurchaseOrderRequest, PurchaseReceipt, PurchaseReturn,
    },
};

fn upstream_doc_no(line: &DocumentLine) -> Option<String> {
    line.upstream.as_ref().map(|up| up.doc_no.clone())
}

fn upstream_line_no(line: &DocumentLine) -> Option<i32> {
    line.upstream.as_ref().map(|up| up.line_no)
}

#[async_trait]
impl StockDocument for MaterialRequest {
    const DOC_TYPE: DocumentType = DocumentType::MaterialRequest;

    fn doc_no(&self) -> &str {
        &self.doc_no
    }

    fn doc_date(&self) -> NaiveDate {
        self.doc_date
    }

    fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = material_request_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            requested_by: Set(self.requested_by.clone()),
            remark: Set(self.remark.clone()),
            status: Set(FulfillmentStatus::Outstanding),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        material_request_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let open = LineFlag::Open.value_for(false);
        let rows = self.lines.iter().map(|line| material_request_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            open: Set(open),
            remark: Set(line.remark.clone()),
        });
        material_request_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StockDocument for PurchaseOrderRequest {
    const DOC_TYPE: DocumentType = DocumentType::PurchaseOrderRequest;

    fn doc_no(&self) -> &str {
        &self.doc_no
    }

    fn doc_date(&self) -> NaiveDate {
        self.doc_date
    }

    fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = purchase_order_request_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            requested_by: Set(self.requested_by.clone()),
            remark: Set(self.remark.clone()),
            status: Set(FulfillmentStatus::Outstanding),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        purchase_order_request_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self
            .lines
            .iter()
            .map(|line| purchase_order_request_lines::ActiveModel {
                doc_no: Set(self.doc_no.clone()),
                line_no: Set(line.line_no),
                item: Set(line.item.clone()),
                batch: Set(line.batch.clone()),
                source: Set(line.source.clone()),
                quantity: Set(line.quantity),
                cancelled: Set(false),
                used: Set(LineFlag::Used.value_for(false)),
                upstream_doc_no: Set(upstream_doc_no(line)),
                upstream_line_no: Set(upstream_line_no(line)),
                remark: Set(line.remark.clone()),
            });
        purchase_order_request_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StockDocument for PurchaseOrder {
    const DOC_TYPE: DocumentType = DocumentType::PurchaseOrder;

    fn doc_no(&self) -> &str {
        &self.doc_no
    }

    fn doc_date(&self) -> NaiveDate {
        self.doc_date
    }

    fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = purchase_order_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            supplier: Set(self.supplier.clone()),
            remark: Set(self.remark.clone()),
            status: Set(FulfillmentStatus::Outstanding),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        purchase_order_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| purchase_order_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            success: Set(LineFlag::Success.value_for(false)),
            upstream_doc_no: Set(upstream_doc_no(line)),
            upstream_line_no: Set(upstream_line_no(line)),
            remark: Set(line.remark.clone()),
        });
        purchase_order_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}

/// Received quantities land at the header warehouse under the batch and source
/// given on each line.
#[async_trait]
impl StockDocument for PurchaseReceipt {
    const DOC_TYPE: DocumentType = DocumentType::PurchaseReceipt;

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
        let header = purchase_receipt_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            supplier: Set(self.supplier.clone()),
            remark: Set(self.remark.clone()),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        purchase_receipt_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| purchase_receipt_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            used: Set(LineFlag::Used.value_for(false)),
            upstream_doc_no: Set(upstream_doc_no(line)),
            upstream_line_no: Set(upstream_line_no(line)),
            remark: Set(line.remark.clone()),
        });
        purchase_receipt_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StockDocument for PurchaseReturn {
    const DOC_TYPE: DocumentType = DocumentType::PurchaseReturn;

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

    fn upstream_header_match(&self) -> Vec<(&'static str, &str)> {
        vec![("warehouse", self.warehouse.as_str())]
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let header = purchase_return_headers::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            doc_date: Set(self.doc_date),
            warehouse: Set(self.warehouse.clone()),
            supplier: Set(self.supplier.clone()),
            remark: Set(self.remark.clone()),
            actor: Set(actor.to_string()),
            created_at: Set(now),
        };
        purchase_return_headers::Entity::insert(header)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
    {
        let rows = self.lines.iter().map(|line| purchase_return_lines::ActiveModel {
            doc_no: Set(self.doc_no.clone()),
            line_no: Set(line.line_no),
            item: Set(line.item.clone()),
            batch: Set(line.batch.clone()),
            source: Set(line.source.clone()),
            quantity: Set(line.quantity),
            cancelled: Set(false),
            upstream_doc_no: Set(upstream_doc_no(line)),
            upstream_line_no: Set(upstream_line_no(line)),
            remark: Set(line.remark.clone()),
        });
        purchase_return_lines::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }
}
