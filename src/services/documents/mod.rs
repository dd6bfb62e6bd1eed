//! Document creation: one generic write path shared by every document type.
//!
//! Each payload type implements [`StockDocument`], which says how its header and
//! lines are stored and which stock movements it causes. [`DocumentService::create`]
//! runs the rest: header, chain checks, lines, ledger posting, status propagation
//! and the activity entry, all in one unit of work.

mod procurement;
mod stock;
mod transfer;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Alias, Expr, Query};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult};
use serde::Serialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    db::UnitOfWork,
    errors::{LedgerStage, ServiceError, StageExt},
    models::{
        Direction, DirectDelivery, DirectReceipt, DocumentLine, DocumentType, LineRef,
        MaterialReceive, MaterialRequest, MaterialTransfer, MovementIntent, PurchaseOrder,
        PurchaseOrderRequest, PurchaseReceipt, PurchaseReturn, StatusChange, StockAdjustment,
        StockKey, StockMutation,
    },
    services::{
        activity_log::ActivityLog,
        chain_propagator::ChainPropagator,
        ledger_writer::{LedgerWriter, PostingSummary},
    },
};

/// A document payload the service knows how to store and post.
#[async_trait]
pub trait StockDocument: Validate + Serialize + Send + Sync {
    const DOC_TYPE: DocumentType;

    fn doc_no(&self) -> &str;

    fn doc_date(&self) -> NaiveDate;

    fn lines(&self) -> &[DocumentLine];

    /// Whether line quantities carry a sign. Only stock adjustments do.
    fn signed_quantities() -> bool {
        false
    }

    /// Ledger movements caused by the document. Empty for documents that only
    /// take part in the chain.
    fn movement_intents(&self) -> Vec<MovementIntent> {
        Vec::new()
    }

    /// Header columns of every referenced upstream document that must hold the given
    /// values, as `(column, value)` pairs.
    fn upstream_header_match(&self) -> Vec<(&'static str, &str)> {
        Vec::new()
    }

    async fn insert_header<C>(&self, conn: &C, actor: &str, now: DateTime<Utc>) -> Result<(), DbErr>
    where
        C: ConnectionTrait;

    async fn insert_lines<C>(&self, conn: &C) -> Result<(), DbErr>
    where
        C: ConnectionTrait;
}

/// A stored document together with what storing it changed.
#[derive(Debug, Clone, Serialize)]
pub struct Posted<D> {
    pub document: D,
    pub actor: String,
    pub posted_at: DateTime<Utc>,
    pub posting: PostingSummary,
    pub status_changes: Vec<StatusChange>,
}

#[derive(Debug, FromQueryResult)]
struct ExistingHeader {
    doc_no: String,
}

/// Movement for one line of a document, keyed at `warehouse`.
pub(crate) fn line_intent(
    doc_type: DocumentType,
    doc_no: &str,
    doc_date: NaiveDate,
    warehouse: &str,
    line: &DocumentLine,
    direction: Direction,
) -> MovementIntent {
    MovementIntent::new(
        direction,
        StockKey::new(warehouse, &line.source, &line.item, &line.batch),
        line.quantity.abs(),
        LineRef::new(doc_type, doc_no, line.line_no),
        doc_date,
    )
    .with_remark(line.remark.clone())
}

#[derive(Clone)]
pub struct DocumentService {
    db: Arc<DatabaseConnection>,
    ledger: LedgerWriter,
    propagator: ChainPropagator,
    activity: ActivityLog,
}

impl DocumentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        ledger: LedgerWriter,
        propagator: ChainPropagator,
        activity: ActivityLog,
    ) -> Self {
        Self {
            db,
            ledger,
            propagator,
            activity,
        }
    }

    /// Creates a document and applies all of its effects atomically.
    #[instrument(skip(self, document), fields(doc_type = %D::DOC_TYPE, doc_no = %document.doc_no()))]
    pub async fn create<D>(&self, document: D, actor: &str) -> Result<Posted<D>, ServiceError>
    where
        D: StockDocument,
    {
        Self::check(&document)?;

        let started = std::time::Instant::now();
        let uow = UnitOfWork::begin(&self.db, "document.create").await?;
        let result = self.create_in(uow.txn(), &document, actor).await;
        let (posting, status_changes, posted_at) = uow.finish(result).await?;

        counter!("inventory_ledger.documents.created", 1, "doc_type" => D::DOC_TYPE.to_string());
        histogram!("inventory_ledger.documents.create_duration", started.elapsed());
        info!(
            movements = posting.movements,
            status_changes = status_changes.len(),
            "Document created"
        );

        Ok(Posted {
            document,
            actor: actor.to_string(),
            posted_at,
            posting,
            status_changes,
        })
    }

    /// Payload checks that need no store access.
    fn check<D: StockDocument>(document: &D) -> Result<(), ServiceError> {
        document.validate()?;

        let mut seen = HashSet::new();
        for line in document.lines() {
            line.validate()?;
            if !seen.insert(line.line_no) {
                return Err(ServiceError::ValidationError(format!(
                    "{} {} has line {} more than once",
                    D::DOC_TYPE,
                    document.doc_no(),
                    line.line_no
                )));
            }
            if !D::signed_quantities() && line.quantity < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "{} {} line {} has a negative quantity",
                    D::DOC_TYPE,
                    document.doc_no(),
                    line.line_no
                )));
            }
        }
        Ok(())
    }

    async fn create_in<C, D>(
        &self,
        conn: &C,
        document: &D,
        actor: &str,
    ) -> Result<(PostingSummary, Vec<StatusChange>, DateTime<Utc>), ServiceError>
    where
        C: ConnectionTrait,
        D: StockDocument,
    {
        let doc_type = D::DOC_TYPE;
        let doc_no = document.doc_no();
        let now = Utc::now();

        let existing = Query::select()
            .column(Alias::new("doc_no"))
            .from(Alias::new(doc_type.header_table()))
            .and_where(Expr::col(Alias::new("doc_no")).eq(doc_no))
            .to_owned();
        if let Some(row) = ExistingHeader::find_by_statement(conn.get_database_backend().build(&existing))
            .one(conn)
            .await
            .stage(LedgerStage::Header)?
        {
            return Err(ServiceError::ConstraintViolation(format!(
                "{doc_type} {} already exists",
                row.doc_no
            )));
        }

        document
            .insert_header(conn, actor, now)
            .await
            .stage(LedgerStage::Header)?;

        self.propagator
            .validate_links(conn, doc_type, doc_no, document.lines(), &self.ledger.policy())
            .await?;
        self.propagator
            .validate_header_links(
                conn,
                doc_type,
                doc_no,
                document.lines(),
                &document.upstream_header_match(),
            )
            .await?;

        document.insert_lines(conn).await.stage(LedgerStage::Detail)?;

        let posting = self
            .ledger
            .post(conn, &document.movement_intents(), actor)
            .await?;

        let status_changes = self
            .propagator
            .propagate_from(conn, doc_type, &[doc_no.to_string()])
            .await
            .stage(LedgerStage::Propagation)?;

        self.activity
            .append(
                conn,
                actor,
                doc_type.code(),
                &ActivityLog::category(doc_type, "Create"),
            )
            .await?;

        Ok((posting, status_changes, now))
    }

    pub async fn create_material_request(
        &self,
        document: MaterialRequest,
        actor: &str,
    ) -> Result<Posted<MaterialRequest>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_purchase_order_request(
        &self,
        document: PurchaseOrderRequest,
        actor: &str,
    ) -> Result<Posted<PurchaseOrderRequest>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_purchase_order(
        &self,
        document: PurchaseOrder,
        actor: &str,
    ) -> Result<Posted<PurchaseOrder>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_purchase_receipt(
        &self,
        document: PurchaseReceipt,
        actor: &str,
    ) -> Result<Posted<PurchaseReceipt>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_purchase_return(
        &self,
        document: PurchaseReturn,
        actor: &str,
    ) -> Result<Posted<PurchaseReturn>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_material_transfer(
        &self,
        document: MaterialTransfer,
        actor: &str,
    ) -> Result<Posted<MaterialTransfer>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_material_receive(
        &self,
        document: MaterialReceive,
        actor: &str,
    ) -> Result<Posted<MaterialReceive>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_stock_adjustment(
        &self,
        document: StockAdjustment,
        actor: &str,
    ) -> Result<Posted<StockAdjustment>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_stock_mutation(
        &self,
        document: StockMutation,
        actor: &str,
    ) -> Result<Posted<StockMutation>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_direct_receipt(
        &self,
        document: DirectReceipt,
        actor: &str,
    ) -> Result<Posted<DirectReceipt>, ServiceError> {
        self.create(document, actor).await
    }

    pub async fn create_direct_delivery(
        &self,
        document: DirectDelivery,
        actor: &str,
    ) -> Result<Posted<DirectDelivery>, ServiceError> {
        self.create(document, actor).await
    }
}
