use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use sea_orm::sea_query::{Alias, Expr, Query};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    db::UnitOfWork,
    errors::{LedgerStage, ServiceError, StageExt},
    models::{DocumentType, LineRef, StatusChange},
    services::{
        activity_log::ActivityLog, chain_propagator::ChainPropagator,
        ledger_writer::{LedgerWriter, ReversalSummary},
    },
};

#[derive(Debug, FromQueryResult)]
struct LineStateRow {
    line_no: i32,
    cancelled: bool,
}

#[derive(Debug, FromQueryResult)]
struct HeaderRow {
    doc_no: String,
}

#[derive(Debug, FromQueryResult)]
struct ReferenceRow {
    doc_no: String,
    upstream_line_no: Option<i32>,
}

/// What a cancellation changed.
#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub doc_type: DocumentType,
    pub doc_no: String,
    pub lines_cancelled: Vec<i32>,
    pub reversal: ReversalSummary,
    pub status_changes: Vec<StatusChange>,
}

/// Cancels document lines: flags them, reverses their ledger effects and
/// re-derives the status of every document up the chain, in one unit of work.
#[derive(Clone)]
pub struct CancellationService {
    db: Arc<DatabaseConnection>,
    ledger: LedgerWriter,
    propagator: ChainPropagator,
    activity: ActivityLog,
}

impl CancellationService {
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

    /// Cancels every live line of a document.
    #[instrument(skip(self))]
    pub async fn cancel_document(
        &self,
        doc_type: DocumentType,
        doc_no: &str,
        actor: &str,
    ) -> Result<CancellationOutcome, ServiceError> {
        let uow = UnitOfWork::begin(&self.db, "document.cancel").await?;
        let result = self.cancel_in(uow.txn(), doc_type, doc_no, None, actor).await;
        uow.finish(result).await
    }

    /// Cancels the listed lines. Lines that are already cancelled are skipped; when
    /// every listed line is, the call fails with [`ServiceError::NoChangeDetected`].
    #[instrument(skip(self))]
    pub async fn cancel_lines(
        &self,
        doc_type: DocumentType,
        doc_no: &str,
        line_nos: &[i32],
        actor: &str,
    ) -> Result<CancellationOutcome, ServiceError> {
        if line_nos.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one line number is required".to_string(),
            ));
        }
        let uow = UnitOfWork::begin(&self.db, "lines.cancel").await?;
        let result = self
            .cancel_in(uow.txn(), doc_type, doc_no, Some(line_nos), actor)
            .await;
        uow.finish(result).await
    }

    async fn cancel_in<C>(
        &self,
        conn: &C,
        doc_type: DocumentType,
        doc_no: &str,
        line_nos: Option<&[i32]>,
        actor: &str,
    ) -> Result<CancellationOutcome, ServiceError>
    where
        C: ConnectionTrait,
    {
        let backend = conn.get_database_backend();

        let header = Query::select()
            .column(Alias::new("doc_no"))
            .from(Alias::new(doc_type.header_table()))
            .and_where(Expr::col(Alias::new("doc_no")).eq(doc_no))
            .to_owned();
        if HeaderRow::find_by_statement(backend.build(&header))
            .one(conn)
            .await
            .stage(LedgerStage::Header)?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!("{doc_type} {doc_no} not found")));
        }

        let lines = Query::select()
            .column(Alias::new("line_no"))
            .column(Alias::new("cancelled"))
            .from(Alias::new(doc_type.line_table()))
            .and_where(Expr::col(Alias::new("doc_no")).eq(doc_no))
            .to_owned();
        let lines = LineStateRow::find_by_statement(backend.build(&lines))
            .all(conn)
            .await
            .stage(LedgerStage::Detail)?;

        let targets: BTreeSet<i32> = match line_nos {
            Some(requested) => {
                let requested: BTreeSet<i32> = requested.iter().copied().collect();
                if let Some(missing) = requested
                    .iter()
                    .find(|n| !lines.iter().any(|l| l.line_no == **n))
                {
                    return Err(ServiceError::NotFound(format!(
                        "{doc_type} {doc_no} line {missing} not found"
                    )));
                }
                requested
            }
            None => lines.iter().map(|l| l.line_no).collect(),
        };

        let transitioning: Vec<i32> = lines
            .iter()
            .filter(|l| targets.contains(&l.line_no) && !l.cancelled)
            .map(|l| l.line_no)
            .collect();
        if transitioning.is_empty() {
            return Err(ServiceError::NoChangeDetected(format!(
                "{doc_type} {doc_no}: nothing left to cancel"
            )));
        }

        self.ensure_not_referenced(conn, doc_type, doc_no, &transitioning)
            .await?;

        let flip = Query::update()
            .table(Alias::new(doc_type.line_table()))
            .value(Alias::new("cancelled"), true)
            .and_where(Expr::col(Alias::new("doc_no")).eq(doc_no))
            .and_where(Expr::col(Alias::new("line_no")).is_in(transitioning.iter().copied()))
            .and_where(Expr::col(Alias::new("cancelled")).eq(false))
            .to_owned();
        let flipped = conn
            .execute(backend.build(&flip))
            .await
            .stage(LedgerStage::Detail)?
            .rows_affected();
        if flipped == 0 {
            return Err(ServiceError::NoChangeDetected(format!(
                "{doc_type} {doc_no}: lines already cancelled"
            )));
        }

        let owners: Vec<LineRef> = transitioning
            .iter()
            .map(|line_no| LineRef::new(doc_type, doc_no, *line_no))
            .collect();
        let reversal = self.ledger.reverse(conn, &owners, actor).await?;

        let own = vec![doc_no.to_string()];
        let mut status_changes = self
            .propagator
            .recompute(conn, doc_type, &own)
            .await
            .stage(LedgerStage::Propagation)?;
        status_changes.extend(
            self.propagator
                .propagate_from(conn, doc_type, &own)
                .await
                .stage(LedgerStage::Propagation)?,
        );

        self.activity
            .append(
                conn,
                actor,
                doc_type.code(),
                &ActivityLog::category(doc_type, "Cancel"),
            )
            .await?;

        counter!("inventory_ledger.lines.cancelled", transitioning.len() as u64, "doc_type" => doc_type.to_string());
        info!(
            doc_type = %doc_type,
            doc_no,
            lines = transitioning.len(),
            movements = reversal.movements_cancelled,
            "Document lines cancelled"
        );

        Ok(CancellationOutcome {
            doc_type,
            doc_no: doc_no.to_string(),
            lines_cancelled: transitioning,
            reversal,
            status_changes,
        })
    }

    /// A line cannot be cancelled while a live downstream line still points at it.
    async fn ensure_not_referenced<C>(
        &self,
        conn: &C,
        doc_type: DocumentType,
        doc_no: &str,
        line_nos: &[i32],
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let Some(downstream) = doc_type.downstream() else {
            return Ok(());
        };
        let select = Query::select()
            .column(Alias::new("doc_no"))
            .column(Alias::new("upstream_line_no"))
            .from(Alias::new(downstream.line_table()))
            .and_where(Expr::col(Alias::new("cancelled")).eq(false))
            .and_where(Expr::col(Alias::new("upstream_doc_no")).eq(doc_no))
            .and_where(Expr::col(Alias::new("upstream_line_no")).is_in(line_nos.iter().copied()))
            .to_owned();
        let references = ReferenceRow::find_by_statement(conn.get_database_backend().build(&select))
            .one(conn)
            .await
            .stage(LedgerStage::Detail)?;

        match references {
            Some(reference) => {
                warn!(
                    doc_type = %doc_type,
                    doc_no,
                    referenced_by = %reference.doc_no,
                    "Cancellation blocked by downstream document"
                );
                Err(ServiceError::ConstraintViolation(format!(
                    "{doc_type} {doc_no} line {} is referenced by {downstream} {}; cancel that first",
                    reference.upstream_line_no.unwrap_or_default(),
                    reference.doc_no
                )))
            }
            None => Ok(()),
        }
    }
}
