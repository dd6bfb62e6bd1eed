use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Alias, Cond, Expr, Query, SelectStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult};
use tracing::{debug, info, instrument, warn};

use crate::{
    db::{CaseUpdate, UnitOfWork},
    errors::{LedgerStage, ServiceError, StageExt},
    models::{DocumentLine, DocumentType, FulfillmentStatus, LedgerPolicy, StatusChange},
};

#[derive(Debug, FromQueryResult)]
struct UpstreamLineRow {
    doc_no: String,
    line_no: i32,
    quantity: Decimal,
    cancelled: bool,
    flag: bool,
}

#[derive(Debug, FromQueryResult)]
struct LinkTargetRow {
    doc_no: String,
    line_no: i32,
    item: String,
    batch: String,
    source: String,
    quantity: Decimal,
    cancelled: bool,
}

#[derive(Debug, FromQueryResult)]
struct CoverageRow {
    upstream_doc_no: Option<String>,
    upstream_line_no: Option<i32>,
    covered: Option<Decimal>,
    refs: i64,
}

#[derive(Debug, FromQueryResult)]
struct HeaderStatusRow {
    doc_no: String,
    status: String,
}

#[derive(Debug, FromQueryResult)]
struct ParentRow {
    upstream_doc_no: Option<String>,
}

/// Live downstream activity against one upstream line.
#[derive(Debug, Clone, Copy, Default)]
struct Coverage {
    quantity: Decimal,
    references: i64,
}

type LineKey = (String, i32);

/// Derives header statuses and line flags of upstream documents from their live
/// downstream lines.
///
/// Statuses and flags are owned here: nothing else writes them after creation.
#[derive(Clone)]
pub struct ChainPropagator {
    db: Arc<DatabaseConnection>,
}

impl ChainPropagator {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Recomputes `doc_nos` of `upstream_type` in a unit of work of its own.
    pub async fn refresh(
        &self,
        upstream_type: DocumentType,
        doc_nos: &[String],
    ) -> Result<Vec<StatusChange>, ServiceError> {
        let uow = UnitOfWork::begin(&self.db, "chain.refresh").await?;
        let result = self.recompute(uow.txn(), upstream_type, doc_nos).await;
        uow.finish(result).await
    }

    /// One hop: re-derives line flags and header status of the given upstream documents
    /// from the lines of the next document type down the chain.
    #[instrument(skip(self, conn, doc_nos), fields(doc_type = %upstream_type, docs = doc_nos.len()))]
    pub async fn recompute<C>(
        &self,
        conn: &C,
        upstream_type: DocumentType,
        doc_nos: &[String],
    ) -> Result<Vec<StatusChange>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let Some(downstream_type) = upstream_type.downstream() else {
            return Ok(Vec::new());
        };
        let Some(flag) = upstream_type.line_flag() else {
            return Err(ServiceError::InternalError(format!(
                "{upstream_type} has downstream documents but no line flag"
            )));
        };
        if doc_nos.is_empty() {
            return Ok(Vec::new());
        }

        let mut select = Query::select();
        select
            .column(Alias::new("doc_no"))
            .column(Alias::new("line_no"))
            .column(Alias::new("quantity"))
            .column(Alias::new("cancelled"))
            .expr_as(Expr::col(Alias::new(flag.column())), Alias::new("flag"))
            .from(Alias::new(upstream_type.line_table()))
            .and_where(Expr::col(Alias::new("doc_no")).is_in(doc_nos.iter().cloned()));
        let lines = UpstreamLineRow::find_by_statement(conn.get_database_backend().build(&select))
            .all(conn)
            .await
            .stage(LedgerStage::Propagation)?;

        let coverage = self
            .coverage(conn, downstream_type, doc_nos)
            .await
            .stage(LedgerStage::Propagation)?;

        let mut flag_update = CaseUpdate::new(upstream_type.line_table(), &["doc_no", "line_no"])
            .filter(Cond::all().add(Expr::col(Alias::new("cancelled")).eq(false)));
        let mut per_document: BTreeMap<&str, Vec<(Decimal, Decimal)>> = BTreeMap::new();

        for line in lines.iter().filter(|l| !l.cancelled) {
            let covered = coverage
                .get(&(line.doc_no.clone(), line.line_no))
                .copied()
                .unwrap_or_default();

            let wanted = flag.value_for(covered.references > 0);
            if line.flag != wanted {
                flag_update.push(
                    vec![line.doc_no.as_str().into(), line.line_no.into()],
                    flag.column(),
                    Expr::value(wanted),
                );
            }

            per_document
                .entry(line.doc_no.as_str())
                .or_default()
                .push((line.quantity, covered.quantity));
        }

        let flags_written = flag_update
            .exec(conn)
            .await
            .stage(LedgerStage::Propagation)?;
        if flags_written > 0 {
            debug!(flags_written, flag = %flag, "Line flags updated");
        }

        if !upstream_type.tracks_status() {
            return Ok(Vec::new());
        }

        let current = self
            .current_statuses(conn, upstream_type, doc_nos)
            .await
            .stage(LedgerStage::Propagation)?;

        let mut changes = Vec::new();
        let mut status_update = CaseUpdate::new(upstream_type.header_table(), &["doc_no"]);
        for (doc_no, stored) in &current {
            let derived = per_document
                .get(doc_no.as_str())
                .and_then(|lines| FulfillmentStatus::derive(lines));
            let Some(next) = derived else {
                debug!(doc_no = %doc_no, "No live lines, status left unchanged");
                continue;
            };
            if *stored != Some(next) {
                status_update.push(
                    vec![doc_no.as_str().into()],
                    "status",
                    Expr::value(next.to_string()),
                );
                changes.push(StatusChange {
                    doc_type: upstream_type,
                    doc_no: doc_no.clone(),
                    from: *stored,
                    to: next,
                });
            }
        }

        status_update
            .exec(conn)
            .await
            .stage(LedgerStage::Propagation)?;

        if !changes.is_empty() {
            counter!("inventory_ledger.chain.status_changes", changes.len() as u64);
            info!(changes = changes.len(), "Header statuses propagated");
        }
        Ok(changes)
    }

    /// Cascades from documents of `downstream_type` up the chain, one hop at a time.
    #[instrument(skip(self, conn, doc_nos))]
    pub async fn propagate_from<C>(
        &self,
        conn: &C,
        downstream_type: DocumentType,
        doc_nos: &[String],
    ) -> Result<Vec<StatusChange>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut changes = Vec::new();
        let mut child_type = downstream_type;
        let mut children = doc_nos.to_vec();

        while let Some(parent_type) = child_type.upstream() {
            let parents = self
                .parents_of(conn, child_type, &children)
                .await
                .stage(LedgerStage::Propagation)?;
            if parents.is_empty() {
                break;
            }
            changes.extend(self.recompute(conn, parent_type, &parents).await?);
            child_type = parent_type;
            children = parents;
        }
        Ok(changes)
    }

    /// Checks upstream references of lines about to be created.
    ///
    /// Runs before the lines are written, so `lines` are counted on top of the
    /// already linked live quantity.
    #[instrument(skip(self, conn, lines, policy))]
    pub async fn validate_links<C>(
        &self,
        conn: &C,
        doc_type: DocumentType,
        doc_no: &str,
        lines: &[DocumentLine],
        policy: &LedgerPolicy,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let Some(upstream_type) = doc_type.upstream() else {
            if let Some(line) = lines.iter().find(|l| l.upstream.is_some()) {
                return Err(ServiceError::ConstraintViolation(format!(
                    "{doc_type} {doc_no} line {} cannot reference an upstream document",
                    line.line_no
                )));
            }
            return Ok(());
        };

        let mut requested: BTreeMap<LineKey, Decimal> = BTreeMap::new();
        for line in lines {
            match &line.upstream {
                Some(up) => {
                    *requested
                        .entry((up.doc_no.clone(), up.line_no))
                        .or_default() += line.quantity;
                }
                None if doc_type.requires_upstream() => {
                    return Err(ServiceError::ConstraintViolation(format!(
                        "{doc_type} {doc_no} line {} must reference a {upstream_type} line",
                        line.line_no
                    )));
                }
                None => {}
            }
        }
        if requested.is_empty() {
            return Ok(());
        }

        let mut parent_docs: Vec<String> = requested.keys().map(|(d, _)| d.clone()).collect();
        parent_docs.dedup();

        let mut select = Query::select();
        select
            .columns([
                Alias::new("doc_no"),
                Alias::new("line_no"),
                Alias::new("item"),
                Alias::new("batch"),
                Alias::new("source"),
                Alias::new("quantity"),
                Alias::new("cancelled"),
            ])
            .from(Alias::new(upstream_type.line_table()))
            .and_where(Expr::col(Alias::new("doc_no")).is_in(parent_docs.iter().cloned()));
        let targets: HashMap<LineKey, LinkTargetRow> =
            LinkTargetRow::find_by_statement(conn.get_database_backend().build(&select))
                .all(conn)
                .await
                .stage(LedgerStage::Detail)?
                .into_iter()
                .map(|row| ((row.doc_no.clone(), row.line_no), row))
                .collect();

        let coverage = self
            .coverage(conn, doc_type, &parent_docs)
            .await
            .stage(LedgerStage::Detail)?;

        for line in lines {
            let Some(up) = &line.upstream else { continue };
            let key = (up.doc_no.clone(), up.line_no);
            let target = targets.get(&key).ok_or_else(|| {
                ServiceError::ConstraintViolation(format!(
                    "{doc_type} {doc_no} line {} references missing {upstream_type} line {}#{}",
                    line.line_no, up.doc_no, up.line_no
                ))
            })?;
            if target.cancelled {
                return Err(ServiceError::ConstraintViolation(format!(
                    "{doc_type} {doc_no} line {} references cancelled {upstream_type} line {}#{}",
                    line.line_no, up.doc_no, up.line_no
                )));
            }
            if target.item != line.item {
                return Err(ServiceError::ConstraintViolation(format!(
                    "{doc_type} {doc_no} line {} item {} does not match {upstream_type} line item {}",
                    line.line_no, line.item, target.item
                )));
            }
            if doc_type.links_stock_identity()
                && (target.batch != line.batch || target.source != line.source)
            {
                return Err(ServiceError::ConstraintViolation(format!(
                    "{doc_type} {doc_no} line {} batch/source {}/{} does not match {upstream_type} line {}/{}",
                    line.line_no, line.batch, line.source, target.batch, target.source
                )));
            }
        }

        if policy.enforce_fulfillment_limit {
            for (key, quantity) in &requested {
                let Some(target) = targets.get(key) else { continue };
                let already = coverage.get(key).map(|c| c.quantity).unwrap_or_default();
                if already + quantity > target.quantity {
                    warn!(
                        upstream = %format!("{}#{}", key.0, key.1),
                        already = %already,
                        requested = %quantity,
                        limit = %target.quantity,
                        "Fulfillment limit exceeded"
                    );
                    return Err(ServiceError::ConstraintViolation(format!(
                        "{upstream_type} line {}#{} allows {}, already linked {}, requested {}",
                        key.0, key.1, target.quantity, already, quantity
                    )));
                }
            }
        }
        Ok(())
    }

    /// Checks that every upstream header referenced by `lines` holds the `expected`
    /// column values, e.g. that a receive books stock where its transfer sent it.
    #[instrument(skip(self, conn, lines, expected))]
    pub async fn validate_header_links<C>(
        &self,
        conn: &C,
        doc_type: DocumentType,
        doc_no: &str,
        lines: &[DocumentLine],
        expected: &[(&'static str, &str)],
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let Some(upstream_type) = doc_type.upstream() else {
            return Ok(());
        };
        let parents: BTreeSet<&str> = lines
            .iter()
            .filter_map(|line| line.upstream.as_ref())
            .map(|up| up.doc_no.as_str())
            .collect();
        if expected.is_empty() || parents.is_empty() {
            return Ok(());
        }

        let mut select = Query::select();
        select
            .column(Alias::new("doc_no"))
            .from(Alias::new(upstream_type.header_table()))
            .and_where(
                Expr::col(Alias::new("doc_no")).is_in(parents.iter().map(|d| d.to_string())),
            );
        for (column, _) in expected {
            select.column(Alias::new(*column));
        }
        let rows = conn
            .query_all(conn.get_database_backend().build(&select))
            .await
            .stage(LedgerStage::Detail)?;

        for row in rows {
            let parent: String = row.try_get("", "doc_no").stage(LedgerStage::Detail)?;
            for (column, wanted) in expected {
                let actual: String = row.try_get("", column).stage(LedgerStage::Detail)?;
                if actual != *wanted {
                    warn!(%parent, %column, %actual, %wanted, "Upstream header mismatch");
                    return Err(ServiceError::ConstraintViolation(format!(
                        "{doc_type} {doc_no} expects {upstream_type} {parent} {column} {wanted}, found {actual}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Live downstream quantity and reference count per upstream line of `parent_docs`.
    async fn coverage<C>(
        &self,
        conn: &C,
        downstream_type: DocumentType,
        parent_docs: &[String],
    ) -> Result<HashMap<LineKey, Coverage>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut select = Query::select();
        select
            .column(Alias::new("upstream_doc_no"))
            .column(Alias::new("upstream_line_no"))
            .expr_as(Expr::col(Alias::new("quantity")).sum(), Alias::new("covered"))
            .expr_as(Expr::col(Alias::new("line_no")).count(), Alias::new("refs"))
            .from(Alias::new(downstream_type.line_table()))
            .and_where(Expr::col(Alias::new("cancelled")).eq(false))
            .and_where(Expr::col(Alias::new("upstream_doc_no")).is_in(parent_docs.iter().cloned()))
            .group_by_col(Alias::new("upstream_doc_no"))
            .group_by_col(Alias::new("upstream_line_no"));

        let rows = CoverageRow::find_by_statement(conn.get_database_backend().build(&select))
            .all(conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let doc_no = row.upstream_doc_no?;
                let line_no = row.upstream_line_no?;
                Some((
                    (doc_no, line_no),
                    Coverage {
                        quantity: row.covered.unwrap_or_default(),
                        references: row.refs,
                    },
                ))
            })
            .collect())
    }

    async fn current_statuses<C>(
        &self,
        conn: &C,
        doc_type: DocumentType,
        doc_nos: &[String],
    ) -> Result<BTreeMap<String, Option<FulfillmentStatus>>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut select = Query::select();
        select
            .column(Alias::new("doc_no"))
            .column(Alias::new("status"))
            .from(Alias::new(doc_type.header_table()))
            .and_where(Expr::col(Alias::new("doc_no")).is_in(doc_nos.iter().cloned()));

        let rows = HeaderStatusRow::find_by_statement(conn.get_database_backend().build(&select))
            .all(conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.doc_no, FulfillmentStatus::from_str(&row.status).ok()))
            .collect())
    }

    /// Distinct upstream document numbers referenced by any line (live or cancelled)
    /// of the given documents.
    async fn parents_of<C>(
        &self,
        conn: &C,
        child_type: DocumentType,
        children: &[String],
    ) -> Result<Vec<String>, ServiceError>
    where
        C: ConnectionTrait,
    {
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let select: SelectStatement = Query::select()
            .distinct()
            .column(Alias::new("upstream_doc_no"))
            .from(Alias::new(child_type.line_table()))
            .and_where(Expr::col(Alias::new("doc_no")).is_in(children.iter().cloned()))
            .and_where(Expr::col(Alias::new("upstream_doc_no")).is_not_null())
            .to_owned();

        let mut parents: Vec<String> =
            ParentRow::find_by_statement(conn.get_database_backend().build(&select))
                .all(conn)
                .await?
                .into_iter()
                .filter_map(|row| row.upstream_doc_no)
                .collect();
        parents.sort();
        parents.dedup();
        Ok(parents)
    }
}
