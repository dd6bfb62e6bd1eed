use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Alias, Cond, Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, EntityName, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    db::{CaseUpdate, UnitOfWork},
    entities::{
        history_of_stock::{self, Entity as HistoryEntity},
        movement_log::{self, Entity as MovementEntity},
        stock_summary::{self, Entity as SummaryEntity},
    },
    errors::{LedgerStage, ServiceError, StageExt},
    models::{Direction, LedgerPolicy, LineRef, MovementIntent, StockCounters, StockKey},
};

/// (item, batch, source): the identity tracked by `history_of_stock`.
type Identity = (String, String, String);

fn identity_of(key: &StockKey) -> Identity {
    (key.item.clone(), key.batch.clone(), key.source.clone())
}

/// What a posting wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostingSummary {
    pub movements: usize,
    pub summary_rows_created: usize,
    pub summary_rows_updated: usize,
    pub history_rows_created: usize,
    pub history_rows_reactivated: usize,
}

/// What a reversal touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReversalSummary {
    pub movements_cancelled: u64,
    pub summary_rows_adjusted: u64,
    pub history_rows_cancelled: u64,
    pub history_rows_reassigned: u64,
}

impl ReversalSummary {
    pub fn is_empty(&self) -> bool {
        self.movements_cancelled == 0
    }
}

/// Writes movement log rows, stock summary deltas and history registry rows.
///
/// Every method taking a connection runs inside the caller's unit of work.
#[derive(Clone)]
pub struct LedgerWriter {
    db: Arc<DatabaseConnection>,
    policy: LedgerPolicy,
}

impl LedgerWriter {
    pub fn new(db: Arc<DatabaseConnection>, policy: LedgerPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Posts `intents` in a unit of work of its own.
    pub async fn post_movements(
        &self,
        intents: &[MovementIntent],
        actor: &str,
    ) -> Result<PostingSummary, ServiceError> {
        let uow = UnitOfWork::begin(&self.db, "ledger.post").await?;
        let result = self.post(uow.txn(), intents, actor).await;
        uow.finish(result).await
    }

    /// Posts movement intents: summary deltas, then movement rows, then history rows.
    #[instrument(skip(self, conn, intents), fields(intents = intents.len()))]
    pub async fn post<C>(
        &self,
        conn: &C,
        intents: &[MovementIntent],
        actor: &str,
    ) -> Result<PostingSummary, ServiceError>
    where
        C: ConnectionTrait,
    {
        if intents.is_empty() {
            return Ok(PostingSummary::default());
        }
        for intent in intents {
            if intent.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "movement quantity for {} must be positive, got {}",
                    intent.owner, intent.quantity
                )));
            }
        }

        let now = Utc::now();
        let mut summary = PostingSummary::default();

        self.ensure_known_identities(conn, intents)
            .await
            .stage(LedgerStage::History)?;

        let (created, updated) = self
            .apply_summary_deltas(conn, intents, actor, now)
            .await
            .stage(LedgerStage::Summary)?;
        summary.summary_rows_created = created;
        summary.summary_rows_updated = updated;

        let rows: Vec<movement_log::ActiveModel> = intents
            .iter()
            .map(|intent| {
                let (qty_in, qty_in2, qty_out) = intent.direction.channels(intent.quantity);
                movement_log::ActiveModel {
                    id: NotSet,
                    doc_type: Set(intent.owner.doc_type.to_string()),
                    doc_no: Set(intent.owner.doc_no.clone()),
                    line_no: Set(intent.owner.line_no),
                    cancelled: Set(false),
                    doc_date: Set(intent.doc_date),
                    warehouse: Set(intent.key.warehouse.clone()),
                    source: Set(intent.key.source.clone()),
                    item: Set(intent.key.item.clone()),
                    batch: Set(intent.key.batch.clone()),
                    qty_in: Set(qty_in),
                    qty_in2: Set(qty_in2),
                    qty_out: Set(qty_out),
                    remark: Set(intent.remark.clone()),
                    actor: Set(actor.to_string()),
                    created_at: Set(now),
                }
            })
            .collect();
        MovementEntity::insert_many(rows)
            .exec(conn)
            .await
            .stage(LedgerStage::Movement)?;
        summary.movements = intents.len();

        let (created, reactivated) = self
            .register_history(conn, intents, actor, now)
            .await
            .stage(LedgerStage::History)?;
        summary.history_rows_created = created;
        summary.history_rows_reactivated = reactivated;

        counter!("inventory_ledger.movements.posted", intents.len() as u64);
        debug!(?summary, "Movements posted");
        Ok(summary)
    }

    /// Outbound stock must come from an identity the registry knows about. Only a
    /// receipt in the same posting may introduce one; a transfer-in leg does not.
    async fn ensure_known_identities<C>(
        &self,
        conn: &C,
        intents: &[MovementIntent],
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let introduced: HashSet<Identity> = intents
            .iter()
            .filter(|i| i.direction == Direction::Received)
            .map(|i| identity_of(&i.key))
            .collect();
        let required: BTreeSet<Identity> = intents
            .iter()
            .filter(|i| !i.direction.is_inbound())
            .map(|i| identity_of(&i.key))
            .filter(|identity| !introduced.contains(identity))
            .collect();

        for (item, batch, source) in required {
            let known = HistoryEntity::find()
                .filter(history_of_stock::Column::Item.eq(item.as_str()))
                .filter(history_of_stock::Column::Batch.eq(batch.as_str()))
                .filter(history_of_stock::Column::Source.eq(source.as_str()))
                .filter(history_of_stock::Column::Cancelled.eq(false))
                .one(conn)
                .await?;
            if known.is_none() {
                warn!(%item, %batch, %source, "Outbound movement for unknown batch");
                return Err(ServiceError::ConstraintViolation(format!(
                    "unknown batch {batch} of item {item} from source {source}"
                )));
            }
        }
        Ok(())
    }

    async fn apply_summary_deltas<C>(
        &self,
        conn: &C,
        intents: &[MovementIntent],
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut deltas: BTreeMap<StockKey, StockCounters> = BTreeMap::new();
        for intent in intents {
            deltas
                .entry(intent.key.clone())
                .or_default()
                .record(intent.direction, intent.quantity);
        }

        let mut created = 0;
        let mut updated = 0;
        for (key, delta) in deltas {
            match find_summary(conn, &key).await? {
                Some(existing) => {
                    let after = existing.counters() + delta;
                    self.check_not_negative(&key, &after, delta.removes_stock())?;

                    SummaryEntity::update_many()
                        .col_expr(
                            stock_summary::Column::Received,
                            Expr::col(stock_summary::Column::Received).add(delta.received),
                        )
                        .col_expr(
                            stock_summary::Column::TransferredIn,
                            Expr::col(stock_summary::Column::TransferredIn)
                                .add(delta.transferred_in),
                        )
                        .col_expr(
                            stock_summary::Column::Consumed,
                            Expr::col(stock_summary::Column::Consumed).add(delta.consumed),
                        )
                        .col_expr(stock_summary::Column::Actor, Expr::value(actor))
                        .col_expr(stock_summary::Column::UpdatedAt, Expr::value(now))
                        .filter(stock_summary::Column::Id.eq(existing.id))
                        .exec(conn)
                        .await?;
                    updated += 1;
                }
                None => {
                    self.check_not_negative(&key, &delta, delta.removes_stock())?;

                    stock_summary::ActiveModel {
                        id: NotSet,
                        warehouse: Set(key.warehouse.clone()),
                        source: Set(key.source.clone()),
                        item: Set(key.item.clone()),
                        batch: Set(key.batch.clone()),
                        received: Set(delta.received),
                        transferred_in: Set(delta.transferred_in),
                        consumed: Set(delta.consumed),
                        actor: Set(actor.to_string()),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(conn)
                    .await?;
                    created += 1;
                }
            }
        }
        Ok((created, updated))
    }

    fn check_not_negative(
        &self,
        key: &StockKey,
        after: &StockCounters,
        takes_stock: bool,
    ) -> Result<(), ServiceError> {
        if takes_stock && !self.policy.allow_negative_stock && after.available() < Decimal::ZERO {
            warn!(%key, available = %after.available(), "Posting would drive stock negative");
            return Err(ServiceError::InsufficientStock(format!(
                "{key} would drop to {}",
                after.available()
            )));
        }
        Ok(())
    }

    /// Creates or re-activates the registry row for every inbound identity.
    async fn register_history<C>(
        &self,
        conn: &C,
        intents: &[MovementIntent],
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut owners: BTreeMap<Identity, &LineRef> = BTreeMap::new();
        for intent in intents.iter().filter(|i| i.direction.is_inbound()) {
            owners.entry(identity_of(&intent.key)).or_insert(&intent.owner);
        }

        let mut created = 0;
        let mut reactivated = 0;
        for ((item, batch, source), owner) in owners {
            let existing = HistoryEntity::find()
                .filter(history_of_stock::Column::Item.eq(item.as_str()))
                .filter(history_of_stock::Column::Batch.eq(batch.as_str()))
                .filter(history_of_stock::Column::Source.eq(source.as_str()))
                .one(conn)
                .await?;
            match existing {
                Some(row) if row.cancelled => {
                    let mut active: history_of_stock::ActiveModel = row.into();
                    active.cancelled = Set(false);
                    active.doc_type = Set(owner.doc_type.to_string());
                    active.doc_no = Set(owner.doc_no.clone());
                    active.line_no = Set(owner.line_no);
                    active.actor = Set(actor.to_string());
                    active.update(conn).await?;
                    reactivated += 1;
                }
                Some(_) => {}
                None => {
                    history_of_stock::ActiveModel {
                        id: NotSet,
                        item: Set(item),
                        batch: Set(batch),
                        source: Set(source),
                        cancelled: Set(false),
                        doc_type: Set(owner.doc_type.to_string()),
                        doc_no: Set(owner.doc_no.clone()),
                        line_no: Set(owner.line_no),
                        actor: Set(actor.to_string()),
                        created_at: Set(now),
                    }
                    .insert(conn)
                    .await?;
                    created += 1;
                }
            }
        }
        Ok((created, reactivated))
    }

    /// Reverses everything posted for `owners`.
    ///
    /// Summary counters are reduced by exactly what the live movement rows added, in one
    /// CASE update keyed by (warehouse, source, item, batch). Movement and history rows are
    /// flagged, never deleted. Owner lines with no live movements are skipped, so reversing
    /// twice is a no-op.
    #[instrument(skip(self, conn, owners), fields(owners = owners.len()))]
    pub async fn reverse<C>(
        &self,
        conn: &C,
        owners: &[LineRef],
        actor: &str,
    ) -> Result<ReversalSummary, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut summary = ReversalSummary::default();
        if owners.is_empty() {
            return Ok(summary);
        }
        let now = Utc::now();

        let movements = MovementEntity::find()
            .filter(owner_condition(owners))
            .filter(movement_log::Column::Cancelled.eq(false))
            .order_by_asc(movement_log::Column::Id)
            .all(conn)
            .await
            .stage(LedgerStage::Movement)?;
        if movements.is_empty() {
            debug!("Nothing to reverse");
            return Ok(summary);
        }

        let mut deltas: BTreeMap<StockKey, StockCounters> = BTreeMap::new();
        for row in &movements {
            deltas
                .entry(StockKey::new(&row.warehouse, &row.source, &row.item, &row.batch))
                .or_default()
                .add_movement(row.qty_in, row.qty_in2, row.qty_out);
        }

        let mut update = CaseUpdate::new(
            stock_summary::Entity.table_name(),
            &["warehouse", "source", "item", "batch"],
        );
        for (key, delta) in &deltas {
            let existing = find_summary(conn, key)
                .await
                .stage(LedgerStage::Summary)?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "stock summary row for {key} is missing while live movements exist"
                    ))
                })?;
            let after = existing.counters() - *delta;
            self.check_not_negative(key, &after, delta.inbound() > Decimal::ZERO)?;

            let row_key = vec![
                key.warehouse.as_str().into(),
                key.source.as_str().into(),
                key.item.as_str().into(),
                key.batch.as_str().into(),
            ];
            for (column, amount) in [
                ("received", delta.received),
                ("transferred_in", delta.transferred_in),
                ("consumed", delta.consumed),
            ] {
                if !amount.is_zero() {
                    update.push(
                        row_key.clone(),
                        column,
                        Expr::col(Alias::new(column)).sub(amount),
                    );
                }
            }
            update.push(row_key.clone(), "actor", Expr::value(actor));
            update.push(row_key, "updated_at", Expr::value(now));
        }
        summary.summary_rows_adjusted = update
            .exec(conn)
            .await
            .stage(LedgerStage::Summary)?;
        if summary.summary_rows_adjusted != deltas.len() as u64 {
            return Err(ServiceError::InternalError(format!(
                "expected to adjust {} stock summary rows, adjusted {}",
                deltas.len(),
                summary.summary_rows_adjusted
            )));
        }

        let ids: Vec<i64> = movements.iter().map(|m| m.id).collect();
        summary.movements_cancelled = MovementEntity::update_many()
            .col_expr(movement_log::Column::Cancelled, Expr::value(true))
            .filter(movement_log::Column::Id.is_in(ids))
            .filter(movement_log::Column::Cancelled.eq(false))
            .exec(conn)
            .await
            .stage(LedgerStage::Movement)?
            .rows_affected;

        let (cancelled, reassigned) = self
            .release_history(conn, owners)
            .await
            .stage(LedgerStage::History)?;
        summary.history_rows_cancelled = cancelled;
        summary.history_rows_reassigned = reassigned;

        counter!(
            "inventory_ledger.movements.reversed",
            summary.movements_cancelled
        );
        info!(?summary, "Ledger reversal applied");
        Ok(summary)
    }

    /// Registry rows owned by reversed lines follow them into cancellation, unless another
    /// live inbound movement still carries the identity, which then takes ownership.
    async fn release_history<C>(
        &self,
        conn: &C,
        owners: &[LineRef],
    ) -> Result<(u64, u64), ServiceError>
    where
        C: ConnectionTrait,
    {
        let owned = HistoryEntity::find()
            .filter(owner_condition(owners))
            .filter(history_of_stock::Column::Cancelled.eq(false))
            .all(conn)
            .await?;

        let mut cancelled = 0;
        let mut reassigned = 0;
        for row in owned {
            let successor = MovementEntity::find()
                .filter(movement_log::Column::Item.eq(row.item.as_str()))
                .filter(movement_log::Column::Batch.eq(row.batch.as_str()))
                .filter(movement_log::Column::Source.eq(row.source.as_str()))
                .filter(movement_log::Column::Cancelled.eq(false))
                .filter(
                    Cond::any()
                        .add(movement_log::Column::QtyIn.gt(Decimal::ZERO))
                        .add(movement_log::Column::QtyIn2.gt(Decimal::ZERO)),
                )
                .order_by_asc(movement_log::Column::Id)
                .one(conn)
                .await?;

            let mut active: history_of_stock::ActiveModel = row.into();
            match successor {
                Some(movement) => {
                    active.doc_type = Set(movement.doc_type);
                    active.doc_no = Set(movement.doc_no);
                    active.line_no = Set(movement.line_no);
                    reassigned += 1;
                }
                None => {
                    active.cancelled = Set(true);
                    cancelled += 1;
                }
            }
            active.update(conn).await?;
        }
        Ok((cancelled, reassigned))
    }
}

async fn find_summary<C>(
    conn: &C,
    key: &StockKey,
) -> Result<Option<stock_summary::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(SummaryEntity::find()
        .filter(stock_summary::Column::Warehouse.eq(key.warehouse.as_str()))
        .filter(stock_summary::Column::Source.eq(key.source.as_str()))
        .filter(stock_summary::Column::Item.eq(key.item.as_str()))
        .filter(stock_summary::Column::Batch.eq(key.batch.as_str()))
        .one(conn)
        .await?)
}

/// Matches rows owned by any of `owners` through their doc_type/doc_no/line_no columns.
fn owner_condition(owners: &[LineRef]) -> Condition {
    owners.iter().fold(Cond::any(), |cond, owner| {
        cond.add(
            Cond::all()
                .add(Expr::col(Alias::new("doc_type")).eq(owner.doc_type.to_string()))
                .add(Expr::col(Alias::new("doc_no")).eq(owner.doc_no.as_str()))
                .add(Expr::col(Alias::new("line_no")).eq(owner.line_no)),
        )
    })
}
