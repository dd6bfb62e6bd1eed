use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    entities::{history_of_stock, movement_log, stock_summary},
    errors::ServiceError,
    models::{DocumentType, StockCounters, StockKey},
};

/// A summary row whose counters disagree with the sum of its live movements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceDrift {
    pub key: StockKey,
    pub summary: StockCounters,
    pub movements: StockCounters,
}

/// Read side of the ledger.
#[derive(Clone)]
pub struct StockQueryService {
    db: Arc<DatabaseConnection>,
}

impl StockQueryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn summary(&self, key: &StockKey) -> Result<Option<stock_summary::Model>, ServiceError> {
        Ok(stock_summary::Entity::find()
            .filter(stock_summary::Column::Warehouse.eq(key.warehouse.as_str()))
            .filter(stock_summary::Column::Source.eq(key.source.as_str()))
            .filter(stock_summary::Column::Item.eq(key.item.as_str()))
            .filter(stock_summary::Column::Batch.eq(key.batch.as_str()))
            .one(&*self.db)
            .await?)
    }

    /// Available quantity for a stock key; zero when the key was never posted.
    pub async fn available(&self, key: &StockKey) -> Result<Decimal, ServiceError> {
        Ok(self
            .summary(key)
            .await?
            .map(|row| row.available())
            .unwrap_or_default())
    }

    pub async fn warehouse_stock(
        &self,
        warehouse: &str,
    ) -> Result<Vec<stock_summary::Model>, ServiceError> {
        Ok(stock_summary::Entity::find()
            .filter(stock_summary::Column::Warehouse.eq(warehouse))
            .order_by_asc(stock_summary::Column::Item)
            .order_by_asc(stock_summary::Column::Batch)
            .order_by_asc(stock_summary::Column::Source)
            .all(&*self.db)
            .await?)
    }

    /// Movement rows owned by a document, cancelled ones included.
    pub async fn movements_for(
        &self,
        doc_type: DocumentType,
        doc_no: &str,
    ) -> Result<Vec<movement_log::Model>, ServiceError> {
        Ok(movement_log::Entity::find()
            .filter(movement_log::Column::DocType.eq(doc_type.to_string()))
            .filter(movement_log::Column::DocNo.eq(doc_no))
            .order_by_asc(movement_log::Column::LineNo)
            .order_by_asc(movement_log::Column::Id)
            .all(&*self.db)
            .await?)
    }

    pub async fn history(
        &self,
        item: &str,
        batch: &str,
        source: &str,
    ) -> Result<Option<history_of_stock::Model>, ServiceError> {
        Ok(history_of_stock::Entity::find()
            .filter(history_of_stock::Column::Item.eq(item))
            .filter(history_of_stock::Column::Batch.eq(batch))
            .filter(history_of_stock::Column::Source.eq(source))
            .one(&*self.db)
            .await?)
    }

    /// Recomputes every key from the live movement log and reports the keys whose
    /// summary counters differ. An empty result means the ledger balances.
    #[instrument(skip(self))]
    pub async fn verify_balances(&self) -> Result<Vec<BalanceDrift>, ServiceError> {
        let mut expected: BTreeMap<StockKey, StockCounters> = BTreeMap::new();
        let movements = movement_log::Entity::find()
            .filter(movement_log::Column::Cancelled.eq(false))
            .all(&*self.db)
            .await?;
        for row in movements {
            let key = StockKey::new(&row.warehouse, &row.source, &row.item, &row.batch);
            expected
                .entry(key)
                .or_default()
                .add_movement(row.qty_in, row.qty_in2, row.qty_out);
        }

        let mut drifts = Vec::new();
        for row in stock_summary::Entity::find().all(&*self.db).await? {
            let key = row.key();
            let summary = row.counters();
            let movements = expected.remove(&key).unwrap_or_default();
            if summary != movements {
                drifts.push(BalanceDrift {
                    key,
                    summary,
                    movements,
                });
            }
        }
        // Live movements with no summary row at all.
        for (key, movements) in expected {
            if !movements.is_zero() {
                drifts.push(BalanceDrift {
                    key,
                    summary: StockCounters::default(),
                    movements,
                });
            }
        }

        if !drifts.is_empty() {
            warn!(drifts = drifts.len(), "Stock summary drift detected");
        }
        Ok(drifts)
    }
}
