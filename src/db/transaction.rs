/*!
 * Unit-of-work helper
 *
 * One `DatabaseTransaction` per logical ledger operation. Dropping a unit of
 * work without committing rolls it back.
 */

use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::errors::{LedgerStage, ServiceError, StageExt};

/// An open unit of work.
///
/// ```rust,ignore
/// let uow = UnitOfWork::begin(&db, "document.create").await?;
/// let result = write_everything(uow.txn()).await;
/// let value = uow.finish(result).await?;
/// ```
pub struct UnitOfWork {
    txn: DatabaseTransaction,
    operation: &'static str,
    started: Instant,
}

impl UnitOfWork {
    /// Opens a transaction on the pool.
    pub async fn begin(db: &DatabaseConnection, operation: &'static str) -> Result<Self, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        debug!(operation, "Unit of work started");
        counter!("inventory_ledger.uow.started", 1, "operation" => operation);
        Ok(Self {
            txn,
            operation,
            started: Instant::now(),
        })
    }

    pub fn txn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits on `Ok`, rolls back on `Err`, and hands the result through.
    pub async fn finish<T>(self, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        let operation = self.operation;
        let started = self.started;

        let outcome = match result {
            Ok(value) => self.txn.commit().await.stage(LedgerStage::Commit).map(|_| value),
            Err(err) => {
                if let Err(rollback_err) = self.txn.rollback().await {
                    error!(operation, error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        };

        let elapsed = started.elapsed();
        histogram!("inventory_ledger.uow.duration", elapsed, "operation" => operation);

        match &outcome {
            Ok(_) => {
                counter!("inventory_ledger.uow.committed", 1, "operation" => operation);
                info!(operation, duration = ?elapsed, "Unit of work committed");
            }
            Err(err) => {
                counter!("inventory_ledger.uow.rolled_back", 1, "operation" => operation);
                if err.is_no_change() {
                    info!(operation, duration = ?elapsed, "Unit of work rolled back: {}", err);
                } else {
                    error!(
                        operation,
                        code = err.code(),
                        stage = ?err.stage(),
                        duration = ?elapsed,
                        "Unit of work rolled back: {}",
                        err
                    );
                }
            }
        }

        outcome
    }
}
