// Ledger engines
pub mod activity_log;
pub mod chain_propagator;
pub mod ledger_writer;

// Document workflows
pub mod cancellation;
pub mod documents;

// Read side
pub mod stock_queries;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::models::LedgerPolicy;
use activity_log::ActivityLog;
use cancellation::CancellationService;
use chain_propagator::ChainPropagator;
use documents::DocumentService;
use ledger_writer::LedgerWriter;
use stock_queries::StockQueryService;

/// Service container wiring the engines to one shared connection pool.
#[derive(Clone)]
pub struct LedgerServices {
    pub ledger: LedgerWriter,
    pub propagator: ChainPropagator,
    pub activity: ActivityLog,
    pub documents: DocumentService,
    pub cancellations: CancellationService,
    pub stock: StockQueryService,
    db: Arc<DatabaseConnection>,
}

impl LedgerServices {
    /// Creates every service with the given pool and stock policy
    pub fn new(db: Arc<DatabaseConnection>, policy: LedgerPolicy) -> Self {
        let ledger = LedgerWriter::new(db.clone(), policy);
        let propagator = ChainPropagator::new(db.clone());
        let activity = ActivityLog::new();

        Self {
            documents: DocumentService::new(
                db.clone(),
                ledger.clone(),
                propagator.clone(),
                activity.clone(),
            ),
            cancellations: CancellationService::new(
                db.clone(),
                ledger.clone(),
                propagator.clone(),
                activity.clone(),
            ),
            stock: StockQueryService::new(db.clone()),
            ledger,
            propagator,
            activity,
            db,
        }
    }

    /// Gets a reference to the database pool
    pub fn db(&self) -> &Arc<DatabaseConnection> {
        &self.db
    }
}
