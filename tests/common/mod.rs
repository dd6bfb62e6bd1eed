#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Statement};

use inventory_ledger::{
    config::AppConfig,
    db,
    entities::{activity_log, history_of_stock, movement_log},
    models::{
        DeliveryKind, DirectDelivery, DirectReceipt, DocumentLine, LedgerPolicy, MaterialReceive,
        MaterialTransfer, PurchaseOrder, PurchaseReceipt, PurchaseReturn, ReceiptKind,
        StockCounters, StockKey,
    },
    services::LedgerServices,
};

pub const ACTOR: &str = "tester";
pub const WH: &str = "WH1";
pub const WH2: &str = "WH2";
pub const SUPPLIER: &str = "ACME";

/// Services wired to a fresh in-memory SQLite database with the real schema.
pub struct TestLedger {
    pub services: LedgerServices,
    pub db: Arc<DatabaseConnection>,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::with_policy(LedgerPolicy::default()).await
    }

    pub async fn with_policy(policy: LedgerPolicy) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.auto_migrate = true;
        // One connection: every connection to `sqlite::memory:` is its own database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        let db = Arc::new(pool);

        Self {
            services: LedgerServices::new(db.clone(), policy),
            db,
        }
    }

    pub async fn counters(&self, key: &StockKey) -> StockCounters {
        self.services
            .stock
            .summary(key)
            .await
            .expect("summary lookup")
            .map(|row| row.counters())
            .unwrap_or_default()
    }

    pub async fn available(&self, key: &StockKey) -> Decimal {
        self.services.stock.available(key).await.expect("available")
    }

    pub async fn live_movements(&self) -> Vec<movement_log::Model> {
        movement_log::Entity::find()
            .all(&*self.db)
            .await
            .expect("movement rows")
            .into_iter()
            .filter(|m| !m.cancelled)
            .collect()
    }

    pub async fn movement_count(&self) -> u64 {
        movement_log::Entity::find()
            .count(&*self.db)
            .await
            .expect("movement count")
    }

    pub async fn history_rows(&self) -> Vec<history_of_stock::Model> {
        history_of_stock::Entity::find()
            .all(&*self.db)
            .await
            .expect("history rows")
    }

    pub async fn activity_rows(&self) -> Vec<activity_log::Model> {
        activity_log::Entity::find()
            .all(&*self.db)
            .await
            .expect("activity rows")
    }

    pub async fn execute(&self, sql: &str) {
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                sql.to_string(),
            ))
            .await
            .expect("raw statement");
    }

    /// Asserts the stock summary agrees with the live movement log for every key.
    pub async fn assert_balanced(&self) {
        let drifts = self
            .services
            .stock
            .verify_balances()
            .await
            .expect("verify balances");
        assert!(drifts.is_empty(), "stock summary drifted: {drifts:?}");
    }
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

pub fn key(warehouse: &str, item: &str, batch: &str) -> StockKey {
    StockKey::new(warehouse, SUPPLIER, item, batch)
}

pub fn line(line_no: i32, item: &str, batch: &str, quantity: Decimal) -> DocumentLine {
    DocumentLine::new(line_no, item, batch, SUPPLIER, quantity)
}

pub fn initial_stock(doc_no: &str, warehouse: &str, lines: Vec<DocumentLine>) -> DirectReceipt {
    DirectReceipt {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        kind: ReceiptKind::InitialStock,
        warehouse: warehouse.to_string(),
        counterparty: None,
        remark: None,
        lines,
    }
}

pub fn sale(doc_no: &str, warehouse: &str, lines: Vec<DocumentLine>) -> DirectDelivery {
    DirectDelivery {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        kind: DeliveryKind::Sale,
        warehouse: warehouse.to_string(),
        counterparty: Some("CUST-1".to_string()),
        remark: None,
        lines,
    }
}

pub fn purchase_order(doc_no: &str, lines: Vec<DocumentLine>) -> PurchaseOrder {
    PurchaseOrder {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        warehouse: WH.to_string(),
        supplier: SUPPLIER.to_string(),
        remark: None,
        lines,
    }
}

pub fn purchase_receipt(doc_no: &str, lines: Vec<DocumentLine>) -> PurchaseReceipt {
    PurchaseReceipt {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        warehouse: WH.to_string(),
        supplier: SUPPLIER.to_string(),
        remark: None,
        lines,
    }
}

pub fn purchase_return(doc_no: &str, lines: Vec<DocumentLine>) -> PurchaseReturn {
    PurchaseReturn {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        warehouse: WH.to_string(),
        supplier: SUPPLIER.to_string(),
        remark: None,
        lines,
    }
}

pub fn material_transfer(doc_no: &str, lines: Vec<DocumentLine>) -> MaterialTransfer {
    MaterialTransfer {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        warehouse: WH.to_string(),
        to_warehouse: WH2.to_string(),
        remark: None,
        lines,
    }
}

pub fn material_receive(doc_no: &str, lines: Vec<DocumentLine>) -> MaterialReceive {
    MaterialReceive {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        warehouse: WH2.to_string(),
        from_warehouse: WH.to_string(),
        remark: None,
        lines,
    }
}
