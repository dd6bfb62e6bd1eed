//! A store failure at any stage leaves no trace of the operation.

mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;

use inventory_ledger::{
    entities::documents::{direct_receipt_headers, direct_receipt_lines},
    models::DocumentType,
    LedgerStage, ServiceError,
};

use common::*;

#[tokio::test]
async fn failed_history_write_rolls_back_the_whole_document() {
    let ledger = TestLedger::new().await;
    ledger.execute("DROP TABLE history_of_stock").await;

    let err = ledger
        .services
        .documents
        .create_direct_receipt(
            initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(4))]),
            ACTOR,
        )
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ServiceError::TransactionFailure {
            stage: LedgerStage::History,
            ..
        }
    );
    assert!(direct_receipt_headers::Entity::find_by_id("DRC-1")
        .one(&*ledger.db)
        .await
        .unwrap()
        .is_none());
    assert_eq!(ledger.movement_count().await, 0);
    assert!(ledger
        .services
        .stock
        .summary(&key(WH, "ITEM-1", "B1"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_activity_write_rolls_back_creation() {
    let ledger = TestLedger::new().await;
    ledger.execute("DROP TABLE activity_log").await;

    let err = ledger
        .services
        .documents
        .create_direct_receipt(
            initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(4))]),
            ACTOR,
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(LedgerStage::Activity));
    assert_eq!(err.code(), "transaction_failure");
    assert_eq!(ledger.movement_count().await, 0);
    assert!(ledger.history_rows().await.is_empty());
    assert_eq!(ledger.available(&key(WH, "ITEM-1", "B1")).await, dec!(0));
}

#[tokio::test]
async fn failed_activity_write_rolls_back_cancellation() {
    let ledger = TestLedger::new().await;
    ledger
        .services
        .documents
        .create_direct_receipt(
            initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(4))]),
            ACTOR,
        )
        .await
        .unwrap();
    ledger.execute("DROP TABLE activity_log").await;

    let err = ledger
        .services
        .cancellations
        .cancel_document(DocumentType::DirectReceipt, "DRC-1", ACTOR)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ServiceError::TransactionFailure {
            stage: LedgerStage::Activity,
            ..
        }
    );
    let line = direct_receipt_lines::Entity::find_by_id(("DRC-1".to_string(), 1))
        .one(&*ledger.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!line.cancelled);
    assert_eq!(ledger.available(&key(WH, "ITEM-1", "B1")).await, dec!(4));
    assert_eq!(ledger.live_movements().await.len(), 1);
    assert!(ledger.history_rows().await.iter().all(|h| !h.cancelled));
    ledger.assert_balanced().await;
}
