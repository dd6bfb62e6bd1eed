mod common;

use assert_matches::assert_matches;
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use inventory_ledger::{
    models::{
        Direction, DocumentType, LedgerPolicy, LineRef, MovementIntent, StockAdjustment,
        StockCounters,
    },
    ServiceError,
};

use common::*;

fn adjustment(doc_no: &str, lines: Vec<inventory_ledger::models::DocumentLine>) -> StockAdjustment {
    StockAdjustment {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        warehouse: WH.to_string(),
        reason: Some("cycle count".to_string()),
        remark: None,
        lines,
    }
}

#[tokio::test]
async fn sale_then_cancel_restores_exact_counters() {
    let ledger = TestLedger::new().await;
    let stock = key(WH, "ITEM-1", "B1");
    ledger
        .services
        .documents
        .create_direct_receipt(
            initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(12.5))]),
            ACTOR,
        )
        .await
        .unwrap();
    let before = ledger.counters(&stock).await;

    ledger
        .services
        .documents
        .create_direct_delivery(
            sale("DDL-1", WH, vec![line(1, "ITEM-1", "B1", dec!(7.5))]),
            ACTOR,
        )
        .await
        .unwrap();
    assert_eq!(ledger.available(&stock).await, dec!(5));

    ledger
        .services
        .cancellations
        .cancel_document(DocumentType::DirectDelivery, "DDL-1", ACTOR)
        .await
        .unwrap();

    assert_eq!(ledger.counters(&stock).await, before);
    ledger.assert_balanced().await;
}

#[tokio::test]
async fn selling_more_than_available_is_rejected() {
    let ledger = TestLedger::new().await;
    let stock = key(WH, "ITEM-1", "B1");
    ledger
        .services
        .documents
        .create_direct_receipt(
            initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(3))]),
            ACTOR,
        )
        .await
        .unwrap();
    let movements = ledger.movement_count().await;

    let err = ledger
        .services
        .documents
        .create_direct_delivery(
            sale("DDL-1", WH, vec![line(1, "ITEM-1", "B1", dec!(4))]),
            ACTOR,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(err.code(), "insufficient_stock");
    assert_eq!(ledger.available(&stock).await, dec!(3));
    assert_eq!(ledger.movement_count().await, movements);
}

#[tokio::test]
async fn negative_stock_can_be_allowed_by_policy() {
    let ledger = TestLedger::with_policy(LedgerPolicy {
        allow_negative_stock: true,
        enforce_fulfillment_limit: true,
    })
    .await;
    let stock = key(WH, "ITEM-1", "B1");
    ledger
        .services
        .documents
        .create_direct_receipt(
            initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(3))]),
            ACTOR,
        )
        .await
        .unwrap();

    ledger
        .services
        .documents
        .create_direct_delivery(
            sale("DDL-1", WH, vec![line(1, "ITEM-1", "B1", dec!(5))]),
            ACTOR,
        )
        .await
        .unwrap();

    assert_eq!(ledger.available(&stock).await, dec!(-2));
    ledger.assert_balanced().await;
}

#[tokio::test]
async fn outbound_needs_a_known_batch() {
    let ledger = TestLedger::new().await;

    let err = ledger
        .services
        .documents
        .create_direct_delivery(
            sale("DDL-1", WH, vec![line(1, "ITEM-1", "NOPE", dec!(1))]),
            ACTOR,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ConstraintViolation(msg) if msg.contains("unknown batch"));
}

#[tokio::test]
async fn duplicate_document_number_is_a_constraint_violation() {
    let ledger = TestLedger::new().await;
    let receipt = initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(3))]);
    ledger
        .services
        .documents
        .create_direct_receipt(receipt.clone(), ACTOR)
        .await
        .unwrap();

    let err = ledger
        .services
        .documents
        .create_direct_receipt(receipt, ACTOR)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ConstraintViolation(_));
    assert_eq!(ledger.available(&key(WH, "ITEM-1", "B1")).await, dec!(3));
}

#[rstest]
#[case::zero_quantity(vec![line(1, "ITEM-1", "B1", Decimal::ZERO)])]
#[case::negative_quantity(vec![line(1, "ITEM-1", "B1", dec!(-2))])]
#[case::repeated_line_number(vec![
    line(1, "ITEM-1", "B1", dec!(1)),
    line(1, "ITEM-2", "B1", dec!(1)),
])]
#[case::no_lines(vec![])]
#[tokio::test]
async fn malformed_payloads_are_rejected_before_writing(
    #[case] lines: Vec<inventory_ledger::models::DocumentLine>,
) {
    let ledger = TestLedger::new().await;

    let err = ledger
        .services
        .documents
        .create_direct_receipt(initial_stock("DRC-1", WH, lines), ACTOR)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(ledger.movement_count().await, 0);
    assert!(ledger.activity_rows().await.is_empty());
}

#[tokio::test]
async fn adjustments_post_by_sign() {
    let ledger = TestLedger::new().await;
    let stock = key(WH, "ITEM-1", "B1");

    ledger
        .services
        .documents
        .create_stock_adjustment(adjustment("ADJ-1", vec![line(1, "ITEM-1", "B1", dec!(8))]), ACTOR)
        .await
        .unwrap();
    ledger
        .services
        .documents
        .create_stock_adjustment(adjustment("ADJ-2", vec![line(1, "ITEM-1", "B1", dec!(-3))]), ACTOR)
        .await
        .unwrap();

    assert_eq!(
        ledger.counters(&stock).await,
        StockCounters::new(dec!(8), dec!(0), dec!(3))
    );

    ledger
        .services
        .cancellations
        .cancel_document(DocumentType::StockAdjustment, "ADJ-2", ACTOR)
        .await
        .unwrap();
    assert_eq!(ledger.available(&stock).await, dec!(8));
    ledger.assert_balanced().await;
}

#[tokio::test]
async fn history_moves_to_the_next_live_receipt() {
    let ledger = TestLedger::new().await;
    let docs = &ledger.services.documents;
    docs.create_direct_receipt(
        initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(2))]),
        ACTOR,
    )
    .await
    .unwrap();
    docs.create_direct_receipt(
        initial_stock("DRC-2", WH2, vec![line(1, "ITEM-1", "B1", dec!(3))]),
        ACTOR,
    )
    .await
    .unwrap();

    let outcome = ledger
        .services
        .cancellations
        .cancel_document(DocumentType::DirectReceipt, "DRC-1", ACTOR)
        .await
        .unwrap();
    assert_eq!(outcome.reversal.history_rows_reassigned, 1);

    let history = ledger
        .services
        .stock
        .history("ITEM-1", "B1", SUPPLIER)
        .await
        .unwrap()
        .expect("history row");
    assert!(!history.cancelled);
    assert_eq!(history.doc_no, "DRC-2");

    ledger
        .services
        .cancellations
        .cancel_document(DocumentType::DirectReceipt, "DRC-2", ACTOR)
        .await
        .unwrap();
    let history = ledger
        .services
        .stock
        .history("ITEM-1", "B1", SUPPLIER)
        .await
        .unwrap()
        .expect("history row");
    assert!(history.cancelled);

    // A new receipt brings the identity back under its own line.
    docs.create_direct_receipt(
        initial_stock("DRC-3", WH, vec![line(1, "ITEM-1", "B1", dec!(1))]),
        ACTOR,
    )
    .await
    .unwrap();
    let history = ledger
        .services
        .stock
        .history("ITEM-1", "B1", SUPPLIER)
        .await
        .unwrap()
        .expect("history row");
    assert!(!history.cancelled);
    assert_eq!(history.doc_no, "DRC-3");
    assert_eq!(ledger.history_rows().await.len(), 1);
}

#[tokio::test]
async fn writer_posts_and_reverses_on_its_own() {
    let ledger = TestLedger::new().await;
    let stock = key(WH, "ITEM-9", "LOT-1");
    let owner = LineRef::new(DocumentType::DirectReceipt, "EXT-1", 1);
    let intent = MovementIntent::new(Direction::Received, stock.clone(), dec!(9), owner.clone(), date());

    let posting = ledger
        .services
        .ledger
        .post_movements(&[intent], ACTOR)
        .await
        .unwrap();
    assert_eq!(posting.summary_rows_created, 1);
    assert_eq!(posting.history_rows_created, 1);
    assert_eq!(ledger.available(&stock).await, dec!(9));

    let db = ledger.db.clone();
    let reversal = ledger.services.ledger.reverse(&*db, &[owner.clone()], ACTOR).await.unwrap();
    assert_eq!(reversal.movements_cancelled, 1);
    assert_eq!(ledger.available(&stock).await, dec!(0));

    let again = ledger.services.ledger.reverse(&*db, &[owner], ACTOR).await.unwrap();
    assert!(again.is_empty());
    ledger.assert_balanced().await;
}

#[tokio::test]
async fn every_completed_operation_is_logged() {
    let ledger = TestLedger::new().await;
    ledger
        .services
        .documents
        .create_direct_receipt(
            initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(2))]),
            ACTOR,
        )
        .await
        .unwrap();
    ledger
        .services
        .cancellations
        .cancel_document(DocumentType::DirectReceipt, "DRC-1", ACTOR)
        .await
        .unwrap();

    let entries: Vec<(String, String, String)> = ledger
        .activity_rows()
        .await
        .into_iter()
        .map(|row| (row.actor, row.code, row.category))
        .collect();
    assert_eq!(
        entries,
        vec![
            (ACTOR.into(), "DRC".into(), "DirectReceipt.Create".into()),
            (ACTOR.into(), "DRC".into(), "DirectReceipt.Cancel".into()),
        ]
    );
}
