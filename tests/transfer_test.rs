mod common;

use assert_matches::assert_matches;
use rstest::rstest;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;

use inventory_ledger::{
    entities::documents::{material_transfer_headers, material_transfer_lines},
    models::{DocumentType, FulfillmentStatus, LedgerPolicy, StockMutation},
    ServiceError,
};

use common::*;

async fn seed_stock(ledger: &TestLedger) {
    ledger
        .services
        .documents
        .create_direct_receipt(
            initial_stock("DRC-1", WH, vec![line(1, "ITEM-1", "B1", dec!(20))]),
            ACTOR,
        )
        .await
        .expect("initial stock");
}

fn mutation(doc_no: &str, to_warehouse: &str, batch: &str) -> StockMutation {
    StockMutation {
        doc_no: doc_no.to_string(),
        doc_date: date(),
        warehouse: WH.to_string(),
        to_warehouse: to_warehouse.to_string(),
        remark: None,
        lines: vec![line(1, "ITEM-1", batch, dec!(4))],
    }
}

async fn transfer_state(ledger: &TestLedger) -> (FulfillmentStatus, bool) {
    let header = material_transfer_headers::Entity::find_by_id("MT-1")
        .one(&*ledger.db)
        .await
        .unwrap()
        .unwrap();
    let line = material_transfer_lines::Entity::find_by_id(("MT-1".to_string(), 1))
        .one(&*ledger.db)
        .await
        .unwrap()
        .unwrap();
    (header.status, line.success)
}

#[tokio::test]
async fn transfer_then_receive_moves_stock_between_warehouses() {
    let ledger = TestLedger::new().await;
    seed_stock(&ledger).await;
    let source = key(WH, "ITEM-1", "B1");
    let destination = key(WH2, "ITEM-1", "B1");

    let transfer = ledger
        .services
        .documents
        .create_material_transfer(
            material_transfer("MT-1", vec![line(1, "ITEM-1", "B1", dec!(5))]),
            ACTOR,
        )
        .await
        .unwrap();
    assert!(transfer.status_changes.is_empty());
    assert_eq!(ledger.available(&source).await, dec!(15));
    assert_eq!(
        transfer_state(&ledger).await,
        (FulfillmentStatus::Outstanding, false)
    );

    ledger
        .services
        .documents
        .create_material_receive(
            material_receive(
                "MRV-1",
                vec![line(1, "ITEM-1", "B1", dec!(5)).linked_to("MT-1", 1)],
            ),
            ACTOR,
        )
        .await
        .unwrap();

    assert_eq!(
        transfer_state(&ledger).await,
        (FulfillmentStatus::Success, true)
    );
    assert_eq!(ledger.available(&source).await, dec!(15));
    assert_eq!(ledger.available(&destination).await, dec!(5));
    assert_eq!(ledger.counters(&destination).await.transferred_in, dec!(5));

    let out = ledger
        .services
        .stock
        .movements_for(DocumentType::MaterialTransfer, "MT-1")
        .await
        .unwrap();
    let inbound = ledger
        .services
        .stock
        .movements_for(DocumentType::MaterialReceive, "MRV-1")
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!((out[0].warehouse.as_str(), out[0].qty_out), (WH, dec!(5)));
    assert_eq!(inbound.len(), 1);
    assert_eq!((inbound[0].warehouse.as_str(), inbound[0].qty_in2), (WH2, dec!(5)));
    ledger.assert_balanced().await;
}

#[tokio::test]
async fn receive_must_match_transferred_batch() {
    let ledger = TestLedger::new().await;
    seed_stock(&ledger).await;
    ledger
        .services
        .documents
        .create_material_transfer(
            material_transfer("MT-1", vec![line(1, "ITEM-1", "B1", dec!(5))]),
            ACTOR,
        )
        .await
        .unwrap();

    let err = ledger
        .services
        .documents
        .create_material_receive(
            material_receive(
                "MRV-1",
                vec![line(1, "ITEM-1", "B9", dec!(5)).linked_to("MT-1", 1)],
            ),
            ACTOR,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ConstraintViolation(_));
    assert_eq!(ledger.available(&key(WH2, "ITEM-1", "B9")).await, dec!(0));
}

#[tokio::test]
async fn cancelling_receive_reopens_transfer() {
    let ledger = TestLedger::new().await;
    seed_stock(&ledger).await;
    let docs = &ledger.services.documents;
    docs.create_material_transfer(
        material_transfer("MT-1", vec![line(1, "ITEM-1", "B1", dec!(5))]),
        ACTOR,
    )
    .await
    .unwrap();
    docs.create_material_receive(
        material_receive(
            "MRV-1",
            vec![line(1, "ITEM-1", "B1", dec!(5)).linked_to("MT-1", 1)],
        ),
        ACTOR,
    )
    .await
    .unwrap();

    let err = ledger
        .services
        .cancellations
        .cancel_document(DocumentType::MaterialTransfer, "MT-1", ACTOR)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ConstraintViolation(_));

    ledger
        .services
        .cancellations
        .cancel_document(DocumentType::MaterialReceive, "MRV-1", ACTOR)
        .await
        .unwrap();
    assert_eq!(
        transfer_state(&ledger).await,
        (FulfillmentStatus::Outstanding, false)
    );
    assert_eq!(ledger.available(&key(WH2, "ITEM-1", "B1")).await, dec!(0));

    ledger
        .services
        .cancellations
        .cancel_document(DocumentType::MaterialTransfer, "MT-1", ACTOR)
        .await
        .unwrap();
    assert_eq!(ledger.available(&key(WH, "ITEM-1", "B1")).await, dec!(20));
    ledger.assert_balanced().await;
}

#[tokio::test]
async fn mutation_posts_and_reverses_both_legs() {
    let ledger = TestLedger::new().await;
    seed_stock(&ledger).await;
    let from = key(WH, "ITEM-1", "B1");
    let to = key(WH2, "ITEM-1", "B1");

    let posted = ledger
        .services
        .documents
        .create_stock_mutation(mutation("MUT-1", WH2, "B1"), ACTOR)
        .await
        .unwrap();

    assert_eq!(posted.posting.movements, 2);
    assert_eq!(ledger.available(&from).await, dec!(16));
    assert_eq!(ledger.available(&to).await, dec!(4));

    let outcome = ledger
        .services
        .cancellations
        .cancel_lines(DocumentType::StockMutation, "MUT-1", &[1], ACTOR)
        .await
        .unwrap();

    assert_eq!(outcome.reversal.movements_cancelled, 2);
    assert_eq!(outcome.reversal.summary_rows_adjusted, 2);
    assert_eq!(ledger.available(&from).await, dec!(20));
    assert_eq!(ledger.available(&to).await, dec!(0));
    ledger.assert_balanced().await;
}

#[tokio::test]
async fn transfer_cannot_take_more_than_is_available() {
    let ledger = TestLedger::new().await;
    seed_stock(&ledger).await;

    let err = ledger
        .services
        .documents
        .create_material_transfer(
            material_transfer("MT-1", vec![line(1, "ITEM-1", "B1", dec!(25))]),
            ACTOR,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert!(material_transfer_headers::Entity::find_by_id("MT-1")
        .one(&*ledger.db)
        .await
        .unwrap()
        .is_none());
    assert_eq!(ledger.available(&key(WH, "ITEM-1", "B1")).await, dec!(20));
}

#[tokio::test]
async fn receive_into_other_warehouse_is_rejected() {
    let ledger = TestLedger::new().await;
    seed_stock(&ledger).await;
    ledger
        .services
        .documents
        .create_material_transfer(
            material_transfer("MT-1", vec![line(1, "ITEM-1", "B1", dec!(5))]),
            ACTOR,
        )
        .await
        .unwrap();

    let mut receive = material_receive(
        "MRV-1",
        vec![line(1, "ITEM-1", "B1", dec!(5)).linked_to("MT-1", 1)],
    );
    receive.warehouse = "WH3".to_string();
    let err = ledger
        .services
        .documents
        .create_material_receive(receive, ACTOR)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ConstraintViolation(msg) if msg.contains("to_warehouse"));

    let mut receive = material_receive(
        "MRV-2",
        vec![line(1, "ITEM-1", "B1", dec!(5)).linked_to("MT-1", 1)],
    );
    receive.from_warehouse = WH2.to_string();
    let err = ledger
        .services
        .documents
        .create_material_receive(receive, ACTOR)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ConstraintViolation(_));

    assert_eq!(ledger.available(&key("WH3", "ITEM-1", "B1")).await, dec!(0));
    assert_eq!(ledger.available(&key(WH2, "ITEM-1", "B1")).await, dec!(0));
    assert_eq!(
        transfer_state(&ledger).await,
        (FulfillmentStatus::Outstanding, false)
    );
    ledger.assert_balanced().await;
}

#[rstest]
#[case::default_policy(false)]
#[case::negative_allowed(true)]
#[tokio::test]
async fn mutation_of_unknown_batch_is_rejected(#[case] allow_negative_stock: bool) {
    let ledger = TestLedger::with_policy(LedgerPolicy {
        allow_negative_stock,
        enforce_fulfillment_limit: true,
    })
    .await;
    seed_stock(&ledger).await;
    let movements = ledger.movement_count().await;

    let err = ledger
        .services
        .documents
        .create_stock_mutation(mutation("MUT-1", WH2, "GHOST"), ACTOR)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ConstraintViolation(msg) if msg.contains("unknown batch"));
    assert_eq!(ledger.movement_count().await, movements);
    assert_eq!(ledger.available(&key(WH2, "ITEM-1", "GHOST")).await, dec!(0));
}

#[tokio::test]
async fn mutation_within_one_warehouse_is_rejected() {
    let ledger = TestLedger::new().await;
    seed_stock(&ledger).await;

    let err = ledger
        .services
        .documents
        .create_stock_mutation(mutation("MUT-1", WH, "B1"), ACTOR)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(ledger.available(&key(WH, "ITEM-1", "B1")).await, dec!(20));
}
