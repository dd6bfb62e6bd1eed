use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::chain::UpstreamRef;

fn validate_non_zero_quantity(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_zero() {
        let mut err = ValidationError::new("range");
        err.message = Some("Quantity must not be zero".into());
        Err(err)
    } else {
        Ok(())
    }
}

fn distinct_warehouses(from: &str, to: &str) -> Result<(), ValidationError> {
    if from == to {
        let mut err = ValidationError::new("same_warehouse");
        err.message = Some("Source and destination warehouse must differ".into());
        Err(err)
    } else {
        Ok(())
    }
}

fn validate_transfer_warehouses(doc: &MaterialTransfer) -> Result<(), ValidationError> {
    distinct_warehouses(&doc.warehouse, &doc.to_warehouse)
}

fn validate_mutation_warehouses(doc: &StockMutation) -> Result<(), ValidationError> {
    distinct_warehouses(&doc.warehouse, &doc.to_warehouse)
}

/// A detail line. Every document type shares this shape; which parts matter
/// (upstream link, signed quantity) depends on the document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DocumentLine {
    #[validate(range(min = 1))]
    pub line_no: i32,
    #[validate(length(min = 1, max = 64))]
    pub item: String,
    #[validate(length(max = 64))]
    pub batch: String,
    #[validate(length(max = 64))]
    pub source: String,
    #[validate(custom = "validate_non_zero_quantity")]
    pub quantity: Decimal,
    pub remark: Option<String>,
    pub upstream: Option<UpstreamRef>,
}

impl DocumentLine {
    pub fn new(
        line_no: i32,
        item: impl Into<String>,
        batch: impl Into<String>,
        source: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            line_no,
            item: item.into(),
            batch: batch.into(),
            source: source.into(),
            quantity,
            remark: None,
            upstream: None,
        }
    }

    /// Links the line to the upstream line it was built from.
    pub fn linked_to(mut self, doc_no: impl Into<String>, line_no: i32) -> Self {
        self.upstream = Some(UpstreamRef::new(doc_no, line_no));
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MaterialRequest {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    pub requested_by: Option<String>,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PurchaseOrderRequest {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    pub requested_by: Option<String>,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PurchaseOrder {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    #[validate(length(min = 1, max = 64))]
    pub supplier: String,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

/// Goods received from a supplier against purchase order lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PurchaseReceipt {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    #[validate(length(min = 1, max = 64))]
    pub supplier: String,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

/// Goods sent back to the supplier against purchase receipt lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PurchaseReturn {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    #[validate(length(min = 1, max = 64))]
    pub supplier: String,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

/// Stock leaving `warehouse` on its way to `to_warehouse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_transfer_warehouses"))]
pub struct MaterialTransfer {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    #[validate(length(min = 1, max = 32))]
    pub to_warehouse: String,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

/// Arrival at `warehouse` of stock sent by a material transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MaterialReceive {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    #[validate(length(min = 1, max = 32))]
    pub from_warehouse: String,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

/// Stock count corrections. Line quantities are signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StockAdjustment {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    pub reason: Option<String>,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

/// Immediate move between two warehouses, booked as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_mutation_warehouses"))]
pub struct StockMutation {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    #[validate(length(min = 1, max = 32))]
    pub to_warehouse: String,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ReceiptKind {
    #[sea_orm(string_value = "InitialStock")]
    InitialStock,
    #[sea_orm(string_value = "SalesReturn")]
    SalesReturn,
    #[sea_orm(string_value = "Other")]
    Other,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum DeliveryKind {
    #[sea_orm(string_value = "Sale")]
    Sale,
    #[sea_orm(string_value = "Other")]
    Other,
}

/// Receipts with no upstream document: initial stock, sales returns, other receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DirectReceipt {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    pub kind: ReceiptKind,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    pub counterparty: Option<String>,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

/// Issues with no upstream document: sales and other deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DirectDelivery {
    #[validate(length(min = 1, max = 32))]
    pub doc_no: String,
    pub doc_date: NaiveDate,
    pub kind: DeliveryKind,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    pub counterparty: Option<String>,
    pub remark: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DocumentLine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_quantity_line_is_rejected() {
        let line = DocumentLine::new(1, "ITEM-1", "B1", "SUP", Decimal::ZERO);
        assert!(line.validate().is_err());
    }

    #[test]
    fn document_without_lines_is_rejected() {
        let receipt = PurchaseReceipt {
            doc_no: "PMR-1".into(),
            doc_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            warehouse: "WH1".into(),
            supplier: "ACME".into(),
            remark: None,
            lines: vec![],
        };
        assert!(receipt.validate().is_err());
    }

    #[test]
    fn linked_line_carries_upstream_reference() {
        let line = DocumentLine::new(1, "ITEM-1", "B1", "SUP", dec!(3)).linked_to("PO-1", 2);
        assert_eq!(line.upstream, Some(UpstreamRef::new("PO-1", 2)));
        assert!(line.validate().is_ok());
    }

    #[test]
    fn transfer_to_its_own_warehouse_is_rejected() {
        let transfer = MaterialTransfer {
            doc_no: "MT-1".into(),
            doc_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            warehouse: "WH1".into(),
            to_warehouse: "WH1".into(),
            remark: None,
            lines: vec![DocumentLine::new(1, "ITEM-1", "B1", "SUP", dec!(2))],
        };
        let errors = transfer.validate().unwrap_err();
        assert!(errors.errors().contains_key("__all__"));

        let moved = MaterialTransfer {
            to_warehouse: "WH2".into(),
            ..transfer
        };
        assert!(moved.validate().is_ok());
    }
}
