use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Every business document that can touch the ledger or the document chain.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum DocumentType {
    MaterialRequest,
    PurchaseOrderRequest,
    PurchaseOrder,
    PurchaseReceipt,
    PurchaseReturn,
    MaterialTransfer,
    MaterialReceive,
    StockAdjustment,
    StockMutation,
    DirectReceipt,
    DirectDelivery,
}

impl DocumentType {
    /// Header table name for this document type.
    pub fn header_table(&self) -> &'static str {
        match self {
            Self::MaterialRequest => "material_request_headers",
            Self::PurchaseOrderRequest => "purchase_order_request_headers",
            Self::PurchaseOrder => "purchase_order_headers",
            Self::PurchaseReceipt => "purchase_receipt_headers",
            Self::PurchaseReturn => "purchase_return_headers",
            Self::MaterialTransfer => "material_transfer_headers",
            Self::MaterialReceive => "material_receive_headers",
            Self::StockAdjustment => "stock_adjustment_headers",
            Self::StockMutation => "stock_mutation_headers",
            Self::DirectReceipt => "direct_receipt_headers",
            Self::DirectDelivery => "direct_delivery_headers",
        }
    }

    /// Detail table name for this document type.
    pub fn line_table(&self) -> &'static str {
        match self {
            Self::MaterialRequest => "material_request_lines",
            Self::PurchaseOrderRequest => "purchase_order_request_lines",
            Self::PurchaseOrder => "purchase_order_lines",
            Self::PurchaseReceipt => "purchase_receipt_lines",
            Self::PurchaseReturn => "purchase_return_lines",
            Self::MaterialTransfer => "material_transfer_lines",
            Self::MaterialReceive => "material_receive_lines",
            Self::StockAdjustment => "stock_adjustment_lines",
            Self::StockMutation => "stock_mutation_lines",
            Self::DirectReceipt => "direct_receipt_lines",
            Self::DirectDelivery => "direct_delivery_lines",
        }
    }

    /// Short code used in activity log categories.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MaterialRequest => "MR",
            Self::PurchaseOrderRequest => "POR",
            Self::PurchaseOrder => "PO",
            Self::PurchaseReceipt => "PMR",
            Self::PurchaseReturn => "PRD",
            Self::MaterialTransfer => "MT",
            Self::MaterialReceive => "MRV",
            Self::StockAdjustment => "ADJ",
            Self::StockMutation => "MUT",
            Self::DirectReceipt => "DRC",
            Self::DirectDelivery => "DDL",
        }
    }
}

/// Which of the three summary counters a movement feeds.
///
/// Counters are kept apart so that a reversal can subtract exactly what a
/// posting added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Direction {
    /// `qty_in`: purchases, adjustments up, direct receipts.
    Received,
    /// `qty_in2`: stock arriving from another warehouse.
    TransferredIn,
    /// `qty_out`: sales, returns to supplier, transfers out, adjustments down.
    Consumed,
}

impl Direction {
    pub fn is_inbound(&self) -> bool {
        !matches!(self, Direction::Consumed)
    }

    /// Splits a quantity into the `(qty_in, qty_in2, qty_out)` movement channels.
    pub fn channels(&self, quantity: Decimal) -> (Decimal, Decimal, Decimal) {
        match self {
            Direction::Received => (quantity, Decimal::ZERO, Decimal::ZERO),
            Direction::TransferredIn => (Decimal::ZERO, quantity, Decimal::ZERO),
            Direction::Consumed => (Decimal::ZERO, Decimal::ZERO, quantity),
        }
    }
}

/// Identity of one stock summary row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse: String,
    pub source: String,
    pub item: String,
    pub batch: String,
}

impl StockKey {
    pub fn new(
        warehouse: impl Into<String>,
        source: impl Into<String>,
        item: impl Into<String>,
        batch: impl Into<String>,
    ) -> Self {
        Self {
            warehouse: warehouse.into(),
            source: source.into(),
            item: item.into(),
            batch: batch.into(),
        }
    }

    /// Same stock identity at another warehouse.
    pub fn at(&self, warehouse: impl Into<String>) -> Self {
        Self {
            warehouse: warehouse.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.warehouse, self.source, self.item, self.batch
        )
    }
}

/// The three running counters held by a stock summary row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCounters {
    pub received: Decimal,
    pub transferred_in: Decimal,
    pub consumed: Decimal,
}

impl StockCounters {
    pub fn new(received: Decimal, transferred_in: Decimal, consumed: Decimal) -> Self {
        Self {
            received,
            transferred_in,
            consumed,
        }
    }

    /// Available stock: everything that came in minus everything that went out.
    pub fn available(&self) -> Decimal {
        self.received + self.transferred_in - self.consumed
    }

    pub fn record(&mut self, direction: Direction, quantity: Decimal) {
        match direction {
            Direction::Received => self.received += quantity,
            Direction::TransferredIn => self.transferred_in += quantity,
            Direction::Consumed => self.consumed += quantity,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.received.is_zero() && self.transferred_in.is_zero() && self.consumed.is_zero()
    }

    /// Adds back what a movement row contributed.
    pub fn add_movement(&mut self, qty_in: Decimal, qty_in2: Decimal, qty_out: Decimal) {
        self.received += qty_in;
        self.transferred_in += qty_in2;
        self.consumed += qty_out;
    }

    /// Whether applying these counters as a delta takes stock out of a key.
    pub fn removes_stock(&self) -> bool {
        self.consumed > Decimal::ZERO
    }

    /// Inbound part of the counters.
    pub fn inbound(&self) -> Decimal {
        self.received + self.transferred_in
    }
}

impl std::ops::Add for StockCounters {
    type Output = StockCounters;

    fn add(self, rhs: StockCounters) -> StockCounters {
        StockCounters {
            received: self.received + rhs.received,
            transferred_in: self.transferred_in + rhs.transferred_in,
            consumed: self.consumed + rhs.consumed,
        }
    }
}

impl std::ops::Sub for StockCounters {
    type Output = StockCounters;

    fn sub(self, rhs: StockCounters) -> StockCounters {
        StockCounters {
            received: self.received - rhs.received,
            transferred_in: self.transferred_in - rhs.transferred_in,
            consumed: self.consumed - rhs.consumed,
        }
    }
}

/// A single detail line of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRef {
    pub doc_type: DocumentType,
    pub doc_no: String,
    pub line_no: i32,
}

impl LineRef {
    pub fn new(doc_type: DocumentType, doc_no: impl Into<String>, line_no: i32) -> Self {
        Self {
            doc_type,
            doc_no: doc_no.into(),
            line_no,
        }
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}#{}", self.doc_type, self.doc_no, self.line_no)
    }
}

/// One stock-affecting effect requested by a document line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementIntent {
    pub direction: Direction,
    pub key: StockKey,
    pub quantity: Decimal,
    pub owner: LineRef,
    pub doc_date: NaiveDate,
    pub remark: Option<String>,
}

impl MovementIntent {
    pub fn new(
        direction: Direction,
        key: StockKey,
        quantity: Decimal,
        owner: LineRef,
        doc_date: NaiveDate,
    ) -> Self {
        Self {
            direction,
            key,
            quantity,
            owner,
            doc_date,
            remark: None,
        }
    }

    pub fn with_remark(mut self, remark: Option<String>) -> Self {
        self.remark = remark;
        self
    }
}

/// Stock rules applied by the ledger writer and the document service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    /// Let outbound postings and inbound reversals take available stock below zero.
    pub allow_negative_stock: bool,
    /// Reject downstream lines whose linked quantity would exceed the upstream line.
    pub enforce_fulfillment_limit: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            allow_negative_stock: false,
            enforce_fulfillment_limit: true,
        }
    }
}
