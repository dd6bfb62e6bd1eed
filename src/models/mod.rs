pub mod chain;
pub mod documents;
pub mod ledger;

pub use chain::{FulfillmentStatus, LineFlag, StatusChange, UpstreamRef};
pub use documents::{
    DeliveryKind, DirectDelivery, DirectReceipt, DocumentLine, MaterialReceive, MaterialRequest,
    MaterialTransfer, PurchaseOrder, PurchaseOrderRequest, PurchaseReceipt, PurchaseReturn,
    ReceiptKind, StockAdjustment, StockMutation,
};
pub use ledger::{
    Direction, DocumentType, LedgerPolicy, LineRef, MovementIntent, StockCounters, StockKey,
};
