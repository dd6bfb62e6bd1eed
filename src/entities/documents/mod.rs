//! Header/detail table pairs, one per document type.

pub mod material_request_headers;
pub mod material_request_lines;
pub mod purchase_order_request_headers;
pub mod purchase_order_request_lines;
pub mod purchase_order_headers;
pub mod purchase_order_lines;
pub mod purchase_receipt_headers;
pub mod purchase_receipt_lines;
pub mod purchase_return_headers;
pub mod purchase_return_lines;
pub mod material_transfer_headers;
pub mod material_transfer_lines;
pub mod material_receive_headers;
pub mod material_receive_lines;
pub mod stock_adjustment_headers;
pub mod stock_adjustment_lines;
pub mod stock_mutation_headers;
pub mod stock_mutation_lines;
pub mod direct_receipt_headers;
pub mod direct_receipt_lines;
pub mod direct_delivery_headers;
pub mod direct_delivery_lines;
