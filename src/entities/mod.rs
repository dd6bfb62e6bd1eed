pub mod activity_log;
pub mod documents;
pub mod history_of_stock;
pub mod movement_log;
pub mod stock_summary;
