//! Inventory Ledger Library
//!
//! Stock movement ledger and document-chain consistency engine: posting and
//! reversing stock movements, deriving fulfillment status along procurement and
//! transfer chains, and cancelling document lines atomically.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod migrator;
pub mod models;
pub mod services;

pub use errors::{LedgerStage, ServiceError};
pub use services::LedgerServices;
