pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod image;
pub mod llm;
pub mod models;
pub mod rpc;
pub mod service;

pub use config::AppConfig;
pub use db::create_pool;
pub use error::{LedgerError, Result};
pub use models::{CombinedRecord, LineItem, ReceiptRecord};
pub use service::{combine, Extractor, LedgerService};
