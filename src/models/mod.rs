pub mod receipt;

pub use receipt::{CombinedRecord, LineItem, ReceiptRecord};
