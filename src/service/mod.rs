pub mod extractor;
pub mod ledger;
pub mod reconciler;

pub use extractor::{normalize_reply, parse_reply, Extractor};
pub use ledger::LedgerService;
pub use reconciler::combine;
