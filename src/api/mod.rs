pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};
pub use handlers::*;

use crate::service::LedgerService;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

/// 请求体上限 50MB
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// 构建 HTTP 路由
pub fn router(service: Arc<LedgerService>) -> Router {
    let ledger_routes = Router::new()
        .route("/ledger_receipt", post(ledger_receipt))
        .route("/ledger_receipt/upload", post(ledger_receipt_upload))
        .with_state(service);

    Router::new()
        .route("/health", get(health_check))
        .merge(ledger_routes)
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(MAX_BODY_BYTES)))
}
