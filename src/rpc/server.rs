//! `ledger.LedgerService` 的 tonic 服务端封装 (路由 + 编解码)

use super::{
    LedgerRpc, ReceiptRequest, ReceiptResponse, ReceiptsRequest, ReceiptsResponse,
    MAX_MESSAGE_BYTES,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::{empty_body, http, Body, BoxFuture, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};

const PROCESS_RECEIPT_PATH: &str = "/ledger.LedgerService/ProcessReceipt";
const PROCESS_RECEIPTS_PATH: &str = "/ledger.LedgerService/ProcessReceipts";

/// gRPC status 12 = UNIMPLEMENTED
const GRPC_UNIMPLEMENTED: &str = "12";

#[derive(Clone)]
pub struct LedgerServiceServer {
    inner: Arc<LedgerRpc>,
    max_message_size: usize,
}

impl LedgerServiceServer {
    pub fn new(inner: LedgerRpc) -> Self {
        Self {
            inner: Arc::new(inner),
            max_message_size: MAX_MESSAGE_BYTES,
        }
    }
}

impl NamedService for LedgerServiceServer {
    const NAME: &'static str = "ledger.LedgerService";
}

struct ProcessReceiptSvc(Arc<LedgerRpc>);

impl UnaryService<ReceiptRequest> for ProcessReceiptSvc {
    type Response = ReceiptResponse;
    type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

    fn call(&mut self, request: tonic::Request<ReceiptRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.process_receipt(request).await })
    }
}

struct ProcessReceiptsSvc(Arc<LedgerRpc>);

impl UnaryService<ReceiptsRequest> for ProcessReceiptsSvc {
    type Response = ReceiptsResponse;
    type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

    fn call(&mut self, request: tonic::Request<ReceiptsRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.process_receipts(request).await })
    }
}

impl<B> Service<http::Request<B>> for LedgerServiceServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        let limit = Some(self.max_message_size);

        match req.uri().path() {
            PROCESS_RECEIPT_PATH => Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::default())
                    .apply_max_message_size_config(limit, limit);
                Ok(grpc.unary(ProcessReceiptSvc(inner), req).await)
            }),
            PROCESS_RECEIPTS_PATH => Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::default())
                    .apply_max_message_size_config(limit, limit);
                Ok(grpc.unary(ProcessReceiptsSvc(inner), req).await)
            }),
            _ => Box::pin(async move { Ok(unimplemented_response()) }),
        }
    }
}

fn unimplemented_response() -> http::Response<BoxBody> {
    let mut response = http::Response::new(empty_body());
    let headers = response.headers_mut();
    headers.insert(
        "grpc-status",
        http::HeaderValue::from_static(GRPC_UNIMPLEMENTED),
    );
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/grpc"),
    );
    response
}
