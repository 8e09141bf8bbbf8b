//! gRPC 接口 `ledger.LedgerService` (定义见 proto/ledger.proto)

pub mod server;

pub use server::LedgerServiceServer;

use crate::error::LedgerError;
use crate::image::EncodedImage;
use crate::models::CombinedRecord;
use crate::service::LedgerService;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{error, info};

/// 消息大小上限 50MB
pub const MAX_MESSAGE_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReceiptRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub image_data: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReceiptsRequest {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub image_data: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReceiptResponse {
    #[prost(string, tag = "1")]
    pub json_output: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReceiptsResponse {
    #[prost(string, tag = "1")]
    pub json_output: String,
}

/// gRPC 处理器, 复用 LedgerService
pub struct LedgerRpc {
    service: Arc<LedgerService>,
}

impl LedgerRpc {
    pub fn new(service: Arc<LedgerService>) -> Self {
        Self { service }
    }

    pub async fn process_receipt(
        &self,
        request: Request<ReceiptRequest>,
    ) -> Result<Response<ReceiptResponse>, Status> {
        let image_data = request.into_inner().image_data;
        let combined = self.process(vec![image_data]).await?;
        Ok(Response::new(ReceiptResponse {
            json_output: to_json(&combined)?,
        }))
    }

    pub async fn process_receipts(
        &self,
        request: Request<ReceiptsRequest>,
    ) -> Result<Response<ReceiptsResponse>, Status> {
        let images = request.into_inner().image_data;
        info!("gRPC ProcessReceipts: {} images", images.len());
        let combined = self.process(images).await?;
        Ok(Response::new(ReceiptsResponse {
            json_output: to_json(&combined)?,
        }))
    }

    async fn process(&self, payloads: Vec<Vec<u8>>) -> Result<CombinedRecord, Status> {
        if let Some(idx) = payloads.iter().position(|p| p.is_empty()) {
            return Err(Status::invalid_argument(format!(
                "image_data[{}] is empty",
                idx
            )));
        }

        let images = payloads
            .into_iter()
            .map(|data| EncodedImage::detect(data, None, None))
            .collect();

        self.service.process_images(images).await.map_err(|e| {
            error!("图片处理中发生错误: {}", e);
            to_status(e)
        })
    }
}

fn to_json(record: &CombinedRecord) -> Result<String, Status> {
    serde_json::to_string(record)
        .map_err(|e| Status::internal(format!("failed to serialize result: {}", e)))
}

/// LedgerError -> gRPC 状态码
pub fn to_status(err: LedgerError) -> Status {
    let message = format!("{}: {}", err.code(), err);
    match err {
        LedgerError::EmptyInput
        | LedgerError::ImageFetch { .. }
        | LedgerError::UnsupportedImageType(_) => Status::invalid_argument(message),
        LedgerError::ModelInvocation { .. } => Status::unavailable(message),
        LedgerError::MalformedResponse { raw_reply, .. } => {
            Status::internal(format!("{} (raw reply: {})", message, raw_reply))
        }
        LedgerError::Io(_) | LedgerError::Database(_) | LedgerError::Config(_) => {
            Status::internal(message)
        }
    }
}

/// 启动 gRPC 服务, 直到 shutdown 完成
pub async fn serve<F>(
    addr: SocketAddr,
    service: Arc<LedgerService>,
    shutdown: F,
) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()> + Send,
{
    info!("gRPC server listening on {}", addr);
    tonic::transport::Server::builder()
        .add_service(LedgerServiceServer::new(LedgerRpc::new(service)))
        .serve_with_shutdown(addr, shutdown)
        .await
}
