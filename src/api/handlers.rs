use super::error::{ApiError, ApiResult};
use crate::image::EncodedImage;
use crate::models::CombinedRecord;
use crate::service::LedgerService;
use axum::extract::{rejection::JsonRejection, Json, Multipart, State};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// 上传表单中图片字段名
pub const UPLOAD_FIELD: &str = "files";

/// 请求体: 图片 URL 列表
#[derive(Debug, Deserialize)]
pub struct ImageUrlsRequest {
    pub image_data: Vec<String>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 通过 URL 列表识别小票
pub async fn ledger_receipt(
    State(service): State<Arc<LedgerService>>,
    payload: Result<Json<ImageUrlsRequest>, JsonRejection>,
) -> ApiResult<Json<CombinedRecord>> {
    let Json(req) = payload
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))?;
    info!("收到请求: {} 个图片 URL", req.image_data.len());
    let combined = service.process_urls(&req.image_data).await?;
    Ok(Json(combined))
}

/// 通过文件上传识别小票 (multipart, 字段名 `files`, 可重复)
pub async fn ledger_receipt_upload(
    State(service): State<Arc<LedgerService>>,
    mut multipart: Multipart,
) -> ApiResult<Json<CombinedRecord>> {
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file data: {}", e)))?;

        info!(
            "上传文件: {} ({} bytes)",
            file_name.as_deref().unwrap_or("<unnamed>"),
            bytes.len()
        );
        images.push(EncodedImage::detect(
            bytes.to_vec(),
            content_type.as_deref(),
            file_name.as_deref(),
        ));
    }

    let combined = service.process_images(images).await?;
    Ok(Json(combined))
}
