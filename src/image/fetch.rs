use super::{extension_of, sniff_mime, EncodedImage, SUPPORTED_EXTENSIONS};
use crate::error::{LedgerError, Result};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::time::Duration;
use tracing::{error, info};
use url::Url;

/// 远程图片下载器
#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// 下载一张图片; 非 200 或不支持的扩展名直接报错
    pub async fn fetch(&self, image_url: &str) -> Result<EncodedImage> {
        info!("处理中的图片 URL: {}", image_url);

        let parsed = Url::parse(image_url).map_err(|e| LedgerError::ImageFetch {
            url: image_url.to_string(),
            message: format!("invalid url: {}", e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LedgerError::ImageFetch {
                url: image_url.to_string(),
                message: format!("unsupported scheme: {}", parsed.scheme()),
            });
        }

        let ext = extension_of(parsed.path());
        if let Some(ext) = ext.as_deref() {
            if !SUPPORTED_EXTENSIONS.contains(&ext) {
                error!("不支持的文件格式: .{}", ext);
                return Err(LedgerError::UnsupportedImageType(format!(".{}", ext)));
            }
        }

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| LedgerError::ImageFetch {
                url: image_url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        info!("HTTP 响应状态: {}", status);
        if status != StatusCode::OK {
            error!("图片下载失败: {}", image_url);
            return Err(LedgerError::ImageFetch {
                url: image_url.to_string(),
                message: format!("status {}", status),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| LedgerError::ImageFetch {
            url: image_url.to_string(),
            message: e.to_string(),
        })?;

        // 无扩展名时必须由 content type 或魔数证明是图片
        if ext.is_none()
            && !content_type.as_deref().is_some_and(is_image_content_type)
            && sniff_mime(&bytes).is_none()
        {
            error!("下载内容不是图片: {} ({:?})", image_url, content_type);
            return Err(LedgerError::UnsupportedImageType(
                content_type.unwrap_or_else(|| "unknown content".to_string()),
            ));
        }

        Ok(EncodedImage::detect(
            bytes.to_vec(),
            content_type.as_deref(),
            Some(parsed.path()),
        ))
    }
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}
