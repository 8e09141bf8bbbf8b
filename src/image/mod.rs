//! 图片获取与编码: 本地文件 / 上传字节 / 远程 URL -> 带 MIME 的字节

pub mod fetch;

pub use fetch::ImageFetcher;

use crate::error::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::Path;

/// 允许的图片扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// 已读入内存、待发送给模型的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// 按 content type -> 文件名扩展名 -> 魔数 的顺序确定 MIME
    pub fn detect(data: Vec<u8>, content_type: Option<&str>, file_name: Option<&str>) -> Self {
        let mime_type = content_type
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .filter(|ct| ct.starts_with("image/"))
            .or_else(|| file_name.and_then(mime_from_file_name).map(str::to_string))
            .or_else(|| sniff_mime(&data).map(str::to_string))
            .unwrap_or_else(|| "image/jpeg".to_string());
        Self { mime_type, data }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 读取本地图片文件
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<EncodedImage> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    let file_name = path.file_name().and_then(|n| n.to_str());
    Ok(EncodedImage::detect(data, None, file_name))
}

/// 小写扩展名, 不含点
pub fn extension_of(name: &str) -> Option<String> {
    let file = name.rsplit('/').next().unwrap_or(name);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn mime_from_file_name(name: &str) -> Option<&'static str> {
    extension_of(name).as_deref().and_then(mime_from_extension)
}

pub(crate) fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn content_type_wins_over_extension() {
        let img = EncodedImage::detect(vec![1, 2, 3], Some("image/png; q=1"), Some("a.jpg"));
        assert_eq!(img.mime_type, "image/png");
    }

    #[test]
    fn non_image_content_type_falls_back_to_extension() {
        let img =
            EncodedImage::detect(vec![1], Some("application/octet-stream"), Some("scan.WEBP"));
        assert_eq!(img.mime_type, "image/webp");
    }

    #[test]
    fn magic_bytes_are_sniffed() {
        let img = EncodedImage::detect(PNG_HEADER.to_vec(), None, None);
        assert_eq!(img.mime_type, "image/png");
    }

    #[test]
    fn unknown_defaults_to_jpeg() {
        let img = EncodedImage::detect(b"dummy_image_data".to_vec(), None, Some("dummy"));
        assert_eq!(img.mime_type, "image/jpeg");
    }

    #[test]
    fn data_url_is_base64() {
        let img = EncodedImage::new("image/jpeg", b"abc".to_vec());
        assert_eq!(img.data_url(), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn extension_parsing() {
        assert_eq!(extension_of("receipts/IMG_01.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("receipts/noext"), None);
        assert_eq!(extension_of(".hidden"), None);
    }

    #[tokio::test]
    async fn load_from_path_uses_file_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        tokio::fs::write(&path, b"not really a png").await.unwrap();

        let img = load_from_path(&path).await.unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert_eq!(img.len(), 16);
    }

    #[tokio::test]
    async fn load_from_missing_path_is_io_error() {
        let err = load_from_path("/definitely/not/here.jpg").await.unwrap_err();
        assert!(matches!(err, crate::error::LedgerError::Io(_)));
    }
}
