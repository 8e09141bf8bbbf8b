//! 多模态模型调用能力

pub mod openai;

pub use openai::OpenAiVisionModel;

use crate::error::Result;
use crate::image::EncodedImage;
use async_trait::async_trait;

/// 外部多模态模型: (图片, 系统提示, 用户提示) -> 自由文本
///
/// 调用失败一律返回 `LedgerError::ModelInvocation`, 不在此处重试。
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe(
        &self,
        image: &EncodedImage,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String>;

    fn model_name(&self) -> &str;
}
