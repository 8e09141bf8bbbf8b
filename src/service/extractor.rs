use crate::config::PromptConfig;
use crate::error::{LedgerError, Result};
use crate::image::EncodedImage;
use crate::llm::VisionModel;
use crate::models::ReceiptRecord;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const JSON_FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// 单张图片 -> ReceiptRecord
pub struct Extractor {
    model: Arc<dyn VisionModel>,
    prompts: PromptConfig,
}

impl Extractor {
    pub fn new(model: Arc<dyn VisionModel>, prompts: PromptConfig) -> Result<Self> {
        prompts.validate()?;
        Ok(Self { model, prompts })
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// 调用模型并解析回复; 模型失败与解析失败分别报错, 不做猜测
    pub async fn extract(&self, image: &EncodedImage) -> Result<ReceiptRecord> {
        let reply = self
            .model
            .describe(image, &self.prompts.system_prompt, &self.prompts.user_prompt)
            .await?;

        let record = parse_reply(&reply)?;
        info!(
            "识别完成: date={:?}, items={}, total={:?}",
            record.date,
            record.items.len(),
            record.total_amount
        );
        Ok(record)
    }
}

/// 去掉 ```json ... ``` 代码块包裹; 其他格式原样返回
pub fn normalize_reply(reply: &str) -> &str {
    let trimmed = reply.trim();
    match trimmed
        .strip_prefix(JSON_FENCE_OPEN)
        .and_then(|rest| rest.strip_suffix(FENCE_CLOSE))
    {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}

/// 规范化后按 ReceiptRecord 结构解析, 任何结构不符都返回 MalformedResponse
pub fn parse_reply(reply: &str) -> Result<ReceiptRecord> {
    let body = normalize_reply(reply);

    let value: Value = serde_json::from_str(body).map_err(|e| {
        warn!("模型回复不是合法 JSON: {}", e);
        LedgerError::malformed(format!("invalid JSON: {}", e), reply)
    })?;

    if !value.is_object() {
        return Err(LedgerError::malformed(
            format!("expected a JSON object, got {}", json_kind(&value)),
            reply,
        ));
    }

    let record: ReceiptRecord = serde_json::from_value(value)
        .map_err(|e| LedgerError::malformed(format!("unexpected shape: {}", e), reply))?;

    if let Some(pos) = record.items.iter().position(|i| i.name.trim().is_empty()) {
        return Err(LedgerError::malformed(
            format!("item #{} has an empty name", pos),
            reply,
        ));
    }

    Ok(record)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
