use thiserror::Error;

/// 统一结果类型
pub type Result<T> = std::result::Result<T, LedgerError>;

/// 账本识别错误
#[derive(Error, Debug)]
pub enum LedgerError {
    /// 模型调用本身失败 (网络 / 认证 / 配额)
    #[error("Model invocation failed: {message}")]
    ModelInvocation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// 模型返回了无法解析的内容, 附带原始回复
    #[error("Malformed model response: {reason}")]
    MalformedResponse { reason: String, raw_reply: String },

    /// 没有提交任何图片
    #[error("No images were submitted")]
    EmptyInput,

    #[error("Image download failed: {url} ({message})")]
    ImageFetch { url: String, message: String },

    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn model(message: impl Into<String>) -> Self {
        Self::ModelInvocation {
            message: message.into(),
            source: None,
        }
    }

    pub fn model_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ModelInvocation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn malformed(reason: impl Into<String>, raw_reply: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw_reply: raw_reply.into(),
        }
    }

    /// 稳定的错误码, 供各传输层输出
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModelInvocation { .. } => "MODEL_INVOCATION_ERROR",
            Self::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            Self::EmptyInput => "EMPTY_INPUT",
            Self::ImageFetch { .. } => "IMAGE_FETCH_ERROR",
            Self::UnsupportedImageType(_) => "UNSUPPORTED_IMAGE_TYPE",
            Self::Io(_) => "IO_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
