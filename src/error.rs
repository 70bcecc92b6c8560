//! Defines the custom error type for the `seal-sdr` crate.

use crate::status::Status;
use thiserror::Error;

#[cfg(any(feature = "post-quantum", feature = "ecdh"))]
use crate::kex::KexError;

/// The main error type for the `seal-sdr` crate.
///
/// 会话的逐次调用以 [`Status`] 报告结果；这个类型用于构造期的配置错误、
/// SDR 的存储错误，以及把引擎状态连同上下文一起向上传递。
#[derive(Debug, Error)]
pub enum Error {
    /// 算法或尺寸参数无效。属于编程/部署错误，不应重试。
    #[error("invalid configuration: {0}")]
    Config(String),

    /// 引擎调用失败，附带符号名称与描述。
    #[error("{context} ({}): {}", .status.name(), .status.description())]
    Engine {
        context: &'static str,
        status: Status,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding from Base64 failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("configuration serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid data format: {0}")]
    Format(String),

    /// SDR 在 `init_sdr` 之前被使用。
    #[error("SDR is not initialized")]
    NotInitialized,

    #[cfg(any(feature = "post-quantum", feature = "ecdh"))]
    #[error("key exchange error: {0}")]
    KeyExchange(#[from] KexError),
}

impl Error {
    /// 把引擎状态包装成带上下文的错误。
    pub fn engine(context: &'static str, status: Status) -> Self {
        Error::Engine { context, status }
    }

    /// 如果是引擎错误，返回其状态。
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }
}
