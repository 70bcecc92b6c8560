//! 引擎状态码
//!
//! 每一次引擎调用都以一个 [`Status`] 报告结果。会话层把非成功状态作为
//! `Err(Status)` 返回，调用方必须根据状态而不是输出长度来分支。

use thiserror::Error;

/// 引擎和会话操作的状态。
///
/// `Err` 中永远不会出现 [`Status::Success`]。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 操作成功。
    #[error("{}: {}", self.name(), self.description())]
    Success,
    /// DRBG 发生不可恢复的错误，或提供的熵长度越界。
    #[error("{}: {}", self.name(), self.description())]
    DrbgCatastrophic,
    /// 重新播种计数器已超过 DRBG 的重新播种间隔。
    #[error("{}: {}", self.name(), self.description())]
    DrbgSeedLifeReached,
    /// 熵源（回调或系统随机源）无法提供熵。
    #[error("{}: {}", self.name(), self.description())]
    EntropyFail,
    /// 个性化字符串长度越界。
    #[error("{}: {}", self.name(), self.description())]
    InvalidPersonalization,
    /// nonce 长度越界。
    #[error("{}: {}", self.name(), self.description())]
    InvalidNonce,
    /// 会话尚未实例化，或已被反实例化。
    #[error("{}: {}", self.name(), self.description())]
    NotInstantiated,
    /// 输入格式错误（长度不对、Base64 无效等）。
    #[error("{}: {}", self.name(), self.description())]
    InvalidInput,
    /// 输出缓冲区不足。
    #[error("{}: {}", self.name(), self.description())]
    BufferTooSmall,
    /// 保存的状态长度或配置与当前会话不匹配。
    #[error("{}: {}", self.name(), self.description())]
    InvalidSavedState,
    /// 分块数据长度不是密码块大小的整数倍。
    #[error("{}: {}", self.name(), self.description())]
    InvalidChunkLength,
    /// 当前配置不支持该操作（例如在非托管密钥模式下分块加密）。
    #[error("{}: {}", self.name(), self.description())]
    Unsupported,
    /// 令牌校验失败：消息不是由匹配的编码器产生的。
    #[error("{}: {}", self.name(), self.description())]
    TokenMismatch,
    /// 完整性标签校验失败。
    #[error("{}: {}", self.name(), self.description())]
    TagMismatch,
    /// 序列号落在序列窗口之外。
    #[error("{}: {}", self.name(), self.description())]
    SeqOutsideWindow,
    /// 时间戳落在时间窗口之外。
    #[error("{}: {}", self.name(), self.description())]
    TimestampOutsideWindow,
}

impl Status {
    /// 所有状态，按数值顺序排列。
    pub const ALL: [Status; 16] = [
        Status::Success,
        Status::DrbgCatastrophic,
        Status::DrbgSeedLifeReached,
        Status::EntropyFail,
        Status::InvalidPersonalization,
        Status::InvalidNonce,
        Status::NotInstantiated,
        Status::InvalidInput,
        Status::BufferTooSmall,
        Status::InvalidSavedState,
        Status::InvalidChunkLength,
        Status::Unsupported,
        Status::TokenMismatch,
        Status::TagMismatch,
        Status::SeqOutsideWindow,
        Status::TimestampOutsideWindow,
    ];

    /// 状态的数量。
    pub const fn count() -> usize {
        Self::ALL.len()
    }

    /// 稳定的符号名称。
    pub const fn name(self) -> &'static str {
        match self {
            Status::Success => "status_success",
            Status::DrbgCatastrophic => "status_drbg_catastrophic",
            Status::DrbgSeedLifeReached => "status_drbg_seedlife_reached",
            Status::EntropyFail => "status_entropy_fail",
            Status::InvalidPersonalization => "status_invalid_personalization",
            Status::InvalidNonce => "status_invalid_nonce",
            Status::NotInstantiated => "status_not_instantiated",
            Status::InvalidInput => "status_invalid_input",
            Status::BufferTooSmall => "status_buffer_too_small",
            Status::InvalidSavedState => "status_invalid_saved_state",
            Status::InvalidChunkLength => "status_invalid_chunk_length",
            Status::Unsupported => "status_unsupported",
            Status::TokenMismatch => "status_token_mismatch",
            Status::TagMismatch => "status_tag_mismatch",
            Status::SeqOutsideWindow => "status_seq_outside_window",
            Status::TimestampOutsideWindow => "status_timestamp_outside_window",
        }
    }

    /// 面向人的描述。
    pub const fn description(self) -> &'static str {
        match self {
            Status::Success => "Success.",
            Status::DrbgCatastrophic => "Catastrophic DRBG error or entropy length out of bounds.",
            Status::DrbgSeedLifeReached => "DRBG reseed interval reached; reinstantiate with new entropy.",
            Status::EntropyFail => "Entropy source failed to provide entropy.",
            Status::InvalidPersonalization => "Personalization string length out of bounds.",
            Status::InvalidNonce => "Nonce length out of bounds.",
            Status::NotInstantiated => "Session is not instantiated.",
            Status::InvalidInput => "Input is malformed.",
            Status::BufferTooSmall => "Output buffer is too small.",
            Status::InvalidSavedState => "Saved state does not match this session's configuration.",
            Status::InvalidChunkLength => "Chunk length is not a multiple of the cipher block size.",
            Status::Unsupported => "Operation is not supported by this configuration.",
            Status::TokenMismatch => "Token does not match; message was not produced by a matching encoder.",
            Status::TagMismatch => "Integrity tag does not match.",
            Status::SeqOutsideWindow => "Sequence number is outside the sequence window.",
            Status::TimestampOutsideWindow => "Timestamp is outside the timestamp window.",
        }
    }

    /// 是否为错误状态。
    pub const fn is_error(self) -> bool {
        !matches!(self, Status::Success)
    }

    /// 根据符号名称查找状态。
    pub fn from_name(name: &str) -> Option<Status> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }
}
