//! # 密钥交换
//!
//! 一次性的密钥对 / 共享秘密辅助工具，常用来为会话产生熵。
//!
//! - [`kyber`]：后量子 KEM（Kyber），需要 `post-quantum` 特性。
//! - [`ecdh`]：X25519，需要 `ecdh` 特性。
//!
//! 两者遵循相同的纪律：私钥最多参与一次秘密派生，之后立即擦除，无论成功与否；
//! 生成密钥对所需的熵来自回调、预设值或系统随机源（见 [`crate::seed::EntropyInput`]）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "ecdh")]
pub mod ecdh;
#[cfg(feature = "post-quantum")]
pub mod kyber;

#[cfg(feature = "ecdh")]
pub use ecdh::EcdhKeyPair;
#[cfg(feature = "post-quantum")]
pub use kyber::{KemBackend, KyberContext, KyberKeyPair, PqKyber, configured_strength};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KexError {
    #[error("invalid key exchange strength: {0}")]
    InvalidStrength(u16),
    #[error("entropy source failed")]
    EntropyFail,
    #[error("invalid public key")]
    InvalidPublicKey,
    /// 没有可用的私钥：尚未创建，或已经被使用过。
    #[error("no private key available")]
    InvalidPrivateKey,
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },
    #[error("invalid ciphertext")]
    InvalidCiphertext,
}

/// Kyber 安全级别。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KyberStrength {
    K512,
    #[default]
    K768,
    K1024,
}

impl KyberStrength {
    pub fn from_k(k: u16) -> Result<Self, KexError> {
        match k {
            512 => Ok(KyberStrength::K512),
            768 => Ok(KyberStrength::K768),
            1024 => Ok(KyberStrength::K1024),
            other => Err(KexError::InvalidStrength(other)),
        }
    }

    pub const fn k(self) -> u16 {
        match self {
            KyberStrength::K512 => 512,
            KyberStrength::K768 => 768,
            KyberStrength::K1024 => 1024,
        }
    }
}

/// 检查缓冲区长度是否恰好为 `expected`。
#[cfg(any(feature = "post-quantum", feature = "ecdh"))]
pub(crate) fn exact(expected: usize, actual: usize) -> Result<(), KexError> {
    if expected == actual {
        Ok(())
    } else {
        Err(KexError::BufferSize { expected, actual })
    }
}

/// 检查缓冲区是否至少有 `expected` 字节。
#[cfg(any(feature = "post-quantum", feature = "ecdh"))]
pub(crate) fn at_least(expected: usize, actual: usize) -> Result<(), KexError> {
    if actual >= expected {
        Ok(())
    } else {
        Err(KexError::BufferSize { expected, actual })
    }
}
