//! X25519 ECDH 包装器。
//!
//! 私钥直接取自 32 字节的熵（回调、预设值或系统随机源），
//! 共享秘密派生一次之后两把密钥都被擦除。

use tracing::debug;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

use super::{KexError, at_least};
use crate::seed::{EntropyCallback, EntropyInput};

pub const PUBLIC_KEY_BYTES: usize = 32;
pub const PRIVATE_KEY_BYTES: usize = 32;
pub const SECRET_BYTES: usize = 32;

/// 一次性的 X25519 密钥对。
#[derive(Default)]
pub struct EcdhKeyPair {
    entropy: EntropyInput,
    public_key: [u8; PUBLIC_KEY_BYTES],
    private_key: Zeroizing<[u8; PRIVATE_KEY_BYTES]>,
    created: bool,
}

impl EcdhKeyPair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_keys(&self) -> bool {
        self.created
    }

    /// 设置私钥熵，必须恰好 32 字节。
    pub fn set_entropy(&mut self, entropy: Vec<u8>) -> Result<(), KexError> {
        if entropy.len() != PRIVATE_KEY_BYTES {
            let actual = entropy.len();
            drop(Zeroizing::new(entropy));
            return Err(KexError::BufferSize {
                expected: PRIVATE_KEY_BYTES,
                actual,
            });
        }
        self.entropy.set(entropy);
        Ok(())
    }

    pub fn set_entropy_callback(&mut self, callback: Option<EntropyCallback>) {
        self.entropy.set_callback(callback);
    }

    /// 生成密钥对并复制公钥；已有密钥时只复制。
    pub fn create_key_pair(&mut self, public_key: &mut [u8]) -> Result<(), KexError> {
        at_least(PUBLIC_KEY_BYTES, public_key.len())?;
        if !self.created {
            let entropy = self
                .entropy
                .take(PRIVATE_KEY_BYTES, PRIVATE_KEY_BYTES)
                .map_err(|_| KexError::EntropyFail)?;
            self.private_key.copy_from_slice(&entropy);
            let secret = StaticSecret::from(*self.private_key);
            self.public_key = PublicKey::from(&secret).to_bytes();
            self.created = true;
            debug!("x25519 key pair created");
        }
        public_key[..PUBLIC_KEY_BYTES].copy_from_slice(&self.public_key);
        Ok(())
    }

    /// 与对方公钥派生共享秘密。尝试之后两把密钥都被擦除。
    ///
    /// 低阶点（不贡献熵的公钥）返回 [`KexError::InvalidPublicKey`]。
    pub fn create_secret(&mut self, peer_public_key: &[u8], secret: &mut [u8]) -> Result<(), KexError> {
        if !self.created {
            return Err(KexError::InvalidPrivateKey);
        }
        at_least(SECRET_BYTES, secret.len())?;
        let peer: [u8; PUBLIC_KEY_BYTES] = peer_public_key
            .try_into()
            .map_err(|_| KexError::InvalidPublicKey)?;

        let ours = StaticSecret::from(*self.private_key);
        let shared = ours.diffie_hellman(&PublicKey::from(peer));
        self.private_key.zeroize();
        self.public_key.zeroize();
        self.created = false;

        if !shared.was_contributory() {
            return Err(KexError::InvalidPublicKey);
        }
        secret[..SECRET_BYTES].copy_from_slice(shared.as_bytes());
        debug!("x25519 private key consumed");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn private_key(&self) -> &[u8] {
        &self.private_key[..]
    }
}
