//! Kyber KEM 包装器。
//!
//! 算法强度在进程内只能配置一次：第一个 [`KyberContext`] 记录它，之后再以
//! 相同强度构造上下文会成功，以不同强度构造则返回 [`KexError::InvalidStrength`]。
//! 上下文再显式地传给每个 [`KyberKeyPair`]。
//!
//! 接收方：`create_key_pair` 把公钥交给发送方，收到密文后 `decrypt_secret`。
//! 发送方：`create_secret(对方公钥)` 得到共享秘密和要发回的密文。

use std::sync::OnceLock;

use pqcrypto_traits::kem::{Ciphertext, PublicKey, SecretKey, SharedSecret};
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use super::{KexError, KyberStrength, at_least, exact};
use crate::seed::{EntropyCallback, EntropyInput};

/// KEM 原语的提供者。
pub trait KemBackend {
    fn algorithm(&self, strength: KyberStrength) -> &'static str;
    fn public_key_bytes(&self, strength: KyberStrength) -> usize;
    fn private_key_bytes(&self, strength: KyberStrength) -> usize;
    fn ciphertext_bytes(&self, strength: KyberStrength) -> usize;
    fn secret_bytes(&self, strength: KyberStrength) -> usize;

    /// 生成密钥对所需熵的 `(最小, 最大)` 长度。
    /// 返回 `None` 表示后端自己采样随机数，不接受外部熵。
    fn entropy_bounds(&self, strength: KyberStrength) -> Option<(usize, usize)>;

    /// 返回 `(公钥, 私钥)`。
    fn keypair(
        &self,
        strength: KyberStrength,
        entropy: Option<&[u8]>,
    ) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>), KexError>;

    /// 返回 `(共享秘密, 密文)`。
    fn encapsulate(
        &self,
        strength: KyberStrength,
        public_key: &[u8],
    ) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>), KexError>;

    fn decapsulate(
        &self,
        strength: KyberStrength,
        ciphertext: &[u8],
        private_key: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, KexError>;
}

/// 基于 `pqcrypto-kyber` 的后端。pqcrypto 自己采样随机数。
#[derive(Clone, Copy, Debug, Default)]
pub struct PqKyber;

macro_rules! kyber_dispatch {
    ($strength:expr, $m:ident => $body:expr) => {
        match $strength {
            KyberStrength::K512 => {
                use pqcrypto_kyber::kyber512 as $m;
                $body
            }
            KyberStrength::K768 => {
                use pqcrypto_kyber::kyber768 as $m;
                $body
            }
            KyberStrength::K1024 => {
                use pqcrypto_kyber::kyber1024 as $m;
                $body
            }
        }
    };
}

impl KemBackend for PqKyber {
    fn algorithm(&self, strength: KyberStrength) -> &'static str {
        match strength {
            KyberStrength::K512 => "Kyber512",
            KyberStrength::K768 => "Kyber768",
            KyberStrength::K1024 => "Kyber1024",
        }
    }

    fn public_key_bytes(&self, strength: KyberStrength) -> usize {
        kyber_dispatch!(strength, m => m::public_key_bytes())
    }

    fn private_key_bytes(&self, strength: KyberStrength) -> usize {
        kyber_dispatch!(strength, m => m::secret_key_bytes())
    }

    fn ciphertext_bytes(&self, strength: KyberStrength) -> usize {
        kyber_dispatch!(strength, m => m::ciphertext_bytes())
    }

    fn secret_bytes(&self, strength: KyberStrength) -> usize {
        kyber_dispatch!(strength, m => m::shared_secret_bytes())
    }

    fn entropy_bounds(&self, _strength: KyberStrength) -> Option<(usize, usize)> {
        None
    }

    fn keypair(
        &self,
        strength: KyberStrength,
        _entropy: Option<&[u8]>,
    ) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>), KexError> {
        Ok(kyber_dispatch!(strength, m => {
            let (pk, sk) = m::keypair();
            (pk.as_bytes().to_vec(), Zeroizing::new(sk.as_bytes().to_vec()))
        }))
    }

    fn encapsulate(
        &self,
        strength: KyberStrength,
        public_key: &[u8],
    ) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>), KexError> {
        kyber_dispatch!(strength, m => {
            let pk = m::PublicKey::from_bytes(public_key).map_err(|_| KexError::InvalidPublicKey)?;
            let (ss, ct) = m::encapsulate(&pk);
            Ok((Zeroizing::new(ss.as_bytes().to_vec()), ct.as_bytes().to_vec()))
        })
    }

    fn decapsulate(
        &self,
        strength: KyberStrength,
        ciphertext: &[u8],
        private_key: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, KexError> {
        kyber_dispatch!(strength, m => {
            let ct = m::Ciphertext::from_bytes(ciphertext).map_err(|_| KexError::InvalidCiphertext)?;
            let sk = m::SecretKey::from_bytes(private_key).map_err(|_| KexError::InvalidPrivateKey)?;
            let ss = m::decapsulate(&ct, &sk);
            Ok(Zeroizing::new(ss.as_bytes().to_vec()))
        })
    }
}

/// 进程内第一次配置的强度。
static CONFIGURED_STRENGTH: OnceLock<KyberStrength> = OnceLock::new();

/// 进程内已配置的 Kyber 强度；尚未构造任何上下文时为 `None`。
pub fn configured_strength() -> Option<KyberStrength> {
    CONFIGURED_STRENGTH.get().copied()
}

fn configure(strength: KyberStrength) -> Result<(), KexError> {
    let configured = *CONFIGURED_STRENGTH.get_or_init(|| {
        debug!(k = strength.k(), "kyber strength configured");
        strength
    });
    if configured != strength {
        warn!(
            configured = configured.k(),
            requested = strength.k(),
            "kyber strength already configured"
        );
        return Err(KexError::InvalidStrength(strength.k()));
    }
    Ok(())
}

/// 进程级的 Kyber 配置句柄。
#[derive(Clone, Debug)]
pub struct KyberContext<B: KemBackend = PqKyber> {
    strength: KyberStrength,
    backend: B,
}

impl KyberContext<PqKyber> {
    pub fn new(strength: KyberStrength) -> Result<Self, KexError> {
        Self::with_backend(strength, PqKyber)
    }
}

impl<B: KemBackend> KyberContext<B> {
    /// 强度与进程内已配置的不同时返回 [`KexError::InvalidStrength`]。
    pub fn with_backend(strength: KyberStrength, backend: B) -> Result<Self, KexError> {
        configure(strength)?;
        Ok(Self { strength, backend })
    }

    pub fn strength(&self) -> KyberStrength {
        self.strength
    }

    pub fn algorithm(&self) -> &'static str {
        self.backend.algorithm(self.strength)
    }

    pub fn public_key_bytes(&self) -> usize {
        self.backend.public_key_bytes(self.strength)
    }

    pub fn private_key_bytes(&self) -> usize {
        self.backend.private_key_bytes(self.strength)
    }

    pub fn ciphertext_bytes(&self) -> usize {
        self.backend.ciphertext_bytes(self.strength)
    }

    pub fn secret_bytes(&self) -> usize {
        self.backend.secret_bytes(self.strength)
    }

    pub fn entropy_bounds(&self) -> Option<(usize, usize)> {
        self.backend.entropy_bounds(self.strength)
    }

    /// 创建一个绑定到本上下文的密钥对。
    pub fn key_pair(&self) -> KyberKeyPair<'_, B> {
        KyberKeyPair::new(self)
    }
}

/// 一次性的 Kyber 密钥对。
pub struct KyberKeyPair<'c, B: KemBackend = PqKyber> {
    ctx: &'c KyberContext<B>,
    entropy: EntropyInput,
    public_key: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
    created: bool,
}

impl<'c, B: KemBackend> KyberKeyPair<'c, B> {
    pub fn new(ctx: &'c KyberContext<B>) -> Self {
        Self {
            ctx,
            entropy: EntropyInput::default(),
            public_key: vec![0u8; ctx.public_key_bytes()],
            private_key: Zeroizing::new(vec![0u8; ctx.private_key_bytes()]),
            created: false,
        }
    }

    pub fn context(&self) -> &'c KyberContext<B> {
        self.ctx
    }

    /// 是否持有尚未使用的私钥。
    pub fn has_keys(&self) -> bool {
        self.created
    }

    /// 设置生成密钥对的熵。后端声明了熵范围时检查长度；
    /// 自行采样随机数的后端忽略它。
    pub fn set_entropy(&mut self, entropy: Vec<u8>) -> Result<(), KexError> {
        if let Some((min, max)) = self.ctx.entropy_bounds() {
            if entropy.len() < min || entropy.len() > max {
                let actual = entropy.len();
                drop(Zeroizing::new(entropy));
                return Err(KexError::BufferSize { expected: min, actual });
            }
        }
        self.entropy.set(entropy);
        Ok(())
    }

    pub fn set_entropy_callback(&mut self, callback: Option<EntropyCallback>) {
        self.entropy.set_callback(callback);
    }

    /// 生成密钥对并把公钥复制到 `public_key`。
    ///
    /// 已经有密钥时不会重新生成，只是再次复制公钥，直到私钥被使用。
    pub fn create_key_pair(&mut self, public_key: &mut [u8]) -> Result<(), KexError> {
        let strength = self.ctx.strength;
        at_least(self.public_key.len(), public_key.len())?;
        if !self.created {
            let entropy = match self.ctx.entropy_bounds() {
                Some((min, max)) => Some(
                    self.entropy
                        .take(min, max)
                        .map_err(|_| KexError::EntropyFail)?,
                ),
                None => None,
            };
            let (pk, sk) = self.ctx.backend.keypair(strength, entropy.as_deref().map(|e| &e[..]))?;
            exact(self.public_key.len(), pk.len())?;
            exact(self.private_key.len(), sk.len())?;
            self.public_key.copy_from_slice(&pk);
            self.private_key.copy_from_slice(&sk);
            self.created = true;
            debug!(algorithm = self.ctx.algorithm(), "kyber key pair created");
        }
        public_key[..self.public_key.len()].copy_from_slice(&self.public_key);
        Ok(())
    }

    /// 发送方：用对方公钥封装一个共享秘密。不使用本方密钥。
    pub fn create_secret(
        &self,
        peer_public_key: &[u8],
        secret: &mut [u8],
        encrypted: &mut [u8],
    ) -> Result<(), KexError> {
        if peer_public_key.len() != self.ctx.public_key_bytes() {
            return Err(KexError::InvalidPublicKey);
        }
        at_least(self.ctx.secret_bytes(), secret.len())?;
        exact(self.ctx.ciphertext_bytes(), encrypted.len())?;

        let (ss, ct) = self.ctx.backend.encapsulate(self.ctx.strength, peer_public_key)?;
        secret[..ss.len()].copy_from_slice(&ss);
        encrypted.copy_from_slice(&ct);
        Ok(())
    }

    /// 接收方：用私钥解出共享秘密。无论成功与否，私钥随后被擦除。
    pub fn decrypt_secret(&mut self, encrypted: &[u8], secret: &mut [u8]) -> Result<(), KexError> {
        if !self.created {
            return Err(KexError::InvalidPrivateKey);
        }
        exact(self.ctx.ciphertext_bytes(), encrypted.len())?;
        at_least(self.ctx.secret_bytes(), secret.len())?;

        let result = self
            .ctx
            .backend
            .decapsulate(self.ctx.strength, encrypted, &self.private_key);
        self.private_key.zeroize();
        self.created = false;
        let ss = result?;
        secret[..ss.len()].copy_from_slice(&ss);
        debug!("kyber private key consumed");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 库的测试二进制只使用 K768，其余强度在各自的集成测试中覆盖
    fn context() -> KyberContext {
        KyberContext::new(KyberStrength::K768).unwrap()
    }

    #[test]
    fn round_trip() {
        let ctx = context();
        let mut receiver = ctx.key_pair();
        let sender = ctx.key_pair();

        let mut pk = vec![0u8; ctx.public_key_bytes()];
        receiver.create_key_pair(&mut pk).unwrap();

        let mut sender_secret = vec![0u8; ctx.secret_bytes()];
        let mut encrypted = vec![0u8; ctx.ciphertext_bytes()];
        sender.create_secret(&pk, &mut sender_secret, &mut encrypted).unwrap();

        let mut receiver_secret = vec![0u8; ctx.secret_bytes()];
        receiver.decrypt_secret(&encrypted, &mut receiver_secret).unwrap();
        assert_eq!(sender_secret, receiver_secret);
    }

    #[test]
    fn conflicting_strength_is_rejected() {
        let _ = context();
        assert_eq!(configured_strength(), Some(KyberStrength::K768));
        assert!(KyberContext::new(KyberStrength::K768).is_ok());
        assert_eq!(
            KyberContext::new(KyberStrength::K1024).err(),
            Some(KexError::InvalidStrength(1024))
        );
    }

    #[test]
    fn key_pair_is_idempotent_until_used() {
        let ctx = context();
        let mut kp = ctx.key_pair();
        let mut a = vec![0u8; ctx.public_key_bytes()];
        let mut b = vec![0u8; ctx.public_key_bytes()];
        kp.create_key_pair(&mut a).unwrap();
        kp.create_key_pair(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn private_key_is_single_use() {
        let ctx = context();
        let mut kp = ctx.key_pair();
        let mut pk = vec![0u8; ctx.public_key_bytes()];
        kp.create_key_pair(&mut pk).unwrap();
        assert!(kp.private_key().iter().any(|b| *b != 0));

        let bogus = vec![0u8; ctx.ciphertext_bytes()];
        let mut secret = vec![0u8; ctx.secret_bytes()];
        // Kyber 的隐式拒绝：错误的密文也会得到一个（无用的）秘密
        let _ = kp.decrypt_secret(&bogus, &mut secret);
        assert!(kp.private_key().iter().all(|b| *b == 0));
        assert!(!kp.has_keys());
        assert_eq!(
            kp.decrypt_secret(&bogus, &mut secret),
            Err(KexError::InvalidPrivateKey)
        );
    }

    #[test]
    fn sizes_are_enforced() {
        let ctx = context();
        let kp = ctx.key_pair();
        let mut secret = vec![0u8; ctx.secret_bytes()];
        let mut encrypted = vec![0u8; ctx.ciphertext_bytes()];
        assert_eq!(
            kp.create_secret(&[0u8; 10], &mut secret, &mut encrypted),
            Err(KexError::InvalidPublicKey)
        );
        let pk = vec![0u8; ctx.public_key_bytes()];
        let mut short = vec![0u8; ctx.ciphertext_bytes() - 1];
        assert!(matches!(
            kp.create_secret(&pk, &mut secret, &mut short),
            Err(KexError::BufferSize { .. })
        ));
    }
}
