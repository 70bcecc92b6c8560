//! 算法选项
//!
//! 描述一个会话使用哪种 DRBG、令牌大小、校验器、密码和哈希。这些选项是
//! 纯数据：是否合法由引擎的 `state_bytes` 判定（返回 0 表示非法组合）。

use serde::{Deserialize, Serialize};

/// DRBG 算法。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Drbg {
    /// HMAC-DRBG (SHA-256)
    #[default]
    HmacSha256,
    /// HMAC-DRBG (SHA-512)
    HmacSha512,
    /// 递增生成器，仅用于测试。输出可预测，并支持故障注入。
    Incr,
}

impl Drbg {
    pub const ALL: [Drbg; 3] = [Drbg::HmacSha256, Drbg::HmacSha512, Drbg::Incr];

    pub const fn name(self) -> &'static str {
        match self {
            Drbg::HmacSha256 => "hmac_sha256",
            Drbg::HmacSha512 => "hmac_sha512",
            Drbg::Incr => "incr",
        }
    }

    pub fn from_name(name: &str) -> Option<Drbg> {
        Self::ALL.iter().copied().find(|d| d.name() == name)
    }

    /// 安全强度（字节）。
    pub const fn sec_strength_bytes(self) -> usize {
        match self {
            Drbg::HmacSha256 | Drbg::HmacSha512 => 32,
            Drbg::Incr => 0,
        }
    }

    pub const fn personal_min_bytes(self) -> usize {
        0
    }

    pub const fn personal_max_bytes(self) -> usize {
        4096
    }

    pub const fn entropy_min_bytes(self) -> usize {
        match self {
            Drbg::HmacSha256 | Drbg::HmacSha512 => 32,
            Drbg::Incr => 1,
        }
    }

    pub const fn entropy_max_bytes(self) -> usize {
        4096
    }

    pub const fn nonce_min_bytes(self) -> usize {
        match self {
            Drbg::HmacSha256 | Drbg::HmacSha512 => 16,
            Drbg::Incr => 0,
        }
    }

    pub const fn nonce_max_bytes(self) -> usize {
        32
    }

    /// 重新播种间隔：实例化之后允许的生成调用次数。
    pub const fn reseed_interval(self) -> u64 {
        match self {
            Drbg::HmacSha256 | Drbg::HmacSha512 => 1 << 48,
            Drbg::Incr => 256,
        }
    }

    /// 以整数形式设置 nonce 时使用的字节数。
    ///
    /// 理想长度是 `u64` 的大小，但必须落在 DRBG 允许的范围内。
    pub const fn nonce_int_bytes(self) -> usize {
        let capped = if self.nonce_max_bytes() < 8 { self.nonce_max_bytes() } else { 8 };
        if self.nonce_min_bytes() > capped { self.nonce_min_bytes() } else { capped }
    }

    pub(crate) const fn id(self) -> u8 {
        match self {
            Drbg::HmacSha256 => 1,
            Drbg::HmacSha512 => 2,
            Drbg::Incr => 3,
        }
    }
}

/// 消息校验器：消息中是否携带序列号和/或 64 位时间戳。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verifiers {
    #[default]
    None,
    Seq,
    T64,
    T64Seq,
}

impl Verifiers {
    pub const ALL: [Verifiers; 4] = [Verifiers::None, Verifiers::Seq, Verifiers::T64, Verifiers::T64Seq];

    pub const fn name(self) -> &'static str {
        match self {
            Verifiers::None => "none",
            Verifiers::Seq => "seq",
            Verifiers::T64 => "t64",
            Verifiers::T64Seq => "t64_seq",
        }
    }

    pub fn from_name(name: &str) -> Option<Verifiers> {
        Self::ALL.iter().copied().find(|v| v.name() == name)
    }

    pub const fn has_seq(self) -> bool {
        matches!(self, Verifiers::Seq | Verifiers::T64Seq)
    }

    pub const fn has_timestamp(self) -> bool {
        matches!(self, Verifiers::T64 | Verifiers::T64Seq)
    }

    /// 校验头的字节数。
    pub const fn header_bytes(self) -> usize {
        (if self.has_seq() { 4 } else { 0 }) + (if self.has_timestamp() { 8 } else { 0 })
    }

    pub(crate) const fn id(self) -> u8 {
        match self {
            Verifiers::None => 0,
            Verifiers::Seq => 1,
            Verifiers::T64 => 2,
            Verifiers::T64Seq => 3,
        }
    }
}

/// 托管密钥模式使用的密码。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cipher {
    #[default]
    None,
    Aes128Ctr,
    Aes256Ctr,
}

impl Cipher {
    pub const ALL: [Cipher; 3] = [Cipher::None, Cipher::Aes128Ctr, Cipher::Aes256Ctr];

    pub const fn name(self) -> &'static str {
        match self {
            Cipher::None => "none",
            Cipher::Aes128Ctr => "aes128_ctr",
            Cipher::Aes256Ctr => "aes256_ctr",
        }
    }

    pub fn from_name(name: &str) -> Option<Cipher> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// 块大小（字节），无密码时为 0。
    pub const fn block_bytes(self) -> usize {
        match self {
            Cipher::None => 0,
            Cipher::Aes128Ctr | Cipher::Aes256Ctr => 16,
        }
    }

    pub const fn key_bytes(self) -> usize {
        match self {
            Cipher::None => 0,
            Cipher::Aes128Ctr => 16,
            Cipher::Aes256Ctr => 32,
        }
    }

    pub(crate) const fn id(self) -> u8 {
        match self {
            Cipher::None => 0,
            Cipher::Aes128Ctr => 1,
            Cipher::Aes256Ctr => 2,
        }
    }
}

/// 托管密钥模式使用的完整性哈希。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hash {
    #[default]
    None,
    Sha256,
    Sha512,
}

impl Hash {
    pub const ALL: [Hash; 3] = [Hash::None, Hash::Sha256, Hash::Sha512];

    pub const fn name(self) -> &'static str {
        match self {
            Hash::None => "none",
            Hash::Sha256 => "sha256",
            Hash::Sha512 => "sha512",
        }
    }

    pub fn from_name(name: &str) -> Option<Hash> {
        Self::ALL.iter().copied().find(|h| h.name() == name)
    }

    /// 摘要长度（字节）。
    pub const fn digest_bytes(self) -> usize {
        match self {
            Hash::None => 0,
            Hash::Sha256 => 32,
            Hash::Sha512 => 64,
        }
    }

    pub(crate) const fn id(self) -> u8 {
        match self {
            Hash::None => 0,
            Hash::Sha256 => 1,
            Hash::Sha512 => 2,
        }
    }
}

/// 一个会话的完整选项。
///
/// `t_window` 与 `s_window` 只对解码器有意义，编码器忽略它们。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub drbg: Drbg,
    /// 每个数据字节编码成的令牌字节数。
    pub tok_bytes: u8,
    pub verifiers: Verifiers,
    pub cipher: Cipher,
    pub hash: Hash,
    /// 定长模式：编码前把数据补零或截断到这个长度。
    pub fixed_bytes: Option<u32>,
    /// 时间戳窗口，0 表示不检查。
    pub t_window: u64,
    /// 序列窗口：允许跳过的最多消息数。
    pub s_window: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            drbg: Drbg::default(),
            tok_bytes: 8,
            verifiers: Verifiers::None,
            cipher: Cipher::None,
            hash: Hash::None,
            fixed_bytes: None,
            t_window: 0,
            s_window: 0,
        }
    }
}

impl Options {
    /// 托管密钥（加密 + 完整性）模式的默认选项。
    pub fn managed() -> Self {
        Self {
            cipher: Cipher::Aes256Ctr,
            hash: Hash::Sha256,
            ..Self::default()
        }
    }

    pub fn with_drbg(mut self, drbg: Drbg) -> Self {
        self.drbg = drbg;
        self
    }

    pub fn with_tok_bytes(mut self, tok_bytes: u8) -> Self {
        self.tok_bytes = tok_bytes;
        self
    }

    pub fn with_verifiers(mut self, verifiers: Verifiers) -> Self {
        self.verifiers = verifiers;
        self
    }

    pub fn with_cipher(mut self, cipher: Cipher, hash: Hash) -> Self {
        self.cipher = cipher;
        self.hash = hash;
        self
    }

    pub fn with_fixed_bytes(mut self, fixed_bytes: u32) -> Self {
        self.fixed_bytes = Some(fixed_bytes);
        self
    }

    pub fn with_windows(mut self, t_window: u64, s_window: u32) -> Self {
        self.t_window = t_window;
        self.s_window = s_window;
        self
    }

    /// 是否为托管密钥模式。
    pub const fn is_managed(&self) -> bool {
        !matches!(self.cipher, Cipher::None)
    }

    /// 组合是否合法。
    pub fn is_valid(&self) -> bool {
        if self.tok_bytes == 0 {
            return false;
        }
        let has_cipher = !matches!(self.cipher, Cipher::None);
        let has_hash = !matches!(self.hash, Hash::None);
        if has_cipher != has_hash {
            return false;
        }
        match self.fixed_bytes {
            Some(0) => false,
            Some(_) => !has_cipher,
            None => true,
        }
    }
}
