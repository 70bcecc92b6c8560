//! 熵 / nonce / 时间戳来源
//!
//! 会话在实例化时向这里索取播种材料。每一种输入都遵循同一个模式：
//! 回调优先；没有回调时使用预先设置的值；熵在两者都缺失时退回到进程级
//! 随机源（`OsRng`），长度恰好取算法声明的下限。
//!
//! 交给 [`EntropyInput::set`] 的熵属于所有权转移：它被包装进
//! [`Zeroizing`]，在被一次实例化消耗后擦除。

use rand_core::{OsRng, TryRngCore};
use zeroize::Zeroizing;

use crate::status::Status;

/// 熵回调：接收 `(最小长度, 最大长度)`，返回熵或失败状态。
pub type EntropyCallback = Box<dyn FnMut(usize, usize) -> Result<Zeroizing<Vec<u8>>, Status> + Send>;

/// nonce 回调：接收 `(最小长度, 最大长度)`，返回 nonce。
pub type NonceCallback = Box<dyn FnMut(usize, usize) -> Vec<u8> + Send>;

/// 时间戳回调。
pub type TimestampCallback = Box<dyn FnMut() -> u64 + Send>;

/// 从进程级随机源取恰好 `bytes` 字节的熵。
pub fn random_entropy(bytes: usize) -> Result<Zeroizing<Vec<u8>>, Status> {
    let mut buf = Zeroizing::new(vec![0u8; bytes]);
    OsRng.try_fill_bytes(&mut buf).map_err(|_| Status::EntropyFail)?;
    Ok(buf)
}

/// 可插拔的熵输入：回调、预设值或系统随机源。
#[derive(Default)]
pub struct EntropyInput {
    callback: Option<EntropyCallback>,
    preset: Option<Zeroizing<Vec<u8>>>,
}

impl EntropyInput {
    /// 设置熵。值被移动进来，在下一次消耗后擦除。
    pub fn set(&mut self, entropy: Vec<u8>) {
        self.preset = Some(Zeroizing::new(entropy));
    }

    /// 设置或清除熵回调。
    pub fn set_callback(&mut self, callback: Option<EntropyCallback>) {
        self.callback = callback;
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// 是否有尚未消耗的预设熵。
    pub fn has_preset(&self) -> bool {
        self.preset.is_some()
    }

    /// 取出一份熵并检查长度。
    ///
    /// 长度越界时返回 [`Status::DrbgCatastrophic`]；预设值无论成功与否都会被消耗。
    pub fn take(&mut self, min: usize, max: usize) -> Result<Zeroizing<Vec<u8>>, Status> {
        let entropy = if let Some(cb) = self.callback.as_mut() {
            cb(min, max)?
        } else {
            match self.preset.take() {
                Some(preset) => preset,
                None => random_entropy(min)?,
            }
        };
        if entropy.len() < min || entropy.len() > max {
            return Err(Status::DrbgCatastrophic);
        }
        Ok(entropy)
    }
}

/// 一个会话的播种材料来源。
pub struct SeedSource {
    entropy: EntropyInput,
    nonce_callback: Option<NonceCallback>,
    nonce: Vec<u8>,
    nonce_int_bytes: usize,
    timestamp_callback: Option<TimestampCallback>,
}

impl SeedSource {
    pub(crate) fn new(nonce_int_bytes: usize) -> Self {
        Self {
            entropy: EntropyInput::default(),
            nonce_callback: None,
            // 未设置时相当于整数 nonce 0
            nonce: vec![0u8; nonce_int_bytes],
            nonce_int_bytes,
            timestamp_callback: None,
        }
    }

    pub fn set_entropy(&mut self, entropy: Vec<u8>) {
        self.entropy.set(entropy);
    }

    pub fn set_entropy_callback(&mut self, callback: Option<EntropyCallback>) {
        self.entropy.set_callback(callback);
    }

    pub fn set_nonce(&mut self, nonce: impl Into<Vec<u8>>) {
        self.nonce = nonce.into();
    }

    /// 以小端字节序设置整数 nonce，补零到 DRBG 的整数 nonce 长度。
    pub fn set_nonce_u64(&mut self, nonce: u64) {
        let mut bytes = vec![0u8; self.nonce_int_bytes];
        let le = nonce.to_le_bytes();
        let n = le.len().min(bytes.len());
        bytes[..n].copy_from_slice(&le[..n]);
        self.nonce = bytes;
    }

    pub fn set_nonce_callback(&mut self, callback: Option<NonceCallback>) {
        self.nonce_callback = callback;
    }

    /// 设置或清除时间戳回调。没有回调时时间戳为 0。
    pub fn set_timestamp_callback(&mut self, callback: Option<TimestampCallback>) {
        self.timestamp_callback = callback;
    }

    /// 清除所有回调。
    pub fn clear_callbacks(&mut self) {
        self.entropy.set_callback(None);
        self.nonce_callback = None;
        self.timestamp_callback = None;
    }

    pub(crate) fn entropy(&mut self, min: usize, max: usize) -> Result<Zeroizing<Vec<u8>>, Status> {
        self.entropy.take(min, max)
    }

    pub(crate) fn nonce(&mut self, min: usize, max: usize) -> Vec<u8> {
        match self.nonce_callback.as_mut() {
            Some(cb) => cb(min, max),
            None => self.nonce.clone(),
        }
    }

    pub(crate) fn timestamp(&mut self) -> u64 {
        self.timestamp_callback.as_mut().map_or(0, |cb| cb())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_entropy_is_consumed() {
        let mut input = EntropyInput::default();
        input.set(vec![7u8; 32]);
        assert!(input.has_preset());
        let e = input.take(32, 64).unwrap();
        assert_eq!(&e[..], &[7u8; 32]);
        assert!(!input.has_preset());
    }

    #[test]
    fn out_of_bounds_entropy_is_catastrophic() {
        let mut input = EntropyInput::default();
        input.set(vec![1u8; 8]);
        assert_eq!(input.take(32, 64).unwrap_err(), Status::DrbgCatastrophic);
        // 失败后预设值同样被消耗
        assert!(!input.has_preset());
    }

    #[test]
    fn callback_wins_over_preset() {
        let mut input = EntropyInput::default();
        input.set(vec![1u8; 32]);
        input.set_callback(Some(Box::new(|min, _max| Ok(Zeroizing::new(vec![9u8; min])))));
        let e = input.take(40, 64).unwrap();
        assert_eq!(e.len(), 40);
        assert!(e.iter().all(|b| *b == 9));
    }

    #[test]
    fn missing_entropy_falls_back_to_os_random() {
        let mut input = EntropyInput::default();
        let e = input.take(48, 4096).unwrap();
        assert_eq!(e.len(), 48);
    }

    #[test]
    fn integer_nonce_is_little_endian_and_padded() {
        let mut seeds = SeedSource::new(16);
        seeds.set_nonce_u64(0x0102);
        let n = seeds.nonce(16, 32);
        assert_eq!(n.len(), 16);
        assert_eq!(&n[..3], &[0x02, 0x01, 0x00]);
        assert!(n[8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn timestamp_defaults_to_zero() {
        let mut seeds = SeedSource::new(8);
        assert_eq!(seeds.timestamp(), 0);
        seeds.set_timestamp_callback(Some(Box::new(|| 42)));
        assert_eq!(seeds.timestamp(), 42);
    }
}
