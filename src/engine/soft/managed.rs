//! 托管密钥模式：AES-CTR 加密 + HMAC 完整性标签。
//!
//! 每条消息从 DRBG 取一份材料，依次切分为密码密钥、16 字节计数器初始值和
//! 32 字节 MAC 密钥。消息格式为 `密文 ‖ 校验头 ‖ 标签`，标签覆盖密文与校验头，
//! 所以整条编码与逐块加密再 finish 得到的字节完全相同。

use aes::{Aes128, Aes256};
use ctr::Ctr128BE;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use super::SoftState;
use crate::options::{Cipher, Hash};
use crate::status::Status;

pub(crate) const IV_BYTES: usize = 16;
pub(crate) const MAC_KEY_BYTES: usize = 32;

/// 一条消息所需材料的字节数。
pub(crate) const fn material_bytes(cipher: Cipher) -> usize {
    cipher.key_bytes() + IV_BYTES + MAC_KEY_BYTES
}

pub(crate) enum CtrCipher {
    Aes128(Ctr128BE<Aes128>),
    Aes256(Ctr128BE<Aes256>),
}

impl CtrCipher {
    fn new(cipher: Cipher, key: &[u8], iv: &[u8]) -> Result<Self, Status> {
        match cipher {
            Cipher::Aes128Ctr => Ctr128BE::<Aes128>::new_from_slices(key, iv)
                .map(CtrCipher::Aes128)
                .map_err(|_| Status::DrbgCatastrophic),
            Cipher::Aes256Ctr => Ctr128BE::<Aes256>::new_from_slices(key, iv)
                .map(CtrCipher::Aes256)
                .map_err(|_| Status::DrbgCatastrophic),
            Cipher::None => Err(Status::Unsupported),
        }
    }

    pub(crate) fn apply(&mut self, data: &mut [u8]) {
        match self {
            CtrCipher::Aes128(c) => c.apply_keystream(data),
            CtrCipher::Aes256(c) => c.apply_keystream(data),
        }
    }
}

pub(crate) enum MacState {
    Sha256(Hmac<Sha256>),
    Sha512(Hmac<Sha512>),
}

impl MacState {
    fn new(hash: Hash, key: &[u8]) -> Result<Self, Status> {
        match hash {
            Hash::Sha256 => <Hmac<Sha256> as Mac>::new_from_slice(key)
                .map(MacState::Sha256)
                .map_err(|_| Status::DrbgCatastrophic),
            Hash::Sha512 => <Hmac<Sha512> as Mac>::new_from_slice(key)
                .map(MacState::Sha512)
                .map_err(|_| Status::DrbgCatastrophic),
            Hash::None => Err(Status::Unsupported),
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            MacState::Sha256(m) => m.update(data),
            MacState::Sha512(m) => m.update(data),
        }
    }

    pub(crate) fn finalize_into(self, out: &mut [u8]) {
        match self {
            MacState::Sha256(m) => out.copy_from_slice(&m.finalize().into_bytes()),
            MacState::Sha512(m) => out.copy_from_slice(&m.finalize().into_bytes()),
        }
    }

    /// 常数时间比较标签。
    pub(crate) fn verify(self, tag: &[u8]) -> Result<(), Status> {
        let ok = match self {
            MacState::Sha256(m) => m.verify_slice(tag).is_ok(),
            MacState::Sha512(m) => m.verify_slice(tag).is_ok(),
        };
        if ok { Ok(()) } else { Err(Status::TagMismatch) }
    }
}

/// 一条消息的密码与 MAC 状态。
pub(crate) struct MessageKeys {
    pub(crate) cipher: CtrCipher,
    pub(crate) mac: MacState,
}

impl MessageKeys {
    /// 从状态的 DRBG 取下一份材料。调用者负责推进序列号。
    pub(crate) fn derive(state: &mut SoftState, faults: &super::IncrFaults) -> Result<Self, Status> {
        let cipher = state.options.cipher;
        let key_bytes = cipher.key_bytes();
        let mut material = Zeroizing::new(vec![0u8; material_bytes(cipher)]);
        state.drbg.generate(&mut material, faults)?;
        let (key, rest) = material.split_at(key_bytes);
        let (iv, mac_key) = rest.split_at(IV_BYTES);
        Ok(Self {
            cipher: CtrCipher::new(cipher, key, iv)?,
            mac: MacState::new(state.options.hash, mac_key)?,
        })
    }
}

/// 分块加密状态。
pub struct EncryptState {
    pub(crate) keys: MessageKeys,
    pub(crate) header: Vec<u8>,
    pub(crate) block_bytes: usize,
    pub(crate) digest_bytes: usize,
}

/// 分块解密状态。
///
/// `pending` 是推进到下一条消息之后的会话状态，只有标签校验通过才会替换
/// 会话的当前状态。最后 `trailer_bytes` 个字节（校验头 + 标签）被扣留，
/// 直到 finish 时才被解析。
pub struct DecryptState {
    pub(crate) pending: SoftState,
    pub(crate) expected_seq: u32,
    pub(crate) keys: MessageKeys,
    pub(crate) held: Zeroizing<Vec<u8>>,
    pub(crate) trailer_bytes: usize,
}

impl DecryptState {
    /// 接收一段密文，输出可以确定不属于尾部的那部分明文。
    pub(crate) fn feed(&mut self, encrypted: &[u8], out: &mut [u8]) -> Result<usize, Status> {
        let available = self.held.len() + encrypted.len();
        let release = available.saturating_sub(self.trailer_bytes);
        if out.len() < release {
            return Err(Status::BufferTooSmall);
        }
        self.held.extend_from_slice(encrypted);
        out[..release].copy_from_slice(&self.held[..release]);
        self.keys.mac.update(&out[..release]);
        self.keys.cipher.apply(&mut out[..release]);
        self.held.drain(..release);
        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_sizes() {
        assert_eq!(material_bytes(Cipher::Aes128Ctr), 64);
        assert_eq!(material_bytes(Cipher::Aes256Ctr), 80);
    }

    #[test]
    fn mac_rejects_wrong_tag() {
        let mut mac = MacState::new(Hash::Sha256, &[1u8; 32]).unwrap();
        mac.update(b"payload");
        let mut tag = [0u8; 32];
        mac.finalize_into(&mut tag);

        let mut check = MacState::new(Hash::Sha256, &[1u8; 32]).unwrap();
        check.update(b"payload");
        assert!(check.verify(&tag).is_ok());

        tag[0] ^= 1;
        let mut check = MacState::new(Hash::Sha256, &[1u8; 32]).unwrap();
        check.update(b"payload");
        assert_eq!(check.verify(&tag), Err(Status::TagMismatch));
    }

    #[test]
    fn ctr_is_its_own_inverse() {
        let mut data = *b"0123456789abcdef0123456789abcdef";
        let mut enc = CtrCipher::new(Cipher::Aes256Ctr, &[2u8; 32], &[3u8; 16]).unwrap();
        enc.apply(&mut data);
        assert_ne!(&data, b"0123456789abcdef0123456789abcdef");
        let mut dec = CtrCipher::new(Cipher::Aes256Ctr, &[2u8; 32], &[3u8; 16]).unwrap();
        dec.apply(&mut data);
        assert_eq!(&data, b"0123456789abcdef0123456789abcdef");
    }
}
