//! # 密码引擎接口
//!
//! 引擎是会话协议之下的算法提供者：DRBG、令牌编码、托管密钥模式的密码与
//! 哈希都在引擎里实现。会话只通过尺寸查询和 [`Status`] 与引擎交互，
//! 因此任何实现了 [`Engine`] 的提供者都可以替换进来。
//!
//! 本 crate 自带 [`soft::SoftEngine`]，一个纯 Rust 的参考实现。

use std::ops::Range;

use zeroize::Zeroizing;

use crate::options::{Drbg, Options};
use crate::status::Status;

pub mod soft;

/// 一次实例化所需的全部播种材料。
///
/// 熵在被引擎消耗后随本结构一起擦除。
pub struct SeedMaterial {
    pub entropy: Zeroizing<Vec<u8>>,
    pub nonce: Vec<u8>,
    pub personalization: Vec<u8>,
}

/// DRBG 对播种材料的长度要求。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedBounds {
    pub entropy_min: usize,
    pub entropy_max: usize,
    pub nonce_min: usize,
    pub nonce_max: usize,
    pub personal_min: usize,
    pub personal_max: usize,
}

impl SeedBounds {
    pub const fn for_drbg(drbg: Drbg) -> Self {
        Self {
            entropy_min: drbg.entropy_min_bytes(),
            entropy_max: drbg.entropy_max_bytes(),
            nonce_min: drbg.nonce_min_bytes(),
            nonce_max: drbg.nonce_max_bytes(),
            personal_min: drbg.personal_min_bytes(),
            personal_max: drbg.personal_max_bytes(),
        }
    }
}

/// 一次解码的结果。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeInfo {
    /// 解码结果在输出缓冲区中的范围。
    pub range: Range<usize>,
    /// 编码端写入的时间戳，没有时为 0。
    pub enc_ts: u64,
    /// 解码端的时间戳，没有时为 0。
    pub dec_ts: u64,
    /// 为了重新同步而跳过的消息数。
    pub msg_skipped: u32,
}

/// 密码引擎。
///
/// 状态由关联类型 [`Engine::State`] 表示，对会话而言是不透明的；
/// 保存的状态长度由 [`Engine::state_bytes`] 给出，对同一组选项固定不变。
/// 所有失败都以 `Err(Status)` 报告，失败的调用不得破坏状态，
/// 使之后格式正确的调用无法成功。
pub trait Engine {
    /// 会话状态。
    type State;
    /// 分块加密状态。
    type EncryptState;
    /// 分块解密状态。
    type DecryptState;

    /// 给定选项的状态字节数；0 表示选项非法。
    fn state_bytes(&self, options: &Options) -> usize;

    /// 给定选项的播种材料要求。
    fn seed_bounds(&self, options: &Options) -> SeedBounds {
        SeedBounds::for_drbg(options.drbg)
    }

    /// 创建一个尚未实例化的状态。
    fn new_state(&self, options: &Options) -> Result<Self::State, Status>;

    /// 用播种材料实例化。先前的状态被擦除；失败时状态保持不可用。
    fn instantiate(&self, state: &mut Self::State, seed: SeedMaterial) -> Result<(), Status>;

    fn is_instantiated(&self, state: &Self::State) -> bool;

    fn reseed_counter(&self, state: &Self::State) -> u64;

    /// 保存状态所需的字节数。
    fn save_bytes(&self, state: &Self::State) -> usize;

    fn save(&self, state: &Self::State, out: &mut [u8]) -> Result<(), Status>;

    /// 恢复状态；长度或配置不匹配时返回 [`Status::InvalidSavedState`]，且不修改状态。
    fn restore(&self, state: &mut Self::State, saved: &[u8]) -> Result<(), Status>;

    /// 编码 `data_bytes` 字节数据所需的缓冲区大小。
    fn encode_bytes(&self, state: &Self::State, data_bytes: usize) -> usize;

    /// 解码 `encoded_bytes` 字节所需的缓冲区大小。
    fn decode_bytes(&self, state: &Self::State, encoded_bytes: usize) -> usize;

    fn encode(
        &self,
        state: &mut Self::State,
        data: &[u8],
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<Range<usize>, Status>;

    fn decode(
        &self,
        state: &mut Self::State,
        encoded: &[u8],
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<DecodeInfo, Status>;

    /// 擦除状态。
    fn uninstantiate(&self, state: &mut Self::State) -> Result<(), Status>;

    /// 密码块大小；非托管密钥模式为 0。
    fn block_bytes(&self, state: &Self::State) -> usize;

    fn encrypt_start(&self, state: &mut Self::State, timestamp: u64) -> Result<Self::EncryptState, Status>;

    /// 原地加密一块数据，长度必须是块大小的整数倍。
    fn encrypt_chunk(&self, chunk: &mut Self::EncryptState, data: &mut [u8]) -> Result<(), Status>;

    /// `encrypt_finish` 处理 `tail_bytes` 字节的尾部数据时输出的长度。
    fn encrypt_finish_bytes(&self, state: &Self::State, tail_bytes: usize) -> usize;

    /// 完成分块加密：加密不足一块的尾部数据（可以为空），追加校验头与完整性标签。
    fn encrypt_finish(
        &self,
        chunk: Self::EncryptState,
        tail: &[u8],
        out: &mut [u8],
    ) -> Result<Range<usize>, Status>;

    fn decrypt_start(&self, state: &Self::State) -> Result<Self::DecryptState, Status>;

    /// 解密 `encrypted_bytes` 字节的分块所需的输出容量。
    fn decrypt_chunk_bytes(&self, chunk: &Self::DecryptState, encrypted_bytes: usize) -> usize;

    /// 解密一块数据，返回写入 `out` 的字节数。
    fn decrypt_chunk(
        &self,
        chunk: &mut Self::DecryptState,
        encrypted: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Status>;

    /// `decrypt_finish` 输出的最大长度。
    fn decrypt_finish_bytes(&self, chunk: &Self::DecryptState) -> usize;

    /// 完成分块解密：校验完整性并把会话状态推进到下一条消息。
    fn decrypt_finish(
        &self,
        state: &mut Self::State,
        chunk: Self::DecryptState,
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<DecodeInfo, Status>;
}
