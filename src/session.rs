//! # 会话
//!
//! 一个会话包装一份引擎状态，负责它的生命周期：
//!
//! 1. [`Session::with_engine`] 按 `state_bytes` 分配状态；返回 0 的选项在构造时失败。
//! 2. [`Session::instantiate`] 从 [`SeedSource`] 取熵、nonce，用个性化串实例化。
//! 3. 编码 / 解码（见 [`Encoder`] 和 [`Decoder`]），或分块加解密（见 [`crate::chunk`]）。
//! 4. 随时可以 [`Session::save_state`] / [`Session::restore_state`]。
//! 5. [`Session::uninstantiate`] 擦除状态。
//!
//! 会话不是线程安全的，也没有内部同步。

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::{debug, warn};

use crate::engine::{Engine, SeedMaterial};
use crate::engine::soft::SoftEngine;
use crate::error::Error;
use crate::options::Options;
use crate::seed::{EntropyCallback, NonceCallback, SeedSource, TimestampCallback};
use crate::status::Status;

pub mod decoder;
pub mod encoder;
mod scratch;

pub use decoder::Decoder;
pub use encoder::Encoder;

pub(crate) use scratch::{Scratch, ScratchUse};

/// 编码器和解码器共用的会话核心。
pub struct Session<E: Engine = SoftEngine> {
    pub(crate) engine: E,
    pub(crate) options: Options,
    pub(crate) state: E::State,
    pub(crate) seeds: SeedSource,
    pub(crate) scratch: Scratch,
}

impl Session<SoftEngine> {
    /// 使用参考引擎创建会话。
    pub fn new(options: Options) -> Result<Self, Error> {
        Self::with_engine(SoftEngine::new(), options)
    }
}

impl<E: Engine> Session<E> {
    /// 创建会话。选项非法时返回 [`Error::Config`]，这是编程错误，不应重试。
    pub fn with_engine(engine: E, options: Options) -> Result<Self, Error> {
        if engine.state_bytes(&options) == 0 {
            return Err(Error::Config(format!("unsupported session options: {options:?}")));
        }
        let state = engine
            .new_state(&options)
            .map_err(|status| Error::Config(status.to_string()))?;
        Ok(Self {
            engine,
            options,
            state,
            seeds: SeedSource::new(options.drbg.nonce_int_bytes()),
            scratch: Scratch::default(),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 播种材料来源。
    pub fn seeds_mut(&mut self) -> &mut SeedSource {
        &mut self.seeds
    }

    /// 设置下一次实例化使用的熵。所有权转移，消耗后擦除。
    pub fn set_entropy(&mut self, entropy: Vec<u8>) {
        self.seeds.set_entropy(entropy);
    }

    pub fn set_entropy_callback(&mut self, callback: Option<EntropyCallback>) {
        self.seeds.set_entropy_callback(callback);
    }

    pub fn set_nonce(&mut self, nonce: impl Into<Vec<u8>>) {
        self.seeds.set_nonce(nonce);
    }

    pub fn set_nonce_u64(&mut self, nonce: u64) {
        self.seeds.set_nonce_u64(nonce);
    }

    pub fn set_nonce_callback(&mut self, callback: Option<NonceCallback>) {
        self.seeds.set_nonce_callback(callback);
    }

    pub fn set_timestamp_callback(&mut self, callback: Option<TimestampCallback>) {
        self.seeds.set_timestamp_callback(callback);
    }

    pub fn clear_callbacks(&mut self) {
        self.seeds.clear_callbacks();
    }

    /// 用个性化串实例化。失败时会话保持不可用。
    pub fn instantiate(&mut self, personalization: impl AsRef<[u8]>) -> Result<(), Status> {
        let bounds = self.engine.seed_bounds(&self.options);
        let entropy = match self.seeds.entropy(bounds.entropy_min, bounds.entropy_max) {
            Ok(entropy) => entropy,
            Err(status) => {
                warn!(%status, "entropy source failed");
                // 先前的状态同样作废
                self.engine.uninstantiate(&mut self.state).ok();
                return Err(status);
            }
        };
        let nonce = self.seeds.nonce(bounds.nonce_min, bounds.nonce_max);
        let seed = SeedMaterial {
            entropy,
            nonce,
            personalization: personalization.as_ref().to_vec(),
        };
        self.engine
            .instantiate(&mut self.state, seed)
            .inspect_err(|status| warn!(%status, "session instantiate failed"))?;
        debug!(drbg = self.options.drbg.name(), "session instantiated");
        Ok(())
    }

    pub fn is_instantiated(&self) -> bool {
        self.engine.is_instantiated(&self.state)
    }

    /// 自上次实例化以来的生成次数。
    pub fn reseed_counter(&self) -> u64 {
        self.engine.reseed_counter(&self.state)
    }

    /// 擦除状态。之后必须重新实例化才能使用。
    pub fn uninstantiate(&mut self) -> Result<(), Status> {
        debug!("session uninstantiated");
        self.engine.uninstantiate(&mut self.state)
    }

    /// 保存状态的字节数，对同一组选项固定不变。
    pub fn state_bytes(&self) -> usize {
        self.engine.state_bytes(&self.options)
    }

    pub fn save_state(&self) -> Result<Vec<u8>, Status> {
        let mut saved = vec![0u8; self.engine.save_bytes(&self.state)];
        self.engine.save(&self.state, &mut saved)?;
        Ok(saved)
    }

    pub fn save_state_b64(&self) -> Result<String, Status> {
        let saved = zeroize::Zeroizing::new(self.save_state()?);
        Ok(STANDARD.encode(&saved[..]))
    }

    /// 恢复状态。长度或配置不匹配时返回 [`Status::InvalidSavedState`]，状态不变。
    pub fn restore_state(&mut self, saved: &[u8]) -> Result<(), Status> {
        self.engine.restore(&mut self.state, saved)?;
        debug!("session state restored");
        Ok(())
    }

    pub fn restore_state_b64(&mut self, saved: &str) -> Result<(), Status> {
        let bytes = zeroize::Zeroizing::new(
            STANDARD.decode(saved).map_err(|_| Status::InvalidSavedState)?,
        );
        self.restore_state(&bytes)
    }
}

/// `n` 字节数据的 base64 编码长度（带填充）。
pub(crate) fn b64_len(n: usize) -> usize {
    n.div_ceil(3) * 4
}
