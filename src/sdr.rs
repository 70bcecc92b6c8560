//! # Secure Data Replacement (SDR)
//!
//! 具名、加密、带时间戳的记录存储。
//!
//! 每条记录都用一个全新的、专属于这条记录的会话编码：
//!
//! - 熵：`init_sdr` 时给定的基础熵（每次使用一份副本）；
//! - nonce：记录时间戳 XOR 基础 nonce；
//! - 个性化串：记录名。
//!
//! 存储格式为 `时间戳 (8 字节 LE) ‖ 编码结果`。读取时取出时间戳、XOR 基础 nonce
//! 恢复出记录的 nonce，再实例化解码会话。
//!
//! 记录有两层：[`Tier::Memory`]（进程内，记录名不受限制）和 [`Tier::Durable`]
//! （后端存储，记录名受后端约束）。读取和删除时内存层优先。
//!
//! ```no_run
//! use seal_sdr::sdr::{Sdr, Tier};
//!
//! # fn main() -> Result<(), seal_sdr::Error> {
//! let mut sdr = Sdr::new("/var/lib/app/sdr")?;
//! sdr.init_sdr(vec![0x5a; 32], 0x1234)?;
//! sdr.write_str("token", "s3cr3t", Tier::Durable)?;
//! assert_eq!(sdr.read_string("token")?, "s3cr3t");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretBox};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::SdrConfig;
use crate::engine::Engine;
use crate::engine::soft::SoftEngine;
use crate::error::Error;
use crate::options::Options;
use crate::session::{Decoder, Encoder};
use crate::status::Status;

mod store;

pub use store::{FileStore, MemoryStore, RecordStore, default_timestamp};

const TIMESTAMP_BYTES: usize = 8;

/// 记录写入哪一层。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tier {
    /// 进程内，进程退出即消失。
    Memory,
    /// 后端存储。
    #[default]
    Durable,
}

/// `init_sdr` 确定的基础播种材料。
struct BaseSeed {
    entropy: SecretBox<[u8]>,
    nonce: u64,
}

pub struct Sdr<S: RecordStore = FileStore, E: Engine = SoftEngine> {
    encoder: Encoder<E>,
    decoder: Decoder<E>,
    store: S,
    location: String,
    seed: Option<BaseSeed>,
    memory: HashMap<String, Vec<u8>>,
}

fn engine_error(context: &'static str, status: Status) -> Error {
    warn!(%status, context, "sdr engine call failed");
    Error::engine(context, status)
}

impl Sdr<FileStore, SoftEngine> {
    /// 以目录 `location` 为后端，使用默认的托管密钥会话。
    pub fn new(location: impl Into<String>) -> Result<Self, Error> {
        Self::with_store(FileStore::new(), location)
    }
}

impl<S: RecordStore> Sdr<S, SoftEngine> {
    pub fn with_store(store: S, location: impl Into<String>) -> Result<Self, Error> {
        Ok(Self::with_sessions(
            Encoder::new(Options::managed())?,
            Decoder::new(Options::managed())?,
            store,
            location,
        ))
    }

    pub fn from_config(config: &SdrConfig, store: S) -> Result<Self, Error> {
        Ok(Self::with_sessions(
            Encoder::new(config.options)?,
            Decoder::new(config.options)?,
            store,
            config.location.clone(),
        ))
    }
}

impl<S: RecordStore, E: Engine> Sdr<S, E> {
    /// 使用调用者提供的会话。
    ///
    /// 会话的回调被清除，以保证使用 SDR 的熵和 nonce，并禁用时间戳。
    /// 之后这两个会话只应该由 SDR 使用，因为 SDR 会改变它们的状态。
    pub fn with_sessions(
        mut encoder: Encoder<E>,
        mut decoder: Decoder<E>,
        store: S,
        location: impl Into<String>,
    ) -> Self {
        encoder.clear_callbacks();
        decoder.clear_callbacks();
        Self {
            encoder,
            decoder,
            store,
            location: location.into(),
            seed: None,
            memory: HashMap::new(),
        }
    }

    /// 仅供查看信息。
    pub fn encoder(&self) -> &Encoder<E> {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder<E> {
        &self.decoder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_initialized(&self) -> bool {
        self.seed.is_some()
    }

    /// 用基础熵和 nonce 初始化。清空内存层；位置不存在时创建它。
    pub fn init_sdr(&mut self, entropy: Vec<u8>, nonce: u64) -> Result<(), Error> {
        let entropy = Zeroizing::new(entropy);
        self.seed = Some(BaseSeed {
            entropy: SecretBox::new(Box::from(&entropy[..])),
            nonce,
        });
        self.memory.clear();
        if !self.store.location_exists(&self.location) {
            self.store.setup_location(&self.location)?;
        }
        debug!(location = %self.location, "sdr initialized");
        Ok(())
    }

    /// 写入记录，覆盖同一层中的同名记录。
    pub fn write(&mut self, key: &str, value: &[u8], tier: Tier) -> Result<(), Error> {
        let seed = self.seed.as_ref().ok_or(Error::NotInitialized)?;
        let timestamp = self.store.timestamp();

        self.encoder.set_entropy(seed.entropy.expose_secret().to_vec());
        self.encoder.set_nonce_u64(timestamp ^ seed.nonce);
        self.encoder
            .instantiate(key)
            .map_err(|s| engine_error("Error instantiating encoder", s))?;
        let encoded = self
            .encoder
            .encode(value)
            .map_err(|s| engine_error("Error encoding data", s))?;

        let mut record = Vec::with_capacity(TIMESTAMP_BYTES + encoded.len());
        record.extend_from_slice(&timestamp.to_le_bytes());
        record.extend_from_slice(&encoded);

        match tier {
            Tier::Memory => {
                self.memory.insert(key.to_string(), record);
            }
            Tier::Durable => self.store.write_record(&self.location, key, &record)?,
        }
        debug!(key, ?tier, "sdr record written");
        Ok(())
    }

    pub fn write_str(&mut self, key: &str, value: &str, tier: Tier) -> Result<(), Error> {
        self.write(key, value.as_bytes(), tier)
    }

    /// 读取记录。同名记录同时存在于两层时读取内存层。
    pub fn read_data(&mut self, key: &str) -> Result<Vec<u8>, Error> {
        let seed = self.seed.as_ref().ok_or(Error::NotInitialized)?;
        let record = match self.memory.get(key) {
            Some(record) => record.clone(),
            None => self.store.read_record(&self.location, key)?,
        };
        if record.len() < TIMESTAMP_BYTES {
            return Err(Error::Format(format!(
                "record {key:?} is {} bytes, shorter than its timestamp",
                record.len()
            )));
        }
        let (ts, encoded) = record.split_at(TIMESTAMP_BYTES);
        let mut ts_bytes = [0u8; TIMESTAMP_BYTES];
        ts_bytes.copy_from_slice(ts);
        let nonce = u64::from_le_bytes(ts_bytes) ^ seed.nonce;

        self.decoder.set_entropy(seed.entropy.expose_secret().to_vec());
        self.decoder.set_nonce_u64(nonce);
        self.decoder
            .instantiate(key)
            .map_err(|s| engine_error("Error instantiating decoder", s))?;
        let data = self
            .decoder
            .decode(encoded)
            .map_err(|s| engine_error("Error decoding data", s))?;
        debug!(key, "sdr record read");
        Ok(data)
    }

    /// 读取记录并当作 C 字符串：截止到第一个 NUL。
    pub fn read_string(&mut self, key: &str) -> Result<String, Error> {
        let data = self.read_data(key)?;
        let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
        Ok(String::from_utf8_lossy(&data[..end]).into_owned())
    }

    /// 删除记录。内存层优先；记录不存在不算错误。
    pub fn remove(&mut self, key: &str) -> Result<(), Error> {
        if self.memory.remove(key).is_none() {
            self.store.remove_record(&self.location, key)?;
        }
        debug!(key, "sdr record removed");
        Ok(())
    }

    /// 删除整个 SDR：清空内存层，删除所有持久记录和位置本身。
    /// 之后必须重新 `init_sdr` 才能使用。
    pub fn remove_sdr(&mut self) -> Result<(), Error> {
        self.memory.clear();
        if self.store.location_exists(&self.location) {
            for record in self.store.list_records(&self.location)? {
                self.store.remove_record(&self.location, &record)?;
            }
            self.store.remove_location(&self.location)?;
        }
        self.seed = None;
        debug!(location = %self.location, "sdr removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sdr() -> Sdr<MemoryStore> {
        let mut sdr = Sdr::with_store(MemoryStore::new(), "loc").unwrap();
        sdr.init_sdr(vec![1u8; 32], 99).unwrap();
        sdr
    }

    #[test]
    fn uninitialized_sdr_refuses_io() {
        let mut sdr = Sdr::with_store(MemoryStore::new(), "loc").unwrap();
        assert!(matches!(sdr.write("k", b"v", Tier::Memory), Err(Error::NotInitialized)));
        assert!(matches!(sdr.read_data("k"), Err(Error::NotInitialized)));
    }

    #[test]
    fn record_starts_with_raw_timestamp() {
        let mut sdr = Sdr::with_store(MemoryStore::with_timestamp(0x0102_0304), "loc").unwrap();
        sdr.init_sdr(vec![1u8; 32], 7).unwrap();
        sdr.write("k", b"v", Tier::Durable).unwrap();
        let record = sdr.store().read_record("loc", "k").unwrap();
        assert_eq!(&record[..8], &0x0102_0304u64.to_le_bytes());
    }

    #[test]
    fn short_record_is_a_format_error() {
        let mut sdr = sdr();
        sdr.store_mut().write_record("loc", "k", &[1, 2, 3]).unwrap();
        assert!(matches!(sdr.read_data("k"), Err(Error::Format(_))));
    }

    #[test]
    fn tampered_record_surfaces_engine_error() {
        let mut sdr = sdr();
        sdr.write("k", b"value", Tier::Durable).unwrap();
        let mut record = sdr.store().read_record("loc", "k").unwrap();
        let last = record.len() - 1;
        record[last] ^= 1;
        sdr.store_mut().write_record("loc", "k", &record).unwrap();
        let err = sdr.read_data("k").unwrap_err();
        assert_eq!(err.status(), Some(Status::TagMismatch));
        assert!(err.to_string().starts_with("Error decoding data (status_tag_mismatch)"));
    }

    #[test]
    fn missing_record_is_an_io_error() {
        let mut sdr = sdr();
        match sdr.read_data("nope") {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
