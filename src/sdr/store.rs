//! Backing stores for SDR records.
// 中文: SDR 记录的后端存储。

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;

/// The current Unix time in milliseconds, byte-reversed.
///
/// Reversing the bytes moves the fast-changing low-order bits into the high-order
/// position, where they mix into the per-record nonce.
///
/// 中文: 当前 Unix 毫秒时间，字节序反转。反转后变化最快的低位字节落到高位，
/// 与基础 nonce 混合后得到每条记录的 nonce。
pub fn default_timestamp() -> u64 {
    (Utc::now().timestamp_millis() as u64).swap_bytes()
}

/// Defines the minimal interface an SDR needs from its backing store.
///
/// A store holds named byte blobs inside named containers ("locations").
/// Nothing beyond that is assumed, so the same SDR logic runs against a
/// directory, an in-process map, a database table or a blob bucket.
///
/// 中文: 定义了 SDR 对后端存储的最小需求。
///
/// 存储在具名容器（"location"）中保存具名字节块，除此之外不做任何假设。
/// 因此同一套 SDR 逻辑可以运行在目录、进程内映射、数据库表或对象存储之上。
pub trait RecordStore {
    /// Returns `true` if the location exists.
    /// 中文: 位置是否存在。
    fn location_exists(&self, location: &str) -> bool;

    /// Returns `true` if the record exists in the location.
    /// 中文: 记录是否存在。
    fn record_exists(&self, location: &str, key: &str) -> bool;

    /// Lists the record names in a location.
    /// 中文: 列出位置中的所有记录名。
    fn list_records(&self, location: &str) -> io::Result<Vec<String>>;

    /// Creates a location, including any intermediate containers.
    /// 中文: 创建位置（包括所需的中间层级）。
    fn setup_location(&mut self, location: &str) -> io::Result<()>;

    fn read_record(&self, location: &str, key: &str) -> io::Result<Vec<u8>>;

    /// Writes a record, replacing any previous record with the same name.
    /// 中文: 写入记录，覆盖同名记录。
    fn write_record(&mut self, location: &str, key: &str, value: &[u8]) -> io::Result<()>;

    /// Removes a record. Removing a record that does not exist is not an error.
    /// 中文: 删除记录；记录不存在不算错误。
    fn remove_record(&mut self, location: &str, key: &str) -> io::Result<()>;

    /// Removes an (empty) location. A missing location is not an error.
    /// 中文: 删除（已清空的）位置；位置不存在不算错误。
    fn remove_location(&mut self, location: &str) -> io::Result<()>;

    /// The timestamp bound into each new record.
    /// 中文: 写入每条新记录的时间戳。
    fn timestamp(&self) -> u64 {
        default_timestamp()
    }
}

/// A directory per location and a file per record.
///
/// Record names must be a single plain path component; anything else
/// (separators, `..`, empty names) is rejected with `InvalidInput`.
///
/// 中文: 每个位置一个目录，每条记录一个文件。记录名必须是单个普通路径分量。
#[derive(Clone, Copy, Debug, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }

    fn record_path(location: &str, key: &str) -> io::Result<PathBuf> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == key => Ok(Path::new(location).join(key)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid record name: {key:?}"),
            )),
        }
    }
}

impl RecordStore for FileStore {
    fn location_exists(&self, location: &str) -> bool {
        Path::new(location).exists()
    }

    fn record_exists(&self, location: &str, key: &str) -> bool {
        Self::record_path(location, key).is_ok_and(|p| p.is_file())
    }

    fn list_records(&self, location: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(location)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn setup_location(&mut self, location: &str) -> io::Result<()> {
        fs::create_dir_all(location)
    }

    fn read_record(&self, location: &str, key: &str) -> io::Result<Vec<u8>> {
        fs::read(Self::record_path(location, key)?)
    }

    fn write_record(&mut self, location: &str, key: &str, value: &[u8]) -> io::Result<()> {
        fs::write(Self::record_path(location, key)?, value)
    }

    fn remove_record(&mut self, location: &str, key: &str) -> io::Result<()> {
        let path = Self::record_path(location, key)?;
        if path.is_file() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn remove_location(&mut self, location: &str) -> io::Result<()> {
        if self.location_exists(location) {
            fs::remove_dir(location)?;
        }
        Ok(())
    }
}

/// An in-process store. Useful for tests and for records that must never touch disk.
///
/// The timestamp can be pinned so that several SDRs write at the identical instant.
///
/// 中文: 进程内存储，可以固定时间戳。
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    locations: HashMap<String, BTreeMap<String, Vec<u8>>>,
    pinned_timestamp: Option<u64>,
}

fn not_found(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{what} not found"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose timestamp is always `timestamp`.
    pub fn with_timestamp(timestamp: u64) -> Self {
        Self {
            pinned_timestamp: Some(timestamp),
            ..Self::default()
        }
    }

    pub fn set_timestamp(&mut self, timestamp: Option<u64>) {
        self.pinned_timestamp = timestamp;
    }
}

impl RecordStore for MemoryStore {
    fn location_exists(&self, location: &str) -> bool {
        self.locations.contains_key(location)
    }

    fn record_exists(&self, location: &str, key: &str) -> bool {
        self.locations
            .get(location)
            .is_some_and(|records| records.contains_key(key))
    }

    fn list_records(&self, location: &str) -> io::Result<Vec<String>> {
        let records = self.locations.get(location).ok_or_else(|| not_found(location))?;
        Ok(records.keys().cloned().collect())
    }

    fn setup_location(&mut self, location: &str) -> io::Result<()> {
        self.locations.entry(location.to_string()).or_default();
        Ok(())
    }

    fn read_record(&self, location: &str, key: &str) -> io::Result<Vec<u8>> {
        self.locations
            .get(location)
            .and_then(|records| records.get(key))
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    fn write_record(&mut self, location: &str, key: &str, value: &[u8]) -> io::Result<()> {
        let records = self
            .locations
            .get_mut(location)
            .ok_or_else(|| not_found(location))?;
        records.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove_record(&mut self, location: &str, key: &str) -> io::Result<()> {
        if let Some(records) = self.locations.get_mut(location) {
            records.remove(key);
        }
        Ok(())
    }

    fn remove_location(&mut self, location: &str) -> io::Result<()> {
        self.locations.remove(location);
        Ok(())
    }

    fn timestamp(&self) -> u64 {
        self.pinned_timestamp.unwrap_or_else(default_timestamp)
    }
}
