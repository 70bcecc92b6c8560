//!
//! # 配置模块
//!
//! 会话选项、SDR 和密钥交换的配置，可以整体保存为 JSON 文件。
//!
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::kex::KyberStrength;
use crate::options::Options;

/// SDR 配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SdrConfig {
    /// 记录所在的位置（`FileStore` 中是目录）
    pub location: String,
    /// SDR 会话的选项，默认是托管密钥模式
    #[serde(default = "Options::managed")]
    pub options: Options,
}

impl Default for SdrConfig {
    fn default() -> Self {
        Self {
            location: "./sdr".to_string(),
            options: Options::managed(),
        }
    }
}

/// 密钥交换配置
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct KexConfig {
    #[serde(default)]
    pub kyber_strength: KyberStrength,
}

impl KexConfig {
    /// 按配置创建 Kyber 上下文。进程内已配置了不同强度时失败。
    #[cfg(feature = "post-quantum")]
    pub fn kyber_context(&self) -> Result<crate::kex::KyberContext, crate::kex::KexError> {
        crate::kex::KyberContext::new(self.kyber_strength)
    }
}

/// 完整配置文件
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfigFile {
    /// 普通会话的选项
    #[serde(default)]
    pub session: Options,
    #[serde(default)]
    pub sdr: SdrConfig,
    #[serde(default)]
    pub kex: KexConfig,
}

impl ConfigFile {
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 解析 JSON，并拒绝无法创建会话的选项。
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: ConfigFile = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, options) in [("session", &self.session), ("sdr", &self.sdr.options)] {
            if !options.is_valid() {
                return Err(Error::Config(format!("invalid {name} options: {options:?}")));
            }
        }
        Ok(())
    }
}
