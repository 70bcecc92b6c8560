//! 解码会话。
//!
//! 每次成功解码后，[`Decoder::enc_ts`]、[`Decoder::dec_ts`] 和
//! [`Decoder::msg_skipped`] 报告这条消息的时间戳和为同步而跳过的消息数。
//! 调用者据此发现乱序或重放的消息；窗口大小是引擎选项，不属于会话逻辑。

use std::ops::{Deref, DerefMut, Range};

use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::{ScratchUse, Session, b64_len};
use crate::engine::soft::SoftEngine;
use crate::engine::{DecodeInfo, Engine};
use crate::error::Error;
use crate::options::Options;
use crate::status::Status;

pub struct Decoder<E: Engine = SoftEngine> {
    pub(crate) session: Session<E>,
    pub(crate) last: DecodeInfo,
}

impl Decoder<SoftEngine> {
    pub fn new(options: Options) -> Result<Self, Error> {
        Self::with_engine(SoftEngine::new(), options)
    }
}

impl<E: Engine> Decoder<E> {
    pub fn with_engine(engine: E, options: Options) -> Result<Self, Error> {
        Ok(Self {
            session: Session::with_engine(engine, options)?,
            last: DecodeInfo::default(),
        })
    }

    /// 解码 `encoded_bytes` 字节需要的缓冲区大小。
    pub fn buff_bytes(&self, encoded_bytes: usize) -> usize {
        self.session.engine.decode_bytes(&self.session.state, encoded_bytes)
    }

    /// 解码长度为 `encoded_b64_bytes` 的 base64 文本需要的缓冲区大小。
    pub fn buff_bytes_b64(&self, encoded_b64_bytes: usize) -> usize {
        self.buff_bytes(encoded_b64_bytes / 4 * 3)
    }

    /// 上一条消息编码端的时间戳。
    pub fn enc_ts(&self) -> u64 {
        self.last.enc_ts
    }

    /// 上一条消息解码时本端的时间戳。
    pub fn dec_ts(&self) -> u64 {
        self.last.dec_ts
    }

    /// 上一次解码为了同步而跳过的消息数。
    pub fn msg_skipped(&self) -> u32 {
        self.last.msg_skipped
    }

    pub fn decode(&mut self, encoded: &[u8]) -> Result<Vec<u8>, Status> {
        let need = self.buff_bytes(encoded.len());
        let timestamp = self.session.seeds.timestamp();
        let Session {
            engine,
            state,
            scratch,
            ..
        } = &mut self.session;
        let out = scratch.take(ScratchUse::Decode, need);
        let result = engine.decode(state, encoded, timestamp, out);
        let info = self.record(result)?;
        Ok(self.session.scratch.copy_out(ScratchUse::Decode, info.range))
    }

    pub fn decode_b64(&mut self, encoded: &str) -> Result<Vec<u8>, Status> {
        let bytes = STANDARD.decode(encoded).map_err(|_| Status::InvalidInput)?;
        self.decode(&bytes)
    }

    /// 解码并把结果当作 C 字符串：截止到第一个 NUL，非法 UTF-8 用替换字符。
    pub fn decode_str(&mut self, encoded: &[u8]) -> Result<String, Status> {
        let data = self.decode(encoded)?;
        let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
        Ok(String::from_utf8_lossy(&data[..end]).into_owned())
    }

    /// 解码到调用者的缓冲区，返回有效部分的范围。
    pub fn decode_into(&mut self, encoded: &[u8], out: &mut [u8]) -> Result<Range<usize>, Status> {
        let timestamp = self.session.seeds.timestamp();
        let result = self
            .session
            .engine
            .decode(&mut self.session.state, encoded, timestamp, out);
        Ok(self.record(result)?.range)
    }

    fn record(&mut self, result: Result<DecodeInfo, Status>) -> Result<DecodeInfo, Status> {
        match result {
            Ok(info) => {
                self.last = info.clone();
                Ok(info)
            }
            Err(status) => {
                self.last = DecodeInfo::default();
                Err(status)
            }
        }
    }
}

impl<E: Engine> Deref for Decoder<E> {
    type Target = Session<E>;

    fn deref(&self) -> &Session<E> {
        &self.session
    }
}

impl<E: Engine> DerefMut for Decoder<E> {
    fn deref_mut(&mut self) -> &mut Session<E> {
        &mut self.session
    }
}
