//! 编码会话。

use std::ops::{Deref, DerefMut, Range};

use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::{ScratchUse, Session, b64_len};
use crate::engine::Engine;
use crate::engine::soft::SoftEngine;
use crate::error::Error;
use crate::options::Options;
use crate::status::Status;

/// 编码器。会话的生命周期方法通过 `Deref` 暴露。
pub struct Encoder<E: Engine = SoftEngine> {
    pub(crate) session: Session<E>,
}

impl Encoder<SoftEngine> {
    pub fn new(options: Options) -> Result<Self, Error> {
        Self::with_engine(SoftEngine::new(), options)
    }
}

impl<E: Engine> Encoder<E> {
    pub fn with_engine(engine: E, options: Options) -> Result<Self, Error> {
        Ok(Self {
            session: Session::with_engine(engine, options)?,
        })
    }

    /// 编码 `data_bytes` 字节需要的缓冲区大小。
    pub fn buff_bytes(&self, data_bytes: usize) -> usize {
        self.session.engine.encode_bytes(&self.session.state, data_bytes)
    }

    /// 编码结果的 base64 长度。
    pub fn buff_bytes_b64(&self, data_bytes: usize) -> usize {
        b64_len(self.buff_bytes(data_bytes))
    }

    pub fn encode(&mut self, data: &[u8]) -> Result<Vec<u8>, Status> {
        let need = self.buff_bytes(data.len());
        let timestamp = self.session.seeds.timestamp();
        let Session {
            engine,
            state,
            scratch,
            ..
        } = &mut self.session;
        let out = scratch.take(ScratchUse::Encode, need);
        let range = engine.encode(state, data, timestamp, out)?;
        Ok(scratch.copy_out(ScratchUse::Encode, range))
    }

    pub fn encode_b64(&mut self, data: &[u8]) -> Result<String, Status> {
        Ok(STANDARD.encode(self.encode(data)?))
    }

    pub fn encode_str(&mut self, data: &str) -> Result<Vec<u8>, Status> {
        self.encode(data.as_bytes())
    }

    /// 编码到调用者的缓冲区，返回有效部分的范围。
    pub fn encode_into(&mut self, data: &[u8], out: &mut [u8]) -> Result<Range<usize>, Status> {
        let timestamp = self.session.seeds.timestamp();
        self.session
            .engine
            .encode(&mut self.session.state, data, timestamp, out)
    }
}

impl<E: Engine> Deref for Encoder<E> {
    type Target = Session<E>;

    fn deref(&self) -> &Session<E> {
        &self.session
    }
}

impl<E: Engine> DerefMut for Encoder<E> {
    fn deref_mut(&mut self) -> &mut Session<E> {
        &mut self.session
    }
}
