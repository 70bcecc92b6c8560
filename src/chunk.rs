//! # 分块流式加解密
//!
//! 托管密钥模式的会话可以不把整条消息放进内存，而是逐块处理：
//!
//! ```text
//! Idle --start--> Started --chunk--> Chunking --chunk--> Chunking
//!                    \                   |
//!                     +-----finish-------+--> Finished (回到 Idle)
//! ```
//!
//! 分块会话可变借用它的编码器/解码器，因此在分块会话打开期间无法调用整条消息
//! 的 `encode` / `decode`；`finish` 消耗分块会话，之后可以再次 `start`。
//!
//! 加密的分块长度必须是密码块大小的整数倍，不足一块的尾部交给
//! [`ChunkEncryptor::finish_with`]。所有分块的输出与 finish 的输出依次拼接，
//! 和同一位置上整条编码的结果逐字节相同。
//!
//! 分块解密不做重新同步：消息必须是序列中的下一条。

use std::io::{self, Read, Write};

use tracing::debug;

use crate::engine::Engine;
use crate::error::Error;
use crate::session::{Decoder, Encoder, ScratchUse, Session};
use crate::status::Status;

/// 流式处理的默认缓冲区大小。
pub const DEFAULT_BUFFER_BYTES: usize = 64 * 1024;

/// 分块会话所处的阶段。`Finished` 由 `finish` 消耗会话本身表示。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkPhase {
    Started,
    Chunking,
}

/// 一次进行中的分块加密。
pub struct ChunkEncryptor<'a, E: Engine> {
    session: &'a mut Session<E>,
    state: E::EncryptState,
    phase: ChunkPhase,
}

impl<E: Engine> Encoder<E> {
    /// 开始分块加密。非托管密钥模式返回 [`Status::Unsupported`]。
    pub fn start_encrypt(&mut self) -> Result<ChunkEncryptor<'_, E>, Status> {
        let session = &mut self.session;
        let timestamp = session.seeds.timestamp();
        let state = session.engine.encrypt_start(&mut session.state, timestamp)?;
        debug!("chunked encryption started");
        Ok(ChunkEncryptor {
            session,
            state,
            phase: ChunkPhase::Started,
        })
    }
}

impl<E: Engine> ChunkEncryptor<'_, E> {
    pub fn phase(&self) -> ChunkPhase {
        self.phase
    }

    pub fn block_bytes(&self) -> usize {
        self.session.engine.block_bytes(&self.session.state)
    }

    /// 原地加密一块数据。长度不是块大小的整数倍时返回
    /// [`Status::InvalidChunkLength`]，此时调用者应当放弃这条消息。
    pub fn encrypt_chunk(&mut self, data: &mut [u8]) -> Result<(), Status> {
        self.phase = ChunkPhase::Chunking;
        self.session.engine.encrypt_chunk(&mut self.state, data)
    }

    /// 原地加密 `data[offset..offset + len]`。
    pub fn encrypt_chunk_at(&mut self, data: &mut [u8], offset: usize, len: usize) -> Result<(), Status> {
        let end = offset.checked_add(len).ok_or(Status::InvalidInput)?;
        let chunk = data.get_mut(offset..end).ok_or(Status::InvalidInput)?;
        self.encrypt_chunk(chunk)
    }

    /// `finish` 输出的长度。
    pub fn finish_bytes(&self) -> usize {
        self.session.engine.encrypt_finish_bytes(&self.session.state, 0)
    }

    /// 结束加密，返回校验头与完整性标签。
    pub fn finish(self) -> Result<Vec<u8>, Status> {
        self.finish_with(&[])
    }

    /// 结束加密，先加密不足一块的尾部数据，返回 `尾部密文 ‖ 校验头 ‖ 标签`。
    pub fn finish_with(self, tail: &[u8]) -> Result<Vec<u8>, Status> {
        let ChunkEncryptor { session, state, .. } = self;
        let need = session.engine.encrypt_finish_bytes(&session.state, tail.len());
        let out = session.scratch.take(ScratchUse::Chunk, need);
        let range = session.engine.encrypt_finish(state, tail, out)?;
        debug!("chunked encryption finished");
        Ok(session.scratch.copy_out(ScratchUse::Chunk, range))
    }
}

/// 一次进行中的分块解密。
pub struct ChunkDecryptor<'a, E: Engine> {
    decoder: &'a mut Decoder<E>,
    state: E::DecryptState,
    phase: ChunkPhase,
}

impl<E: Engine> Decoder<E> {
    /// 开始分块解密。非托管密钥模式返回 [`Status::Unsupported`]。
    pub fn start_decrypt(&mut self) -> Result<ChunkDecryptor<'_, E>, Status> {
        let state = self.session.engine.decrypt_start(&self.session.state)?;
        debug!("chunked decryption started");
        Ok(ChunkDecryptor {
            decoder: self,
            state,
            phase: ChunkPhase::Started,
        })
    }
}

impl<E: Engine> ChunkDecryptor<'_, E> {
    pub fn phase(&self) -> ChunkPhase {
        self.phase
    }

    /// 解密 `encrypted_bytes` 字节的分块所需的输出容量，由引擎报告。
    pub fn decrypt_chunk_bytes(&self, encrypted_bytes: usize) -> usize {
        self.decoder
            .session
            .engine
            .decrypt_chunk_bytes(&self.state, encrypted_bytes)
    }

    /// 解密一块数据。末尾可能属于校验头和标签的字节会被扣留到 finish。
    pub fn decrypt_chunk(&mut self, encrypted: &[u8]) -> Result<Vec<u8>, Status> {
        self.phase = ChunkPhase::Chunking;
        let need = self.decrypt_chunk_bytes(encrypted.len());
        let session = &mut self.decoder.session;
        let out = session.scratch.take(ScratchUse::Chunk, need);
        let n = session.engine.decrypt_chunk(&mut self.state, encrypted, out)?;
        Ok(session.scratch.copy_out(ScratchUse::Chunk, 0..n))
    }

    /// 解密到调用者的缓冲区，返回写入的字节数。
    pub fn decrypt_chunk_into(&mut self, encrypted: &[u8], out: &mut [u8]) -> Result<usize, Status> {
        self.phase = ChunkPhase::Chunking;
        self.decoder
            .session
            .engine
            .decrypt_chunk(&mut self.state, encrypted, out)
    }

    /// 校验完整性并结束解密。成功后解码器推进到下一条消息，并更新时间戳信息；
    /// 失败时解码器状态不变。
    pub fn finish(self) -> Result<Vec<u8>, Status> {
        let ChunkDecryptor { decoder, state, .. } = self;
        let session = &mut decoder.session;
        let timestamp = session.seeds.timestamp();
        let need = session.engine.decrypt_finish_bytes(&state);
        let out = session.scratch.take(ScratchUse::Chunk, need);
        let info = session
            .engine
            .decrypt_finish(&mut session.state, state, timestamp, out)?;
        let rest = session.scratch.copy_out(ScratchUse::Chunk, info.range.clone());
        decoder.last = info;
        debug!("chunked decryption finished");
        Ok(rest)
    }
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// 从 `reader` 读取明文，分块加密后写入 `writer`，返回写出的字节数。
///
/// `buffer_bytes` 向下取整到块大小的整数倍（至少一块）。
pub fn encrypt_stream<E: Engine, R: Read, W: Write>(
    encoder: &mut Encoder<E>,
    mut reader: R,
    mut writer: W,
    buffer_bytes: usize,
) -> Result<u64, Error> {
    let mut chunk = encoder
        .start_encrypt()
        .map_err(|s| Error::engine("Error starting chunked encryption", s))?;
    let block = chunk.block_bytes().max(1);
    let mut buf = zeroize::Zeroizing::new(vec![0u8; (buffer_bytes / block).max(1) * block]);
    let mut written = 0u64;
    loop {
        let n = fill(&mut reader, &mut buf)?;
        if n < buf.len() {
            let tail = chunk
                .finish_with(&buf[..n])
                .map_err(|s| Error::engine("Error finishing chunked encryption", s))?;
            writer.write_all(&tail)?;
            written += tail.len() as u64;
            break;
        }
        chunk
            .encrypt_chunk(&mut buf)
            .map_err(|s| Error::engine("Error encrypting chunk", s))?;
        writer.write_all(&buf)?;
        written += buf.len() as u64;
    }
    writer.flush()?;
    Ok(written)
}

/// 从 `reader` 读取密文，分块解密后写入 `writer`，返回写出的明文字节数。
///
/// 标签在读完全部输入之后才被校验；校验失败时已经写出的明文不可信。
pub fn decrypt_stream<E: Engine, R: Read, W: Write>(
    decoder: &mut Decoder<E>,
    mut reader: R,
    mut writer: W,
    buffer_bytes: usize,
) -> Result<u64, Error> {
    let mut chunk = decoder
        .start_decrypt()
        .map_err(|s| Error::engine("Error starting chunked decryption", s))?;
    let mut buf = zeroize::Zeroizing::new(vec![0u8; buffer_bytes.max(1)]);
    let mut written = 0u64;
    loop {
        let n = fill(&mut reader, &mut buf)?;
        if n > 0 {
            let plain = chunk
                .decrypt_chunk(&buf[..n])
                .map_err(|s| Error::engine("Error decrypting chunk", s))?;
            writer.write_all(&plain)?;
            written += plain.len() as u64;
        }
        if n < buf.len() {
            break;
        }
    }
    let rest = chunk
        .finish()
        .map_err(|s| Error::engine("Error finishing chunked decryption", s))?;
    writer.write_all(&rest)?;
    writer.flush()?;
    Ok(written + rest.len() as u64)
}
