//! # SoftEngine
//!
//! 纯 Rust 的参考引擎。
//!
//! - DRBG：HMAC-DRBG（SHA-256 / SHA-512），以及用于测试的递增生成器。
//! - 令牌模式：每个数据字节编码为 `tok_bytes` 字节的令牌。令牌的首字节是
//!   数据字节与密钥流的异或，其余字节是密钥流本身，解码时逐一核对。
//! - 托管密钥模式：AES-CTR + HMAC，见 [`managed`]。
//!
//! 每条消息从 DRBG 取一次材料，所以重新播种计数器按消息递增。
//!
//! 保存格式固定为 [`SAVED_STATE_BYTES`] 字节：
//!
//! ```text
//! [0] 版本  [1] drbg  [2] tok_bytes  [3] verifiers  [4] cipher  [5] hash
//! [6] 已实例化  [7] 保留  [8..12] fixed_bytes (LE, 0 = 无)  [12..16] seq (LE)
//! [16..152] DRBG：重新播种计数器 (LE u64)、K、V
//! ```

use std::ops::Range;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::engine::{DecodeInfo, Engine, SeedBounds, SeedMaterial};
use crate::options::{Options, Verifiers};
use crate::status::Status;

mod drbg;
mod managed;

pub use drbg::IncrFaults;
pub use managed::{DecryptState, EncryptState};

use drbg::DrbgState;
use managed::MessageKeys;

const SAVED_VERSION: u8 = 1;
const HEADER_BYTES: usize = 16;

/// 保存状态的字节数，与选项无关。
pub const SAVED_STATE_BYTES: usize = HEADER_BYTES + DrbgState::SAVED_BYTES;

/// 令牌模式每条消息的材料长度。
const TOKEN_KEY_BYTES: usize = 32;

/// 参考引擎。除了递增 DRBG 的故障开关之外没有任何配置。
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftEngine {
    faults: IncrFaults,
}

impl SoftEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为递增 DRBG 注入故障。对 HMAC DRBG 没有影响。
    pub fn with_faults(faults: IncrFaults) -> Self {
        Self { faults }
    }

    pub fn faults(&self) -> IncrFaults {
        self.faults
    }
}

/// SoftEngine 的会话状态。丢弃时擦除。
#[derive(Clone)]
pub struct SoftState {
    pub(crate) options: Options,
    pub(crate) drbg: DrbgState,
    seq: u32,
    instantiated: bool,
}

impl Drop for SoftState {
    fn drop(&mut self) {
        self.drbg.zeroize();
        self.seq = 0;
        self.instantiated = false;
    }
}

impl SoftState {
    fn require_instantiated(&self) -> Result<(), Status> {
        if self.instantiated { Ok(()) } else { Err(Status::NotInstantiated) }
    }

    fn verifiers(&self) -> Verifiers {
        self.options.verifiers
    }

    fn trailer_bytes(&self) -> usize {
        self.verifiers().header_bytes() + self.options.hash.digest_bytes()
    }
}

fn write_header(verifiers: Verifiers, seq: u32, timestamp: u64, out: &mut [u8]) {
    let mut at = 0;
    if verifiers.has_seq() {
        out[..4].copy_from_slice(&seq.to_le_bytes());
        at = 4;
    }
    if verifiers.has_timestamp() {
        out[at..at + 8].copy_from_slice(&timestamp.to_le_bytes());
    }
}

/// 解析校验头，返回 `(序列号, 时间戳)`；缺失的字段为 `None` / 0。
fn read_header(verifiers: Verifiers, header: &[u8]) -> (Option<u32>, u64) {
    let mut at = 0;
    let mut seq = None;
    if verifiers.has_seq() {
        let mut b = [0u8; 4];
        b.copy_from_slice(&header[..4]);
        seq = Some(u32::from_le_bytes(b));
        at = 4;
    }
    let mut timestamp = 0;
    if verifiers.has_timestamp() {
        let mut b = [0u8; 8];
        b.copy_from_slice(&header[at..at + 8]);
        timestamp = u64::from_le_bytes(b);
    }
    (seq, timestamp)
}

/// 令牌密钥流：HMAC-SHA256(key, 校验头 ‖ 块计数器) 的串联。
fn token_stream(key: &[u8], header: &[u8], out: &mut [u8]) -> Result<(), Status> {
    for (counter, block) in out.chunks_mut(32).enumerate() {
        let mut mac =
            <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|_| Status::DrbgCatastrophic)?;
        mac.update(header);
        mac.update(&(counter as u32).to_le_bytes());
        let digest = mac.finalize().into_bytes();
        block.copy_from_slice(&digest[..block.len()]);
    }
    Ok(())
}

impl SoftEngine {
    fn material_bytes(options: &Options) -> usize {
        if options.is_managed() {
            managed::material_bytes(options.cipher)
        } else {
            TOKEN_KEY_BYTES
        }
    }

    /// 丢弃一条消息的材料。
    fn skip_message(&self, state: &mut SoftState) -> Result<(), Status> {
        let mut material = Zeroizing::new(vec![0u8; Self::material_bytes(&state.options)]);
        state.drbg.generate(&mut material, &self.faults)?;
        state.seq = state.seq.wrapping_add(1);
        Ok(())
    }

    /// 把 `work` 同步到消息的序列号，返回跳过的消息数。
    fn sync(&self, work: &mut SoftState, seq: Option<u32>) -> Result<u32, Status> {
        let Some(seq) = seq else {
            return Ok(0);
        };
        let expected = work.seq;
        if seq == expected {
            return Ok(0);
        }
        let ahead = seq.wrapping_sub(expected);
        if seq < expected || ahead > work.options.s_window {
            return Err(Status::SeqOutsideWindow);
        }
        for _ in 0..ahead {
            self.skip_message(work)?;
        }
        Ok(ahead)
    }

    fn check_window(options: &Options, enc_ts: u64, dec_ts: u64) -> Result<(), Status> {
        if options.verifiers.has_timestamp()
            && options.t_window > 0
            && enc_ts.abs_diff(dec_ts) > options.t_window
        {
            return Err(Status::TimestampOutsideWindow);
        }
        Ok(())
    }

    fn encode_tokens(
        &self,
        state: &mut SoftState,
        data: &[u8],
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<Range<usize>, Status> {
        let opts = state.options;
        let header_bytes = opts.verifiers.header_bytes();
        let tok = opts.tok_bytes as usize;
        let data_bytes = opts.fixed_bytes.map_or(data.len(), |f| f as usize);
        let total = header_bytes + data_bytes * tok;

        let mut key = Zeroizing::new([0u8; TOKEN_KEY_BYTES]);
        state.drbg.generate(&mut key[..], &self.faults)?;
        let seq = state.seq;
        state.seq = seq.wrapping_add(1);

        let (header, body) = out[..total].split_at_mut(header_bytes);
        write_header(opts.verifiers, seq, timestamp, header);
        token_stream(&key[..], header, body)?;
        for (i, token) in body.chunks_mut(tok).enumerate() {
            // 定长模式：不足的部分补零
            token[0] ^= data.get(i).copied().unwrap_or(0);
        }
        Ok(0..total)
    }

    fn decode_tokens(
        &self,
        state: &mut SoftState,
        encoded: &[u8],
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<DecodeInfo, Status> {
        let opts = state.options;
        let header_bytes = opts.verifiers.header_bytes();
        let tok = opts.tok_bytes as usize;
        if encoded.len() < header_bytes || (encoded.len() - header_bytes) % tok != 0 {
            return Err(Status::InvalidInput);
        }
        let (header, body) = encoded.split_at(header_bytes);
        let data_bytes = body.len() / tok;
        if opts.fixed_bytes.is_some_and(|f| f as usize != data_bytes) {
            return Err(Status::InvalidInput);
        }
        if out.len() < data_bytes {
            return Err(Status::BufferTooSmall);
        }
        let (seq, enc_ts) = read_header(opts.verifiers, header);
        Self::check_window(&opts, enc_ts, timestamp)?;

        let mut work = state.clone();
        let msg_skipped = self.sync(&mut work, seq)?;
        let mut key = Zeroizing::new([0u8; TOKEN_KEY_BYTES]);
        work.drbg.generate(&mut key[..], &self.faults)?;
        work.seq = work.seq.wrapping_add(1);

        let mut stream = Zeroizing::new(vec![0u8; body.len()]);
        token_stream(&key[..], header, &mut stream)?;
        let mut diff = 0u8;
        for (i, (token, expect)) in body.chunks(tok).zip(stream.chunks(tok)).enumerate() {
            out[i] = token[0] ^ expect[0];
            diff |= token[1..]
                .iter()
                .zip(&expect[1..])
                .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        }
        if diff != 0 {
            out[..data_bytes].zeroize();
            return Err(Status::TokenMismatch);
        }

        *state = work;
        Ok(DecodeInfo {
            range: 0..data_bytes,
            enc_ts,
            dec_ts: timestamp,
            msg_skipped,
        })
    }

    fn encode_managed(
        &self,
        state: &mut SoftState,
        data: &[u8],
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<Range<usize>, Status> {
        let chunk = self.encrypt_start_inner(state, timestamp)?;
        self.encrypt_finish(chunk, data, out)
    }

    fn decode_managed(
        &self,
        state: &mut SoftState,
        encoded: &[u8],
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<DecodeInfo, Status> {
        let opts = state.options;
        let trailer = state.trailer_bytes();
        if encoded.len() < trailer {
            return Err(Status::InvalidInput);
        }
        let data_bytes = encoded.len() - trailer;
        if out.len() < data_bytes {
            return Err(Status::BufferTooSmall);
        }
        let (ciphertext, rest) = encoded.split_at(data_bytes);
        let (header, tag) = rest.split_at(opts.verifiers.header_bytes());
        let (seq, enc_ts) = read_header(opts.verifiers, header);

        let mut work = state.clone();
        let msg_skipped = self.sync(&mut work, seq)?;
        let mut keys = MessageKeys::derive(&mut work, &self.faults)?;
        work.seq = work.seq.wrapping_add(1);

        keys.mac.update(ciphertext);
        keys.mac.update(header);
        keys.mac.verify(tag)?;
        Self::check_window(&opts, enc_ts, timestamp)?;

        out[..data_bytes].copy_from_slice(ciphertext);
        keys.cipher.apply(&mut out[..data_bytes]);
        *state = work;
        Ok(DecodeInfo {
            range: 0..data_bytes,
            enc_ts,
            dec_ts: timestamp,
            msg_skipped,
        })
    }

    fn encrypt_start_inner(&self, state: &mut SoftState, timestamp: u64) -> Result<EncryptState, Status> {
        state.require_instantiated()?;
        if !state.options.is_managed() {
            return Err(Status::Unsupported);
        }
        let keys = MessageKeys::derive(state, &self.faults)?;
        let seq = state.seq;
        state.seq = seq.wrapping_add(1);
        let mut header = vec![0u8; state.verifiers().header_bytes()];
        write_header(state.verifiers(), seq, timestamp, &mut header);
        Ok(EncryptState {
            keys,
            header,
            block_bytes: state.options.cipher.block_bytes(),
            digest_bytes: state.options.hash.digest_bytes(),
        })
    }
}

impl Engine for SoftEngine {
    type State = SoftState;
    type EncryptState = EncryptState;
    type DecryptState = DecryptState;

    fn state_bytes(&self, options: &Options) -> usize {
        if options.is_valid() { SAVED_STATE_BYTES } else { 0 }
    }

    fn new_state(&self, options: &Options) -> Result<SoftState, Status> {
        if !options.is_valid() {
            return Err(Status::InvalidInput);
        }
        Ok(SoftState {
            options: *options,
            drbg: DrbgState::new(options.drbg),
            seq: 0,
            instantiated: false,
        })
    }

    fn instantiate(&self, state: &mut SoftState, seed: SeedMaterial) -> Result<(), Status> {
        state.instantiated = false;
        state.seq = 0;
        state.drbg.zeroize();

        let bounds = SeedBounds::for_drbg(state.options.drbg);
        if seed.entropy.len() < bounds.entropy_min || seed.entropy.len() > bounds.entropy_max {
            return Err(Status::DrbgCatastrophic);
        }
        if seed.nonce.len() < bounds.nonce_min || seed.nonce.len() > bounds.nonce_max {
            return Err(Status::InvalidNonce);
        }
        if seed.personalization.len() < bounds.personal_min
            || seed.personalization.len() > bounds.personal_max
        {
            return Err(Status::InvalidPersonalization);
        }

        state
            .drbg
            .instantiate(
            &[&seed.entropy[..], &seed.nonce[..], &seed.personalization[..]],
            &self.faults,
        )?;
        state.instantiated = true;
        debug!(drbg = state.options.drbg.name(), "soft engine instantiated");
        Ok(())
    }

    fn is_instantiated(&self, state: &SoftState) -> bool {
        state.instantiated
    }

    fn reseed_counter(&self, state: &SoftState) -> u64 {
        state.drbg.reseed_counter()
    }

    fn save_bytes(&self, _state: &SoftState) -> usize {
        SAVED_STATE_BYTES
    }

    fn save(&self, state: &SoftState, out: &mut [u8]) -> Result<(), Status> {
        state.require_instantiated()?;
        if out.len() != SAVED_STATE_BYTES {
            return Err(Status::BufferTooSmall);
        }
        let o = &state.options;
        out[..8].copy_from_slice(&[
            SAVED_VERSION,
            o.drbg.id(),
            o.tok_bytes,
            o.verifiers.id(),
            o.cipher.id(),
            o.hash.id(),
            1,
            0,
        ]);
        out[8..12].copy_from_slice(&o.fixed_bytes.unwrap_or(0).to_le_bytes());
        out[12..16].copy_from_slice(&state.seq.to_le_bytes());
        state.drbg.write_to(&mut out[HEADER_BYTES..]);
        Ok(())
    }

    fn restore(&self, state: &mut SoftState, saved: &[u8]) -> Result<(), Status> {
        if saved.len() != SAVED_STATE_BYTES {
            return Err(Status::InvalidSavedState);
        }
        let o = &state.options;
        let expected = [
            SAVED_VERSION,
            o.drbg.id(),
            o.tok_bytes,
            o.verifiers.id(),
            o.cipher.id(),
            o.hash.id(),
            1,
        ];
        if saved[..7] != expected || saved[8..12] != o.fixed_bytes.unwrap_or(0).to_le_bytes() {
            return Err(Status::InvalidSavedState);
        }
        let mut seq = [0u8; 4];
        seq.copy_from_slice(&saved[12..16]);
        state.seq = u32::from_le_bytes(seq);
        state.drbg.read_from(&saved[HEADER_BYTES..]);
        state.instantiated = true;
        Ok(())
    }

    fn encode_bytes(&self, state: &SoftState, data_bytes: usize) -> usize {
        let o = &state.options;
        if o.is_managed() {
            data_bytes + state.trailer_bytes()
        } else {
            let n = o.fixed_bytes.map_or(data_bytes, |f| f as usize);
            o.verifiers.header_bytes() + n * o.tok_bytes as usize
        }
    }

    fn decode_bytes(&self, state: &SoftState, encoded_bytes: usize) -> usize {
        let o = &state.options;
        if o.is_managed() {
            encoded_bytes.saturating_sub(state.trailer_bytes())
        } else {
            encoded_bytes.saturating_sub(o.verifiers.header_bytes()) / o.tok_bytes as usize
        }
    }

    fn encode(
        &self,
        state: &mut SoftState,
        data: &[u8],
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<Range<usize>, Status> {
        state.require_instantiated()?;
        if out.len() < self.encode_bytes(state, data.len()) {
            return Err(Status::BufferTooSmall);
        }
        if state.options.is_managed() {
            self.encode_managed(state, data, timestamp, out)
        } else {
            self.encode_tokens(state, data, timestamp, out)
        }
    }

    fn decode(
        &self,
        state: &mut SoftState,
        encoded: &[u8],
        timestamp: u64,
        out: &mut [u8],
    ) -> Result<DecodeInfo, Status> {
        state.require_instantiated()?;
        if state.options.is_managed() {
            self.decode_managed(state, encoded, timestamp, out)
        } else {
            self.decode_tokens(state, encoded, timestamp, out)
        }
    }

    fn uninstantiate(&self, state: &mut SoftState) -> Result<(), Status> {
        let was = state.instantiated;
        state.drbg.zeroize();
        state.seq = 0;
        state.instantiated = false;
        if was && state.options.drbg == crate::options::Drbg::Incr && self.faults.instantiate_error {
            return Err(Status::DrbgCatastrophic);
        }
        Ok(())
    }

    fn block_bytes(&self, state: &SoftState) -> usize {
        state.options.cipher.block_bytes()
    }

    fn encrypt_start(&self, state: &mut SoftState, timestamp: u64) -> Result<EncryptState, Status> {
        self.encrypt_start_inner(state, timestamp)
    }

    fn encrypt_chunk(&self, chunk: &mut EncryptState, data: &mut [u8]) -> Result<(), Status> {
        if data.len() % chunk.block_bytes != 0 {
            return Err(Status::InvalidChunkLength);
        }
        chunk.keys.cipher.apply(data);
        chunk.keys.mac.update(data);
        Ok(())
    }

    fn encrypt_finish_bytes(&self, state: &SoftState, tail_bytes: usize) -> usize {
        if state.options.is_managed() {
            tail_bytes + state.trailer_bytes()
        } else {
            0
        }
    }

    fn encrypt_finish(
        &self,
        chunk: EncryptState,
        tail: &[u8],
        out: &mut [u8],
    ) -> Result<Range<usize>, Status> {
        let header_bytes = chunk.header.len();
        let total = tail.len() + header_bytes + chunk.digest_bytes;
        if out.len() < total {
            return Err(Status::BufferTooSmall);
        }
        let EncryptState { mut keys, header, .. } = chunk;
        let (body, trailer) = out[..total].split_at_mut(tail.len());
        body.copy_from_slice(tail);
        keys.cipher.apply(body);
        keys.mac.update(body);
        keys.mac.update(&header);
        trailer[..header_bytes].copy_from_slice(&header);
        keys.mac.finalize_into(&mut trailer[header_bytes..]);
        Ok(0..total)
    }

    fn decrypt_start(&self, state: &SoftState) -> Result<DecryptState, Status> {
        state.require_instantiated()?;
        if !state.options.is_managed() {
            return Err(Status::Unsupported);
        }
        let mut pending = state.clone();
        let expected_seq = pending.seq;
        let keys = MessageKeys::derive(&mut pending, &self.faults)?;
        pending.seq = expected_seq.wrapping_add(1);
        let trailer_bytes = state.trailer_bytes();
        Ok(DecryptState {
            pending,
            expected_seq,
            keys,
            held: Zeroizing::new(Vec::with_capacity(trailer_bytes)),
            trailer_bytes,
        })
    }

    fn decrypt_chunk_bytes(&self, chunk: &DecryptState, encrypted_bytes: usize) -> usize {
        chunk.held.len() + encrypted_bytes
    }

    fn decrypt_chunk(
        &self,
        chunk: &mut DecryptState,
        encrypted: &[u8],
        out: &mut [u8],
    ) -> Result<usize, Status> {
        chunk.feed(encrypted, out)
    }

    fn decrypt_finish_bytes(&self, _chunk: &DecryptState) -> usize {
        0
    }

    fn decrypt_finish(
        &self,
        state: &mut SoftState,
        chunk: DecryptState,
        timestamp: u64,
        _out: &mut [u8],
    ) -> Result<DecodeInfo, Status> {
        if chunk.held.len() != chunk.trailer_bytes {
            return Err(Status::InvalidInput);
        }
        let DecryptState {
            pending,
            expected_seq,
            mut keys,
            held,
            ..
        } = chunk;
        let verifiers = pending.verifiers();
        let (header, tag) = held.split_at(verifiers.header_bytes());
        let (seq, enc_ts) = read_header(verifiers, header);
        if seq.is_some_and(|s| s != expected_seq) {
            return Err(Status::SeqOutsideWindow);
        }
        keys.mac.update(header);
        keys.mac.verify(tag)?;
        Self::check_window(&pending.options, enc_ts, timestamp)?;
        *state = pending;
        debug!("chunked message verified");
        Ok(DecodeInfo {
            range: 0..0,
            enc_ts,
            dec_ts: timestamp,
            msg_skipped: 0,
        })
    }
}
