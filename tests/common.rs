//!
//! 集成测试的通用辅助函数
//!
#![allow(dead_code)]

use seal_sdr::options::Options;
use seal_sdr::session::{Decoder, Encoder};

/// 创建一对用相同熵、nonce 和个性化串实例化的编码器/解码器。
pub fn session_pair(options: Options, personalization: &str) -> (Encoder, Decoder) {
    let mut encoder = Encoder::new(options).unwrap();
    let mut decoder = Decoder::new(options).unwrap();
    for session in [&mut *encoder, &mut *decoder] {
        session.set_entropy(vec![0x42; 48]);
        session.set_nonce_u64(0x0102_0304_0506_0708);
        session.instantiate(personalization).unwrap();
    }
    (encoder, decoder)
}

/// 固定时间戳，便于检查时间窗口。
pub fn pin_timestamps(encoder: &mut Encoder, decoder: &mut Decoder, enc_ts: u64, dec_ts: u64) {
    encoder.set_timestamp_callback(Some(Box::new(move || enc_ts)));
    decoder.set_timestamp_callback(Some(Box::new(move || dec_ts)));
}

/// 一段有规律的测试数据。
pub fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
