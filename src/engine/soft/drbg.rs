//! HMAC-DRBG (SP 800-90A) 与测试用的递增生成器。

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

use crate::options::Drbg;
use crate::status::Status;

/// 最大输出块长度（SHA-512）。
pub(crate) const MAX_OUT: usize = 64;

/// 递增生成器的故障注入开关。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IncrFaults {
    /// 实例化与反实例化时返回错误。
    pub instantiate_error: bool,
    /// 生成了这么多字节之后，之后的生成返回错误。
    pub generate_error_after: Option<u64>,
}

/// DRBG 的工作状态。
#[derive(Clone, Zeroize)]
pub(crate) struct DrbgState {
    #[zeroize(skip)]
    kind: Drbg,
    key: [u8; MAX_OUT],
    value: [u8; MAX_OUT],
    reseed_counter: u64,
}

fn hmac_parts(kind: Drbg, key: &[u8], parts: &[&[u8]], out: &mut [u8]) -> Result<(), Status> {
    match kind {
        Drbg::HmacSha512 => {
            let mut mac =
                <Hmac<Sha512> as Mac>::new_from_slice(key).map_err(|_| Status::DrbgCatastrophic)?;
            for part in parts {
                mac.update(part);
            }
            out.copy_from_slice(&mac.finalize().into_bytes());
        }
        _ => {
            let mut mac =
                <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|_| Status::DrbgCatastrophic)?;
            for part in parts {
                mac.update(part);
            }
            out.copy_from_slice(&mac.finalize().into_bytes());
        }
    }
    Ok(())
}

impl DrbgState {
    pub(crate) fn new(kind: Drbg) -> Self {
        Self {
            kind,
            key: [0u8; MAX_OUT],
            value: [0u8; MAX_OUT],
            reseed_counter: 0,
        }
    }

    fn out_len(&self) -> usize {
        match self.kind {
            Drbg::HmacSha512 => 64,
            Drbg::HmacSha256 => 32,
            Drbg::Incr => 8,
        }
    }

    pub(crate) fn reseed_counter(&self) -> u64 {
        self.reseed_counter
    }

    pub(crate) fn instantiate(&mut self, seed: &[&[u8]], faults: &IncrFaults) -> Result<(), Status> {
        self.zeroize();
        match self.kind {
            Drbg::Incr => {
                if faults.instantiate_error {
                    return Err(Status::DrbgCatastrophic);
                }
                // 起始字节由全部播种材料异或得到
                self.key[0] = seed.iter().flat_map(|p| p.iter()).fold(0u8, |acc, b| acc ^ b);
            }
            _ => {
                let n = self.out_len();
                self.value[..n].fill(0x01);
                self.update(seed)?;
            }
        }
        self.reseed_counter = 1;
        Ok(())
    }

    fn update(&mut self, provided: &[&[u8]]) -> Result<(), Status> {
        let n = self.out_len();
        let mut key = [0u8; MAX_OUT];
        let mut value = [0u8; MAX_OUT];
        value[..n].copy_from_slice(&self.value[..n]);

        let mut parts: Vec<&[u8]> = vec![&value[..n], &[0x00u8][..]];
        parts.extend_from_slice(provided);
        hmac_parts(self.kind, &self.key[..n], &parts, &mut key[..n])?;
        hmac_parts(self.kind, &key[..n], &[&value[..n]], &mut self.value[..n])?;
        self.key[..n].copy_from_slice(&key[..n]);

        if provided.iter().any(|p| !p.is_empty()) {
            value[..n].copy_from_slice(&self.value[..n]);
            let mut parts: Vec<&[u8]> = vec![&value[..n], &[0x01u8][..]];
            parts.extend_from_slice(provided);
            hmac_parts(self.kind, &self.key[..n], &parts, &mut key[..n])?;
            hmac_parts(self.kind, &key[..n], &[&value[..n]], &mut self.value[..n])?;
            self.key[..n].copy_from_slice(&key[..n]);
        }
        key.zeroize();
        value.zeroize();
        Ok(())
    }

    /// 生成 `out.len()` 字节。每次调用使重新播种计数器加一。
    pub(crate) fn generate(&mut self, out: &mut [u8], faults: &IncrFaults) -> Result<(), Status> {
        if self.reseed_counter == 0 {
            return Err(Status::NotInstantiated);
        }
        if self.reseed_counter > self.kind.reseed_interval() {
            return Err(Status::DrbgSeedLifeReached);
        }
        match self.kind {
            Drbg::Incr => {
                let produced = u64::from_le_bytes(self.value_prefix());
                if let Some(after) = faults.generate_error_after {
                    if produced.saturating_add(out.len() as u64) > after {
                        return Err(Status::DrbgCatastrophic);
                    }
                }
                let start = self.key[0];
                for (i, b) in out.iter_mut().enumerate() {
                    *b = start.wrapping_add(produced.wrapping_add(i as u64) as u8);
                }
                let produced = produced.wrapping_add(out.len() as u64);
                self.value[..8].copy_from_slice(&produced.to_le_bytes());
            }
            _ => {
                let n = self.out_len();
                let mut block = [0u8; MAX_OUT];
                for piece in out.chunks_mut(n) {
                    block[..n].copy_from_slice(&self.value[..n]);
                    hmac_parts(self.kind, &self.key[..n], &[&block[..n]], &mut self.value[..n])?;
                    piece.copy_from_slice(&self.value[..piece.len()]);
                }
                block.zeroize();
                self.update(&[])?;
            }
        }
        self.reseed_counter += 1;
        Ok(())
    }

    fn value_prefix(&self) -> [u8; 8] {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.value[..8]);
        prefix
    }

    /// 写入保存格式：重新播种计数器、key、value。
    pub(crate) fn write_to(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.reseed_counter.to_le_bytes());
        out[8..8 + MAX_OUT].copy_from_slice(&self.key);
        out[8 + MAX_OUT..8 + 2 * MAX_OUT].copy_from_slice(&self.value);
    }

    pub(crate) fn read_from(&mut self, saved: &[u8]) {
        let mut counter = [0u8; 8];
        counter.copy_from_slice(&saved[..8]);
        self.reseed_counter = u64::from_le_bytes(counter);
        self.key.copy_from_slice(&saved[8..8 + MAX_OUT]);
        self.value.copy_from_slice(&saved[8 + MAX_OUT..8 + 2 * MAX_OUT]);
    }

    /// 保存格式中 DRBG 部分的长度。
    pub(crate) const SAVED_BYTES: usize = 8 + 2 * MAX_OUT;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(kind: Drbg, entropy: &[u8]) -> DrbgState {
        let mut drbg = DrbgState::new(kind);
        drbg.instantiate(&[entropy, &b"nonce-nonce-nonce"[..], &b"ps"[..]], &IncrFaults::default())
            .unwrap();
        drbg
    }

    #[test]
    fn hmac_drbg_is_deterministic() {
        let mut a = seeded(Drbg::HmacSha256, &[1u8; 32]);
        let mut b = seeded(Drbg::HmacSha256, &[1u8; 32]);
        let (mut x, mut y) = ([0u8; 80], [0u8; 80]);
        a.generate(&mut x, &IncrFaults::default()).unwrap();
        b.generate(&mut y, &IncrFaults::default()).unwrap();
        assert_eq!(x, y);
        assert_eq!(a.reseed_counter(), 2);
    }

    #[test]
    fn different_entropy_gives_different_output() {
        let mut a = seeded(Drbg::HmacSha512, &[1u8; 32]);
        let mut b = seeded(Drbg::HmacSha512, &[2u8; 32]);
        let (mut x, mut y) = ([0u8; 32], [0u8; 32]);
        a.generate(&mut x, &IncrFaults::default()).unwrap();
        b.generate(&mut y, &IncrFaults::default()).unwrap();
        assert_ne!(x, y);
    }

    #[test]
    fn uninstantiated_drbg_refuses_to_generate() {
        let mut drbg = DrbgState::new(Drbg::HmacSha256);
        let mut out = [0u8; 8];
        assert_eq!(
            drbg.generate(&mut out, &IncrFaults::default()),
            Err(Status::NotInstantiated)
        );
    }

    #[test]
    fn incr_reports_seed_life() {
        let mut drbg = seeded(Drbg::Incr, &[3u8]);
        let mut out = [0u8; 1];
        for _ in 0..Drbg::Incr.reseed_interval() {
            drbg.generate(&mut out, &IncrFaults::default()).unwrap();
        }
        assert_eq!(
            drbg.generate(&mut out, &IncrFaults::default()),
            Err(Status::DrbgSeedLifeReached)
        );
    }

    #[test]
    fn incr_fault_injection() {
        let faults = IncrFaults {
            instantiate_error: false,
            generate_error_after: Some(4),
        };
        let mut drbg = DrbgState::new(Drbg::Incr);
        drbg.instantiate(&[&[1u8][..]], &faults).unwrap();
        let mut out = [0u8; 4];
        drbg.generate(&mut out, &faults).unwrap();
        assert_eq!(drbg.generate(&mut out, &faults), Err(Status::DrbgCatastrophic));

        let failing = IncrFaults {
            instantiate_error: true,
            generate_error_after: None,
        };
        let mut drbg = DrbgState::new(Drbg::Incr);
        assert_eq!(drbg.instantiate(&[&[1u8][..]], &failing), Err(Status::DrbgCatastrophic));
    }

    #[test]
    fn save_format_round_trips() {
        let mut a = seeded(Drbg::HmacSha256, &[5u8; 40]);
        let mut saved = [0u8; DrbgState::SAVED_BYTES];
        a.write_to(&mut saved);
        let mut b = DrbgState::new(Drbg::HmacSha256);
        b.read_from(&saved);
        let (mut x, mut y) = ([0u8; 16], [0u8; 16]);
        a.generate(&mut x, &IncrFaults::default()).unwrap();
        b.generate(&mut y, &IncrFaults::default()).unwrap();
        assert_eq!(x, y);
        assert_eq!(a.reseed_counter(), b.reseed_counter());
    }
}
