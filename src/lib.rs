//! # Seal-SDR: Session Encoding and Secure Data Replacement
//!
//! `seal-sdr` provides short-lived encode/decode sessions built on a pluggable
//! cryptographic engine, and an encrypted, timestamped record store built on
//! top of those sessions.
//!
//! ## Core Concepts
//!
//! - **`Engine`**: the capability trait behind every session (DRBG, token codec,
//!   managed-key cipher and hash). [`SoftEngine`] is the bundled pure-Rust engine.
//! - **`Encoder` / `Decoder`**: one engine state each, with an
//!   instantiate / use / save-restore / uninstantiate lifecycle.
//! - **Chunks**: managed-key sessions can also encrypt and decrypt incrementally,
//!   see [`chunk`].
//! - **Key exchange**: single-use Kyber and X25519 helpers, see [`kex`].
//! - **`Sdr`**: named records, each sealed by its own freshly seeded session,
//!   over any [`sdr::RecordStore`].
//!
//! ## Quick Start
//!
//! ```rust
//! use seal_sdr::prelude::*;
//!
//! fn main() -> Result<(), Error> {
//!     let options = Options::managed();
//!     let mut encoder = Encoder::new(options)?;
//!     let mut decoder = Decoder::new(options)?;
//!
//!     // 双方使用相同的熵、nonce 和个性化串
//!     encoder.set_entropy(vec![7u8; 32]);
//!     decoder.set_entropy(vec![7u8; 32]);
//!     encoder.set_nonce_u64(1);
//!     decoder.set_nonce_u64(1);
//!     encoder.instantiate("demo").map_err(|s| Error::engine("instantiate", s))?;
//!     decoder.instantiate("demo").map_err(|s| Error::engine("instantiate", s))?;
//!
//!     let encoded = encoder.encode(b"Hello, Seal-SDR!").map_err(|s| Error::engine("encode", s))?;
//!     let decoded = decoder.decode(&encoded).map_err(|s| Error::engine("decode", s))?;
//!     assert_eq!(decoded, b"Hello, Seal-SDR!");
//!     Ok(())
//! }
//! ```

pub mod chunk;
pub mod config;
pub mod engine;
pub mod error;
pub mod kex;
pub mod options;
pub mod sdr;
pub mod seed;
pub mod session;
pub mod status;

pub use engine::soft::SoftEngine;
pub use error::Error;
pub use status::Status;

// --- Prelude ---
// The most commonly used types.
pub mod prelude {
    pub use crate::chunk::{ChunkDecryptor, ChunkEncryptor, ChunkPhase};
    pub use crate::config::{ConfigFile, KexConfig, SdrConfig};
    pub use crate::engine::Engine;
    pub use crate::engine::soft::SoftEngine;
    pub use crate::error::Error;
    pub use crate::options::{Cipher, Drbg, Hash, Options, Verifiers};
    pub use crate::sdr::{FileStore, MemoryStore, RecordStore, Sdr, Tier};
    pub use crate::session::{Decoder, Encoder};
    pub use crate::status::Status;
}

/// The version of the `seal-sdr` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
