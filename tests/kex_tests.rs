//!
//! 密钥交换集成测试
//!
//! 双方通过 Kyber 或 X25519 协商出共享秘密，再把它作为会话熵，
//! 验证协商结果可以直接驱动一对编码器/解码器。
//!
//! Kyber 强度在进程内只能配置一次，本文件统一使用 K1024。
//!

use seal_sdr::config::KexConfig;
use seal_sdr::kex::{EcdhKeyPair, KexError, KyberContext, KyberStrength, ecdh};
use seal_sdr::options::Options;
use seal_sdr::session::{Decoder, Encoder};

fn kyber() -> KyberContext {
    KexConfig {
        kyber_strength: KyberStrength::K1024,
    }
    .kyber_context()
    .unwrap()
}

fn sessions_from_secrets(a: &[u8], b: &[u8]) -> (Encoder, Decoder) {
    let mut encoder = Encoder::new(Options::managed()).unwrap();
    let mut decoder = Decoder::new(Options::managed()).unwrap();
    encoder.set_entropy(a.to_vec());
    decoder.set_entropy(b.to_vec());
    encoder.set_nonce_u64(1);
    decoder.set_nonce_u64(1);
    encoder.instantiate("kex").unwrap();
    decoder.instantiate("kex").unwrap();
    (encoder, decoder)
}

#[test]
fn test_kyber_secret_drives_a_session() {
    let ctx = kyber();
    let mut receiver = ctx.key_pair();
    let sender = ctx.key_pair();

    let mut public_key = vec![0u8; ctx.public_key_bytes()];
    receiver.create_key_pair(&mut public_key).unwrap();

    let mut sender_secret = vec![0u8; ctx.secret_bytes()];
    let mut encrypted = vec![0u8; ctx.ciphertext_bytes()];
    sender
        .create_secret(&public_key, &mut sender_secret, &mut encrypted)
        .unwrap();

    let mut receiver_secret = vec![0u8; ctx.secret_bytes()];
    receiver.decrypt_secret(&encrypted, &mut receiver_secret).unwrap();
    assert_eq!(sender_secret, receiver_secret);

    let (mut encoder, mut decoder) = sessions_from_secrets(&sender_secret, &receiver_secret);
    let encoded = encoder.encode(b"post-quantum hello").unwrap();
    assert_eq!(decoder.decode(&encoded).unwrap(), b"post-quantum hello");
}

#[test]
fn test_kyber_private_key_is_single_use() {
    let ctx = kyber();
    let mut receiver = ctx.key_pair();
    let mut public_key = vec![0u8; ctx.public_key_bytes()];
    receiver.create_key_pair(&mut public_key).unwrap();

    let mut secret = vec![0u8; ctx.secret_bytes()];
    let mut encrypted = vec![0u8; ctx.ciphertext_bytes()];
    ctx.key_pair()
        .create_secret(&public_key, &mut secret, &mut encrypted)
        .unwrap();

    receiver.decrypt_secret(&encrypted, &mut secret).unwrap();
    assert!(!receiver.has_keys());
    assert_eq!(
        receiver.decrypt_secret(&encrypted, &mut secret),
        Err(KexError::InvalidPrivateKey)
    );
}

#[test]
fn test_kyber_rejects_foreign_public_key() {
    let ctx = kyber();
    let mut secret = vec![0u8; ctx.secret_bytes()];
    let mut encrypted = vec![0u8; ctx.ciphertext_bytes()];

    // X25519 公钥不是 Kyber 公钥
    let mut x25519_pk = [0u8; ecdh::PUBLIC_KEY_BYTES];
    EcdhKeyPair::new().create_key_pair(&mut x25519_pk).unwrap();
    assert_eq!(
        ctx.key_pair()
            .create_secret(&x25519_pk, &mut secret, &mut encrypted),
        Err(KexError::InvalidPublicKey)
    );

    let mut public_key = vec![0u8; ctx.public_key_bytes()];
    ctx.key_pair().create_key_pair(&mut public_key).unwrap();
    assert_eq!(
        ctx.key_pair()
            .create_secret(&public_key[..public_key.len() - 1], &mut secret, &mut encrypted),
        Err(KexError::InvalidPublicKey)
    );
}

#[test]
fn test_ecdh_secret_drives_a_session() {
    let mut alice = EcdhKeyPair::new();
    let mut bob = EcdhKeyPair::new();
    let mut alice_pk = [0u8; ecdh::PUBLIC_KEY_BYTES];
    let mut bob_pk = [0u8; ecdh::PUBLIC_KEY_BYTES];
    alice.create_key_pair(&mut alice_pk).unwrap();
    bob.create_key_pair(&mut bob_pk).unwrap();

    let mut alice_secret = [0u8; ecdh::SECRET_BYTES];
    let mut bob_secret = [0u8; ecdh::SECRET_BYTES];
    alice.create_secret(&bob_pk, &mut alice_secret).unwrap();
    bob.create_secret(&alice_pk, &mut bob_secret).unwrap();
    assert_eq!(alice_secret, bob_secret);
    assert!(!alice.has_keys() && !bob.has_keys());

    let (mut encoder, mut decoder) = sessions_from_secrets(&alice_secret, &bob_secret);
    let encoded = encoder.encode(b"x25519 hello").unwrap();
    assert_eq!(decoder.decode(&encoded).unwrap(), b"x25519 hello");
}

#[test]
fn test_ecdh_buffer_checks_do_not_consume_keys() {
    let mut kp = EcdhKeyPair::new();
    let mut small = [0u8; 16];
    assert!(matches!(
        kp.create_key_pair(&mut small),
        Err(KexError::BufferSize { expected: 32, actual: 16 })
    ));

    let mut pk = [0u8; 32];
    kp.create_key_pair(&mut pk).unwrap();
    let mut short_secret = [0u8; 8];
    assert!(kp.create_secret(&pk, &mut short_secret).is_err());
    assert!(kp.has_keys());
    assert_eq!(
        kp.create_secret(&pk[..31], &mut [0u8; 32]),
        Err(KexError::InvalidPublicKey)
    );
    assert!(kp.has_keys());
}
