//!
//! SDR 集成测试
//!
//! 覆盖两层记录、重新初始化后的读取、删除以及记录 nonce 的唯一性。
//!

use seal_sdr::config::SdrConfig;
use seal_sdr::options::{Options, Verifiers};
use seal_sdr::sdr::{FileStore, MemoryStore, RecordStore, Sdr, Tier};
use seal_sdr::{Error, Status};
use tempfile::tempdir;

const ENTROPY: [u8; 32] = [0x5a; 32];
const NONCE: u64 = 0xfeed_beef;

fn file_sdr(dir: &std::path::Path) -> Sdr {
    let location = dir.join("records");
    let mut sdr = Sdr::new(location.to_str().unwrap()).unwrap();
    sdr.init_sdr(ENTROPY.to_vec(), NONCE).unwrap();
    sdr
}

// === 基本读写 ===

#[test]
fn test_write_and_read_both_tiers() {
    let dir = tempdir().unwrap();
    let mut sdr = file_sdr(dir.path());
    assert!(sdr.store().location_exists(sdr.location()));

    sdr.write_str("durable", "on disk", Tier::Durable).unwrap();
    sdr.write("memory", &[0, 1, 2, 3], Tier::Memory).unwrap();

    assert_eq!(sdr.read_string("durable").unwrap(), "on disk");
    assert_eq!(sdr.read_data("memory").unwrap(), [0, 1, 2, 3]);
    assert!(sdr.store().record_exists(sdr.location(), "durable"));
    assert!(!sdr.store().record_exists(sdr.location(), "memory"));
}

#[test]
fn test_durable_records_survive_reinitialization() {
    let dir = tempdir().unwrap();
    {
        let mut sdr = file_sdr(dir.path());
        sdr.write_str("token", "s3cr3t", Tier::Durable).unwrap();
        sdr.write_str("volatile", "gone", Tier::Memory).unwrap();
    }

    // 新进程：同样的基础熵和 nonce
    let mut sdr = file_sdr(dir.path());
    assert_eq!(sdr.read_string("token").unwrap(), "s3cr3t");
    assert!(matches!(sdr.read_data("volatile"), Err(Error::Io(_))));
}

#[test]
fn test_wrong_base_seed_cannot_read() {
    let dir = tempdir().unwrap();
    let mut sdr = file_sdr(dir.path());
    sdr.write_str("token", "s3cr3t", Tier::Durable).unwrap();

    sdr.init_sdr(vec![0x11; 32], NONCE).unwrap();
    let err = sdr.read_data("token").unwrap_err();
    assert_eq!(err.status(), Some(Status::TagMismatch));

    sdr.init_sdr(ENTROPY.to_vec(), NONCE + 1).unwrap();
    assert_eq!(sdr.read_data("token").unwrap_err().status(), Some(Status::TagMismatch));
}

#[test]
fn test_memory_tier_shadows_durable() {
    let dir = tempdir().unwrap();
    let mut sdr = file_sdr(dir.path());
    sdr.write_str("k", "durable", Tier::Durable).unwrap();
    sdr.write_str("k", "memory", Tier::Memory).unwrap();
    assert_eq!(sdr.read_string("k").unwrap(), "memory");

    // 删除先作用于内存层
    sdr.remove("k").unwrap();
    assert_eq!(sdr.read_string("k").unwrap(), "durable");
    sdr.remove("k").unwrap();
    assert!(sdr.read_data("k").is_err());
    sdr.remove("k").unwrap();
}

#[test]
fn test_overwrite_and_rewrite_after_remove() {
    let dir = tempdir().unwrap();
    let mut sdr = file_sdr(dir.path());
    sdr.write_str("k", "first", Tier::Durable).unwrap();
    sdr.write_str("k", "second", Tier::Durable).unwrap();
    assert_eq!(sdr.read_string("k").unwrap(), "second");

    sdr.remove("k").unwrap();
    sdr.write_str("k", "third", Tier::Durable).unwrap();
    assert_eq!(sdr.read_string("k").unwrap(), "third");
}

#[test]
fn test_memory_tier_accepts_any_name() {
    let dir = tempdir().unwrap();
    let mut sdr = file_sdr(dir.path());
    sdr.write_str("a/b/../c", "fine", Tier::Memory).unwrap();
    assert_eq!(sdr.read_string("a/b/../c").unwrap(), "fine");
    assert!(matches!(
        sdr.write_str("a/b/../c", "rejected", Tier::Durable),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_remove_sdr_deletes_everything() {
    let dir = tempdir().unwrap();
    let mut sdr = file_sdr(dir.path());
    for key in ["a", "b", "c"] {
        sdr.write_str(key, key, Tier::Durable).unwrap();
    }
    sdr.write_str("m", "m", Tier::Memory).unwrap();

    sdr.remove_sdr().unwrap();
    assert!(!sdr.is_initialized());
    assert!(!dir.path().join("records").exists());
    assert!(matches!(sdr.read_data("a"), Err(Error::NotInitialized)));

    // 重新初始化后位置被重新创建，旧记录不复存在
    sdr.init_sdr(ENTROPY.to_vec(), NONCE).unwrap();
    assert!(sdr.read_data("a").is_err());
    assert!(sdr.read_data("m").is_err());
}

// === nonce 唯一性 ===

#[test]
fn test_same_instant_same_value_differs_by_name() {
    let mut sdr = Sdr::with_store(MemoryStore::with_timestamp(0x1234_5678), "loc").unwrap();
    sdr.init_sdr(ENTROPY.to_vec(), NONCE).unwrap();
    sdr.write_str("one", "same value", Tier::Durable).unwrap();
    sdr.write_str("two", "same value", Tier::Durable).unwrap();

    let one = sdr.store().read_record("loc", "one").unwrap();
    let two = sdr.store().read_record("loc", "two").unwrap();
    assert_eq!(one[..8], two[..8]);
    assert_ne!(one[8..], two[8..]);

    // 交换记录内容：个性化串不同，解码失败
    sdr.store_mut().write_record("loc", "one", &two).unwrap();
    assert_eq!(sdr.read_data("one").unwrap_err().status(), Some(Status::TagMismatch));
}

#[test]
fn test_rewrites_at_different_instants_differ() {
    let mut sdr = Sdr::with_store(MemoryStore::with_timestamp(1), "loc").unwrap();
    sdr.init_sdr(ENTROPY.to_vec(), NONCE).unwrap();
    sdr.write_str("k", "value", Tier::Durable).unwrap();
    let first = sdr.store().read_record("loc", "k").unwrap();

    sdr.store_mut().set_timestamp(Some(2));
    sdr.write_str("k", "value", Tier::Durable).unwrap();
    let second = sdr.store().read_record("loc", "k").unwrap();
    assert_ne!(first, second);
    assert_eq!(sdr.read_string("k").unwrap(), "value");
}

#[test]
fn test_two_sdrs_with_distinct_nonces() {
    let store = MemoryStore::with_timestamp(99);
    let mut a = Sdr::with_store(store.clone(), "loc").unwrap();
    let mut b = Sdr::with_store(store, "loc").unwrap();
    a.init_sdr(ENTROPY.to_vec(), 1).unwrap();
    b.init_sdr(ENTROPY.to_vec(), 2).unwrap();
    a.write_str("k", "value", Tier::Durable).unwrap();
    b.write_str("k", "value", Tier::Durable).unwrap();

    let ra = a.store().read_record("loc", "k").unwrap();
    let rb = b.store().read_record("loc", "k").unwrap();
    assert_ne!(ra[8..], rb[8..]);

    b.store_mut().write_record("loc", "k", &ra).unwrap();
    assert!(b.read_data("k").is_err());
}

// === 配置 ===

#[test]
fn test_sdr_from_config() {
    let dir = tempdir().unwrap();
    let config = SdrConfig {
        location: dir.path().join("cfg").to_str().unwrap().to_string(),
        options: Options::managed().with_verifiers(Verifiers::Seq),
    };
    let mut sdr = Sdr::from_config(&config, FileStore::new()).unwrap();
    assert_eq!(sdr.encoder().options(), &config.options);
    sdr.init_sdr(ENTROPY.to_vec(), NONCE).unwrap();
    sdr.write_str("k", "configured", Tier::Durable).unwrap();
    assert_eq!(sdr.read_string("k").unwrap(), "configured");
}
