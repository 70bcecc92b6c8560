use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use seal_sdr::options::{Options, Verifiers};
use seal_sdr::sdr::{MemoryStore, Sdr, Tier};
use seal_sdr::session::{Decoder, Encoder};
use std::hint::black_box;
use std::io::Cursor;

fn pair(options: Options) -> (Encoder, Decoder) {
    let mut encoder = Encoder::new(options).unwrap();
    let mut decoder = Decoder::new(options).unwrap();
    encoder.set_entropy(vec![1u8; 32]);
    decoder.set_entropy(vec![1u8; 32]);
    encoder.set_nonce_u64(1);
    decoder.set_nonce_u64(1);
    encoder.instantiate("bench").unwrap();
    decoder.instantiate("bench").unwrap();
    (encoder, decoder)
}

fn bench_token_mode(c: &mut Criterion) {
    let mut group = c.benchmark_group("token");
    for size in [16usize, 256, 4096] {
        let data = vec![0xa5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &data, |b, data| {
            let (mut encoder, _) = pair(Options::default().with_verifiers(Verifiers::Seq));
            b.iter(|| encoder.encode(black_box(data)).unwrap());
        });
    }
    group.finish();
}

fn bench_managed_mode(c: &mut Criterion) {
    let mut group = c.benchmark_group("managed");
    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let data = vec![0x5au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &data, |b, data| {
            let (mut encoder, _) = pair(Options::managed());
            b.iter(|| encoder.encode(black_box(data)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("round_trip", size), &data, |b, data| {
            let (mut encoder, mut decoder) = pair(Options::managed());
            b.iter(|| {
                let encoded = encoder.encode(black_box(data)).unwrap();
                decoder.decode(&encoded).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let size = 4 * 1024 * 1024;
    let data = vec![0x11u8; size];
    let mut group = c.benchmark_group("stream");
    group.sample_size(20);
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("encrypt 4MB", |b| {
        let (mut encoder, _) = pair(Options::managed());
        b.iter(|| {
            let mut out = Vec::with_capacity(size + 64);
            seal_sdr::chunk::encrypt_stream(&mut encoder, Cursor::new(&data), &mut out, 64 * 1024).unwrap();
            out
        });
    });
    group.finish();
}

fn bench_sdr(c: &mut Criterion) {
    let mut sdr = Sdr::with_store(MemoryStore::new(), "bench").unwrap();
    sdr.init_sdr(vec![7u8; 32], 42).unwrap();
    let value = vec![0u8; 256];
    c.bench_function("sdr write+read 256B", |b| {
        b.iter(|| {
            sdr.write("record", black_box(&value), Tier::Durable).unwrap();
            sdr.read_data("record").unwrap()
        });
    });
}

criterion_group!(benches, bench_token_mode, bench_managed_mode, bench_stream, bench_sdr);
criterion_main!(benches);
