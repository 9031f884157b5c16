use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use dyldtrie::trie::{ExportInfo, decoder, encoder};

// Synthetic export set shaped like a real dylib: clustered prefixes
// (_objc_, _swift_, plain C symbols) so the trie actually shares edges.
fn gen_exports(count: usize) -> Vec<ExportInfo> {
    let prefixes = ["_objc_msg", "_swift_run", "_os_log_", "_"];
    (0..count)
        .map(|i| {
            let prefix = prefixes[i % prefixes.len()];
            let name = format!("{prefix}sym_{i:06}");
            match i % 5 {
                0 => ExportInfo::weak(name, 0x1000 + i as u64 * 16),
                1 => ExportInfo::reexport(name, 1 + (i as u64 % 8), ""),
                2 => ExportInfo::stub_resolver(name, 0x8000 + i as u64, 0x9000 + i as u64),
                _ => ExportInfo::regular(name, 0x1000 + i as u64 * 16),
            }
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for count in [64usize, 1024, 8192] {
        let exports = gen_exports(count);
        let payload_len = encoder::encode(&exports).unwrap().len();
        group.throughput(Throughput::Bytes(payload_len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &exports, |b, exports| {
            b.iter(|| encoder::encode(black_box(exports)).unwrap());
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for count in [64usize, 1024, 8192] {
        let payload = encoder::encode(&gen_exports(count)).unwrap();
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &payload, |b, payload| {
            b.iter(|| decoder::decode(black_box(payload)).unwrap());
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let payload = encoder::encode(&gen_exports(8192)).unwrap();
    c.bench_function("lookup_hit", |b| {
        b.iter(|| decoder::lookup(black_box(&payload), black_box("_sym_004095")).unwrap());
    });
    c.bench_function("lookup_miss", |b| {
        b.iter(|| decoder::lookup(black_box(&payload), black_box("_absent_symbol")).unwrap());
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_lookup);
criterion_main!(benches);
