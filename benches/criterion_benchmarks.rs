use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxisync::delta;
use oxisync::hash::{HashFamily, RollingChecksum};
use oxisync::patch::patch_all;
use oxisync::signature::{self, SignatureOptions};
use std::fs;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

fn mutate(base: &[u8], stride: usize) -> Vec<u8> {
    let mut out = base.to_vec();
    for i in (0..out.len()).step_by(stride.max(1)) {
        out[i] = out[i].wrapping_add(1);
    }
    out
}

fn make_delta(basis: &[u8], target: &[u8], opts: SignatureOptions) -> Vec<u8> {
    let sig = signature::signature_of(basis, opts).unwrap();
    delta::delta_all(&sig.build_index(), target).unwrap()
}

fn write_ratio_snapshot() {
    let basis = gen_data(2 * 1024 * 1024, 123);
    let target = mutate(&basis, 16 * 1024);
    let mut csv = String::from("block_len,delta_bytes,target_bytes,ratio\n");
    for block_len in [256u32, 512, 1024, 2048, 4096, 8192] {
        let opts = SignatureOptions::new(HashFamily::Blake2, block_len, 8).unwrap();
        let delta = make_delta(&basis, &target, opts);
        let ratio = delta.len() as f64 / target.len() as f64;
        csv.push_str(&format!(
            "{block_len},{},{},{}\n",
            delta.len(),
            target.len(),
            ratio
        ));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_rolling_checksum(c: &mut Criterion) {
    let mut g = c.benchmark_group("rollsum_rotate");
    let data = gen_data(1024 * 1024, 7);
    g.throughput(Throughput::Bytes(data.len() as u64));
    g.bench_function("rotate_2048", |b| {
        b.iter(|| {
            let mut sum = RollingChecksum::new();
            sum.update(&data[..2048]);
            for i in 2048..data.len() {
                sum.rotate(data[i - 2048], data[i]);
            }
            black_box(sum.value());
        });
    });
    g.finish();
}

fn bench_signature_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("signature_speed_mb_s");
    for family in [HashFamily::Md4, HashFamily::Blake2] {
        let size = 8 * 1024 * 1024usize;
        let basis = gen_data(size, 1);
        let opts = SignatureOptions::with_family(family);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::new("sequential", family), &basis, |b, basis| {
            b.iter(|| {
                let sig = signature::signature_of(black_box(basis), opts).unwrap();
                black_box(sig);
            });
        });
        #[cfg(feature = "parallel")]
        g.bench_with_input(BenchmarkId::new("parallel", family), &basis, |b, basis| {
            b.iter(|| {
                let sig = signature::build_signature_parallel(
                    black_box(basis.as_slice()),
                    std::io::sink(),
                    opts,
                )
                .unwrap();
                black_box(sig);
            });
        });
    }
    g.finish();
}

fn bench_delta_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("delta_speed_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let basis = gen_data(size, 2);
        let target = mutate(&basis, 4096);
        let index = signature::signature_of(&basis, SignatureOptions::default())
            .unwrap()
            .build_index();
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let delta = delta::delta_all(&index, black_box(&target)).unwrap();
                black_box(delta);
            });
        });
    }
    g.finish();
}

fn bench_delta_unmatched(c: &mut Criterion) {
    let mut g = c.benchmark_group("delta_unmatched_mb_s");
    let basis = gen_data(1024 * 1024, 5);
    let target = gen_data(8 * 1024 * 1024, 6);
    g.throughput(Throughput::Bytes(target.len() as u64));
    for block_len in [256u32, 2048, 16384] {
        let opts = SignatureOptions::new(HashFamily::Md4, block_len, 8).unwrap();
        let index = signature::signature_of(&basis, opts).unwrap().build_index();
        g.bench_with_input(BenchmarkId::from_parameter(block_len), &index, |b, index| {
            b.iter(|| {
                let delta = delta::delta_all(index, black_box(&target)).unwrap();
                black_box(delta);
            });
        });
    }
    g.finish();
}

fn bench_patch_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("patch_speed_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let basis = gen_data(size, 3);
        let target = mutate(&basis, 8192);
        let delta = make_delta(&basis, &target, SignatureOptions::default());
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let out = patch_all(black_box(&basis), black_box(&delta)).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_ratio_vs_block_len(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("delta_ratio_vs_block_len");
    let basis = gen_data(2 * 1024 * 1024, 4);
    let target = mutate(&basis, 16 * 1024);
    for block_len in [512u32, 2048, 8192] {
        let opts = SignatureOptions::new(HashFamily::Md4, block_len, 8).unwrap();
        g.bench_with_input(BenchmarkId::from_parameter(block_len), &opts, |b, opts| {
            b.iter(|| {
                let delta = make_delta(&basis, &target, *opts);
                let ratio = delta.len() as f64 / target.len() as f64;
                black_box(ratio);
            });
        });
    }
    g.finish();
}

fn bench_real_world_scenarios(c: &mut Criterion) {
    let mut g = c.benchmark_group("real_world_scenarios");
    let scenarios = [
        ("software_update", 4 * 1024 * 1024usize, 1024usize),
        ("document_versioning", 512 * 1024usize, 256usize),
        ("database_snapshot", 8 * 1024 * 1024usize, 4096usize),
        ("log_append", 2 * 1024 * 1024usize, usize::MAX),
    ];

    for (name, size, stride) in scenarios {
        let basis = gen_data(size, size as u64);
        let mut target = mutate(&basis, stride);
        if stride == usize::MAX {
            target.extend_from_slice(&gen_data(64 * 1024, 99));
        }
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_function(name, |b| {
            b.iter(|| {
                let delta = make_delta(&basis, &target, SignatureOptions::default());
                let out = patch_all(&basis, &delta).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_rolling_checksum,
    bench_signature_speed,
    bench_delta_speed,
    bench_delta_unmatched,
    bench_patch_speed,
    bench_ratio_vs_block_len,
    bench_real_world_scenarios
);
criterion_main!(benches);
