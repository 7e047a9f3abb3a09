use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lineseek::reader::ChunkedIndexBuilder;
use lineseek::{ByteSource, WorkerPool};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::runtime::Runtime;

fn create_test_file(size_kb: usize) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let mut rng = StdRng::seed_from_u64(42);
    let target_size = size_kb * 1024;
    let mut current_size = 0;
    let mut line_num = 0;

    while current_size < target_size {
        let payload_len = rng.gen_range(20..120);
        let payload: String = (0..payload_len).map(|_| rng.gen_range('a'..='z')).collect();
        let line = format!("{line_num:08} {payload}\n");
        temp_file.write_all(line.as_bytes()).unwrap();
        current_size += line.len();
        line_num += 1;
    }

    temp_file.flush().unwrap();
    temp_file
}

fn bench_index_build(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("index_build");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    let sizes_kb = [64, 512, 4096];

    for &size_kb in &sizes_kb {
        let temp_file = create_test_file(size_kb);
        let source = ByteSource::from_path(temp_file.path()).expect("map file");

        group.bench_with_input(
            BenchmarkId::new("full_scan", format!("{size_kb}KB")),
            &source,
            |b, source| {
                b.iter(|| {
                    rt.block_on(async {
                        let pool = Arc::new(WorkerPool::with_max_workers(1));
                        let builder = ChunkedIndexBuilder::new(Arc::clone(&pool));
                        let index = builder
                            .build(source, |_, _| {})
                            .await
                            .expect("index build failed");
                        pool.shutdown().await;
                        black_box(index.line_count())
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("index_chunk_size");
    group.sample_size(10);

    let temp_file = create_test_file(1024);
    let source = ByteSource::from_path(temp_file.path()).expect("map file");

    for &chunk_kb in &[16usize, 64, 256, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{chunk_kb}KB")),
            &chunk_kb,
            |b, &chunk_kb| {
                b.iter(|| {
                    rt.block_on(async {
                        let pool = Arc::new(WorkerPool::with_max_workers(1));
                        let builder = ChunkedIndexBuilder::new(Arc::clone(&pool))
                            .with_chunk_size(chunk_kb * 1024);
                        let index = builder
                            .build(&source, |_, _| {})
                            .await
                            .expect("index build failed");
                        pool.shutdown().await;
                        black_box(index.line_count())
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_index_build, bench_chunk_sizes);
criterion_main!(benches);
