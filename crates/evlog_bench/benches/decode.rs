use criterion::{criterion_group, criterion_main, Criterion, black_box};
use evlog_core::{Catalog, EngineConfig, EventIndex, LogReader, LogWriter, ScanOptions, TimeBase};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_log(records: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut w = LogWriter::in_memory();
    let mut tick = 0u16;
    while w.records() < records {
        match rng.random_range(0..10u32) {
            0..=3 => {
                tick = tick.wrapping_add(rng.random_range(1..3000));
                w.tick(tick).unwrap();
            }
            4..=5 => w.voltage(rng.random_range(3000..4200)).unwrap(),
            6 => w.position(rng.random(), rng.random()).unwrap(),
            7 => w.counter(rng.random()).unwrap(),
            8 => w.message("sensor ok").unwrap(),
            _ => w.label("checkpoint").unwrap(),
        }
    }
    w.into_bytes()
}

fn bench_decode(c: &mut Criterion) {
    let data = random_log(200_000);
    let catalog = Catalog::builtin();
    c.bench_function("index_build_200k", |b| {
        b.iter(|| black_box(EventIndex::build(&data, &catalog, ScanOptions::default()).unwrap()))
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.bin");
    std::fs::write(&path, &data).unwrap();
    let reader = LogReader::open_with(&path, Catalog::builtin(), EngineConfig::default()).unwrap();
    let n = reader.total_events();
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("decode_range_1k_session", |b| {
        b.iter(|| {
            let start = rng.random_range(0..n - 1000);
            black_box(reader.decode_with(start, start + 1000, TimeBase::Session))
        })
    });
    c.bench_function("decode_range_1k_absolute", |b| {
        b.iter(|| {
            let start = rng.random_range(0..n - 1000);
            black_box(reader.decode_with(start, start + 1000, TimeBase::Absolute))
        })
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
