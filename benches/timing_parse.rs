//! Benchmarks for timing script parsing
//!
//! Parses a synthetic one-hour capture script (sample blocks at 100Hz with an event batch
//! every second) against a matching event blob.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ftplayback::TimingScript;
use ftplayback::capture::EventDef;
use std::fmt::Write;
use std::hint::black_box;

const SECONDS: usize = 3600;
const BLOCKS_PER_SECOND: usize = 100;

fn synthetic_capture() -> (String, Vec<u8>) {
    let mut timing = String::new();
    let mut events = Vec::new();

    for second in 0..SECONDS {
        for block in 0..BLOCKS_PER_SECOND {
            let t = second as f64 + block as f64 / BLOCKS_PER_SECOND as f64;
            writeln!(timing, "S 10 {:.4}", t).unwrap();
        }
        writeln!(timing, "E 2 {:.4}", second as f64 + 0.5).unwrap();

        for _ in 0..2 {
            let def = EventDef {
                type_type: 0,
                type_numel: 8,
                value_type: 7,
                value_numel: 1,
                sample: (second * 1000) as i32,
                offset: 0,
                duration: 0,
                bufsize: 12,
            };
            events.extend_from_slice(&def.to_le_bytes());
            events.extend_from_slice(b"triggerx");
            events.extend_from_slice(&(second as u32).to_le_bytes());
        }
    }

    (timing, events)
}

fn bench_parse(c: &mut Criterion) {
    let (timing, events) = synthetic_capture();

    let mut group = c.benchmark_group("timing_parse");
    group.throughput(Throughput::Bytes(timing.len() as u64));
    group.bench_function("one_hour_script", |b| {
        b.iter(|| {
            let script = TimingScript::parse(black_box(&timing), black_box(&events), 32)
                .expect("synthetic script parses");
            black_box(script.len())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
