//! Benchmarks for applying decoded batches to the display store
//!
//! Measures the work done while the store lock is held:
//! - Applying a full heat-map sweep to one history row
//! - Advancing the history ring across many rows before applying
//! - Producing an owned view for a renderer
//!
//! Platform: Cross-platform (synthetic frames, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use sdpvis::test_utils::heat_sweep;
use sdpvis::{
    CoordinateSpace, DecodeContext, Decoder, DisplayState, StoreHandle, StoreSettings, UpdateBatch,
};
use std::hint::black_box;
use std::time::{Duration, Instant};

fn board_grid() -> CoordinateSpace {
    CoordinateSpace::new(48, 48, 8, 8).expect("grid tiles exactly")
}

fn sweep_batches(space: CoordinateSpace) -> Vec<UpdateBatch> {
    let ctx = DecodeContext::new(space);
    heat_sweep(&space).iter().map(|frame| Decoder::HeatMap.decode(frame, &ctx)).collect()
}

fn bench_apply(c: &mut Criterion) {
    let space = board_grid();
    let batches = sweep_batches(space);
    let updates: usize = batches.iter().map(UpdateBatch::len).sum();

    let mut group = c.benchmark_group("store_apply");
    group.throughput(Throughput::Elements(updates as u64));

    group.bench_function("heat_sweep_one_row", |b| {
        let mut state = DisplayState::new(StoreSettings::new(space));
        b.iter(|| {
            for batch in &batches {
                black_box(state.apply(black_box(7), batch));
            }
        })
    });

    group.bench_function("heat_sweep_advancing_rows", |b| {
        let epoch = Instant::now();
        let mut state = DisplayState::with_epoch(StoreSettings::new(space), epoch);
        let quantum = StoreSettings::new(space).quantum;
        let mut step = 0u32;
        b.iter(|| {
            step = step.wrapping_add(17);
            let now = epoch + quantum * (step % 10_000);
            for batch in &batches {
                black_box(state.ingest(now, batch));
            }
        })
    });

    group.finish();
}

fn bench_view(c: &mut Criterion) {
    let space = board_grid();
    let store = StoreHandle::new(DisplayState::new(StoreSettings::new(space)));
    let now = Instant::now() + Duration::from_millis(1);
    for batch in sweep_batches(space) {
        store.ingest(now, &batch);
    }

    c.bench_function("store_view", |b| b.iter(|| black_box(store.view())));
}

criterion_group!(benches, bench_apply, bench_view);
criterion_main!(benches);
