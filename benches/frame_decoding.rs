//! Benchmarks for the per-datagram receive path
//!
//! Covers the two steps every datagram goes through before the store lock:
//! - Wire decoding of the SDP header and little-endian payload words
//! - Mode-specific interpretation into an update batch
//!
//! Platform: Cross-platform (synthetic frames, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sdpvis::test_utils::heat_sweep;
use sdpvis::{CoordinateSpace, DecodeContext, Decoder, WireFrame};
use std::hint::black_box;

/// 48x48 cells in 8x8 chips: a 6x6 board of full-size tiles.
fn board_grid() -> CoordinateSpace {
    CoordinateSpace::new(48, 48, 8, 8).expect("grid tiles exactly")
}

fn bench_wire_decode(c: &mut Criterion) {
    let space = board_grid();
    let datagrams: Vec<Vec<u8>> = heat_sweep(&space).iter().map(WireFrame::encode).collect();
    let bytes: usize = datagrams.iter().map(Vec::len).sum();

    let mut group = c.benchmark_group("wire_decode");
    group.throughput(Throughput::Bytes(bytes as u64));

    group.bench_function("heat_sweep", |b| {
        b.iter(|| {
            for datagram in &datagrams {
                black_box(WireFrame::decode(black_box(datagram)).expect("valid frame"));
            }
        })
    });

    group.finish();
}

fn bench_mode_decode(c: &mut Criterion) {
    let space = board_grid();
    let ctx = DecodeContext::new(space);
    let frames = heat_sweep(&space);

    let mut group = c.benchmark_group("mode_decode");
    group.throughput(Throughput::Elements(frames.len() as u64));

    for decoder in [Decoder::HeatMap, Decoder::CpuUtil, Decoder::ChipTemperature] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{decoder:?}")),
            &frames,
            |b, frames| {
                b.iter(|| {
                    for frame in frames {
                        black_box(decoder.decode(black_box(frame), &ctx));
                    }
                })
            },
        );
    }

    // Population records: routing key then value, one pair per population
    let pairs: Vec<u32> = (0..32u32)
        .flat_map(|i| [(i % 6) << 24 | (i % 6) << 16 | (i % 16) << 11, i * 3])
        .collect();
    let raster = WireFrame::addressed(80, [0; 3], pairs.clone());
    group.bench_function("Mar12Raster", |b| {
        b.iter(|| black_box(Decoder::Mar12Raster.decode(black_box(&raster), &ctx)))
    });

    let rates = WireFrame::addressed(64, [0; 3], pairs);
    group.bench_function("RatePlot", |b| {
        b.iter(|| black_box(Decoder::RatePlot.decode(black_box(&rates), &ctx)))
    });

    group.finish();
}

criterion_group!(benches, bench_wire_decode, bench_mode_decode);
criterion_main!(benches);
