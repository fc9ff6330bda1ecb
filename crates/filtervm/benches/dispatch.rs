//! Native dispatch against interpretation of the reference programs.
//!
//! Each standard filter runs over the same 32 KiB block twice: once through
//! its native implementation and once through the optimized reference
//! bytecode on the interpreter.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use filtervm::{
    prepare_with, reference, FilterBlock, FilterSlot, PrepareOptions, Program, StandardFilter, Vm,
};

const BLOCK_SIZE: usize = 32 * 1024;

fn block_for(filter: StandardFilter) -> FilterBlock {
    let data: Vec<u8> = (0..BLOCK_SIZE as u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8)
        .collect();
    let block = FilterBlock::new(data).at_offset(0x4_0000);
    match filter {
        StandardFilter::Rgb => block.with_register(0, 3 * 256 + 3).with_register(1, 0),
        StandardFilter::Delta | StandardFilter::Audio => block.with_register(0, 2),
        _ => block,
    }
}

fn interpreted(filter: StandardFilter) -> Program {
    let code = match reference::bytecode(filter) {
        Ok(code) => code,
        Err(e) => panic!("reference program for {filter} failed to assemble: {e}"),
    };
    prepare_with(
        &code,
        &PrepareOptions {
            recognize_standard: false,
            optimize: true,
        },
    )
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("standard_filters");
    group.throughput(Throughput::Bytes(BLOCK_SIZE as u64));

    for filter in StandardFilter::ALL {
        let block = block_for(filter);
        let programs = [
            ("native", Program::standard(filter)),
            ("interpreted", interpreted(filter)),
        ];
        for (mode, program) in programs {
            group.bench_with_input(BenchmarkId::new(mode, filter), &program, |b, program| {
                let mut vm = Vm::new();
                b.iter(|| {
                    let mut slot = FilterSlot::new(program.clone());
                    black_box(vm.apply_filter(&mut slot, black_box(&block)))
                });
            });
        }
    }

    group.finish();
}

/// Prepare cost for a recognized blob versus a decoded one.
fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    for filter in StandardFilter::ALL {
        let Ok(code) = reference::bytecode(filter) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::from_parameter(filter), &code, |b, code| {
            b.iter(|| filtervm::prepare(black_box(code)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_filters, bench_prepare);
criterion_main!(benches);
