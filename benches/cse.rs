//! Benchmarks for the common-subexpression elimination pass.
//!
//! The input is a chain of diamonds. Every block of a diamond recomputes the
//! same arithmetic and field read, and the join receives a value that is
//! available on both sides, which exercises the pure cache, the heap cache
//! and the merge protocol.

extern crate cseflow;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cseflow::analysis::{
    ConstValue, FieldRef, SsaFunction, SsaFunctionBuilder, SsaType, TypeRef, WriteAnalyzer,
};
use cseflow::compiler::CsePass;
use std::hint::black_box;

const FIELD: FieldRef = FieldRef::new(0);

fn node() -> SsaType {
    SsaType::Object(TypeRef::new(1))
}

/// Builds `diamonds` consecutive diamonds threading an object, an integer and
/// a condition through their joins.
fn diamond_chain(diamonds: usize) -> SsaFunction {
    SsaFunctionBuilder::new("diamond_chain").build_with(|f| {
        for k in 0..diamonds {
            let head = 3 * k;
            f.block(head, |b| {
                let obj = b.param(node());
                let x = b.param(SsaType::I64);
                let c = b.param(SsaType::Bool);
                b.int_add(x, x);
                b.getfield(obj, FIELD, SsaType::I64);
                b.switch(c);
                let args = vec![obj.into(), x.into(), c.into()];
                b.exit(head + 1, args.clone(), ConstValue::Bool(true));
                b.exit(head + 2, args, ConstValue::Bool(false));
            });
            for side in [head + 1, head + 2] {
                f.block(side, |b| {
                    let obj = b.param(node());
                    let x = b.param(SsaType::I64);
                    let c = b.param(SsaType::Bool);
                    let sum = b.int_add(x, x);
                    b.getfield(obj, FIELD, SsaType::I64);
                    b.jump(head + 3, vec![obj.into(), sum.into(), c.into()]);
                });
            }
        }
        f.block(3 * diamonds, |b| {
            b.param(node());
            let x = b.param(SsaType::I64);
            b.param(SsaType::Bool);
            b.debug_print(vec![x.into()]);
        });
    })
}

fn bench_transform(c: &mut Criterion) {
    let analyzer = WriteAnalyzer::new();
    let mut group = c.benchmark_group("cse_transform");

    for diamonds in [8, 64, 256] {
        let func = diamond_chain(diamonds);
        group.throughput(Throughput::Elements(func.operation_count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(diamonds), &func, |b, func| {
            b.iter(|| {
                let mut func = func.clone();
                let removed = CsePass::transform(&mut func, &analyzer).unwrap();
                black_box((removed, func))
            });
        });
    }
    group.finish();
}

fn bench_optimize(c: &mut Criterion) {
    let analyzer = WriteAnalyzer::new();
    let func = diamond_chain(64);

    c.bench_function("cse_optimize_64", |b| {
        b.iter(|| {
            let mut func = func.clone();
            let removed = CsePass::optimize(&mut func, &analyzer).unwrap();
            black_box((removed, func))
        });
    });
}

criterion_group!(benches, bench_transform, bench_optimize);
criterion_main!(benches);
