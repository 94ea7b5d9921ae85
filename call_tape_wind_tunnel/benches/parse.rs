// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::io::Cursor;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use call_tape::call::Call;
use call_tape::parser::Parser;
use call_tape::signature::{EnumSig, FunctionSig, StructSig};
use call_tape::value::Value;
use call_tape::writer::TraceWriter;

fn bench_parse(c: &mut Criterion) {
    bench_flat_calls(c);
    bench_value_trees(c);
}

fn drain(bytes: &[u8]) -> u32 {
    let mut parser = Parser::from_reader(Cursor::new(bytes.to_vec())).unwrap();
    let mut count = 0;
    while let Some(call) = parser.next_call().unwrap() {
        black_box(call);
        count += 1;
    }
    count
}

fn bench_flat_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_calls");
    for &n in &[100u32, 1_000, 10_000] {
        let bytes = build_flat_trace(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &bytes, |b, bytes| {
            b.iter(|| {
                assert_eq!(drain(bytes), n);
            });
        });
    }
    group.finish();
}

fn bench_value_trees(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_trees");
    for &elems in &[10u32, 100, 1_000] {
        let bytes = build_tree_trace(elems);
        group.bench_with_input(BenchmarkId::from_parameter(elems), &bytes, |b, bytes| {
            b.iter(|| {
                assert_eq!(drain(bytes), 1);
            });
        });
    }
    group.finish();
}

// One signature, many small calls: exercises the event loop and interning
// fast path.
fn build_flat_trace(calls: u32) -> Vec<u8> {
    let sig = Rc::new(FunctionSig {
        name: "glDrawArrays".into(),
        arg_names: vec!["mode".into(), "first".into(), "count".into()],
    });
    let mode = Rc::new(EnumSig {
        name: "GL_TRIANGLES".into(),
        value: Value::UInt(4),
    });

    let mut w = TraceWriter::new(Vec::new()).unwrap();
    for no in 0..calls {
        let mut call = Call::new(sig.clone(), no);
        call.set_arg(0, Value::Enum(mode.clone()));
        call.set_arg(1, Value::SInt(-i64::from(no % 7)));
        call.set_arg(2, Value::UInt(u64::from(no) * 3));
        call.ret = Some(Value::Null);
        w.write_call(&call).unwrap();
    }
    w.finish().unwrap()
}

// One call with a wide array of structs: exercises the recursive value
// decoder.
fn build_tree_trace(elems: u32) -> Vec<u8> {
    let sig = Rc::new(FunctionSig {
        name: "glBufferData".into(),
        arg_names: vec!["data".into()],
    });
    let vec2 = Rc::new(StructSig {
        name: "vec2".into(),
        member_names: vec!["x".into(), "y".into()],
    });

    let values = (0..elems)
        .map(|i| {
            Value::Struct(
                vec2.clone(),
                vec![Value::Float(f64::from(i)), Value::Float(-0.5)],
            )
        })
        .collect();

    let mut call = Call::new(sig, 0);
    call.set_arg(0, Value::Array(values));

    let mut w = TraceWriter::new(Vec::new()).unwrap();
    w.write_call(&call).unwrap();
    w.finish().unwrap()
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
