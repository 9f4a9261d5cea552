mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use scriptc::symbols::SymbolTable;
use scriptc::{lexer, optimizer, parser};

fn bench_frontend(c: &mut Criterion) {
    for (label, source) in common::workloads() {
        let mut symbols = SymbolTable::new();
        let tokens = lexer::tokenize(&source, &mut symbols).expect("tokenize");
        let parse = parser::parse(&tokens).expect("parse");

        c.bench_function(&format!("frontend_tokenize_{label}"), |b| {
            b.iter(|| {
                let mut symbols = SymbolTable::new();
                let out = lexer::tokenize(black_box(&source), &mut symbols).expect("tokenize");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_parse_only_{label}"), |b| {
            b.iter(|| {
                let out = parser::parse(black_box(&tokens)).expect("parse");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_optimize_{label}"), |b| {
            b.iter(|| {
                let out = optimizer::optimize(black_box(&parse)).expect("optimize");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_check_{label}"), |b| {
            b.iter(|| {
                let out = scriptc::check(black_box(&source)).expect("check");
                black_box(out);
            })
        });
    }
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
