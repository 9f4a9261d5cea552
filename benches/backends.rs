mod common;

use clap::ValueEnum;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use scriptc::codegen;
use scriptc::vm::Vm;
use scriptc::{Target, check};

fn bench_backends(c: &mut Criterion) {
    for (label, source) in common::workloads() {
        let checked = check(&source).expect("check");

        for target in Target::value_variants() {
            let backend = target.backend();
            c.bench_function(&format!("codegen_{}_{label}", backend.name()), |b| {
                b.iter(|| {
                    let mut symbols = checked.symbols.clone();
                    let out = codegen::generate(backend, black_box(&checked.ast), &mut symbols, None)
                        .expect("generate");
                    black_box(out);
                })
            });
        }

        c.bench_function(&format!("codegen_asm_two_registers_{label}"), |b| {
            b.iter(|| {
                let mut symbols = checked.symbols.clone();
                let out = codegen::generate(
                    Target::Asm.backend(),
                    black_box(&checked.ast),
                    &mut symbols,
                    Some(2),
                )
                .expect("generate");
                black_box(out);
            })
        });

        let mut symbols = checked.symbols.clone();
        let code = codegen::generate(Target::Asm.backend(), &checked.ast, &mut symbols, None)
            .expect("generate");
        c.bench_function(&format!("vm_run_{label}"), |b| {
            b.iter(|| {
                let mut vm = Vm::load(black_box(&code)).expect("load");
                let output = vm.run("").expect("run");
                black_box(output);
            })
        });
    }
}

criterion_group!(benches, bench_backends);
criterion_main!(benches);
