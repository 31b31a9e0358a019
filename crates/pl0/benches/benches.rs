use std::{env, path::PathBuf};

use criterion::{criterion_group, criterion_main, Criterion};
use pl0::{
    analysis::Analysis,
    expr::Calculator,
    grammar::Grammar,
    lexer::tokenize,
    optimizer::Optimizer,
    quad::Quadruple,
    table::PredictionTable,
};

criterion_main!(benches);
criterion_group!(benches, bench_tables, bench_evaluate, bench_optimize);

fn bench_tables(c: &mut Criterion) {
    bench_table_gen(c, "evaluator");
    bench_table_gen(c, "recognizer");
    bench_table_gen(c, "expression");
}

fn bench_table_gen(c: &mut Criterion, grammar_name: &str) {
    let project_root = env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .expect("missing environment variable: `CARGO_MANIFEST_DIR'");
    let grammar =
        Grammar::from_file(project_root.join(format!("tests/{}.ll1", grammar_name))).unwrap();

    let mut group = c.benchmark_group(grammar_name);
    group.bench_function("analysis", |b| {
        b.iter(|| Analysis::compute(&grammar));
    });
    group.bench_function("table", |b| {
        b.iter(|| PredictionTable::generate(&grammar));
    });
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let calc = Calculator::new().unwrap();
    let source = (0..200)
        .map(|i| format!("({} + {}) * {}", i, i + 1, i % 7 + 1))
        .collect::<Vec<_>>()
        .join(" - ");
    let tokens = tokenize(&source);

    c.bench_function("evaluate", |b| {
        b.iter(|| calc.evaluate(&tokens));
    });
}

fn bench_optimize(c: &mut Criterion) {
    let mut quads = vec![];
    for i in 0..500 {
        quads.push(Quadruple::new("+", "a", "b", format!("T{}", 3 * i)));
        quads.push(Quadruple::new("*", "2", "3", format!("T{}", 3 * i + 1)));
        quads.push(Quadruple::new(
            "-",
            format!("T{}", 3 * i),
            format!("T{}", 3 * i + 1),
            format!("T{}", 3 * i + 2),
        ));
    }
    let optimizer = Optimizer::new();

    c.bench_function("optimize", |b| {
        b.iter(|| optimizer.optimize(&quads));
    });
}
