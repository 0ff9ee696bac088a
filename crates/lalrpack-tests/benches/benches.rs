use criterion::{criterion_group, criterion_main, Criterion};
use lalrpack::{
    automaton::Automaton,
    grammar::{Grammar, GrammarDef, GrammarDefError},
    Config,
};
use lalrpack_tests::grammars;
use std::hint::black_box;

criterion_main!(benches);
criterion_group!(benches, bench_small, bench_json, bench_min_caml);

fn bench_small(c: &mut Criterion) {
    bench_compile(c, "arithmetic", grammars::arithmetic);
    bench_compile(c, "arithmetic_prec", grammars::arithmetic_prec);
    bench_compile(c, "lalr_not_slr", grammars::lalr_not_slr);
}

fn bench_json(c: &mut Criterion) {
    bench_compile(c, "json", grammars::json);
}

fn bench_min_caml(c: &mut Criterion) {
    bench_compile(c, "min_caml", grammars::min_caml);

    let grammar = Grammar::define(grammars::min_caml).unwrap();
    c.bench_function("min_caml/automaton", |b| {
        b.iter(|| {
            let _automaton = black_box(Automaton::compute(&grammar));
        });
    });
}

fn bench_compile(
    c: &mut Criterion,
    name: &str,
    f: impl FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
) {
    let grammar = Grammar::define(f).unwrap();
    let mut config = Config::new();
    config.ignore_conflicts();
    c.bench_function(name, |b| {
        b.iter(|| {
            let _output = black_box(config.compile(&grammar).unwrap());
        });
    });
}
