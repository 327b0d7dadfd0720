use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgcompat::Ident;
use pgcompat::qb::{Filter, compile, parse_or};
use serde_json::Value;

/// `n` equality filters on distinct columns: ("col0" = ?) AND ("col1" = ?) ...
fn eq_filters(n: usize) -> Vec<Filter> {
    (0..n)
        .map(|i| {
            let col = Ident::parse(&format!("col{i}")).unwrap();
            Filter::Eq(col, Value::from(i as i64))
        })
        .collect()
}

/// `or()` expression with `n` and-groups of two conditions each.
fn or_expr(n: usize) -> String {
    (0..n)
        .map(|i| format!("and(title.ilike.%term{i}%,status.eq.s{i})"))
        .collect::<Vec<_>>()
        .join(",")
}

fn bench_compile_eq(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_compile/eq");

    for n in [1, 5, 10, 50, 100] {
        let filters = eq_filters(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &filters, |b, filters| {
            b.iter(|| black_box(compile(filters).unwrap()));
        });
    }

    group.finish();
}

fn bench_compile_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_compile/in_list");

    for n in [5, 20, 100, 500] {
        let values: Vec<Value> = (0..n).map(Value::from).collect();
        let filters = vec![Filter::In(Ident::parse("id").unwrap(), values)];
        group.bench_with_input(BenchmarkId::from_parameter(n), &filters, |b, filters| {
            b.iter(|| black_box(compile(filters).unwrap()));
        });
    }

    group.finish();
}

fn bench_or_expr(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_compile/or");

    for n in [1, 4, 16, 64] {
        let expr = or_expr(n);
        group.bench_with_input(BenchmarkId::new("parse", n), &expr, |b, expr| {
            b.iter(|| black_box(parse_or(expr).unwrap()));
        });

        let filters = vec![Filter::Or(expr.clone())];
        group.bench_with_input(BenchmarkId::new("compile", n), &filters, |b, filters| {
            b.iter(|| black_box(compile(filters).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile_eq, bench_compile_in_list, bench_or_expr);
criterion_main!(benches);
