use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dynsql::{DynamicSql, RegistryContext, TemplateCache, Value, params};

/// A search template with `n` optional filters:
/// select * from t where 1=1 @{and, AND c0 = :c0} @{and, AND c1 = :c1} ...
fn build_template(n: usize) -> String {
    let mut template = String::from("select * from t where 1=1");
    for i in 0..n {
        template.push_str(&format!(" @{{and, AND c{i} = :c{i}}}"));
    }
    template.push_str(" and id in @{in, :ids} order by id");
    template
}

fn build_source(n: usize) -> std::collections::BTreeMap<String, Value> {
    let mut source = params! { "ids" => vec![1, 2, 3, 4, 5] };
    for i in 0..n {
        if i % 2 == 0 {
            source.insert(format!("c{i}"), Value::Int(i as i64));
        }
    }
    source
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("template/parse");

    for n in [1, 5, 10, 50] {
        let template = build_template(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &template, |b, t| {
            b.iter(|| black_box(DynamicSql::parse(t).unwrap()));
        });
    }

    group.finish();
}

fn bench_bind(c: &mut Criterion) {
    let mut group = c.benchmark_group("template/bind");
    let ctx = RegistryContext::new();

    for n in [1, 5, 10, 50] {
        let program = DynamicSql::parse(&build_template(n)).unwrap();
        let source = build_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &program, |b, program| {
            b.iter(|| black_box(program.bind(&source, &ctx).unwrap()));
        });
    }

    group.finish();
}

fn bench_cached_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("template/cached_render");
    let ctx = RegistryContext::new();
    let cache = TemplateCache::default();

    for n in [1, 10, 50] {
        let template = build_template(n);
        let source = build_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &template, |b, t| {
            b.iter(|| {
                let program = cache.get_or_parse(t).unwrap();
                black_box(program.bind(&source, &ctx).unwrap().to_numbered_sql());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_bind, bench_cached_render);
criterion_main!(benches);
