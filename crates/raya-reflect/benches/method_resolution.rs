use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use raya_reflect::{Modifiers, ReflectConfig, Reflector, TypeId, TypeRegistry};
use std::sync::Arc;

/// A class chain of `depth` levels, each implementing its own interface
/// that extends the previous level's interface.
fn build_hierarchy(depth: usize) -> (Arc<TypeRegistry>, TypeId) {
    let registry = Arc::new(TypeRegistry::new());
    let void = registry.primitive("void");
    let int = registry.primitive("int");

    let mut class = registry.root_class();
    let mut intf: Option<TypeId> = None;
    for level in 0..depth {
        let extends: Vec<TypeId> = intf.into_iter().collect();
        let next_intf = registry.define_interface(&format!("Level{}", level), &extends);
        registry.add_method(next_intf, &format!("hook{}", level), &[], void, Modifiers::public());
        registry.add_method(next_intf, "run", &[], void, Modifiers::public_abstract());

        class = registry.define_class(&format!("Impl{}", level), Some(class), &[next_intf]);
        registry.add_method(class, &format!("work{}", level), &[int], void, Modifiers::public());
        registry.add_method(class, "run", &[], void, Modifiers::public());
        intf = Some(next_intf);
    }
    (registry, class)
}

fn bench_cold(c: &mut Criterion) {
    let mut group = c.benchmark_group("all_public_methods_cold");
    for depth in [4usize, 16] {
        let (registry, leaf) = build_hierarchy(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &leaf, |b, leaf| {
            b.iter(|| {
                let reflector = Reflector::for_registry(registry.clone(), ReflectConfig::default());
                reflector.get_methods(black_box(*leaf)).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_warm(c: &mut Criterion) {
    let mut group = c.benchmark_group("all_public_methods_warm");
    for depth in [4usize, 16] {
        let (registry, leaf) = build_hierarchy(depth);
        let reflector = Reflector::for_registry(registry, ReflectConfig::default());
        let _held = reflector.get_methods(leaf).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &leaf, |b, leaf| {
            b.iter(|| reflector.get_methods(black_box(*leaf)).unwrap());
        });
    }
    group.finish();
}

fn bench_exact_lookup(c: &mut Criterion) {
    let (registry, leaf) = build_hierarchy(8);
    let reflector = Reflector::for_registry(registry, ReflectConfig::default());
    let _held = reflector.get_method(leaf, "run", &[]).unwrap();

    c.bench_function("get_method_warm", |b| {
        b.iter(|| reflector.get_method(black_box(leaf), "run", &[]).unwrap());
    });
}

criterion_group!(benches, bench_cold, bench_warm, bench_exact_lookup);
criterion_main!(benches);
