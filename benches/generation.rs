use criterion::{criterion_group, criterion_main, Criterion, black_box};

use arbor::generation::{GenerationLimits, TreeGenerator};
use arbor::mesh::ScalarFieldVolume;
use arbor::procgen::lsystem::LSystemGenerator;
use arbor::procgen::{LSystemConfig, Species, SpaceColonizationGrower};

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn bench_rewrite(c: &mut Criterion) {
    let limits = GenerationLimits::default();
    let config = LSystemConfig { iterations: 4, ..Default::default() };
    let generator = LSystemGenerator::new(config, &limits).unwrap();

    c.bench_function("lsystem_rewrite_4", |b| {
        b.iter(|| generator.generate_string(black_box(&limits)).unwrap());
    });
}

fn bench_interpret(c: &mut Criterion) {
    let limits = GenerationLimits::default();
    let config = LSystemConfig { iterations: 3, ..Default::default() };
    let generator = LSystemGenerator::new(config, &limits).unwrap();
    let symbols = generator.generate_string(&limits).unwrap();

    c.bench_function("lsystem_interpret_3", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(1);
            generator.interpret_string(black_box(&symbols), &mut rng).unwrap()
        });
    });
}

fn bench_colonization(c: &mut Criterion) {
    let limits = GenerationLimits::default();
    let config = Species::Oak.config(0);
    let lsystem = LSystemGenerator::new(config.lsystem.clone(), &limits).unwrap();
    let mut rng = StdRng::seed_from_u64(2);
    let (_, base) = lsystem.generate(&limits, &mut rng).unwrap();
    let growth = config.growth.unwrap();
    let grower = SpaceColonizationGrower::new(growth, &limits).unwrap();

    c.bench_function("colonization_oak", |b| {
        b.iter(|| {
            let mut skeleton = base.skeleton.clone();
            let mut rng = StdRng::seed_from_u64(3);
            grower.grow(black_box(&mut skeleton), &mut rng).unwrap()
        });
    });
}

fn bench_isosurface_32(c: &mut Criterion) {
    let limits = GenerationLimits::default();
    let mut field = ScalarFieldVolume::new(32, Vec3::ZERO, Vec3::splat(2.5), &limits).unwrap();
    field.add_sphere(Vec3::ZERO, 1.0);
    field.add_cylinder(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 0.4);

    c.bench_function("isosurface_32", |b| {
        b.iter(|| field.extract_isosurface(black_box(0.5)).unwrap());
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    for species in [Species::Oak, Species::Willow, Species::Elm] {
        let generator = TreeGenerator::for_species(species, 42).unwrap();
        group.bench_function(species.name(), |b| {
            b.iter(|| generator.generate().unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_rewrite,
    bench_interpret,
    bench_colonization,
    bench_isosurface_32,
    bench_full_pipeline,
);
criterion_main!(benches);
