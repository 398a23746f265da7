use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tlfv_core::{
    BoundaryClassification, BoundaryRegistry, CellField, KernelConfig, Material, Mesh, Point3,
    StageInput, StageKernel, StencilCache, Tensor, Vec3,
};

fn block_sizes() -> Vec<usize> {
    vec![8, 16]
}

fn block(n: usize) -> Mesh {
    Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [n, n, n]).unwrap()
}

fn registry(mesh: &Mesh) -> BoundaryRegistry {
    let mut registry = BoundaryRegistry::new();
    for patch in mesh.patches() {
        registry
            .insert(patch.name.clone(), BoundaryClassification::Traction { traction: Vec3::zeros() })
            .unwrap();
    }
    registry
        .insert("x_min", BoundaryClassification::SymmetryX)
        .unwrap();
    registry
        .insert("z_min", BoundaryClassification::Moving { linear_momentum: Vec3::z() })
        .unwrap();
    registry
}

fn bench_stencil_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("stencil_build");
    for &n in &block_sizes() {
        let mesh = block(n);
        let config = KernelConfig::default();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &_| {
            b.iter(|| {
                let cache = StencilCache::build(&mesh, &config.stencil).unwrap();
                std::hint::black_box(cache);
            });
        });
    }
    group.finish();
}

fn bench_stage_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("stage_evaluate");
    for &n in &block_sizes() {
        let mesh = block(n);
        let registry = registry(&mesh);
        let kernel = StageKernel::new(mesh, registry, KernelConfig::default()).unwrap();
        let mesh = kernel.mesh();
        let momentum = CellField::from_fn(mesh, |c| {
            let x = mesh.cell_centre(c);
            Vec3::new(x.y, -x.x, 0.5 * x.z)
        });
        let piola = CellField::from_fn(mesh, |c| Tensor::identity() * mesh.cell_centre(c).z);
        let material = Material::steel();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &_| {
            b.iter(|| {
                let out = kernel
                    .evaluate(StageInput {
                        momentum: &momentum,
                        piola: &piola,
                        wave_speeds: &material,
                        time: 0.0,
                    })
                    .unwrap();
                std::hint::black_box(out);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_stencil_build, bench_stage_evaluate);
criterion_main!(benches);
