//! Spatial evaluation of one explicit stage.
//!
//! [`StageKernel::evaluate`] takes cell-centred linear momentum and first
//! Piola stress and returns the face contact values, the nodally compatible
//! momentum and the linear and angular momentum right-hand sides
//!
//! ```text
//! rhs_c    = (Σ_{f owned by c} t_C A_f - Σ_{f neighbouring c} t_C A_f) / V_c
//! rhs_am_c = (Σ_{f owned by c} x_f × t_C A_f - Σ_{f neighbouring c} x_f × t_C A_f) / V_c
//! ```
//!
//! Time integration and the geometry/deformation updates belong to the
//! caller.

use log::{debug, info, log_enabled, Level};
use rayon::prelude::*;

use crate::boundary::{apply_face_overrides, momentum_boundary_values, BoundaryRegistry};
use crate::config::KernelConfig;
use crate::constraint::NodalConstraintProjector;
use crate::error::Result;
use crate::field::{owner_values, CellField, FaceField, NodeField};
use crate::gradient::GradientEngine;
use crate::material::WaveSpeedModel;
use crate::mesh::Mesh;
use crate::reconstruct::FaceReconstructor;
use crate::riemann::{face_impedances, RiemannContactSolver};
use crate::stencil::StencilCache;
use crate::types::{Tensor, Vec3};

/// Cell state of one stage.
#[derive(Clone, Copy)]
pub struct StageInput<'a> {
    /// Linear momentum per cell.
    pub momentum: &'a CellField<Vec3>,
    /// First Piola stress per cell.
    pub piola: &'a CellField<Tensor>,
    /// Wave speeds per cell.
    pub wave_speeds: &'a dyn WaveSpeedModel,
    /// Stage time, used by time-dependent boundary conditions.
    pub time: f64,
}

/// Result of one stage evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    /// Contact traction per face.
    pub contact_traction: FaceField<Vec3>,
    /// Compatible contact momentum per face.
    pub contact_momentum: FaceField<Vec3>,
    /// Cell average of the contact momentum.
    pub cell_momentum: CellField<Vec3>,
    /// Nodal momentum after symmetry enforcement.
    pub nodal_momentum: NodeField<Vec3>,
    /// Rate of change of cell linear momentum.
    pub momentum_rhs: CellField<Vec3>,
    /// Rate of change of cell angular momentum about the origin.
    pub angular_momentum_rhs: CellField<Vec3>,
    /// Constraint passes performed.
    pub constraint_iterations: usize,
}

/// Finite-volume stage kernel for one mesh.
#[derive(Debug, Clone)]
pub struct StageKernel {
    mesh: Mesh,
    registry: BoundaryRegistry,
    config: KernelConfig,
    stencil: StencilCache,
}

impl StageKernel {
    /// Validate the configuration and the boundary registry against the mesh
    /// and build the stencil cache.
    pub fn new(mesh: Mesh, registry: BoundaryRegistry, config: KernelConfig) -> Result<Self> {
        config.validate()?;
        registry.validate(&mesh)?;
        let stencil = StencilCache::build(&mesh, &config.stencil)?;
        info!(
            "stage kernel ready: {} cells, {} faces, {} points, {} patches",
            mesh.n_cells(),
            mesh.n_faces(),
            mesh.n_points(),
            mesh.patches().len()
        );
        Ok(Self {
            mesh,
            registry,
            config,
            stencil,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn registry(&self) -> &BoundaryRegistry {
        &self.registry
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn stencil(&self) -> &StencilCache {
        &self.stencil
    }

    /// Recompute the stencil inverses from the current mesh geometry.
    pub fn rebuild_stencil(&mut self) -> Result<()> {
        self.stencil.rebuild(&self.mesh)
    }

    /// Replace the mesh (after motion or remeshing) and rebuild the stencils.
    ///
    /// On error the kernel keeps its previous mesh and stencils.
    pub fn update_mesh(&mut self, mesh: Mesh) -> Result<()> {
        self.registry.validate(&mesh)?;
        let stencil = StencilCache::build(&mesh, &self.config.stencil)?;
        self.mesh = mesh;
        self.stencil = stencil;
        Ok(())
    }

    /// Evaluate contact values and the momentum right-hand side.
    pub fn evaluate(&self, input: StageInput<'_>) -> Result<StageOutput> {
        let mesh = &self.mesh;
        input.momentum.check_size(mesh)?;
        input.piola.check_size(mesh)?;

        let engine = GradientEngine::new(mesh, &self.stencil);
        let momentum_faces = momentum_boundary_values(mesh, &self.registry, input.time, input.momentum)?;
        let momentum_gradient = engine.gradient(input.momentum, &momentum_faces)?;
        let piola_gradient = engine.tensor_gradient(input.piola, &owner_values(mesh, input.piola))?;

        let reconstructor = FaceReconstructor::new(mesh);
        let mut momenta = reconstructor.reconstruct(input.momentum, &momentum_gradient)?;
        let piola_states = reconstructor.reconstruct_tensor(input.piola, &piola_gradient)?;
        let mut tractions = reconstructor.tractions(&piola_states)?;
        apply_face_overrides(mesh, &self.registry, input.time, &mut tractions, &mut momenta)?;

        let impedances = face_impedances(mesh, input.wave_speeds, &self.config.riemann);
        let contact = RiemannContactSolver::new(&self.config.riemann).resolve_all(
            mesh,
            &tractions,
            &momenta,
            &impedances,
        )?;

        let constrained = NodalConstraintProjector::new(mesh, &self.stencil, &self.config.constraint)
            .project(&self.registry, &contact.momentum)?;

        let momentum_rhs = momentum_rhs(mesh, &contact.traction);
        let angular_momentum_rhs = angular_momentum_rhs(mesh, &contact.traction);
        if log_enabled!(Level::Debug) {
            debug!(
                "stage at t = {:e}: max |rhs| = {:e}, {} constraint pass(es)",
                input.time,
                momentum_rhs.iter().map(|r| r.norm()).fold(0.0, f64::max),
                constrained.iterations
            );
        }

        Ok(StageOutput {
            contact_traction: contact.traction,
            contact_momentum: constrained.face,
            cell_momentum: constrained.cell,
            nodal_momentum: constrained.node,
            momentum_rhs,
            angular_momentum_rhs,
            constraint_iterations: constrained.iterations,
        })
    }
}

/// Net contact force on each cell divided by its volume.
pub fn momentum_rhs(mesh: &Mesh, contact_traction: &FaceField<Vec3>) -> CellField<Vec3> {
    face_sum_per_volume(mesh, |face| contact_traction[face])
}

/// Net moment of the contact forces about the origin, taken at the face
/// centres, divided by the cell volume.
pub fn angular_momentum_rhs(mesh: &Mesh, contact_traction: &FaceField<Vec3>) -> CellField<Vec3> {
    face_sum_per_volume(mesh, |face| mesh.face_centre(face).cross(&contact_traction[face]))
}

/// `(Σ_owned q_f A_f - Σ_neighbouring q_f A_f) / V_c` for every cell.
fn face_sum_per_volume(mesh: &Mesh, flux: impl Fn(usize) -> Vec3 + Sync) -> CellField<Vec3> {
    let values = (0..mesh.n_cells())
        .into_par_iter()
        .map(|cell| {
            let total: Vec3 = mesh
                .cell_faces(cell)
                .iter()
                .map(|&face| {
                    let sign = if mesh.face(face).owner == cell { 1.0 } else { -1.0 };
                    flux(face) * (sign * mesh.face_area(face))
                })
                .sum();
            total / mesh.cell_volume(cell)
        })
        .collect();
    CellField::from_vec(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryClassification;
    use crate::error::Error;
    use crate::material::Material;
    use crate::types::Point3;
    use approx::assert_relative_eq;

    /// Traction patches carrying `P·n` for a uniform stress `P`.
    fn equilibrium_registry(mesh: &Mesh, piola: &Tensor) -> BoundaryRegistry {
        let mut registry = BoundaryRegistry::new();
        for patch in mesh.patches() {
            let n = mesh.face_normal(patch.faces[0]);
            registry
                .insert(patch.name.clone(), BoundaryClassification::Traction { traction: piola * n })
                .unwrap();
        }
        registry
    }

    fn material() -> Material {
        Material::new(1.0, 0.25, 1.0).unwrap()
    }

    #[test]
    fn test_two_cells_equal_states() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(2.0, 1.0, 1.0), [2, 1, 1]).unwrap();
        let p = Tensor::new(2.0, 0.5, 0.0, 0.5, -1.0, 0.25, 0.0, 0.25, 4.0);
        let registry = equilibrium_registry(&mesh, &p);
        let kernel = StageKernel::new(mesh, registry, KernelConfig::default()).unwrap();
        let mesh = kernel.mesh();

        let lm = Vec3::new(1.0, 2.0, 3.0);
        let momentum = CellField::uniform(mesh, lm);
        let piola = CellField::uniform(mesh, p);
        let material = material();
        let out = kernel
            .evaluate(StageInput {
                momentum: &momentum,
                piola: &piola,
                wave_speeds: &material,
                time: 0.0,
            })
            .unwrap();

        let interior = (0..mesh.n_faces()).find(|&f| !mesh.is_boundary(f)).unwrap();
        assert_eq!(out.contact_traction[interior], p * mesh.face_normal(interior));
        for face in 0..mesh.n_faces() {
            assert_relative_eq!(out.contact_momentum[face], lm, epsilon = 1e-12);
        }
        for node in 0..mesh.n_points() {
            assert_relative_eq!(out.nodal_momentum[node], lm, epsilon = 1e-12);
        }
        assert_eq!(out.constraint_iterations, 1);
    }

    #[test]
    fn test_uniform_stress_in_equilibrium() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 0.5, 0.75), [3, 2, 2]).unwrap();
        let p = Tensor::new(3.0, 1.0, -0.5, 1.0, 2.0, 0.0, -0.5, 0.0, 1.0);
        let registry = equilibrium_registry(&mesh, &p);
        let kernel = StageKernel::new(mesh, registry, KernelConfig::default()).unwrap();
        let mesh = kernel.mesh();

        let momentum = CellField::uniform(mesh, Vec3::new(0.1, 0.0, -0.2));
        let piola = CellField::uniform(mesh, p);
        let material = material();
        let out = kernel
            .evaluate(StageInput {
                momentum: &momentum,
                piola: &piola,
                wave_speeds: &material,
                time: 0.0,
            })
            .unwrap();

        // Symmetric uniform stress: no net force and no net moment.
        for cell in 0..mesh.n_cells() {
            assert_relative_eq!(out.momentum_rhs[cell], Vec3::zeros(), epsilon = 1e-10);
            assert_relative_eq!(out.angular_momentum_rhs[cell], Vec3::zeros(), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_interior_tractions_cancel() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [3, 3, 2]).unwrap();
        let mut registry = BoundaryRegistry::new();
        registry.insert("x_min", BoundaryClassification::SymmetryX).unwrap();
        registry.insert("y_min", BoundaryClassification::Symmetry).unwrap();
        registry.insert("z_min", BoundaryClassification::Moving { linear_momentum: Vec3::z() }).unwrap();
        registry
            .insert(
                "z_max",
                BoundaryClassification::MovingDisplacement {
                    density: 1.0,
                    displacement: Vec3::new(0.0, 0.0, -0.1),
                    end_time: 1.0,
                },
            )
            .unwrap();
        for name in ["x_max", "y_max"] {
            registry
                .insert(name, BoundaryClassification::Traction { traction: Vec3::new(0.0, -1.0, 0.5) })
                .unwrap();
        }
        let kernel = StageKernel::new(mesh, registry, KernelConfig::default()).unwrap();
        let mesh = kernel.mesh();

        let momentum = CellField::from_fn(mesh, |c| {
            let x = mesh.cell_centre(c);
            Vec3::new(x.y.sin(), x.x * x.z, 1.0 - x.y)
        });
        let piola = CellField::from_fn(mesh, |c| {
            let x = mesh.cell_centre(c);
            Tensor::new(x.x, 0.2, x.y * x.y, 0.0, 1.0 + x.z, 0.1, -x.x, x.y, 0.5)
        });
        let speeds = CellField::from_fn(mesh, |c| {
            crate::material::WaveSpeeds::new(2.0 + mesh.cell_centre(c).x, 1.0)
        });
        let out = kernel
            .evaluate(StageInput {
                momentum: &momentum,
                piola: &piola,
                wave_speeds: &speeds,
                time: 0.4,
            })
            .unwrap();

        let total: Vec3 = (0..mesh.n_cells())
            .map(|c| out.momentum_rhs[c] * mesh.cell_volume(c))
            .sum();
        let boundary: Vec3 = (0..mesh.n_faces())
            .filter(|&f| mesh.is_boundary(f))
            .map(|f| out.contact_traction[f] * mesh.face_area(f))
            .sum();
        assert_relative_eq!(total, boundary, epsilon = 1e-10);

        let total_moment: Vec3 = (0..mesh.n_cells())
            .map(|c| out.angular_momentum_rhs[c] * mesh.cell_volume(c))
            .sum();
        let boundary_moment: Vec3 = (0..mesh.n_faces())
            .filter(|&f| mesh.is_boundary(f))
            .map(|f| mesh.face_centre(f).cross(&out.contact_traction[f]) * mesh.face_area(f))
            .sum();
        assert_relative_eq!(total_moment, boundary_moment, epsilon = 1e-10);
    }

    #[test]
    fn test_registry_must_cover_patches() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [1, 1, 1]).unwrap();
        let registry = BoundaryRegistry::new()
            .with("x_min", BoundaryClassification::SymmetryX)
            .unwrap();
        let result = StageKernel::new(mesh, registry, KernelConfig::default());
        assert!(matches!(result, Err(Error::Boundary(_))));
    }

    #[test]
    fn test_field_size_mismatch() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [2, 1, 1]).unwrap();
        let registry = equilibrium_registry(&mesh, &Tensor::zeros());
        let kernel = StageKernel::new(mesh, registry, KernelConfig::default()).unwrap();

        let momentum = CellField::from_vec(vec![Vec3::zeros()]);
        let piola = CellField::uniform(kernel.mesh(), Tensor::zeros());
        let material = material();
        let result = kernel.evaluate(StageInput {
            momentum: &momentum,
            piola: &piola,
            wave_speeds: &material,
            time: 0.0,
        });
        assert!(matches!(
            result,
            Err(Error::FieldSize {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_update_mesh_rebuilds_stencil() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [2, 2, 2]).unwrap();
        let registry = equilibrium_registry(&mesh, &Tensor::zeros());
        let mut kernel = StageKernel::new(mesh, registry, KernelConfig::default()).unwrap();
        let before = *kernel.stencil().global(0);

        let stretched = Mesh::block(Point3::zeros(), Vec3::new(2.0, 1.0, 1.0), [2, 2, 2]).unwrap();
        kernel.update_mesh(stretched).unwrap();
        let after = *kernel.stencil().global(0);
        assert_relative_eq!(after[(0, 0)], before[(0, 0)] / 4.0, epsilon = 1e-10);
        assert_relative_eq!(after[(1, 1)], before[(1, 1)], epsilon = 1e-10);
    }

    #[test]
    fn test_failed_update_keeps_previous_mesh() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [1, 1, 1]).unwrap();
        let registry = equilibrium_registry(&mesh, &Tensor::zeros());
        let mut kernel = StageKernel::new(mesh, registry, KernelConfig::default()).unwrap();

        let flat = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 2e-6), [2, 2, 1]).unwrap();
        let result = kernel.update_mesh(flat);
        assert!(matches!(result, Err(Error::DegenerateStencil { .. })));
        assert_eq!(kernel.mesh().n_cells(), 1);
        assert!(kernel.stencil().matches(kernel.mesh()));

        let momentum = CellField::uniform(kernel.mesh(), Vec3::new(1.0, 0.0, 0.0));
        let piola = CellField::uniform(kernel.mesh(), Tensor::zeros());
        let material = material();
        let out = kernel
            .evaluate(StageInput {
                momentum: &momentum,
                piola: &piola,
                wave_speeds: &material,
                time: 0.0,
            })
            .unwrap();
        assert_eq!(out.momentum_rhs.len(), 1);
    }
}
