//! Least-squares geometry stencils.
//!
//! For every cell the normal matrix
//!
//! ```text
//! A = Σ w(d) d ⊗ d
//! ```
//!
//! is accumulated over the directions `d` from the cell centre to its stencil
//! points and inverted once. Two stencils are kept:
//!
//! - the *global* stencil uses neighbour cell centres across interior faces
//!   and face centres across boundary faces;
//! - the *local* stencil uses only the centres of the cell's own faces and
//!   feeds the nodal compatibility gradient.
//!
//! The inverses only depend on geometry and live in a [`StencilCache`] that is
//! rebuilt explicitly when the mesh moves.

use log::{info, warn};
use rayon::prelude::*;

use crate::config::{DegeneratePolicy, StencilConfig};
use crate::error::{Error, Result};
use crate::field::CellField;
use crate::mesh::Mesh;
use crate::types::{Tensor, Vec3};

/// Directions shorter than this are dropped from a stencil.
const MIN_DIRECTION: f64 = 1e-14;

/// Cached stencil inverses for a mesh.
#[derive(Debug, Clone)]
pub struct StencilCache {
    config: StencilConfig,
    global: CellField<Tensor>,
    local: CellField<Tensor>,
}

impl StencilCache {
    /// Build both stencils for every cell.
    pub fn build(mesh: &Mesh, config: &StencilConfig) -> Result<Self> {
        let global = build_stencil(mesh, config)?;
        let local = build_local_stencil(mesh, config)?;
        info!(
            "built least-squares stencils for {} cells ({:?} weighting)",
            mesh.n_cells(),
            config.weighting
        );
        Ok(Self {
            config: config.clone(),
            global,
            local,
        })
    }

    /// Recompute the inverses after the mesh geometry changed.
    pub fn rebuild(&mut self, mesh: &Mesh) -> Result<()> {
        *self = Self::build(mesh, &self.config)?;
        Ok(())
    }

    pub fn config(&self) -> &StencilConfig {
        &self.config
    }

    /// Global stencil inverse of a cell.
    pub fn global(&self, cell: usize) -> &Tensor {
        &self.global[cell]
    }

    /// Local stencil inverse of a cell.
    pub fn local(&self, cell: usize) -> &Tensor {
        &self.local[cell]
    }

    /// Whether the cache was built for a mesh of this size.
    pub fn matches(&self, mesh: &Mesh) -> bool {
        self.global.len() == mesh.n_cells() && self.local.len() == mesh.n_cells()
    }

    /// Error unless the cache was built for a mesh of this size.
    pub fn check(&self, mesh: &Mesh) -> Result<()> {
        if !self.matches(mesh) {
            return Err(Error::Mesh(format!(
                "stencil cache holds {} cells, mesh has {}",
                self.global.len(),
                mesh.n_cells()
            )));
        }
        Ok(())
    }

    /// Effective direction and weight for a raw centre-to-point vector.
    pub(crate) fn weighted_direction(&self, raw: Vec3) -> Option<(Vec3, f64)> {
        weighted_direction(&self.config, raw)
    }
}

/// Direction from a cell centre to its global stencil point across `face`.
pub(crate) fn global_direction(mesh: &Mesh, cell: usize, face: usize) -> Vec3 {
    let f = mesh.face(face);
    let target = match f.neighbour {
        Some(nei) if nei == cell => mesh.cell_centre(f.owner),
        Some(nei) => mesh.cell_centre(nei),
        None => mesh.face_centre(face),
    };
    target - mesh.cell_centre(cell)
}

/// Direction from a cell centre to the centre of one of its faces.
pub(crate) fn local_direction(mesh: &Mesh, cell: usize, face: usize) -> Vec3 {
    mesh.face_centre(face) - mesh.cell_centre(cell)
}

fn weighted_direction(config: &StencilConfig, mut d: Vec3) -> Option<(Vec3, f64)> {
    if let Some(axis) = config.reduced_direction {
        d[axis.index()] = 0.0;
    }
    let distance = d.norm();
    if distance < MIN_DIRECTION {
        return None;
    }
    Some((d, config.weighting.weight(distance)))
}

/// Global stencil inverse for every cell.
pub fn build_stencil(mesh: &Mesh, config: &StencilConfig) -> Result<CellField<Tensor>> {
    build_with(mesh, config, global_direction)
}

/// Local (own face centres only) stencil inverse for every cell.
pub fn build_local_stencil(mesh: &Mesh, config: &StencilConfig) -> Result<CellField<Tensor>> {
    build_with(mesh, config, local_direction)
}

fn build_with(
    mesh: &Mesh,
    config: &StencilConfig,
    direction: fn(&Mesh, usize, usize) -> Vec3,
) -> Result<CellField<Tensor>> {
    let inverses = (0..mesh.n_cells())
        .into_par_iter()
        .map(|cell| {
            let mut a = Tensor::zeros();
            for &face in mesh.cell_faces(cell) {
                if let Some((d, w)) = weighted_direction(config, direction(mesh, cell, face)) {
                    a += w * d * d.transpose();
                }
            }
            invert(a, cell, config)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CellField::from_vec(inverses))
}

fn invert(mut a: Tensor, cell: usize, config: &StencilConfig) -> Result<Tensor> {
    if let Some(axis) = config.reduced_direction {
        let e = axis.unit();
        a += e * e.transpose();
    }

    let scale = a.trace() / 3.0;
    let ratio = a.determinant() / scale.powi(3);
    let inverse = if scale > 0.0 && ratio.is_finite() && ratio > config.singular_tolerance {
        a.try_inverse()
    } else {
        None
    };

    match (inverse, config.on_degenerate) {
        (Some(mut inv), _) => {
            if let Some(axis) = config.reduced_direction {
                let i = axis.index();
                inv.row_mut(i).fill(0.0);
                inv.column_mut(i).fill(0.0);
            }
            Ok(inv)
        }
        (None, DegeneratePolicy::Abort) => Err(Error::DegenerateStencil { cell }),
        (None, DegeneratePolicy::ZeroGradient) => {
            warn!("cell {} has a degenerate stencil, using zero gradient", cell);
            Ok(Tensor::zeros())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Axis, Point3};
    use approx::assert_relative_eq;

    fn cube_block(n: usize) -> Mesh {
        Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [n, n, n]).unwrap()
    }

    #[test]
    fn test_interior_cell_global_inverse() {
        let mesh = cube_block(3);
        let stencil = build_stencil(&mesh, &StencilConfig::default()).unwrap();
        // Centre cell: six neighbours at ±h on each axis, A = 2h² I.
        let h = 1.0 / 3.0;
        let centre = 1 + 3 * (1 + 3);
        assert_relative_eq!(
            stencil[centre],
            Tensor::identity() / (2.0 * h * h),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_inverses_symmetric_positive_definite() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(2.0, 1.0, 0.5), [3, 2, 2]).unwrap();
        let config = StencilConfig {
            weighting: crate::config::Weighting::InverseDistanceSquared,
            ..Default::default()
        };
        let cache = StencilCache::build(&mesh, &config).unwrap();
        for cell in 0..mesh.n_cells() {
            for inv in [cache.global(cell), cache.local(cell)] {
                assert_relative_eq!(*inv, inv.transpose(), epsilon = 1e-10);
                let eig = inv.symmetric_eigenvalues();
                assert!(eig.iter().all(|&l| l > 0.0), "cell {} eigenvalues {:?}", cell, eig);
            }
        }
    }

    #[test]
    fn test_local_inverse_unit_cube() {
        let mesh = cube_block(1);
        let local = build_local_stencil(&mesh, &StencilConfig::default()).unwrap();
        // Face centres at ±0.5 on each axis: A = 0.5 I.
        assert_relative_eq!(local[0], Tensor::identity() * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_cell_is_degenerate() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 2e-6), [1, 1, 1]).unwrap();
        let result = build_stencil(&mesh, &StencilConfig::default());
        assert!(matches!(result, Err(Error::DegenerateStencil { cell: 0 })));
    }

    #[test]
    fn test_zero_gradient_fallback() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 2e-6), [1, 1, 1]).unwrap();
        let config = StencilConfig {
            on_degenerate: DegeneratePolicy::ZeroGradient,
            ..Default::default()
        };
        let stencil = build_local_stencil(&mesh, &config).unwrap();
        assert_eq!(stencil[0], Tensor::zeros());
    }

    #[test]
    fn test_reduced_direction_zeroes_axis() {
        let mesh = Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 0.1), [2, 2, 1]).unwrap();
        let config = StencilConfig {
            reduced_direction: Some(Axis::Z),
            ..Default::default()
        };
        let cache = StencilCache::build(&mesh, &config).unwrap();
        for cell in 0..mesh.n_cells() {
            let inv = cache.global(cell);
            assert_eq!(inv.row(2).norm(), 0.0);
            assert_eq!(inv.column(2).norm(), 0.0);
            assert!(inv[(0, 0)] > 0.0 && inv[(1, 1)] > 0.0);
        }
    }

    #[test]
    fn test_rebuild_keeps_config() {
        let mesh = cube_block(2);
        let mut cache = StencilCache::build(&mesh, &StencilConfig::default()).unwrap();
        let before = *cache.global(0);
        cache.rebuild(&mesh).unwrap();
        assert_eq!(*cache.global(0), before);
        assert!(cache.matches(&mesh));
    }
}
