//! Nodal compatibility projection of contact linear momentum.
//!
//! Face contact momenta are made compatible with a continuous nodal velocity
//! field by one or more passes of
//!
//! 1. area-weighted averaging of face momenta to cells,
//! 2. a local least-squares gradient from each cell's own faces,
//! 3. averaging the linear extrapolations of all incident cells to nodes,
//!    weighted by the cells' dual-volume shares,
//! 4. strong enforcement of symmetry conditions on boundary nodes,
//! 5. averaging nodal values back to faces.
//!
//! Symmetry conditions are enforced one patch after another (general, then
//! x, y and z). For symmetry planes that are not mutually orthogonal the
//! result depends on this order.

use log::trace;
use rayon::prelude::*;

use crate::boundary::BoundaryRegistry;
use crate::config::ConstraintConfig;
use crate::error::{Error, Result};
use crate::field::{CellField, FaceField, NodeField};
use crate::gradient::GradientEngine;
use crate::mesh::Mesh;
use crate::stencil::StencilCache;
use crate::types::{tangential_projector, Tensor, Vec3};

/// Output of [`NodalConstraintProjector::project`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConstrainedMomentum {
    /// Cell-averaged momentum of the last pass.
    pub cell: CellField<Vec3>,
    /// Nodal momentum after strong boundary conditions.
    pub node: NodeField<Vec3>,
    /// Compatible face momentum.
    pub face: FaceField<Vec3>,
    /// Number of passes performed.
    pub iterations: usize,
}

/// Projects face momenta onto a nodally compatible field.
#[derive(Debug, Clone)]
pub struct NodalConstraintProjector<'a> {
    mesh: &'a Mesh,
    stencil: &'a StencilCache,
    config: ConstraintConfig,
}

impl<'a> NodalConstraintProjector<'a> {
    pub fn new(mesh: &'a Mesh, stencil: &'a StencilCache, config: &ConstraintConfig) -> Self {
        Self {
            mesh,
            stencil,
            config: config.clone(),
        }
    }

    /// Area-weighted average of face momentum over the faces of each cell.
    pub fn surface_to_volume(&self, face_momentum: &FaceField<Vec3>) -> Result<CellField<Vec3>> {
        face_momentum.check_size(self.mesh)?;
        let mesh = self.mesh;
        let values = (0..mesh.n_cells())
            .into_par_iter()
            .map(|cell| {
                let (sum, area) = mesh.cell_faces(cell).iter().fold(
                    (Vec3::zeros(), 0.0),
                    |(sum, area), &face| {
                        let a = mesh.face_area(face);
                        (sum + face_momentum[face] * a, area + a)
                    },
                );
                sum / area
            })
            .collect();
        Ok(CellField::from_vec(values))
    }

    /// Local gradient of cell momentum from the cell's own face values.
    pub fn local_gradient(
        &self,
        cell_momentum: &CellField<Vec3>,
        face_momentum: &FaceField<Vec3>,
    ) -> Result<CellField<Tensor>> {
        GradientEngine::new(self.mesh, self.stencil).local_gradient(cell_momentum, face_momentum)
    }

    /// Average of `lm_c + G_c·(x_node - x_c)` over the cells around each node,
    /// weighted by each cell's share of the node's dual volume.
    ///
    /// With these weights the dual-volume integral of the nodal field equals
    /// the cell integral whenever the node average of each cell is its
    /// centroid.
    pub fn volume_to_node(
        &self,
        cell_momentum: &CellField<Vec3>,
        gradient: &CellField<Tensor>,
    ) -> Result<NodeField<Vec3>> {
        cell_momentum.check_size(self.mesh)?;
        gradient.check_size(self.mesh)?;
        let mesh = self.mesh;
        let values = (0..mesh.n_points())
            .into_par_iter()
            .map(|node| {
                let cells = mesh.point_cells(node);
                if cells.is_empty() {
                    return Err(Error::OrphanNode { node });
                }
                let x = mesh.point(node);
                let (sum, weight) = cells.iter().fold((Vec3::zeros(), 0.0), |(sum, weight), &c| {
                    let w = mesh.dual_volume_share(c);
                    let lm = cell_momentum[c] + gradient[c] * (x - mesh.cell_centre(c));
                    (sum + lm * w, weight + w)
                });
                Ok(sum / weight)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeField::from_vec(values))
    }

    /// Remove the normal component of nodal momentum on symmetry patches.
    pub fn apply_strong_conditions(
        &self,
        registry: &BoundaryRegistry,
        node_momentum: &mut NodeField<Vec3>,
    ) -> Result<()> {
        node_momentum.check_size(self.mesh)?;
        let mesh = self.mesh;
        for (patch, classification) in registry.symmetry_patches(mesh)? {
            for &face in &mesh.patches()[patch].faces {
                let Some(n) = classification.symmetry_normal(mesh, face)? else {
                    continue;
                };
                let projector = tangential_projector(&n);
                for &node in &mesh.face(face).nodes {
                    node_momentum[node] = projector * node_momentum[node];
                }
            }
        }
        Ok(())
    }

    /// Arithmetic mean of the nodal values of each face.
    pub fn node_to_surface(&self, node_momentum: &NodeField<Vec3>) -> Result<FaceField<Vec3>> {
        node_momentum.check_size(self.mesh)?;
        let values = self
            .mesh
            .faces()
            .par_iter()
            .map(|face| {
                let sum: Vec3 = face.nodes.iter().map(|&n| node_momentum[n]).sum();
                sum / face.nodes.len() as f64
            })
            .collect();
        Ok(FaceField::from_vec(values))
    }

    /// Run projection passes until the face momentum settles or the pass
    /// limit is reached.
    pub fn project(
        &self,
        registry: &BoundaryRegistry,
        face_momentum: &FaceField<Vec3>,
    ) -> Result<ConstrainedMomentum> {
        let mut face = face_momentum.clone();
        let mut iterations = 0;
        loop {
            let cell = self.surface_to_volume(&face)?;
            let gradient = self.local_gradient(&cell, &face)?;
            let mut node = self.volume_to_node(&cell, &gradient)?;
            self.apply_strong_conditions(registry, &mut node)?;
            let next = self.node_to_surface(&node)?;

            let change = next
                .iter()
                .zip(face.iter())
                .map(|(a, b)| (a - b).norm())
                .fold(0.0, f64::max);
            iterations += 1;
            trace!("constraint pass {}: max face change {:e}", iterations, change);
            face = next;

            if iterations >= self.config.max_iterations || change <= self.config.tolerance {
                return Ok(ConstrainedMomentum {
                    cell,
                    node,
                    face,
                    iterations,
                });
            }
        }
    }
}
