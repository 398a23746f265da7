//! Least-squares gradients of cell fields.
//!
//! For a cell `c` with stencil inverse `A⁻¹`, the gradient of a field `U` is
//!
//! ```text
//! ∇U_c = (Σ w (U_j - U_c) ⊗ d_j) · A⁻¹
//! ```
//!
//! which reproduces linear fields exactly. Vector gradients are stored as
//! `G_ij = ∂U_i/∂x_j`, so that `U(x) ≈ U_c + G·(x - x_c)`. Tensor fields are
//! handled row by row: one vector gradient per row, as needed by the
//! row-wise face reconstruction of the Piola stress.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Sub};

use rayon::prelude::*;

use crate::error::Result;
use crate::field::{CellField, FaceField, Field, Location};
use crate::mesh::Mesh;
use crate::stencil::{global_direction, local_direction, StencilCache};
use crate::types::{tensor_from_rows, tensor_row, Tensor, Vec3};

/// Value type that can be differentiated and extrapolated.
pub trait FieldValue:
    Copy
    + Debug
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
{
    /// Gradient type (one rank higher).
    type Gradient: Copy + Debug + Send + Sync + AddAssign;

    fn zero_gradient() -> Self::Gradient;

    /// `diff ⊗ d`.
    fn outer(diff: Self, d: &Vec3) -> Self::Gradient;

    /// Apply a stencil inverse to an accumulated right-hand side.
    fn solve(rhs: Self::Gradient, inverse: &Tensor) -> Self::Gradient;

    /// `self + grad · d`.
    fn extrapolate(self, grad: &Self::Gradient, d: &Vec3) -> Self;
}

impl FieldValue for f64 {
    type Gradient = Vec3;

    fn zero_gradient() -> Vec3 {
        Vec3::zeros()
    }

    fn outer(diff: f64, d: &Vec3) -> Vec3 {
        d * diff
    }

    fn solve(rhs: Vec3, inverse: &Tensor) -> Vec3 {
        inverse * rhs
    }

    fn extrapolate(self, grad: &Vec3, d: &Vec3) -> f64 {
        self + grad.dot(d)
    }
}

impl FieldValue for Vec3 {
    type Gradient = Tensor;

    fn zero_gradient() -> Tensor {
        Tensor::zeros()
    }

    fn outer(diff: Vec3, d: &Vec3) -> Tensor {
        diff * d.transpose()
    }

    fn solve(rhs: Tensor, inverse: &Tensor) -> Tensor {
        rhs * inverse
    }

    fn extrapolate(self, grad: &Tensor, d: &Vec3) -> Vec3 {
        self + grad * d
    }
}

/// Row-wise gradient of a tensor field: `x`, `y`, `z` hold the gradients of
/// rows 0, 1 and 2.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorGradient {
    pub x: CellField<Tensor>,
    pub y: CellField<Tensor>,
    pub z: CellField<Tensor>,
}

impl TensorGradient {
    /// Gradient of row `i`.
    pub fn row(&self, i: usize) -> &CellField<Tensor> {
        match i {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }
}

/// Split a tensor field into its three row vector fields.
pub fn decompose_rows<L: Location>(field: &Field<Tensor, L>) -> [Field<Vec3, L>; 3] {
    [
        field.map(|t| tensor_row(t, 0)),
        field.map(|t| tensor_row(t, 1)),
        field.map(|t| tensor_row(t, 2)),
    ]
}

/// Reassemble a tensor field from three row vector fields.
pub fn compose_rows<L: Location>(rows: &[Field<Vec3, L>; 3]) -> Field<Tensor, L> {
    Field::from_vec(
        (0..rows[0].len())
            .map(|i| tensor_from_rows([rows[0][i], rows[1][i], rows[2][i]]))
            .collect(),
    )
}

/// Least-squares gradient operator over a mesh and its stencil cache.
#[derive(Debug, Clone, Copy)]
pub struct GradientEngine<'a> {
    mesh: &'a Mesh,
    stencil: &'a StencilCache,
}

impl<'a> GradientEngine<'a> {
    pub fn new(mesh: &'a Mesh, stencil: &'a StencilCache) -> Self {
        Self { mesh, stencil }
    }

    /// Gradient of a cell field using the global stencil.
    ///
    /// `boundary` supplies the field value at boundary faces; its interior
    /// entries are ignored.
    pub fn gradient<T: FieldValue>(
        &self,
        field: &CellField<T>,
        boundary: &FaceField<T>,
    ) -> Result<CellField<T::Gradient>> {
        field.check_size(self.mesh)?;
        boundary.check_size(self.mesh)?;
        self.stencil.check(self.mesh)?;
        let mesh = self.mesh;

        let grads = (0..mesh.n_cells())
            .into_par_iter()
            .map(|cell| {
                let mut rhs = T::zero_gradient();
                for &face in mesh.cell_faces(cell) {
                    let f = mesh.face(face);
                    let other = match f.neighbour {
                        Some(nei) if nei == cell => field[f.owner],
                        Some(nei) => field[nei],
                        None => boundary[face],
                    };
                    if let Some((d, w)) = self
                        .stencil
                        .weighted_direction(global_direction(mesh, cell, face))
                    {
                        rhs += T::outer((other - field[cell]) * w, &d);
                    }
                }
                T::solve(rhs, self.stencil.global(cell))
            })
            .collect();
        Ok(CellField::from_vec(grads))
    }

    /// Row-wise gradient of a tensor cell field.
    pub fn tensor_gradient(
        &self,
        field: &CellField<Tensor>,
        boundary: &FaceField<Tensor>,
    ) -> Result<TensorGradient> {
        let [fx, fy, fz] = decompose_rows(field);
        let [bx, by, bz] = decompose_rows(boundary);
        Ok(TensorGradient {
            x: self.gradient(&fx, &bx)?,
            y: self.gradient(&fy, &by)?,
            z: self.gradient(&fz, &bz)?,
        })
    }

    /// Gradient from a cell's own face values using the local stencil.
    pub fn local_gradient<T: FieldValue>(
        &self,
        field: &CellField<T>,
        faces: &FaceField<T>,
    ) -> Result<CellField<T::Gradient>> {
        field.check_size(self.mesh)?;
        faces.check_size(self.mesh)?;
        self.stencil.check(self.mesh)?;
        let mesh = self.mesh;

        let grads = (0..mesh.n_cells())
            .into_par_iter()
            .map(|cell| {
                let mut rhs = T::zero_gradient();
                for &face in mesh.cell_faces(cell) {
                    if let Some((d, w)) = self
                        .stencil
                        .weighted_direction(local_direction(mesh, cell, face))
                    {
                        rhs += T::outer((faces[face] - field[cell]) * w, &d);
                    }
                }
                T::solve(rhs, self.stencil.local(cell))
            })
            .collect();
        Ok(CellField::from_vec(grads))
    }
}
