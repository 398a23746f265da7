//! Linear reconstruction of cell fields to face states.
//!
//! Each face receives a *minus* value extrapolated from its owner cell and a
//! *plus* value extrapolated from its neighbour:
//!
//! ```text
//! U⁻ = U_o + ∇U_o · (x_f - x_o)
//! U⁺ = U_n + ∇U_n · (x_f - x_n)
//! ```
//!
//! No slope limiting is applied; jumps between the two states are resolved by
//! the contact solver. Boundary faces only get a minus value; their plus
//! value starts as a copy of it and is overwritten by the boundary conditions.

use rayon::prelude::*;

use crate::error::Result;
use crate::field::{CellField, FaceField};
use crate::gradient::{compose_rows, decompose_rows, FieldValue, TensorGradient};
use crate::mesh::Mesh;
use crate::types::{Tensor, Vec3};

/// Two one-sided values per face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceStates<T> {
    /// Owner-side values.
    pub minus: FaceField<T>,
    /// Neighbour-side values.
    pub plus: FaceField<T>,
}

impl<T: Copy> FaceStates<T> {
    /// Both sides equal to `values`.
    pub fn symmetric(values: FaceField<T>) -> Self {
        Self {
            minus: values.clone(),
            plus: values,
        }
    }
}

/// Face reconstruction over a mesh.
#[derive(Debug, Clone, Copy)]
pub struct FaceReconstructor<'a> {
    mesh: &'a Mesh,
}

impl<'a> FaceReconstructor<'a> {
    pub fn new(mesh: &'a Mesh) -> Self {
        Self { mesh }
    }

    /// Minus/plus states of a scalar or vector field.
    pub fn reconstruct<T: FieldValue>(
        &self,
        field: &CellField<T>,
        gradient: &CellField<T::Gradient>,
    ) -> Result<FaceStates<T>> {
        field.check_size(self.mesh)?;
        gradient.check_size(self.mesh)?;
        let mesh = self.mesh;

        let extrapolate = |cell: usize, face: usize| {
            let d = mesh.face_centre(face) - mesh.cell_centre(cell);
            field[cell].extrapolate(&gradient[cell], &d)
        };

        let (minus, plus): (Vec<T>, Vec<T>) = (0..mesh.n_faces())
            .into_par_iter()
            .map(|face| {
                let f = mesh.face(face);
                let minus = extrapolate(f.owner, face);
                let plus = match f.neighbour {
                    Some(nei) => extrapolate(nei, face),
                    None => minus,
                };
                (minus, plus)
            })
            .unzip();

        Ok(FaceStates {
            minus: FaceField::from_vec(minus),
            plus: FaceField::from_vec(plus),
        })
    }

    /// Minus/plus states of a tensor field, reconstructed row by row.
    pub fn reconstruct_tensor(
        &self,
        field: &CellField<Tensor>,
        gradient: &TensorGradient,
    ) -> Result<FaceStates<Tensor>> {
        let [rx, ry, rz] = decompose_rows(field);
        let sx = self.reconstruct(&rx, &gradient.x)?;
        let sy = self.reconstruct(&ry, &gradient.y)?;
        let sz = self.reconstruct(&rz, &gradient.z)?;
        Ok(FaceStates {
            minus: compose_rows(&[sx.minus, sy.minus, sz.minus]),
            plus: compose_rows(&[sx.plus, sy.plus, sz.plus]),
        })
    }

    /// Tractions `t = P·N` on both sides of every face.
    pub fn tractions(&self, piola: &FaceStates<Tensor>) -> Result<FaceStates<Vec3>> {
        piola.minus.check_size(self.mesh)?;
        piola.plus.check_size(self.mesh)?;
        let mesh = self.mesh;
        let traction = |p: &FaceField<Tensor>| {
            FaceField::from_fn(mesh, |face| p[face] * mesh.face_normal(face))
        };
        Ok(FaceStates {
            minus: traction(&piola.minus),
            plus: traction(&piola.plus),
        })
    }
}
