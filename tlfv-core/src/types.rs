//! Core data types for the finite-volume kernel.
//!
//! This module defines the fundamental types used throughout TLFV:
//! - Geometric primitives (points, vectors)
//! - Second-order tensors (Piola stress, impedance, gradients)
//! - Coordinate axes for axis-aligned boundary conditions

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = Vector3<f64>;

/// A 3D vector (momentum, traction, normal, etc.).
pub type Vec3 = Vector3<f64>;

/// A full (non-symmetric) second-order tensor.
///
/// Used for the first Piola–Kirchhoff stress, vector gradients and the
/// face impedance operators.
pub type Tensor = Matrix3<f64>;

/// Cartesian coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index of this axis.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Unit vector along this axis.
    pub fn unit(self) -> Vec3 {
        let mut e = Vec3::zeros();
        e[self.index()] = 1.0;
        e
    }
}

/// Projector onto the plane orthogonal to `n`: `I - n⊗n`.
///
/// `n` is expected to be a unit vector.
pub fn tangential_projector(n: &Vec3) -> Tensor {
    Tensor::identity() - n * n.transpose()
}

/// Row `i` of a tensor as a column vector.
pub fn tensor_row(t: &Tensor, i: usize) -> Vec3 {
    t.row(i).transpose()
}

/// Assemble a tensor from its three rows.
pub fn tensor_from_rows(rows: [Vec3; 3]) -> Tensor {
    Tensor::from_rows(&[
        rows[0].transpose(),
        rows[1].transpose(),
        rows[2].transpose(),
    ])
}
