//! Acoustic contact solver for face traction and momentum.
//!
//! Each face is treated as a one-dimensional elastodynamic Riemann problem
//! along its normal. With face impedance operators `S_lm` and `S_t` the
//! contact state is
//!
//! ```text
//! t_C  = ½(t⁻ + t⁺)   + ½ S_lm · (lm⁺ - lm⁻)
//! lm_C = ½(lm⁻ + lm⁺) + ½ S_t  · (t⁺ - t⁻)
//! ```
//!
//! For an isotropic material with longitudinal speed `c_p` and shear speed
//! `c_s`, `S_lm = c_p n⊗n + c_s (I - n⊗n)` and `S_t = S_lm⁻¹`. Each side of a
//! face carries its own impedance and the face operator is their average, so
//! a material interface still produces one contact value.

use rayon::prelude::*;

use crate::config::RiemannConfig;
use crate::error::{Error, Result};
use crate::field::FaceField;
use crate::material::{WaveSpeedModel, WaveSpeeds};
use crate::mesh::Mesh;
use crate::reconstruct::FaceStates;
use crate::types::{Tensor, Vec3};

/// Impedance operators of one face side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impedance {
    /// Maps a momentum jump to a traction correction (`Z_lm`).
    pub momentum: Tensor,
    /// Maps a traction jump to a momentum correction (`Z_t`).
    pub traction: Tensor,
}

impl Impedance {
    /// Acoustic impedance for wave speeds `speeds` across a face with unit
    /// normal `n`.
    pub fn from_wave_speeds(speeds: WaveSpeeds, n: &Vec3) -> Self {
        let nn = n * n.transpose();
        let tangential = Tensor::identity() - nn;
        Self {
            momentum: nn * speeds.longitudinal + tangential * speeds.shear,
            traction: nn / speeds.longitudinal + tangential / speeds.shear,
        }
    }

    /// Average of two side impedances.
    pub fn average(&self, other: &Impedance) -> Impedance {
        Impedance {
            momentum: 0.5 * (self.momentum + other.momentum),
            traction: 0.5 * (self.traction + other.traction),
        }
    }
}

/// One-sided state of a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSide {
    pub traction: Vec3,
    pub momentum: Vec3,
    pub impedance: Impedance,
}

/// Resolved contact values of one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactState {
    pub traction: Vec3,
    pub momentum: Vec3,
}

/// Contact values of every face.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactFields {
    pub traction: FaceField<Vec3>,
    pub momentum: FaceField<Vec3>,
}

/// Per-side face impedances from cell wave speeds.
///
/// The minus side uses the owner cell speeds, the plus side the neighbour
/// speeds (owner speeds on boundary faces). Both use the owner-outward face
/// normal.
pub fn face_impedances(
    mesh: &Mesh,
    model: &dyn WaveSpeedModel,
    config: &RiemannConfig,
) -> FaceStates<Impedance> {
    let (minus, plus): (Vec<_>, Vec<_>) = (0..mesh.n_faces())
        .into_par_iter()
        .map(|face| {
            let f = mesh.face(face);
            let n = mesh.face_normal(face);
            let side = |cell: usize| {
                Impedance::from_wave_speeds(model.wave_speeds(cell).scaled(config.beta), n)
            };
            let minus = side(f.owner);
            let plus = f.neighbour.map_or(minus, side);
            (minus, plus)
        })
        .unzip();
    FaceStates {
        minus: FaceField::from_vec(minus),
        plus: FaceField::from_vec(plus),
    }
}

/// Contact solver.
#[derive(Debug, Clone)]
pub struct RiemannContactSolver {
    max_condition: f64,
}

impl RiemannContactSolver {
    pub fn new(config: &RiemannConfig) -> Self {
        Self {
            max_condition: config.max_condition,
        }
    }

    /// Contact traction and momentum of `face` from its two sides.
    ///
    /// Equal states on both sides are returned unchanged.
    pub fn resolve(&self, face: usize, minus: &FaceSide, plus: &FaceSide) -> Result<ContactState> {
        let s = minus.impedance.average(&plus.impedance);
        self.check_conditioning(face, &s.momentum)?;
        self.check_conditioning(face, &s.traction)?;

        let traction = 0.5 * (minus.traction + plus.traction)
            + 0.5 * (s.momentum * (plus.momentum - minus.momentum));
        let momentum = 0.5 * (minus.momentum + plus.momentum)
            + 0.5 * (s.traction * (plus.traction - minus.traction));
        Ok(ContactState { traction, momentum })
    }

    /// Contact values of every face.
    pub fn resolve_all(
        &self,
        mesh: &Mesh,
        tractions: &FaceStates<Vec3>,
        momenta: &FaceStates<Vec3>,
        impedances: &FaceStates<Impedance>,
    ) -> Result<ContactFields> {
        for states in [tractions, momenta] {
            states.minus.check_size(mesh)?;
            states.plus.check_size(mesh)?;
        }
        impedances.minus.check_size(mesh)?;
        impedances.plus.check_size(mesh)?;

        let contacts = (0..mesh.n_faces())
            .into_par_iter()
            .map(|face| {
                let minus = FaceSide {
                    traction: tractions.minus[face],
                    momentum: momenta.minus[face],
                    impedance: impedances.minus[face],
                };
                let plus = FaceSide {
                    traction: tractions.plus[face],
                    momentum: momenta.plus[face],
                    impedance: impedances.plus[face],
                };
                self.resolve(face, &minus, &plus)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ContactFields {
            traction: FaceField::from_vec(contacts.iter().map(|c| c.traction).collect()),
            momentum: FaceField::from_vec(contacts.iter().map(|c| c.momentum).collect()),
        })
    }

    fn check_conditioning(&self, face: usize, s: &Tensor) -> Result<()> {
        let sv = s.singular_values();
        let condition = sv.max() / sv.min();
        if !(sv.min() > 0.0) || !(condition <= self.max_condition) {
            return Err(Error::ImpedanceIllConditioned { face, condition });
        }
        Ok(())
    }
}
