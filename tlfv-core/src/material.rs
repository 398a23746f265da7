//! Material wave speeds.
//!
//! The contact solver only needs the longitudinal and shear wave speeds of
//! each cell. They are provided through the [`WaveSpeedModel`] trait, which is
//! implemented by an isotropic linear elastic [`Material`] (uniform speeds) and
//! by a per-cell [`CellField`] of [`WaveSpeeds`] for heterogeneous bodies.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::CellField;

/// Longitudinal (p) and shear (s) wave speeds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveSpeeds {
    /// Longitudinal wave speed (m/s).
    pub longitudinal: f64,
    /// Shear wave speed (m/s).
    pub shear: f64,
}

impl WaveSpeeds {
    pub fn new(longitudinal: f64, shear: f64) -> Self {
        Self {
            longitudinal,
            shear,
        }
    }

    /// Speeds scaled by `beta`: longitudinal divided, shear multiplied.
    pub fn scaled(self, beta: f64) -> Self {
        Self {
            longitudinal: self.longitudinal / beta,
            shear: self.shear * beta,
        }
    }
}

/// Source of per-cell wave speeds.
///
/// Implementations must be thread-safe (Send + Sync) so faces can be
/// processed in parallel.
pub trait WaveSpeedModel: Send + Sync {
    /// Wave speeds in a cell.
    fn wave_speeds(&self, cell: usize) -> WaveSpeeds;
}

impl WaveSpeedModel for CellField<WaveSpeeds> {
    fn wave_speeds(&self, cell: usize) -> WaveSpeeds {
        self[cell]
    }
}

/// Isotropic linear elastic material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Young's modulus (Pa).
    pub youngs_modulus: f64,
    /// Poisson's ratio (dimensionless).
    pub poissons_ratio: f64,
    /// Mass density (kg/m³).
    pub density: f64,
}

impl Material {
    /// Create a new isotropic linear elastic material.
    ///
    /// # Arguments
    ///
    /// * `youngs_modulus` - Young's modulus E (Pa)
    /// * `poissons_ratio` - Poisson's ratio ν (dimensionless, -1 < ν < 0.5)
    /// * `density` - Mass density ρ (kg/m³)
    ///
    /// # Errors
    ///
    /// Returns error if material properties are physically invalid.
    pub fn new(youngs_modulus: f64, poissons_ratio: f64, density: f64) -> Result<Self> {
        if !(youngs_modulus > 0.0) {
            return Err(Error::InvalidMaterial(
                "Young's modulus must be positive".into(),
            ));
        }
        if !(poissons_ratio > -1.0 && poissons_ratio < 0.5) {
            return Err(Error::InvalidMaterial(
                "Poisson's ratio must be in range (-1, 0.5)".into(),
            ));
        }
        if !(density > 0.0) {
            return Err(Error::InvalidMaterial("Density must be positive".into()));
        }
        Ok(Self {
            youngs_modulus,
            poissons_ratio,
            density,
        })
    }

    /// Shear modulus G = E / (2(1 + ν)).
    pub fn shear_modulus(&self) -> f64 {
        self.youngs_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// Lamé's first parameter λ = Eν / ((1+ν)(1-2ν)).
    pub fn lame_lambda(&self) -> f64 {
        let e = self.youngs_modulus;
        let nu = self.poissons_ratio;
        e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu))
    }

    /// Lamé's second parameter μ = G (shear modulus).
    pub fn lame_mu(&self) -> f64 {
        self.shear_modulus()
    }

    /// Longitudinal wave speed √((λ + 2μ) / ρ).
    pub fn longitudinal_wave_speed(&self) -> f64 {
        ((self.lame_lambda() + 2.0 * self.lame_mu()) / self.density).sqrt()
    }

    /// Shear wave speed √(μ / ρ).
    pub fn shear_wave_speed(&self) -> f64 {
        (self.lame_mu() / self.density).sqrt()
    }
}

impl WaveSpeedModel for Material {
    fn wave_speeds(&self, _cell: usize) -> WaveSpeeds {
        WaveSpeeds::new(self.longitudinal_wave_speed(), self.shear_wave_speed())
    }
}

/// Common material presets.
impl Material {
    /// Structural steel (E = 200 GPa, ν = 0.3, ρ = 7850 kg/m³).
    pub fn steel() -> Self {
        Self {
            youngs_modulus: 200e9,
            poissons_ratio: 0.3,
            density: 7850.0,
        }
    }

    /// Aluminum 6061-T6 (E = 68.9 GPa, ν = 0.33, ρ = 2700 kg/m³).
    pub fn aluminum() -> Self {
        Self {
            youngs_modulus: 68.9e9,
            poissons_ratio: 0.33,
            density: 2700.0,
        }
    }
}
