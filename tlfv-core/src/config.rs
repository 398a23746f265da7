//! Kernel configuration.
//!
//! All settings have defaults, so a configuration file only needs to name
//! what it changes:
//!
//! ```json
//! {
//!     "stencil": { "weighting": "inverse_distance", "on_degenerate": "zero_gradient" },
//!     "riemann": { "beta": 1.0 },
//!     "constraint": { "max_iterations": 3, "tolerance": 1e-12 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Axis;

/// Least-squares weight applied to each stencil direction `d`.
///
/// The default keeps the plain distance matrix `A = Σ d ⊗ d`, whose inverse
/// is the stored stencil. Distance weights are opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// w = 1.
    #[default]
    Uniform,
    /// w = 1 / |d|.
    InverseDistance,
    /// w = 1 / |d|².
    InverseDistanceSquared,
}

impl Weighting {
    /// Weight for a direction of length `distance`.
    pub fn weight(self, distance: f64) -> f64 {
        match self {
            Weighting::Uniform => 1.0,
            Weighting::InverseDistance => 1.0 / distance,
            Weighting::InverseDistanceSquared => 1.0 / (distance * distance),
        }
    }
}

/// What to do with a cell whose stencil matrix is singular.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Fail with [`Error::DegenerateStencil`].
    #[default]
    Abort,
    /// Store a zero inverse, i.e. a first-order (zero gradient) cell.
    ZeroGradient,
}

/// Least-squares stencil settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StencilConfig {
    /// Direction weighting.
    pub weighting: Weighting,
    /// Empty direction of a planar mesh.
    pub reduced_direction: Option<Axis>,
    /// Threshold on `det(A) / (tr(A)/3)^3` below which a stencil is singular.
    pub singular_tolerance: f64,
    /// Handling of singular stencils.
    pub on_degenerate: DegeneratePolicy,
}

impl Default for StencilConfig {
    fn default() -> Self {
        Self {
            weighting: Weighting::Uniform,
            reduced_direction: None,
            singular_tolerance: 1e-10,
            on_degenerate: DegeneratePolicy::Abort,
        }
    }
}

/// Contact solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiemannConfig {
    /// Wave-speed scaling: longitudinal speeds are divided by `beta`, shear
    /// speeds multiplied by it.
    pub beta: f64,
    /// Largest accepted condition number of a face impedance tensor.
    pub max_condition: f64,
}

impl Default for RiemannConfig {
    fn default() -> Self {
        Self {
            beta: 1.0,
            max_condition: 1e12,
        }
    }
}

/// Nodal constraint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Maximum number of face→cell→node→face passes per stage.
    pub max_iterations: usize,
    /// Stop once the largest face momentum change of a pass is below this.
    pub tolerance: f64,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            tolerance: 1e-12,
        }
    }
}

/// Complete kernel configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub stencil: StencilConfig,
    pub riemann: RiemannConfig,
    pub constraint: ConstraintConfig,
}

impl KernelConfig {
    /// Parse a JSON configuration and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.stencil.singular_tolerance >= 0.0) {
            return Err(Error::Config(
                "stencil.singular_tolerance must be non-negative".into(),
            ));
        }
        if !(self.riemann.beta > 0.0 && self.riemann.beta.is_finite()) {
            return Err(Error::Config("riemann.beta must be positive".into()));
        }
        if !(self.riemann.max_condition >= 1.0) {
            return Err(Error::Config(
                "riemann.max_condition must be at least 1".into(),
            ));
        }
        if self.constraint.max_iterations == 0 {
            return Err(Error::Config(
                "constraint.max_iterations must be at least 1".into(),
            ));
        }
        if !(self.constraint.tolerance >= 0.0) {
            return Err(Error::Config(
                "constraint.tolerance must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
