//! TLFV Core - Total-Lagrangian Finite-Volume kernel
//!
//! Spatial discretisation for explicit solid dynamics on polyhedral meshes:
//! - Least-squares geometry stencils and gradients
//! - Linear reconstruction of momentum and Piola stress to faces
//! - Acoustic Riemann solver for contact traction and momentum
//! - Nodal compatibility projection with strong symmetry conditions
//! - Parallel per-cell, per-face and per-node loops using Rayon
//!
//! # Architecture
//!
//! One stage of an explicit integrator is evaluated by [`StageKernel`]:
//!
//! - [`StencilCache`]: cached least-squares inverses, rebuilt on mesh motion
//! - [`GradientEngine`]: global and local least-squares gradients
//! - [`FaceReconstructor`]: minus/plus face states and tractions
//! - [`RiemannContactSolver`]: single-valued contact traction and momentum
//! - [`NodalConstraintProjector`]: face → cell → node → face projection
//! - [`BoundaryRegistry`]: patch conditions (symmetry, traction, moving)
//!
//! Material behaviour enters only through per-cell wave speeds
//! ([`WaveSpeedModel`]); stress updates and time integration belong to the
//! caller.

pub mod types;
pub mod error;
pub mod config;
pub mod mesh;
pub mod field;
pub mod material;
pub mod stencil;
pub mod gradient;
pub mod reconstruct;
pub mod riemann;
pub mod boundary;
pub mod constraint;
pub mod kernel;

pub use types::{Axis, Point3, Tensor, Vec3};
pub use error::{Error, Result};
pub use config::{ConstraintConfig, DegeneratePolicy, KernelConfig, RiemannConfig, StencilConfig, Weighting};
pub use mesh::{Mesh, MeshBuilder};
pub use field::{CellField, FaceField, NodeField};
pub use material::{Material, WaveSpeedModel, WaveSpeeds};
pub use stencil::StencilCache;
pub use gradient::{GradientEngine, TensorGradient};
pub use reconstruct::{FaceReconstructor, FaceStates};
pub use riemann::{ContactFields, Impedance, RiemannContactSolver};
pub use boundary::{BoundaryClassification, BoundaryRegistry};
pub use constraint::{ConstrainedMomentum, NodalConstraintProjector};
pub use kernel::{StageInput, StageKernel, StageOutput};
