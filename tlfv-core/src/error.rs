//! Error types for TLFV kernel operations.

use thiserror::Error;

/// Result type alias using the kernel Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating the kernel.
///
/// Entity-local numerical failures carry the index of the offending cell,
/// face or node so the driver can report or reject the mesh.
#[derive(Error, Debug)]
pub enum Error {
    /// Least-squares normal matrix of a cell is singular.
    #[error("degenerate least-squares stencil at cell {cell}")]
    DegenerateStencil { cell: usize },

    /// Node without any incident cell during nodal averaging.
    #[error("node {node} has no incident cells")]
    OrphanNode { node: usize },

    /// Boundary face whose normal cannot be resolved.
    #[error("boundary face {face} has a zero-length normal")]
    DegenerateBoundary { face: usize },

    /// Face impedance tensor that cannot be used by the contact solver.
    #[error("ill-conditioned impedance at face {face} (condition number {condition:e})")]
    ImpedanceIllConditioned { face: usize, condition: f64 },

    /// Mesh-related errors.
    #[error("mesh error: {0}")]
    Mesh(String),

    /// Field does not match the mesh entity count.
    #[error("{location} field has {found} values, mesh has {expected}")]
    FieldSize {
        location: &'static str,
        expected: usize,
        found: usize,
    },

    /// Boundary registry errors.
    #[error("boundary error: {0}")]
    Boundary(String),

    /// Invalid material properties.
    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    /// Invalid kernel configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O errors (configuration files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
