//! Boundary conditions on mesh patches.
//!
//! Every boundary patch carries a [`BoundaryClassification`]. Conditions act
//! in two places:
//!
//! - weakly, by filling the plus state of boundary faces before the contact
//!   solver runs ([`apply_face_overrides`]), and by supplying boundary values
//!   to the gradient engine ([`momentum_boundary_values`]);
//! - strongly, by projecting nodal momentum on symmetry patches (see
//!   [`crate::constraint`]).

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::{CellField, FaceField};
use crate::mesh::Mesh;
use crate::reconstruct::FaceStates;
use crate::types::{tangential_projector, Axis, Tensor, Vec3};

/// Boundary condition of a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryClassification {
    /// No override; the plus state is the owner extrapolation.
    Interior,
    /// Mirror plane along the geometric face normal.
    Symmetry,
    /// Mirror plane normal to the x axis.
    SymmetryX,
    /// Mirror plane normal to the y axis.
    SymmetryY,
    /// Mirror plane normal to the z axis.
    SymmetryZ,
    /// Prescribed traction.
    Traction { traction: Vec3 },
    /// Prescribed linear momentum.
    Moving { linear_momentum: Vec3 },
    /// Prescribed displacement history, ramped in smoothly until `end_time`.
    MovingDisplacement {
        density: f64,
        displacement: Vec3,
        end_time: f64,
    },
}

impl BoundaryClassification {
    /// Check payload values.
    pub fn validate(&self, name: &str) -> Result<()> {
        match self {
            BoundaryClassification::MovingDisplacement {
                density, end_time, ..
            } => {
                if !(*density > 0.0) {
                    return Err(Error::Boundary(format!(
                        "patch '{}': density must be positive, got {}",
                        name, density
                    )));
                }
                if !(*end_time > 0.0) {
                    return Err(Error::Boundary(format!(
                        "patch '{}': end_time must be positive, got {}",
                        name, end_time
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Order in which symmetry conditions are enforced on nodes: general
    /// symmetry first, then x, y and z. `None` for other conditions.
    pub fn symmetry_rank(&self) -> Option<u8> {
        match self {
            BoundaryClassification::Symmetry => Some(0),
            BoundaryClassification::SymmetryX => Some(1),
            BoundaryClassification::SymmetryY => Some(2),
            BoundaryClassification::SymmetryZ => Some(3),
            _ => None,
        }
    }

    /// Mirror-plane normal on `face`, or `None` for non-symmetry conditions.
    pub fn symmetry_normal(&self, mesh: &Mesh, face: usize) -> Result<Option<Vec3>> {
        let n = match self {
            BoundaryClassification::Symmetry => *mesh.face_normal(face),
            BoundaryClassification::SymmetryX => Axis::X.unit(),
            BoundaryClassification::SymmetryY => Axis::Y.unit(),
            BoundaryClassification::SymmetryZ => Axis::Z.unit(),
            _ => return Ok(None),
        };
        if n.norm() == 0.0 {
            return Err(Error::DegenerateBoundary { face });
        }
        Ok(Some(n))
    }

    /// Prescribed displacement at `time` (moving-displacement patches only).
    ///
    /// `u(t) = u_max · ½(1 - cos(π t / t_end))`, held at `u_max` after
    /// `t_end`.
    pub fn displacement(&self, time: f64) -> Option<Vec3> {
        match self {
            BoundaryClassification::MovingDisplacement {
                displacement,
                end_time,
                ..
            } => {
                let factor = if time <= 0.0 {
                    0.0
                } else if time >= *end_time {
                    1.0
                } else {
                    0.5 * (1.0 - (PI * time / end_time).cos())
                };
                Some(displacement * factor)
            }
            _ => None,
        }
    }

    /// Prescribed linear momentum at `time`, if the condition has one.
    pub fn momentum_target(&self, time: f64) -> Option<Vec3> {
        match self {
            BoundaryClassification::Moving { linear_momentum } => Some(*linear_momentum),
            BoundaryClassification::MovingDisplacement {
                density,
                displacement,
                end_time,
            } => {
                if time <= 0.0 || time >= *end_time {
                    return Some(Vec3::zeros());
                }
                let rate = 0.5 * PI / end_time * (PI * time / end_time).sin();
                Some(displacement * (density * rate))
            }
            _ => None,
        }
    }

    /// Plus-side traction and momentum of a boundary face, given the owner
    /// extrapolation `(t_minus, lm_minus)`.
    fn plus_state(
        &self,
        mesh: &Mesh,
        face: usize,
        time: f64,
        t_minus: Vec3,
        lm_minus: Vec3,
    ) -> Result<(Vec3, Vec3)> {
        if let Some(n) = self.symmetry_normal(mesh, face)? {
            let mirror = Tensor::identity() - 2.0 * n * n.transpose();
            return Ok((-(mirror * t_minus), mirror * lm_minus));
        }
        Ok(match self {
            BoundaryClassification::Traction { traction } => {
                (2.0 * traction - t_minus, lm_minus)
            }
            other => match other.momentum_target(time) {
                Some(lm) => (t_minus, 2.0 * lm - lm_minus),
                None => (t_minus, lm_minus),
            },
        })
    }
}

/// Boundary conditions by patch name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryRegistry {
    patches: BTreeMap<String, BoundaryClassification>,
}

impl BoundaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition, replacing any previous one for the patch.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        classification: BoundaryClassification,
    ) -> Result<()> {
        let name = name.into();
        classification.validate(&name)?;
        self.patches.insert(name, classification);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(
        mut self,
        name: impl Into<String>,
        classification: BoundaryClassification,
    ) -> Result<Self> {
        self.insert(name, classification)?;
        Ok(self)
    }

    /// Parse a JSON object of `patch name -> condition`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, BoundaryClassification> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (name, classification) in raw {
            registry.insert(name, classification)?;
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&BoundaryClassification> {
        self.patches.get(name)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundaryClassification)> {
        self.patches.iter().map(|(name, c)| (name.as_str(), c))
    }

    /// Check that the registry and the mesh patches agree one-to-one.
    pub fn validate(&self, mesh: &Mesh) -> Result<()> {
        for patch in mesh.patches() {
            if !self.patches.contains_key(&patch.name) {
                return Err(Error::Boundary(format!(
                    "patch '{}' has no boundary condition",
                    patch.name
                )));
            }
        }
        for (name, classification) in &self.patches {
            if mesh.patch_index(name).is_none() {
                return Err(Error::Boundary(format!("unknown patch '{}'", name)));
            }
            classification.validate(name)?;
        }
        Ok(())
    }

    /// Condition on a face; interior faces are [`BoundaryClassification::Interior`].
    pub fn classify(&self, mesh: &Mesh, face: usize) -> Result<&BoundaryClassification> {
        const INTERIOR: &BoundaryClassification = &BoundaryClassification::Interior;
        match mesh.face_patch(face) {
            None => Ok(INTERIOR),
            Some(patch) => self.require(&mesh.patches()[patch].name),
        }
    }

    /// Symmetry patches as `(patch index, condition)` in enforcement order:
    /// by symmetry rank, then by patch index.
    pub fn symmetry_patches(&self, mesh: &Mesh) -> Result<Vec<(usize, &BoundaryClassification)>> {
        let mut out = Vec::new();
        for (idx, patch) in mesh.patches().iter().enumerate() {
            let classification = self.require(&patch.name)?;
            if let Some(rank) = classification.symmetry_rank() {
                out.push((rank, idx, classification));
            }
        }
        out.sort_by_key(|&(rank, idx, _)| (rank, idx));
        Ok(out.into_iter().map(|(_, idx, c)| (idx, c)).collect())
    }

    fn require(&self, name: &str) -> Result<&BoundaryClassification> {
        self.patches
            .get(name)
            .ok_or_else(|| Error::Boundary(format!("patch '{}' has no boundary condition", name)))
    }
}

/// Overwrite the plus states of boundary faces.
///
/// The states are chosen so that the contact solver returns the prescribed
/// traction on traction patches, the prescribed momentum on moving patches
/// and a mirrored state on symmetry patches (zero normal momentum, zero
/// tangential traction).
pub fn apply_face_overrides(
    mesh: &Mesh,
    registry: &BoundaryRegistry,
    time: f64,
    tractions: &mut FaceStates<Vec3>,
    momenta: &mut FaceStates<Vec3>,
) -> Result<()> {
    for patch in mesh.patches() {
        let classification = registry.require(&patch.name)?;
        for &face in &patch.faces {
            let (t_plus, lm_plus) = classification.plus_state(
                mesh,
                face,
                time,
                tractions.minus[face],
                momenta.minus[face],
            )?;
            tractions.plus[face] = t_plus;
            momenta.plus[face] = lm_plus;
        }
    }
    Ok(())
}

/// Face values of linear momentum for the gradient engine.
///
/// Moving patches use their target momentum, symmetry patches the tangential
/// part of the owner value and all other faces the owner value.
pub fn momentum_boundary_values(
    mesh: &Mesh,
    registry: &BoundaryRegistry,
    time: f64,
    momentum: &CellField<Vec3>,
) -> Result<FaceField<Vec3>> {
    momentum.check_size(mesh)?;
    let values = (0..mesh.n_faces())
        .map(|face| {
            let owner = momentum[mesh.face(face).owner];
            let classification = registry.classify(mesh, face)?;
            if let Some(target) = classification.momentum_target(time) {
                return Ok(target);
            }
            Ok(match classification.symmetry_normal(mesh, face)? {
                Some(n) => tangential_projector(&n) * owner,
                None => owner,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(FaceField::from_vec(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiemannConfig;
    use crate::material::Material;
    use crate::riemann::{face_impedances, RiemannContactSolver};
    use crate::types::Point3;
    use approx::assert_relative_eq;

    fn cube() -> Mesh {
        Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [1, 1, 1]).unwrap()
    }

    fn registry_with(x_min: BoundaryClassification) -> BoundaryRegistry {
        let mut registry = BoundaryRegistry::new();
        for name in ["x_max", "y_min", "y_max", "z_min", "z_max"] {
            registry
                .insert(name, BoundaryClassification::Traction { traction: Vec3::zeros() })
                .unwrap();
        }
        registry.insert("x_min", x_min).unwrap();
        registry
    }

    #[test]
    fn test_registry_from_json() {
        let json = r#"{
            "left": { "type": "symmetry_x" },
            "right": { "type": "moving", "linear_momentum": [1.0, 0.0, 0.0] },
            "top": { "type": "traction", "traction": [0.0, -5.0, 0.0] },
            "clamp": {
                "type": "moving_displacement",
                "density": 1000.0,
                "displacement": [0.0, 0.0, 0.01],
                "end_time": 0.5
            }
        }"#;
        let registry = BoundaryRegistry::from_json(json).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.get("left"), Some(&BoundaryClassification::SymmetryX));
        assert_eq!(
            registry.get("top"),
            Some(&BoundaryClassification::Traction {
                traction: Vec3::new(0.0, -5.0, 0.0)
            })
        );
        assert!(matches!(
            registry.get("clamp"),
            Some(BoundaryClassification::MovingDisplacement { .. })
        ));
    }

    #[test]
    fn test_invalid_moving_displacement() {
        let json = r#"{ "p": {
            "type": "moving_displacement",
            "density": 1.0,
            "displacement": [1.0, 0.0, 0.0],
            "end_time": 0.0
        } }"#;
        assert!(matches!(BoundaryRegistry::from_json(json), Err(Error::Boundary(_))));

        let bad_density = BoundaryClassification::MovingDisplacement {
            density: -1.0,
            displacement: Vec3::x(),
            end_time: 1.0,
        };
        assert!(BoundaryRegistry::new().insert("p", bad_density).is_err());
    }

    #[test]
    fn test_validate_against_mesh() {
        let mesh = cube();
        let registry = registry_with(BoundaryClassification::SymmetryX);
        assert!(registry.validate(&mesh).is_ok());

        let mut missing = registry.clone();
        missing.patches.remove("z_max");
        assert!(matches!(missing.validate(&mesh), Err(Error::Boundary(_))));

        let extra = registry.with("outlet", BoundaryClassification::Interior).unwrap();
        assert!(matches!(extra.validate(&mesh), Err(Error::Boundary(_))));
    }

    #[test]
    fn test_symmetry_order() {
        let mesh = cube();
        let mut registry = registry_with(BoundaryClassification::SymmetryZ);
        registry.insert("y_max", BoundaryClassification::Symmetry).unwrap();
        registry.insert("z_min", BoundaryClassification::SymmetryX).unwrap();
        registry.insert("y_min", BoundaryClassification::SymmetryX).unwrap();

        let order: Vec<&str> = registry
            .symmetry_patches(&mesh)
            .unwrap()
            .into_iter()
            .map(|(idx, _)| mesh.patches()[idx].name.as_str())
            .collect();
        assert_eq!(order, vec!["y_max", "y_min", "z_min", "x_min"]);
    }

    #[test]
    fn test_displacement_ramp() {
        let density = 7.5;
        let u_max = Vec3::new(0.0, 0.02, -0.01);
        let end_time = 2.0;
        let bc = BoundaryClassification::MovingDisplacement {
            density,
            displacement: u_max,
            end_time,
        };

        assert_eq!(bc.displacement(0.0), Some(Vec3::zeros()));
        assert_relative_eq!(bc.displacement(1.0).unwrap(), 0.5 * u_max, epsilon = 1e-15);
        assert_eq!(bc.displacement(3.0), Some(u_max));
        assert_eq!(bc.momentum_target(2.5), Some(Vec3::zeros()));

        // Momentum target is density times the displacement rate.
        let h = 1e-6;
        for t in [0.3, 1.0, 1.7] {
            let rate = (bc.displacement(t + h).unwrap() - bc.displacement(t - h).unwrap()) / (2.0 * h);
            assert_relative_eq!(bc.momentum_target(t).unwrap(), density * rate, epsilon = 1e-8);
        }
    }

    fn contact_with(
        mesh: &Mesh,
        registry: &BoundaryRegistry,
        piola: Tensor,
        momentum: Vec3,
    ) -> crate::riemann::ContactFields {
        let material = Material::new(1.0, 0.25, 1.0).unwrap();
        let mut tractions = FaceStates::symmetric(FaceField::from_fn(mesh, |f| {
            piola * mesh.face_normal(f)
        }));
        let mut momenta = FaceStates::symmetric(FaceField::uniform(mesh, momentum));
        apply_face_overrides(mesh, registry, 0.0, &mut tractions, &mut momenta).unwrap();
        let config = RiemannConfig::default();
        let impedances = face_impedances(mesh, &material, &config);
        RiemannContactSolver::new(&config)
            .resolve_all(mesh, &tractions, &momenta, &impedances)
            .unwrap()
    }

    #[test]
    fn test_traction_and_moving_overrides() {
        let mesh = cube();
        let lm_b = Vec3::new(0.5, -1.0, 2.0);
        let mut registry = registry_with(BoundaryClassification::Moving { linear_momentum: lm_b });
        let t_b = Vec3::new(3.0, 0.0, -1.0);
        registry
            .insert("x_max", BoundaryClassification::Traction { traction: t_b })
            .unwrap();

        let piola = Tensor::new(1.0, 2.0, 0.0, 2.0, -1.0, 0.5, 0.0, 0.5, 3.0);
        let contact = contact_with(&mesh, &registry, piola, Vec3::new(1.0, 1.0, 1.0));

        let x_min = &mesh.patches()[mesh.patch_index("x_min").unwrap()];
        let x_max = &mesh.patches()[mesh.patch_index("x_max").unwrap()];
        for &face in &x_min.faces {
            assert_relative_eq!(contact.momentum[face], lm_b, epsilon = 1e-12);
        }
        for &face in &x_max.faces {
            assert_relative_eq!(contact.traction[face], t_b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_symmetry_override_mirrors_state() {
        let mesh = cube();
        let registry = registry_with(BoundaryClassification::Symmetry);
        let piola = Tensor::new(1.0, 2.0, 0.0, 2.0, -1.0, 0.5, 0.0, 0.5, 3.0);
        let contact = contact_with(&mesh, &registry, piola, Vec3::new(1.0, 2.0, 3.0));

        let x_min = &mesh.patches()[mesh.patch_index("x_min").unwrap()];
        for &face in &x_min.faces {
            let n = mesh.face_normal(face);
            assert_relative_eq!(contact.momentum[face].dot(n), 0.0, epsilon = 1e-12);
            let tangential = tangential_projector(n) * contact.traction[face];
            assert_relative_eq!(tangential, Vec3::zeros(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_momentum_boundary_values() {
        let mesh = cube();
        let lm_b = Vec3::new(0.0, 4.0, 0.0);
        let mut registry = registry_with(BoundaryClassification::SymmetryX);
        registry
            .insert("y_max", BoundaryClassification::Moving { linear_momentum: lm_b })
            .unwrap();
        let momentum = CellField::uniform(&mesh, Vec3::new(1.0, 2.0, 3.0));
        let values = momentum_boundary_values(&mesh, &registry, 0.0, &momentum).unwrap();

        for &face in &mesh.patches()[mesh.patch_index("x_min").unwrap()].faces {
            assert_eq!(values[face], Vec3::new(0.0, 2.0, 3.0));
        }
        for &face in &mesh.patches()[mesh.patch_index("y_max").unwrap()].faces {
            assert_eq!(values[face], lm_b);
        }
        for &face in &mesh.patches()[mesh.patch_index("z_min").unwrap()].faces {
            assert_eq!(values[face], Vec3::new(1.0, 2.0, 3.0));
        }
    }
}
