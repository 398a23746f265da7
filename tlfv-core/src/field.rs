//! Mesh-located fields.
//!
//! A [`Field`] stores one value per mesh entity, in entity index order. The
//! location (cells, faces or nodes) is a zero-sized type parameter so that a
//! cell field cannot be passed where a node field is expected.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mesh::Mesh;

/// Mesh entity kind a field lives on.
pub trait Location: Copy + Debug + Send + Sync + 'static {
    /// Human-readable location name.
    const NAME: &'static str;

    /// Number of entities of this kind in the mesh.
    fn count(mesh: &Mesh) -> usize;
}

/// Cell-centred values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cells;

/// Face values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Faces;

/// Nodal (point) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nodes;

impl Location for Cells {
    const NAME: &'static str = "cell";

    fn count(mesh: &Mesh) -> usize {
        mesh.n_cells()
    }
}

impl Location for Faces {
    const NAME: &'static str = "face";

    fn count(mesh: &Mesh) -> usize {
        mesh.n_faces()
    }
}

impl Location for Nodes {
    const NAME: &'static str = "node";

    fn count(mesh: &Mesh) -> usize {
        mesh.n_points()
    }
}

/// One value per mesh entity of location `L`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
#[serde(transparent)]
pub struct Field<T, L> {
    values: Vec<T>,
    #[serde(skip)]
    location: PhantomData<L>,
}

pub type CellField<T> = Field<T, Cells>;
pub type FaceField<T> = Field<T, Faces>;
pub type NodeField<T> = Field<T, Nodes>;

impl<T, L: Location> Field<T, L> {
    /// Wrap raw values.
    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            values,
            location: PhantomData,
        }
    }

    /// Same value on every entity of the mesh.
    pub fn uniform(mesh: &Mesh, value: T) -> Self
    where
        T: Clone,
    {
        Self::from_vec(vec![value; L::count(mesh)])
    }

    /// Values computed from the entity index.
    pub fn from_fn(mesh: &Mesh, f: impl FnMut(usize) -> T) -> Self {
        Self::from_vec((0..L::count(mesh)).map(f).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<T> {
        self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    /// Apply `f` to every value.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Field<U, L> {
        Field::from_vec(self.values.iter().map(f).collect())
    }

    /// Check that the field has one value per mesh entity.
    pub fn check_size(&self, mesh: &Mesh) -> Result<()> {
        let expected = L::count(mesh);
        if self.values.len() != expected {
            return Err(Error::FieldSize {
                location: L::NAME,
                expected,
                found: self.values.len(),
            });
        }
        Ok(())
    }
}

impl<T, L> Index<usize> for Field<T, L> {
    type Output = T;

    fn index(&self, idx: usize) -> &T {
        &self.values[idx]
    }
}

impl<T, L> IndexMut<usize> for Field<T, L> {
    fn index_mut(&mut self, idx: usize) -> &mut T {
        &mut self.values[idx]
    }
}

impl<'a, T, L> IntoIterator for &'a Field<T, L> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Boundary values equal to the owner cell value (zero normal gradient).
///
/// Interior entries are filled with the owner value too; they are never read
/// by the gradient engine.
pub fn owner_values<T: Copy>(mesh: &Mesh, field: &CellField<T>) -> FaceField<T> {
    FaceField::from_fn(mesh, |f| field[mesh.face(f).owner])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point3, Vec3};

    fn unit_block() -> Mesh {
        Mesh::block(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [2, 1, 1]).unwrap()
    }

    #[test]
    fn test_field_sizes_follow_location() {
        let mesh = unit_block();
        assert_eq!(CellField::uniform(&mesh, 0.0).len(), 2);
        assert_eq!(FaceField::uniform(&mesh, 0.0).len(), mesh.n_faces());
        assert_eq!(NodeField::uniform(&mesh, 0.0).len(), 12);
    }

    #[test]
    fn test_check_size() {
        let mesh = unit_block();
        let field: CellField<f64> = Field::from_vec(vec![1.0; 3]);
        match field.check_size(&mesh) {
            Err(Error::FieldSize { location, expected, found }) => {
                assert_eq!(location, "cell");
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_owner_values() {
        let mesh = unit_block();
        let field = CellField::from_fn(&mesh, |c| c as f64 + 1.0);
        let faces = owner_values(&mesh, &field);
        for f in 0..mesh.n_faces() {
            assert_eq!(faces[f], field[mesh.face(f).owner]);
        }
    }

    #[test]
    fn test_serialises_in_index_order() {
        let mesh = unit_block();
        let field = CellField::from_fn(&mesh, |c| Vec3::new(c as f64, 0.0, 1.0));
        let json = serde_json::to_string(&field).unwrap();
        assert_eq!(json, "[[0.0,0.0,1.0],[1.0,0.0,1.0]]");
        let back: CellField<Vec3> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, field);
    }
}
