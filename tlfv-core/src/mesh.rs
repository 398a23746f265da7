//! Polyhedral finite-volume mesh.
//!
//! Stores points, faces with owner/neighbour cells, named boundary patches and
//! the geometry derived from them. Meshes are assembled through
//! [`MeshBuilder`], which validates the topology and computes face and cell
//! geometry once; the resulting [`Mesh`] is immutable.
//!
//! Face orientation follows the owner/neighbour convention: every face normal
//! points out of its owner cell (towards the neighbour for interior faces).

use crate::error::{Error, Result};
use crate::types::{Point3, Vec3};

/// A polygonal face of the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Point indices, ordered around the polygon.
    pub nodes: Vec<usize>,
    /// Owner cell.
    pub owner: usize,
    /// Neighbour cell, `None` on the boundary.
    pub neighbour: Option<usize>,
}

/// A named group of boundary faces.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub name: String,
    pub faces: Vec<usize>,
}

/// Incremental, validating mesh constructor.
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    points: Vec<Point3>,
    faces: Vec<Face>,
    n_cells: usize,
    patches: Vec<Patch>,
}

impl MeshBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with pre-allocated capacity.
    pub fn with_capacity(n_points: usize, n_faces: usize) -> Self {
        Self {
            points: Vec::with_capacity(n_points),
            faces: Vec::with_capacity(n_faces),
            n_cells: 0,
            patches: Vec::new(),
        }
    }

    /// Add a point, returning its index.
    pub fn add_point(&mut self, point: Point3) -> usize {
        let idx = self.points.len();
        self.points.push(point);
        idx
    }

    /// Add multiple points at once.
    pub fn add_points(&mut self, points: impl IntoIterator<Item = Point3>) {
        self.points.extend(points);
    }

    /// Declare `n` additional cells, returning the index of the first one.
    pub fn add_cells(&mut self, n: usize) -> usize {
        let first = self.n_cells;
        self.n_cells += n;
        first
    }

    /// Add a face between `owner` and an optional `neighbour`.
    pub fn add_face(
        &mut self,
        nodes: Vec<usize>,
        owner: usize,
        neighbour: Option<usize>,
    ) -> Result<usize> {
        if nodes.len() < 3 {
            return Err(Error::Mesh(format!(
                "Face requires at least 3 nodes, got {}",
                nodes.len()
            )));
        }

        for &node_idx in &nodes {
            if node_idx >= self.points.len() {
                return Err(Error::Mesh(format!(
                    "Node index {} out of bounds (mesh has {} points)",
                    node_idx,
                    self.points.len()
                )));
            }
        }

        for cell in std::iter::once(owner).chain(neighbour) {
            if cell >= self.n_cells {
                return Err(Error::Mesh(format!(
                    "Cell index {} out of bounds (mesh has {} cells)",
                    cell, self.n_cells
                )));
            }
        }

        if neighbour == Some(owner) {
            return Err(Error::Mesh(format!(
                "Face cannot have cell {} as both owner and neighbour",
                owner
            )));
        }

        let idx = self.faces.len();
        self.faces.push(Face {
            nodes,
            owner,
            neighbour,
        });
        Ok(idx)
    }

    /// Group boundary faces into a named patch.
    pub fn add_patch(&mut self, name: impl Into<String>, faces: Vec<usize>) -> Result<usize> {
        let name = name.into();
        if self.patches.iter().any(|p| p.name == name) {
            return Err(Error::Mesh(format!("Duplicate patch name '{}'", name)));
        }

        for &face in &faces {
            let Some(f) = self.faces.get(face) else {
                return Err(Error::Mesh(format!(
                    "Patch '{}' references missing face {}",
                    name, face
                )));
            };
            if f.neighbour.is_some() {
                return Err(Error::Mesh(format!(
                    "Patch '{}' references interior face {}",
                    name, face
                )));
            }
            if self.patches.iter().any(|p| p.faces.contains(&face)) {
                return Err(Error::Mesh(format!(
                    "Face {} already belongs to another patch",
                    face
                )));
            }
        }

        let idx = self.patches.len();
        self.patches.push(Patch { name, faces });
        Ok(idx)
    }

    /// Validate the topology and compute the mesh geometry.
    pub fn build(self) -> Result<Mesh> {
        let MeshBuilder {
            points,
            mut faces,
            n_cells,
            patches,
        } = self;

        let mut cell_faces = vec![Vec::new(); n_cells];
        for (face_idx, face) in faces.iter().enumerate() {
            cell_faces[face.owner].push(face_idx);
            if let Some(nei) = face.neighbour {
                cell_faces[nei].push(face_idx);
            }
        }

        if let Some(cell) = cell_faces.iter().position(|f| f.len() < 4) {
            return Err(Error::Mesh(format!(
                "Cell {} is not closed ({} faces)",
                cell,
                cell_faces[cell].len()
            )));
        }

        let mut face_patch = vec![None; faces.len()];
        for (patch_idx, patch) in patches.iter().enumerate() {
            for &face in &patch.faces {
                face_patch[face] = Some(patch_idx);
            }
        }
        if let Some(face) = faces
            .iter()
            .enumerate()
            .position(|(i, f)| f.neighbour.is_none() && face_patch[i].is_none())
        {
            return Err(Error::Mesh(format!(
                "Boundary face {} is not assigned to a patch",
                face
            )));
        }

        let mut face_centres = Vec::with_capacity(faces.len());
        let mut face_area_vectors = Vec::with_capacity(faces.len());
        for face in &faces {
            let (centre, area_vector) = polygon_geometry(&points, &face.nodes);
            face_centres.push(centre);
            face_area_vectors.push(area_vector);
        }

        // Face-centre average is a good enough reference point for orienting
        // faces and for the pyramid decomposition below.
        let centre_estimates: Vec<Point3> = cell_faces
            .iter()
            .map(|fs| fs.iter().map(|&f| face_centres[f]).sum::<Vec3>() / fs.len() as f64)
            .collect();

        for (face_idx, face) in faces.iter_mut().enumerate() {
            let outward = face_centres[face_idx] - centre_estimates[face.owner];
            if outward.dot(&face_area_vectors[face_idx]) < 0.0 {
                face.nodes.reverse();
                face_area_vectors[face_idx] = -face_area_vectors[face_idx];
            }
        }

        let mut cell_centres = Vec::with_capacity(n_cells);
        let mut cell_volumes = Vec::with_capacity(n_cells);
        for (cell, fs) in cell_faces.iter().enumerate() {
            let estimate = centre_estimates[cell];
            let mut volume = 0.0;
            let mut moment = Vec3::zeros();
            for &f in fs {
                let sign = if faces[f].owner == cell { 1.0 } else { -1.0 };
                let pyramid = sign * face_area_vectors[f].dot(&(face_centres[f] - estimate)) / 3.0;
                volume += pyramid;
                moment += pyramid * (0.75 * face_centres[f] + 0.25 * estimate);
            }
            if volume <= 0.0 {
                return Err(Error::Mesh(format!(
                    "Cell {} has non-positive volume {:e}",
                    cell, volume
                )));
            }
            cell_volumes.push(volume);
            cell_centres.push(moment / volume);
        }

        let face_areas: Vec<f64> = face_area_vectors.iter().map(|s| s.norm()).collect();
        let face_normals: Vec<Vec3> = face_area_vectors
            .iter()
            .zip(&face_areas)
            .map(|(s, &a)| if a > 0.0 { s / a } else { Vec3::zeros() })
            .collect();

        let mut cell_points = vec![Vec::new(); n_cells];
        for (cell, fs) in cell_faces.iter().enumerate() {
            let pts = &mut cell_points[cell];
            for &f in fs {
                pts.extend_from_slice(&faces[f].nodes);
            }
            pts.sort_unstable();
            pts.dedup();
        }

        let mut point_cells = vec![Vec::new(); points.len()];
        for (cell, pts) in cell_points.iter().enumerate() {
            for &p in pts {
                point_cells[p].push(cell);
            }
        }

        Ok(Mesh {
            points,
            faces,
            n_cells,
            patches,
            face_patch,
            face_centres,
            face_areas,
            face_normals,
            cell_centres,
            cell_volumes,
            cell_faces,
            cell_points,
            point_cells,
        })
    }
}

/// Centre and area vector of a polygon by triangle fan around its point average.
fn polygon_geometry(points: &[Point3], nodes: &[usize]) -> (Point3, Vec3) {
    let n = nodes.len();
    let average = nodes.iter().map(|&i| points[i]).sum::<Vec3>() / n as f64;

    let mut sum_area = 0.0;
    let mut sum_area_vector = Vec3::zeros();
    let mut sum_moment = Vec3::zeros();
    for i in 0..n {
        let a = points[nodes[i]];
        let b = points[nodes[(i + 1) % n]];
        // Twice the triangle area vector.
        let tri = (b - a).cross(&(average - a));
        let area = tri.norm();
        sum_area += area;
        sum_area_vector += tri;
        sum_moment += area * (a + b + average);
    }

    if sum_area <= f64::MIN_POSITIVE {
        return (average, Vec3::zeros());
    }
    (sum_moment / (3.0 * sum_area), 0.5 * sum_area_vector)
}

/// Immutable polyhedral mesh with derived geometry and adjacency.
#[derive(Debug, Clone)]
pub struct Mesh {
    points: Vec<Point3>,
    faces: Vec<Face>,
    n_cells: usize,
    patches: Vec<Patch>,
    face_patch: Vec<Option<usize>>,
    face_centres: Vec<Point3>,
    face_areas: Vec<f64>,
    face_normals: Vec<Vec3>,
    cell_centres: Vec<Point3>,
    cell_volumes: Vec<f64>,
    cell_faces: Vec<Vec<usize>>,
    cell_points: Vec<Vec<usize>>,
    point_cells: Vec<Vec<usize>>,
}

impl Mesh {
    /// Structured hexahedral block `[origin, origin + lengths]`.
    ///
    /// Boundary faces are grouped into the patches `x_min`, `x_max`, `y_min`,
    /// `y_max`, `z_min` and `z_max`.
    pub fn block(origin: Point3, lengths: Vec3, divisions: [usize; 3]) -> Result<Self> {
        let [nx, ny, nz] = divisions;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(Error::Mesh("Block divisions must be positive".into()));
        }
        if lengths.iter().any(|&l| l <= 0.0) {
            return Err(Error::Mesh("Block lengths must be positive".into()));
        }

        let pid = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let cid = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);
        let h = Vec3::new(
            lengths.x / nx as f64,
            lengths.y / ny as f64,
            lengths.z / nz as f64,
        );

        let n_points = (nx + 1) * (ny + 1) * (nz + 1);
        let n_faces = (nx + 1) * ny * nz + nx * (ny + 1) * nz + nx * ny * (nz + 1);
        let mut builder = MeshBuilder::with_capacity(n_points, n_faces);
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    builder.add_point(
                        origin + Vec3::new(i as f64 * h.x, j as f64 * h.y, k as f64 * h.z),
                    );
                }
            }
        }
        builder.add_cells(nx * ny * nz);

        // Faces normal to x, y and z located at point (i, j, k).
        let x_face = |i, j, k| vec![pid(i, j, k), pid(i, j + 1, k), pid(i, j + 1, k + 1), pid(i, j, k + 1)];
        let y_face = |i, j, k| vec![pid(i, j, k), pid(i, j, k + 1), pid(i + 1, j, k + 1), pid(i + 1, j, k)];
        let z_face = |i, j, k| vec![pid(i, j, k), pid(i + 1, j, k), pid(i + 1, j + 1, k), pid(i, j + 1, k)];

        for k in 0..nz {
            for j in 0..ny {
                for i in 1..nx {
                    builder.add_face(x_face(i, j, k), cid(i - 1, j, k), Some(cid(i, j, k)))?;
                }
            }
        }
        for k in 0..nz {
            for j in 1..ny {
                for i in 0..nx {
                    builder.add_face(y_face(i, j, k), cid(i, j - 1, k), Some(cid(i, j, k)))?;
                }
            }
        }
        for k in 1..nz {
            for j in 0..ny {
                for i in 0..nx {
                    builder.add_face(z_face(i, j, k), cid(i, j, k - 1), Some(cid(i, j, k)))?;
                }
            }
        }

        let mut patch = Vec::new();
        for k in 0..nz {
            for j in 0..ny {
                patch.push(builder.add_face(x_face(0, j, k), cid(0, j, k), None)?);
            }
        }
        builder.add_patch("x_min", std::mem::take(&mut patch))?;
        for k in 0..nz {
            for j in 0..ny {
                patch.push(builder.add_face(x_face(nx, j, k), cid(nx - 1, j, k), None)?);
            }
        }
        builder.add_patch("x_max", std::mem::take(&mut patch))?;
        for k in 0..nz {
            for i in 0..nx {
                patch.push(builder.add_face(y_face(i, 0, k), cid(i, 0, k), None)?);
            }
        }
        builder.add_patch("y_min", std::mem::take(&mut patch))?;
        for k in 0..nz {
            for i in 0..nx {
                patch.push(builder.add_face(y_face(i, ny, k), cid(i, ny - 1, k), None)?);
            }
        }
        builder.add_patch("y_max", std::mem::take(&mut patch))?;
        for j in 0..ny {
            for i in 0..nx {
                patch.push(builder.add_face(z_face(i, j, 0), cid(i, j, 0), None)?);
            }
        }
        builder.add_patch("z_min", std::mem::take(&mut patch))?;
        for j in 0..ny {
            for i in 0..nx {
                patch.push(builder.add_face(z_face(i, j, nz), cid(i, j, nz - 1), None)?);
            }
        }
        builder.add_patch("z_max", patch)?;

        builder.build()
    }

    /// Number of points (nodes).
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// Number of faces.
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of cells.
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Point coordinates.
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn point(&self, idx: usize) -> &Point3 {
        &self.points[idx]
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face(&self, idx: usize) -> &Face {
        &self.faces[idx]
    }

    /// Whether the face lies on the domain boundary.
    pub fn is_boundary(&self, face: usize) -> bool {
        self.faces[face].neighbour.is_none()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Index of the patch with the given name.
    pub fn patch_index(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// Patch containing a boundary face.
    pub fn face_patch(&self, face: usize) -> Option<usize> {
        self.face_patch[face]
    }

    pub fn face_centre(&self, face: usize) -> &Point3 {
        &self.face_centres[face]
    }

    pub fn face_area(&self, face: usize) -> f64 {
        self.face_areas[face]
    }

    /// Unit normal pointing out of the owner cell (zero for degenerate faces).
    pub fn face_normal(&self, face: usize) -> &Vec3 {
        &self.face_normals[face]
    }

    pub fn cell_centre(&self, cell: usize) -> &Point3 {
        &self.cell_centres[cell]
    }

    pub fn cell_volume(&self, cell: usize) -> f64 {
        self.cell_volumes[cell]
    }

    /// Faces bounding a cell.
    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        &self.cell_faces[cell]
    }

    /// Sorted points of a cell.
    pub fn cell_points(&self, cell: usize) -> &[usize] {
        &self.cell_points[cell]
    }

    /// Sorted cells sharing a point.
    pub fn point_cells(&self, point: usize) -> &[usize] {
        &self.point_cells[point]
    }

    /// Share of a cell's volume given to each of its points.
    pub fn dual_volume_share(&self, cell: usize) -> f64 {
        self.cell_volumes[cell] / self.cell_points[cell].len() as f64
    }

    /// Dual (nodal) volume: each cell volume shared equally among its points.
    pub fn dual_volumes(&self) -> Vec<f64> {
        let mut dual = vec![0.0; self.points.len()];
        for (cell, pts) in self.cell_points.iter().enumerate() {
            let share = self.dual_volume_share(cell);
            for &p in pts {
                dual[p] += share;
            }
        }
        dual
    }

    /// Compute mesh bounding box.
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        let first = *self.points.first()?;
        Some(self.points[1..].iter().fold((first, first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        }))
    }
}
