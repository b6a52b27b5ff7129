//! Arena-indexed triangle mesh topology.
//!
//! [`MeshTopology`] stores the rest pose of a triangle mesh together with the
//! one-ring ("fan") of every vertex in compressed sparse row layout: the
//! neighbors of vertex `v` occupy `neighbors[offsets[v]..offsets[v + 1]]`.
//! Each fan entry also records the up-to-two vertices opposite the edge, which
//! is everything cotangent weights need.
//!
//! The structure is immutable once built. Vertices that no triangle
//! references are allowed and simply have an empty fan.

use std::collections::HashMap;
use std::ops::Range;

use nalgebra::{Point3, Vector3};

use crate::error::{DeformError, Result};

/// Vertices opposite an edge, one per incident triangle.
///
/// Interior edges have two, boundary edges have one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Opposites {
    first: Option<usize>,
    second: Option<usize>,
}

impl Opposites {
    fn push(&mut self, vertex: usize) -> bool {
        if self.first.is_none() {
            self.first = Some(vertex);
            true
        } else if self.second.is_none() {
            self.second = Some(vertex);
            true
        } else {
            false
        }
    }

    /// Number of incident triangles (0, 1 or 2).
    #[inline]
    pub fn count(&self) -> usize {
        self.first.is_some() as usize + self.second.is_some() as usize
    }

    /// Whether the edge lies on the mesh boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.count() == 1
    }

    /// Iterate over the opposite vertices.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.first.into_iter().chain(self.second)
    }
}

/// Immutable rest-pose mesh: positions, triangles and CSR one-rings.
#[derive(Debug, Clone)]
pub struct MeshTopology {
    positions: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
    /// Length `num_vertices + 1`; `offsets[v]..offsets[v + 1]` is the fan of `v`.
    offsets: Vec<usize>,
    /// Neighbor vertex of each fan entry, ascending within a fan.
    neighbors: Vec<usize>,
    /// Opposite vertices of each fan entry's edge.
    opposites: Vec<Opposites>,
}

impl MeshTopology {
    /// Build the topology from vertex positions and triangle faces.
    ///
    /// # Errors
    ///
    /// - [`DeformError::EmptyMesh`] if there are no vertices
    /// - [`DeformError::InvalidVertexIndex`] if a face references a missing vertex
    /// - [`DeformError::DegenerateFace`] if a face repeats a vertex
    /// - [`DeformError::NonManifoldEdge`] if an edge has more than two faces
    ///
    /// # Example
    ///
    /// ```
    /// use ductile::mesh::MeshTopology;
    /// use nalgebra::Point3;
    ///
    /// let positions = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.5, 1.0, 0.0),
    /// ];
    /// let mesh = MeshTopology::from_triangles(positions, vec![[0, 1, 2]]).unwrap();
    /// assert_eq!(mesh.num_vertices(), 3);
    /// assert_eq!(mesh.neighbors(0), &[1, 2]);
    /// ```
    pub fn from_triangles(positions: Vec<Point3<f64>>, triangles: Vec<[usize; 3]>) -> Result<Self> {
        let n = positions.len();
        if n == 0 {
            return Err(DeformError::EmptyMesh);
        }

        for (fi, face) in triangles.iter().enumerate() {
            for &vi in face {
                if vi >= n {
                    return Err(DeformError::InvalidVertexIndex { face: fi, vertex: vi });
                }
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(DeformError::DegenerateFace { face: fi });
            }
        }

        // Undirected edge -> vertices opposite it
        let mut edge_map: HashMap<(usize, usize), Opposites> = HashMap::new();
        for face in &triangles {
            for i in 0..3 {
                let a = face[i];
                let b = face[(i + 1) % 3];
                let opposite = face[(i + 2) % 3];
                let entry = edge_map.entry(canonical_edge(a, b)).or_default();
                if !entry.push(opposite) {
                    let (v0, v1) = canonical_edge(a, b);
                    return Err(DeformError::NonManifoldEdge { v0, v1 });
                }
            }
        }

        let mut fans: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(a, b) in edge_map.keys() {
            fans[a].push(b);
            fans[b].push(a);
        }

        let mut offsets = Vec::with_capacity(n + 1);
        let mut neighbors = Vec::with_capacity(edge_map.len() * 2);
        let mut opposites = Vec::with_capacity(edge_map.len() * 2);
        offsets.push(0);
        for (v, fan) in fans.iter_mut().enumerate() {
            fan.sort_unstable();
            for &u in fan.iter() {
                neighbors.push(u);
                opposites.push(edge_map[&canonical_edge(v, u)]);
            }
            offsets.push(neighbors.len());
        }

        Ok(Self {
            positions,
            triangles,
            offsets,
            neighbors,
            opposites,
        })
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.triangles.len()
    }

    /// Number of undirected edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.neighbors.len() / 2
    }

    /// Rest position of a vertex.
    #[inline]
    pub fn position(&self, v: usize) -> &Point3<f64> {
        &self.positions[v]
    }

    /// All rest positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// All triangles.
    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// CSR offsets of the fans (length `num_vertices + 1`).
    #[inline]
    pub fn fan_offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Range of fan entries belonging to `v`.
    #[inline]
    pub fn fan_range(&self, v: usize) -> Range<usize> {
        self.offsets[v]..self.offsets[v + 1]
    }

    /// Neighbors of `v`, ascending.
    #[inline]
    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.neighbors[self.fan_range(v)]
    }

    /// Neighbor stored at a flat fan entry.
    #[inline]
    pub fn fan_neighbor(&self, entry: usize) -> usize {
        self.neighbors[entry]
    }

    /// Opposite vertices of the edge stored at a flat fan entry.
    #[inline]
    pub fn fan_opposites(&self, entry: usize) -> Opposites {
        self.opposites[entry]
    }

    /// Valence of a vertex.
    #[inline]
    pub fn degree(&self, v: usize) -> usize {
        self.offsets[v + 1] - self.offsets[v]
    }

    /// Whether a vertex belongs to no triangle.
    #[inline]
    pub fn is_isolated(&self, v: usize) -> bool {
        self.degree(v) == 0
    }

    /// Whether a vertex has at least one boundary edge.
    pub fn is_boundary_vertex(&self, v: usize) -> bool {
        self.fan_range(v).any(|e| self.opposites[e].is_boundary())
    }

    /// Area-weighted normal of a face under an arbitrary pose.
    ///
    /// The length is the triangle area; the direction follows the winding.
    pub fn face_area_vector(&self, positions: &[Point3<f64>], f: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangles[f];
        let e1 = positions[b] - positions[a];
        let e2 = positions[c] - positions[a];
        0.5 * e1.cross(&e2)
    }

    /// Area of a face under an arbitrary pose.
    pub fn face_area(&self, positions: &[Point3<f64>], f: usize) -> f64 {
        self.face_area_vector(positions, f).norm()
    }

    /// Axis-aligned bounding box of the rest pose.
    pub fn bounding_box(&self) -> (Point3<f64>, Point3<f64>) {
        let mut min = self.positions[0];
        let mut max = self.positions[0];
        for p in &self.positions {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        (min, max)
    }
}

/// Get canonical edge representation (smaller index first).
#[inline]
fn canonical_edge(v0: usize, v1: usize) -> (usize, usize) {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> MeshTopology {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        MeshTopology::from_triangles(positions, vec![[0, 1, 2], [1, 0, 3]]).unwrap()
    }

    #[test]
    fn test_fans_are_sorted_and_symmetric() {
        let mesh = two_triangles();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 2);
        assert_eq!(mesh.num_edges(), 5);
        assert_eq!(mesh.neighbors(0), &[1, 2, 3]);
        assert_eq!(mesh.neighbors(2), &[0, 1]);

        for v in 0..mesh.num_vertices() {
            for &u in mesh.neighbors(v) {
                assert!(mesh.neighbors(u).contains(&v));
            }
        }
        assert_eq!(*mesh.fan_offsets().last().unwrap(), 2 * mesh.num_edges());
    }

    #[test]
    fn test_opposites() {
        let mesh = two_triangles();

        // Edge 0-1 is shared by both triangles
        let entry = mesh.fan_range(0).find(|&e| mesh.fan_neighbor(e) == 1).unwrap();
        let opp: Vec<usize> = mesh.fan_opposites(entry).iter().collect();
        assert_eq!(opp.len(), 2);
        assert!(opp.contains(&2) && opp.contains(&3));

        // Edge 0-2 is on the boundary
        let entry = mesh.fan_range(0).find(|&e| mesh.fan_neighbor(e) == 2).unwrap();
        assert!(mesh.fan_opposites(entry).is_boundary());
        assert_eq!(mesh.fan_opposites(entry).iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_isolated_vertex() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 5.0, 5.0),
        ];
        let mesh = MeshTopology::from_triangles(positions, vec![[0, 1, 2]]).unwrap();

        assert!(mesh.is_isolated(3));
        assert!(mesh.neighbors(3).is_empty());
        assert!(mesh.is_boundary_vertex(0));
        assert!(!mesh.is_boundary_vertex(3));
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let result = MeshTopology::from_triangles(Vec::new(), Vec::new());
        assert_eq!(result.unwrap_err(), DeformError::EmptyMesh);
    }

    #[test]
    fn test_invalid_faces_rejected() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];

        let err = MeshTopology::from_triangles(positions.clone(), vec![[0, 1, 7]]).unwrap_err();
        assert_eq!(err, DeformError::InvalidVertexIndex { face: 0, vertex: 7 });

        let err = MeshTopology::from_triangles(positions, vec![[0, 0, 2]]).unwrap_err();
        assert_eq!(err, DeformError::DegenerateFace { face: 0 });
    }

    #[test]
    fn test_non_manifold_edge_rejected() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ];
        let faces = vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]];
        let err = MeshTopology::from_triangles(positions, faces).unwrap_err();
        assert_eq!(err, DeformError::NonManifoldEdge { v0: 0, v1: 1 });
    }

    #[test]
    fn test_face_area() {
        let mesh = two_triangles();
        let area = mesh.face_area(mesh.positions(), 0);
        assert!((area - 0.5).abs() < 1e-12);
        assert!(mesh.face_area_vector(mesh.positions(), 0).z > 0.0);
    }
}
