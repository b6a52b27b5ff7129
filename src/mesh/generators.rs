//! Procedural mesh generators for benchmarks, tests and the CLI.
//!
//! Generators are deterministic and produce counter-clockwise winding.

use std::f64::consts::PI;

use nalgebra::Point3;

use super::topology::MeshTopology;
use crate::error::{DeformError, Result};

/// Generate a flat grid of `cols × rows` quads in the XY plane, two triangles per quad.
///
/// Vertex `(i, j)` sits at `(i * spacing, j * spacing, 0)` with index
/// `j * (cols + 1) + i`, so vertex 0 and the last vertex are opposite corners.
///
/// # Example
///
/// ```
/// use ductile::mesh::generators::grid;
///
/// let mesh = grid(2, 2, 1.0).unwrap();
/// assert_eq!(mesh.num_vertices(), 9);
/// assert_eq!(mesh.num_faces(), 8);
/// ```
pub fn grid(cols: usize, rows: usize, spacing: f64) -> Result<MeshTopology> {
    if cols == 0 || rows == 0 {
        return Err(DeformError::invalid_param(
            "grid size",
            format!("{}x{}", cols, rows),
            "must have at least one quad in each direction",
        ));
    }

    let mut vertices = Vec::with_capacity((cols + 1) * (rows + 1));
    for j in 0..=rows {
        for i in 0..=cols {
            vertices.push(Point3::new(i as f64 * spacing, j as f64 * spacing, 0.0));
        }
    }

    let mut faces = Vec::with_capacity(cols * rows * 2);
    for j in 0..rows {
        for i in 0..cols {
            let v00 = j * (cols + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (cols + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    MeshTopology::from_triangles(vertices, faces)
}

/// Generate an open cylinder (tube) around the Z axis.
///
/// Ring `k` (of `height_segments + 1`) sits at `z = k * height / height_segments`
/// and holds `radial_segments` vertices; ring 0 starts at index 0.
pub fn cylinder(
    radial_segments: usize,
    height_segments: usize,
    radius: f64,
    height: f64,
) -> Result<MeshTopology> {
    if radial_segments < 3 {
        return Err(DeformError::invalid_param(
            "radial_segments",
            radial_segments,
            "must be at least 3",
        ));
    }
    if height_segments == 0 {
        return Err(DeformError::invalid_param(
            "height_segments",
            height_segments,
            "must be at least 1",
        ));
    }

    let mut vertices = Vec::with_capacity(radial_segments * (height_segments + 1));
    for k in 0..=height_segments {
        let z = height * k as f64 / height_segments as f64;
        for s in 0..radial_segments {
            let theta = 2.0 * PI * s as f64 / radial_segments as f64;
            vertices.push(Point3::new(radius * theta.cos(), radius * theta.sin(), z));
        }
    }

    let mut faces = Vec::with_capacity(radial_segments * height_segments * 2);
    for k in 0..height_segments {
        for s in 0..radial_segments {
            let a = k * radial_segments + s;
            let b = k * radial_segments + (s + 1) % radial_segments;
            let c = a + radial_segments;
            let d = b + radial_segments;

            faces.push([a, b, d]);
            faces.push([a, d, c]);
        }
    }

    MeshTopology::from_triangles(vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_counts() {
        let mesh = grid(3, 2, 0.5).unwrap();
        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.num_faces(), 12);
        // Interior vertex of a diagonal-split grid has valence 6
        assert_eq!(mesh.degree(5), 6);
        assert_eq!(*mesh.position(11), Point3::new(1.5, 1.0, 0.0));
    }

    #[test]
    fn test_grid_winding_is_ccw() {
        let mesh = grid(2, 2, 1.0).unwrap();
        for f in 0..mesh.num_faces() {
            assert!(mesh.face_area_vector(mesh.positions(), f).z > 0.0);
        }
    }

    #[test]
    fn test_grid_rejects_empty() {
        assert!(grid(0, 3, 1.0).is_err());
    }

    #[test]
    fn test_cylinder() {
        let mesh = cylinder(8, 3, 1.0, 2.0).unwrap();
        assert_eq!(mesh.num_vertices(), 32);
        assert_eq!(mesh.num_faces(), 48);
        // Middle rings are closed around the axis: no boundary edges
        assert!(!mesh.is_boundary_vertex(8));
        assert!(mesh.is_boundary_vertex(0));
    }
}
