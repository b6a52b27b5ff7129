//! Cotangent Laplacian assembly.

use super::sparse::CsrMatrix;
use super::weights::FanWeightTable;

/// Assemble the rest Laplacian from fan weights.
///
/// `L[v][v] = Σ w(v,u)` and `L[v][u] = -w(v,u)`. Every edge appears in both
/// fans, so the result is symmetric whenever the weights are.
pub fn build_laplacian(weights: &FanWeightTable) -> CsrMatrix {
    let n = weights.num_vertices();
    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(weights.entries().len() + n);

    for v in 0..n {
        let mut diagonal = 0.0;
        for entry in weights.fan(v) {
            triplets.push((v, entry.neighbor, -entry.weight));
            diagonal += entry.weight;
        }
        if !weights.fan(v).is_empty() {
            triplets.push((v, v, diagonal));
        }
    }

    CsrMatrix::from_triplets(n, n, triplets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generators::{cylinder, grid};
    use crate::mesh::MeshTopology;
    use crate::solver::weights::compute_fan_weights;
    use nalgebra::Point3;

    #[test]
    fn test_row_sums_vanish() {
        let mesh = cylinder(9, 5, 0.8, 3.0).unwrap();
        let laplacian = build_laplacian(&compute_fan_weights(&mesh, 1e-12));

        for v in 0..mesh.num_vertices() {
            assert!(laplacian.row_sum(v).abs() < 1e-12, "row {} sums to {}", v, laplacian.row_sum(v));
        }
    }

    #[test]
    fn test_symmetric_and_diagonally_dominant() {
        let mesh = grid(4, 3, 0.25).unwrap();
        let laplacian = build_laplacian(&compute_fan_weights(&mesh, 1e-12));

        assert!(laplacian.is_symmetric(0.0));
        for v in 0..mesh.num_vertices() {
            let off: f64 = laplacian.row(v).filter(|&(j, _)| j != v).map(|(_, w)| w.abs()).sum();
            assert!(laplacian.diagonal(v) >= off - 1e-12);
            assert!(laplacian.row(v).all(|(j, w)| j == v || w <= 0.0));
        }
    }

    #[test]
    fn test_grid_entries() {
        let mesh = grid(2, 2, 1.0).unwrap();
        let laplacian = build_laplacian(&compute_fan_weights(&mesh, 1e-12));

        // Centre vertex: four axis edges of weight 1, two zero-weight diagonals
        assert!((laplacian.diagonal(4) - 4.0).abs() < 1e-12);
        assert!((laplacian.get(4, 1) + 1.0).abs() < 1e-12);
        assert_eq!(laplacian.get(0, 8), 0.0);
    }

    #[test]
    fn test_isolated_vertex_row_is_empty() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
        ];
        let mesh = MeshTopology::from_triangles(positions, vec![[0, 1, 2]]).unwrap();
        let laplacian = build_laplacian(&compute_fan_weights(&mesh, 1e-12));

        assert_eq!(laplacian.nrows(), 4);
        assert_eq!(laplacian.row(3).count(), 0);
        assert_eq!(laplacian.diagonal(3), 0.0);
    }
}
