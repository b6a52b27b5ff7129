//! Local step: per-vertex best-fit rotations.
//!
//! For each vertex `v` the weighted covariance of its fan is
//!
//! ```text
//! S_v = Σ_u w(v,u) · (p0_v − p0_u)(p_v − p_u)ᵀ
//! ```
//!
//! and the rotation minimizing `Σ_u w(v,u) ‖(p_v − p_u) − R (p0_v − p0_u)‖²`
//! is `R_v = V Uᵀ` from the SVD `S_v = U Σ Vᵀ`. When that product is a
//! reflection, the column of `V` belonging to the smallest singular value is
//! negated.

use nalgebra::{Matrix3, Point3};
use rayon::prelude::*;

use super::weights::FanWeightTable;

/// Weighted covariance of a vertex fan between rest and current positions.
pub fn fan_covariance(
    v: usize,
    weights: &FanWeightTable,
    rest: &[Point3<f64>],
    current: &[Point3<f64>],
) -> Matrix3<f64> {
    weights.fan(v).iter().fold(Matrix3::zeros(), |acc, entry| {
        let u = entry.neighbor;
        let e_rest = rest[v] - rest[u];
        let e_current = current[v] - current[u];
        acc + entry.weight * e_rest * e_current.transpose()
    })
}

/// Closest proper rotation to a covariance matrix.
///
/// Returns the identity for a zero (or non-finite) covariance, which is what
/// an empty or fully degenerate fan produces.
pub fn best_fit_rotation(covariance: &Matrix3<f64>) -> Matrix3<f64> {
    if covariance.iter().all(|x| *x == 0.0) || !covariance.iter().all(|x| x.is_finite()) {
        return Matrix3::identity();
    }

    let svd = covariance.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Matrix3::identity();
    };

    let mut v = v_t.transpose();
    let rotation = v * u.transpose();
    if rotation.determinant() >= 0.0 {
        return rotation;
    }

    // Singular values are not guaranteed to be sorted
    let smallest = svd.singular_values.imin();
    v.column_mut(smallest).neg_mut();
    v * u.transpose()
}

/// Fit the rotation of every vertex, writing into `rotations`.
///
/// `rotations` must have one entry per vertex of the weight table.
pub fn fit_rotations(
    weights: &FanWeightTable,
    rest: &[Point3<f64>],
    current: &[Point3<f64>],
    rotations: &mut [Matrix3<f64>],
    parallel: bool,
) {
    debug_assert_eq!(rotations.len(), weights.num_vertices());

    let fit = |(v, rotation): (usize, &mut Matrix3<f64>)| {
        *rotation = best_fit_rotation(&fan_covariance(v, weights, rest, current));
    };

    if parallel {
        rotations.par_iter_mut().enumerate().for_each(fit);
    } else {
        rotations.iter_mut().enumerate().for_each(fit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generators::{cylinder, grid};
    use crate::solver::weights::compute_fan_weights;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector3};

    fn assert_proper_rotation(r: &Matrix3<f64>) {
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_recovers_rigid_rotation() {
        let mesh = cylinder(8, 3, 1.0, 2.0).unwrap();
        let weights = compute_fan_weights(&mesh, 1e-12);
        let rest = mesh.positions().to_vec();

        let rigid = Rotation3::from_axis_angle(&Vector3::x_axis(), 0.6)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), -1.1);
        let shift = Vector3::new(3.0, -1.0, 0.5);
        let current: Vec<Point3<f64>> = rest.iter().map(|p| rigid * p + shift).collect();

        for parallel in [false, true] {
            let mut rotations = vec![Matrix3::zeros(); mesh.num_vertices()];
            fit_rotations(&weights, &rest, &current, &mut rotations, parallel);
            for r in &rotations {
                assert_relative_eq!(*r, *rigid.matrix(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_identity_at_rest() {
        let mesh = grid(3, 3, 0.5).unwrap();
        let weights = compute_fan_weights(&mesh, 1e-12);
        let rest = mesh.positions().to_vec();

        let mut rotations = vec![Matrix3::zeros(); mesh.num_vertices()];
        fit_rotations(&weights, &rest, &rest, &mut rotations, true);
        for r in &rotations {
            assert_proper_rotation(r);
            assert_relative_eq!(*r * Vector3::x(), Vector3::x(), epsilon = 1e-9);
            assert_relative_eq!(*r * Vector3::y(), Vector3::y(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reflection_is_corrected() {
        let covariance = Matrix3::from_diagonal(&Vector3::new(3.0, 2.0, -1.0));
        let r = best_fit_rotation(&covariance);
        assert_proper_rotation(&r);
        assert_relative_eq!(r, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_mirrored_fan_yields_rotation() {
        let mesh = cylinder(6, 2, 1.0, 1.0).unwrap();
        let weights = compute_fan_weights(&mesh, 1e-12);
        let rest = mesh.positions().to_vec();
        let mirrored: Vec<Point3<f64>> = rest.iter().map(|p| Point3::new(p.x, p.y, -p.z)).collect();

        let mut rotations = vec![Matrix3::zeros(); mesh.num_vertices()];
        fit_rotations(&weights, &rest, &mirrored, &mut rotations, false);
        for r in &rotations {
            assert_proper_rotation(r);
        }
    }

    #[test]
    fn test_empty_fan_is_identity() {
        assert_eq!(best_fit_rotation(&Matrix3::zeros()), Matrix3::identity());

        let mut bad = Matrix3::identity();
        bad[(0, 1)] = f64::NAN;
        assert_eq!(best_fit_rotation(&bad), Matrix3::identity());
    }
}
