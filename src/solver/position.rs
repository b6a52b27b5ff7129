//! Global step: solve for positions given fixed rotations.
//!
//! The right-hand side for vertex `v` is
//!
//! ```text
//! b_v = Σ_u (w(v,u) / 2) · (R_v + R_u)(p0_v − p0_u)
//! ```
//!
//! Constrained columns were removed from the system matrix, so their known
//! values move to the right-hand side: `b_u -= L[u][c] · t_c` for every
//! neighbor `u` of a constraint `c` with target `t_c`. Pinned rows then take
//! their value directly: the target for constraints, the current position
//! for held vertices (no weighted neighbors, or no constraint anywhere in
//! their connected component).

use nalgebra::{Matrix3, Point3, Vector3};
use rayon::prelude::*;

use super::constraints::ConstraintStore;
use super::system::SystemMatrix;
use super::weights::FanWeightTable;
use crate::error::Result;

/// Right-hand side assembly and back-substitution.
#[derive(Debug, Clone, Default)]
pub struct PositionSolver {
    rhs: Vec<Vector3<f64>>,
    parallel: bool,
}

impl PositionSolver {
    /// Create a solver with scratch space for `num_vertices` rows.
    pub fn new(num_vertices: usize) -> Self {
        Self {
            rhs: vec![Vector3::zeros(); num_vertices],
            parallel: false,
        }
    }

    /// Set whether right-hand side assembly runs in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The right-hand side of the last assembly.
    #[inline]
    pub fn rhs(&self) -> &[Vector3<f64>] {
        &self.rhs
    }

    /// Assemble the rotation term of the right-hand side.
    pub fn assemble_rhs(
        &mut self,
        weights: &FanWeightTable,
        rest: &[Point3<f64>],
        rotations: &[Matrix3<f64>],
    ) {
        self.rhs.resize(weights.num_vertices(), Vector3::zeros());

        let assemble = |(v, b): (usize, &mut Vector3<f64>)| {
            *b = weights.fan(v).iter().fold(Vector3::zeros(), |acc, entry| {
                let u = entry.neighbor;
                let edge = rest[v] - rest[u];
                acc + (0.5 * entry.weight) * ((rotations[v] + rotations[u]) * edge)
            });
        };

        if self.parallel {
            self.rhs.par_iter_mut().enumerate().for_each(assemble);
        } else {
            self.rhs.iter_mut().enumerate().for_each(assemble);
        }
    }

    /// Move constraint targets to the right-hand side and fill pinned rows.
    pub fn apply_constraints(
        &mut self,
        system: &SystemMatrix,
        constraints: &ConstraintStore,
        current: &[Point3<f64>],
    ) {
        let rest = system.rest();

        for c in constraints.iter() {
            // L_rest is symmetric: row c holds L[u][c]
            for (u, value) in rest.row(c.vertex) {
                if u != c.vertex {
                    self.rhs[u] -= value * c.target.coords;
                }
            }
        }

        for (v, b) in self.rhs.iter_mut().enumerate() {
            if system.is_held(v) {
                *b = current[v].coords;
            }
        }
        for c in constraints.iter() {
            self.rhs[c.vertex] = c.target.coords;
        }
    }

    /// Run one global step and return the new positions.
    ///
    /// `system` must have been rebuilt for the membership of `constraints`.
    pub fn solve(
        &mut self,
        system: &SystemMatrix,
        weights: &FanWeightTable,
        rest: &[Point3<f64>],
        rotations: &[Matrix3<f64>],
        constraints: &ConstraintStore,
        current: &[Point3<f64>],
    ) -> Result<Vec<Point3<f64>>> {
        self.assemble_rhs(weights, rest, rotations);
        self.apply_constraints(system, constraints, current);
        system.solver().solve_points(&self.rhs)
    }
}
