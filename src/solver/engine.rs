//! As-Rigid-As-Possible (ARAP) surface deformation engine.
//!
//! [`ArapEngine`] owns the rest mesh, its cotangent weights and Laplacian, the
//! constraint set and a cached factorization of the constrained system. A
//! host calls [`ArapEngine::step`] once per frame with the live position
//! buffer; the engine refactorizes only when constraint membership changed.
//!
//! Each iteration alternates between:
//! 1. **Local step**: best-fit rotation of every vertex fan
//! 2. **Global step**: one back-substitution for all three coordinates
//!
//! With warm start the first local step fits rotations to the positions the
//! previous frame left behind. A cold start resets rotations to identity and
//! skips that first local step, so the first global solve of every frame is
//! the linear (rotation-free) one.
//!
//! # References
//!
//! - Sorkine, O., & Alexa, M. (2007).
//!   "As-Rigid-As-Possible Surface Modeling." SGP 2007.
//!
//! # Example
//!
//! ```
//! use ductile::prelude::*;
//! use nalgebra::{Point3, Vector3};
//!
//! let mesh = grid(4, 4, 0.25).unwrap();
//! let mut positions = mesh.positions().to_vec();
//! let mut engine = ArapEngine::new(mesh, ArapOptions::default()).unwrap();
//!
//! engine.toggle_constraint(0, &positions).unwrap();
//! engine.toggle_constraint(24, &positions).unwrap();
//! engine.update_constraint(24, positions[24] + Vector3::new(0.2, 0.0, 0.3)).unwrap();
//!
//! let report = engine.step(&mut positions, 4).unwrap();
//! assert_eq!(report.iterations, 4);
//! assert!((positions[24] - Point3::new(1.2, 1.0, 0.3)).norm() < 1e-9);
//! ```

use nalgebra::{Matrix3, Point3, Vector3};
use tracing::{debug, info, trace};

use super::constraints::{ConstraintKind, ConstraintStore};
use super::laplacian::build_laplacian;
use super::position::PositionSolver;
use super::progress::{Progress, StepPhase};
use super::rotation::fit_rotations;
use super::sparse::CsrMatrix;
use super::system::SystemMatrix;
use super::weights::{compute_fan_weights, FanWeightTable};
use crate::error::{DeformError, Result};
use crate::mesh::MeshTopology;

/// Options for the deformation engine.
#[derive(Debug, Clone)]
pub struct ArapOptions {
    /// Whether to fit rotations and assemble the right-hand side in parallel (default: true).
    pub parallel: bool,

    /// Fit the first iteration's rotations to the live positions instead of using identity (default: true).
    pub warm_start: bool,

    /// Evaluate the deformation energy at the end of every step (default: false).
    pub track_energy: bool,

    /// Sine threshold below which an angle is treated as degenerate (default: 1e-12).
    pub degenerate_epsilon: f64,
}

impl Default for ArapOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            warm_start: true,
            track_energy: false,
            degenerate_epsilon: 1e-12,
        }
    }
}

impl ArapOptions {
    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set whether the first iteration of a step fits rotations or uses identity.
    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    /// Set whether each step reports its final energy.
    pub fn with_energy_tracking(mut self, track: bool) -> Self {
        self.track_energy = track;
        self
    }

    /// Set the degenerate-angle threshold.
    pub fn with_degenerate_epsilon(mut self, epsilon: f64) -> Self {
        self.degenerate_epsilon = epsilon;
        self
    }

    /// Check option values.
    pub fn validate(&self) -> Result<()> {
        if !self.degenerate_epsilon.is_finite() || self.degenerate_epsilon < 0.0 {
            return Err(DeformError::invalid_param(
                "degenerate_epsilon",
                self.degenerate_epsilon,
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Outcome of one call to [`ArapEngine::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Local/global iterations performed.
    pub iterations: usize,
    /// Whether the system was refactorized during this step.
    pub refactorized: bool,
    /// Number of active constraints.
    pub constraints: usize,
    /// Whether the step did nothing because no vertex is constrained.
    pub skipped: bool,
    /// Deformation energy after the step, when tracking is enabled.
    pub energy: Option<f64>,
}

impl StepReport {
    fn skipped() -> Self {
        Self {
            iterations: 0,
            refactorized: false,
            constraints: 0,
            skipped: true,
            energy: None,
        }
    }
}

/// Interactive ARAP deformer for a fixed rest mesh.
#[derive(Debug)]
pub struct ArapEngine {
    topology: MeshTopology,
    options: ArapOptions,
    weights: FanWeightTable,
    system: SystemMatrix,
    constraints: ConstraintStore,
    rotations: Vec<Matrix3<f64>>,
    positions: PositionSolver,
}

impl ArapEngine {
    /// Create an engine for a rest mesh.
    ///
    /// Computes cotangent weights and the rest Laplacian. No factorization
    /// happens until the first step with constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh has no vertices or the options are invalid.
    pub fn new(topology: MeshTopology, options: ArapOptions) -> Result<Self> {
        options.validate()?;

        let n = topology.num_vertices();
        if n == 0 {
            return Err(DeformError::EmptyMesh);
        }

        let weights = compute_fan_weights(&topology, options.degenerate_epsilon);
        let system = SystemMatrix::new(build_laplacian(&weights));

        info!(
            vertices = n,
            faces = topology.num_faces(),
            edges = topology.num_edges(),
            nnz = system.rest().nnz(),
            "ARAP engine ready"
        );

        Ok(Self {
            positions: PositionSolver::new(n).with_parallel(options.parallel),
            topology,
            options,
            weights,
            system,
            constraints: ConstraintStore::new(n),
            rotations: vec![Matrix3::identity(); n],
        })
    }

    /// Create an engine with initial handles and factorize for them.
    ///
    /// Each `(vertex, target)` pair becomes a handle; a repeated vertex keeps
    /// its last target.
    ///
    /// # Errors
    ///
    /// Returns an error if a vertex is out of range or the constrained system
    /// cannot be factorized.
    pub fn with_constraints(
        topology: MeshTopology,
        options: ArapOptions,
        constraints: &[(usize, Point3<f64>)],
    ) -> Result<Self> {
        let mut engine = Self::new(topology, options)?;

        for &(vertex, target) in constraints {
            if !engine.constraints.update(vertex, target)? {
                engine.constraints.toggle(vertex, target)?;
            }
        }

        if !engine.constraints.is_empty() {
            engine.system.rebuild(&engine.constraints)?;
            engine.constraints.mark_clean();
        }
        Ok(engine)
    }

    /// The rest mesh.
    #[inline]
    pub fn topology(&self) -> &MeshTopology {
        &self.topology
    }

    /// The engine options.
    #[inline]
    pub fn options(&self) -> &ArapOptions {
        &self.options
    }

    /// Cotangent weights of the rest mesh.
    #[inline]
    pub fn fan_weights(&self) -> &FanWeightTable {
        &self.weights
    }

    /// The rest Laplacian.
    #[inline]
    pub fn laplacian(&self) -> &CsrMatrix {
        self.system.rest()
    }

    /// Current constraint set.
    #[inline]
    pub fn constraints(&self) -> &ConstraintStore {
        &self.constraints
    }

    /// Per-vertex rotations used by the last global step.
    #[inline]
    pub fn rotations(&self) -> &[Matrix3<f64>] {
        &self.rotations
    }

    /// Number of factorizations performed so far.
    #[inline]
    pub fn rebuild_count(&self) -> usize {
        self.system.rebuild_count()
    }

    /// Add or remove a handle at `vertex`, targeting its live position.
    ///
    /// Returns whether the vertex is constrained afterwards. An out-of-range
    /// vertex leaves the constraint set unchanged.
    pub fn toggle_constraint(&mut self, vertex: usize, positions: &[Point3<f64>]) -> Result<bool> {
        let current = self.live_position(vertex, positions)?;
        self.constraints.toggle(vertex, current)
    }

    /// Step a vertex through free → handle → anchor → free.
    pub fn cycle_constraint(
        &mut self,
        vertex: usize,
        positions: &[Point3<f64>],
    ) -> Result<Option<ConstraintKind>> {
        let current = self.live_position(vertex, positions)?;
        self.constraints.cycle(vertex, current)
    }

    /// Move the target of a constrained vertex.
    ///
    /// Returns `false` if the vertex is not constrained. Never triggers a
    /// refactorization.
    pub fn update_constraint(&mut self, vertex: usize, target: Point3<f64>) -> Result<bool> {
        self.constraints.update(vertex, target)
    }

    /// Drag every handle by `offset`; anchors stay put.
    pub fn translate_handles(&mut self, offset: Vector3<f64>) -> usize {
        self.constraints.translate_handles(offset)
    }

    /// Release every constraint.
    pub fn clear_constraints(&mut self) {
        self.constraints.clear();
    }

    /// Run `iterations` local/global iterations on `positions`.
    ///
    /// `positions` must hold one entry per rest vertex and is overwritten with
    /// the deformed positions. Without constraints the step is skipped and
    /// `positions` is left untouched.
    ///
    /// # Errors
    ///
    /// - [`DeformError::PositionCountMismatch`] if `positions` has the wrong length
    /// - [`DeformError::Factorization`] if the constrained system is not positive definite
    pub fn step(&mut self, positions: &mut [Point3<f64>], iterations: usize) -> Result<StepReport> {
        self.step_with_progress(positions, iterations, &Progress::none())
    }

    /// Like [`step`](Self::step), announcing every phase to `progress`.
    pub fn step_with_progress(
        &mut self,
        positions: &mut [Point3<f64>],
        iterations: usize,
        progress: &Progress,
    ) -> Result<StepReport> {
        self.check_positions(positions)?;

        if self.constraints.is_empty() {
            debug!("no constraints, skipping step");
            self.system.discard();
            return Ok(StepReport::skipped());
        }

        let refactorized = self.constraints.is_membership_dirty();
        if refactorized {
            debug!(constraints = self.constraints.len(), "constraint membership changed");
            self.system.rebuild(&self.constraints)?;
            self.constraints.mark_clean();
        }

        let cold = !self.options.warm_start;
        if cold {
            trace!("cold start, first global step uses identity rotations");
            self.rotations.iter_mut().for_each(|r| *r = Matrix3::identity());
        }

        let rest = self.topology.positions();
        for iteration in 0..iterations {
            if iteration > 0 || !cold {
                progress.report(iteration, iterations, StepPhase::FittingRotations);
                fit_rotations(
                    &self.weights,
                    rest,
                    positions,
                    &mut self.rotations,
                    self.options.parallel,
                );
            }

            progress.report(iteration, iterations, StepPhase::SolvingPositions);
            let solved = self.positions.solve(
                &self.system,
                &self.weights,
                rest,
                &self.rotations,
                &self.constraints,
                positions,
            )?;
            positions.copy_from_slice(&solved);

            trace!(iteration, "local/global iteration done");
        }
        progress.finish(iterations);

        let energy = if self.options.track_energy {
            Some(self.energy(positions)?)
        } else {
            None
        };

        Ok(StepReport {
            iterations,
            refactorized,
            constraints: self.constraints.len(),
            skipped: false,
            energy,
        })
    }

    /// ARAP energy of `positions` against the rest mesh.
    ///
    /// Rotations are fitted fresh for `positions`, so this is the energy
    /// minimized over rotations:
    /// `Σ_v Σ_u w(v,u) ‖(p_v − p_u) − R_v (p0_v − p0_u)‖²`.
    pub fn energy(&self, positions: &[Point3<f64>]) -> Result<f64> {
        self.check_positions(positions)?;

        let rest = self.topology.positions();
        let mut rotations = vec![Matrix3::identity(); rest.len()];
        fit_rotations(&self.weights, rest, positions, &mut rotations, self.options.parallel);

        let energy = (0..rest.len())
            .map(|v| {
                self.weights
                    .fan(v)
                    .iter()
                    .map(|entry| {
                        let u = entry.neighbor;
                        let residual =
                            (positions[v] - positions[u]) - rotations[v] * (rest[v] - rest[u]);
                        entry.weight * residual.norm_squared()
                    })
                    .sum::<f64>()
            })
            .sum();
        Ok(energy)
    }

    fn check_positions(&self, positions: &[Point3<f64>]) -> Result<()> {
        let expected = self.topology.num_vertices();
        if positions.len() != expected {
            return Err(DeformError::PositionCountMismatch {
                expected,
                actual: positions.len(),
            });
        }
        Ok(())
    }

    fn live_position(&self, vertex: usize, positions: &[Point3<f64>]) -> Result<Point3<f64>> {
        self.check_positions(positions)?;
        positions.get(vertex).copied().ok_or(DeformError::VertexOutOfRange {
            vertex,
            count: self.topology.num_vertices(),
        })
    }
}
