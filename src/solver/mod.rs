//! ARAP deformation solver.
//!
//! This module contains the pieces of the local/global solver, leaf to root:
//!
//! - **Weights**: cotangent weight per directed edge
//! - **Laplacian**: rest Laplacian assembly into a sparse matrix
//! - **Constraints**: handles and anchors driven by the host
//! - **System**: constrained Laplacian and its cached Cholesky factor
//! - **Rotation**: per-vertex weighted Procrustes (local step)
//! - **Position**: right-hand side and back-substitution (global step)
//! - **Engine**: orchestration across frames
//!
//! Most callers only need [`ArapEngine`].

pub mod constraints;
pub mod engine;
pub mod laplacian;
pub mod position;
pub mod progress;
pub mod rotation;
pub mod sparse;
pub mod system;
pub mod weights;

pub use constraints::{Constraint, ConstraintKind, ConstraintStore};
pub use engine::{ArapEngine, ArapOptions, StepReport};
pub use progress::{Progress, StepPhase};
pub use sparse::{CholeskySolver, CsrMatrix};
pub use weights::{FanEntry, FanWeightTable};
