//! # Ductile
//!
//! Interactive As-Rigid-As-Possible (ARAP) surface deformation.
//!
//! Ductile deforms a triangle mesh so that user-pinned vertices reach their
//! targets while every vertex neighborhood stays as close to a rigid motion of
//! its rest shape as possible. It is built for interactive use: the sparse
//! system is factorized once per change of the pinned set and reused for every
//! frame in between.
//!
//! ## Features
//!
//! - **Flat topology**: CSR one-ring fans over plain vertex indices
//! - **Cotangent Laplacian**: clamped, symmetric, built once per mesh
//! - **Cached Cholesky**: sparse LLᵀ via faer, multi-column solves
//! - **Parallel local step**: per-vertex Procrustes fitted with rayon
//! - **Handles and anchors**: drag handles as a group, keep anchors fixed
//!
//! ## Quick Start
//!
//! ```
//! use ductile::prelude::*;
//! use nalgebra::{Point3, Vector3};
//!
//! // A flat 2x2 grid: vertex 0 and vertex 8 are opposite corners
//! let mesh = grid(2, 2, 1.0).unwrap();
//! let mut positions = mesh.positions().to_vec();
//!
//! let mut engine = ArapEngine::new(mesh, ArapOptions::default()).unwrap();
//! engine.toggle_constraint(0, &positions).unwrap();
//! engine.toggle_constraint(8, &positions).unwrap();
//!
//! // Drag the far corner
//! engine.update_constraint(8, Point3::new(3.0, 2.0, 0.0)).unwrap();
//! let report = engine.step(&mut positions, 5).unwrap();
//!
//! assert!(report.refactorized);
//! assert!((positions[8] - Point3::new(3.0, 2.0, 0.0)).norm() < 1e-9);
//!
//! // Moving a handle again reuses the factorization
//! engine.translate_handles(Vector3::new(0.0, 0.0, 0.5));
//! let report = engine.step(&mut positions, 5).unwrap();
//! assert!(!report.refactorized);
//! assert_eq!(engine.rebuild_count(), 1);
//! ```
//!
//! ## Building Meshes
//!
//! ```
//! use ductile::prelude::*;
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//! let triangles = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
//!
//! let mesh = MeshTopology::from_triangles(positions, triangles).unwrap();
//! assert_eq!(mesh.num_edges(), 6);
//! assert!(!mesh.is_boundary_vertex(0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod mesh;
pub mod solver;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use ductile::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{DeformError, Result};
    pub use crate::mesh::generators::{cylinder, grid};
    pub use crate::mesh::MeshTopology;
    pub use crate::solver::{
        ArapEngine, ArapOptions, ConstraintKind, ConstraintStore, Progress, StepPhase,
        StepReport,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
