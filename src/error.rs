//! Error types for ductile.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias using [`DeformError`].
pub type Result<T> = std::result::Result<T, DeformError>;

/// Errors that can occur while building a mesh or deforming it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeformError {
    /// The mesh has no vertices.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices (degenerate triangle).
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// An edge has more than two incident faces.
    #[error("edge ({v0}, {v1}) has more than two incident faces")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// A constraint operation referenced a vertex outside the mesh.
    #[error("vertex {vertex} is out of range (mesh has {count} vertices)")]
    VertexOutOfRange {
        /// The offending vertex index.
        vertex: usize,
        /// Number of vertices in the mesh.
        count: usize,
    },

    /// The system matrix was requested without any constrained vertex.
    ///
    /// The unconstrained Laplacian has a constant null space and cannot be
    /// factorized.
    #[error("no constrained vertices: the unconstrained Laplacian is singular")]
    NoConstraints,

    /// Cholesky factorization of the constrained Laplacian failed.
    #[error("factorization failed: {0}")]
    Factorization(String),

    /// The position buffer passed to the engine has the wrong length.
    #[error("position buffer has {actual} entries, mesh has {expected} vertices")]
    PositionCountMismatch {
        /// Number of vertices in the rest mesh.
        expected: usize,
        /// Length of the buffer that was supplied.
        actual: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl DeformError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        DeformError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Whether this error is a harmless index race from the interaction layer.
    ///
    /// Callers driving constraints from user input usually ignore these.
    pub fn is_index_error(&self) -> bool {
        matches!(self, DeformError::VertexOutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DeformError::VertexOutOfRange { vertex: 12, count: 9 };
        assert_eq!(
            err.to_string(),
            "vertex 12 is out of range (mesh has 9 vertices)"
        );

        let err = DeformError::invalid_param("degenerate_epsilon", -1.0, "must be non-negative");
        assert_eq!(
            err.to_string(),
            "invalid parameter: degenerate_epsilon = -1 (must be non-negative)"
        );
    }

    #[test]
    fn test_index_error_classification() {
        assert!(DeformError::VertexOutOfRange { vertex: 3, count: 2 }.is_index_error());
        assert!(!DeformError::NoConstraints.is_index_error());
        assert!(!DeformError::Factorization("not positive definite".into()).is_index_error());
    }
}
