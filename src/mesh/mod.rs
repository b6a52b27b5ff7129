//! Rest-pose mesh representation.
//!
//! The deformation engine consumes a [`MeshTopology`]: vertex positions,
//! triangles and the one-ring of every vertex stored in CSR layout. Rather
//! than a pointer-linked half-edge structure, all adjacency is expressed as
//! flat index arrays, which keeps the topology trivially shareable and free of
//! cycles.
//!
//! ```
//! use ductile::mesh::MeshTopology;
//! use nalgebra::Point3;
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, -1.0, 0.0),
//! ];
//! let mesh = MeshTopology::from_triangles(positions, vec![[0, 1, 2], [1, 0, 3]]).unwrap();
//!
//! for v in 0..mesh.num_vertices() {
//!     println!("vertex {} has {} neighbors", v, mesh.degree(v));
//! }
//! ```

pub mod generators;
mod topology;

pub use topology::{MeshTopology, Opposites};
