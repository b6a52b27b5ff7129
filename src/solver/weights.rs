//! Cotangent edge weights.
//!
//! For an edge `(v, u)` with opposite vertices `o` in its incident triangles,
//! the weight is the cotangent of the angle at `o`, averaged over the two
//! triangles of an interior edge and taken as-is for a boundary edge.
//! Negative weights (obtuse opposite angles) are clamped to zero so that the
//! resulting Laplacian stays diagonally dominant.
//!
//! Weights are stored per directed edge in [`FanWeightTable`], laid out in the
//! same CSR order as the fans of [`MeshTopology`].

use nalgebra::Point3;
use tracing::debug;

use crate::mesh::MeshTopology;

/// One weighted neighbor in a vertex fan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanEntry {
    /// The neighboring vertex.
    pub neighbor: usize,
    /// Clamped cotangent weight of the edge.
    pub weight: f64,
}

/// Flattened per-vertex edge weights.
///
/// For vertex `v`, its weights occupy `entries[offsets[v]..offsets[v + 1]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FanWeightTable {
    offsets: Vec<usize>,
    entries: Vec<FanEntry>,
}

impl FanWeightTable {
    /// Number of vertices covered by the table.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.offsets.len() - 1
    }

    /// CSR offsets (length `num_vertices + 1`).
    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// All entries in CSR order.
    #[inline]
    pub fn entries(&self) -> &[FanEntry] {
        &self.entries
    }

    /// Weighted fan of a vertex, neighbors ascending.
    #[inline]
    pub fn fan(&self, v: usize) -> &[FanEntry] {
        &self.entries[self.offsets[v]..self.offsets[v + 1]]
    }

    /// Weight of the directed edge `(v, u)`, if the edge exists.
    pub fn weight(&self, v: usize, u: usize) -> Option<f64> {
        let fan = self.fan(v);
        fan.binary_search_by(|e| e.neighbor.cmp(&u))
            .ok()
            .map(|k| fan[k].weight)
    }

    /// Sum of the weights around a vertex (the Laplacian diagonal).
    pub fn weight_sum(&self, v: usize) -> f64 {
        self.fan(v).iter().map(|e| e.weight).sum()
    }
}

/// Compute cotangent weights for every directed edge of the mesh.
///
/// `epsilon` is the threshold below which an angle's sine (or an edge length)
/// is treated as degenerate; such angles contribute nothing.
pub fn compute_fan_weights(mesh: &MeshTopology, epsilon: f64) -> FanWeightTable {
    let positions = mesh.positions();
    let mut entries = Vec::with_capacity(mesh.fan_offsets().last().copied().unwrap_or(0));
    let mut clamped = 0usize;

    for v in 0..mesh.num_vertices() {
        for e in mesh.fan_range(v) {
            let u = mesh.fan_neighbor(e);
            let opposites = mesh.fan_opposites(e);

            let sum: f64 = opposites
                .iter()
                .map(|o| cotangent_at(&positions[o], &positions[v], &positions[u], epsilon))
                .sum();

            let weight = if opposites.count() == 2 { 0.5 * sum } else { sum };
            if weight < 0.0 {
                clamped += 1;
            }

            entries.push(FanEntry {
                neighbor: u,
                weight: weight.max(0.0),
            });
        }
    }

    if clamped > 0 {
        // Each undirected edge is visited twice
        debug!(edges = clamped / 2, "clamped negative cotangent weights to zero");
    }

    FanWeightTable {
        offsets: mesh.fan_offsets().to_vec(),
        entries,
    }
}

/// Cotangent of the angle at `o` subtended by `a` and `b`.
fn cotangent_at(o: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>, epsilon: f64) -> f64 {
    let oa = a - o;
    let ob = b - o;

    let (la, lb) = (oa.norm(), ob.norm());
    if la < epsilon || lb < epsilon {
        return 0.0;
    }

    let da = oa / la;
    let db = ob / lb;
    let sin = da.cross(&db).norm();
    if sin < epsilon {
        0.0
    } else {
        da.dot(&db) / sin
    }
}
