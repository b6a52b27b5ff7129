//! The global system matrix and its cached factorization.
//!
//! `L_active` is the rest Laplacian with a Dirichlet condition applied for
//! every constrained vertex: its row and column are zeroed and the diagonal
//! set to one. Rows whose rest diagonal is zero (isolated vertices, or fans
//! whose weights all clamped to zero) receive the same treatment so the
//! matrix stays positive definite; the position solver holds such vertices in
//! place.
//!
//! A connected component of the weighted graph with no constraint in it has a
//! singular block. Its rows are held in place too, so a pin on one piece of a
//! multi-piece mesh leaves the other pieces where they are.
//!
//! The factorization depends only on which vertices are constrained, never on
//! where they are pinned, so it is rebuilt once per membership change.

use tracing::{debug, info, warn};

use super::constraints::ConstraintStore;
use super::sparse::{CholeskySolver, CsrMatrix};
use crate::error::{DeformError, Result};

/// Rest Laplacian, constrained Laplacian and Cholesky factor.
#[derive(Debug)]
pub struct SystemMatrix {
    l_rest: CsrMatrix,
    l_active: Option<CsrMatrix>,
    solver: CholeskySolver,
    /// Vertices whose rest row carries no weight.
    degenerate: Vec<bool>,
    /// Connected component of every vertex over positive-weight edges.
    component: Vec<usize>,
    num_components: usize,
    /// Vertices constrained in the current factorization.
    constrained: Vec<bool>,
    /// Unconstrained vertices whose component has no constraint.
    held: Vec<bool>,
    rebuild_count: usize,
}

impl SystemMatrix {
    /// Wrap a rest Laplacian. No factorization happens until [`rebuild`](Self::rebuild).
    pub fn new(l_rest: CsrMatrix) -> Self {
        let n = l_rest.nrows();
        let degenerate: Vec<bool> = (0..n).map(|v| l_rest.diagonal(v) <= 0.0).collect();

        let count = degenerate.iter().filter(|&&d| d).count();
        if count > 0 {
            warn!(vertices = count, "vertices without weighted neighbors are held in place");
        }

        let (component, num_components) = label_components(&l_rest);
        debug!(components = num_components, "labeled weighted components");

        Self {
            l_rest,
            l_active: None,
            solver: CholeskySolver::new(),
            degenerate,
            component,
            num_components,
            constrained: vec![false; n],
            held: vec![false; n],
            rebuild_count: 0,
        }
    }

    /// The unconstrained rest Laplacian.
    #[inline]
    pub fn rest(&self) -> &CsrMatrix {
        &self.l_rest
    }

    /// The constrained Laplacian of the current factorization.
    #[inline]
    pub fn active(&self) -> Option<&CsrMatrix> {
        self.l_active.as_ref()
    }

    /// Dimension of the system.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.l_rest.nrows()
    }

    /// Whether a factorization is ready for solving.
    #[inline]
    pub fn is_factorized(&self) -> bool {
        self.solver.is_factorized()
    }

    /// Number of successful rebuilds so far.
    #[inline]
    pub fn rebuild_count(&self) -> usize {
        self.rebuild_count
    }

    /// Whether a vertex's rest row is empty (held in place by the solver).
    #[inline]
    pub fn is_degenerate(&self, v: usize) -> bool {
        self.degenerate[v]
    }

    /// Whether a vertex was constrained when the system was last rebuilt.
    #[inline]
    pub fn is_constrained(&self, v: usize) -> bool {
        self.constrained[v]
    }

    /// Whether the solver keeps a vertex at its current position.
    ///
    /// True for unconstrained vertices whose component had no constraint at
    /// the last rebuild, which includes every unconstrained degenerate vertex.
    #[inline]
    pub fn is_held(&self, v: usize) -> bool {
        self.held[v]
    }

    /// Component label of a vertex, in `0..num_components()`.
    #[inline]
    pub fn component(&self, v: usize) -> usize {
        self.component[v]
    }

    /// Number of connected components over positive-weight edges.
    #[inline]
    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// The factorized solver.
    #[inline]
    pub(crate) fn solver(&self) -> &CholeskySolver {
        &self.solver
    }

    /// Apply Dirichlet conditions for the given constraints and refactorize.
    ///
    /// # Errors
    ///
    /// - [`DeformError::NoConstraints`] if `constraints` is empty; the
    ///   previous factorization is discarded.
    /// - [`DeformError::Factorization`] if the constrained matrix is not
    ///   positive definite.
    pub fn rebuild(&mut self, constraints: &ConstraintStore) -> Result<()> {
        self.discard();

        if constraints.is_empty() {
            return Err(DeformError::NoConstraints);
        }

        let mut pinned = vec![false; self.num_components];
        for c in constraints.iter() {
            self.constrained[c.vertex] = true;
            pinned[self.component[c.vertex]] = true;
        }

        let mut held_count = 0;
        for (v, held) in self.held.iter_mut().enumerate() {
            *held = !self.constrained[v] && !pinned[self.component[v]];
            if *held && !self.degenerate[v] {
                held_count += 1;
            }
        }
        if held_count > 0 {
            warn!(
                vertices = held_count,
                "vertices in components without a constraint are held in place"
            );
        }

        let n = self.dimension();
        let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(self.l_rest.nnz());
        for i in 0..n {
            if self.is_pinned_row(i) {
                triplets.push((i, i, 1.0));
                continue;
            }
            for (j, value) in self.l_rest.row(i) {
                if !self.is_pinned_row(j) {
                    triplets.push((i, j, value));
                }
            }
        }
        let l_active = CsrMatrix::from_triplets(n, n, triplets);

        debug!(
            constraints = constraints.len(),
            nnz = l_active.nnz(),
            "factorizing constrained Laplacian"
        );
        self.solver.factorize(&l_active)?;
        self.l_active = Some(l_active);
        self.rebuild_count += 1;

        info!(
            vertices = n,
            constraints = constraints.len(),
            rebuilds = self.rebuild_count,
            "system matrix factorized"
        );
        Ok(())
    }

    /// Drop the factorization and constrained matrix.
    pub fn discard(&mut self) {
        self.solver.reset();
        self.l_active = None;
        self.constrained.iter_mut().for_each(|c| *c = false);
        self.held.iter_mut().for_each(|h| *h = false);
    }

    /// Rows replaced by an identity row: constrained, degenerate or held.
    #[inline]
    fn is_pinned_row(&self, v: usize) -> bool {
        self.constrained[v] || self.degenerate[v] || self.held[v]
    }
}

/// Label connected components over the negative off-diagonals of `l`.
///
/// Returns the label of every row and the number of components. Labels are
/// dense and follow the order of each component's lowest row.
fn label_components(l: &CsrMatrix) -> (Vec<usize>, usize) {
    let n = l.nrows();
    let mut parent: Vec<usize> = (0..n).collect();

    fn root(parent: &mut [usize], mut v: usize) -> usize {
        while parent[v] != v {
            parent[v] = parent[parent[v]];
            v = parent[v];
        }
        v
    }

    for i in 0..n {
        for (j, value) in l.row(i) {
            if j != i && value < 0.0 {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut label = vec![usize::MAX; n];
    let mut count = 0;
    let mut component = Vec::with_capacity(n);
    for v in 0..n {
        let r = root(&mut parent, v);
        if label[r] == usize::MAX {
            label[r] = count;
            count += 1;
        }
        component.push(label[r]);
    }
    (component, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generators::grid;
    use crate::mesh::MeshTopology;
    use crate::solver::laplacian::build_laplacian;
    use crate::solver::weights::compute_fan_weights;
    use nalgebra::Point3;

    fn grid_system() -> SystemMatrix {
        let mesh = grid(2, 2, 1.0).unwrap();
        SystemMatrix::new(build_laplacian(&compute_fan_weights(&mesh, 1e-12)))
    }

    #[test]
    fn test_rebuild_without_constraints_fails() {
        let mut system = grid_system();
        let store = ConstraintStore::new(9);

        assert_eq!(system.rebuild(&store), Err(DeformError::NoConstraints));
        assert!(!system.is_factorized());
        assert_eq!(system.rebuild_count(), 0);
    }

    #[test]
    fn test_dirichlet_rows_and_columns() {
        let mut system = grid_system();
        let mut store = ConstraintStore::new(9);
        store.toggle(0, Point3::origin()).unwrap();
        store.toggle(8, Point3::new(2.0, 2.0, 0.0)).unwrap();

        system.rebuild(&store).unwrap();
        assert!(system.is_factorized());
        assert_eq!(system.rebuild_count(), 1);

        let active = system.active().unwrap();
        assert!(active.is_symmetric(0.0));
        for c in [0, 8] {
            assert_eq!(active.row(c).collect::<Vec<_>>(), vec![(c, 1.0)]);
            for i in 0..9 {
                if i != c {
                    assert_eq!(active.get(i, c), 0.0);
                }
            }
        }
        // Unconstrained rows keep the rest diagonal
        assert_eq!(active.diagonal(4), system.rest().diagonal(4));
        // Rest Laplacian untouched
        assert!(system.rest().get(1, 0) < 0.0);
    }

    #[test]
    fn test_rebuild_replaces_previous_factorization() {
        let mut system = grid_system();
        let mut store = ConstraintStore::new(9);
        store.toggle(0, Point3::origin()).unwrap();
        system.rebuild(&store).unwrap();
        assert!(system.is_constrained(0));

        store.toggle(0, Point3::origin()).unwrap();
        store.toggle(5, Point3::origin()).unwrap();
        system.rebuild(&store).unwrap();
        assert!(!system.is_constrained(0));
        assert!(system.is_constrained(5));
        assert_eq!(system.rebuild_count(), 2);

        store.clear();
        assert!(system.rebuild(&store).is_err());
        assert!(!system.is_factorized());
        assert!(system.active().is_none());
    }

    #[test]
    fn test_isolated_vertex_keeps_matrix_definite() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(4.0, 4.0, 0.0),
        ];
        let mesh = MeshTopology::from_triangles(positions, vec![[0, 1, 2]]).unwrap();
        let mut system = SystemMatrix::new(build_laplacian(&compute_fan_weights(&mesh, 1e-12)));
        assert!(system.is_degenerate(3));

        let mut store = ConstraintStore::new(4);
        store.toggle(0, Point3::origin()).unwrap();
        system.rebuild(&store).unwrap();
        assert_eq!(system.active().unwrap().diagonal(3), 1.0);
        assert!(system.is_held(3));
    }

    fn two_triangles() -> MeshTopology {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
        ];
        MeshTopology::from_triangles(positions, vec![[0, 1, 2], [3, 4, 5]]).unwrap()
    }

    #[test]
    fn test_components_are_labeled() {
        let system = SystemMatrix::new(build_laplacian(&compute_fan_weights(&two_triangles(), 1e-12)));
        assert_eq!(system.num_components(), 2);
        assert_eq!(system.component(0), 0);
        assert_eq!(system.component(1), 0);
        assert_eq!(system.component(2), 0);
        assert_eq!(system.component(3), 1);
        assert_eq!(system.component(5), 1);

        assert_eq!(grid_system().num_components(), 1);
    }

    #[test]
    fn test_unconstrained_component_is_held() {
        let mut system = SystemMatrix::new(build_laplacian(&compute_fan_weights(&two_triangles(), 1e-12)));
        let mut store = ConstraintStore::new(6);
        store.toggle(0, Point3::origin()).unwrap();

        system.rebuild(&store).unwrap();
        for v in 0..3 {
            assert!(!system.is_held(v));
        }
        let active = system.active().unwrap();
        assert!(active.is_symmetric(0.0));
        for v in 3..6 {
            assert!(system.is_held(v));
            assert!(!system.is_degenerate(v));
            assert_eq!(active.row(v).collect::<Vec<_>>(), vec![(v, 1.0)]);
        }
        // Free rows of the pinned triangle keep their weights
        assert!(active.get(1, 2) <= 0.0);
        assert_eq!(active.diagonal(1), system.rest().diagonal(1));

        // Pinning the second triangle releases it
        store.toggle(4, Point3::new(6.0, 0.0, 0.0)).unwrap();
        system.rebuild(&store).unwrap();
        assert!(!system.is_held(3));
        assert!(!system.is_held(5));
        assert_eq!(system.active().unwrap().diagonal(3), system.rest().diagonal(3));

        store.clear();
        assert!(system.rebuild(&store).is_err());
        assert!(!system.is_held(3));
    }
}
