//! Positional constraints driven by user interaction.
//!
//! A constraint pins a vertex to a target position. Constraints come in two
//! kinds: *handles* follow the user's drag, *anchors* stay where they were
//! placed. The store tracks whether its *membership* changed since the last
//! factorization; moving targets never invalidates the factorization.

use nalgebra::{Point3, Vector3};
use tracing::trace;

use crate::error::{DeformError, Result};

/// How a constrained vertex reacts to dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Moves with [`ConstraintStore::translate_handles`].
    Handle,
    /// Stays at its target until explicitly updated.
    Anchor,
}

/// A single pinned vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    /// The constrained vertex.
    pub vertex: usize,
    /// Where the vertex must end up.
    pub target: Point3<f64>,
    /// Handle or anchor.
    pub kind: ConstraintKind,
}

/// Ordered set of constraints with unique vertices.
#[derive(Debug, Clone)]
pub struct ConstraintStore {
    constraints: Vec<Constraint>,
    /// Vertex -> position in `constraints`.
    slots: Vec<Option<usize>>,
    membership_dirty: bool,
}

impl ConstraintStore {
    /// Create an empty store for a mesh with `num_vertices` vertices.
    pub fn new(num_vertices: usize) -> Self {
        Self {
            constraints: Vec::new(),
            slots: vec![None; num_vertices],
            membership_dirty: false,
        }
    }

    /// Number of constraints.
    #[inline]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether no vertex is constrained.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Number of vertices the store was created for.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.slots.len()
    }

    /// Whether a vertex is constrained. Out-of-range vertices are not.
    #[inline]
    pub fn contains(&self, vertex: usize) -> bool {
        self.slots.get(vertex).is_some_and(|s| s.is_some())
    }

    /// Target of a constrained vertex.
    pub fn target(&self, vertex: usize) -> Option<Point3<f64>> {
        self.get(vertex).map(|c| c.target)
    }

    /// Kind of a constrained vertex.
    pub fn kind(&self, vertex: usize) -> Option<ConstraintKind> {
        self.get(vertex).map(|c| c.kind)
    }

    /// Constraint on a vertex, if any.
    pub fn get(&self, vertex: usize) -> Option<&Constraint> {
        let slot = (*self.slots.get(vertex)?)?;
        Some(&self.constraints[slot])
    }

    /// Iterate over constraints in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.constraints.iter()
    }

    /// Whether membership changed since the last [`mark_clean`](Self::mark_clean).
    #[inline]
    pub fn is_membership_dirty(&self) -> bool {
        self.membership_dirty
    }

    /// Acknowledge the current membership (after refactorization).
    #[inline]
    pub fn mark_clean(&mut self) {
        self.membership_dirty = false;
    }

    /// Add or remove a handle at `vertex`.
    ///
    /// A new handle targets `current`, the vertex's live position. Returns
    /// whether the vertex is constrained afterwards.
    pub fn toggle(&mut self, vertex: usize, current: Point3<f64>) -> Result<bool> {
        self.check_range(vertex)?;

        if self.contains(vertex) {
            self.remove(vertex);
            Ok(false)
        } else {
            self.insert(vertex, current, ConstraintKind::Handle);
            Ok(true)
        }
    }

    /// Step a vertex through free → handle → anchor → free.
    ///
    /// Returns the kind after the step, `None` once the vertex is released.
    pub fn cycle(&mut self, vertex: usize, current: Point3<f64>) -> Result<Option<ConstraintKind>> {
        self.check_range(vertex)?;

        match self.kind(vertex) {
            None => {
                self.insert(vertex, current, ConstraintKind::Handle);
                Ok(Some(ConstraintKind::Handle))
            }
            Some(ConstraintKind::Handle) => {
                if let Some(slot) = self.slots[vertex] {
                    self.constraints[slot].kind = ConstraintKind::Anchor;
                }
                Ok(Some(ConstraintKind::Anchor))
            }
            Some(ConstraintKind::Anchor) => {
                self.remove(vertex);
                Ok(None)
            }
        }
    }

    /// Move the target of an existing constraint.
    ///
    /// Returns `false` without side effects if the vertex is not constrained.
    pub fn update(&mut self, vertex: usize, target: Point3<f64>) -> Result<bool> {
        self.check_range(vertex)?;

        match self.slots[vertex] {
            Some(slot) => {
                self.constraints[slot].target = target;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Translate every handle target by `offset`. Anchors stay put.
    ///
    /// Returns the number of handles moved.
    pub fn translate_handles(&mut self, offset: Vector3<f64>) -> usize {
        let mut moved = 0;
        for c in self
            .constraints
            .iter_mut()
            .filter(|c| c.kind == ConstraintKind::Handle)
        {
            c.target += offset;
            moved += 1;
        }
        moved
    }

    /// Remove all constraints.
    pub fn clear(&mut self) {
        if self.constraints.is_empty() {
            return;
        }
        self.constraints.clear();
        self.slots.iter_mut().for_each(|s| *s = None);
        self.membership_dirty = true;
    }

    fn check_range(&self, vertex: usize) -> Result<()> {
        if vertex < self.slots.len() {
            Ok(())
        } else {
            Err(DeformError::VertexOutOfRange {
                vertex,
                count: self.slots.len(),
            })
        }
    }

    fn insert(&mut self, vertex: usize, target: Point3<f64>, kind: ConstraintKind) {
        trace!(vertex, ?kind, "constraint added");
        self.slots[vertex] = Some(self.constraints.len());
        self.constraints.push(Constraint { vertex, target, kind });
        self.membership_dirty = true;
    }

    fn remove(&mut self, vertex: usize) {
        let Some(slot) = self.slots[vertex].take() else {
            return;
        };
        trace!(vertex, "constraint removed");
        self.constraints.remove(slot);
        for c in &self.constraints[slot..] {
            self.slots[c.vertex] = self.slots[c.vertex].map(|s| s - 1);
        }
        self.membership_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64) -> Point3<f64> {
        Point3::new(x, 0.0, 0.0)
    }

    #[test]
    fn test_toggle_adds_and_removes() {
        let mut store = ConstraintStore::new(5);
        assert!(!store.is_membership_dirty());

        assert!(store.toggle(2, p(2.0)).unwrap());
        assert!(store.contains(2));
        assert_eq!(store.target(2), Some(p(2.0)));
        assert_eq!(store.kind(2), Some(ConstraintKind::Handle));
        assert!(store.is_membership_dirty());

        store.mark_clean();
        assert!(!store.toggle(2, p(9.0)).unwrap());
        assert!(!store.contains(2));
        assert!(store.is_empty());
        assert!(store.is_membership_dirty());
    }

    #[test]
    fn test_out_of_range_is_a_no_op() {
        let mut store = ConstraintStore::new(3);
        let err = store.toggle(3, p(0.0)).unwrap_err();
        assert_eq!(err, DeformError::VertexOutOfRange { vertex: 3, count: 3 });
        assert!(store.update(10, p(1.0)).is_err());
        assert!(store.is_empty());
        assert!(!store.is_membership_dirty());
        assert!(!store.contains(10));
    }

    #[test]
    fn test_update_keeps_membership_clean() {
        let mut store = ConstraintStore::new(4);
        store.toggle(1, p(1.0)).unwrap();
        store.mark_clean();

        assert!(store.update(1, p(5.0)).unwrap());
        assert_eq!(store.target(1), Some(p(5.0)));
        assert!(!store.is_membership_dirty());

        // Absent vertex: no-op
        assert!(!store.update(0, p(5.0)).unwrap());
        assert!(!store.contains(0));
        assert!(!store.is_membership_dirty());
    }

    #[test]
    fn test_removal_preserves_order() {
        let mut store = ConstraintStore::new(6);
        for v in [4, 1, 3, 0] {
            store.toggle(v, p(v as f64)).unwrap();
        }
        store.toggle(1, p(0.0)).unwrap();

        let order: Vec<usize> = store.iter().map(|c| c.vertex).collect();
        assert_eq!(order, vec![4, 3, 0]);
        for v in [4, 3, 0] {
            assert_eq!(store.target(v), Some(p(v as f64)));
        }
    }

    #[test]
    fn test_cycle() {
        let mut store = ConstraintStore::new(2);

        assert_eq!(store.cycle(0, p(1.0)).unwrap(), Some(ConstraintKind::Handle));
        store.mark_clean();

        assert_eq!(store.cycle(0, p(7.0)).unwrap(), Some(ConstraintKind::Anchor));
        assert_eq!(store.target(0), Some(p(1.0)));
        assert!(!store.is_membership_dirty());

        assert_eq!(store.cycle(0, p(7.0)).unwrap(), None);
        assert!(!store.contains(0));
        assert!(store.is_membership_dirty());
    }

    #[test]
    fn test_translate_handles_skips_anchors() {
        let mut store = ConstraintStore::new(3);
        store.toggle(0, p(0.0)).unwrap();
        store.toggle(1, p(1.0)).unwrap();
        store.cycle(1, p(1.0)).unwrap(); // now an anchor
        store.mark_clean();

        let moved = store.translate_handles(Vector3::new(0.0, 2.0, 0.0));
        assert_eq!(moved, 1);
        assert_eq!(store.target(0), Some(Point3::new(0.0, 2.0, 0.0)));
        assert_eq!(store.target(1), Some(p(1.0)));
        assert!(!store.is_membership_dirty());
    }

    #[test]
    fn test_clear() {
        let mut store = ConstraintStore::new(3);
        store.clear();
        assert!(!store.is_membership_dirty());

        store.toggle(0, p(0.0)).unwrap();
        store.mark_clean();
        store.clear();
        assert!(store.is_empty());
        assert!(!store.contains(0));
        assert!(store.is_membership_dirty());
    }
}
