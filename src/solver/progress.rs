//! Step progress for interactive hosts.
//!
//! [`ArapEngine::step_with_progress`](super::ArapEngine::step_with_progress)
//! announces each phase of every local/global iteration before running it,
//! then reports [`StepPhase::Done`] once with `iteration == iterations`. A
//! warm step of `k` iterations produces `2k + 1` updates. A cold step skips
//! the first [`StepPhase::FittingRotations`].
//!
//! # Example
//!
//! ```
//! use ductile::solver::{Progress, StepPhase};
//!
//! let progress = Progress::new(|iteration, iterations, phase| {
//!     eprintln!("[{}/{}] {}", iteration, iterations, phase);
//! });
//! progress.report(0, 4, StepPhase::SolvingPositions);
//! assert_eq!(StepPhase::FittingRotations.label(), "Fitting rotations");
//! ```

use std::fmt;

/// Phase of a deformation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Local step: best-fit rotation of every fan.
    FittingRotations,
    /// Global step: back-substitution against the cached factorization.
    SolvingPositions,
    /// All iterations finished.
    Done,
}

impl StepPhase {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            StepPhase::FittingRotations => "Fitting rotations",
            StepPhase::SolvingPositions => "Solving positions",
            StepPhase::Done => "Done",
        }
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

type PhaseCallback = dyn Fn(usize, usize, StepPhase) + Send + Sync;

/// Receives `(iteration, iterations, phase)` updates from a step.
///
/// `iteration` counts completed iterations, so it runs from `0` to
/// `iterations` inclusive.
pub struct Progress {
    on_phase: Option<Box<PhaseCallback>>,
}

impl Progress {
    /// Forward every update to `on_phase`.
    pub fn new<F>(on_phase: F) -> Self
    where
        F: Fn(usize, usize, StepPhase) + Send + Sync + 'static,
    {
        Self {
            on_phase: Some(Box::new(on_phase)),
        }
    }

    /// A reporter that drops every update.
    pub fn none() -> Self {
        Self { on_phase: None }
    }

    /// Whether updates reach a callback.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.on_phase.is_some()
    }

    /// Announce `phase` of iteration `iteration` out of `iterations`.
    #[inline]
    pub fn report(&self, iteration: usize, iterations: usize, phase: StepPhase) {
        if let Some(on_phase) = &self.on_phase {
            on_phase(iteration, iterations, phase);
        }
    }

    /// Report [`StepPhase::Done`] for a step of `iterations` iterations.
    #[inline]
    pub fn finish(&self, iterations: usize) {
        self.report(iterations, iterations, StepPhase::Done);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("active", &self.is_active())
            .finish()
    }
}
