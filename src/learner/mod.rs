//! Learner collaborators.
//!
//! The four learner kinds form a closed set, so they are a tagged union
//! (`LearnerKind`) rather than an open trait hierarchy. Each kind implements
//! `LearnerCheckpoint` and `LearnerKind` dispatches on the tag.
//!
//! Point selection here is a deliberately simple deterministic rule. It exists
//! so that runs can be driven end to end; the checkpoint layer only relies on
//! `extract`, `apply` and `reconcile`.

pub mod augmented;
pub mod average;
pub mod grid;
pub mod point;

pub use augmented::AugmentedLearner;
pub use average::AverageLearner;
pub use grid::GridLearner;
pub use point::PointLearner;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::checkpoint::LearnerCheckpoint;
use crate::error::{CheckpointError, SampleError};
use crate::models::{LearnerState, Point};

/// The function a learner samples. Outcomes are JSON so that augmented
/// learners can carry more than one number per point.
pub type SampleFn = Arc<dyn Fn(&Point) -> Value + Send + Sync>;

#[derive(Clone, Debug)]
pub enum LearnerKind {
    Point(PointLearner),
    Grid(GridLearner),
    Average(AverageLearner),
    Augmented(AugmentedLearner),
}

impl LearnerKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            LearnerKind::Point(_) => "point",
            LearnerKind::Grid(_) => "grid",
            LearnerKind::Average(_) => "average",
            LearnerKind::Augmented(_) => "augmented",
        }
    }

    pub fn ask(&mut self, n: usize) -> Vec<Point> {
        match self {
            LearnerKind::Point(l) => l.ask(n).into_iter().map(Point::X).collect(),
            LearnerKind::Grid(l) => l
                .ask(n)
                .into_iter()
                .map(|(x, y)| Point::Xy(x, y))
                .collect(),
            LearnerKind::Average(l) => l.ask(n).into_iter().map(Point::Seed).collect(),
            LearnerKind::Augmented(l) => l.ask(n),
        }
    }

    /// Absorb the outcome of evaluating `point`.
    pub fn tell(&mut self, point: Point, outcome: &Value) -> Result<(), SampleError> {
        if let LearnerKind::Augmented(l) = self {
            return l.tell(point, outcome);
        }

        let value = outcome
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| SampleError::NonNumeric {
                point: point.to_string(),
                value: outcome.to_string(),
            })?;

        match (self, point) {
            (LearnerKind::Point(l), Point::X(x)) => l.tell(x, value),
            (LearnerKind::Grid(l), Point::Xy(x, y)) => l.tell((x, y), value),
            (LearnerKind::Average(l), Point::Seed(seed)) => l.tell(seed, value),
            (kind, point) => {
                return Err(SampleError::WrongPoint {
                    point: point.to_string(),
                    kind: kind.kind_name().to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn loss(&self) -> f64 {
        match self {
            LearnerKind::Point(l) => l.loss(),
            LearnerKind::Grid(l) => l.loss(),
            LearnerKind::Average(l) => l.loss(),
            LearnerKind::Augmented(l) => l.loss(),
        }
    }

    pub fn npoints(&self) -> usize {
        match self {
            LearnerKind::Point(l) => l.npoints(),
            LearnerKind::Grid(l) => l.npoints(),
            LearnerKind::Average(l) => l.npoints(),
            LearnerKind::Augmented(l) => l.npoints(),
        }
    }
}

impl LearnerCheckpoint for LearnerKind {
    fn extract(&self) -> LearnerState {
        match self {
            LearnerKind::Point(l) => l.extract(),
            LearnerKind::Grid(l) => l.extract(),
            LearnerKind::Average(l) => l.extract(),
            LearnerKind::Augmented(l) => l.extract(),
        }
    }

    fn apply(&mut self, state: LearnerState) -> Result<(), CheckpointError> {
        match self {
            LearnerKind::Point(l) => l.apply(state),
            LearnerKind::Grid(l) => l.apply(state),
            LearnerKind::Average(l) => l.apply(state),
            LearnerKind::Augmented(l) => l.apply(state),
        }
    }

    fn reconcile(&mut self) {
        match self {
            LearnerKind::Point(l) => l.reconcile(),
            LearnerKind::Grid(l) => l.reconcile(),
            LearnerKind::Average(l) => l.reconcile(),
            LearnerKind::Augmented(l) => l.reconcile(),
        }
    }
}

/// A learning task: a learner, the function it samples, and optionally the
/// name it checkpoints under.
#[derive(Clone)]
pub struct Learner {
    pub fname: Option<String>,
    kind: LearnerKind,
    function: SampleFn,
}

impl Learner {
    pub fn new<F>(kind: LearnerKind, function: F) -> Self
    where
        F: Fn(&Point) -> Value + Send + Sync + 'static,
    {
        Learner {
            fname: None,
            kind,
            function: Arc::new(function),
        }
    }

    /// Set the name this learner checkpoints under when none is given.
    pub fn with_fname(mut self, fname: impl Into<String>) -> Self {
        self.fname = Some(fname.into());
        self
    }

    pub fn kind(&self) -> &LearnerKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut LearnerKind {
        &mut self.kind
    }

    pub fn function(&self) -> SampleFn {
        Arc::clone(&self.function)
    }

    pub fn ask(&mut self, n: usize) -> Vec<Point> {
        self.kind.ask(n)
    }

    pub fn tell(&mut self, point: Point, outcome: &Value) -> Result<(), SampleError> {
        self.kind.tell(point, outcome)
    }

    pub fn loss(&self) -> f64 {
        self.kind.loss()
    }

    pub fn npoints(&self) -> usize {
        self.kind.npoints()
    }
}

impl LearnerCheckpoint for Learner {
    fn extract(&self) -> LearnerState {
        self.kind.extract()
    }

    fn apply(&mut self, state: LearnerState) -> Result<(), CheckpointError> {
        self.kind.apply(state)
    }

    fn reconcile(&mut self) {
        self.kind.reconcile()
    }
}

impl fmt::Debug for Learner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Learner")
            .field("fname", &self.fname)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
