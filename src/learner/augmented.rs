//! Data-augmenting wrapper: keeps the full outcome of every sample next to the
//! number the wrapped learner is fed.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::checkpoint::LearnerCheckpoint;
use crate::error::{CheckpointError, SampleError};
use crate::learner::LearnerKind;
use crate::models::{LearnerState, Point};

#[derive(Clone, Debug)]
pub struct AugmentedLearner {
    learner: Box<LearnerKind>,
    /// Key of the outcome field handed to the wrapped learner
    pick: String,
    extra_data: BTreeMap<Point, Value>,
}

impl AugmentedLearner {
    pub fn new(learner: LearnerKind, pick: impl Into<String>) -> Self {
        AugmentedLearner {
            learner: Box::new(learner),
            pick: pick.into(),
            extra_data: BTreeMap::new(),
        }
    }

    pub fn inner(&self) -> &LearnerKind {
        &self.learner
    }

    pub fn extra_data(&self) -> &BTreeMap<Point, Value> {
        &self.extra_data
    }

    pub fn ask(&mut self, n: usize) -> Vec<Point> {
        self.learner.ask(n)
    }

    /// Store the whole outcome and feed its picked field to the wrapped learner.
    pub fn tell(&mut self, point: Point, outcome: &Value) -> Result<(), SampleError> {
        let picked = outcome.get(&self.pick).ok_or_else(|| SampleError::NonNumeric {
            point: point.to_string(),
            value: outcome.to_string(),
        })?;
        self.learner.tell(point, picked)?;
        self.extra_data.insert(point, outcome.clone());
        Ok(())
    }

    pub fn loss(&self) -> f64 {
        self.learner.loss()
    }

    pub fn npoints(&self) -> usize {
        self.learner.npoints()
    }
}

impl LearnerCheckpoint for AugmentedLearner {
    fn extract(&self) -> LearnerState {
        LearnerState::Augmented {
            inner: Box::new(self.learner.extract()),
            extra_data: self.extra_data.clone(),
        }
    }

    fn apply(&mut self, state: LearnerState) -> Result<(), CheckpointError> {
        match state {
            LearnerState::Augmented { inner, extra_data } => {
                self.learner.apply(*inner)?;
                self.extra_data = extra_data;
                Ok(())
            }
            other => Err(CheckpointError::SchemaMismatch {
                expected: "augmented".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }

    fn reconcile(&mut self) {
        self.learner.reconcile();
    }
}
