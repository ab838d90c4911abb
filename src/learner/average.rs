//! Statistical averaging learner.

use std::collections::{BTreeMap, BTreeSet};

use crate::checkpoint::LearnerCheckpoint;
use crate::error::CheckpointError;
use crate::models::LearnerState;

/// Averages a noisy function over integer seeds until the standard error is
/// small compared to `max(atol, rtol * |mean|)`.
#[derive(Clone, Debug)]
pub struct AverageLearner {
    atol: f64,
    rtol: f64,
    data: BTreeMap<u64, f64>,
    pending: BTreeSet<u64>,
    npoints: u64,
    sum_f: f64,
    sum_f_sq: f64,
}

impl AverageLearner {
    pub fn new(atol: f64, rtol: f64) -> Self {
        AverageLearner {
            atol,
            rtol,
            data: BTreeMap::new(),
            pending: BTreeSet::new(),
            npoints: 0,
            sum_f: 0.0,
            sum_f_sq: 0.0,
        }
    }

    pub fn data(&self) -> &BTreeMap<u64, f64> {
        &self.data
    }

    pub fn pending(&self) -> &BTreeSet<u64> {
        &self.pending
    }

    pub fn mean(&self) -> f64 {
        if self.npoints == 0 {
            return 0.0;
        }
        self.sum_f / self.npoints as f64
    }

    pub fn std(&self) -> f64 {
        if self.npoints < 2 {
            return f64::INFINITY;
        }
        let n = self.npoints as f64;
        let mean = self.mean();
        let variance = (self.sum_f_sq - n * mean * mean) / (n - 1.0);
        variance.max(0.0).sqrt()
    }

    /// Next `n` unused seeds, marked pending.
    pub fn ask(&mut self, n: usize) -> Vec<u64> {
        let last_data = self.data.keys().next_back().copied();
        let last_pending = self.pending.iter().next_back().copied();
        let start = match last_data.max(last_pending) {
            Some(last) => last + 1,
            None => 0,
        };
        let seeds: Vec<u64> = (start..start + n as u64).collect();
        self.pending.extend(seeds.iter().copied());
        seeds
    }

    /// Record a sample. A seed that is already known is ignored.
    pub fn tell(&mut self, seed: u64, value: f64) {
        self.pending.remove(&seed);
        if self.data.contains_key(&seed) {
            return;
        }
        self.data.insert(seed, value);
        self.npoints += 1;
        self.sum_f += value;
        self.sum_f_sq += value * value;
    }

    pub fn loss(&self) -> f64 {
        if self.npoints < 2 {
            return f64::INFINITY;
        }
        let standard_error = self.std() / (self.npoints as f64).sqrt();
        standard_error / self.atol.max(self.rtol * self.mean().abs())
    }

    pub fn npoints(&self) -> usize {
        self.npoints as usize
    }
}

impl LearnerCheckpoint for AverageLearner {
    fn extract(&self) -> LearnerState {
        LearnerState::Average {
            data: self.data.clone(),
            npoints: self.npoints,
            sum_f: self.sum_f,
            sum_f_sq: self.sum_f_sq,
        }
    }

    /// The four fields fully determine resumable state, nothing to reconcile.
    fn apply(&mut self, state: LearnerState) -> Result<(), CheckpointError> {
        match state {
            LearnerState::Average {
                data,
                npoints,
                sum_f,
                sum_f_sq,
            } => {
                self.data = data;
                self.npoints = npoints;
                self.sum_f = sum_f;
                self.sum_f_sq = sum_f_sq;
                Ok(())
            }
            other => Err(CheckpointError::SchemaMismatch {
                expected: "average".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }
}
