//! 1D point-sampling learner.

use std::collections::{BTreeMap, BTreeSet};

use crate::checkpoint::LearnerCheckpoint;
use crate::error::CheckpointError;
use crate::models::{Coord, LearnerState};

/// Samples a function on `[a, b]`, refining the widest known interval first.
#[derive(Clone, Debug)]
pub struct PointLearner {
    bounds: (f64, f64),
    data: BTreeMap<Coord, f64>,
    /// Asked but not yet told
    pending: BTreeSet<Coord>,
    /// Smallest and largest observed value
    value_range: Option<(f64, f64)>,
}

impl PointLearner {
    pub fn new(bounds: (f64, f64)) -> Self {
        let (a, b) = bounds;
        PointLearner {
            bounds: (a.min(b), a.max(b)),
            data: BTreeMap::new(),
            pending: BTreeSet::new(),
            value_range: None,
        }
    }

    pub fn bounds(&self) -> (f64, f64) {
        self.bounds
    }

    pub fn data(&self) -> &BTreeMap<Coord, f64> {
        &self.data
    }

    pub fn pending(&self) -> &BTreeSet<Coord> {
        &self.pending
    }

    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.value_range
    }

    /// Record an observed value and clear its pending entry.
    pub fn tell(&mut self, x: Coord, y: f64) {
        self.data.insert(x, y);
        self.pending.remove(&x);
        self.value_range = Some(match self.value_range {
            Some((lo, hi)) => (lo.min(y), hi.max(y)),
            None => (y, y),
        });
    }

    /// Re-submit a batch of known results.
    pub fn tell_many(&mut self, results: impl IntoIterator<Item = (Coord, f64)>) {
        for (x, y) in results {
            self.tell(x, y);
        }
    }

    /// Choose up to `n` new points and mark them pending.
    pub fn ask(&mut self, n: usize) -> Vec<Coord> {
        let mut points = Vec::with_capacity(n);
        for _ in 0..n {
            match self.next_point() {
                Some(x) => {
                    self.pending.insert(x);
                    points.push(x);
                }
                None => break,
            }
        }
        points
    }

    fn next_point(&self) -> Option<Coord> {
        let (a, b) = (Coord(self.bounds.0), Coord(self.bounds.1));
        let is_known = |x: &Coord| self.data.contains_key(x) || self.pending.contains(x);

        if !is_known(&a) {
            return Some(a);
        }
        if !is_known(&b) {
            return Some(b);
        }

        let known: BTreeSet<Coord> = self
            .data
            .keys()
            .chain(self.pending.iter())
            .copied()
            .collect();

        let (left, right) = known
            .iter()
            .zip(known.iter().skip(1))
            .max_by(|(l1, r1), (l2, r2)| (r1.0 - l1.0).total_cmp(&(r2.0 - l2.0)))?;

        let mid = Coord(left.0 + (right.0 - left.0) / 2.0);
        // Interval exhausted at float resolution
        if mid == *left || mid == *right {
            return None;
        }
        Some(mid)
    }

    /// Widest interval between known samples relative to the domain width.
    pub fn loss(&self) -> f64 {
        let (a, b) = self.bounds;
        if !self.data.contains_key(&Coord(a)) || !self.data.contains_key(&Coord(b)) {
            return f64::INFINITY;
        }
        let width = b - a;
        if width <= 0.0 {
            return 0.0;
        }
        self.data
            .keys()
            .zip(self.data.keys().skip(1))
            .map(|(l, r)| r.0 - l.0)
            .fold(0.0, f64::max)
            / width
    }

    pub fn npoints(&self) -> usize {
        self.data.len()
    }
}

impl LearnerCheckpoint for PointLearner {
    fn extract(&self) -> LearnerState {
        LearnerState::Point {
            data: self.data.clone(),
        }
    }

    fn apply(&mut self, state: LearnerState) -> Result<(), CheckpointError> {
        match state {
            LearnerState::Point { data } => {
                self.data = data;
                self.value_range = None;
                Ok(())
            }
            other => Err(CheckpointError::SchemaMismatch {
                expected: "point".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }

    /// Re-feed every known result so pending work and the value range agree
    /// with the restored data.
    fn reconcile(&mut self) {
        let known: Vec<(Coord, f64)> = self.data.iter().map(|(x, y)| (*x, *y)).collect();
        self.tell_many(known);
    }
}
