//! 2D grid-sampling learner.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::checkpoint::LearnerCheckpoint;
use crate::error::CheckpointError;
use crate::models::{Coord, GridPoint, LearnerState};

/// Finest lattice a grid learner will subdivide to (2^10 + 1 points per axis).
pub const MAX_LEVEL: u32 = 10;

/// Samples a 2D domain on successively finer lattices.
///
/// The pending-subdivision stack is seeded with the domain corners. When it
/// runs dry the lattice resolution doubles and every new lattice point that is
/// not yet known gets queued.
///
/// `queued` is the set of live stack entries. The stack itself may hold stale
/// entries for points told out of order; `ask` skips them.
#[derive(Clone, Debug)]
pub struct GridLearner {
    bounds: [(f64, f64); 2],
    data: BTreeMap<GridPoint, f64>,
    stack: VecDeque<GridPoint>,
    queued: BTreeSet<GridPoint>,
    pending: BTreeSet<GridPoint>,
    level: u32,
}

impl GridLearner {
    pub fn new(x_bounds: (f64, f64), y_bounds: (f64, f64)) -> Self {
        let mut learner = GridLearner {
            bounds: [x_bounds, y_bounds],
            data: BTreeMap::new(),
            stack: VecDeque::new(),
            queued: BTreeSet::new(),
            pending: BTreeSet::new(),
            level: 0,
        };
        learner.queue_level(0);
        learner
    }

    pub fn data(&self) -> &BTreeMap<GridPoint, f64> {
        &self.data
    }

    /// Points queued for evaluation, in the order they will be asked.
    pub fn stack(&self) -> impl Iterator<Item = &GridPoint> {
        self.stack.iter().filter(move |point| self.queued.contains(*point))
    }

    pub fn stack_contains(&self, point: &GridPoint) -> bool {
        self.queued.contains(point)
    }

    pub fn pending(&self) -> &BTreeSet<GridPoint> {
        &self.pending
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Queue a point for evaluation unless it is already known or queued.
    pub fn push_stack(&mut self, point: GridPoint) {
        if !self.is_known(&point) && self.queued.insert(point) {
            self.stack.push_back(point);
        }
    }

    fn is_known(&self, point: &GridPoint) -> bool {
        self.data.contains_key(point) || self.pending.contains(point)
    }

    fn lattice_point(&self, level: u32, i: u64, j: u64) -> GridPoint {
        let steps = (1u64 << level) as f64;
        let [(x0, x1), (y0, y1)] = self.bounds;
        (
            Coord(x0 + (x1 - x0) * i as f64 / steps),
            Coord(y0 + (y1 - y0) * j as f64 / steps),
        )
    }

    fn queue_level(&mut self, level: u32) {
        let steps = 1u64 << level;
        for i in 0..=steps {
            for j in 0..=steps {
                let point = self.lattice_point(level, i, j);
                self.push_stack(point);
            }
        }
    }

    /// Choose up to `n` new points and mark them pending.
    pub fn ask(&mut self, n: usize) -> Vec<GridPoint> {
        let mut points = Vec::with_capacity(n);
        while points.len() < n {
            match self.stack.pop_front() {
                Some(point) => {
                    if !self.queued.remove(&point) || self.is_known(&point) {
                        continue;
                    }
                    self.pending.insert(point);
                    points.push(point);
                }
                None if self.level < MAX_LEVEL => {
                    self.level += 1;
                    self.queue_level(self.level);
                }
                None => break,
            }
        }
        points
    }

    /// Record an observed value, clearing it from the pending and queued sets.
    pub fn tell(&mut self, point: GridPoint, value: f64) {
        self.data.insert(point, value);
        self.pending.remove(&point);
        self.queued.remove(&point);
    }

    /// Lattice spacing (as a fraction of the domain) of the finest complete level.
    pub fn loss(&self) -> f64 {
        let complete = if self.queued.is_empty() && self.pending.is_empty() {
            Some(self.level)
        } else {
            self.level.checked_sub(1)
        };
        match complete {
            Some(level) if !self.data.is_empty() => 1.0 / (1u64 << level) as f64,
            _ => f64::INFINITY,
        }
    }

    pub fn npoints(&self) -> usize {
        self.data.len()
    }
}

impl LearnerCheckpoint for GridLearner {
    fn extract(&self) -> LearnerState {
        LearnerState::Grid {
            data: self.data.clone(),
        }
    }

    fn apply(&mut self, state: LearnerState) -> Result<(), CheckpointError> {
        match state {
            LearnerState::Grid { data } => {
                self.data = data;
                Ok(())
            }
            other => Err(CheckpointError::SchemaMismatch {
                expected: "grid".to_string(),
                found: other.kind_name().to_string(),
            }),
        }
    }

    /// Drop queued points that already have a recorded value.
    fn reconcile(&mut self) {
        let data = &self.data;
        self.queued.retain(|point| !data.contains_key(point));
        let queued = &self.queued;
        self.stack.retain(|point| queued.contains(point));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gp(x: f64, y: f64) -> GridPoint {
        (Coord(x), Coord(y))
    }

    #[test]
    fn test_seeded_with_corners() {
        let learner = GridLearner::new((0.0, 1.0), (0.0, 1.0));
        let stack: Vec<_> = learner.stack().copied().collect();
        assert_eq!(
            stack,
            vec![gp(0.0, 0.0), gp(0.0, 1.0), gp(1.0, 0.0), gp(1.0, 1.0)]
        );
    }

    #[test]
    fn test_refines_when_stack_runs_dry() {
        let mut learner = GridLearner::new((0.0, 1.0), (0.0, 1.0));
        let first = learner.ask(4);
        for p in &first {
            learner.tell(*p, 0.0);
        }
        assert_eq!(learner.loss(), 1.0);

        let next = learner.ask(5);
        assert_eq!(learner.level(), 1);
        assert_eq!(next.len(), 5);
        assert!(!next.iter().any(|p| first.contains(p)));
        assert!(next.contains(&gp(0.5, 0.5)));
    }

    #[test]
    fn test_reconcile_removes_known_points_from_stack() {
        let mut learner = GridLearner::new((0.0, 1.0), (0.0, 1.0));
        assert!(learner.stack_contains(&gp(0.0, 0.0)));

        let mut data = BTreeMap::new();
        data.insert(gp(0.0, 0.0), 1.0);
        data.insert(gp(1.0, 1.0), 2.0);
        learner.apply(LearnerState::Grid { data }).unwrap();
        learner.reconcile();

        assert!(!learner.stack_contains(&gp(0.0, 0.0)));
        assert!(!learner.stack_contains(&gp(1.0, 1.0)));
        assert_eq!(learner.stack().count(), 2);
    }

    #[test]
    fn test_out_of_order_tell_leaves_the_queue() {
        let mut learner = GridLearner::new((0.0, 1.0), (0.0, 1.0));
        learner.tell(gp(1.0, 0.0), 3.0);
        assert!(!learner.stack_contains(&gp(1.0, 0.0)));
        assert_eq!(learner.stack().count(), 3);

        let asked = learner.ask(4);
        assert_eq!(&asked[..3], &[gp(0.0, 0.0), gp(0.0, 1.0), gp(1.0, 1.0)]);
        assert_eq!(learner.level(), 1);
        assert!(!asked.contains(&gp(1.0, 0.0)));
    }

    #[test]
    fn test_deep_refinement_queues_each_point_once() {
        let mut learner = GridLearner::new((0.0, 1.0), (0.0, 1.0));
        let mut seen = BTreeSet::new();
        while learner.level() < 7 || learner.stack().next().is_some() {
            let batch = learner.ask(1);
            assert_eq!(batch.len(), 1);
            for p in batch {
                assert!(seen.insert(p));
                learner.tell(p, 0.0);
            }
        }
        let side = (1usize << 7) + 1;
        assert_eq!(learner.npoints(), side * side);
        assert_eq!(learner.loss(), 1.0 / 128.0);
    }

    #[test]
    fn test_apply_wrong_kind() {
        let mut learner = GridLearner::new((0.0, 1.0), (0.0, 1.0));
        let err = learner
            .apply(LearnerState::Point {
                data: BTreeMap::new(),
            })
            .unwrap_err();
        assert!(matches!(err, CheckpointError::SchemaMismatch { .. }));
    }
}
