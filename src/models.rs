//! Core data structures shared by learners, checkpoints and the runner.
//!
//! `LearnerState` is the restorable payload of one learner. Its shape depends
//! on the learner kind and is tagged by `kind` when serialized, so a blob can
//! be checked against the learner it is applied to.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A totally ordered float used as a sample coordinate.
///
/// Ordering follows `f64::total_cmp`, which makes coordinates usable as map
/// keys and keeps map iteration deterministic.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coord(pub f64);

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Coord {}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Coord {
    fn from(value: f64) -> Self {
        Coord(value)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A location in a 2D domain.
pub type GridPoint = (Coord, Coord);

/// A location a learner asks to be evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Point {
    /// 1D location
    X(Coord),
    /// 2D location
    Xy(Coord, Coord),
    /// Integer seed for statistical averaging
    Seed(u64),
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::X(x) => write!(f, "{}", x),
            Point::Xy(x, y) => write!(f, "({}, {})", x, y),
            Point::Seed(seed) => write!(f, "seed {}", seed),
        }
    }
}

/// Restorable progress of one learner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearnerState {
    /// Point-sampling learner: location -> observed value
    Point {
        #[serde(with = "pairs")]
        data: BTreeMap<Coord, f64>,
    },

    /// 2D grid-sampling learner: location -> observed value
    Grid {
        #[serde(with = "pairs")]
        data: BTreeMap<GridPoint, f64>,
    },

    /// Statistical averaging learner: (samples, count, sum, sum of squares)
    Average {
        #[serde(with = "pairs")]
        data: BTreeMap<u64, f64>,
        npoints: u64,
        sum_f: f64,
        sum_f_sq: f64,
    },

    /// Data-augmenting wrapper: inner state plus the auxiliary payload
    Augmented {
        inner: Box<LearnerState>,
        #[serde(with = "pairs")]
        extra_data: BTreeMap<Point, serde_json::Value>,
    },
}

impl LearnerState {
    /// The kind tag this state was produced by.
    pub fn kind_name(&self) -> &'static str {
        match self {
            LearnerState::Point { .. } => "point",
            LearnerState::Grid { .. } => "grid",
            LearnerState::Average { .. } => "average",
            LearnerState::Augmented { .. } => "augmented",
        }
    }

    /// Number of recorded samples, looking through wrappers.
    pub fn npoints(&self) -> usize {
        match self {
            LearnerState::Point { data } => data.len(),
            LearnerState::Grid { data } => data.len(),
            LearnerState::Average { npoints, .. } => *npoints as usize,
            LearnerState::Augmented { inner, .. } => inner.npoints(),
        }
    }
}

/// Serialize maps with non-string keys as a sequence of `(key, value)` pairs.
pub mod pairs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let entries: Vec<(K, V)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

/// Stopping condition for a driving process.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Stop once this many samples have been recorded in total
    NPoints(usize),
    /// Stop once the loss drops to or below this value
    Loss(f64),
}

impl Goal {
    /// Whether a learner with the given progress satisfies this goal.
    pub fn is_reached(&self, npoints: usize, loss: f64) -> bool {
        match *self {
            Goal::NPoints(n) => npoints >= n,
            Goal::Loss(target) => loss <= target,
        }
    }
}
