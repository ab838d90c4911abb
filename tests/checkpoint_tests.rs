//! Integration tests for the checkpoint layer
//!
//! - Codec round trips for every learner kind (proptest)
//! - Idempotent restore
//! - Absence tolerance for missing, empty and truncated files
//! - Grid reconciliation after restore

use adaptive_tools::checkpoint::{self, codec, FileStore, LearnerCheckpoint, MemoryStore};
use adaptive_tools::error::CheckpointError;
use adaptive_tools::learner::{
    AugmentedLearner, AverageLearner, GridLearner, Learner, LearnerKind, PointLearner,
};
use adaptive_tools::models::{Coord, LearnerState, Point};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;

fn finite() -> impl Strategy<Value = f64> {
    -1e6f64..1e6f64
}

fn point_state() -> impl Strategy<Value = LearnerState> {
    prop::collection::btree_map(finite().prop_map(Coord), finite(), 0..20)
        .prop_map(|data| LearnerState::Point { data })
}

fn grid_state() -> impl Strategy<Value = LearnerState> {
    prop::collection::btree_map(
        (finite().prop_map(Coord), finite().prop_map(Coord)),
        finite(),
        0..20,
    )
    .prop_map(|data| LearnerState::Grid { data })
}

fn average_state() -> impl Strategy<Value = LearnerState> {
    (
        prop::collection::btree_map(any::<u64>(), finite(), 0..20),
        finite(),
        finite(),
    )
        .prop_map(|(data, sum_f, sum_f_sq)| LearnerState::Average {
            npoints: data.len() as u64,
            data,
            sum_f,
            sum_f_sq,
        })
}

fn augmented_state() -> impl Strategy<Value = LearnerState> {
    (
        point_state(),
        prop::collection::btree_map(any::<u64>(), finite(), 0..10),
    )
        .prop_map(|(inner, extra)| LearnerState::Augmented {
            inner: Box::new(inner),
            extra_data: extra
                .into_iter()
                .map(|(seed, y)| (Point::Seed(seed), json!({ "y": y, "seed": seed })))
                .collect(),
        })
}

fn any_state() -> impl Strategy<Value = LearnerState> {
    prop_oneof![point_state(), grid_state(), average_state(), augmented_state()]
}

proptest! {
    #[test]
    fn prop_codec_roundtrip(state in any_state(), compress in any::<bool>()) {
        let bytes = codec::encode(&state, compress).unwrap();
        prop_assert_eq!(codec::decode("prop", &bytes).unwrap(), state);
    }
}

fn square() -> Learner {
    Learner::new(
        LearnerKind::Point(PointLearner::new((-2.0, 2.0))),
        |p: &Point| match p {
            Point::X(x) => json!(x.0 * x.0),
            _ => json!(null),
        },
    )
}

fn drive(learner: &mut Learner, n: usize) {
    let function = learner.function();
    for _ in 0..n {
        for point in learner.ask(1) {
            let outcome = function(&point);
            learner.tell(point, &outcome).unwrap();
        }
    }
}

#[test]
fn test_restore_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let name = dir.path().join("square.ckpt").to_string_lossy().into_owned();
    let store = FileStore::new();

    let mut source = square();
    drive(&mut source, 7);
    checkpoint::save(&source, &store, Some(name.as_str()), true).unwrap();

    let mut once = square();
    checkpoint::load(&mut once, &store, Some(name.as_str())).unwrap();

    let mut twice = square();
    checkpoint::load(&mut twice, &store, Some(name.as_str())).unwrap();
    checkpoint::load(&mut twice, &store, Some(name.as_str())).unwrap();

    assert_eq!(once.extract(), twice.extract());
    assert_eq!(once.npoints(), 7);
    assert_eq!(once.loss(), twice.loss());
}

#[test]
fn test_missing_file_leaves_learner_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let name = dir.path().join("nope/never.ckpt").to_string_lossy().into_owned();

    let mut learner = square();
    let fresh = learner.extract();
    let loaded = checkpoint::load(&mut learner, &FileStore::new(), Some(name.as_str())).unwrap();

    assert!(!loaded);
    assert_eq!(learner.extract(), fresh);
}

#[test]
fn test_empty_and_truncated_files_are_absence() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.ckpt");
    fs::write(&empty, b"").unwrap();

    let mut source = square();
    drive(&mut source, 5);
    let bytes = codec::encode(&source.extract(), true).unwrap();
    let truncated = dir.path().join("truncated.ckpt");
    fs::write(&truncated, &bytes[..bytes.len() / 3]).unwrap();

    for path in [&empty, &truncated] {
        let mut learner = square();
        let loaded =
            checkpoint::load(&mut learner, &FileStore::new(), Some(&*path.to_string_lossy()))
                .unwrap();
        assert!(!loaded, "{} should count as absent", path.display());
        assert_eq!(learner.npoints(), 0);
    }
}

#[test]
fn test_schema_mismatch_propagates_without_mutation() {
    let store = MemoryStore::new();
    let mut grid_data = BTreeMap::new();
    grid_data.insert((Coord(0.0), Coord(0.0)), 1.0);
    checkpoint::write_state(&store, "grid", &LearnerState::Grid { data: grid_data }, true).unwrap();

    let mut learner = square();
    drive(&mut learner, 3);
    let before = learner.extract();

    let err = checkpoint::load(&mut learner, &store, Some("grid")).unwrap_err();
    assert!(matches!(err, CheckpointError::SchemaMismatch { .. }));
    assert_eq!(learner.extract(), before);
}

#[test]
fn test_grid_reconcile_drops_known_points() {
    let mut grid = GridLearner::new((0.0, 1.0), (0.0, 1.0));
    let origin = (Coord(0.0), Coord(0.0));
    let far = (Coord(1.0), Coord(1.0));
    grid.push_stack(origin);

    let mut data = BTreeMap::new();
    data.insert(origin, 1.0);
    data.insert(far, 2.0);
    checkpoint::restore(&mut grid, LearnerState::Grid { data }).unwrap();

    assert!(!grid.stack_contains(&origin));
    assert!(!grid.stack_contains(&far));
    assert_eq!(grid.npoints(), 2);

    let asked = grid.ask(10);
    assert!(!asked.contains(&origin));
    assert!(!asked.contains(&far));
}

#[test]
fn test_point_reconcile_clears_pending() {
    let mut source = PointLearner::new((0.0, 1.0));
    source.tell(Coord(0.0), 0.0);
    source.tell(Coord(1.0), 1.0);

    let mut restored = PointLearner::new((0.0, 1.0));
    let asked = restored.ask(2);
    assert_eq!(restored.pending().len(), asked.len());

    checkpoint::restore(&mut restored, source.extract()).unwrap();
    assert!(restored.pending().is_empty());
    assert_eq!(restored.value_range(), Some((0.0, 1.0)));
}

#[test]
fn test_average_and_augmented_roundtrip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new();

    let average = || {
        Learner::new(
            LearnerKind::Average(AverageLearner::new(0.01, 0.0)),
            |p: &Point| match p {
                Point::Seed(s) => json!(((*s * 7919) % 11) as f64),
                _ => json!(null),
            },
        )
    };
    let augmented = || {
        Learner::new(
            LearnerKind::Augmented(AugmentedLearner::new(
                LearnerKind::Point(PointLearner::new((0.0, 1.0))),
                "y",
            )),
            |p: &Point| match p {
                Point::X(x) => json!({ "y": x.0.sin(), "cost": 2 }),
                _ => json!(null),
            },
        )
    };

    let makers: [(&str, &dyn Fn() -> Learner); 2] = [("avg", &average), ("aug", &augmented)];
    for (name, make) in makers {
        let path = dir.path().join(format!("{name}.ckpt")).to_string_lossy().into_owned();
        let mut source = make();
        drive(&mut source, 6);
        checkpoint::save(&source, &store, Some(path.as_str()), false).unwrap();

        let mut restored = make();
        assert!(checkpoint::load(&mut restored, &store, Some(path.as_str())).unwrap());
        assert_eq!(restored.extract(), source.extract(), "{name}");
    }
}
