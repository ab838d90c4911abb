//! Work splitting and recombination.
//!
//! `split` cuts a task list into contiguous groups of `ceil(len / n)` so that
//! concatenating the groups gives back the original order. `combine` is the
//! reverse step after the groups have run: it finds every saved member file,
//! orders them with a natural sort and loads file `i` into task `i`.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::checkpoint::{self, expand_user, FileStore};
use crate::error::{CheckpointError, SplitError};
use crate::learner::Learner;

static DIGIT_RUN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+").expect("Invalid digit run regex"));

/// Partition `items` into at most `n_groups` contiguous groups of
/// `ceil(len / n_groups)` items, the last group taking the remainder.
///
/// Fewer than `n_groups` groups come back when the items run out early, e.g.
/// 5 items into 4 groups gives sizes `[2, 2, 1]`.
pub fn split<T>(items: Vec<T>, n_groups: usize) -> Result<Vec<Vec<T>>, SplitError> {
    if n_groups == 0 {
        return Err(SplitError::InvalidGroupCount(n_groups));
    }
    if items.is_empty() {
        return Err(SplitError::EmptyTasks);
    }

    let size = items.len().div_ceil(n_groups);
    let mut groups = Vec::with_capacity(n_groups);
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        groups.push(iter.by_ref().take(size).collect());
    }
    Ok(groups)
}

/// One run of a natural sort key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Chunk {
    Text(String),
    /// Digits without leading zeros, compared by length first so the string
    /// order equals the numeric order at any magnitude
    Number { len: usize, digits: String },
}

/// Natural sort key: alternating text and number runs, starting with a
/// (possibly empty) text run, followed by the whole string as a tiebreak.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey {
    chunks: Vec<Chunk>,
    whole: String,
}

pub fn natural_key(s: &str) -> NaturalKey {
    let mut chunks = Vec::new();
    let mut last = 0;
    for run in DIGIT_RUN_REGEX.find_iter(s) {
        chunks.push(Chunk::Text(s[last..run.start()].to_string()));
        let trimmed = run.as_str().trim_start_matches('0');
        chunks.push(Chunk::Number {
            len: trimmed.len(),
            digits: trimmed.to_string(),
        });
        last = run.end();
    }
    chunks.push(Chunk::Text(s[last..].to_string()));

    NaturalKey {
        chunks,
        whole: s.to_string(),
    }
}

/// Sort strings so that `f_2` comes before `f_10`.
pub fn natural_sort<S: AsRef<str>>(items: &mut [S]) {
    items.sort_by_cached_key(|s| natural_key(s.as_ref()));
}

/// Files matching `pattern` (with `~` expanded), naturally sorted.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>, SplitError> {
    let pattern = expand_user(pattern).to_string_lossy().into_owned();
    let entries =
        glob::glob(&pattern).map_err(|e| SplitError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CheckpointError::Io(e.into_error()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|path| natural_key(&path.to_string_lossy()));
    Ok(files)
}

/// Load the files matching `pattern` into `tasks`, file `i` into task `i` in
/// natural order.
///
/// The file count is checked before anything is read, and every task is
/// restored on a copy first: on any error no task is changed. Unreadable
/// files count towards the total but leave their task fresh.
pub fn combine(pattern: &str, tasks: &mut [Learner]) -> Result<Vec<PathBuf>, SplitError> {
    let files = discover(pattern)?;
    if files.len() != tasks.len() {
        return Err(SplitError::CountMismatch {
            expected: tasks.len(),
            found: files.len(),
        });
    }

    let store = FileStore::new();
    let mut restored: Vec<Learner> = tasks.to_vec();
    for (task, file) in restored.iter_mut().zip(&files) {
        checkpoint::load(task, &store, Some(&*file.to_string_lossy()))?;
    }
    for (task, fresh) in tasks.iter_mut().zip(restored) {
        *task = fresh;
    }

    log::info!(
        "[Split] Combined {} checkpoint files matching {}",
        files.len(),
        pattern
    );
    Ok(files)
}
