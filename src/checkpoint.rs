//! Checkpoint identity
//!
//! A checkpoint is the place in a pipeline where validation happens. Its id
//! keys the history document, so it must be stable across runs of the same
//! logical checkpoint and distinct between checkpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(String);

impl CheckpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `<file>:<line>`, the same shape call-site derived ids use
    pub fn from_location(file: &str, line: u32) -> Self {
        Self(format!("{}:{}", file, line))
    }

    /// Id of the source location that called this function.
    ///
    /// Propagates through any chain of `#[track_caller]` functions, so
    /// `DriftDetector::validate_here` resolves to the user's call site.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::from_location(location.file(), location.line())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CheckpointId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CheckpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for CheckpointId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
