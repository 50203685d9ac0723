//! Table construction interception
//!
//! `Interceptor` wraps a function that builds a table and validates every
//! table it produces. The caller constructs and owns it; nothing is installed
//! globally, and unwrapped constructors are never validated.

use crate::checkpoint::CheckpointId;
use crate::detector::{DriftDetector, Validation};
use crate::error::{DriftError, DriftResult};
use crate::table::TableAdapter;
use tracing::debug;

pub struct Interceptor<'d, F> {
    detector: &'d DriftDetector,
    checkpoint_id: CheckpointId,
    producer: F,
}

impl<'d, F> Interceptor<'d, F> {
    /// Wrap `producer`, using the line that creates the interceptor as checkpoint
    #[track_caller]
    pub fn new(detector: &'d DriftDetector, producer: F) -> Self {
        Self::with_checkpoint(detector, CheckpointId::caller(), producer)
    }

    pub fn with_checkpoint(detector: &'d DriftDetector, checkpoint_id: CheckpointId, producer: F) -> Self {
        Self {
            detector,
            checkpoint_id,
            producer,
        }
    }

    pub fn checkpoint_id(&self) -> &CheckpointId {
        &self.checkpoint_id
    }

    /// Build a table with the wrapped function, validate it, and hand it back.
    ///
    /// Producer errors are converted and returned before any validation.
    pub fn call<A, T, E>(&self, args: A) -> DriftResult<T>
    where
        F: Fn(A) -> Result<T, E>,
        T: TableAdapter,
        E: Into<DriftError>,
    {
        self.call_with_outcome(args).map(|(table, _)| table)
    }

    /// Like `call`, also returning what the validation found
    pub fn call_with_outcome<A, T, E>(&self, args: A) -> DriftResult<(T, Validation)>
    where
        F: Fn(A) -> Result<T, E>,
        T: TableAdapter,
        E: Into<DriftError>,
    {
        let table = (self.producer)(args).map_err(Into::into)?;
        let outcome = self.detector.validate_table(&self.checkpoint_id, &table)?;
        debug!("Intercepted table at {}: {:?}", self.checkpoint_id, outcome);
        Ok((table, outcome))
    }
}
