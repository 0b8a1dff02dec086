use thiserror::Error;

use crate::world::UnitKind;

/// Failures inside the observation -> decision and observation -> train paths.
///
/// Underfull sample groups are deliberately not an error; the repository
/// signals them with a plain `false` and the cycle is skipped.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("observing agent is not alive in the world")]
    MissingAgent,

    #[error("{count} {kind:?} feature groups exceed the packing capacity of {capacity}")]
    TooManyNeighbors {
        kind: UnitKind,
        count: usize,
        capacity: usize,
    },

    #[error("tensor data error: {0}")]
    Tensor(String),

    #[error("batch contains no observations")]
    EmptyBatch,
}
