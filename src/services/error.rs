//! Service Layer Error Types
//!
//! Error types for the reconstruction pipeline. Gateway implementations
//! return `anyhow::Result`; the services wrap those failures with enough
//! context (direction, round, what was being fetched) to diagnose a failed
//! reconstruction. Nothing is swallowed: any fetch failure is terminal for
//! the whole attempt and no partial hierarchy is returned.

use crate::models::{FilterParseError, TypeTag};
use std::fmt;
use thiserror::Error;

/// Which way an expansion round was walking the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Down => f.write_str("downward"),
            Direction::Up => f.write_str("upward"),
        }
    }
}

/// Errors terminating a reconstruction attempt
#[derive(Error, Debug)]
pub enum ReconstructionError {
    /// The caller's seed filter could not be parsed; reported before any
    /// fetch is issued.
    #[error("seed filter is malformed: {0}")]
    MalformedFilter(#[from] FilterParseError),

    /// The initial seed query failed.
    #[error("seed fetch for type '{entity_type}' failed: {source}")]
    SeedFetchFailed {
        entity_type: TypeTag,
        #[source]
        source: anyhow::Error,
    },

    /// A fetch inside an expansion round failed; the traversal is
    /// abandoned with no partial result.
    #[error("{direction} expansion failed in round {round} while fetching {detail}: {source}")]
    ExpansionFailed {
        direction: Direction,
        round: usize,
        detail: String,
        #[source]
        source: anyhow::Error,
    },
}
