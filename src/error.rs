//! Error types for forecast pipeline operations.
//!
//! Defines error types shared across subsystems:
//! - Run identifier parsing
//! - Remote forecast feed access
//! - External stage producer invocation
//!
//! Module-specific errors (configuration, pipeline control, index building)
//! live next to the code that raises them.

use thiserror::Error;

/// Errors that can occur while parsing a run identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunIdError {
    #[error("run id must be exactly 14 characters, got {0}")]
    InvalidLength(usize),

    #[error("run id must be entirely numeric: '{0}'")]
    NotNumeric(String),
}

/// Errors that can occur while listing the remote forecast feed.
///
/// Any feed error aborts the whole batch: without the feed, completeness
/// of local runs cannot be judged against what should exist.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("forecast feed unavailable: {0}")]
    Unavailable(String),

    #[error("forecast feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("forecast feed returned no runs")]
    Empty,
}

/// Errors that can occur when invoking an external stage producer.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("no command configured for the {stage} producer")]
    EmptyCommand { stage: &'static str },

    #[error("failed to launch the {stage} producer: {source}")]
    Launch {
        stage: &'static str,
        source: std::io::Error,
    },

    #[error("{stage} producer exited with code {code}: {stderr}")]
    NonZeroExit {
        stage: &'static str,
        code: i32,
        stderr: String,
    },
}
