//! Error taxonomy of a study run.
//!
//! Functions of the crate return `anyhow::Result`, the failures that have a domain meaning
//! are built from [StudyError] so that a caller can recover the kind with
//! `err.downcast_ref::<StudyError>()`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyError {
    /// unresolvable organism / network set / method combination, or an option value
    /// that cannot be parsed at first use.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// malformed edge line, non numeric field, node identifier out of range ...
    #[error("data format error: {0}")]
    DataFormat(String),

    /// an artifact selected by the cache policy could not be used.
    #[error("cache consistency error: {0}")]
    CacheConsistency(String),

    /// degenerate input for a clustering routine.
    #[error("clustering error: {0}")]
    ClusteringAlgorithm(String),
}

impl StudyError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        StudyError::Configuration(msg.into())
    }

    pub fn data_format(msg: impl Into<String>) -> Self {
        StudyError::DataFormat(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        StudyError::CacheConsistency(msg.into())
    }

    pub fn clustering(msg: impl Into<String>) -> Self {
        StudyError::ClusteringAlgorithm(msg.into())
    }
} // end of impl StudyError
