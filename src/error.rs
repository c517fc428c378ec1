use crate::genetics::Gene;
use thiserror::Error;

/// Failure of a single agent.
///
/// Never aborts a generation: the pipeline logs it, retires the agent and
/// moves on to the next one.
#[derive(Debug, Error, PartialEq)]
pub enum AgentError {
    #[error("gene {gene} must be finite, but is {val}")]
    NonFiniteGene { gene: Gene, val: f64 },
    #[error("{field} must be finite, but is {val}")]
    NonFiniteState { field: &'static str, val: f64 },
    #[error("replication rate must be positive, but is {0}")]
    NonPositiveReplicationRate(f64),
    #[error("initial resources must be non-negative, but are {0}")]
    NegativeInitialResources(f64),
}
