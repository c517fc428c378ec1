//! Evolutionary population simulation.
//!
//! Agents carry a genome of eight traits, compete for a shared resource pool,
//! reproduce with mutation and die of age, starvation or low fitness. The
//! [`engine::Engine`] runs the generation pipeline and exposes the control
//! surface; [`manager::Manager`] drives whole runs from a simulation dir.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod genetics;
pub mod manager;
pub mod population;
pub mod resources;
pub mod stats;
pub mod survival;

pub use config::Config;
pub use engine::{Engine, EngineState, Observer, StepOutcome};
pub use error::AgentError;
