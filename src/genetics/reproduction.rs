//! Reproduction attempts of a single parent.

use super::mutation::offspring_genome;
use crate::agent::Agent;
use crate::config::Config;
use anyhow::{Context, Result};
use rand::prelude::*;

/// Base probability that an attempt succeeds.
const BASE_SUCCESS_PROBABILITY: f64 = 0.5;

/// Probability that a parent with the given attractiveness reproduces.
pub fn success_probability(attractiveness: f64, attractiveness_weight: f64) -> f64 {
    BASE_SUCCESS_PROBABILITY + attractiveness * attractiveness_weight * 0.5
}

/// Outcome of a reproduction attempt.
#[derive(Debug)]
pub enum Attempt {
    /// Parent could not pay the cost.
    Unaffordable,
    /// Parent could pay but the draw failed.
    Rejected,
    /// A new agent was born.
    Born(Agent),
}

/// Let `parent` try to produce an offspring with the given id.
///
/// On success the parent pays the reproduction cost and the offspring genome
/// is derived from the parent's current genome. Resetting the parent's
/// replication timer is up to the caller and happens regardless of outcome.
///
/// # Errors
/// Fails if the offspring genome cannot be derived or the offspring cannot
/// be constructed. The parent has already paid in the latter case.
pub fn attempt_reproduction<R: Rng + ?Sized>(
    parent: &mut Agent,
    offspring_id: u64,
    cfg: &Config,
    rng: &mut R,
) -> Result<Attempt> {
    let cost = cfg.reproduction.cost;
    if parent.resources() < cost {
        return Ok(Attempt::Unaffordable);
    }

    let prob = success_probability(
        parent.genome().attractiveness,
        cfg.reproduction.attractiveness_weight,
    );
    let draw: f64 = rng.random();
    if draw > prob {
        return Ok(Attempt::Rejected);
    }

    parent.consume_resources(cost);

    let genome = offspring_genome(parent.genome(), &cfg.mutation, &cfg.genetics, rng)
        .context("failed to derive offspring genome")?;
    let offspring = Agent::new(offspring_id, genome, cfg)
        .with_context(|| format!("failed to construct offspring of agent {}", parent.id()))?;

    Ok(Attempt::Born(offspring))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::Genome;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn success_probability_peaks_at_full_attractiveness() {
        assert_eq!(success_probability(0.0, 0.7), 0.5);
        assert!((success_probability(1.0, 0.7) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn poor_parent_cannot_reproduce() {
        let cfg = Config::default();
        let mut parent = Agent::new(0, Genome::default(), &cfg).unwrap();
        parent.consume_resources(60.0);
        let mut rng = ChaCha12Rng::seed_from_u64(0);

        let attempt = attempt_reproduction(&mut parent, 1, &cfg, &mut rng).unwrap();

        assert!(matches!(attempt, Attempt::Unaffordable));
        assert_eq!(parent.resources(), 40.0);
    }

    #[test]
    fn successful_attempt_charges_parent() {
        let mut cfg = Config::default();
        cfg.reproduction.attractiveness_weight = 1.0;
        let genome = Genome {
            attractiveness: 1.0,
            ..Genome::default()
        };
        let mut rng = ChaCha12Rng::seed_from_u64(4);

        let mut n_born = 0;
        for i_try in 0..50 {
            let mut parent = Agent::new(0, genome, &cfg).unwrap();
            match attempt_reproduction(&mut parent, i_try + 1, &cfg, &mut rng).unwrap() {
                Attempt::Born(child) => {
                    n_born += 1;
                    assert_eq!(parent.resources(), 50.0);
                    assert_eq!(child.id(), i_try + 1);
                    assert_eq!(child.resources(), cfg.resources.initial_amount);
                    assert!(child.genome().is_within_bounds());
                }
                Attempt::Rejected => assert_eq!(parent.resources(), 100.0),
                Attempt::Unaffordable => panic!("parent can afford the cost"),
            }
        }
        assert!(n_born > 25);
    }
}
