//! Removal of agents by age, starvation and weighted fitness.

use crate::agent::Agent;
use crate::config::SurvivalConfig;
use rand::prelude::*;

const GENETIC_SHARE: f64 = 0.7;
const RESOURCE_SHARE: f64 = 0.3;

/// Fitness of an agent in `[0, 1]`, from its genes and its balance.
pub fn survival_score(agt: &Agent, cfg: &SurvivalConfig) -> f64 {
    let genome = agt.genome();
    let genetic_score =
        cfg.strength_weight * genome.strength + cfg.intelligence_weight * genome.intelligence;
    let resource_score = (agt.resources() / cfg.reference_amount).min(1.0);

    (GENETIC_SHARE * genetic_score + RESOURCE_SHARE * resource_score).clamp(0.0, 1.0)
}

/// Noisy threshold test on a survival score.
pub fn survives<R: Rng + ?Sized>(score: f64, cfg: &SurvivalConfig, rng: &mut R) -> bool {
    let noise: f64 = rng.random_range(-1.0..=1.0);
    score + noise * cfg.random_factor >= cfg.threshold
}

/// Kill every living agent that reached its maximum age.
///
/// Returns the number of agents killed.
pub fn apply_natural_death(agents: &mut [Agent]) -> usize {
    let mut n_dead = 0;
    for agt in agents.iter_mut().filter(|agt| agt.is_alive()) {
        if agt.should_die_from_age() {
            agt.kill();
            n_dead += 1;
        }
    }
    n_dead
}

/// Kill starving agents, then every agent failing the survival test.
///
/// Starving agents are removed without drawing a random number.
/// Returns the number of agents killed.
pub fn apply_survival<R: Rng + ?Sized>(
    agents: &mut [Agent],
    cfg: &SurvivalConfig,
    starvation_threshold: f64,
    rng: &mut R,
) -> usize {
    let mut n_dead = 0;
    for agt in agents.iter_mut().filter(|agt| agt.is_alive()) {
        if agt.should_die_from_starvation(starvation_threshold) {
            agt.kill();
            n_dead += 1;
            continue;
        }

        let score = survival_score(agt, cfg);
        if !survives(score, cfg, rng) {
            agt.kill();
            n_dead += 1;
        }
    }
    n_dead
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Lifespan};
    use crate::genetics::Genome;
    use rand_chacha::ChaCha12Rng;

    fn strong_genome() -> Genome {
        Genome {
            strength: 1.0,
            intelligence: 1.0,
            ..Genome::default()
        }
    }

    #[test]
    fn score_combines_genes_and_resources() {
        let cfg = Config::default();
        let mut agt = Agent::new(0, strong_genome(), &cfg).unwrap();
        assert!((survival_score(&agt, &cfg.survival) - 1.0).abs() < 1e-12);

        agt.consume_resources(50.0);
        assert!((survival_score(&agt, &cfg.survival) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn starving_agents_die_despite_high_score() {
        let mut cfg = Config::default();
        cfg.survival.random_factor = 0.0;
        let mut agts = vec![Agent::new(0, strong_genome(), &cfg).unwrap()];
        agts[0].consume_resources(1e9);
        let mut rng = ChaCha12Rng::seed_from_u64(3);

        let n_dead = apply_survival(&mut agts, &cfg.survival, 0.0, &mut rng);

        assert_eq!(n_dead, 1);
        assert!(!agts[0].is_alive());
    }

    #[test]
    fn deterministic_threshold_without_noise() {
        let mut cfg = Config::default();
        cfg.survival.random_factor = 0.0;
        cfg.survival.threshold = 0.5;
        let weak = Genome {
            strength: 0.0,
            intelligence: 0.0,
            ..Genome::default()
        };
        let mut agts = vec![
            Agent::new(0, strong_genome(), &cfg).unwrap(),
            Agent::new(1, weak, &cfg).unwrap(),
        ];
        let mut rng = ChaCha12Rng::seed_from_u64(3);

        let n_dead = apply_survival(&mut agts, &cfg.survival, 0.0, &mut rng);

        assert_eq!(n_dead, 1);
        assert!(agts[0].is_alive());
        assert!(!agts[1].is_alive());
    }

    #[test]
    fn natural_death_is_deterministic() {
        let mut cfg = Config::default();
        cfg.lifespan = Lifespan::Flat { lifespan: 3 };
        let mut agts: Vec<_> = (0..3)
            .map(|id| Agent::new(id, Genome::default(), &cfg).unwrap())
            .collect();
        agts[0].set_age(3);
        agts[1].set_age(2);
        agts[2].set_age(9);
        agts[2].kill();

        assert_eq!(apply_natural_death(&mut agts), 1);
        assert!(!agts[0].is_alive());
        assert!(agts[1].is_alive());
    }
}
