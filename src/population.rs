use crate::agent::Agent;
use crate::config::Config;
use crate::genetics::{Gene, Genome, create_profile, variant::VariantId, variant::VariantRegistry};
use crate::stats::{Accumulator, Statistics};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use std::collections::{BTreeMap, VecDeque};

/// Live agents of a run together with their statistics and history.
#[derive(Debug)]
pub struct Population {
    agt_vec: Vec<Agent>,
    next_id: u64,
    generation: u64,
    statistics: Statistics,
    history: VecDeque<Statistics>,
    history_limit: Option<usize>,
    registry: VariantRegistry,
}

impl Population {
    /// Create the founding population described by `cfg`.
    pub fn new<R: Rng + ?Sized>(cfg: &Config, rng: &mut R) -> Result<Self> {
        let mut pop = Self {
            agt_vec: Vec::new(),
            next_id: 0,
            generation: 0,
            statistics: Statistics::empty(0),
            history: VecDeque::new(),
            history_limit: cfg.simulation.history_limit,
            registry: VariantRegistry::new(),
        };
        pop.reset(cfg, rng)?;
        Ok(pop)
    }

    /// Discard every agent, the history and the known variants, then create
    /// a new founding population.
    ///
    /// Founders that cannot be constructed are skipped with a warning; the
    /// reset only fails if none can be.
    pub fn reset<R: Rng + ?Sized>(&mut self, cfg: &Config, rng: &mut R) -> Result<()> {
        self.agt_vec.clear();
        self.next_id = 0;
        self.generation = 0;
        self.statistics = Statistics::empty(0);
        self.history.clear();
        self.history_limit = cfg.simulation.history_limit;
        self.registry.reset();

        let n_agt = cfg.simulation.initial_population;
        self.agt_vec.reserve(n_agt);

        let mut n_failed = 0;
        for _ in 0..n_agt {
            let genome = create_profile(cfg.simulation.initial_mode, &cfg.genetics, rng)
                .context("failed to create genetic profile")?;
            let id = self.allocate_id();
            match Agent::new(id, genome, cfg) {
                Ok(agt) => self.add(agt),
                Err(error) => {
                    log::warn!("failed to create founder {id}: {error}");
                    n_failed += 1;
                }
            }
        }

        if self.agt_vec.is_empty() {
            bail!("failed to create any of the {n_agt} founders");
        }
        if n_failed > 0 {
            log::warn!("created {}/{n_agt} founders", n_agt - n_failed);
        }

        // The pool starts full.
        self.statistics = self.compute_statistics(0, 0, cfg.resources.capacity);
        Ok(())
    }

    /// Reserve a fresh agent id.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Id the next allocated agent will get.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Append an agent and register its variant.
    ///
    /// Later allocations never reuse the agent's id.
    pub fn add(&mut self, agt: Agent) {
        if self.registry.register(agt.variant_id(), agt.genome()) {
            log::debug!("new variant {}", agt.variant_id());
        }
        self.next_id = self.next_id.max(agt.id() + 1);
        self.agt_vec.push(agt);
    }

    /// Remove the agent with the given id, returning it if present.
    pub fn remove(&mut self, id: u64) -> Option<Agent> {
        let i_agt = self.agt_vec.iter().position(|agt| agt.id() == id)?;
        Some(self.agt_vec.remove(i_agt))
    }

    /// Drop every agent that is no longer alive, keeping the order of the
    /// others. Returns the number of agents dropped.
    pub fn evict_dead(&mut self) -> usize {
        let n_before = self.agt_vec.len();
        self.agt_vec.retain(Agent::is_alive);
        n_before - self.agt_vec.len()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agt_vec
    }

    pub fn agent_mut(&mut self, i_agt: usize) -> Option<&mut Agent> {
        self.agt_vec.get_mut(i_agt)
    }

    pub fn living(&self) -> impl Iterator<Item = &Agent> {
        self.agt_vec.iter().filter(|agt| agt.is_alive())
    }

    pub fn living_count(&self) -> usize {
        self.living().count()
    }

    pub fn by_variant<'a>(&'a self, id: &'a VariantId) -> impl Iterator<Item = &'a Agent> {
        self.living().filter(move |agt| agt.variant_id() == id)
    }

    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Last `n` snapshots, or all of them, oldest first.
    pub fn history(&self, n: Option<usize>) -> Vec<Statistics> {
        let skip = n.map_or(0, |n| self.history.len().saturating_sub(n));
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Count living agents per variant.
    pub fn population_by_variant(&self) -> BTreeMap<VariantId, usize> {
        let mut counts = BTreeMap::new();
        for agt in self.living() {
            *counts.entry(agt.variant_id().clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Mean genome of the living agents, all zero if there are none.
    pub fn average_genome(&self) -> Genome {
        let mut acc_vec: Vec<_> = Gene::ALL.iter().map(|_| Accumulator::new()).collect();
        for agt in self.living() {
            for (gene, acc) in Gene::ALL.into_iter().zip(acc_vec.iter_mut()) {
                acc.add(agt.genome().get(gene));
            }
        }

        let mut avg = Genome::zeroed();
        for (gene, acc) in Gene::ALL.into_iter().zip(acc_vec.iter()) {
            avg.set(gene, acc.mean());
        }
        avg
    }

    /// Close the current generation: bump the counter, recompute the
    /// statistics and append them to the history.
    ///
    /// # Errors
    /// Fails if the aggregated statistics are not finite.
    pub fn advance_generation(&mut self, births: usize, deaths: usize, pool_amount: f64) -> Result<()> {
        self.generation += 1;

        let stats = self.compute_statistics(births, deaths, pool_amount);
        check_statistics(&stats).context("invalid statistics")?;
        self.statistics = stats;

        self.history.push_back(self.statistics.clone());
        if let Some(limit) = self.history_limit {
            while self.history.len() > limit {
                self.history.pop_front();
            }
        }
        Ok(())
    }

    fn compute_statistics(&self, births: usize, deaths: usize, pool_amount: f64) -> Statistics {
        let mut res_acc = Accumulator::new();
        let mut age_acc = Accumulator::new();
        for agt in self.living() {
            res_acc.add(agt.resources());
            age_acc.add(agt.age() as f64);
        }

        let population_by_variant = self.population_by_variant();
        Statistics {
            generation: self.generation,
            total_population: self.living_count(),
            unique_variants: population_by_variant.len(),
            population_by_variant,
            average_genome: self.average_genome(),
            average_resources: res_acc.mean(),
            average_age: age_acc.mean(),
            births,
            deaths,
            pool_amount,
        }
    }
}

fn check_statistics(stats: &Statistics) -> Result<()> {
    if let Some((gene, val)) = stats.average_genome.first_non_finite() {
        bail!("average {gene} is not finite: {val}");
    }
    for (name, val) in [
        ("average resources", stats.average_resources),
        ("average age", stats.average_age),
        ("pool amount", stats.pool_amount),
    ] {
        if !val.is_finite() {
            bail!("{name} is not finite: {val}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitialMode, TraitSetting};
    use rand_chacha::ChaCha12Rng;

    fn fixed_config(n_agt: usize) -> Config {
        let mut cfg = Config::default();
        cfg.simulation.initial_population = n_agt;
        cfg.simulation.initial_mode = InitialMode::Fixed;
        cfg
    }

    #[test]
    fn founders_share_a_variant_in_fixed_mode() {
        let cfg = fixed_config(5);
        let mut rng = ChaCha12Rng::seed_from_u64(0);

        let pop = Population::new(&cfg, &mut rng).unwrap();

        assert_eq!(pop.living_count(), 5);
        assert_eq!(pop.registry().len(), 1);
        let stats = pop.statistics();
        assert_eq!(stats.generation, 0);
        assert_eq!(stats.unique_variants, 1);
        assert_eq!(stats.average_genome, Genome::default());
        assert_eq!(stats.pool_amount, cfg.resources.capacity);
        let ids: Vec<_> = pop.agents().iter().map(Agent::id).collect();
        assert_eq!(ids, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn unusable_founders_fail_the_reset() {
        let mut cfg = fixed_config(3);
        cfg.genetics.traits.insert(
            Gene::ReplicationRate,
            TraitSetting {
                min: 0.0,
                max: 1.0,
                default: 0.0,
            },
        );
        let mut rng = ChaCha12Rng::seed_from_u64(0);

        assert!(Population::new(&cfg, &mut rng).is_err());
    }

    #[test]
    fn history_is_bounded_and_sliced_from_the_end() {
        let mut cfg = fixed_config(2);
        cfg.simulation.history_limit = Some(3);
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut pop = Population::new(&cfg, &mut rng).unwrap();

        for _ in 0..5 {
            pop.advance_generation(0, 0, 0.0).unwrap();
        }

        let gens: Vec<_> = pop.history(None).iter().map(|s| s.generation).collect();
        assert_eq!(gens, [3, 4, 5]);
        let gens: Vec<_> = pop.history(Some(2)).iter().map(|s| s.generation).collect();
        assert_eq!(gens, [4, 5]);
        assert_eq!(pop.history(Some(10)).len(), 3);
    }

    #[test]
    fn eviction_and_statistics_ignore_the_dead() {
        let cfg = fixed_config(4);
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut pop = Population::new(&cfg, &mut rng).unwrap();

        pop.agents_mut()[1].kill();
        pop.agents_mut()[2].set_resources(300.0);
        pop.advance_generation(2, 1, 10.0).unwrap();

        let stats = pop.statistics();
        assert_eq!(stats.total_population, 3);
        assert!((stats.average_resources - 500.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.births, 2);
        assert_eq!(stats.deaths, 1);

        assert_eq!(pop.evict_dead(), 1);
        assert_eq!(pop.agents().len(), 3);
        assert!(pop.remove(3).is_some());
        assert!(pop.remove(1).is_none());
    }

    #[test]
    fn genomes_equal_at_precision_share_a_variant() {
        let mut cfg = fixed_config(1);
        cfg.genetics.variant_precision = 2;
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut pop = Population::new(&cfg, &mut rng).unwrap();
        pop.agents_mut()[0].kill();
        pop.evict_dead();

        for strength in [0.5001, 0.4999] {
            let genome = Genome {
                strength,
                ..Genome::default()
            };
            let id = pop.allocate_id();
            pop.add(Agent::new(id, genome, &cfg).unwrap());
        }
        pop.advance_generation(2, 1, 0.0).unwrap();

        let agts = pop.agents();
        assert_eq!(agts[0].variant_id(), agts[1].variant_id());
        assert_eq!(pop.statistics().unique_variants, 1);
        assert_eq!(pop.next_id(), 3);
    }

    #[test]
    fn reset_clears_registry_and_history() {
        let mut cfg = fixed_config(2);
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut pop = Population::new(&cfg, &mut rng).unwrap();
        pop.advance_generation(0, 0, 0.0).unwrap();
        let old_variant = pop.agents()[0].variant_id().clone();

        cfg.genetics.traits.insert(
            Gene::Strength,
            TraitSetting {
                min: 0.0,
                max: 1.0,
                default: 0.9,
            },
        );
        pop.reset(&cfg, &mut rng).unwrap();

        assert_eq!(pop.generation(), 0);
        assert!(pop.history(None).is_empty());
        assert_eq!(pop.registry().len(), 1);
        assert!(pop.registry().genome(&old_variant).is_none());
        assert_eq!(pop.by_variant(&old_variant).count(), 0);
    }
}
