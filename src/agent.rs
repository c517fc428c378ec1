use crate::config::{Config, Lifespan};
use crate::error::AgentError;
use crate::genetics::{Gene, Genome, variant::VariantId};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Single organism of the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    id: u64,
    genome: Genome,
    age: u32,
    resources: f64,
    replication_timer: f64,
    max_age: f64,
    variant_id: VariantId,
    alive: bool,
}

impl Agent {
    /// Create a new agent with the configured initial resources.
    ///
    /// # Errors
    /// Fails if any gene is not finite, if the replication rate is not
    /// positive, or if the initial resources are negative.
    pub fn new(id: u64, mut genome: Genome, cfg: &Config) -> Result<Self, AgentError> {
        if let Some((gene, val)) = genome.first_non_finite() {
            return Err(AgentError::NonFiniteGene { gene, val });
        }
        genome.clamp_to_bounds();

        if genome.replication_rate <= 0.0 {
            return Err(AgentError::NonPositiveReplicationRate(
                genome.replication_rate,
            ));
        }

        let resources = cfg.resources.initial_amount;
        if !(resources >= 0.0) {
            return Err(AgentError::NegativeInitialResources(resources));
        }

        let max_age = match cfg.lifespan {
            Lifespan::ConsumptionDerived {
                lifetime_consumption,
            } => lifetime_consumption / genome.consumption_rate,
            Lifespan::Flat { lifespan } => lifespan as f64,
        };

        Ok(Self {
            id,
            genome,
            age: 0,
            resources,
            replication_timer: 1.0 / genome.replication_rate,
            max_age,
            variant_id: VariantId::from_genome(&genome, cfg.genetics.variant_precision),
            alive: true,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn genome_mut(&mut self) -> &mut Genome {
        &mut self.genome
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn resources(&self) -> f64 {
        self.resources
    }

    pub fn replication_timer(&self) -> f64 {
        self.replication_timer
    }

    pub fn max_age(&self) -> f64 {
        self.max_age
    }

    pub fn variant_id(&self) -> &VariantId {
        &self.variant_id
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// Advance the agent by one step.
    pub fn tick(&mut self) {
        self.age = self.age.saturating_add(1);
        self.replication_timer = (self.replication_timer - 1.0).max(0.0);
    }

    /// Take `amount` out of the shared pool.
    ///
    /// Only `amount * utilization_factor` is kept; the rest is wasted. The
    /// full amount is returned since that is what leaves the pool.
    pub fn absorb_resources(&mut self, amount: f64) -> f64 {
        self.resources += amount * self.genome.utilization_factor;
        amount
    }

    /// Spend up to `amount` of the balance, which never drops below zero.
    pub fn consume_resources(&mut self, amount: f64) {
        self.resources = (self.resources - amount).max(0.0);
    }

    pub fn can_reproduce(&self, reproduction_cost: f64) -> bool {
        self.replication_timer <= 0.0 && self.resources >= reproduction_cost
    }

    /// Restart the countdown to the next reproduction attempt.
    ///
    /// The base period `1 / replication_rate` is jittered by up to
    /// `±spawn_randomness` of itself.
    pub fn reset_replication_timer<R: Rng + ?Sized>(
        &mut self,
        spawn_randomness: f64,
        rng: &mut R,
    ) -> Result<(), AgentError> {
        let rate = self.genome.replication_rate;
        if !(rate > 0.0) {
            return Err(AgentError::NonPositiveReplicationRate(rate));
        }

        let jitter: f64 = rng.random_range(-1.0..=1.0);
        let timer = (1.0 / rate) * (1.0 + jitter * spawn_randomness);
        if !timer.is_finite() {
            return Err(AgentError::NonFiniteState {
                field: "replication timer",
                val: timer,
            });
        }
        self.replication_timer = timer.max(0.0);
        Ok(())
    }

    pub fn should_die_from_age(&self) -> bool {
        self.age as f64 >= self.max_age
    }

    pub fn should_die_from_starvation(&self, starvation_threshold: f64) -> bool {
        self.resources <= starvation_threshold
    }

    /// Strength used to weight the agent's share of the pool.
    ///
    /// Base strength plus a bonus proportional to how close the consumption
    /// rate is to its maximum.
    pub fn effective_strength(&self, consumption_bonus: f64) -> f64 {
        let max_rate = Gene::ConsumptionRate.bounds().max;
        self.genome.strength + consumption_bonus * (self.genome.consumption_rate / max_rate)
    }

    /// Check the numeric state after an update.
    ///
    /// Out-of-range genes and a negative balance are clamped with a warning.
    /// Non-finite values cannot be repaired and are returned as errors.
    pub fn validate(&mut self) -> Result<(), AgentError> {
        if let Some((gene, val)) = self.genome.first_non_finite() {
            return Err(AgentError::NonFiniteGene { gene, val });
        }
        for (field, val) in [
            ("resources", self.resources),
            ("replication timer", self.replication_timer),
        ] {
            if !val.is_finite() {
                return Err(AgentError::NonFiniteState { field, val });
            }
        }

        let n_clamped = self.genome.clamp_to_bounds();
        if n_clamped > 0 {
            log::warn!("agent {} had {n_clamped} genes out of bounds", self.id);
        }
        if self.resources < 0.0 {
            log::warn!("agent {} had negative resources {}", self.id, self.resources);
            self.resources = 0.0;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_resources(&mut self, resources: f64) {
        self.resources = resources;
    }

    #[cfg(test)]
    pub(crate) fn set_age(&mut self, age: u32) {
        self.age = age;
    }
}
