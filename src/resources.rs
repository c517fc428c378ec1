use crate::agent::Agent;
use crate::config::ResourceConfig;
use serde::{Deserialize, Serialize};

/// Shared, capacity-bounded resource store.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    capacity: f64,
    replenish_rate: f64,
    consumption_bonus: f64,
    current: f64,
}

/// Result of a single distribution round.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Distribution {
    /// Sum of the shares handed out.
    pub distributed: f64,
    /// Sum of the amounts the agents reported as removed from the pool.
    pub absorbed: f64,
    /// Pool level after the round.
    pub remaining: f64,
}

/// Snapshot of the pool for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolReport {
    pub current: f64,
    pub capacity: f64,
    pub replenish_rate: f64,
    pub utilization: f64,
}

impl ResourcePool {
    /// Create a full pool.
    pub fn new(cfg: &ResourceConfig) -> Self {
        Self {
            capacity: cfg.capacity,
            replenish_rate: cfg.replenish_rate,
            consumption_bonus: cfg.consumption_strength_bonus,
            current: cfg.capacity,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Add one step worth of resources, up to capacity.
    pub fn replenish(&mut self) {
        self.current = (self.current + self.replenish_rate).min(self.capacity);
    }

    /// Hand out the pool to the living agents in proportion to their
    /// effective strength.
    ///
    /// Agents are served in order, each share computed from what is left, so
    /// later agents may get less than their proportional share once the pool
    /// runs dry. The pool loses exactly what the agents absorb.
    pub fn distribute(&mut self, agents: &mut [Agent]) -> Distribution {
        let bonus = self.consumption_bonus;
        let total_strength: f64 = agents
            .iter()
            .filter(|agt| agt.is_alive())
            .map(|agt| agt.effective_strength(bonus))
            .sum();

        let mut report = Distribution::default();
        if total_strength <= 0.0 || self.current <= 0.0 {
            report.remaining = self.current;
            return report;
        }

        for agt in agents.iter_mut().filter(|agt| agt.is_alive()) {
            if self.current <= 0.0 {
                break;
            }
            let share = agt.effective_strength(bonus) / total_strength * self.current;
            let amount = share.min(self.current);

            let absorbed = agt.absorb_resources(amount);
            self.current = (self.current - absorbed).max(0.0);

            report.distributed += amount;
            report.absorbed += absorbed;
        }

        report.remaining = self.current;
        report
    }

    /// Refill the pool to capacity.
    pub fn reset(&mut self) {
        self.current = self.capacity;
    }

    pub fn report(&self) -> PoolReport {
        PoolReport {
            current: self.current,
            capacity: self.capacity,
            replenish_rate: self.replenish_rate,
            utilization: if self.capacity > 0.0 {
                1.0 - self.current / self.capacity
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::genetics::Genome;

    fn pool(capacity: f64, replenish_rate: f64) -> ResourcePool {
        let mut cfg = Config::default().resources;
        cfg.capacity = capacity;
        cfg.replenish_rate = replenish_rate;
        ResourcePool::new(&cfg)
    }

    fn agents(strengths: &[f64]) -> Vec<Agent> {
        let cfg = Config::default();
        strengths
            .iter()
            .enumerate()
            .map(|(i_agt, &strength)| {
                let genome = Genome {
                    strength,
                    consumption_rate: 1.0,
                    utilization_factor: 0.5,
                    ..Genome::default()
                };
                Agent::new(i_agt as u64, genome, &cfg).unwrap()
            })
            .collect()
    }

    #[test]
    fn replenish_is_capped_at_capacity() {
        let mut pool = pool(100.0, 1000.0);
        pool.current = 0.0;

        pool.replenish();

        assert_eq!(pool.current(), 100.0);
    }

    #[test]
    fn distribution_conserves_resources() {
        let mut pool = pool(1000.0, 0.0);
        let mut agts = agents(&[0.2, 0.5, 0.9, 0.0]);
        let before: Vec<f64> = agts.iter().map(Agent::resources).collect();

        let report = pool.distribute(&mut agts);

        assert!(report.absorbed > 0.0);
        assert!((1000.0 - report.absorbed - pool.current()).abs() < 1e-9);
        assert_eq!(report.remaining, pool.current());
        assert!(pool.current() >= 0.0);
        for (agt, res) in agts.iter().zip(before) {
            assert!(agt.resources() > res);
        }
    }

    #[test]
    fn dead_agents_are_skipped() {
        let mut pool = pool(100.0, 0.0);
        let mut agts = agents(&[0.5, 0.5]);
        agts[0].kill();
        let before = agts[0].resources();

        pool.distribute(&mut agts);

        assert_eq!(agts[0].resources(), before);
        assert!(agts[1].resources() > before);
    }

    #[test]
    fn empty_pool_distributes_nothing() {
        let mut pool = pool(0.0, 0.0);
        let mut agts = agents(&[0.5]);

        let report = pool.distribute(&mut agts);

        assert_eq!(report, Distribution::default());
        assert_eq!(pool.report().utilization, 0.0);
    }
}
