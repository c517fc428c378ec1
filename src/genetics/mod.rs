//! Genetic traits, their valid ranges and the profile factory.

pub mod interactions;
pub mod mutation;
pub mod reproduction;
pub mod variant;

use crate::config::{GeneticsConfig, InitialMode};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed range a gene value must stay in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    const UNIT: Bounds = Bounds { min: 0.0, max: 1.0 };

    pub fn contains(&self, val: f64) -> bool {
        val >= self.min && val <= self.max
    }

    pub fn clamp(&self, val: f64) -> f64 {
        val.clamp(self.min, self.max)
    }
}

/// Named heritable trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gene {
    ReplicationRate,
    Attractiveness,
    Strength,
    MutationChance,
    Intelligence,
    ResourceEfficiency,
    ConsumptionRate,
    UtilizationFactor,
}

impl Gene {
    /// Every gene, in the fixed order used for iteration and variant keys.
    pub const ALL: [Gene; 8] = [
        Gene::Attractiveness,
        Gene::ConsumptionRate,
        Gene::Intelligence,
        Gene::MutationChance,
        Gene::ReplicationRate,
        Gene::ResourceEfficiency,
        Gene::Strength,
        Gene::UtilizationFactor,
    ];

    /// Hard bounds of the gene. No configuration can widen them.
    pub fn bounds(self) -> Bounds {
        match self {
            Gene::ConsumptionRate => Bounds {
                min: 1.0,
                max: 10.0,
            },
            Gene::UtilizationFactor => Bounds { min: 0.1, max: 1.0 },
            _ => Bounds::UNIT,
        }
    }

    /// System default used in fixed mode when the gene is not configured.
    pub fn default_value(self) -> f64 {
        match self {
            Gene::MutationChance => 0.1,
            Gene::ConsumptionRate => 3.0,
            _ => 0.5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Gene::ReplicationRate => "replication_rate",
            Gene::Attractiveness => "attractiveness",
            Gene::Strength => "strength",
            Gene::MutationChance => "mutation_chance",
            Gene::Intelligence => "intelligence",
            Gene::ResourceEfficiency => "resource_efficiency",
            Gene::ConsumptionRate => "consumption_rate",
            Gene::UtilizationFactor => "utilization_factor",
        }
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Full trait vector of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub replication_rate: f64,
    pub attractiveness: f64,
    pub strength: f64,
    pub mutation_chance: f64,
    pub intelligence: f64,
    pub resource_efficiency: f64,
    pub consumption_rate: f64,
    pub utilization_factor: f64,
}

impl Default for Genome {
    fn default() -> Self {
        let mut genome = Self::zeroed();
        for gene in Gene::ALL {
            genome.set(gene, gene.default_value());
        }
        genome
    }
}

impl Genome {
    /// Genome with every value at zero. Only useful as an accumulator seed.
    pub(crate) fn zeroed() -> Self {
        Self {
            replication_rate: 0.0,
            attractiveness: 0.0,
            strength: 0.0,
            mutation_chance: 0.0,
            intelligence: 0.0,
            resource_efficiency: 0.0,
            consumption_rate: 0.0,
            utilization_factor: 0.0,
        }
    }

    pub fn get(&self, gene: Gene) -> f64 {
        match gene {
            Gene::ReplicationRate => self.replication_rate,
            Gene::Attractiveness => self.attractiveness,
            Gene::Strength => self.strength,
            Gene::MutationChance => self.mutation_chance,
            Gene::Intelligence => self.intelligence,
            Gene::ResourceEfficiency => self.resource_efficiency,
            Gene::ConsumptionRate => self.consumption_rate,
            Gene::UtilizationFactor => self.utilization_factor,
        }
    }

    pub fn set(&mut self, gene: Gene, val: f64) {
        let slot = match gene {
            Gene::ReplicationRate => &mut self.replication_rate,
            Gene::Attractiveness => &mut self.attractiveness,
            Gene::Strength => &mut self.strength,
            Gene::MutationChance => &mut self.mutation_chance,
            Gene::Intelligence => &mut self.intelligence,
            Gene::ResourceEfficiency => &mut self.resource_efficiency,
            Gene::ConsumptionRate => &mut self.consumption_rate,
            Gene::UtilizationFactor => &mut self.utilization_factor,
        };
        *slot = val;
    }

    /// First gene whose value is NaN or infinite, if any.
    pub fn first_non_finite(&self) -> Option<(Gene, f64)> {
        Gene::ALL
            .into_iter()
            .map(|gene| (gene, self.get(gene)))
            .find(|(_, val)| !val.is_finite())
    }

    pub fn is_within_bounds(&self) -> bool {
        Gene::ALL
            .into_iter()
            .all(|gene| gene.bounds().contains(self.get(gene)))
    }

    /// Clamp every gene into its hard bounds, logging each correction.
    ///
    /// Returns the number of genes that had to be moved. Non-finite values
    /// are left untouched and must be rejected by the caller.
    pub fn clamp_to_bounds(&mut self) -> usize {
        let mut n_clamped = 0;
        for gene in Gene::ALL {
            let val = self.get(gene);
            if !val.is_finite() {
                continue;
            }
            let clamped = gene.bounds().clamp(val);
            if clamped != val {
                log::warn!("{gene} value {val} clamped to {clamped}");
                self.set(gene, clamped);
                n_clamped += 1;
            }
        }
        n_clamped
    }
}

/// Set a single gene, clamped into its hard bounds.
pub(crate) fn set_clamped(genome: &mut Genome, gene: Gene, val: f64) {
    genome.set(gene, gene.bounds().clamp(val));
}

/// Create the genome of a founding agent.
///
/// In fixed mode every gene takes its configured default (or the system
/// default). In randomized mode every gene is drawn uniformly from its
/// configured range (or the hard bounds). The result is always clamped into
/// the hard bounds.
pub fn create_profile<R: Rng + ?Sized>(
    mode: InitialMode,
    cfg: &GeneticsConfig,
    rng: &mut R,
) -> Result<Genome> {
    let mut genome = Genome::zeroed();

    for gene in Gene::ALL {
        let setting = cfg.traits.get(gene);

        let val = match mode {
            InitialMode::Fixed => setting.map_or(gene.default_value(), |s| s.default),
            InitialMode::Randomized => {
                let (min, max) = setting.map_or_else(
                    || (gene.bounds().min, gene.bounds().max),
                    |s| (s.min, s.max),
                );
                let dist = Uniform::new_inclusive(min, max)
                    .with_context(|| format!("invalid range for {gene}"))?;
                dist.sample(rng)
            }
        };

        set_clamped(&mut genome, gene, val);
    }

    Ok(genome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TraitSetting};
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn fixed_profile_uses_configured_and_system_defaults() {
        let mut cfg = Config::default().genetics;
        cfg.traits.insert(
            Gene::Strength,
            TraitSetting {
                min: 0.0,
                max: 1.0,
                default: 0.9,
            },
        );
        let mut rng = ChaCha12Rng::seed_from_u64(1);

        let genome = create_profile(InitialMode::Fixed, &cfg, &mut rng).unwrap();

        assert_eq!(genome.strength, 0.9);
        assert_eq!(genome.consumption_rate, 3.0);
        assert_eq!(genome.mutation_chance, 0.1);
        assert_eq!(genome.intelligence, 0.5);
    }

    #[test]
    fn randomized_profile_respects_ranges_and_hard_bounds() {
        let mut cfg = Config::default().genetics;
        cfg.traits.insert(
            Gene::Intelligence,
            TraitSetting {
                min: 0.4,
                max: 0.6,
                default: 0.5,
            },
        );
        // Configured range wider than the hard bounds gets clamped.
        cfg.traits.insert(
            Gene::ConsumptionRate,
            TraitSetting {
                min: 20.0,
                max: 30.0,
                default: 25.0,
            },
        );
        let mut rng = ChaCha12Rng::seed_from_u64(7);

        for _ in 0..200 {
            let genome = create_profile(InitialMode::Randomized, &cfg, &mut rng).unwrap();
            assert!(genome.is_within_bounds());
            assert!((0.4..=0.6).contains(&genome.intelligence));
            assert_eq!(genome.consumption_rate, 10.0);
        }
    }

    #[test]
    fn clamp_to_bounds_counts_corrections() {
        let mut genome = Genome::default();
        genome.strength = 1.5;
        genome.utilization_factor = 0.0;

        assert_eq!(genome.clamp_to_bounds(), 2);
        assert_eq!(genome.strength, 1.0);
        assert_eq!(genome.utilization_factor, 0.1);
        assert!(genome.is_within_bounds());
    }

    #[test]
    fn first_non_finite_reports_offending_gene() {
        let mut genome = Genome::default();
        assert!(genome.first_non_finite().is_none());

        genome.attractiveness = f64::NAN;
        let (gene, _) = genome.first_non_finite().unwrap();
        assert_eq!(gene, Gene::Attractiveness);
    }
}
