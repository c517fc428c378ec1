use crate::genetics::Gene;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub genetics: GeneticsConfig,
    pub mutation: MutationConfig,
    pub reproduction: ReproductionConfig,
    pub resources: ResourceConfig,
    pub interactions: InteractionConfig,
    pub survival: SurvivalConfig,
    pub lifespan: Lifespan,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialMode {
    Randomized,
    Fixed,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of agents created at reset.
    pub initial_population: usize,
    /// How founding genomes are created.
    pub initial_mode: InitialMode,
    /// Scheduled generation rate.
    pub steps_per_second: u32,
    /// Population cap enforced during reproduction.
    pub max_population: usize,
    /// Seed of the random number generator (entropy when absent).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Log a one-line summary after every generation.
    #[serde(default)]
    pub log_generations: bool,
    /// Number of statistics snapshots kept (unbounded when absent).
    #[serde(default)]
    pub history_limit: Option<usize>,
}

/// Configured range and default of a single gene.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraitSetting {
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

/// Per-gene overrides of the system ranges and defaults.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraitTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_rate: Option<TraitSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attractiveness: Option<TraitSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<TraitSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_chance: Option<TraitSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intelligence: Option<TraitSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_efficiency: Option<TraitSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption_rate: Option<TraitSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_factor: Option<TraitSetting>,
}

impl TraitTable {
    pub fn get(&self, gene: Gene) -> Option<&TraitSetting> {
        self.slot(gene).as_ref()
    }

    pub fn insert(&mut self, gene: Gene, setting: TraitSetting) {
        *self.slot_mut(gene) = Some(setting);
    }

    fn slot(&self, gene: Gene) -> &Option<TraitSetting> {
        match gene {
            Gene::ReplicationRate => &self.replication_rate,
            Gene::Attractiveness => &self.attractiveness,
            Gene::Strength => &self.strength,
            Gene::MutationChance => &self.mutation_chance,
            Gene::Intelligence => &self.intelligence,
            Gene::ResourceEfficiency => &self.resource_efficiency,
            Gene::ConsumptionRate => &self.consumption_rate,
            Gene::UtilizationFactor => &self.utilization_factor,
        }
    }

    fn slot_mut(&mut self, gene: Gene) -> &mut Option<TraitSetting> {
        match gene {
            Gene::ReplicationRate => &mut self.replication_rate,
            Gene::Attractiveness => &mut self.attractiveness,
            Gene::Strength => &mut self.strength,
            Gene::MutationChance => &mut self.mutation_chance,
            Gene::Intelligence => &mut self.intelligence,
            Gene::ResourceEfficiency => &mut self.resource_efficiency,
            Gene::ConsumptionRate => &mut self.consumption_rate,
            Gene::UtilizationFactor => &mut self.utilization_factor,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneticsConfig {
    /// Decimal places kept when grouping genomes into variants.
    pub variant_precision: usize,
    /// Amplitude of the perturbation every inherited gene receives.
    pub inheritance_variation: f64,
    #[serde(default)]
    pub traits: TraitTable,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MutationConfig {
    /// Probability that a given gene mutates in an offspring.
    pub per_gene_probability: f64,
    /// Maximum absolute change of a mutated gene.
    pub strength: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReproductionConfig {
    /// Resources a parent spends on a successful reproduction.
    pub cost: f64,
    /// Weight of attractiveness in the success probability.
    pub attractiveness_weight: f64,
    /// Relative jitter of the replication timer.
    pub spawn_randomness: f64,
}

/// Per-step resource consumption model.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Consumption {
    /// Every agent consumes the same amount.
    Flat { amount: f64 },
    /// Every agent consumes its consumption rate times `scale`.
    PerAgent { scale: f64 },
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    /// Resources every new agent starts with.
    pub initial_amount: f64,
    /// Maximum amount held by the shared pool.
    pub capacity: f64,
    /// Amount added to the pool every step.
    pub replenish_rate: f64,
    /// Agents at or below this balance starve.
    pub starvation_threshold: f64,
    /// Weight of the consumption rate in the effective strength.
    pub consumption_strength_bonus: f64,
    pub consumption: Consumption,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionConfig {
    pub attractiveness_from_strength: f64,
    pub attractiveness_from_intelligence: f64,
    /// Strength below which the replication rate is scaled down.
    pub replication_penalty_threshold: f64,
    /// Intelligence above which the mutation chance is raised.
    pub mutation_bonus_threshold: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurvivalConfig {
    /// Minimum adjusted score needed to survive.
    pub threshold: f64,
    pub strength_weight: f64,
    pub intelligence_weight: f64,
    /// Amplitude of the noise added to the score.
    pub random_factor: f64,
    /// Balance at which the resource score saturates.
    pub reference_amount: f64,
}

/// Natural death model.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Lifespan {
    /// Maximum age is `lifetime_consumption / consumption_rate`.
    ConsumptionDerived { lifetime_consumption: f64 },
    /// Every agent dies at the same age.
    Flat { lifespan: u32 },
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Number of generations performed by a headless run.
    pub generations: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { generations: 1000 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig {
                initial_population: 100,
                initial_mode: InitialMode::Randomized,
                steps_per_second: 10,
                max_population: 1000,
                seed: None,
                log_generations: false,
                history_limit: None,
            },
            genetics: GeneticsConfig {
                variant_precision: 2,
                inheritance_variation: 0.05,
                traits: TraitTable::default(),
            },
            mutation: MutationConfig {
                per_gene_probability: 0.15,
                strength: 0.1,
            },
            reproduction: ReproductionConfig {
                cost: 50.0,
                attractiveness_weight: 0.7,
                spawn_randomness: 0.0,
            },
            resources: ResourceConfig {
                initial_amount: 100.0,
                capacity: 1000.0,
                replenish_rate: 1000.0,
                starvation_threshold: 0.0,
                consumption_strength_bonus: 0.5,
                consumption: Consumption::Flat { amount: 5.0 },
            },
            interactions: InteractionConfig {
                attractiveness_from_strength: 0.4,
                attractiveness_from_intelligence: 0.3,
                replication_penalty_threshold: 0.3,
                mutation_bonus_threshold: 0.7,
            },
            survival: SurvivalConfig {
                threshold: 0.3,
                strength_weight: 0.6,
                intelligence_weight: 0.4,
                random_factor: 0.1,
                reference_amount: 100.0,
            },
            lifespan: Lifespan::ConsumptionDerived {
                lifetime_consumption: 300.0,
            },
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check every parameter against its valid range.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        check_num(sim.initial_population, 1..=100_000).context("invalid initial population")?;
        check_num(sim.steps_per_second, 1..=1000).context("invalid steps per second")?;
        check_num(sim.max_population, sim.initial_population..=1_000_000)
            .context("invalid maximum population")?;
        if let Some(limit) = sim.history_limit {
            check_num(limit, 1..).context("invalid history limit")?;
        }

        let gcf = &self.genetics;
        check_num(gcf.variant_precision, 0..=8).context("invalid variant precision")?;
        check_num(gcf.inheritance_variation, 0.0..=1.0).context("invalid inheritance variation")?;
        for gene in Gene::ALL {
            if let Some(setting) = gcf.traits.get(gene) {
                check_trait(setting).with_context(|| format!("invalid settings for {gene}"))?;
            }
        }

        let mtn = &self.mutation;
        check_num(mtn.per_gene_probability, 0.0..=1.0)
            .context("invalid per-gene mutation probability")?;
        check_num(mtn.strength, 0.0..=1.0).context("invalid mutation strength")?;

        let rep = &self.reproduction;
        check_num(rep.cost, 0.0..=f64::MAX).context("invalid reproduction cost")?;
        check_num(rep.attractiveness_weight, 0.0..=1.0).context("invalid attractiveness weight")?;
        check_num(rep.spawn_randomness, 0.0..=1.0).context("invalid spawn randomness")?;

        let res = &self.resources;
        check_num(res.initial_amount, 0.0..=f64::MAX)
            .context("invalid initial resource amount")?;
        check_num(res.capacity, 0.0..=f64::MAX).context("invalid pool capacity")?;
        check_num(res.replenish_rate, 0.0..=f64::MAX).context("invalid replenish rate")?;
        check_num(res.starvation_threshold, 0.0..=f64::MAX)
            .context("invalid starvation threshold")?;
        check_num(res.consumption_strength_bonus, 0.0..=f64::MAX)
            .context("invalid consumption strength bonus")?;
        match res.consumption {
            Consumption::Flat { amount } => {
                check_num(amount, 0.0..=f64::MAX).context("invalid flat consumption amount")?
            }
            Consumption::PerAgent { scale } => {
                check_num(scale, 0.0..=f64::MAX).context("invalid per-agent consumption scale")?
            }
        }

        let int = &self.interactions;
        check_num(int.attractiveness_from_strength, 0.0..=1.0)
            .context("invalid attractiveness weight of strength")?;
        check_num(int.attractiveness_from_intelligence, 0.0..=1.0)
            .context("invalid attractiveness weight of intelligence")?;
        check_open_low(int.replication_penalty_threshold, 1.0)
            .context("invalid replication penalty threshold")?;
        check_num(int.mutation_bonus_threshold, 0.0..1.0)
            .context("invalid mutation bonus threshold")?;

        let srv = &self.survival;
        check_num(srv.threshold, 0.0..=1.0).context("invalid survival threshold")?;
        check_num(srv.strength_weight, 0.0..=1.0).context("invalid survival strength weight")?;
        check_num(srv.intelligence_weight, 0.0..=1.0)
            .context("invalid survival intelligence weight")?;
        check_num(srv.random_factor, 0.0..=1.0).context("invalid survival random factor")?;
        check_open_low(srv.reference_amount, f64::MAX).context("invalid reference amount")?;

        match self.lifespan {
            Lifespan::ConsumptionDerived {
                lifetime_consumption,
            } => check_open_low(lifetime_consumption, f64::MAX)
                .context("invalid lifetime consumption")?,
            Lifespan::Flat { lifespan } => check_num(lifespan, 1..).context("invalid lifespan")?,
        }

        check_num(self.output.generations, 1..).context("invalid number of generations")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    // NaN is never contained in any range.
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_open_low(num: f64, max: f64) -> Result<()> {
    if !(num > 0.0 && num <= max) {
        bail!("number must be in the range (0.0, {max:?}], but is {num:?}");
    }
    Ok(())
}

fn check_trait(setting: &TraitSetting) -> Result<()> {
    for (name, val) in [
        ("min", setting.min),
        ("max", setting.max),
        ("default", setting.default),
    ] {
        if !val.is_finite() {
            bail!("{name} must be finite, but is {val:?}");
        }
    }
    if setting.min > setting.max {
        bail!("min ({}) must not exceed max ({})", setting.min, setting.max);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
[simulation]
initial_population = 20
initial_mode = "fixed"
steps_per_second = 50
max_population = 200
seed = 3

[genetics]
variant_precision = 2
inheritance_variation = 0.05

[genetics.traits.strength]
min = 0.2
max = 0.8
default = 0.6

[mutation]
per_gene_probability = 0.15
strength = 0.1

[reproduction]
cost = 40.0
attractiveness_weight = 0.7
spawn_randomness = 0.2

[resources]
initial_amount = 100.0
capacity = 2000.0
replenish_rate = 500.0
starvation_threshold = 0.0
consumption_strength_bonus = 0.5
consumption = { model = "per_agent", scale = 1.5 }

[interactions]
attractiveness_from_strength = 0.4
attractiveness_from_intelligence = 0.3
replication_penalty_threshold = 0.3
mutation_bonus_threshold = 0.7

[survival]
threshold = 0.3
strength_weight = 0.6
intelligence_weight = 0.4
random_factor = 0.1
reference_amount = 100.0

[lifespan]
model = "flat"
lifespan = 80
"#;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn parses_full_toml() {
        let cfg: Config = toml::from_str(FULL_CONFIG).unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.simulation.initial_mode, InitialMode::Fixed);
        assert_eq!(cfg.simulation.seed, Some(3));
        assert_eq!(cfg.simulation.history_limit, None);
        assert_eq!(cfg.resources.consumption, Consumption::PerAgent { scale: 1.5 });
        assert_eq!(cfg.lifespan, Lifespan::Flat { lifespan: 80 });
        assert_eq!(cfg.genetics.traits.get(Gene::Strength).unwrap().default, 0.6);
        assert!(cfg.genetics.traits.get(Gene::Intelligence).is_none());
        assert_eq!(cfg.output, OutputConfig::default());
    }

    #[test]
    fn missing_field_is_rejected() {
        let contents = FULL_CONFIG.replace("reference_amount = 100.0\n", "");
        assert!(toml::from_str::<Config>(&contents).is_err());
    }

    #[test]
    fn inverted_trait_range_is_rejected() {
        let mut cfg = Config::default();
        cfg.genetics.traits.insert(
            Gene::Intelligence,
            TraitSetting {
                min: 0.9,
                max: 0.1,
                default: 0.5,
            },
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut cfg = Config::default();
        cfg.simulation.steps_per_second = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.simulation.max_population = cfg.simulation.initial_population - 1;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.interactions.replication_penalty_threshold = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.mutation.per_gene_probability = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.resources.initial_amount = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn infinite_amounts_are_rejected() {
        let setters: [fn(&mut Config); 8] = [
            |cfg| cfg.reproduction.cost = f64::INFINITY,
            |cfg| cfg.resources.initial_amount = f64::INFINITY,
            |cfg| cfg.resources.capacity = f64::INFINITY,
            |cfg| cfg.resources.replenish_rate = f64::INFINITY,
            |cfg| cfg.resources.starvation_threshold = f64::INFINITY,
            |cfg| cfg.resources.consumption_strength_bonus = f64::INFINITY,
            |cfg| cfg.resources.consumption = Consumption::Flat { amount: f64::INFINITY },
            |cfg| cfg.resources.consumption = Consumption::PerAgent { scale: f64::INFINITY },
        ];
        for set in setters {
            let mut cfg = Config::default();
            set(&mut cfg);
            assert!(cfg.validate().is_err(), "{:?}", cfg.resources);
        }

        let contents = FULL_CONFIG.replace("capacity = 2000.0", "capacity = inf");
        let cfg: Config = toml::from_str(&contents).unwrap();
        assert!(cfg.validate().is_err());
    }
}
