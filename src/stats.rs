use crate::genetics::{Gene, Genome, variant::VariantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    /// Mean of the values added so far, zero if there are none.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Snapshot of the population after a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub generation: u64,
    pub total_population: usize,
    pub population_by_variant: BTreeMap<VariantId, usize>,
    pub unique_variants: usize,
    /// Mean of every gene over the living agents (all zero when extinct).
    pub average_genome: Genome,
    pub average_resources: f64,
    pub average_age: f64,
    pub births: usize,
    pub deaths: usize,
    /// Resource pool level at the end of the generation.
    pub pool_amount: f64,
}

impl Statistics {
    /// Snapshot of a population that has not been stepped yet.
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            total_population: 0,
            population_by_variant: BTreeMap::new(),
            unique_variants: 0,
            average_genome: Genome::zeroed(),
            average_resources: 0.0,
            average_age: 0.0,
            births: 0,
            deaths: 0,
            pool_amount: 0.0,
        }
    }

    /// Value of `metric` in this snapshot.
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::TotalPopulation => self.total_population as f64,
            Metric::UniqueVariants => self.unique_variants as f64,
            Metric::AverageResources => self.average_resources,
            Metric::AverageAge => self.average_age,
            Metric::Births => self.births as f64,
            Metric::Deaths => self.deaths as f64,
            Metric::PoolAmount => self.pool_amount,
            Metric::AverageGene(gene) => self.average_genome.get(gene),
        }
    }
}

/// Scalar quantity tracked across the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalPopulation,
    UniqueVariants,
    AverageResources,
    AverageAge,
    Births,
    Deaths,
    PoolAmount,
    AverageGene(Gene),
}

impl Metric {
    pub fn name(&self) -> String {
        match self {
            Metric::TotalPopulation => "total_population".to_owned(),
            Metric::UniqueVariants => "unique_variants".to_owned(),
            Metric::AverageResources => "average_resources".to_owned(),
            Metric::AverageAge => "average_age".to_owned(),
            Metric::Births => "births".to_owned(),
            Metric::Deaths => "deaths".to_owned(),
            Metric::PoolAmount => "pool_amount".to_owned(),
            Metric::AverageGene(gene) => format!("average_{gene}"),
        }
    }

    /// Every tracked metric.
    pub fn all() -> Vec<Metric> {
        let mut metrics = vec![
            Metric::TotalPopulation,
            Metric::UniqueVariants,
            Metric::AverageResources,
            Metric::AverageAge,
            Metric::Births,
            Metric::Deaths,
            Metric::PoolAmount,
        ];
        metrics.extend(Gene::ALL.into_iter().map(Metric::AverageGene));
        metrics
    }
}

/// Point of a chart series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub generation: u64,
    pub value: f64,
}

/// `(generation, value)` series of `metric` over `history`.
pub fn series<'a, I>(history: I, metric: Metric) -> Vec<Point>
where
    I: IntoIterator<Item = &'a Statistics>,
{
    history
        .into_iter()
        .map(|stats| Point {
            generation: stats.generation,
            value: stats.metric(metric),
        })
        .collect()
}

/// `(generation, count)` series of one variant over `history`.
///
/// Generations where the variant has no living member count zero.
pub fn variant_trend<'a, I>(history: I, variant: &VariantId) -> Vec<(u64, usize)>
where
    I: IntoIterator<Item = &'a Statistics>,
{
    history
        .into_iter()
        .map(|stats| {
            let count = stats
                .population_by_variant
                .get(variant)
                .copied()
                .unwrap_or(0);
            (stats.generation, count)
        })
        .collect()
}

/// Time series with equilibration-aware summary statistics.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    pub is_equil: bool,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn len(&self) -> usize {
        self.vals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    pub fn report(&self) -> TimeSeriesReport {
        let i_equil = compute_opt_i_equil(&self.vals);
        let equil_time_series = &self.vals[i_equil..];
        TimeSeriesReport {
            mean: compute_mean(equil_time_series),
            std_dev: compute_var(equil_time_series).sqrt(),
            sem: compute_sem(equil_time_series),
            is_equil: i_equil != self.vals.len() / 2,
        }
    }
}

fn compute_mean(time_series: &[f64]) -> f64 {
    if time_series.is_empty() {
        return f64::NAN;
    }
    time_series.iter().sum::<f64>() / time_series.len() as f64
}

fn compute_var(time_series: &[f64]) -> f64 {
    let n_vals = time_series.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = compute_mean(time_series);
    time_series
        .iter()
        .map(|&val| (val - mean).powi(2))
        .sum::<f64>()
        / (n_vals - 1) as f64
}

/// Compute the standard error of the mean (SEM) using the Flyvbjerg-Petersen blocking method
///
/// Input is one metric's per-generation series; neighbouring generations are
/// averaged pairwise until the estimate plateaus.
fn compute_sem(time_series: &[f64]) -> f64 {
    let mut blk_time_series = time_series.to_vec();
    let mut n_vals = blk_time_series.len();
    let mut sem2_ests = Vec::new();
    let mut sem2_errs = Vec::new();

    while n_vals >= 2 {
        let sem2_est = compute_var(&blk_time_series) / n_vals as f64;
        let sem2_err = sem2_est * (2.0 / (n_vals as f64 - 1.0)).sqrt();
        sem2_ests.push(sem2_est);
        sem2_errs.push(sem2_err);

        blk_time_series = blk_time_series
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect();
        n_vals = blk_time_series.len();
    }

    for (idx, &sem2_est) in sem2_ests.iter().enumerate() {
        let max_low = sem2_ests[idx..]
            .iter()
            .zip(sem2_errs[idx..].iter())
            .map(|(s, e)| s - e)
            .fold(f64::NEG_INFINITY, f64::max);

        if sem2_est > max_low {
            return sem2_est.sqrt();
        }
    }

    sem2_ests.last().copied().unwrap_or(f64::NAN).sqrt()
}

/// Compute the optimal equilibration index using the marginal standard error rule
///
/// Generations before the returned index are dropped from the report.
fn compute_opt_i_equil(time_series: &[f64]) -> usize {
    let n_vals = time_series.len();
    let mut opt_i_equil = n_vals / 2;
    if n_vals < 2 {
        return opt_i_equil;
    }

    let mut min_mse = f64::INFINITY;
    let n_idxs = n_vals.ilog2() + 1;
    let i_equils: Vec<_> = (0..n_idxs)
        .map(|idx| n_vals / 2_usize.pow(n_idxs - idx))
        .collect();

    for i_equil in i_equils {
        let aux_time_series = &time_series[i_equil..];
        let n_vals = aux_time_series.len();

        let var = compute_var(aux_time_series);
        let mse = var * (n_vals - 1) as f64 / n_vals.pow(2) as f64;

        if mse < min_mse {
            min_mse = mse;
            opt_i_equil = i_equil;
        }
    }

    opt_i_equil
}
