use crate::genetics::variant::VariantId;
use crate::stats::{Metric, Statistics, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::decode;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, ErrorKind},
    path::Path,
};

pub trait Obs {
    fn update(&mut self, stats: &Statistics);
    fn report(&self) -> Result<(String, toml::Value)>;
}

/// Equilibrium summary of one metric.
pub struct MetricSeries {
    metric: Metric,
    time_series: TimeSeries,
}

impl MetricSeries {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for MetricSeries {
    fn update(&mut self, stats: &Statistics) {
        self.time_series.push(stats.metric(self.metric));
    }

    fn report(&self) -> Result<(String, toml::Value)> {
        let report = self.time_series.report();
        let value = toml::Value::try_from(report).context("failed to convert report")?;
        Ok((self.metric.name(), value))
    }
}

/// Lifetime of every variant seen in the history.
#[derive(Default)]
pub struct VariantPresence {
    presence: BTreeMap<VariantId, Presence>,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct Presence {
    first_generation: u64,
    last_generation: u64,
    peak_count: usize,
}

impl VariantPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Obs for VariantPresence {
    fn update(&mut self, stats: &Statistics) {
        for (id, &count) in &stats.population_by_variant {
            let entry = self.presence.entry(id.clone()).or_insert(Presence {
                first_generation: stats.generation,
                last_generation: stats.generation,
                peak_count: count,
            });
            entry.last_generation = stats.generation;
            entry.peak_count = entry.peak_count.max(count);
        }
    }

    fn report(&self) -> Result<(String, toml::Value)> {
        let mut table = toml::Table::new();
        table.insert(
            "n_variants_seen".to_owned(),
            toml::Value::Integer(self.presence.len() as i64),
        );

        let dominant = self
            .presence
            .iter()
            .max_by_key(|(_, presence)| presence.peak_count);
        if let Some((id, presence)) = dominant {
            table.insert(
                "dominant_variant".to_owned(),
                toml::Value::String(id.to_string()),
            );
            let value = toml::Value::try_from(presence).context("failed to convert presence")?;
            table.insert("dominant_presence".to_owned(), value);
        }
        Ok(("variants".to_owned(), toml::Value::Table(table)))
    }
}

/// Summarises the history of a run.
pub struct Analyzer {
    n_snapshots: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        for metric in Metric::all() {
            obs_ptr_vec.push(Box::new(MetricSeries::new(metric)));
        }
        obs_ptr_vec.push(Box::new(VariantPresence::new()));
        Self {
            n_snapshots: 0,
            obs_ptr_vec,
        }
    }

    pub fn add_stats(&mut self, stats: &Statistics) {
        self.n_snapshots += 1;
        for obs in &mut self.obs_ptr_vec {
            obs.update(stats);
        }
    }

    /// Feed every snapshot of a history file.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        loop {
            match decode::from_read::<_, Statistics>(&mut reader) {
                Ok(stats) => self.add_stats(&stats),
                Err(decode::Error::InvalidMarkerRead(error))
                    if error.kind() == ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(error) => return Err(error).context("failed to read statistics"),
            }
        }
        Ok(())
    }

    pub fn results(&self) -> Result<toml::Table> {
        let mut table = toml::Table::new();
        table.insert(
            "n_snapshots".to_owned(),
            toml::Value::Integer(self.n_snapshots as i64),
        );
        for obs in &self.obs_ptr_vec {
            let (name, value) = obs.report().context("failed to report observable")?;
            table.insert(name, value);
        }
        Ok(table)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let contents = toml::to_string(&self.results()?).context("failed to serialize results")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
