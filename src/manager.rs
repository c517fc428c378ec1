use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::{Engine, StepOutcome};
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    thread,
    time::Instant,
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg = Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Run a new simulation and record its history in a new run dir.
    ///
    /// In realtime mode generations are paced by the configured rate,
    /// otherwise they run back to back.
    pub fn create_run(&self, realtime: bool) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut engine = Engine::new(self.cfg.clone()).context("failed to construct engine")?;

        let file = self.history_file(run_idx);
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let n_gens = self.cfg.output.generations;
        if realtime {
            run_paced(&mut engine, n_gens, &mut writer)?;
        } else {
            run_unpaced(&mut engine, n_gens, &mut writer)?;
        }

        writer.flush().context("failed to flush writer stream")?;

        let stats = engine.statistics();
        log::info!(
            "run {run_idx} ended at generation {} with {} agents",
            stats.generation,
            stats.total_population
        );
        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new();
            analyzer
                .add_file(self.history_file(run_idx))
                .context("failed to add file")?;
            analyzer
                .save_results(self.results_file(run_idx))
                .context("failed to save results")?;
            log::info!("analyzed run {run_idx}");
        }
        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs()? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn history_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("history.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.toml")
    }
}

fn run_unpaced<W: Write>(engine: &mut Engine, n_gens: usize, writer: &mut W) -> Result<()> {
    for i_gen in 0..n_gens {
        if record_generation(engine, writer)? == StepOutcome::Extinct {
            break;
        }
        log_progress(i_gen, n_gens);
        if engine.is_extinct() {
            break;
        }
    }
    Ok(())
}

fn run_paced<W: Write>(engine: &mut Engine, n_gens: usize, writer: &mut W) -> Result<()> {
    engine.start().context("failed to start engine")?;

    let mut i_gen = 0;
    while i_gen < n_gens {
        let Some(due) = engine.next_due() else {
            break;
        };
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }

        let Some(outcome) = engine.poll(Instant::now())? else {
            continue;
        };
        if outcome == StepOutcome::Extinct {
            break;
        }
        encode::write(writer, engine.statistics()).context("failed to serialize statistics")?;
        log_progress(i_gen, n_gens);
        i_gen += 1;
    }

    engine.stop()
}

fn record_generation<W: Write>(engine: &mut Engine, writer: &mut W) -> Result<StepOutcome> {
    let outcome = engine.process_generation()?;
    if outcome != StepOutcome::Extinct {
        encode::write(writer, engine.statistics()).context("failed to serialize statistics")?;
    }
    Ok(outcome)
}

fn log_progress(i_gen: usize, n_gens: usize) {
    let stride = (n_gens / 10).max(1);
    if (i_gen + 1) % stride == 0 || i_gen + 1 == n_gens {
        let progress = 100.0 * (i_gen + 1) as f64 / n_gens as f64;
        log::info!("completed {progress:06.2}%");
    }
}
