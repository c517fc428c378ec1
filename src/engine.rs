use crate::agent::Agent;
use crate::config::{Config, Consumption};
use crate::genetics::interactions::apply_interactions;
use crate::genetics::reproduction::{Attempt, attempt_reproduction};
use crate::population::Population;
use crate::resources::ResourcePool;
use crate::stats::Statistics;
use crate::survival::{apply_natural_death, apply_survival};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use std::{
    fmt::Display,
    time::{Duration, Instant},
};

/// Lowest and highest accepted scheduling rates.
pub const MIN_STEPS_PER_SECOND: u32 = 1;
pub const MAX_STEPS_PER_SECOND: u32 = 1000;

/// Scheduling state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Paused,
}

/// Outcome of a call to [`Engine::process_generation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The generation was processed and has the given number.
    Advanced(u64),
    /// Nothing was processed because the population is extinct.
    Extinct,
}

/// Hook notified by the engine as the simulation progresses.
pub trait Observer: Send {
    fn on_generation(&mut self, _stats: &Statistics) {}

    /// Called once per run, when the population dies out.
    fn on_extinction(&mut self, _generation: u64) {}
}

/// Logs a one-line summary of every generation.
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_generation(&mut self, stats: &Statistics) {
        log::info!(
            "gen {}: pop={} variants={} births={} deaths={} avg_res={:.1}",
            stats.generation,
            stats.total_population,
            stats.unique_variants,
            stats.births,
            stats.deaths,
            stats.average_resources
        );
    }
}

/// Periodic timer driving the generations while running.
#[derive(Debug, Clone, Copy)]
struct Schedule {
    interval: Duration,
    next_due: Instant,
}

impl Schedule {
    fn new(steps_per_second: u32, now: Instant) -> Self {
        let interval = Duration::from_secs(1) / steps_per_second;
        Self {
            interval,
            next_due: now + interval,
        }
    }

    fn advance(&mut self, now: Instant) {
        self.next_due += self.interval;
        // Missed ticks are dropped, not replayed.
        if self.next_due < now {
            self.next_due = now + self.interval;
        }
    }
}

/// Simulation engine.
///
/// Owns the population, the resource pool and the random number generator,
/// runs the generation pipeline and exposes the control surface.
pub struct Engine<R = ChaCha12Rng> {
    cfg: Config,
    pop: Population,
    pool: ResourcePool,
    rng: R,
    state: EngineState,
    steps_per_second: u32,
    schedule: Option<Schedule>,
    extinct: bool,
    obs_vec: Vec<Box<dyn Observer>>,
}

impl Engine {
    /// Create an engine seeded from the configuration, or from the OS if no
    /// seed is configured.
    pub fn new(cfg: Config) -> Result<Self> {
        let rng = match cfg.simulation.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng().context("failed to seed rng")?,
        };
        Self::with_rng(cfg, rng)
    }
}

impl<R: Rng> Engine<R> {
    /// Create an engine drawing from the given random number generator.
    pub fn with_rng(cfg: Config, mut rng: R) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let pop = Population::new(&cfg, &mut rng).context("failed to create population")?;
        let pool = ResourcePool::new(&cfg.resources);

        let mut obs_vec: Vec<Box<dyn Observer>> = Vec::new();
        if cfg.simulation.log_generations {
            obs_vec.push(Box::new(LogObserver));
        }

        Ok(Self {
            steps_per_second: cfg.simulation.steps_per_second,
            cfg,
            pop,
            pool,
            rng,
            state: EngineState::Stopped,
            schedule: None,
            extinct: false,
            obs_vec,
        })
    }

    pub fn add_observer(&mut self, obs: Box<dyn Observer>) {
        self.obs_vec.push(obs);
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn population(&self) -> &Population {
        &self.pop
    }

    pub fn resource_pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn steps_per_second(&self) -> u32 {
        self.steps_per_second
    }

    pub fn is_extinct(&self) -> bool {
        self.extinct
    }

    pub fn statistics(&self) -> &Statistics {
        self.pop.statistics()
    }

    /// Last `n` snapshots, or all of them.
    pub fn history(&self, n: Option<usize>) -> Vec<Statistics> {
        self.pop.history(n)
    }

    /// Start scheduling generations at the current rate.
    ///
    /// # Errors
    /// Fails if the population is extinct.
    pub fn start(&mut self) -> Result<()> {
        if self.extinct {
            bail!("cannot start an extinct simulation");
        }
        if self.state == EngineState::Running {
            log::warn!("simulation is already running");
            return Ok(());
        }
        self.state = EngineState::Running;
        self.schedule = Some(Schedule::new(self.steps_per_second, Instant::now()));
        log::info!("simulation started at {} steps per second", self.steps_per_second);
        Ok(())
    }

    /// Stop scheduling generations, keeping all state.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != EngineState::Running {
            log::warn!("simulation is not running");
            return Ok(());
        }
        self.halt();
        log::info!("simulation paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state == EngineState::Running {
            log::warn!("simulation is already running");
            return Ok(());
        }
        self.start()?;
        log::info!("simulation resumed");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.state = EngineState::Stopped;
        self.schedule = None;
        log::info!("simulation stopped");
        Ok(())
    }

    /// Change the scheduling rate, clamped to the accepted range.
    ///
    /// A running schedule restarts at the new rate.
    pub fn set_speed(&mut self, steps_per_second: i64) -> Result<()> {
        let clamped = steps_per_second.clamp(
            MIN_STEPS_PER_SECOND as i64,
            MAX_STEPS_PER_SECOND as i64,
        ) as u32;
        if clamped as i64 != steps_per_second {
            log::warn!("speed {steps_per_second} clamped to {clamped}");
        }
        self.steps_per_second = clamped;

        if self.state == EngineState::Running {
            self.schedule = Some(Schedule::new(clamped, Instant::now()));
        }
        log::info!("simulation speed set to {clamped} steps per second");
        Ok(())
    }

    /// When the next scheduled generation is due, if running.
    pub fn next_due(&self) -> Option<Instant> {
        self.schedule.map(|schedule| schedule.next_due)
    }

    /// Run the scheduled generation if it is due at `now`.
    ///
    /// Returns `None` if nothing was due.
    pub fn poll(&mut self, now: Instant) -> Result<Option<StepOutcome>> {
        let Some(schedule) = self.schedule.as_mut() else {
            return Ok(None);
        };
        if now < schedule.next_due {
            return Ok(None);
        }
        schedule.advance(now);
        self.process_generation().map(Some)
    }

    /// Discard the population and start over from a new founding population.
    pub fn reset(&mut self) -> Result<()> {
        self.stop()?;
        self.pop
            .reset(&self.cfg, &mut self.rng)
            .context("failed to reset population")?;
        self.pool.reset();
        self.extinct = false;
        log::info!("simulation reset");
        Ok(())
    }

    /// Process one generation.
    ///
    /// Failures of single agents only retire those agents. Any other failure
    /// pauses the engine and is returned.
    pub fn process_generation(&mut self) -> Result<StepOutcome> {
        match self.perform_generation() {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                log::error!("generation failed: {error:#}");
                self.halt();
                Err(error)
            }
        }
    }

    fn perform_generation(&mut self) -> Result<StepOutcome> {
        if self.pop.living_count() == 0 {
            self.declare_extinction();
            return Ok(StepOutcome::Extinct);
        }

        let mut deaths = self.update_traits();

        self.pool.replenish();
        let distribution = self.pool.distribute(self.pop.agents_mut());
        log::debug!("{distribution:?}");
        self.check_pool().context("invalid pool after distribution")?;

        deaths += self.consume_resources();

        let (births, n_retired) = self.reproduce();
        deaths += n_retired;
        let n_living = self.pop.living_count();
        let max_pop = self.cfg.simulation.max_population;
        if n_living > max_pop {
            bail!("population {n_living} exceeds maximum {max_pop}");
        }

        deaths += apply_natural_death(self.pop.agents_mut());
        deaths += apply_survival(
            self.pop.agents_mut(),
            &self.cfg.survival,
            self.cfg.resources.starvation_threshold,
            &mut self.rng,
        );
        self.pop.evict_dead();

        self.pop
            .advance_generation(births, deaths, self.pool.current())
            .context("failed to update statistics")?;

        let stats = self.pop.statistics();
        for obs in &mut self.obs_vec {
            obs.on_generation(stats);
        }

        let generation = self.pop.generation();
        if stats.total_population == 0 {
            self.declare_extinction();
        }
        Ok(StepOutcome::Advanced(generation))
    }

    /// Apply the interaction rules to every living agent.
    ///
    /// Returns the number of agents retired.
    fn update_traits(&mut self) -> usize {
        let int_cfg = &self.cfg.interactions;
        let mut n_retired = 0;
        for agt in self.pop.agents_mut().iter_mut().filter(|agt| agt.is_alive()) {
            apply_interactions(agt.genome_mut(), int_cfg);
            let outcome = agt.validate();
            if retire_on_failure("interactions", agt, outcome) {
                n_retired += 1;
            }
        }
        n_retired
    }

    /// Charge every living agent its per-step consumption.
    ///
    /// Returns the number of agents retired.
    fn consume_resources(&mut self) -> usize {
        let consumption = self.cfg.resources.consumption;
        let mut n_retired = 0;
        for agt in self.pop.agents_mut().iter_mut().filter(|agt| agt.is_alive()) {
            let amount = match consumption {
                Consumption::Flat { amount } => amount,
                Consumption::PerAgent { scale } => agt.genome().consumption_rate * scale,
            };
            agt.consume_resources(amount);
            let outcome = agt.validate();
            if retire_on_failure("consumption", agt, outcome) {
                n_retired += 1;
            }
        }
        n_retired
    }

    /// Age every living agent and let eligible ones reproduce, until the
    /// population cap is reached.
    ///
    /// Returns the number of births and the number of agents retired.
    fn reproduce(&mut self) -> (usize, usize) {
        let max_pop = self.cfg.simulation.max_population;
        let cost = self.cfg.reproduction.cost;
        let spawn_randomness = self.cfg.reproduction.spawn_randomness;

        let mut n_living = self.pop.living_count();
        let mut births = 0;
        let mut n_retired = 0;

        // Offspring are appended past `n_agt` and are not visited this step.
        let n_agt = self.pop.agents().len();
        for i_agt in 0..n_agt {
            if n_living >= max_pop {
                break;
            }

            let offspring_id = self.pop.next_id();
            let Some(parent) = self.pop.agent_mut(i_agt) else {
                break;
            };
            if !parent.is_alive() {
                continue;
            }

            parent.tick();
            if !parent.can_reproduce(cost) {
                continue;
            }

            let attempt = attempt_reproduction(parent, offspring_id, &self.cfg, &mut self.rng);
            let timer = parent.reset_replication_timer(spawn_randomness, &mut self.rng);
            if retire_on_failure("reproduction", parent, timer) {
                n_retired += 1;
                n_living -= 1;
            }

            match attempt {
                Ok(Attempt::Born(offspring)) => {
                    self.pop.add(offspring);
                    births += 1;
                    n_living += 1;
                }
                Ok(Attempt::Rejected | Attempt::Unaffordable) => {}
                Err(error) => log::warn!("no offspring: {error:#}"),
            }
        }

        (births, n_retired)
    }

    fn check_pool(&self) -> Result<()> {
        let current = self.pool.current();
        let capacity = self.pool.capacity();
        if !(0.0..=capacity).contains(&current) {
            bail!("pool amount {current} outside [0, {capacity}]");
        }
        Ok(())
    }

    fn declare_extinction(&mut self) {
        if !self.extinct {
            self.extinct = true;
            let generation = self.pop.generation();
            log::error!("population is extinct at generation {generation}");
            for obs in &mut self.obs_vec {
                obs.on_extinction(generation);
            }
        }
        self.halt();
    }

    /// Cancel the schedule without discarding any state.
    fn halt(&mut self) {
        if self.state == EngineState::Running {
            self.state = EngineState::Paused;
        }
        self.schedule = None;
    }
}

/// Retire `agt` if `outcome` is a failure. Returns whether it was retired.
fn retire_on_failure<E: Display>(phase: &str, agt: &mut Agent, outcome: Result<(), E>) -> bool {
    match outcome {
        Ok(()) => false,
        Err(error) => {
            log::warn!("agent {} retired during {phase}: {error:#}", agt.id());
            agt.kill();
            true
        }
    }
}
