//! Derivation of offspring genomes.

use super::{Gene, Genome, set_clamped};
use crate::config::{GeneticsConfig, MutationConfig};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::{Bernoulli, Uniform};

/// Copy of `parent` where every gene independently mutates with the
/// configured probability by up to `±strength`.
pub fn mutate<R: Rng + ?Sized>(parent: &Genome, cfg: &MutationConfig, rng: &mut R) -> Result<Genome> {
    let mut_dist = Bernoulli::new(cfg.per_gene_probability)
        .context("invalid per-gene mutation probability")?;
    let delta_dist = Uniform::new_inclusive(-1.0, 1.0)?;

    let mut genome = *parent;
    for gene in Gene::ALL {
        if mut_dist.sample(rng) {
            let val = genome.get(gene) + delta_dist.sample(rng) * cfg.strength;
            set_clamped(&mut genome, gene, val);
        }
    }
    Ok(genome)
}

/// Perturb every gene by up to `±variation`, modelling imperfect copying.
pub fn vary<R: Rng + ?Sized>(genome: &Genome, variation: f64, rng: &mut R) -> Result<Genome> {
    let delta_dist = Uniform::new_inclusive(-1.0, 1.0)?;

    let mut varied = *genome;
    for gene in Gene::ALL {
        let val = varied.get(gene) + delta_dist.sample(rng) * variation;
        set_clamped(&mut varied, gene, val);
    }
    Ok(varied)
}

/// Genome of an offspring: mutation followed by inheritance variation.
pub fn offspring_genome<R: Rng + ?Sized>(
    parent: &Genome,
    mtn: &MutationConfig,
    gcf: &GeneticsConfig,
    rng: &mut R,
) -> Result<Genome> {
    let mutated = mutate(parent, mtn, rng).context("failed to mutate genome")?;
    vary(&mutated, gcf.inheritance_variation, rng)
}
