//! Rules deriving one gene's adjustment from the others.

use super::{Gene, Genome, set_clamped};
use crate::config::InteractionConfig;

/// Largest increase of the mutation chance granted for intelligence.
pub const MAX_MUTATION_BONUS: f64 = 0.2;

/// Amount added to attractiveness each step.
pub fn attractiveness_modifier(strength: f64, intelligence: f64, cfg: &InteractionConfig) -> f64 {
    strength * cfg.attractiveness_from_strength
        + intelligence * cfg.attractiveness_from_intelligence
}

/// Replication rate after the penalty for weak agents.
///
/// Below the threshold the rate is scaled linearly towards zero.
pub fn replication_penalty(strength: f64, replication_rate: f64, cfg: &InteractionConfig) -> f64 {
    let threshold = cfg.replication_penalty_threshold;
    if strength < threshold {
        replication_rate * (strength / threshold)
    } else {
        replication_rate
    }
}

/// Mutation chance after the bonus for intelligent agents.
pub fn mutation_bonus(intelligence: f64, mutation_chance: f64, cfg: &InteractionConfig) -> f64 {
    let threshold = cfg.mutation_bonus_threshold;
    if intelligence > threshold {
        let bonus_factor = (intelligence - threshold) / (1.0 - threshold);
        mutation_chance + bonus_factor * MAX_MUTATION_BONUS
    } else {
        mutation_chance
    }
}

/// Apply every interaction rule, in order, clamping after each one.
pub fn apply_interactions(genome: &mut Genome, cfg: &InteractionConfig) {
    let modifier = attractiveness_modifier(genome.strength, genome.intelligence, cfg);
    let attractiveness = genome.attractiveness + modifier;
    set_clamped(genome, Gene::Attractiveness, attractiveness);

    let rate = replication_penalty(genome.strength, genome.replication_rate, cfg);
    set_clamped(genome, Gene::ReplicationRate, rate);

    let chance = mutation_bonus(genome.intelligence, genome.mutation_chance, cfg);
    set_clamped(genome, Gene::MutationChance, chance);
}
