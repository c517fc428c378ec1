//! Grouping of genomes into variants.

use super::{Gene, Genome};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Key shared by every genome that rounds to the same values.
///
/// Built from the genes in [`Gene::ALL`] order, each formatted with a fixed
/// number of decimals and joined by `-`, so equal keys mean equal rounded
/// genomes and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    pub fn from_genome(genome: &Genome, precision: usize) -> Self {
        let key = Gene::ALL
            .into_iter()
            .map(|gene| format!("{:.precision$}", genome.get(gene)))
            .collect::<Vec<_>>()
            .join("-");
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariantId {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

/// Every variant seen during a run, with the genome that first produced it.
///
/// Entries are only dropped by [`VariantRegistry::reset`].
#[derive(Debug, Default, Clone)]
pub struct VariantRegistry {
    variants: BTreeMap<VariantId, Genome>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `genome` as representative of `id` unless one is already known.
    ///
    /// Returns `true` if the variant is new.
    pub fn register(&mut self, id: &VariantId, genome: &Genome) -> bool {
        if self.variants.contains_key(id) {
            return false;
        }
        self.variants.insert(id.clone(), *genome);
        true
    }

    pub fn genome(&self, id: &VariantId) -> Option<&Genome> {
        self.variants.get(id)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariantId, &Genome)> {
        self.variants.iter()
    }

    pub fn reset(&mut self) {
        self.variants.clear();
    }
}
