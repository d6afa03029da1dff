use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use envm_core::errors::{EnvmError, ErrorInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::environment::{Environment, Species, AGGREGATE_SPECIES};

/// Number of present (non-placeholder) atoms per species, iterated in species
/// order. Kit atoms count as present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpeciesCounts(BTreeMap<Species, usize>);

impl SpeciesCounts {
    /// Count for `species`, zero when absent.
    pub fn get(&self, species: Species) -> usize {
        self.0.get(&species).copied().unwrap_or(0)
    }

    /// `(species, count)` pairs in ascending species order.
    pub fn iter(&self) -> impl Iterator<Item = (Species, usize)> + '_ {
        self.0.iter().map(|(&species, &count)| (species, count))
    }

    /// Total number of real environments.
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

/// Immutable collection of environments grouped by species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    name: String,
    environments: BTreeMap<Species, Vec<Environment>>,
    counts: SpeciesCounts,
    global: Option<Environment>,
}

impl Structure {
    /// Starts building a structure.
    pub fn builder(name: impl Into<String>) -> StructureBuilder {
        StructureBuilder::new(name)
    }

    /// Structure name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Species labels in ascending order, including species with no centres.
    pub fn species(&self) -> impl Iterator<Item = Species> + '_ {
        self.environments.keys().copied()
    }

    /// Present atom counts, kit atoms included.
    pub fn counts(&self) -> &SpeciesCounts {
        &self.counts
    }

    /// Environments stored for `species`, measured ones first, then kit atoms.
    pub fn environments(&self, species: Species) -> &[Environment] {
        self.environments
            .get(&species)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of stored environments for `species`.
    pub fn slot_count(&self, species: Species) -> usize {
        self.environments(species).len()
    }

    /// Species of every stored environment, in ascending species order.
    pub fn site_species(&self) -> Vec<Species> {
        self.environments
            .iter()
            .flat_map(|(&species, envs)| std::iter::repeat(species).take(envs.len()))
            .collect()
    }

    /// Total number of stored environments.
    pub fn total_environments(&self) -> usize {
        self.environments.values().map(Vec::len).sum()
    }

    /// Environment `index` of `species`; indices past the stored ones are
    /// placeholders.
    pub fn environment(&self, species: Species, index: usize) -> Cow<'_, Environment> {
        match self.environments(species).get(index) {
            Some(env) => Cow::Borrowed(env),
            None => Cow::Owned(Environment::missing(species)),
        }
    }

    /// Whether environment `index` of `species` is a placeholder.
    pub fn is_missing(&self, species: Species, index: usize) -> bool {
        self.environments(species)
            .get(index)
            .map_or(true, Environment::is_missing)
    }

    /// Element-wise sum of all descriptors, `None` when no stored environment
    /// carries one.
    pub fn global_environment(&self) -> Option<&Environment> {
        self.global.as_ref()
    }
}

/// Builder validating descriptors and applying centre exclusion and kit top-up.
#[derive(Debug, Clone, Default)]
pub struct StructureBuilder {
    name: String,
    pending: Vec<(Species, Vec<f64>)>,
    excluded: BTreeSet<Species>,
    kit: BTreeMap<Species, usize>,
    isolated: BTreeMap<Species, Vec<f64>>,
}

impl StructureBuilder {
    /// Creates an empty builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a real environment.
    pub fn push(&mut self, species: Species, features: Vec<f64>) -> &mut Self {
        self.pending.push((species, features));
        self
    }

    /// Adds a real environment, consuming form.
    pub fn with_environment(mut self, species: Species, features: Vec<f64>) -> Self {
        self.push(species, features);
        self
    }

    /// Species whose sites are not used as centres. Their count becomes zero
    /// but the label stays in the species list.
    pub fn exclude_centers(mut self, species: impl IntoIterator<Item = Species>) -> Self {
        self.excluded.extend(species);
        self
    }

    /// Tops every kit species up to the given count with isolated atoms.
    /// Kit atoms are present sites: they count towards the species and never
    /// take the placeholder penalty.
    pub fn with_kit(mut self, kit: impl IntoIterator<Item = (Species, usize)>) -> Self {
        self.kit.extend(kit);
        self
    }

    /// Descriptor of a lone atom of `species`. Kit atoms of that species carry
    /// it and contribute it to the global environment; without one they are
    /// [`Environment::Isolated`].
    pub fn with_isolated_descriptor(mut self, species: Species, features: Vec<f64>) -> Self {
        self.isolated.insert(species, features);
        self
    }

    /// Validates the descriptors and freezes the structure.
    pub fn build(self) -> Result<Structure, EnvmError> {
        let mut dimension: Option<usize> = None;
        let measured = self.pending.iter().map(|(species, features)| (*species, features));
        let lone = self.isolated.iter().map(|(species, features)| (*species, features));
        for (idx, (species, features)) in measured.chain(lone).enumerate() {
            if let Some(pos) = features.iter().position(|value| !value.is_finite()) {
                return Err(EnvmError::Numeric(
                    ErrorInfo::new("non-finite-feature", "descriptor contains NaN or infinity")
                        .with_context("structure", &self.name)
                        .with_context("environment", idx)
                        .with_context("species", species)
                        .with_context("component", pos),
                ));
            }
            match dimension {
                None => dimension = Some(features.len()),
                Some(expected) if expected != features.len() => {
                    return Err(EnvmError::DimensionMismatch(
                        ErrorInfo::new(
                            "feature-dimension",
                            "all descriptors of a structure must share one dimension",
                        )
                        .with_context("structure", &self.name)
                        .with_context("environment", idx)
                        .with_context("expected", expected)
                        .with_context("found", features.len()),
                    ));
                }
                Some(_) => {}
            }
        }

        let mut environments: BTreeMap<Species, Vec<Environment>> = BTreeMap::new();
        for (species, features) in self.pending {
            let slot = environments.entry(species).or_default();
            if !self.excluded.contains(&species) {
                slot.push(Environment::real(species, features));
            }
        }

        for (&species, &target) in &self.kit {
            let slot = environments.entry(species).or_default();
            while slot.len() < target {
                slot.push(match self.isolated.get(&species) {
                    Some(features) => Environment::real(species, features.clone()),
                    None => Environment::isolated(species),
                });
            }
        }

        let counts = SpeciesCounts(
            environments
                .iter()
                .map(|(&species, envs)| (species, envs.len()))
                .collect(),
        );

        let global = environments
            .values()
            .flatten()
            .filter_map(Environment::features)
            .fold(None::<Vec<f64>>, |acc, features| match acc {
                None => Some(features.to_vec()),
                Some(mut sum) => {
                    sum.iter_mut().zip(features).for_each(|(s, f)| *s += f);
                    Some(sum)
                }
            })
            .map(|sum| Environment::real(AGGREGATE_SPECIES, sum));

        debug!(
            structure = %self.name,
            present = counts.total(),
            kit = self.kit.len(),
            "built structure"
        );

        Ok(Structure {
            name: self.name,
            environments,
            counts,
            global,
        })
    }
}
