use serde::{Deserialize, Serialize};

/// Chemical species label (atomic number).
pub type Species = u32;

/// Species label carried by a structure's aggregate environment.
pub const AGGREGATE_SPECIES: Species = 0;

/// Local environment of one atomic site.
///
/// `Missing` stands in for an atom that one structure lacks when both sides
/// are padded to the same composition. `Isolated` is an atom that is present
/// but has no neighbours and no descriptor of its own, as added by a kit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Environment {
    /// A real site with its descriptor vector.
    Real {
        /// Species of the central atom.
        species: Species,
        /// Descriptor vector.
        features: Vec<f64>,
    },
    /// Present atom without neighbours or descriptor.
    Isolated {
        /// Species of the atom.
        species: Species,
    },
    /// Placeholder for an absent atom of the given species.
    Missing {
        /// Species of the absent atom.
        species: Species,
    },
}

impl Environment {
    /// Creates a real environment.
    pub fn real(species: Species, features: Vec<f64>) -> Self {
        Environment::Real { species, features }
    }

    /// Creates an isolated-atom environment.
    pub fn isolated(species: Species) -> Self {
        Environment::Isolated { species }
    }

    /// Creates a placeholder environment.
    pub fn missing(species: Species) -> Self {
        Environment::Missing { species }
    }

    /// Species of the (possibly absent) central atom.
    pub fn species(&self) -> Species {
        match self {
            Environment::Real { species, .. }
            | Environment::Isolated { species }
            | Environment::Missing { species } => *species,
        }
    }

    /// Returns true for placeholders.
    pub fn is_missing(&self) -> bool {
        matches!(self, Environment::Missing { .. })
    }

    /// Descriptor vector, `None` for isolated atoms and placeholders.
    pub fn features(&self) -> Option<&[f64]> {
        match self {
            Environment::Real { features, .. } => Some(features),
            Environment::Isolated { .. } | Environment::Missing { .. } => None,
        }
    }
}
