#![deny(missing_docs)]
#![doc = "Structure similarity by optimal matching of per-species local environments."]

/// Kernel matrix aggregation and the structure comparison entry points.
pub mod aggregate;
/// Species-pair weighting and the placeholder penalty.
pub mod alchemy;
/// Comparison configuration and its validation.
pub mod config;
/// Human readable dump of a comparison.
pub mod diagnostics;
/// Real and placeholder environments.
pub mod environment;
/// Stable hashing of reports.
pub mod hash;
/// Environment kernels.
pub mod kernel;
/// Species-block kernel matrix construction and periodic tiling.
pub mod matrix;
/// Aggregation modes.
pub mod mode;
/// Comparison report.
pub mod report;
/// Canonical JSON and YAML helpers.
pub mod serde;
/// Structures and their builder.
pub mod structure;

pub use aggregate::{
    aggregate, compare, compare_with_dump, distance_from_squared, structure_distance, Aggregate,
};
pub use alchemy::{Alchemy, AlchemyMixer, PairWeight};
pub use config::MatchConfig;
pub use diagnostics::{write_dump, write_species_listing, DumpFormat};
pub use environment::{Environment, Species, AGGREGATE_SPECIES};
pub use envm_core::{EnvmError, ErrorInfo};
pub use envm_lap::{PermanentEstimate, PermanentMethod, PermanentOpts, Sampler};
pub use kernel::{EnvironmentKernel, NormalizedDotKernel};
pub use matrix::{build_kernel_matrix, KernelMatrix};
pub use mode::{MatchMode, PenaltyForm};
pub use report::MatchReport;
pub use structure::{SpeciesCounts, Structure, StructureBuilder};
