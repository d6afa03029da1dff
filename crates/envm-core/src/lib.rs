#![deny(missing_docs)]
#![doc = "Error types and deterministic randomness shared by the environment-matching engine."]

pub mod errors;
pub mod rng;

pub use errors::{EnvmError, ErrorInfo};
pub use rng::{derive_substream_seed, RngHandle};
