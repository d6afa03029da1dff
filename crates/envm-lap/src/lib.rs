#![deny(missing_docs)]
#![doc = "Pure numeric solvers used by environment matching: minimum-cost perfect matching and the matrix permanent."]

/// Minimum-cost perfect matching on square cost matrices.
pub mod assignment;
/// Exact and randomized matrix permanents.
pub mod permanent;
mod stats;

pub use assignment::{solve, Assignment};
pub use permanent::{
    permanent, permanent_real, ln_factorial, PermanentEstimate, PermanentMethod, PermanentOpts,
    Sampler,
};
pub use nalgebra::Complex;
