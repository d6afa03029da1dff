use std::io::Write;

use envm_core::errors::{EnvmError, ErrorInfo};
use envm_lap::{permanent_real, solve, Assignment, PermanentEstimate};
use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::alchemy::{checked_penalty, AlchemyMixer};
use crate::config::MatchConfig;
use crate::diagnostics::{write_dump, write_species_listing};
use crate::kernel::EnvironmentKernel;
use crate::matrix::{build_kernel_matrix, KernelMatrix};
use crate::mode::MatchMode;
use crate::report::MatchReport;
use crate::structure::Structure;

/// Scalar produced from a kernel matrix, with the intermediate results.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// Number of matched environments N.
    pub size: usize,
    /// Final similarity or distance.
    pub value: f64,
    /// Squared distance before clamping and square root, for assignment modes.
    pub squared: Option<f64>,
    /// Optimal matching, for assignment modes.
    pub assignment: Option<Assignment>,
    /// Permanent estimate, for `permanent` mode.
    pub permanent: Option<PermanentEstimate>,
}

/// Turns a squared distance into a distance, clamping negative round-off to 0.
pub fn distance_from_squared(squared: f64) -> f64 {
    if squared < 0.0 {
        warn!(squared, "negative squared distance clamped to zero");
        0.0
    } else {
        squared.sqrt()
    }
}

fn matched(cost: DMatrix<f64>) -> Result<(Assignment, DMatrix<f64>), EnvmError> {
    let assignment = solve(&cost)?;
    Ok((assignment, cost))
}

/// Aggregates a square kernel matrix under `config.mode`.
///
/// `config.periodic` only selects the normalisation here; tiling happens in
/// [`compare`]. `average` works on aggregate environments, not on a kernel
/// matrix, and is rejected.
pub fn aggregate(kernel: &KernelMatrix, config: &MatchConfig) -> Result<Aggregate, EnvmError> {
    let k = kernel.values();
    if !k.is_square() {
        return Err(EnvmError::DimensionMismatch(
            ErrorInfo::new("non-square", "aggregation requires a square kernel matrix")
                .with_context("rows", k.nrows())
                .with_context("cols", k.ncols())
                .with_hint("tile periodic matrices before aggregating"),
        ));
    }
    let n = k.nrows();
    if n == 0 {
        return Err(EnvmError::EmptyStructure(ErrorInfo::new(
            "no-environments",
            "similarity is undefined for an empty kernel matrix",
        )));
    }
    let size = n as f64;

    let (squared, assignment) = match config.mode {
        MatchMode::LogSum => {
            let (assignment, _) = matched(k.map(|value| 1.0 - value))?;
            let overlap = assignment.sum_over(k);
            if overlap <= 0.0 {
                return Err(EnvmError::Numeric(
                    ErrorInfo::new("zero-overlap", "logsum is undefined without matched overlap")
                        .with_context("overlap", overlap)
                        .with_context("size", n),
                ));
            }
            (-(overlap / size).ln(), assignment)
        }
        MatchMode::SumLog => {
            let eps = config.sumlog_epsilon;
            let (assignment, cost) = matched(k.map(|value| -((value + eps) / (1.0 + eps)).ln()))?;
            let mut total = assignment.sum_over(&cost);
            if config.periodic {
                total /= size;
            }
            (total, assignment)
        }
        MatchMode::KDistance | MatchMode::NKDistance => {
            let (assignment, cost) = matched(k.map(|value| 2.0 * (1.0 - value)))?;
            let mut total = assignment.sum_over(&cost);
            if config.periodic || config.mode == MatchMode::NKDistance {
                total /= size;
            }
            (total, assignment)
        }
        MatchMode::Permanent => {
            let estimate = permanent_real(k, &config.permanent)?;
            let value = estimate.normalized.re / size;
            debug!(size = n, value, method = ?estimate.method, "permanent aggregate");
            return Ok(Aggregate {
                size: n,
                value,
                squared: None,
                assignment: None,
                permanent: Some(estimate),
            });
        }
        MatchMode::Average => {
            return Err(EnvmError::InvalidMode(
                ErrorInfo::new("no-matrix-aggregate", "average mode does not use a kernel matrix")
                    .with_context("mode", config.mode)
                    .with_hint("use compare, which evaluates the aggregate environments"),
            ));
        }
    };

    if !squared.is_finite() {
        return Err(EnvmError::Numeric(
            ErrorInfo::new("non-finite-cost", "aggregated cost is not finite")
                .with_context("mode", config.mode)
                .with_context("cost", squared),
        ));
    }
    let value = distance_from_squared(squared);
    debug!(size = n, mode = %config.mode, squared, value, "assignment aggregate");
    Ok(Aggregate {
        size: n,
        value,
        squared: Some(squared),
        assignment: Some(assignment),
        permanent: None,
    })
}

fn average<K>(a: &Structure, b: &Structure, kernel: &K) -> Result<f64, EnvmError>
where
    K: EnvironmentKernel + ?Sized,
{
    match (a.global_environment(), b.global_environment()) {
        (Some(global_a), Some(global_b)) => {
            let value = kernel.evaluate(global_a, global_b);
            if value.is_finite() {
                Ok(value)
            } else {
                Err(EnvmError::Numeric(
                    ErrorInfo::new("non-finite-kernel", "aggregate kernel value is not finite")
                        .with_context("value", value),
                ))
            }
        }
        _ => Err(EnvmError::EmptyStructure(
            ErrorInfo::new("no-aggregate", "average mode needs real environments on both sides")
                .with_context("a", a.name())
                .with_context("b", b.name()),
        )),
    }
}

fn run<K, A>(
    a: &Structure,
    b: &Structure,
    kernel: &K,
    alchemy: &A,
    config: &MatchConfig,
    mut sink: Option<&mut dyn Write>,
) -> Result<MatchReport, EnvmError>
where
    K: EnvironmentKernel + ?Sized,
    A: AlchemyMixer + ?Sized,
{
    config.validate()?;
    checked_penalty(alchemy)?;
    if config.mode == MatchMode::Average {
        let value = average(a, b, kernel)?;
        debug!(a = a.name(), b = b.name(), value, "average kernel");
        if let Some(out) = sink.as_deref_mut() {
            write_species_listing(out, &a.site_species(), &b.site_species())?;
        }
        return MatchReport::new(config, Aggregate {
            size: 0,
            value,
            squared: None,
            assignment: None,
            permanent: None,
        });
    }

    let raw = build_kernel_matrix(a, b, kernel, alchemy, config.mode, config.periodic)?;
    let result = if config.periodic {
        aggregate(&raw.tile_periodic()?, config)?
    } else {
        aggregate(&raw, config)?
    };
    if let Some(out) = sink.as_deref_mut() {
        write_dump(out, &raw, result.assignment.as_ref(), &config.dump)?;
    }
    MatchReport::new(config, result)
}

/// Compares two structures under `config`.
pub fn compare<K, A>(
    a: &Structure,
    b: &Structure,
    kernel: &K,
    alchemy: &A,
    config: &MatchConfig,
) -> Result<MatchReport, EnvmError>
where
    K: EnvironmentKernel + ?Sized,
    A: AlchemyMixer + ?Sized,
{
    run(a, b, kernel, alchemy, config, None)
}

/// Like [`compare`], additionally writing the species listing, the kernel
/// matrix (before tiling) and the matched pairs to `out`. `average` builds no
/// matrix and writes the species listing only.
pub fn compare_with_dump<K, A>(
    a: &Structure,
    b: &Structure,
    kernel: &K,
    alchemy: &A,
    config: &MatchConfig,
    out: &mut dyn Write,
) -> Result<MatchReport, EnvmError>
where
    K: EnvironmentKernel + ?Sized,
    A: AlchemyMixer + ?Sized,
{
    run(a, b, kernel, alchemy, config, Some(out))
}

/// Distance or similarity between two structures, without the report.
pub fn structure_distance<K, A>(
    a: &Structure,
    b: &Structure,
    kernel: &K,
    alchemy: &A,
    config: &MatchConfig,
) -> Result<f64, EnvmError>
where
    K: EnvironmentKernel + ?Sized,
    A: AlchemyMixer + ?Sized,
{
    compare(a, b, kernel, alchemy, config).map(|report| report.value)
}
