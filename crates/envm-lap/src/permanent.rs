use envm_core::errors::{EnvmError, ErrorInfo};
use envm_core::rng::RngHandle;
use nalgebra::{Complex, DMatrix, Normed};
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::stats::RunningStats;

/// Batches evaluated per convergence check. Fixed so that the stopping point,
/// and therefore the estimate, does not depend on the thread count.
const BATCHES_PER_ROUND: usize = 8;

/// Largest size the exact path accepts; beyond it the subset index overflows.
const EXACT_HARD_LIMIT: usize = 62;

fn default_exact_threshold() -> usize {
    24
}

fn default_min_samples() -> usize {
    1024
}

fn default_max_samples() -> usize {
    200_000
}

fn default_batch_size() -> usize {
    1024
}

/// How the permanent is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermanentMethod {
    /// Exact below `exact_threshold`, approximate above it.
    #[default]
    Auto,
    /// Ryser's inclusion-exclusion formula.
    Exact,
    /// Monte Carlo estimate over random permutations.
    Approximate,
}

/// Permutation sampler used by the approximate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sampler {
    /// Row-by-row importance sampling, column chosen proportionally to the
    /// entry modulus among the columns still free.
    #[default]
    Sequential,
    /// Uniformly random permutations.
    Uniform,
}

/// Options for [`permanent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentOpts {
    /// Exact, approximate, or chosen by size.
    #[serde(default)]
    pub method: PermanentMethod,
    /// Largest size evaluated exactly under [`PermanentMethod::Auto`].
    #[serde(default = "default_exact_threshold")]
    pub exact_threshold: usize,
    /// Sampler for the approximate path.
    #[serde(default)]
    pub sampler: Sampler,
    /// Target relative standard error. `None`, the default, runs the full
    /// sample budget and reports the error reached instead of failing.
    #[serde(default)]
    pub precision: Option<f64>,
    /// Samples drawn before the precision target is consulted.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Sample budget.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Samples per independently seeded batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Master seed for the sampling substreams.
    #[serde(default)]
    pub seed: u64,
}

impl Default for PermanentOpts {
    fn default() -> Self {
        Self {
            method: PermanentMethod::Auto,
            exact_threshold: default_exact_threshold(),
            sampler: Sampler::Sequential,
            precision: None,
            min_samples: default_min_samples(),
            max_samples: default_max_samples(),
            batch_size: default_batch_size(),
            seed: 0,
        }
    }
}

/// Permanent of an N×N matrix, reported relative to N!.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentEstimate {
    /// Matrix size N.
    pub size: usize,
    /// `perm(M) / N!`.
    pub normalized: Complex<f64>,
    /// `ln |perm(M)|`, finite even when `perm(M)` itself would overflow.
    /// `None` when the permanent is zero.
    pub log_abs: Option<f64>,
    /// Method actually used, never [`PermanentMethod::Auto`].
    pub method: PermanentMethod,
    /// Relative standard error of the estimate, zero for the exact path.
    pub relative_std_error: f64,
    /// Permutations sampled, zero for the exact path.
    pub samples: usize,
}

impl PermanentEstimate {
    /// `perm(M)` itself. Overflows to infinity for large N.
    pub fn value(&self) -> Complex<f64> {
        self.normalized * ln_factorial(self.size).exp()
    }
}

fn finite_log(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Natural logarithm of `n!`.
pub fn ln_factorial(n: usize) -> f64 {
    (2..=n).map(|k| (k as f64).ln()).sum()
}

/// Rows rescaled to unit maximum modulus together with `Σ ln(scale)`.
struct ScaledRows {
    rows: Vec<Vec<Complex<f64>>>,
    moduli: Vec<Vec<f64>>,
    log_scale: f64,
}

impl ScaledRows {
    /// Returns `None` when some row is identically zero, in which case the
    /// permanent is zero.
    fn new(matrix: &DMatrix<Complex<f64>>) -> Option<Self> {
        let n = matrix.nrows();
        let mut rows = Vec::with_capacity(n);
        let mut moduli = Vec::with_capacity(n);
        let mut log_scale = 0.0;
        for i in 0..n {
            let row: Vec<Complex<f64>> = (0..n).map(|j| matrix[(i, j)]).collect();
            let scale = row.iter().map(|entry| entry.norm()).fold(0.0, f64::max);
            if scale == 0.0 {
                return None;
            }
            log_scale += scale.ln();
            let row: Vec<Complex<f64>> = row.into_iter().map(|entry| entry / scale).collect();
            moduli.push(row.iter().map(|entry| entry.norm()).collect());
            rows.push(row);
        }
        Some(Self {
            rows,
            moduli,
            log_scale,
        })
    }
}

fn check_matrix(matrix: &DMatrix<Complex<f64>>) -> Result<(), EnvmError> {
    if !matrix.is_square() {
        return Err(EnvmError::DimensionMismatch(
            ErrorInfo::new("non-square", "permanent requires a square matrix")
                .with_context("rows", matrix.nrows())
                .with_context("cols", matrix.ncols()),
        ));
    }
    for (idx, entry) in matrix.iter().enumerate() {
        if !entry.re.is_finite() || !entry.im.is_finite() {
            let n = matrix.nrows();
            return Err(EnvmError::Numeric(
                ErrorInfo::new("non-finite-entry", "matrix entry is NaN or infinite")
                    .with_context("row", idx % n)
                    .with_context("col", idx / n),
            ));
        }
    }
    Ok(())
}

fn resolve_method(n: usize, opts: &PermanentOpts) -> PermanentMethod {
    match opts.method {
        PermanentMethod::Auto if n <= opts.exact_threshold => PermanentMethod::Exact,
        PermanentMethod::Auto => PermanentMethod::Approximate,
        other => other,
    }
}

/// Computes or estimates `perm(matrix)`.
///
/// Under [`PermanentMethod::Auto`] matrices up to `opts.exact_threshold` rows
/// go through Ryser's formula in O(2^N·N) and larger ones through seeded
/// Monte Carlo sampling. The returned estimate records which path ran.
pub fn permanent(
    matrix: &DMatrix<Complex<f64>>,
    opts: &PermanentOpts,
) -> Result<PermanentEstimate, EnvmError> {
    check_matrix(matrix)?;
    let n = matrix.nrows();
    let method = resolve_method(n, opts);
    if n == 0 {
        return Ok(PermanentEstimate {
            size: 0,
            normalized: Complex::new(1.0, 0.0),
            log_abs: Some(0.0),
            method,
            relative_std_error: 0.0,
            samples: 0,
        });
    }
    let Some(scaled) = ScaledRows::new(matrix) else {
        debug!(size = n, "zero row, permanent vanishes");
        return Ok(PermanentEstimate {
            size: n,
            normalized: Complex::new(0.0, 0.0),
            log_abs: None,
            method,
            relative_std_error: 0.0,
            samples: 0,
        });
    };
    match method {
        PermanentMethod::Exact => exact(&scaled, n),
        _ => approximate(&scaled, n, opts),
    }
}

/// Casts a real matrix to complex and evaluates [`permanent`].
pub fn permanent_real(
    matrix: &DMatrix<f64>,
    opts: &PermanentOpts,
) -> Result<PermanentEstimate, EnvmError> {
    permanent(&matrix.map(|value| Complex::new(value, 0.0)), opts)
}

fn exact(scaled: &ScaledRows, n: usize) -> Result<PermanentEstimate, EnvmError> {
    if n > EXACT_HARD_LIMIT {
        return Err(EnvmError::Numeric(
            ErrorInfo::new("exact-too-large", "exact permanent is limited in size")
                .with_context("size", n)
                .with_context("limit", EXACT_HARD_LIMIT)
                .with_hint("use the approximate method"),
        ));
    }
    let perm = ryser(&scaled.rows);
    let ln_fact = ln_factorial(n);
    let normalized = perm * (scaled.log_scale - ln_fact).exp();
    let log_abs = finite_log(perm.norm().ln() + scaled.log_scale);
    debug!(size = n, ?log_abs, "exact permanent");
    Ok(PermanentEstimate {
        size: n,
        normalized,
        log_abs,
        method: PermanentMethod::Exact,
        relative_std_error: 0.0,
        samples: 0,
    })
}

/// Ryser's formula walked in Gray-code order, split into independent chunks.
///
/// `perm(A) = (-1)^n Σ_S (-1)^{|S|} Π_i Σ_{j∈S} a_ij` over column subsets S.
fn ryser(rows: &[Vec<Complex<f64>>]) -> Complex<f64> {
    let n = rows.len();
    let total: u64 = 1 << n;
    let chunks: usize = 1 << n.min(6);
    let chunk_len = total / chunks as u64;

    let partial: Vec<Complex<f64>> = (0..chunks)
        .into_par_iter()
        .map(|chunk| {
            let start = chunk as u64 * chunk_len;
            let end = start + chunk_len;
            let mut gray = start ^ (start >> 1);
            let mut sums: Vec<Complex<f64>> = rows
                .iter()
                .map(|row| {
                    (0..n)
                        .filter(|&j| gray & (1 << j) != 0)
                        .map(|j| row[j])
                        .sum()
                })
                .collect();
            let mut acc = Complex::new(0.0, 0.0);
            for k in start..end {
                if k > start {
                    let bit = k.trailing_zeros() as usize;
                    gray ^= 1 << bit;
                    if gray & (1 << bit) != 0 {
                        sums.iter_mut().zip(rows).for_each(|(s, row)| *s += row[bit]);
                    } else {
                        sums.iter_mut().zip(rows).for_each(|(s, row)| *s -= row[bit]);
                    }
                }
                if gray == 0 {
                    continue;
                }
                let term: Complex<f64> = sums.iter().product();
                if gray.count_ones() % 2 == 0 {
                    acc += term;
                } else {
                    acc -= term;
                }
            }
            acc
        })
        .collect();

    let sum: Complex<f64> = partial.into_iter().sum();
    if n % 2 == 0 {
        sum
    } else {
        -sum
    }
}

fn sequential_sample(
    scaled: &ScaledRows,
    rng: &mut RngHandle,
    free: &mut Vec<usize>,
) -> Complex<f64> {
    let n = scaled.rows.len();
    free.clear();
    free.extend(0..n);
    let mut value = Complex::new(1.0, 0.0);
    for i in 0..n {
        let moduli = &scaled.moduli[i];
        let total: f64 = free.iter().map(|&j| moduli[j]).sum();
        if total <= 0.0 {
            return Complex::new(0.0, 0.0);
        }
        let mut target = rng.gen::<f64>() * total;
        let mut pick = None;
        let mut last_nonzero = 0;
        for (pos, &j) in free.iter().enumerate() {
            if moduli[j] > 0.0 {
                last_nonzero = pos;
            }
            target -= moduli[j];
            if target < 0.0 {
                pick = Some(pos);
                break;
            }
        }
        let col = free.swap_remove(pick.unwrap_or(last_nonzero));
        let entry = scaled.rows[i][col];
        // entry / q(col) with q = |entry| / total, divided by the (n - i) factor of N!
        value *= entry / moduli[col] * (total / (n - i) as f64);
    }
    value
}

fn uniform_sample(scaled: &ScaledRows, rng: &mut RngHandle, perm: &mut Vec<usize>) -> Complex<f64> {
    let n = scaled.rows.len();
    perm.clear();
    perm.extend(0..n);
    perm.shuffle(rng);
    perm.iter()
        .enumerate()
        .map(|(i, &j)| scaled.rows[i][j])
        .product()
}

fn run_batch(scaled: &ScaledRows, opts: &PermanentOpts, batch: usize, len: usize) -> RunningStats {
    let mut rng = RngHandle::for_batch(opts.seed, batch as u64);
    let mut scratch = Vec::with_capacity(scaled.rows.len());
    let mut stats = RunningStats::default();
    for _ in 0..len {
        let sample = match opts.sampler {
            Sampler::Sequential => sequential_sample(scaled, &mut rng, &mut scratch),
            Sampler::Uniform => uniform_sample(scaled, &mut rng, &mut scratch),
        };
        stats.push(sample);
    }
    stats
}

fn approximate(
    scaled: &ScaledRows,
    n: usize,
    opts: &PermanentOpts,
) -> Result<PermanentEstimate, EnvmError> {
    if opts.max_samples == 0 || opts.batch_size == 0 {
        return Err(EnvmError::Numeric(
            ErrorInfo::new("empty-budget", "approximate permanent needs a positive sample budget")
                .with_context("max_samples", opts.max_samples)
                .with_context("batch_size", opts.batch_size),
        ));
    }
    let total_batches = opts.max_samples.div_ceil(opts.batch_size);
    let mut stats = RunningStats::default();
    let mut next_batch = 0;
    let mut converged = false;
    while next_batch < total_batches {
        let round_end = (next_batch + BATCHES_PER_ROUND).min(total_batches);
        let round: Vec<RunningStats> = (next_batch..round_end)
            .into_par_iter()
            .map(|batch| {
                let len = opts
                    .batch_size
                    .min(opts.max_samples - batch * opts.batch_size);
                run_batch(scaled, opts, batch, len)
            })
            .collect();
        round.iter().for_each(|partial| stats.merge(partial));
        next_batch = round_end;

        if let Some(target) = opts.precision {
            if stats.count >= opts.min_samples && stats.relative_std_error() <= target {
                converged = true;
                break;
            }
        }
    }

    let relative_std_error = stats.relative_std_error();
    let normalized = stats.mean * scaled.log_scale.exp();
    let log_abs = finite_log(stats.mean.norm().ln() + scaled.log_scale + ln_factorial(n));
    debug!(
        size = n,
        samples = stats.count,
        relative_std_error,
        sampler = ?opts.sampler,
        "approximate permanent"
    );

    if let Some(target) = opts.precision {
        if !converged {
            warn!(
                size = n,
                samples = stats.count,
                relative_std_error,
                target,
                "permanent estimate missed its precision target"
            );
            return Err(EnvmError::PrecisionNotReached(
                ErrorInfo::new(
                    "budget-exhausted",
                    "sample budget exhausted before the precision target was met",
                )
                .with_context("size", n)
                .with_context("samples", stats.count)
                .with_context("relative_std_error", relative_std_error)
                .with_context("target", target)
                .with_context("estimate", normalized.re)
                .with_hint("raise max_samples or relax precision"),
            ));
        }
    }

    Ok(PermanentEstimate {
        size: n,
        normalized,
        log_abs,
        method: PermanentMethod::Approximate,
        relative_std_error,
        samples: stats.count,
    })
}
