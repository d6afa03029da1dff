use envm_core::errors::{EnvmError, ErrorInfo};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Optimal matching returned by [`solve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// `(row, column)` pairs ordered by row, forming a bijection.
    pub pairs: Vec<(usize, usize)>,
    /// Sum of the matched entries of the cost matrix.
    pub cost: f64,
}

impl Assignment {
    /// Number of matched pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true for the empty matching of a 0×0 matrix.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Column assigned to each row, indexed by row.
    pub fn columns(&self) -> Vec<usize> {
        self.pairs.iter().map(|&(_, col)| col).collect()
    }

    /// Sums `values[(row, col)]` over the matched pairs.
    pub fn sum_over(&self, values: &DMatrix<f64>) -> f64 {
        self.pairs.iter().map(|&(row, col)| values[(row, col)]).sum()
    }
}

fn check_input(cost: &DMatrix<f64>) -> Result<(), EnvmError> {
    if !cost.is_square() {
        return Err(EnvmError::DimensionMismatch(
            ErrorInfo::new("non-square", "assignment requires a square cost matrix")
                .with_context("rows", cost.nrows())
                .with_context("cols", cost.ncols()),
        ));
    }
    let n = cost.nrows();
    for row in 0..n {
        for col in 0..n {
            let value = cost[(row, col)];
            if !value.is_finite() {
                return Err(EnvmError::Numeric(
                    ErrorInfo::new("non-finite-cost", "cost matrix entry is NaN or infinite")
                        .with_context("row", row)
                        .with_context("col", col)
                        .with_context("value", value),
                ));
            }
        }
    }
    Ok(())
}

/// Finds a minimum-cost perfect matching of a square cost matrix.
///
/// Shortest augmenting paths with row and column potentials, O(N³) time and
/// O(N²) space. Rows are inserted in ascending order and columns are scanned
/// in ascending order with strict comparisons, so among tied optima the same
/// matching is returned on every call.
pub fn solve(cost: &DMatrix<f64>) -> Result<Assignment, EnvmError> {
    check_input(cost)?;
    let n = cost.nrows();
    if n == 0 {
        return Ok(Assignment {
            pairs: Vec::new(),
            cost: 0.0,
        });
    }

    // 1-based bookkeeping: column 0 is the virtual source of each augmentation.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = cost[(i0 - 1, j - 1)] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut pairs: Vec<(usize, usize)> = (1..=n).map(|col| (owner[col] - 1, col - 1)).collect();
    pairs.sort_unstable();
    let total = pairs.iter().map(|&(row, col)| cost[(row, col)]).sum();
    debug!(size = n, cost = total, "solved assignment");
    Ok(Assignment { pairs, cost: total })
}
