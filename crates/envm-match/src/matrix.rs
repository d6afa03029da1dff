use std::borrow::Cow;
use std::collections::BTreeSet;

use envm_core::errors::{EnvmError, ErrorInfo};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alchemy::{checked_penalty, AlchemyMixer};
use crate::environment::{Environment, Species};
use crate::kernel::EnvironmentKernel;
use crate::mode::MatchMode;
use crate::structure::Structure;

/// Pairwise kernel values between the environments of two structures,
/// already multiplied by the species-pair weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelMatrix {
    values: DMatrix<f64>,
    row_species: Vec<Species>,
    col_species: Vec<Species>,
}

impl KernelMatrix {
    /// Wraps precomputed values. Labels must match the matrix shape and all
    /// entries must be finite.
    pub fn from_values(
        values: DMatrix<f64>,
        row_species: Vec<Species>,
        col_species: Vec<Species>,
    ) -> Result<Self, EnvmError> {
        if row_species.len() != values.nrows() || col_species.len() != values.ncols() {
            return Err(EnvmError::DimensionMismatch(
                ErrorInfo::new("label-shape", "species labels do not match the matrix shape")
                    .with_context("rows", values.nrows())
                    .with_context("cols", values.ncols())
                    .with_context("row_labels", row_species.len())
                    .with_context("col_labels", col_species.len()),
            ));
        }
        check_finite(&values)?;
        Ok(Self {
            values,
            row_species,
            col_species,
        })
    }

    /// Matrix entries.
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Species of each row environment.
    pub fn row_species(&self) -> &[Species] {
        &self.row_species
    }

    /// Species of each column environment.
    pub fn col_species(&self) -> &[Species] {
        &self.col_species
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// Whether the matrix is square.
    pub fn is_square(&self) -> bool {
        self.values.is_square()
    }

    /// Replicates the matrix block-wise to `L×L`, `L = lcm(rows, cols)`.
    pub fn tile_periodic(&self) -> Result<KernelMatrix, EnvmError> {
        let (rows, cols) = self.shape();
        if rows == 0 || cols == 0 {
            return Err(EnvmError::EmptyStructure(
                ErrorInfo::new("tile-empty", "cannot tile a matrix with an empty side")
                    .with_context("rows", rows)
                    .with_context("cols", cols),
            ));
        }
        let size = lcm(rows, cols);
        debug!(rows, cols, size, "tiling periodic kernel matrix");
        Ok(KernelMatrix {
            values: DMatrix::from_fn(size, size, |i, j| self.values[(i % rows, j % cols)]),
            row_species: (0..size).map(|i| self.row_species[i % rows]).collect(),
            col_species: (0..size).map(|j| self.col_species[j % cols]).collect(),
        })
    }
}

fn check_finite(values: &DMatrix<f64>) -> Result<(), EnvmError> {
    let rows = values.nrows();
    match values.iter().position(|value| !value.is_finite()) {
        None => Ok(()),
        Some(idx) => Err(EnvmError::Numeric(
            ErrorInfo::new("non-finite-kernel", "kernel matrix entry is NaN or infinite")
                .with_context("row", idx % rows)
                .with_context("col", idx / rows)
                .with_context("value", values[idx]),
        )),
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

/// `(species, slots)` blocks in ascending species order.
type Layout = Vec<(Species, usize)>;

fn own_layout(structure: &Structure) -> Layout {
    structure
        .species()
        .map(|species| (species, structure.slot_count(species)))
        .collect()
}

fn shared_layout(a: &Structure, b: &Structure) -> Layout {
    let species: BTreeSet<Species> = a.species().chain(b.species()).collect();
    species
        .into_iter()
        .map(|z| (z, a.slot_count(z).max(b.slot_count(z))))
        .collect()
}

fn expand<'a>(structure: &'a Structure, layout: &Layout) -> Vec<Cow<'a, Environment>> {
    layout
        .iter()
        .flat_map(|&(species, slots)| (0..slots).map(move |idx| structure.environment(species, idx)))
        .collect()
}

/// Builds the kernel matrix between `a` (rows) and `b` (columns).
///
/// Without periodicity both structures are padded with placeholders to the
/// per-species maximum of their counts, giving a square matrix. With
/// periodicity each structure keeps its own layout and the result is the raw
/// rectangular matrix; tile it with [`KernelMatrix::tile_periodic`].
///
/// When the alchemy's penalty `mu` is positive, a pair with exactly one
/// placeholder skips the kernel and takes the mode's penalty entry.
pub fn build_kernel_matrix<K, A>(
    a: &Structure,
    b: &Structure,
    kernel: &K,
    alchemy: &A,
    mode: MatchMode,
    periodic: bool,
) -> Result<KernelMatrix, EnvmError>
where
    K: EnvironmentKernel + ?Sized,
    A: AlchemyMixer + ?Sized,
{
    let mu = checked_penalty(alchemy)?;
    let (total_a, total_b) = (a.total_environments(), b.total_environments());
    if (total_a == 0 && total_b == 0) || (periodic && (total_a == 0 || total_b == 0)) {
        return Err(EnvmError::EmptyStructure(
            ErrorInfo::new("no-environments", "similarity is undefined without environments")
                .with_context("a", a.name())
                .with_context("a_environments", total_a)
                .with_context("b", b.name())
                .with_context("b_environments", total_b)
                .with_context("periodic", periodic),
        ));
    }

    let (layout_a, layout_b) = if periodic {
        (own_layout(a), own_layout(b))
    } else {
        let shared = shared_layout(a, b);
        (shared.clone(), shared)
    };
    let rows = expand(a, &layout_a);
    let cols = expand(b, &layout_b);

    let entries: Vec<Vec<f64>> = rows
        .par_iter()
        .map(|env_a| {
            cols.iter()
                .map(|env_b| {
                    let weight = alchemy.pair_weight(env_a.species(), env_b.species());
                    if mu > 0.0 && (env_a.is_missing() ^ env_b.is_missing()) {
                        mode.missing_pair_entry(weight, mu)
                    } else {
                        kernel.evaluate(env_a, env_b) * weight
                    }
                })
                .collect()
        })
        .collect();

    let values = DMatrix::from_fn(rows.len(), cols.len(), |i, j| entries[i][j]);
    check_finite(&values)?;
    debug!(
        a = a.name(),
        b = b.name(),
        rows = rows.len(),
        cols = cols.len(),
        mode = %mode,
        periodic,
        "built kernel matrix"
    );
    Ok(KernelMatrix {
        values,
        row_species: rows.iter().map(|env| env.species()).collect(),
        col_species: cols.iter().map(|env| env.species()).collect(),
    })
}
