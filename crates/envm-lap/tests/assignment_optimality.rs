use envm_core::RngHandle;
use envm_lap::{solve, Assignment};
use nalgebra::DMatrix;
use proptest::prelude::*;
use rand::seq::SliceRandom;

fn permutation_cost(cost: &DMatrix<f64>, columns: &[usize]) -> f64 {
    columns
        .iter()
        .enumerate()
        .map(|(row, &col)| cost[(row, col)])
        .sum()
}

fn assert_bijection(result: &Assignment, n: usize) {
    assert_eq!(result.len(), n);
    let mut rows: Vec<usize> = result.pairs.iter().map(|&(row, _)| row).collect();
    let mut cols = result.columns();
    rows.sort_unstable();
    cols.sort_unstable();
    assert_eq!(rows, (0..n).collect::<Vec<_>>());
    assert_eq!(cols, (0..n).collect::<Vec<_>>());
}

fn cost_matrix() -> impl Strategy<Value = DMatrix<f64>> {
    (1usize..9).prop_flat_map(|n| {
        proptest::collection::vec(-5.0f64..5.0, n * n)
            .prop_map(move |values| DMatrix::from_row_slice(n, n, &values))
    })
}

proptest! {
    #[test]
    fn solution_beats_identity_and_sampled_permutations(cost in cost_matrix(), seed in any::<u64>()) {
        let n = cost.nrows();
        let result = solve(&cost).unwrap();
        assert_bijection(&result, n);
        prop_assert!((result.cost - permutation_cost(&cost, &result.columns())).abs() < 1e-9);

        let identity: Vec<usize> = (0..n).collect();
        prop_assert!(result.cost <= permutation_cost(&cost, &identity) + 1e-9);

        let mut rng = RngHandle::from_seed(seed);
        let mut columns = identity.clone();
        for _ in 0..1000 {
            columns.shuffle(&mut rng);
            prop_assert!(result.cost <= permutation_cost(&cost, &columns) + 1e-9);
        }
    }

    #[test]
    fn repeated_solves_are_identical(cost in cost_matrix()) {
        prop_assert_eq!(solve(&cost).unwrap(), solve(&cost).unwrap());
    }
}

#[test]
fn exhaustive_check_on_small_matrix() {
    let cost = DMatrix::from_row_slice(
        4,
        4,
        &[
            0.9, 0.1, 0.4, 0.7, //
            0.3, 0.8, 0.2, 0.6, //
            0.5, 0.4, 0.9, 0.1, //
            0.2, 0.7, 0.3, 0.8,
        ],
    );
    let mut best = f64::INFINITY;
    let mut columns: Vec<usize> = (0..4).collect();
    heap_permutations(&mut columns, 4, &mut |perm| {
        best = best.min(permutation_cost(&cost, perm));
    });
    let result = solve(&cost).unwrap();
    assert!((result.cost - best).abs() < 1e-12);
}

fn heap_permutations(items: &mut Vec<usize>, k: usize, visit: &mut dyn FnMut(&[usize])) {
    if k == 1 {
        visit(items);
        return;
    }
    for i in 0..k {
        heap_permutations(items, k - 1, visit);
        if k % 2 == 0 {
            items.swap(i, k - 1);
        } else {
            items.swap(0, k - 1);
        }
    }
}

#[test]
fn empty_matrix_has_empty_matching() {
    let result = solve(&DMatrix::<f64>::zeros(0, 0)).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.cost, 0.0);
}

#[test]
fn non_square_input_is_rejected() {
    let err = solve(&DMatrix::<f64>::zeros(2, 3)).unwrap_err();
    assert!(matches!(err, envm_core::EnvmError::DimensionMismatch(_)));
}

#[test]
fn infinite_entry_is_rejected() {
    let mut cost = DMatrix::<f64>::zeros(3, 3);
    cost[(2, 1)] = f64::INFINITY;
    let err = solve(&cost).unwrap_err();
    assert!(matches!(err, envm_core::EnvmError::Numeric(_)));
    assert_eq!(err.info().context.get("row").map(String::as_str), Some("2"));
}
