use envm_match::{
    build_kernel_matrix, compare, compare_with_dump, Alchemy, EnvmError, MatchConfig, MatchMode,
    NormalizedDotKernel, Structure,
};

fn hydrogens(name: &str, count: usize) -> Structure {
    let mut builder = Structure::builder(name);
    for _ in 0..count {
        builder.push(1, vec![1.0, 0.0]);
    }
    builder.build().unwrap()
}

#[test]
fn padding_fills_missing_sites_with_placeholders() {
    let a = hydrogens("one", 1);
    let b = hydrogens("two", 2);
    let matrix = build_kernel_matrix(
        &a,
        &b,
        &NormalizedDotKernel::default(),
        &Alchemy::default(),
        MatchMode::SumLog,
        false,
    )
    .unwrap();
    assert_eq!(matrix.shape(), (2, 2));
    assert_eq!(matrix.values()[(0, 0)], 1.0);
    assert_eq!(matrix.values()[(1, 0)], 0.0);
    assert_eq!(matrix.row_species(), &[1, 1]);
}

#[test]
fn species_blocks_follow_ascending_order() {
    let a = Structure::builder("a")
        .with_environment(8, vec![1.0])
        .with_environment(1, vec![1.0])
        .build()
        .unwrap();
    let b = Structure::builder("b")
        .with_environment(6, vec![1.0])
        .build()
        .unwrap();
    let matrix = build_kernel_matrix(
        &a,
        &b,
        &NormalizedDotKernel::default(),
        &Alchemy::default(),
        MatchMode::SumLog,
        false,
    )
    .unwrap();
    assert_eq!(matrix.row_species(), &[1, 6, 8]);
    assert_eq!(matrix.col_species(), &[1, 6, 8]);
    // cross-species entries vanish under the default alchemy
    assert_eq!(matrix.values()[(0, 1)], 0.0);
    // real hydrogen against a placeholder hydrogen
    assert_eq!(matrix.values()[(0, 0)], 0.0);
    assert_eq!(matrix.values()[(1, 1)], 0.0);
}

#[test]
fn penalty_replaces_real_placeholder_pairs() {
    let a = hydrogens("one", 1);
    let b = hydrogens("two", 2);
    let alchemy = Alchemy::default().with_mu(1.0);
    let kernel = NormalizedDotKernel::default();

    let scaled = build_kernel_matrix(&a, &b, &kernel, &alchemy, MatchMode::SumLog, false).unwrap();
    assert!((scaled.values()[(1, 0)] - (-1.0f64).exp()).abs() < 1e-15);
    assert_eq!(scaled.values()[(0, 0)], 1.0);

    let shifted =
        build_kernel_matrix(&a, &b, &kernel, &alchemy, MatchMode::KDistance, false).unwrap();
    assert!((shifted.values()[(1, 1)] - 0.5).abs() < 1e-15);
}

#[test]
fn alchemy_weights_cross_species_pairs() {
    let a = Structure::builder("a")
        .with_environment(1, vec![1.0])
        .build()
        .unwrap();
    let b = Structure::builder("b")
        .with_environment(9, vec![1.0])
        .build()
        .unwrap();
    let alchemy = Alchemy::default().with_pair(9, 1, 0.4);
    let matrix = build_kernel_matrix(
        &a,
        &b,
        &NormalizedDotKernel::default(),
        &alchemy,
        MatchMode::SumLog,
        true,
    )
    .unwrap();
    assert_eq!(matrix.shape(), (1, 1));
    assert!((matrix.values()[(0, 0)] - 0.4).abs() < 1e-15);
}

#[test]
fn periodic_comparison_tiles_to_lcm() {
    let a = hydrogens("pair", 2);
    let b = hydrogens("triple", 3);
    let config = MatchConfig::for_mode(MatchMode::SumLog).periodic(true);
    let report = compare(
        &a,
        &b,
        &NormalizedDotKernel::default(),
        &Alchemy::default(),
        &config,
    )
    .unwrap();
    assert_eq!(report.size, 6);
    assert!(report.value < 1e-6);
    assert_eq!(report.assignment.map(|pairs| pairs.len()), Some(6));
}

#[test]
fn periodic_comparison_rejects_empty_side() {
    let a = hydrogens("pair", 2);
    let empty = Structure::builder("empty").build().unwrap();
    let err = compare(
        &a,
        &empty,
        &NormalizedDotKernel::default(),
        &Alchemy::default(),
        &MatchConfig::default().periodic(true),
    )
    .unwrap_err();
    assert!(matches!(err, EnvmError::EmptyStructure(_)));
}

#[test]
fn kit_top_up_matches_padding() {
    let kit = [(1, 3)];
    let a = Structure::builder("a")
        .with_environment(1, vec![1.0, 0.0])
        .with_kit(kit)
        .build()
        .unwrap();
    let b = Structure::builder("b")
        .with_environment(1, vec![1.0, 0.0])
        .with_environment(1, vec![0.0, 1.0])
        .with_kit(kit)
        .build()
        .unwrap();
    let kernel = NormalizedDotKernel::default();
    let matrix =
        build_kernel_matrix(&a, &b, &kernel, &Alchemy::default(), MatchMode::SumLog, false)
            .unwrap();
    assert_eq!(matrix.shape(), (3, 3));
    assert_eq!(matrix.values()[(2, 2)], 1.0);
}

#[test]
fn dump_does_not_change_the_result() {
    let a = hydrogens("pair", 2);
    let b = hydrogens("triple", 3);
    let kernel = NormalizedDotKernel::default();
    let config = MatchConfig::for_mode(MatchMode::NKDistance).periodic(true);

    let plain = compare(&a, &b, &kernel, &Alchemy::default(), &config).unwrap();
    let mut sink = Vec::new();
    let dumped = compare_with_dump(&a, &b, &kernel, &Alchemy::default(), &config, &mut sink).unwrap();
    assert_eq!(plain, dumped);

    let text = String::from_utf8(sink).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[1], " 1  1 ");
    assert_eq!(lines[2], " 1  1  1 ");
    // raw 2×3 matrix, not the tiled one
    assert_eq!(lines[4], "1.0000e+00 1.0000e+00 1.0000e+00 ");
    assert_eq!(lines[6], "# optimal environment list: ");
    assert_eq!(lines.len(), 7 + 6);
}

#[test]
fn permanent_dump_has_no_pairs() {
    let a = hydrogens("pair", 2);
    let kernel = NormalizedDotKernel::default();
    let config = MatchConfig::for_mode(MatchMode::Permanent);
    let mut sink = Vec::new();
    let report = compare_with_dump(&a, &a, &kernel, &Alchemy::default(), &config, &mut sink).unwrap();
    // all-ones 2×2: perm = 2, 2 / 2! / 2
    assert!((report.value - 0.5).abs() < 1e-12);
    let text = String::from_utf8(sink).unwrap();
    assert!(!text.contains("optimal environment list"));
}

#[test]
fn kit_atoms_are_present_and_escape_the_penalty() {
    let kernel = NormalizedDotKernel::default();
    let alchemy = Alchemy::default().with_mu(1.0);
    let topped = Structure::builder("topped")
        .with_environment(1, vec![1.0, 0.0])
        .with_kit([(1, 2)])
        .build()
        .unwrap();
    assert!(!topped.is_missing(1, 1));

    // isolated atom against a real one: plain kernel, no penalty
    let pair = hydrogens("pair", 2);
    let matrix =
        build_kernel_matrix(&topped, &pair, &kernel, &alchemy, MatchMode::SumLog, false).unwrap();
    assert_eq!(matrix.values()[(1, 0)], 0.0);
    assert_eq!(matrix.values()[(0, 0)], 1.0);

    // isolated atom against padding: exactly one side is missing
    let single = hydrogens("single", 1);
    let matrix =
        build_kernel_matrix(&topped, &single, &kernel, &alchemy, MatchMode::SumLog, false)
            .unwrap();
    assert!((matrix.values()[(1, 1)] - (-1.0f64).exp()).abs() < 1e-15);
    assert!((matrix.values()[(0, 1)] - (-1.0f64).exp()).abs() < 1e-15);
}

#[test]
fn kit_atoms_join_the_average_environment() {
    let kernel = NormalizedDotKernel::default();
    let config = MatchConfig::for_mode(MatchMode::Average);
    let reference = Structure::builder("reference")
        .with_environment(1, vec![1.0, 1.0])
        .build()
        .unwrap();
    let bare = hydrogens("bare", 1);
    let topped = Structure::builder("topped")
        .with_environment(1, vec![1.0, 0.0])
        .with_kit([(1, 2)])
        .with_isolated_descriptor(1, vec![0.0, 1.0])
        .build()
        .unwrap();

    let without = compare(&bare, &reference, &kernel, &Alchemy::default(), &config).unwrap();
    let with = compare(&topped, &reference, &kernel, &Alchemy::default(), &config).unwrap();
    assert!(without.value < 1.0 - 1e-6);
    assert!((with.value - 1.0).abs() < 1e-12);
}

#[test]
fn periodic_mismatch_is_normalised_by_tile_size() {
    let a = Structure::builder("ab")
        .with_environment(1, vec![1.0, 0.0])
        .with_environment(1, vec![0.0, 1.0])
        .build()
        .unwrap();
    let b = Structure::builder("aab")
        .with_environment(1, vec![1.0, 0.0])
        .with_environment(1, vec![1.0, 0.0])
        .with_environment(1, vec![0.0, 1.0])
        .build()
        .unwrap();
    let kernel = NormalizedDotKernel::default();
    // tiled to 6×6: five unit overlaps and one orthogonal pair
    let run = |mode| {
        compare(
            &a,
            &b,
            &kernel,
            &Alchemy::default(),
            &MatchConfig::for_mode(mode).periodic(true),
        )
        .unwrap()
    };

    let logsum = run(MatchMode::LogSum);
    assert_eq!(logsum.size, 6);
    assert!((logsum.value - (-(5.0f64 / 6.0).ln()).sqrt()).abs() < 1e-12);

    let sumlog = run(MatchMode::SumLog);
    let expected = (100.0 * 10f64.ln() / 6.0).sqrt();
    assert!((sumlog.value - expected).abs() < 1e-9, "sumlog {}", sumlog.value);

    for mode in [MatchMode::KDistance, MatchMode::NKDistance] {
        let report = run(mode);
        assert_eq!(report.size, 6);
        assert!((report.value - (1.0f64 / 3.0).sqrt()).abs() < 1e-12, "{mode}");
    }
}

#[test]
fn average_dump_lists_species_only() {
    let a = Structure::builder("a")
        .with_environment(8, vec![0.0, 1.0])
        .with_environment(1, vec![1.0, 0.0])
        .build()
        .unwrap();
    let b = Structure::builder("b")
        .with_environment(6, vec![2.0, 2.0])
        .build()
        .unwrap();
    let kernel = NormalizedDotKernel::default();
    let config = MatchConfig::for_mode(MatchMode::Average);
    let mut sink = Vec::new();
    let report = compare_with_dump(&a, &b, &kernel, &Alchemy::default(), &config, &mut sink).unwrap();
    assert!((report.value - 1.0).abs() < 1e-12);

    let text = String::from_utf8(sink).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], " 1  8 ");
    assert_eq!(lines[2], " 6 ");
    assert!(!text.contains("kernel matrix"));
}

#[test]
fn matrix_builder_refuses_negative_penalty() {
    let a = hydrogens("one", 1);
    let err = build_kernel_matrix(
        &a,
        &a,
        &NormalizedDotKernel::default(),
        &Alchemy::default().with_mu(-0.5),
        MatchMode::KDistance,
        false,
    )
    .unwrap_err();
    assert!(matches!(err, EnvmError::Numeric(_)));
    assert_eq!(err.info().context["mu"], "-0.5");
}
