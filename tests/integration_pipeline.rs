//! Integration tests for clustering a scenario and driving simulations.

mod common;

use cluster_sim::cluster::{ClusterAssignment, Partitioning, form_clusters};
use cluster_sim::config::{ClusteringConfig, ScenarioConfig};
use cluster_sim::error::{ClusterError, ConvergenceStage, Diagnostic};
use cluster_sim::features::FeatureExtractor;
use cluster_sim::io::{read_series, write_annual_csv};
use cluster_sim::series::{SeriesKind, TimeSeries};
use cluster_sim::sim::{ClusterPlan, NamedArrays, ReconstructionReport, SimulationRequest};

#[test]
fn synthetic_year_reconstructs_full_length_outputs() {
    let inputs = common::synthetic_year();
    let plan = ClusterPlan::build(&common::single_run_config(), &inputs).unwrap();
    let outcome = plan.drive(&common::pass_through).unwrap();

    assert_eq!(outcome.annual.len(), 5);
    for values in outcome.annual.values() {
        assert_eq!(values.len(), 8760);
        assert!(values.iter().all(|v| v.is_finite()));
    }
    assert!(plan.assignment().num_clusters() > 1);
    assert!(plan.assignment().num_clusters() < 181);
}

#[test]
fn hard_partition_rows_have_one_member() {
    let plan = ClusterPlan::build(&common::single_run_config(), &common::synthetic_year()).unwrap();
    let partition = plan.partition();
    assert_eq!(partition.nrows(), 181);
    for g in 0..partition.nrows() {
        let row = partition.row(g);
        assert_eq!(row.iter().sum::<f64>(), 1.0);
        assert_eq!(row.iter().filter(|v| **v == 1.0).count(), 1);
        assert!(row.iter().all(|v| *v == 0.0 || *v == 1.0));
    }
}

#[test]
fn boundary_weights_sum_to_one() {
    let plan = ClusterPlan::build(&common::single_run_config(), &common::synthetic_year()).unwrap();
    assert!(plan.boundary().clusters().is_some());
    assert!((plan.weights().iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn clustering_is_deterministic() {
    let config = common::single_run_config();
    let inputs = common::synthetic_year();
    let a = ClusterPlan::build(&config, &inputs).unwrap();
    let b = ClusterPlan::build(&config, &inputs).unwrap();
    assert_eq!(a.assignment(), b.assignment());
    assert_eq!(a.weights(), b.weights());
}

#[test]
fn two_regimes_split_into_their_own_clusters() {
    let inputs = common::two_regime_year();
    let plan = ClusterPlan::build(&common::single_run_config(), &inputs).unwrap();
    let assignment = plan.assignment();
    // Groups of one regime never share a cluster with the other regime.
    let regime = |g: usize| ((2 * g + 1) / 30) % 2;
    for g in 0..assignment.num_groups() {
        for h in 0..assignment.num_groups() {
            if assignment.index()[g] == assignment.index()[h] {
                let both_inside = (2 * g + 2) / 30 == (2 * g + 1) / 30
                    && (2 * h + 2) / 30 == (2 * h + 1) / 30;
                if both_inside {
                    assert_eq!(regime(g), regime(h), "groups {g} and {h}");
                }
            }
        }
    }
}

#[test]
fn identity_clustering_reproduces_every_counted_day() {
    let config = ScenarioConfig::exact();
    let plan = ClusterPlan::build(&config, &common::synthetic_year()).unwrap();
    assert_eq!(plan.assignment().num_clusters(), 181);
    // Every exemplar follows the previous one, so one window covers the year.
    assert_eq!(plan.groups().len(), 1);

    let outcome = plan.drive(&common::calendar_day_output).unwrap();
    let day = &outcome.annual["day"];
    for d in 1..=362 {
        assert!(day[d * 24..(d + 1) * 24].iter().all(|v| *v == d as f64), "day {d}");
    }
}

#[test]
fn one_cluster_of_ones_stays_ones() {
    let config = common::single_run_config();
    let inputs = common::synthetic_year();
    let mut diags = Vec::new();
    let features = FeatureExtractor::new(&config.features, 2)
        .extract(&inputs, &mut diags)
        .unwrap();
    let assignment = ClusterAssignment::from_exemplars(features.rows(), vec![90], Partitioning::Hard);
    let plan = ClusterPlan::from_parts(&config, &inputs, features, assignment).unwrap();

    let outcome = plan.drive(&common::constant_output(1.0)).unwrap();
    assert!(outcome.annual["value"].iter().all(|v| *v == 1.0));
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn averaged_ones_pass_through_as_ones() {
    let config = common::single_run_config();
    let inputs = common::synthetic_year().with(SeriesKind::Availability, TimeSeries::constant(1.0, 1));
    let mut diags = Vec::new();
    let features = FeatureExtractor::new(&config.features, 2)
        .extract(&inputs, &mut diags)
        .unwrap();
    let assignment = ClusterAssignment::from_exemplars(features.rows(), vec![90], Partitioning::Hard);
    let plan = ClusterPlan::from_parts(&config, &inputs, features, assignment).unwrap();

    let outcome = plan.drive(&common::pass_through).unwrap();
    let availability = &outcome.annual["availability"];
    assert_eq!(availability.len(), 8760);
    assert!(availability.iter().all(|v| (v - 1.0).abs() < 1e-12));
}

#[test]
fn two_blobs_reach_a_target_of_two() {
    let rows = vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.5],
        vec![11.0, 10.0],
        vec![10.0, 10.0],
        vec![10.0, 11.5],
    ];
    let config = ClusteringConfig {
        target_clusters: 2,
        cluster_count_tolerance: 0,
        ..ClusteringConfig::default()
    };
    let mut diags = Vec::new();
    let assignment = form_clusters(&rows, &config, &mut diags).unwrap();
    assert_eq!(assignment.exemplars(), &[0, 4]);
    assert_eq!(assignment.wcss(), 6.5);
    assert!(diags.is_empty());
}

#[test]
fn coverage_gaps_are_reported_once_per_run() {
    let mut config = common::single_run_config();
    config.days.days_per_group = 1;
    let inputs = common::two_regime_year();
    let mut diags = Vec::new();
    let features = FeatureExtractor::new(&config.features, 1)
        .extract(&inputs, &mut diags)
        .unwrap();
    let assignment = ClusterAssignment::from_exemplars(features.rows(), vec![0, 200], Partitioning::Hard);
    let plan = ClusterPlan::from_parts(&config, &inputs, features, assignment).unwrap();

    let outcome = plan.drive(&common::pass_through).unwrap();
    assert_eq!(outcome.annual.len(), 3);
    // Day 0 and the trailing day are outside every group.
    let gaps = outcome
        .diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::CoverageGap { .. }))
        .count();
    assert_eq!(gaps, 2);
}

#[test]
fn constant_series_with_single_day_groups() {
    let mut config = common::single_run_config();
    config.days.days_per_group = 1;
    let inputs = common::two_regime_year();
    let mut diags = Vec::new();
    let features = FeatureExtractor::new(&config.features, 1)
        .extract(&inputs, &mut diags)
        .unwrap();
    assert_eq!(features.num_groups(), 363);
    let assignment = ClusterAssignment::from_exemplars(features.rows(), vec![0], Partitioning::Hard);
    let plan = ClusterPlan::from_parts(&config, &inputs, features, assignment).unwrap();

    // Boundary correction and merging are skipped for single-day groups.
    assert!(plan.diagnostics().iter().all(|d| matches!(
        d,
        Diagnostic::UnsupportedConfiguration { days_per_group: 1, .. }
    )));
    assert_eq!(plan.diagnostics().len(), 2);

    let outcome = plan.drive(&common::constant_output(0.75)).unwrap();
    assert!(outcome.annual["value"].iter().all(|v| *v == 0.75));
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::CoverageGap { first_day: 0, .. })));
}

#[test]
fn parallel_drive_matches_sequential() {
    let plan = ClusterPlan::build(&common::single_run_config(), &common::synthetic_year()).unwrap();
    let sequential = plan.drive(&common::pass_through).unwrap();
    for workers in [2, 4, 64] {
        let parallel = plan.drive_parallel(&common::pass_through, workers).unwrap();
        assert_eq!(sequential, parallel, "{workers} workers");
    }
}

#[test]
fn failed_windows_are_substituted() {
    let plan = ClusterPlan::build(&common::single_run_config(), &common::synthetic_year()).unwrap();
    let failing = plan.groups()[0].group.start_day;
    let sim = |request: &SimulationRequest| -> Result<NamedArrays, String> {
        if request.group.start_day == failing {
            return Err("license server unavailable".to_string());
        }
        common::pass_through(request)
    };
    let outcome = plan.drive_parallel(&sim, 3).unwrap();

    let failures: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::SimulationFailed {
                clusters,
                substitutes,
                ..
            } => Some((clusters.clone(), substitutes.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    let (clusters, substitutes) = &failures[0];
    assert_eq!(clusters, &plan.groups()[0].clusters);
    for s in substitutes {
        assert!(!clusters.contains(s));
    }
    assert!(outcome.annual.values().all(|a| a.len() == 8760));
}

#[test]
fn every_window_failing_is_an_error() {
    let plan = ClusterPlan::build(&common::single_run_config(), &common::two_regime_year()).unwrap();
    let sim = |_: &SimulationRequest| -> Result<NamedArrays, String> { Err("no license".to_string()) };
    let err = plan.drive(&sim).unwrap_err();
    assert!(matches!(err, ClusterError::AllSimulationsFailed { .. }));
}

#[test]
fn invalid_config_is_rejected_before_clustering() {
    let mut config = ScenarioConfig::baseline();
    config.clustering.damping = 0.2;
    config.days.days_per_group = 0;
    let err = ClusterPlan::build(&config, &common::synthetic_year()).unwrap_err();
    match err {
        ClusterError::InvalidConfig(errors) => assert!(errors.len() >= 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fast_preset_lands_near_its_target() {
    let config = ScenarioConfig::fast();
    let plan = ClusterPlan::build(&config, &common::synthetic_year()).unwrap();
    let k = plan.assignment().num_clusters();
    let reached = k.abs_diff(config.clustering.target_clusters) <= config.clustering.cluster_count_tolerance;
    let warned = plan.diagnostics().iter().any(|d| {
        matches!(
            d,
            Diagnostic::Convergence {
                stage: ConvergenceStage::ClusterCount,
                ..
            }
        )
    });
    assert!(reached || warned, "{k} clusters without a warning");
}

#[test]
fn pass_through_report_keeps_annual_total() {
    let inputs = common::synthetic_year();
    let plan = ClusterPlan::build(&common::single_run_config(), &inputs).unwrap();
    let outcome = plan.drive(&common::pass_through).unwrap();
    let reference = inputs.get(SeriesKind::Dni).unwrap().values();
    let report = ReconstructionReport::from_arrays(&plan, reference, &outcome.annual["dni"]);
    assert!(report.rmse.is_finite());
    assert!(report.relative_error_pct.abs() < 5.0, "{report}");
    assert!(report.simulated_fraction > 0.0 && report.simulated_fraction < 1.0);
}

#[test]
fn csv_inputs_feed_the_pipeline() {
    let inputs = common::two_regime_year();
    let arrays: NamedArrays = inputs
        .iter()
        .map(|(kind, series)| (kind.name().to_string(), series.values().to_vec()))
        .collect();
    let mut buf = Vec::new();
    write_annual_csv(&arrays, 1, &mut buf).unwrap();

    let imported = read_series(buf.as_slice()).unwrap();
    assert_eq!(imported, inputs);
    let plan = ClusterPlan::build(&common::single_run_config(), &imported).unwrap();
    assert!(plan.assignment().num_clusters() >= 2);
}
