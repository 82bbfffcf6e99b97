//! cluster-sim entry point: clusters a scenario, drives a pass-through
//! simulator over the exemplar windows and reports the reconstruction error.

use std::path::Path;
use std::process;

use tracing_subscriber::EnvFilter;

use cluster_sim::config::ScenarioConfig;
use cluster_sim::io::{export_annual_csv, export_cluster_summary_csv, read_series_csv};
use cluster_sim::series::{ScenarioSeries, SeriesKind};
use cluster_sim::sim::{ClusterPlan, NamedArrays, ReconstructionReport, SimulationRequest};
use cluster_sim::synthetic;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    inputs_path: Option<String>,
    annual_out: Option<String>,
    summary_out: Option<String>,
    workers: Option<usize>,
    seed_override: Option<u64>,
}

fn print_help() {
    eprintln!("cluster-sim: representative-day clustering for annual plant simulations");
    eprintln!();
    eprintln!("Usage: cluster-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>   Load scenario from TOML config file");
    eprintln!("  --preset <name>     Use a built-in preset (baseline, fast, exact)");
    eprintln!("  --inputs <path>     Read annual input series from CSV");
    eprintln!("  --out <path>        Export reconstructed annual arrays to CSV");
    eprintln!("  --summary <path>    Export the cluster summary to CSV");
    eprintln!("  --workers <n>       Simulation worker threads");
    eprintln!("  --seed <u64>        Override the synthetic weather seed");
    eprintln!("  --help              Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Without --inputs a synthetic weather year is generated.");
}

/// Returns the value following flag `args[*i]`, exiting if it is missing.
fn flag_value(args: &[String], i: &mut usize, what: &str) -> String {
    *i += 1;
    if *i >= args.len() {
        eprintln!("error: {} requires {what}", args[*i - 1]);
        process::exit(1);
    }
    args[*i].clone()
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str, kind: &str) -> T {
    value.parse::<T>().unwrap_or_else(|_| {
        eprintln!("error: {flag} value \"{value}\" is not a valid {kind}");
        process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        inputs_path: None,
        annual_out: None,
        summary_out: None,
        workers: None,
        seed_override: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => cli.scenario_path = Some(flag_value(&args, &mut i, "a path argument")),
            "--preset" => cli.preset = Some(flag_value(&args, &mut i, "a name argument")),
            "--inputs" => cli.inputs_path = Some(flag_value(&args, &mut i, "a path argument")),
            "--out" => cli.annual_out = Some(flag_value(&args, &mut i, "a path argument")),
            "--summary" => cli.summary_out = Some(flag_value(&args, &mut i, "a path argument")),
            "--workers" => {
                let value = flag_value(&args, &mut i, "a count argument");
                cli.workers = Some(parse_number("--workers", &value, "count"));
            }
            "--seed" => {
                let value = flag_value(&args, &mut i, "a u64 argument");
                cli.seed_override = Some(parse_number("--seed", &value, "u64"));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn load_scenario(cli: &CliArgs) -> ScenarioConfig {
    let loaded = if let Some(ref path) = cli.scenario_path {
        ScenarioConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::baseline())
    };
    let mut scenario = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(seed) = cli.seed_override {
        scenario.synthetic.seed = seed;
    }
    if let Some(workers) = cli.workers {
        scenario.output.workers = workers;
    }
    if cli.annual_out.is_some() {
        scenario.output.annual_csv.clone_from(&cli.annual_out);
    }
    if cli.summary_out.is_some() {
        scenario.output.summary_csv.clone_from(&cli.summary_out);
    }
    scenario
}

/// Returns the averaged inputs of each window unchanged.
fn pass_through(request: &SimulationRequest) -> Result<NamedArrays, String> {
    Ok(request.inputs.clone())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cluster_sim=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    let scenario = load_scenario(&cli);

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let inputs: ScenarioSeries = match cli.inputs_path {
        Some(ref path) => read_series_csv(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("error: failed to read inputs: {e}");
            process::exit(1);
        }),
        None => synthetic::generate(&scenario.synthetic),
    };

    let plan = ClusterPlan::build(&scenario, &inputs).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let outcome = plan
        .drive_parallel(&pass_through, scenario.output.workers)
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        });

    let warnings = plan.diagnostics().len() + outcome.diagnostics.len();
    if warnings > 0 {
        eprintln!("{warnings} warning(s) raised");
    }

    // Reconstructed irradiance against the raw series.
    let dni = SeriesKind::Dni.name();
    if let (Some(reference), Some(reconstructed)) = (inputs.get(SeriesKind::Dni), outcome.annual.get(dni)) {
        let report = ReconstructionReport::from_arrays(&plan, reference.values(), reconstructed);
        println!("{report}");
    }

    let steps_per_hour = plan.layout().steps_per_day / cluster_sim::series::HOURS_PER_DAY;
    if let Some(ref path) = scenario.output.annual_csv {
        if let Err(e) = export_annual_csv(&outcome.annual, steps_per_hour, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Annual arrays written to {path}");
    }
    if let Some(ref path) = scenario.output.summary_csv {
        if let Err(e) = export_cluster_summary_csv(&plan, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Cluster summary written to {path}");
    }
}
