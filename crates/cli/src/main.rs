use std::{fs, process};

use clap::Parser;
use dycop_cli::{App, Command};
use dycop_core::controllability::{check, CheckState, CheckStatus};
use dycop_core::graph::data::NetworkData;
use dycop_core::graph::TemporalNetwork;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = App::parse();
    match &app.command {
        Command::Generate(args) => generate(args),
        Command::Check(args) => check_dir(args),
        Command::Schema => schema(),
    }
}

fn generate(args: &dycop_cli::GenerateArgs) {
    fs::create_dir_all(&args.output_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create output directory: {e}");
        process::exit(1);
    });

    let instances = dycop_testgen::generator::generate_mult_instances(
        args.n_instance,
        args.n_node,
        args.n_observer,
        args.n_edge,
        args.n_contingent,
        args.max_weight,
    );

    for instance in &instances {
        let path = args.output_dir.join(format!("{}.json", instance.get_id()));
        let file = fs::File::create(&path).unwrap_or_else(|e| {
            eprintln!("Failed to create {}: {e}", path.display());
            process::exit(1);
        });
        serde_json::to_writer_pretty(file, instance).unwrap_or_else(|e| {
            eprintln!("Failed to write {}: {e}", path.display());
            process::exit(1);
        });
    }

    println!(
        "Generated {} instances to {}",
        instances.len(),
        args.output_dir.display()
    );
}

fn check_dir(args: &dycop_cli::CheckArgs) {
    let options = args.to_options();
    let mut any_failed = false;

    let mut entries: Vec<_> = fs::read_dir(&args.input_dir)
        .unwrap_or_else(|e| {
            eprintln!("Failed to read input directory: {e}");
            process::exit(1);
        })
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .collect();

    entries.sort_by_key(fs::DirEntry::path);

    if entries.is_empty() {
        eprintln!("No .json files found in {}", args.input_dir.display());
        process::exit(1);
    }

    for entry in entries {
        let path = entry.path();
        let filename = path.file_name().unwrap_or_default().to_string_lossy();

        let file = fs::File::open(&path).unwrap_or_else(|e| {
            eprintln!("Failed to open {filename}: {e}");
            process::exit(1);
        });

        let data = read_network(file).unwrap_or_else(|e| {
            eprintln!("Failed to parse {filename}: {e}");
            process::exit(1);
        });

        let mut network = TemporalNetwork::try_from(&data).unwrap_or_else(|e| {
            eprintln!("Failed to load {filename}: {e}");
            process::exit(1);
        });

        match check(&mut network, &options) {
            Ok(status) => {
                if status.controllable() != Some(true) {
                    any_failed = true;
                }
                report(&filename, &status, args);
            }
            Err(e) => {
                any_failed = true;
                if args.json {
                    let result = serde_json::json!({
                        "file": filename,
                        "controllable": serde_json::Value::Null,
                        "error": e,
                    });
                    println!("{}", serde_json::to_string(&result).unwrap());
                } else {
                    println!("{filename}: ERROR ({e})");
                }
            }
        }
    }

    if any_failed {
        process::exit(1);
    }
}

/// Accepts both a bare network description and the generator's instance
/// wrapper (recognized by its `data` field).
fn read_network(file: fs::File) -> Result<NetworkData, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_reader(file)?;
    if value.get("data").is_some() {
        let instance: dycop_testgen::Instance = serde_json::from_value(value)?;
        Ok(instance.get_data().clone())
    } else {
        serde_json::from_value(value)
    }
}

fn report(filename: &str, status: &CheckStatus, args: &dycop_cli::CheckArgs) {
    if args.json {
        let result = serde_json::json!({
            "file": filename,
            "controllable": status.controllable(),
            "status": status,
        });
        println!("{}", serde_json::to_string(&result).unwrap());
        return;
    }

    let verdict = match (status.finished, status.state) {
        (false, _) => "BUDGET EXHAUSTED",
        (true, CheckState::Controllable) => "CONTROLLABLE",
        (true, CheckState::NotControllable) => "NOT CONTROLLABLE",
        (true, CheckState::Unchecked | CheckState::Running) => "UNKNOWN",
    };
    println!("{filename}: {verdict}");
    if args.verbose {
        println!(
            "  iterations: {}, elapsed: {:?}",
            status.iterations, status.elapsed
        );
        for (rule, count) in status.counters.as_map() {
            println!("  {rule}: {count}");
        }
        if let Some(loop_) = &status.negative_loop {
            println!(
                "  negative loop at {} under {} ({})",
                loop_.node, loop_.label, loop_.value
            );
        }
    }
}

fn schema() {
    let schema = schemars::schema_for!(NetworkData);
    println!(
        "{}",
        serde_json::to_string_pretty(&schema).expect("schema serialization cannot fail")
    );
}
