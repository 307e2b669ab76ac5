// Scenario Runner - Load and execute churn scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/steady_state.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/steady_state.yaml --seed 0x1234...

use std::env;
use std::fs;
use std::path::Path;

use overlay_churn::{
    parse_seed_hex, random_node_ids, ChurnEngine, CsvEventSink, EventSink, LoggingEventSink,
    MockerConfig, StatsSink, TickReport,
};

/// Scenario file format
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    meta: ScenarioMeta,

    /// Mocker configuration (missing keys keep defaults)
    #[serde(default)]
    config: MockerConfig,

    /// Number of ticks to run
    #[serde(default = "default_rounds")]
    rounds: usize,

    /// Optional CSV export of every event
    #[serde(default)]
    csv_path: Option<String>,

    /// Log every event as it happens
    #[serde(default)]
    log_events: bool,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
}

fn default_rounds() -> usize {
    100
}

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
        .unwrap();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX]", args[0]);
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/steady_state.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        eprintln!("  {} scenarios/steady_state.yaml --seed 0x123456...", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    let seed: Option<[u8; 32]> = if args.len() >= 4 && args[2] == "--seed" {
        Some(parse_seed_hex(&args[3]).unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        }))
    } else {
        None
    };

    if path.is_file() {
        run_scenario_file(path, seed);
    } else if path.is_dir() {
        run_scenario_directory(path, seed);
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
}

fn run_scenario_directory(dir: &Path, seed: Option<[u8; 32]>) {
    let mut scenarios = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str());
            if ext == Some("yaml") || ext == Some("yml") {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        run_scenario_file(scenario_path, seed);
    }

    println!("\nAll scenarios complete!\n");
}

fn run_scenario_file(path: &Path, seed: Option<[u8; 32]>) {
    println!("Loading scenario from: {}", path.display());

    let yaml_content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let scenario: ScenarioFile = serde_yaml::from_str(&yaml_content).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let name = scenario
        .meta
        .name
        .clone()
        .unwrap_or_else(|| path.display().to_string());
    println!("\n=== {} ===\n", name);
    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    let mut config = scenario.config;
    let seed = seed.unwrap_or_else(|| config.resolve_seed());
    config.seed = Some(seed);

    println!("Configuration:");
    println!("  Rounds: {}", scenario.rounds);
    println!("  Seed nodes: {}", config.node_count);
    println!(
        "  Targets: {} nodes, degree {} ({} links)",
        config.nodes_target,
        config.degree_target,
        config.edge_target()
    );
    println!(
        "  Rates: on 1/{} off 1/{} conn {}/node fail 1/{} disconn 1/{} convergence 1/{}",
        config.switchon_rate,
        config.dropout_rate,
        config.new_conn_count,
        config.conn_fail_rate,
        config.disconn_rate,
        config.convergence_rate
    );

    let ids = random_node_ids(config.node_count).unwrap_or_else(|e| {
        eprintln!("Unable to generate node identities: {}", e);
        std::process::exit(1);
    });

    let logger = LoggingEventSink::new(scenario.log_events);
    match scenario.csv_path {
        Some(ref csv_path) => {
            let csv = CsvEventSink::new(csv_path).unwrap_or_else(|e| {
                eprintln!("Failed to create {}: {}", csv_path, e);
                std::process::exit(1);
            });
            run_with_sink(config, ids, scenario.rounds, (csv, logger));
            println!("\nEvents written to {}", csv_path);
        }
        None => run_with_sink(config, ids, scenario.rounds, logger),
    }

    println!("Seed: 0x{}", seed.iter().map(|b| format!("{:02x}", b)).collect::<String>());
    println!("\nScenario complete!\n");
}

fn run_with_sink<S: EventSink>(
    config: MockerConfig,
    ids: Vec<overlay_churn::NodeId>,
    rounds: usize,
    sink: S,
) {
    let mut engine = ChurnEngine::new(config, ids, StatsSink::new(sink)).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    println!("\nStarting simulation...\n");
    println!("{:>6} {:>6} {:>6} {:>8} {:>8}", "round", "on", "off", "links", "pooled");

    let sample_interval = (rounds / 10).max(1);
    let mut reports: Vec<TickReport> = Vec::with_capacity(rounds);
    for round in 0..rounds {
        reports.push(engine.step());
        if round % sample_interval == 0 || round + 1 == rounds {
            println!(
                "{:>6} {:>6} {:>6} {:>8} {:>8}",
                round,
                engine.on_count(),
                engine.off_count(),
                engine.active_link_count(),
                engine.link_pool_len()
            );
        }
    }

    print_summary(&engine, &reports);
}

fn print_summary<S: EventSink>(engine: &ChurnEngine<StatsSink<S>>, reports: &[TickReport]) {
    let stalled: usize = reports.iter().map(|r| r.stalled_attempts).sum();
    let created: usize = reports.iter().map(|r| r.links_created).sum();
    let on = engine.on_count();
    let avg_degree = if on > 0 {
        2.0 * engine.active_link_count() as f64 / on as f64
    } else {
        0.0
    };

    println!("\nFinal state:");
    println!("  Nodes on: {} (target {})", on, engine.config().nodes_target);
    println!("  Nodes off: {}", engine.off_count());
    println!(
        "  Active links: {} (target {}), avg degree {:.2}",
        engine.active_link_count(),
        engine.config().edge_target(),
        avg_degree
    );
    println!("  Links pooled: {} ({} created)", engine.link_pool_len(), created);
    println!("  Stalled link attempts: {}", stalled);
    println!();
    engine.sink().print_summary();
}
