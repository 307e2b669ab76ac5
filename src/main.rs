// Churn mocker - runs the timer-driven engine and prints the event feed
//
// Usage:
//   cargo run -- [config.yaml] [--ticks N] [--seed SEED_HEX]

use std::env;
use std::process;

use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use overlay_churn::churn_sinks::format_event;
use overlay_churn::{
    parse_seed_hex, random_node_ids, spawn_mocker, ChannelSink, ChurnEngine, ChurnEvent,
    MockerConfig, Round,
};

struct Args {
    config_path: Option<String>,
    ticks: u64,
    seed: Option<[u8; 32]>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config_path: None,
        ticks: 20,
        seed: None,
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--ticks" => {
                let value = iter.next().ok_or("--ticks needs a value")?;
                args.ticks = value
                    .parse()
                    .map_err(|e| format!("invalid --ticks '{}': {}", value, e))?;
            }
            "--seed" => {
                let value = iter.next().ok_or("--seed needs a value")?;
                args.seed = Some(parse_seed_hex(&value)?);
            }
            path if args.config_path.is_none() => args.config_path = Some(path.to_string()),
            other => return Err(format!("unexpected argument '{}'", other)),
        }
    }
    Ok(args)
}

/// Running view of the feed as a downstream consumer sees it
#[derive(Default)]
struct FeedStats {
    counters: (usize, usize, usize, usize),
    round_on: i64,
    last_round: Option<Round>,
}

impl FeedStats {
    fn record(&mut self, round: Round, event: ChurnEvent) {
        if self.last_round != Some(round) {
            if let Some(previous) = self.last_round {
                info!("{}: net {:+} nodes", previous, self.round_on);
            }
            self.last_round = Some(round);
            self.round_on = 0;
        }
        match event {
            ChurnEvent::NodeUp { .. } => {
                self.counters.0 += 1;
                self.round_on += 1;
            }
            ChurnEvent::NodeDown { .. } => {
                self.counters.1 += 1;
                self.round_on -= 1;
            }
            ChurnEvent::LinkUp { .. } => self.counters.2 += 1,
            ChurnEvent::LinkDown { .. } => self.counters.3 += 1,
        }
        println!("{:>5} {}", round, format_event(&event));
    }
}

#[tokio::main]
async fn main() {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .unwrap();

    let args = parse_args().unwrap_or_else(|e| {
        eprintln!("{}", e);
        eprintln!("Usage: overlay-churn [config.yaml] [--ticks N] [--seed SEED_HEX]");
        process::exit(1);
    });

    let mut config = match &args.config_path {
        Some(path) => MockerConfig::load(path).unwrap_or_else(|e| {
            error!("{}: {}", path, e);
            process::exit(1);
        }),
        None => MockerConfig::default(),
    };
    let seed = args.seed.unwrap_or_else(|| config.resolve_seed());
    config.seed = Some(seed);

    // without node identities there is nothing to simulate
    let ids = random_node_ids(config.node_count).unwrap_or_else(|e| {
        error!("unable to generate node identities: {}", e);
        process::exit(1);
    });

    info!("starting mocker {} for {} ticks", config.id, args.ticks);

    let (sink, mut feed) = ChannelSink::new();
    let engine = ChurnEngine::new(config, ids, sink).unwrap_or_else(|e| {
        error!("invalid configuration: {}", e);
        process::exit(1);
    });
    let join = spawn_mocker(engine, Some(args.ticks)).join();
    tokio::pin!(join);

    let mut feed_stats = FeedStats::default();
    let result = loop {
        tokio::select! {
            biased;
            Some((round, event)) = feed.recv() => feed_stats.record(round, event),
            result = &mut join => break result,
        }
    };
    // events of the last round may still be queued
    while let Ok((round, event)) = feed.try_recv() {
        feed_stats.record(round, event);
    }

    let engine = match result {
        Ok(engine) => engine,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    info!(
        "done. {} rounds, nodes on: {} off: {}, links active: {} pooled: {}",
        engine.round(),
        engine.on_count(),
        engine.off_count(),
        engine.active_link_count(),
        engine.link_pool_len()
    );
    info!("events (node up, node down, link up, link down): {:?}", feed_stats.counters);
    info!("let seed = {:?};", seed);
}
