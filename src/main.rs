use clap::Parser;
use cluster_sim::{Driver, SimConfig};
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tick driven cluster simulator against a placement control plane")]
struct Cli {
    /// Case to run. Every registered case runs if omitted.
    #[arg(long)]
    case: Option<String>,

    /// Control plane address. An embedded control plane is started per case if omitted.
    #[arg(long)]
    pd: Option<String>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fail a case that has not converged after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the registered case names and exit
    #[arg(long)]
    list: bool,
}

fn main() {
    let cli = Cli::parse();
    if cli.list {
        for name in cluster_sim::case_names() {
            println!("{}", name);
        }
        return;
    }

    let mut config = match &cli.config {
        Some(path) => match SimConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => SimConfig::default(),
    };
    if cli.max_ticks.is_some() {
        config.max_ticks = cli.max_ticks;
    }
    let level = match cluster_sim::parse_level(&cli.log_level) {
        Some(level) => level,
        None => {
            eprintln!("Unknown log level {:?}", cli.log_level);
            process::exit(1);
        }
    };
    let pd = cli.pd;
    let cases: Vec<String> = match cli.case {
        Some(case) => vec![case],
        None => cluster_sim::case_names().into_iter().map(String::from).collect(),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            process::exit(1);
        }
    };
    let all_passed = runtime.block_on(async move {
        let logger = cluster_sim::create_root_logger_for_stdout(level);
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_signal.cancel();
            }
        });

        let driver = Driver::new(logger.clone(), config, pd);
        let mut all_passed = true;
        for case in &cases {
            match driver.run(case, cancel.clone()).await {
                Ok(report) => {
                    print!("{}", report);
                    all_passed &= report.passed();
                }
                Err(e) => {
                    slog::error!(logger, "Case {} failed to run: {}", case, e);
                    println!("FAIL [{}] {}", case, e);
                    all_passed = false;
                }
            }
            if cancel.is_cancelled() {
                break;
            }
        }
        all_passed
    });

    // Let the async drain flush.
    drop(runtime);
    process::exit(if all_passed { 0 } else { 1 });
}
