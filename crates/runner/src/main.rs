use log::{error, info};
use tradedesk_runner::{DashboardRun, RunConfig};

fn print_help() {
    eprintln!(
        r#"Tradedesk - real-time trading dashboard over a simulated backend

USAGE:
    tradedesk [OPTIONS]

OPTIONS:
    --config <PATH>     Load run configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Run with defaults
    tradedesk

    # Run with config file
    tradedesk --config tradedesk.json
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            RunConfig::from_file(&path)?
        }
        None => {
            info!("Using default configuration");
            RunConfig::default()
        }
    };

    match DashboardRun::new(config).run().await {
        Ok(summary) => {
            info!(
                "Final dashboard: {} quotes, {} positions, {} orders, connection {}",
                summary.quotes, summary.positions, summary.orders, summary.final_phase
            );
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
