use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use edge_gatekeeper::config::{self, GatekeeperConfig};
use edge_gatekeeper::security::{HeaderPolicy, LimitClass};

#[derive(Parser)]
#[command(name = "gatekeeper-cli")]
#[command(about = "Operator CLI for the edge gatekeeper", long_about = None)]
struct Cli {
    /// TOML configuration file; GATEKEEPER_* variables override it.
    #[arg(short, long, global = true, env = "GATEKEEPER_CONFIG")]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Config,
    /// Show the limit class and policy a path falls under
    Classify { path: String },
    /// Compare a live response's security headers with the configured set
    CheckHeaders { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = config::load(cli.file.as_deref())?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Classify { path } => {
            classify(&config, &path);
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckHeaders { url } => check_headers(&config, &url).await,
    }
}

fn classify(config: &GatekeeperConfig, path: &str) {
    let class = LimitClass::from_path(path);
    let policy = config.rate_limit.policy(class);
    println!(
        "{} -> {} ({} requests / {}s)",
        path, class, policy.requests, policy.window_secs
    );
}

async fn check_headers(config: &GatekeeperConfig, url: &str) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let policy = HeaderPolicy::new(&config.headers)?;
    let res = reqwest::Client::new().get(url).send().await?;
    println!("{} {}", url, res.status());

    let mut mismatches = 0;
    for (name, expected) in policy.iter() {
        match res.headers().get(name) {
            Some(actual) if actual == expected => println!("  ok       {}", name),
            Some(actual) => {
                mismatches += 1;
                println!(
                    "  MISMATCH {}: got {:?}, want {:?}",
                    name, actual, expected
                );
            }
            None => {
                mismatches += 1;
                println!("  MISSING  {}", name);
            }
        }
    }

    if mismatches > 0 {
        eprintln!("{} security header(s) wrong or missing", mismatches);
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
