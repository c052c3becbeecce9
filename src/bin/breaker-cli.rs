use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "breaker-cli")]
#[command(about = "Command-line client for the durable circuit-breaker service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:7070")]
    url: String,

    /// Bearer API key, if the service requires one
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask whether an execution is permitted
    Permitted {
        breaker: String,
        /// fidelity, consistency or throughput
        #[arg(short, long, default_value = "fidelity")]
        strategy: String,
    },
    /// Record a successful execution
    Success { breaker: String },
    /// Record a failed execution
    Failure { breaker: String },
    /// Authoritative circuit state
    CircuitState { breaker: String },
    /// Latest persisted breaker state
    BreakerState { breaker: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let base = cli.url.trim_end_matches('/');
    let (method, url) = match &cli.command {
        Commands::Permitted { breaker, strategy } => (
            Method::GET,
            format!("{}/breakers/{}/is-execution-permitted?strategy={}", base, breaker, strategy),
        ),
        Commands::Success { breaker } => (Method::POST, format!("{}/breakers/{}/record-success", base, breaker)),
        Commands::Failure { breaker } => (Method::POST, format!("{}/breakers/{}/record-failure", base, breaker)),
        Commands::CircuitState { breaker } => (Method::GET, format!("{}/breakers/{}/circuit-state", base, breaker)),
        Commands::BreakerState { breaker } => (Method::GET, format!("{}/breakers/{}/breaker-state", base, breaker)),
    };

    let res = client.request(method, url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: breaker API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
