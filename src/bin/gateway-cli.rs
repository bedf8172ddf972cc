use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client for the staking gateway API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the dashboard load state of a stake account
    Dashboard {
        address: String,
        /// Wait for a fetch in flight
        #[arg(long)]
        wait: bool,
    },
    /// Reset an errored dashboard
    Reset { address: String },
    /// Check gateway liveness
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Dashboard { address, wait } => {
            client
                .get(format!("{}/api/dashboard/{}", base, address))
                .query(&[("wait", wait)])
                .send()
                .await?
        }
        Commands::Reset { address } => {
            client
                .post(format!("{}/api/dashboard/{}/reset", base, address))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/api/health", base)).send().await?,
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if text.is_empty() => println!("{}", status),
        Err(_) => println!("{}", text),
    }

    if status.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
