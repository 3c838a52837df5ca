use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for the edge guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080/_guard")]
    url: String,

    #[arg(short, long, env = "EDGE_GUARD_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show guard status and tracked entry counts
    Status,
    /// Show rate window and login status of a client
    Client { id: String },
    /// Clear all state held for a client (manual unlock)
    Unlock { id: String },
    /// Evict expired state now
    Sweep,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let (method, path) = match &cli.command {
        Commands::Status => (Method::GET, "/status".to_string()),
        Commands::Client { id } => (Method::GET, format!("/clients/{id}")),
        Commands::Unlock { id } => (Method::DELETE, format!("/clients/{id}")),
        Commands::Sweep => (Method::POST, "/sweep".to_string()),
    };

    let res = client
        .request(method, format!("{base}{path}"))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
