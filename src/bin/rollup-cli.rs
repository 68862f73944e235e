use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "rollup-cli")]
#[command(about = "Client for the failure rollup report API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild and store the snapshot for a range (default: yesterday, UTC)
    Refresh {
        /// "YYYY-MM-DD HH:MM:SS"
        #[arg(long, requires = "latest")]
        earliest: Option<String>,
        /// "YYYY-MM-DD HH:MM:SS"
        #[arg(long, requires = "earliest")]
        latest: Option<String>,
        /// Restrict to these service ids
        #[arg(long, value_delimiter = ',')]
        services: Vec<String>,
    },
    /// Fetch a stored daily snapshot (default: today, else the latest)
    Get {
        #[arg(long)]
        date: Option<String>,
    },
    /// Fetch the weekly rollup ending on a Friday (default: last Friday)
    Week {
        #[arg(long)]
        friday: Option<String>,
    },
    /// List dates with a stored snapshot
    Dates,
    /// Look up the open ticket for a service
    Ticket {
        service_id: String,
    },
    /// Daily submission totals for the last N days
    Stats {
        #[arg(long, default_value_t = 60)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Refresh { earliest, latest, services } => {
            let mut body = json!({});
            if let (Some(earliest), Some(latest)) = (earliest, latest) {
                body["earliest"] = Value::String(earliest);
                body["latest"] = Value::String(latest);
            }
            if !services.is_empty() {
                body["services"] = json!(services);
            }
            client.post(format!("{}/report/refresh", base)).json(&body).send().await?
        }
        Commands::Get { date } => {
            let mut req = client.get(format!("{}/report-data", base));
            if let Some(date) = date {
                req = req.query(&[("date", date)]);
            }
            req.send().await?
        }
        Commands::Week { friday } => {
            let mut req = client.get(format!("{}/report/week", base));
            if let Some(friday) = friday {
                req = req.query(&[("friday", friday)]);
            }
            req.send().await?
        }
        Commands::Dates => client.get(format!("{}/report/dates", base)).send().await?,
        Commands::Ticket { service_id } => {
            client
                .post(format!("{}/find-ticket", base))
                .json(&json!({ "service_id": service_id }))
                .send()
                .await?
        }
        Commands::Stats { days } => {
            client
                .get(format!("{}/daily-stats", base))
                .query(&[("days", days)])
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: report API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
