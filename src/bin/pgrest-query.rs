use anyhow::{Context, Result};
use clap::Parser;
use pgrest_client::{Config, Format, QueryClient, QueryError, QueryOptions, QueryResult};
use tracing_subscriber::EnvFilter;

const DEFAULT_QUERY: &str = "SELECT 1 AS ok";

/// Run one query against a PGRest server and print the result
#[derive(Debug, Parser)]
#[command(name = "pgrest-query", version)]
struct Args {
    /// Server base URL
    #[arg(long, env = "PGREST_URL", default_value = "http://localhost:8080/")]
    url: String,

    /// Client identifier
    #[arg(long, env = "PGREST_CLIENT_ID")]
    client_id: String,

    /// Shared client secret
    #[arg(long, env = "PGREST_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Connection name
    #[arg(long, env = "PGREST_CONNECTION", default_value = "default")]
    connection: String,

    /// Output format: json, jsonDataArray, csv, arrow or parquet
    #[arg(long, short, default_value_t = Format::Json, value_parser = parse_format)]
    format: Format,

    /// SQL to run
    query: Option<String>,
}

fn parse_format(name: &str) -> std::result::Result<Format, String> {
    name.parse().map_err(|e: QueryError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::new(args.url, args.client_id, args.client_secret)
        .with_connection(args.connection);
    let client = QueryClient::new(config).context("failed to create client")?;

    let query = args.query.as_deref().unwrap_or(DEFAULT_QUERY);
    let options = QueryOptions::new().format(args.format);

    match client.query(query, options).await {
        Ok(QueryResult::Json(value)) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Ok(QueryResult::Text(text)) => print!("{}", text),
        Ok(QueryResult::Binary(bytes)) => {
            println!("received {} bytes of {} data", bytes.len(), args.format);
        }
        Err(QueryError::Server {
            status,
            status_text,
            message,
            details,
        }) => {
            eprintln!("{} - {}", status, status_text);
            eprintln!("Message: {}", message);
            if let Some(details) = details {
                eprintln!("Details: {}", details);
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("query failed"),
    }

    Ok(())
}
