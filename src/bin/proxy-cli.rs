use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use kirby_proxy::client::{KirbyClient, ProxyTransport, RequestOptions};
use kirby_proxy::request::{QueryRequest, RawResponse, ResourceRequest};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Send queries and resource requests through a running Kirby proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(long, default_value = "/api/__kirby__")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a structured query, e.g. '{"query":"site","select":{"title":true}}'
    Query {
        json: String,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Fetch a resource path from the content API
    Fetch {
        path: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        #[arg(short, long)]
        language: Option<String>,
        /// Query parameter as name=value; repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let transport = ProxyTransport::new(&cli.url, &cli.prefix)?;
    let client = KirbyClient::new(Arc::new(transport));

    let result = match cli.command {
        Commands::Query { json, language } => {
            let query: QueryRequest = serde_json::from_str(&json)?;
            let mut opts = RequestOptions::default();
            if let Some(language) = language {
                opts = opts.language(language);
            }
            client.query(query, opts).await
        }
        Commands::Fetch {
            path,
            method,
            language,
            params,
            body,
        } => {
            let mut request = ResourceRequest::new(path).method(method);
            for param in params {
                let (name, value) = param
                    .split_once('=')
                    .ok_or_else(|| format!("parameter '{param}' is not name=value"))?;
                request = request.param(name, value);
            }
            if let Some(body) = body {
                request = request.body(serde_json::from_str(&body)?);
            }
            let mut opts = RequestOptions::default();
            if let Some(language) = language {
                opts = opts.language(language);
            }
            client.fetch(request, opts).await
        }
    };

    match result {
        Ok(response) => print_response(&response)?,
        Err(e) => {
            eprintln!("Error: request failed with status {}", e.status_code());
            eprintln!("{}", serde_json::to_string_pretty(&e.shape())?);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_response(response: &RawResponse) -> Result<(), Box<dyn std::error::Error>> {
    match response.json::<Value>() {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}
