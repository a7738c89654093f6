mod conf;
mod es_client;
mod loader;
mod models;

use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::conf::{Cli, Config};
use crate::es_client::EsClient;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match Config::resolve(cli) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            eprintln!("{}", Cli::command().render_help());
            process::exit(2);
        }
    };

    if let Err(err) = run(&config).await {
        error!("{err:#}");
        process::exit(1);
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let http_client = es_client::build_http_client(config.is_insecure_skip_verify())
        .context("building HTTP client")?;
    let es = EsClient::new(config.get_url(), config.get_auth().clone(), http_client);
    loader::run(&es, config).await
}
