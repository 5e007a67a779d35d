//! Subcommand argument structs and handlers: `serve` runs the crawler and
//! search server; `index` and `search` are thin HTTP clients against it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api;
use crate::config;
use crate::crawler::CrawlerWorker;
use crate::queue::WorkQueue;
use crate::storage::Storage;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address the HTTP+JSON interface binds to.
    #[arg(long, env = "BRIGHTWAVE_LISTEN_ADDR", default_value = config::DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Number of parallel crawler workers.
    #[arg(long, env = "BRIGHTWAVE_NUM_CRAWLERS", default_value_t = config::DEFAULT_NUM_CRAWLERS)]
    pub num_crawlers: usize,

    /// Per-request HTTP fetch deadline (e.g. `5s`, `1m`).
    #[arg(long, env = "BRIGHTWAVE_FETCH_TIMEOUT", default_value = config::DEFAULT_FETCH_TIMEOUT, value_parser = config::parse_std_duration)]
    pub fetch_timeout: StdDuration,

    /// Freshness window for the re-index gate (e.g. `24h`).
    #[arg(long, env = "BRIGHTWAVE_REINDEX_DURATION", default_value = config::DEFAULT_REINDEX_DURATION, value_parser = config::parse_chrono_duration)]
    pub reindex_duration: chrono::Duration,

    /// Path to the persistent SQLite store.
    #[arg(long, env = "BRIGHTWAVE_DB_FILE", default_value = config::DEFAULT_DB_FILE)]
    pub db_file: PathBuf,

    /// Graceful-stop ceiling once a shutdown signal is received.
    #[arg(long, env = "BRIGHTWAVE_SHUTDOWN_TIMEOUT", default_value = config::DEFAULT_SHUTDOWN_TIMEOUT, value_parser = config::parse_std_duration)]
    pub shutdown_timeout: StdDuration,

    /// TLS certificate (PEM). Requires `--tls-key`; plaintext if omitted.
    #[arg(long, env = "BRIGHTWAVE_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key (PEM). Requires `--tls-cert`.
    #[arg(long, env = "BRIGHTWAVE_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Origin URL to seed the crawl from.
    pub origin: String,

    /// Maximum crawl depth.
    #[arg(short = 'k', long, default_value_t = 1)]
    pub k: u32,

    /// Address of a running `serve` process.
    #[arg(long, env = "BRIGHTWAVE_SERVER_ADDR", default_value = "http://127.0.0.1:8080")]
    pub server_addr: String,

    /// CA certificate to trust for the server's TLS connection.
    #[arg(long, env = "BRIGHTWAVE_TLS_CA_CERT", conflicts_with = "insecure")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification. Mutually exclusive with `--tls-ca-cert`.
    #[arg(long, env = "BRIGHTWAVE_INSECURE")]
    pub insecure: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text query.
    pub query: String,

    /// Address of a running `serve` process.
    #[arg(long, env = "BRIGHTWAVE_SERVER_ADDR", default_value = "http://127.0.0.1:8080")]
    pub server_addr: String,

    /// CA certificate to trust for the server's TLS connection.
    #[arg(long, env = "BRIGHTWAVE_TLS_CA_CERT", conflicts_with = "insecure")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification. Mutually exclusive with `--tls-ca-cert`.
    #[arg(long, env = "BRIGHTWAVE_INSECURE")]
    pub insecure: bool,
}

fn build_client(tls_ca_cert: &Option<PathBuf>, insecure: bool) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(insecure);
    if let Some(ca_cert) = tls_ca_cert {
        let pem = std::fs::read(ca_cert)?;
        let cert = reqwest::Certificate::from_pem(&pem)?;
        builder = builder.add_root_certificate(cert);
    }
    Ok(builder.build()?)
}

pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let storage = Arc::new(Storage::open(&args.db_file)?);
    let queue = Arc::new(WorkQueue::new(storage.clone()));
    let cancel = CancellationToken::new();

    let mut worker_handles = Vec::with_capacity(args.num_crawlers);
    for id in 0..args.num_crawlers {
        let worker = CrawlerWorker::new(
            id,
            args.fetch_timeout,
            storage.clone(),
            queue.clone(),
            args.reindex_duration,
        )?;
        let worker_cancel = cancel.clone();
        worker_handles.push(tokio::spawn(async move { worker.run(worker_cancel).await }));
    }

    let state = api::AppState {
        storage: storage.clone(),
        queue: queue.clone(),
        reindex_duration: args.reindex_duration,
    };
    let router = api::create_router(state);
    let tls = match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => Some((cert, key)),
        _ => None,
    };

    let listen_addr = args.listen_addr;
    let server = tokio::spawn(async move { api::serve(listen_addr, router, tls).await });

    info!(addr = %listen_addr, workers = args.num_crawlers, "brightwave serving");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    cancel.cancel();
    server.abort();

    let _ = tokio::time::timeout(args.shutdown_timeout, async {
        for handle in worker_handles {
            let _ = handle.await;
        }
    })
    .await;

    Ok(())
}

pub async fn index(args: IndexArgs) -> anyhow::Result<()> {
    let client = build_client(&args.tls_ca_cert, args.insecure)?;
    let response = client
        .post(format!("{}/v1/index", args.server_addr))
        .json(&serde_json::json!({ "origin": args.origin, "k": args.k }))
        .send()
        .await?;

    if response.status().is_success() {
        println!("indexing started for {}", args.origin);
        Ok(())
    } else {
        anyhow::bail!("index request failed: {}", response.status());
    }
}

pub async fn search(args: SearchArgs) -> anyhow::Result<()> {
    let client = build_client(&args.tls_ca_cert, args.insecure)?;
    let response = client
        .get(format!("{}/v1/search", args.server_addr))
        .query(&[("q", &args.query)])
        .send()
        .await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        println!("no results found");
        return Ok(());
    }
    if !response.status().is_success() {
        anyhow::bail!("search request failed: {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
