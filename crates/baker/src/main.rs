use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use clap::Parser;

use kiln_baker::config::{preset_by_name, BakerCfg};
use kiln_baker::controller::Controller;
use kiln_crypto::SoftKey;
use kiln_rpc::NodeClient;

async fn health_handler() -> &'static str {
    "ok"
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> String {
    kiln_baker::metrics::render()
}

fn env_bool(var: &str, default_on: bool) -> bool {
    match env::var(var).ok().as_deref() {
        Some("on") | Some("ON") | Some("1") | Some("true") | Some("TRUE") => true,
        Some("off") | Some("OFF") | Some("0") | Some("false") | Some("FALSE") => false,
        _ => default_on,
    }
}

#[derive(serde::Deserialize, Clone, Debug, Default)]
struct FileCfg {
    #[serde(default)]
    node_url: Option<String>,
    #[serde(default)]
    chain: Option<String>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    key_file: Option<String>,
    #[serde(default)]
    datadir: Option<String>,
    #[serde(default)]
    nonce_file: Option<String>,
    #[serde(default)]
    tick_ms: Option<u64>,
    #[serde(default)]
    log_level: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "kiln-baker", about = "Baking agent for Tezos-family networks")]
struct Cli {
    #[arg(long)]
    node_url: Option<String>,
    #[arg(long)]
    chain: Option<String>,
    #[arg(long)]
    network: Option<String>,
    /// File holding the delegate secret key (edsk line or JSON)
    #[arg(long)]
    key_file: Option<String>,
    #[arg(long)]
    datadir: Option<String>,
    /// Overrides the default <datadir>/nonces.json
    #[arg(long)]
    nonce_file: Option<String>,
    #[arg(long)]
    tick_ms: Option<u64>,
    #[arg(long)]
    log_level: Option<String>,
    #[arg(long)]
    config_file: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // defaults, then config file, then env, then CLI
    let mut node_url = "http://127.0.0.1:8732".to_string();
    let mut chain = "main".to_string();
    let mut network = "mainnet".to_string();
    let mut key_file: Option<String> = None;
    let mut datadir = "data".to_string();
    let mut nonce_file: Option<String> = None;
    let mut tick_ms: u64 = 1000;
    let mut log_level = "info".to_string();

    let config_path = args.config_file.or_else(|| env::var("KILN_CONFIG_FILE").ok());
    if let Some(path) = config_path {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path))?;
        let from_file: FileCfg = toml::from_str(&text)
            .with_context(|| format!("invalid TOML in config file: {}", path))?;
        if let Some(v) = from_file.node_url {
            node_url = v;
        }
        if let Some(v) = from_file.chain {
            chain = v;
        }
        if let Some(v) = from_file.network {
            network = v;
        }
        if let Some(v) = from_file.key_file {
            key_file = Some(v);
        }
        if let Some(v) = from_file.datadir {
            datadir = v;
        }
        if let Some(v) = from_file.nonce_file {
            nonce_file = Some(v);
        }
        if let Some(v) = from_file.tick_ms {
            tick_ms = v;
        }
        if let Some(v) = from_file.log_level {
            log_level = v;
        }
    }

    if let Ok(v) = env::var("KILN_NODE_URL") {
        node_url = v;
    }
    if let Ok(v) = env::var("KILN_CHAIN") {
        chain = v;
    }
    if let Ok(v) = env::var("KILN_NETWORK") {
        network = v;
    }
    if let Ok(v) = env::var("KILN_KEY_FILE") {
        key_file = Some(v);
    }
    if let Ok(v) = env::var("KILN_DATADIR") {
        datadir = v;
    }
    if let Ok(v) = env::var("KILN_NONCE_FILE") {
        nonce_file = Some(v);
    }
    if let Ok(v) = env::var("KILN_TICK_MS") {
        if let Ok(parsed) = v.parse() {
            tick_ms = parsed;
        }
    }
    if let Ok(v) = env::var("KILN_LOG_LEVEL") {
        log_level = v;
    }

    if let Some(v) = args.node_url {
        node_url = v;
    }
    if let Some(v) = args.chain {
        chain = v;
    }
    if let Some(v) = args.network {
        network = v;
    }
    if let Some(v) = args.key_file {
        key_file = Some(v);
    }
    if let Some(v) = args.datadir {
        datadir = v;
    }
    if let Some(v) = args.nonce_file {
        nonce_file = Some(v);
    }
    if let Some(v) = args.tick_ms {
        tick_ms = v;
    }
    if let Some(v) = args.log_level {
        log_level = v;
    }

    env::set_var("RUST_LOG", &log_level);
    env_logger::init();

    let preset = preset_by_name(&network)
        .with_context(|| format!("unknown network preset: {}", network))?;
    let key_path = key_file.context("a key file is required (--key-file or KILN_KEY_FILE)")?;
    let key = SoftKey::from_file(std::path::Path::new(&key_path))
        .with_context(|| format!("failed to load key from {}", key_path))?;

    let nonce_file = nonce_file
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&datadir).join("nonces.json"));

    let cfg = BakerCfg {
        node_url: node_url.clone(),
        chain: chain.clone(),
        network: preset,
        nonce_file,
        tick_ms,
        ..Default::default()
    };

    let client = Arc::new(NodeClient::new(&cfg.node_url, &cfg.chain).context("bad node url")?);
    let key: Arc<dyn kiln_crypto::KeyProvider> = Arc::new(key);

    log::info!("kiln-baker starting");
    log::info!("  node     {}", cfg.node_url);
    log::info!("  chain    {} ({})", cfg.chain, preset.name);
    log::info!("  delegate {}", key.public_key_hash());
    log::info!("  datadir  {}", datadir);
    log::info!("  nonces   {}", cfg.nonce_file.display());

    // optional observability listener
    if env_bool("KILN_METRICS", false) {
        let listen =
            env::var("KILN_METRICS_LISTEN").unwrap_or_else(|_| "127.0.0.1:9090".to_string());
        let app = Router::new().route("/health", get(health_handler));
        #[cfg(feature = "metrics")]
        let app = app.route("/metrics", get(metrics_handler));
        let addr: SocketAddr = listen.parse().context("invalid KILN_METRICS_LISTEN")?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind metrics listener")?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("metrics listener failed: {}", e);
            }
        });
        log::info!("  metrics  http://{}", listen);
    }

    let controller = Controller::new(cfg, client, key);
    let handle = controller.spawn();

    tokio::signal::ctrl_c().await.context("signal handler failed")?;
    log::info!("kiln-baker stopping");
    handle.stop();
    handle.join().await;
    Ok(())
}
