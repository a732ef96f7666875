//! viewsync client: entry point.
//!
//! This binary connects to a view server over WebSocket, mounts one route,
//! and keeps the server-driven view tree in sync.  It has no UI of its own:
//! every rendered tree is written to the log, which makes it useful for
//! watching a view's patch stream from a terminal.
//!
//! # Usage
//!
//! ```text
//! viewsync-client [OPTIONS]
//!
//! Options:
//!   --url        <URL>        View server WebSocket URL [default: ws://127.0.0.1:8765/view]
//!   --route      <PATH>       Route to mount [default: /]
//!   --param      <KEY=VALUE>  Route parameter (repeatable)
//!   --query      <KEY=VALUE>  Query parameter (repeatable)
//!   --styles     <FILE>       TOML style table for tokenized class names
//!   --component  <KEY>        Component key the host can render (repeatable)
//!   --log        <FILTER>     Log filter, overrides RUST_LOG
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Default                    | Description          |
//! |-------------------|----------------------------|----------------------|
//! | `VIEWSYNC_URL`    | `ws://127.0.0.1:8765/view` | View server URL      |
//! | `VIEWSYNC_ROUTE`  | `/`                        | Route to mount       |
//! | `VIEWSYNC_STYLES` | none                       | Style table file     |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use viewsync_client::application::RenderHost;
use viewsync_client::domain::ClientConfig;
use viewsync_client::infrastructure::run_client;
use viewsync_core::{Node, RouteContext};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// viewsync client.
///
/// Mounts a server-driven view and logs every tree it renders.
#[derive(Debug, Parser)]
#[command(
    name = "viewsync-client",
    about = "Headless client for server-driven viewsync views",
    version
)]
struct Cli {
    /// WebSocket URL of the view server.
    #[arg(long, default_value = "ws://127.0.0.1:8765/view", env = "VIEWSYNC_URL")]
    url: String,

    /// Route path to mount.
    #[arg(long, default_value = "/", env = "VIEWSYNC_ROUTE")]
    route: String,

    /// Route parameter as `key=value`.  May be repeated.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Query parameter as `key=value`.  May be repeated.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,

    /// TOML file mapping `moduleId:className` tokens to class names.
    #[arg(long, env = "VIEWSYNC_STYLES")]
    styles: Option<PathBuf>,

    /// Component key the host can render at mount points.  May be repeated.
    #[arg(long = "component", value_name = "KEY")]
    components: Vec<String>,

    /// Log filter such as `debug` or `viewsync_core=trace`.  Overrides `RUST_LOG`.
    #[arg(long)]
    log: Option<String>,
}

/// Splits `key=value`.
fn parse_pair(raw: &str) -> anyhow::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("expected KEY=VALUE, got '{raw}'"),
    }
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--url` is not a `ws://` or `wss://` URL, or if a
    /// `--param`/`--query` value is not of the form `key=value`.
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            bail!("invalid server URL '{}': expected ws:// or wss://", self.url);
        }

        let mut route = RouteContext::new(self.route);
        for raw in &self.params {
            let (key, value) = parse_pair(raw).context("invalid --param")?;
            route = route.with_param(key, value);
        }
        for raw in &self.query {
            let (key, value) = parse_pair(raw).context("invalid --query")?;
            route = route.with_query(key, value);
        }

        Ok(ClientConfig {
            server_url: self.url,
            route,
            styles_path: self.styles,
            components: self.components,
        })
    }
}

// ── Rendering host ────────────────────────────────────────────────────────────

/// Writes every rendered tree to the log.
struct LogRenderHost;

impl RenderHost for LogRenderHost {
    fn render(&self, root: &Arc<Node>) {
        match serde_json::to_string(&root.to_wire()) {
            Ok(json) => info!(kind = root.kind(), "render {json}"),
            Err(e) => warn!("failed to serialize rendered tree: {e}"),
        }
    }

    fn navigate(&self, to: &str, replace: bool) {
        info!(to, replace, "server requested navigation");
    }

    fn report_error(&self, message: &str) {
        warn!("view error: {message}");
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed with `clap` into a [`Cli`] struct.
/// 2. `tracing_subscriber` is initialised from `--log`, else `RUST_LOG`, else
///    `info`.
/// 3. A [`ClientConfig`] is constructed from the CLI arguments.
/// 4. A Ctrl+C handler is spawned; it clears a shared `AtomicBool`.
/// 5. [`run_client`] connects, mounts the route, and runs until the server
///    disconnects or the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ─────────────────────────────────────────────────────────
    let filter = match &cli.log {
        Some(directives) => {
            EnvFilter::try_new(directives).with_context(|| format!("invalid --log filter '{directives}'"))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.into_client_config()?;
    info!(
        "viewsync client starting: url={}, route={}",
        config.server_url, config.route.path
    );
    debug!(?config, "client configuration");

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, unmounting and shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_client(config, Arc::new(LogRenderHost), running).await?;

    info!("viewsync client stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
