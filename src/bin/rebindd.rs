use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    extract::OriginalUri,
    http::{Method, Response, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use rebindd::{
    AppState, SharedState, api,
    cloudflare::CloudflareClient,
    config::AppConfig,
    rebind::RebindOrchestrator,
    resolve::{ResolutionWatcher, SystemResolver},
};
use rust_embed::RustEmbed;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    /// Cloudflare zone id holding the managed record
    #[arg(long, env = "CF_ZONE_ID", value_name = "ID")]
    zone_id: String,
    /// Domain whose record gets rebound (e.g. rebind.example.com)
    #[arg(long, env = "REBIND_DOMAIN", value_name = "DOMAIN")]
    domain: String,
    /// Address the record points at before and after the attack
    #[arg(long, env = "REBIND_ORIGINAL_IP", value_name = "ADDR")]
    original_ip: IpAddr,
    /// Private address the record is rebound to
    #[arg(long, env = "REBIND_NEW_IP", value_name = "ADDR")]
    rebind_ip: IpAddr,
    /// Cloudflare API token with dns edit permission on the zone
    #[arg(long, env = "CF_API_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    api_token: String,
    /// Override for the Cloudflare API base URL
    #[arg(long, env = "CF_API_BASE", value_name = "URL")]
    api_base: Option<String>,
    /// TTL (seconds) written during a rebind
    #[arg(long, value_name = "SECS", default_value_t = 200)]
    rebind_ttl: u32,
    /// Resolution poll attempts before a rebind is declared failed
    #[arg(long, value_name = "N", default_value_t = 50)]
    poll_attempts: u32,
    /// Interval between resolution polls, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 5000)]
    poll_interval_ms: u64,
    /// Listen address for the HTTP server
    #[arg(long, value_name = "ADDR", default_value = "0.0.0.0:3000")]
    listen: SocketAddr,
}

#[derive(RustEmbed)]
#[folder = "pub"]
struct EmbeddedPub;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = build_app_config(&cli);
    let state = init_shared_state(&cli, config).await?;

    let frontend = get(frontend_handler).head(frontend_handler);
    let app = Router::new()
        .merge(api::create_router(state))
        .route("/", frontend.clone())
        .route("/{*path}", frontend);

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind to {}", cli.listen))?;

    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    Ok(())
}

async fn init_shared_state(cli: &Cli, config: AppConfig) -> Result<SharedState> {
    let cloudflare = match &cli.api_base {
        Some(base) => CloudflareClient::with_base_url(base, &cli.api_token),
        None => CloudflareClient::new(&cli.api_token),
    };
    let watcher = ResolutionWatcher::new(Arc::new(SystemResolver::from_system_conf()?));

    // The record is located exactly once; a miss only disables rebinding,
    // the server keeps serving sessions either way.
    let record = match cloudflare.find_record(&config.zone_id, &config.domain).await {
        Ok(record) => Some(record),
        Err(err) => {
            error!("failed to locate dns record for {}: {err}", config.domain);
            None
        }
    };

    let rebind = RebindOrchestrator::new(
        Arc::new(cloudflare),
        watcher.clone(),
        record,
        config.domain.clone(),
        config.original_ip,
        config.poll_policy(),
    );

    Ok(Arc::new(AppState {
        config,
        watcher,
        rebind,
    }))
}

fn build_app_config(cli: &Cli) -> AppConfig {
    AppConfig {
        zone_id: cli.zone_id.clone(),
        domain: cli.domain.trim_end_matches('.').to_ascii_lowercase(),
        original_ip: cli.original_ip,
        rebind_ip: cli.rebind_ip,
        rebind_ttl: cli.rebind_ttl,
        poll_attempts: cli.poll_attempts,
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install CTRL+C handler: {err}");
    }
    info!("shutdown signal received");
}

async fn frontend_handler(method: Method, OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri.path().trim_start_matches('/');
    if path.contains("..") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let candidate = if path.is_empty() { "index.html" } else { path };
    if let Some(resp) = embedded_response(candidate, &method) {
        return resp;
    }
    if let Some(resp) = embedded_response("index.html", &method) {
        return resp;
    }

    StatusCode::NOT_FOUND.into_response()
}

fn embedded_response(path: &str, method: &Method) -> Option<Response<Body>> {
    let asset = EmbeddedPub::get(path)?;
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(asset.data.into_owned())
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(
            header::CACHE_CONTROL,
            if path == "index.html" {
                "no-cache"
            } else {
                "public, max-age=31536000, immutable"
            },
        )
        .header(
            header::CONTENT_SECURITY_POLICY,
            "default-src 'self'; base-uri 'self'; frame-ancestors 'none'; form-action 'self'; \
             script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; \
             connect-src 'self' ws: wss:; object-src 'none'",
        )
        .header(header::REFERRER_POLICY, "no-referrer")
        .body(body)
        .ok()
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
