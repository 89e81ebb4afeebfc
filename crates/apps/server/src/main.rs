use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post, put};
use clap::Parser;
use clustering::{ClusterConfig, RegionIndex};
use formats::RegionCollection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod sessions;

use sessions::SessionRegistry;

#[derive(Parser, Debug)]
#[command(author, version, about = "Viewport-adaptive point clustering service")]
struct Args {
    /// Listen address (env: CLUSTER_ADDR, default 127.0.0.1:9200)
    #[arg(long)]
    addr: Option<String>,

    /// JSON clustering config file (env: CLUSTER_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// GeoJSON regions loaded into every new session (env: CLUSTER_REGIONS)
    #[arg(long)]
    regions: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = args
        .addr
        .or_else(|| env::var("CLUSTER_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1:9200".to_string())
        .parse()?;
    let config_path = args
        .config
        .or_else(|| env::var("CLUSTER_CONFIG").ok().map(PathBuf::from));
    let regions_path = args
        .regions
        .or_else(|| env::var("CLUSTER_REGIONS").ok().map(PathBuf::from));

    let config = match config_path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path).await?;
            info!("loaded clustering config from {}", path.display());
            ClusterConfig::from_json_str(&raw)?
        }
        None => ClusterConfig::default(),
    };

    let default_regions = match regions_path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path).await?;
            let collection = RegionCollection::from_geojson_str(&raw)?;
            // Reject unusable boundaries at startup rather than in every session.
            let index = RegionIndex::load(&collection)?;
            info!("loaded {} regions from {}", index.len(), path.display());
            Some(collection)
        }
        None => None,
    };

    let state = AppState {
        sessions: Arc::new(SessionRegistry::new(config, default_regions)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/sessions", post(routes::create_session))
        .route("/sessions/:id", axum::routing::delete(routes::delete_session))
        .route("/sessions/:id/points", put(routes::put_points))
        .route("/sessions/:id/regions", put(routes::put_regions))
        .route("/sessions/:id/viewport", post(routes::post_viewport))
        .route("/sessions/:id/decluster/:region", post(routes::post_decluster))
        .route("/sessions/:id/clusters", get(routes::get_clusters))
        .route("/sessions/:id/hit", get(routes::get_hit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("cluster server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
