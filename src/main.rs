use anyhow::Result;
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use grammar_backend::config::Config;
use grammar_backend::routes;
use grammar_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("grammar_backend=debug,tower_http=debug")
        .init();

    let config = load_config();

    // Build the request-handler state once; the model is loaded (or found
    // missing) here and never reloaded for the lifetime of the process.
    let app_state = AppState::new(config.clone());

    let app = Router::new()
        .merge(routes::create_routes())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = format!("{}:{}", config.system.host, config.system.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_config() -> Config {
    let candidates: Vec<String> = vec![
        std::env::var("CONFIG_PATH").ok(),
        Some("conf.yaml".to_string()),
    ]
    .into_iter()
    .flatten()
    .collect();

    for path in candidates {
        match Config::load(&path) {
            Ok(config) => {
                info!("Loaded configuration from: {}", path);
                return config;
            }
            Err(e) => {
                tracing::debug!("Failed to load config from {}: {}", path, e);
            }
        }
    }

    info!("No config file found, using built-in defaults");
    Config::default()
}
