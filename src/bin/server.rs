//! Gateway server: loads resource schemas, connects to the database, serves the JSON-API routes.

use jsonapi_gateway::{app, load_schemas_from_dir, AppState, ModelRegistry, PgDatabase, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jsonapi_gateway=info".parse()?))
        .init();

    let settings = Settings::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;
    let db = Arc::new(PgDatabase::new(pool));

    let schemas = load_schemas_from_dir(&settings.resources_dir).await?;
    let registry = ModelRegistry::from_schemas(&schemas, db)?;
    let bind_addr = settings.bind_addr;
    let state = AppState::new(Arc::new(registry), settings);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
