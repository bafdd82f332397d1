use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use unimart_orderservice::{
    app_state::AppState, bootstrap, config, db, routes, store::postgres::PgStore, swagger,
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let routes = routes::payments::routes_with_openapi()
        .merge(routes::buyers::carts::routes_with_openapi())
        .merge(routes::buyers::orders::routes_with_openapi())
        .merge(routes::buyers::reviews::routes_with_openapi())
        .merge(routes::sellers::orders::routes_with_openapi())
        .merge(routes::admin::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("UniMart OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi);

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let pool = db::connect(&config.database.url).await?;
    let state = AppState::new(Arc::new(PgStore::new(pool)));

    let app = Router::new()
        .merge(routes)
        .merge(swagger_ui)
        .with_state(state);

    bootstrap::serve("UniMart OrderService", app, config.server.port).await?;
    Ok(())
}
