use std::sync::Arc;

use ajax_todos::adapters::http::{HttpServer, HttpServerConfig};
use ajax_todos::storage::sqlite::SqliteTodoStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:todos.db".to_string());
    let store = SqliteTodoStore::connect(&database_url).await?;

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let server = HttpServer::new(Arc::new(store), HttpServerConfig { port: &port }).await?;
    server.run().await
}
