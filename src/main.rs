mod config;
mod error;
mod http_client;
mod providers;
mod server;
mod tokenizer;

use tracing_subscriber::fmt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt::init();

    let config = config::Settings::load()?;

    // Use configured host/port to bind the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = server::create_app(config)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("popgate bridge running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
