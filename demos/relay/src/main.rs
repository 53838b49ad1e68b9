use rollwill_transport::{RelayServer, TransportError};

/// Bind address used when `ROLLWILL_RELAY_ADDR` is unset.
const DEFAULT_ADDR: &str = "127.0.0.1:9000";

#[tokio::main]
async fn main() -> Result<(), TransportError> {
    rollwill::init_tracing();

    let addr = std::env::var("ROLLWILL_RELAY_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_owned());
    let server = RelayServer::bind(&addr).await?;
    tracing::info!(addr = %server.local_addr()?, "relay ready");
    server.run().await;
    Ok(())
}
