use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_subscriber() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    init_subscriber();
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    // TLS=1 serves https with the bundled self-signed certificate.
    let tls = std::env::var("TLS").is_ok_and(|v| v == "1");
    tracing::info!(%addr, tls, user = mock_server::USERNAME, "mock TribeHR listening");
    if tls {
        mock_server::run_tls(listener).await
    } else {
        mock_server::run(listener).await
    }
}
