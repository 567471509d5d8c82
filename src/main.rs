use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use listing_scraper::{
    api, build_http_client,
    config::{ServiceConfig, SiteProfile},
    AppState,
};

const CERT_DIR: &str = "/app/certificates";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env();
    info!("Starting listing scraper");
    info!(
        "Description enrichment: {}",
        match (&config.text_service, config.enrich_descriptions) {
            (Some(tc), true) => format!("on ({})", tc.model),
            (Some(_), false) => "configured, disabled".to_string(),
            (None, _) => "off".to_string(),
        }
    );
    if !config.degrade_on_block {
        info!("Blocked requests will be reported as errors");
    }

    let http_client = build_http_client(&config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let tls = (config.tls_host_cert.clone(), config.tls_host_key.clone());

    let state = Arc::new(AppState::new(config, SiteProfile::ebay(), http_client));
    let app = api::router(state);

    match tls {
        (Some(cert_name), Some(key_name)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                Path::new(CERT_DIR).join(cert_name),
                Path::new(CERT_DIR).join(key_name),
            )
            .await?;
            info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await?;
        }
        (cert, key) => {
            if cert.is_some() || key.is_some() {
                warn!("TLS_HOST_CERT and TLS_HOST_KEY must both be set to enable inbound TLS. Falling back to HTTP.");
            }
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
