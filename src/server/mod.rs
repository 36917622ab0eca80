pub mod api;

use crate::agent::ChatAgent;
use crate::cli::Args;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use log::{ error, info };

pub struct Server {
    addr: SocketAddr,
    agent: Arc<ChatAgent>,
    args: Args,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

impl Server {
    pub fn new(agent: Arc<ChatAgent>, args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let port = args.port.ok_or("PORT is required")?;
        let addr: SocketAddr = format!("{}:{}", args.server_host, port)
            .parse()
            .map_err(|e| format!("Invalid listen address {}:{}: {}", args.server_host, port, e))?;
        Ok(Self { addr, agent, args })
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = api::router(self.agent.clone(), self.args.max_json_body_bytes);

        match (self.args.enable_tls, &self.args.tls_cert_path, &self.args.tls_key_path) {
            (true, Some(cert_path), Some(key_path)) => {
                info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
                let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    cert_path,
                    key_path
                ).await?;

                let handle = axum_server::Handle::new();
                let shutdown = handle.clone();
                tokio::spawn(async move {
                    shutdown_signal().await;
                    shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
                });

                info!("HTTPS API listening on https://{}", self.addr);
                axum_server::bind_rustls(self.addr, tls_config)
                    .handle(handle)
                    .serve(app.into_make_service()).await?;
            }
            (true, _, _) => {
                return Err("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".into());
            }
            _ => {
                let listener = tokio::net::TcpListener::bind(self.addr).await.map_err(|e| {
                    error!("Failed to bind HTTP server to {}: {}. Try a different port.", self.addr, e);
                    e
                })?;
                info!("HTTP API listening on http://{}", self.addr);
                axum::serve(listener, app.into_make_service())
                    .with_graceful_shutdown(shutdown_signal()).await?;
            }
        }

        info!("Server stopped");
        Ok(())
    }
}
