//! Connection handling for the HTTP listener.
//!
//! Requests are still routed by axum, but each accepted connection is driven
//! by a hyper connection builder so the header read timeout and header size
//! cap can be enforced.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::config::Config;

/// Per-connection limits applied before a request reaches the router.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Time a client has to finish sending request headers
    pub read_timeout: Duration,
    /// Largest read buffer, and so the largest request head, accepted
    pub max_header_bytes: usize,
}

impl ConnectionLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            max_header_bytes: config.max_header_bytes,
        }
    }
}

fn connection_builder(limits: ConnectionLimits) -> Builder<TokioExecutor> {
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(limits.read_timeout)
        .max_buf_size(limits.max_header_bytes);
    builder
}

/// Accept connections from `listener` forever, serving each with `app`.
pub async fn serve(listener: TcpListener, app: Router, limits: ConnectionLimits) {
    let builder = Arc::new(connection_builder(limits));

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let builder = builder.clone();
        let service = TowerToHyperService::new(app.clone());
        tokio::spawn(async move {
            if let Err(e) = builder
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection from {} ended: {}", remote, e);
            }
        });
    }
}
