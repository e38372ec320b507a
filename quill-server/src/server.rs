//! HTTP/1.1 server implementation

use crate::error::ServerError;
use crate::handlers::handle_request;
use crate::state::AppState;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

pub struct QuillServer {
    state: Arc<AppState>,
}

impl QuillServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Bind `addr` and serve until Ctrl-C
    pub async fn serve(self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        self.run(listener, shutdown_signal()).await
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    ///
    /// In-flight connections are left to finish on their own tasks.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ServerError> {
        info!("quill server listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    debug!("New connection from {}", remote_addr);

                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(err) = Self::handle_connection(stream, state).await {
                            debug!("Connection error from {}: {}", remote_addr, err);
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection(stream: TcpStream, state: Arc<AppState>) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);

        let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));

        http1::Builder::new().serve_connection(io, service).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
