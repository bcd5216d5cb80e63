//! HTTP server listener
//!
//! Binds the configured address and serves the delivery router with axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::cache::ArtifactCache;
use crate::delivery::DeliveryState;
use crate::error::{Error, Result};
use crate::registry::GroupRegistry;
use crate::server::config::ServerConfig;
use crate::stats::DeliveryStats;

/// Random image server
pub struct ImageServer {
    config: ServerConfig,
    state: DeliveryState,
}

impl ImageServer {
    /// Scan the configured master directory and create a server for it
    ///
    /// Fails if the master directory cannot be listed or holds no valid group.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let registry = GroupRegistry::scan(&config.master_dir, &config.registry)?;
        Self::with_registry(config, registry)
    }

    /// Create a server for an already scanned registry
    pub fn with_registry(config: ServerConfig, registry: GroupRegistry) -> Result<Self> {
        if registry.is_empty() {
            return Err(Error::EmptyRegistry(config.master_dir.clone()));
        }

        let cache = ArtifactCache::new(config.encoder(), config.registry.cache_dir_name.clone());
        tracing::info!(
            groups = registry.len(),
            encoder = cache.encoder().name(),
            webp = config.enable_webp,
            progressive_jpeg = config.enable_progressive_jpeg,
            "Image server ready"
        );

        let state = DeliveryState::new(Arc::new(registry), Arc::new(cache), config.policy());

        Ok(Self { config, state })
    }

    /// Get a reference to the group registry
    pub fn registry(&self) -> &Arc<GroupRegistry> {
        self.state.registry()
    }

    /// Delivery counters
    pub fn stats(&self) -> &Arc<DeliveryStats> {
        self.state.stats()
    }

    /// HTTP router serving this server's groups
    pub fn router(&self) -> Router {
        self.state.clone().router()
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Server started");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;

    fn make_group(master: &Path, name: &str, files: &[&str]) {
        let dir = master.join(name);
        fs::create_dir(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), b"GIF89a fake").unwrap();
        }
    }

    #[test]
    fn test_refuses_empty_registry() {
        let master = TempDir::new().unwrap();
        make_group(master.path(), "lonely", &["a.gif"]);

        let result = ImageServer::new(ServerConfig::with_master_dir(master.path()));

        assert!(matches!(result, Err(Error::EmptyRegistry(_))));
    }

    #[test]
    fn test_refuses_missing_master() {
        let master = TempDir::new().unwrap();

        let result = ImageServer::new(ServerConfig::with_master_dir(master.path().join("gone")));

        assert!(matches!(result, Err(Error::MasterDir { .. })));
    }

    #[test]
    fn test_new_scans_groups() {
        let master = TempDir::new().unwrap();
        make_group(master.path(), "cats", &["a.gif", "b.gif"]);

        let server = ImageServer::new(ServerConfig::with_master_dir(master.path())).unwrap();

        assert_eq!(server.registry().names(), vec!["cats"]);
        assert_eq!(server.bind_addr().port(), 8080);
    }

    #[tokio::test]
    async fn test_serve_over_tcp() {
        let master = TempDir::new().unwrap();
        make_group(master.path(), "cats", &["a.gif", "b.gif"]);
        let server =
            Arc::new(ImageServer::new(ServerConfig::with_master_dir(master.path())).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let running = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .serve(listener, async move {
                        let _ = stop_rx.await;
                    })
                    .await
            })
        };

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /cats HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8_lossy(&response);

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("content-type: image/gif"));
        assert!(response.ends_with("GIF89a fake"));

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
        assert_eq!(server.stats().snapshot().originals, 1);
    }
}
