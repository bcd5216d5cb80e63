//! Random image server
//!
//! Serves a random image from a named group over HTTP. Groups are the
//! subdirectories of a master directory; `GET /<group>` picks one of the
//! group's images per request. Images can be transcoded to WebP (for clients
//! that accept it) or progressive JPEG, and every transcode is cached on disk
//! next to its source so it is only ever encoded once.
//!
//! ```no_run
//! use oneanime::{ImageServer, ServerConfig};
//!
//! # async fn run() -> oneanime::Result<()> {
//! let config = ServerConfig::from_file("config.json")?;
//! let server = ImageServer::new(config)?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod cache;
pub mod delivery;
pub mod error;
pub mod format;
pub mod registry;
pub mod server;
pub mod stats;

pub use cache::{ArtifactCache, Encoder, ImageMagickEncoder, NativeEncoder, TranscodeError};
pub use delivery::{ConversionPolicy, DeliveryState};
pub use error::{Error, Result};
pub use format::{FormatDescriptor, TargetFormat};
pub use registry::{GroupRegistry, ImageGroup, RegistryConfig};
pub use server::{ImageServer, ServerConfig};
pub use stats::{DeliveryStats, StatsSnapshot};
