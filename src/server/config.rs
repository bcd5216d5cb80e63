//! Server configuration
//!
//! The config file is JSON with camelCase keys:
//!
//! ```json
//! {
//!     "path": "images",
//!     "serverAddress": "127.0.0.1",
//!     "serverPort": 8080,
//!     "enableWebP": true,
//!     "enableJPGProgressiveConvert": false,
//!     "useImageMagick": false
//! }
//! ```
//!
//! `path` is resolved against the directory holding the config file.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::cache::encoder::DEFAULT_IMAGEMAGICK_PROGRAM;
use crate::cache::{Encoder, ImageMagickEncoder, NativeEncoder};
use crate::delivery::ConversionPolicy;
use crate::error::{Error, Result};
use crate::registry::config::{DEFAULT_CACHE_DIR_NAME, DEFAULT_MIN_IMAGES};
use crate::registry::RegistryConfig;

/// Config file written by `oneanime init`
pub const CONFIG_TEMPLATE: &str = include_str!("../../config.example.json");

/// File name `oneanime init` writes
pub const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Directory whose subdirectories are the image groups
    pub master_dir: PathBuf,

    /// Convert to WebP for clients that accept it
    pub enable_webp: bool,

    /// Convert to progressive JPEG
    pub enable_progressive_jpeg: bool,

    /// Encode with ImageMagick instead of the built-in encoder
    pub use_imagemagick: bool,

    /// ImageMagick executable
    pub imagemagick_program: String,

    /// Scan options
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            master_dir: PathBuf::from("images"),
            enable_webp: false,
            enable_progressive_jpeg: false,
            use_imagemagick: false,
            imagemagick_program: DEFAULT_IMAGEMAGICK_PROGRAM.to_string(),
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config serving `master_dir`
    pub fn with_master_dir(master_dir: impl Into<PathBuf>) -> Self {
        Self {
            master_dir: master_dir.into(),
            ..Default::default()
        }
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        file.into_server_config(&base_dir)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Enable or disable WebP conversion
    pub fn enable_webp(mut self, enabled: bool) -> Self {
        self.enable_webp = enabled;
        self
    }

    /// Enable or disable progressive JPEG conversion
    pub fn enable_progressive_jpeg(mut self, enabled: bool) -> Self {
        self.enable_progressive_jpeg = enabled;
        self
    }

    /// Use ImageMagick (`program`) as the encoder
    pub fn use_imagemagick(mut self, program: impl Into<String>) -> Self {
        self.use_imagemagick = true;
        self.imagemagick_program = program.into();
        self
    }

    /// Set the minimum number of images per group
    pub fn min_images(mut self, min: usize) -> Self {
        self.registry = self.registry.min_images(min);
        self
    }

    /// Set the per-group cache directory name
    pub fn cache_dir_name(mut self, name: impl Into<String>) -> Self {
        self.registry = self.registry.cache_dir_name(name);
        self
    }

    /// Conversions enabled by this config
    pub fn policy(&self) -> ConversionPolicy {
        ConversionPolicy {
            enable_webp: self.enable_webp,
            enable_progressive_jpeg: self.enable_progressive_jpeg,
        }
    }

    /// Encoder backend selected by this config
    pub fn encoder(&self) -> Arc<dyn Encoder> {
        if self.use_imagemagick {
            Arc::new(ImageMagickEncoder::new(self.imagemagick_program.clone()))
        } else {
            Arc::new(NativeEncoder)
        }
    }
}

/// On-disk config file layout
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    path: PathBuf,
    #[serde(default = "default_address")]
    server_address: String,
    #[serde(default = "default_port")]
    server_port: u16,
    #[serde(rename = "enableWebP", default)]
    enable_webp: bool,
    #[serde(rename = "enableJPGProgressiveConvert", default)]
    enable_jpg_progressive_convert: bool,
    #[serde(default)]
    use_image_magick: bool,
    #[serde(default = "default_imagemagick_program")]
    image_magick_program: String,
    #[serde(default = "default_min_images")]
    min_images: usize,
    #[serde(default = "default_cache_dir_name")]
    cache_dir_name: String,
}

impl FileConfig {
    fn into_server_config(self, base_dir: &Path) -> Result<ServerConfig> {
        let bind_addr = resolve_addr(&self.server_address, self.server_port)?;

        Ok(ServerConfig {
            bind_addr,
            master_dir: std::path::absolute(base_dir.join(&self.path))?,
            enable_webp: self.enable_webp,
            enable_progressive_jpeg: self.enable_jpg_progressive_convert,
            use_imagemagick: self.use_image_magick,
            imagemagick_program: self.image_magick_program,
            registry: RegistryConfig::default()
                .min_images(self.min_images)
                .cache_dir_name(self.cache_dir_name),
        })
    }
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_imagemagick_program() -> String {
    DEFAULT_IMAGEMAGICK_PROGRAM.to_string()
}

fn default_min_images() -> usize {
    DEFAULT_MIN_IMAGES
}

fn default_cache_dir_name() -> String {
    DEFAULT_CACHE_DIR_NAME.to_string()
}

/// Resolve a host name or IP literal plus port to the first socket address
fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let display = format!("{host}:{port}");
    (host, port)
        .to_socket_addrs()
        .map_err(|_| Error::Address(display.clone()))?
        .next()
        .ok_or(Error::Address(display))
}

/// Write the template config as `config.json` in `dir`
///
/// Never overwrites an existing file.
pub fn write_template(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let target = dir.as_ref().join(CONFIG_FILE_NAME);

    let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(Error::TemplateExists(target));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(CONFIG_TEMPLATE.as_bytes())?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("config.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(!config.enable_webp);
        assert!(!config.enable_progressive_jpeg);
        assert!(!config.use_imagemagick);
        assert_eq!(config.registry.min_images, 2);
        assert_eq!(config.encoder().name(), "native");
    }

    #[test]
    fn test_from_file_original_keys() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "path": "pics",
                "serverAddress": "127.0.0.1",
                "serverPort": 9001,
                "enableWebP": true,
                "enableJPGProgressiveConvert": true,
                "useImageMagick": true
            }"#,
        );

        let config = ServerConfig::from_file(&path).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.master_dir, dir.path().join("pics"));
        assert!(config.enable_webp);
        assert!(config.enable_progressive_jpeg);
        assert!(config.use_imagemagick);
        assert_eq!(config.imagemagick_program, "convert");
        assert_eq!(config.encoder().name(), "imagemagick");
        assert_eq!(
            config.policy(),
            ConversionPolicy {
                enable_webp: true,
                enable_progressive_jpeg: true,
            }
        );
    }

    #[test]
    fn test_from_file_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), r#"{ "path": "/srv/images" }"#);

        let config = ServerConfig::from_file(&path).unwrap();

        assert_eq!(config.master_dir, PathBuf::from("/srv/images"));
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(!config.enable_webp);
        assert_eq!(config.registry.min_images, 2);
        assert_eq!(config.registry.cache_dir_name, ".oneanime");
    }

    #[test]
    fn test_relative_master_dir_made_absolute() {
        let file: FileConfig = serde_json::from_str(r#"{ "path": "images" }"#).unwrap();

        let config = file.into_server_config(Path::new(".")).unwrap();

        assert!(config.master_dir.is_absolute());
        assert!(config.master_dir.ends_with("images"));
    }

    #[test]
    fn test_from_file_extra_keys() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "path": "pics",
                "minImages": 1,
                "cacheDirName": ".derived",
                "imageMagickProgram": "magick"
            }"#,
        );

        let config = ServerConfig::from_file(&path).unwrap();

        assert_eq!(config.registry.min_images, 1);
        assert_eq!(config.registry.cache_dir_name, ".derived");
        assert_eq!(config.imagemagick_program, "magick");
    }

    #[test]
    fn test_from_file_missing() {
        let dir = TempDir::new().unwrap();

        let result = ServerConfig::from_file(dir.path().join("nope.json"));

        assert!(matches!(result, Err(Error::ConfigRead { .. })));
    }

    #[test]
    fn test_from_file_invalid() {
        let dir = TempDir::new().unwrap();
        let no_path = write_config(dir.path(), r#"{ "serverPort": 80 }"#);

        assert!(matches!(
            ServerConfig::from_file(&no_path),
            Err(Error::ConfigParse { .. })
        ));

        let bad_port = write_config(dir.path(), r#"{ "path": "x", "serverPort": "eighty" }"#);
        assert!(matches!(
            ServerConfig::from_file(&bad_port),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_unresolvable_address() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            r#"{ "path": "x", "serverAddress": "not an address" }"#,
        );

        assert!(matches!(
            ServerConfig::from_file(&path),
            Err(Error::Address(_))
        ));
    }

    #[test]
    fn test_template_parses() {
        let dir = TempDir::new().unwrap();

        let written = write_template(dir.path()).unwrap();
        assert_eq!(written, dir.path().join("config.json"));

        let config = ServerConfig::from_file(&written).unwrap();
        assert_eq!(config.master_dir, dir.path().join("images"));
    }

    #[test]
    fn test_template_not_overwritten() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let result = write_template(dir.path());

        assert!(matches!(result, Err(Error::TemplateExists(_))));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("config.json")).unwrap(),
            "{}"
        );
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "0.0.0.0:8081".parse().unwrap();
        let config = ServerConfig::with_master_dir("/srv/images")
            .bind(addr)
            .enable_webp(true)
            .enable_progressive_jpeg(true)
            .use_imagemagick("magick")
            .min_images(3)
            .cache_dir_name(".c");

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.master_dir, PathBuf::from("/srv/images"));
        assert!(config.enable_webp);
        assert!(config.enable_progressive_jpeg);
        assert!(config.use_imagemagick);
        assert_eq!(config.imagemagick_program, "magick");
        assert_eq!(config.registry.min_images, 3);
        assert_eq!(config.registry.cache_dir_name, ".c");
    }
}
