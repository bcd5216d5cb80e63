//! Image group registry
//!
//! The registry maps a group name (one subdirectory of the master directory)
//! to the images it contains. It is built by a single scan at startup and is
//! never written to afterwards, so request handlers share it through an `Arc`
//! without locking.
//!
//! # Layout
//!
//! ```text
//! master/
//! ├── cats/              -> group "cats"
//! │   ├── a.png
//! │   ├── b.jpg
//! │   └── .oneanime/     -> derived artifacts (a.png.webp, b.jpg.jpg, ...)
//! ├── dogs/              -> group "dogs"
//! └── empty/             -> dropped: fewer than `min_images` images
//! ```

pub mod config;
pub mod group;
pub mod store;

pub use config::RegistryConfig;
pub use group::ImageGroup;
pub use store::GroupRegistry;
