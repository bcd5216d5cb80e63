//! Request handling
//!
//! Resolves `GET /<group>` to a random image of the group, decides between
//! the original file and a cached WebP/JPEG transcode, and streams the result.

pub mod negotiate;
pub mod page;
pub mod pipeline;

pub use negotiate::{accepts_webp, negotiate, ConversionPolicy, Negotiated};
pub use page::{error_page, error_response};
pub use pipeline::DeliveryState;
