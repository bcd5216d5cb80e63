//! Derived-artifact cache
//!
//! Transcoded images are stored next to their sources, in a cache directory
//! inside each group directory:
//!
//! ```text
//! cats/a.png  --(WebP)-->  cats/.oneanime/a.png.webp
//! cats/a.png  --(JPEG)-->  cats/.oneanime/a.png.jpg
//! ```
//!
//! Existence on disk is the only record of what has been encoded. Encoders
//! write to a temporary file in the cache directory which is renamed over the
//! final path only after a successful encode, so a reader never sees a partial
//! artifact. Nothing is ever evicted.

pub mod encoder;
pub mod store;

pub use encoder::{Encoder, ImageMagickEncoder, NativeEncoder, TranscodeError};
pub use store::{Artifact, ArtifactCache};
