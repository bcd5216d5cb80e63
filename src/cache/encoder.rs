//! Encoder backends
//!
//! An [`Encoder`] turns one source image into one target format, writing the
//! result to a destination path chosen by the cache. Encoders are blocking;
//! the cache runs them on tokio's blocking pool.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageReader};

use crate::format::TargetFormat;

/// JPEG quality used by both backends
pub const JPEG_QUALITY: u8 = 85;

/// Default ImageMagick executable
pub const DEFAULT_IMAGEMAGICK_PROGRAM: &str = "convert";

/// Error type for transcoding
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    /// Source could not be opened or decoded
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Image could not be encoded to the target format
    #[error("cannot encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Progressive JPEG encoding failed
    #[error("cannot encode {path}: {source}")]
    Jpeg {
        path: PathBuf,
        #[source]
        source: jpeg_encoder::EncodingError,
    },

    /// Image is larger than the target format allows
    #[error("{width}x{height} is too large to encode as {path}")]
    Dimensions { path: PathBuf, width: u32, height: u32 },

    /// External encoder could not be started
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External encoder exited unsuccessfully
    #[error("{program} failed ({status}): {stderr}")]
    Process {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Encoder claimed success but wrote nothing
    #[error("encoder produced an empty file for {0}")]
    Empty(PathBuf),

    /// File system error while writing or placing the artifact
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding task panicked or was aborted
    #[error("encoder task failed: {0}")]
    Task(String),

    /// Failure reported by a custom encoder
    #[error("{0}")]
    Other(String),
}

impl TranscodeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TranscodeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// External image encoding capability
pub trait Encoder: Send + Sync + 'static {
    /// Encode `source` as `target`, writing the result to `destination`
    ///
    /// `destination` already exists (empty) and lives in the cache directory.
    /// On error the caller deletes it.
    fn encode(
        &self,
        source: &Path,
        target: TargetFormat,
        destination: &Path,
    ) -> Result<(), TranscodeError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// In-process encoder built on the `image` crate
///
/// WebP output is lossless. JPEG output is progressive, written with
/// `jpeg-encoder` at [`JPEG_QUALITY`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEncoder;

impl Encoder for NativeEncoder {
    fn encode(
        &self,
        source: &Path,
        target: TargetFormat,
        destination: &Path,
    ) -> Result<(), TranscodeError> {
        let decode_err = |source_err: image::ImageError| TranscodeError::Decode {
            path: source.to_path_buf(),
            source: source_err,
        };

        let image = ImageReader::open(source)
            .map_err(|e| TranscodeError::io(source, e))?
            .decode()
            .map_err(decode_err)?;

        let file = File::create(destination).map_err(|e| TranscodeError::io(destination, e))?;
        let mut writer = BufWriter::new(file);

        match target {
            TargetFormat::WebP => DynamicImage::ImageRgba8(image.to_rgba8())
                .write_with_encoder(WebPEncoder::new_lossless(&mut writer))
                .map_err(|e| TranscodeError::Encode {
                    path: destination.to_path_buf(),
                    source: e,
                })?,
            TargetFormat::ProgressiveJpeg => {
                write_progressive_jpeg(&image, &mut writer, destination)?
            }
        }

        writer
            .into_inner()
            .map_err(|e| TranscodeError::io(destination, e.into_error()))?
            .sync_all()
            .map_err(|e| TranscodeError::io(destination, e))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

fn write_progressive_jpeg<W: Write>(
    image: &DynamicImage,
    writer: W,
    destination: &Path,
) -> Result<(), TranscodeError> {
    let rgb = image.to_rgb8();
    let too_large = || TranscodeError::Dimensions {
        path: destination.to_path_buf(),
        width: rgb.width(),
        height: rgb.height(),
    };
    let width = u16::try_from(rgb.width()).map_err(|_| too_large())?;
    let height = u16::try_from(rgb.height()).map_err(|_| too_large())?;

    let mut encoder = jpeg_encoder::Encoder::new(writer, JPEG_QUALITY);
    encoder.set_progressive(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| TranscodeError::Jpeg {
            path: destination.to_path_buf(),
            source: e,
        })
}

/// Encoder that shells out to ImageMagick
///
/// The output format is taken from the destination's extension, which the
/// cache always sets to the target format.
#[derive(Debug, Clone)]
pub struct ImageMagickEncoder {
    program: String,
}

impl Default for ImageMagickEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGEMAGICK_PROGRAM)
    }
}

impl ImageMagickEncoder {
    /// Use a specific executable (`convert`, `magick`, or a full path)
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Executable this encoder runs
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, source: &Path, target: TargetFormat, destination: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg(source);
        if target == TargetFormat::ProgressiveJpeg {
            command
                .args(["-interlace", "Plane", "-quality"])
                .arg(JPEG_QUALITY.to_string());
        }
        command.arg(destination);
        command
    }
}

impl Encoder for ImageMagickEncoder {
    fn encode(
        &self,
        source: &Path,
        target: TargetFormat,
        destination: &Path,
    ) -> Result<(), TranscodeError> {
        let output = self
            .command(source, target, destination)
            .output()
            .map_err(|e| TranscodeError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Process {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "imagemagick"
    }
}
