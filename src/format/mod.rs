//! Image format policy
//!
//! A closed table of the file extensions the server accepts, with the MIME
//! type each one is served as and which transcode paths it may take.
//!
//! Eligibility is per source format: animated GIFs are never converted, since
//! both target encoders would keep only the first frame.

use std::path::Path;

/// Static description of one recognized source format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Lower-cased extension without the dot
    pub extension: &'static str,
    /// MIME type used when serving the file untouched
    pub mime_type: &'static str,
    /// May be converted to WebP for clients that accept it
    pub webp_eligible: bool,
    /// May be converted to progressive JPEG
    pub progressive_jpeg_eligible: bool,
}

impl FormatDescriptor {
    /// Whether the source is already WebP
    pub fn is_webp(&self) -> bool {
        self.extension == "webp"
    }
}

static FORMATS: [FormatDescriptor; 5] = [
    FormatDescriptor {
        extension: "png",
        mime_type: "image/png",
        webp_eligible: true,
        progressive_jpeg_eligible: true,
    },
    FormatDescriptor {
        extension: "jpg",
        mime_type: "image/jpeg",
        webp_eligible: true,
        progressive_jpeg_eligible: true,
    },
    FormatDescriptor {
        extension: "jpeg",
        mime_type: "image/jpeg",
        webp_eligible: true,
        progressive_jpeg_eligible: true,
    },
    FormatDescriptor {
        extension: "gif",
        mime_type: "image/gif",
        webp_eligible: false,
        progressive_jpeg_eligible: false,
    },
    FormatDescriptor {
        extension: "webp",
        mime_type: "image/webp",
        webp_eligible: false,
        progressive_jpeg_eligible: false,
    },
];

/// Look up an extension (without the dot), ignoring ASCII case
pub fn classify(extension: &str) -> Option<&'static FormatDescriptor> {
    FORMATS
        .iter()
        .find(|format| format.extension.eq_ignore_ascii_case(extension))
}

/// Look up the format of a file by its extension
pub fn classify_path(path: impl AsRef<Path>) -> Option<&'static FormatDescriptor> {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(classify)
}

/// Output format of a transcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// WebP, for clients that advertise `image/webp`
    WebP,
    /// Progressive JPEG, for everyone else
    ProgressiveJpeg,
}

impl TargetFormat {
    /// MIME type of the encoded artifact
    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::WebP => "image/webp",
            TargetFormat::ProgressiveJpeg => "image/jpeg",
        }
    }

    /// Suffix appended to the source file name for the cached artifact
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::WebP => "webp",
            TargetFormat::ProgressiveJpeg => "jpg",
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetFormat::WebP => write!(f, "WebP"),
            TargetFormat::ProgressiveJpeg => write!(f, "progressive JPEG"),
        }
    }
}
