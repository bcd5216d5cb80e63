//! Output format negotiation

use axum::http::header::ACCEPT;
use axum::http::HeaderMap;

use crate::format::{FormatDescriptor, TargetFormat};

/// Conversions enabled by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionPolicy {
    /// Convert eligible sources to WebP for clients that accept it
    pub enable_webp: bool,
    /// Convert eligible sources to progressive JPEG
    pub enable_progressive_jpeg: bool,
}

/// What to send for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiated {
    /// The source file, untouched
    Original,
    /// A cached transcode of the source
    Transcode(TargetFormat),
}

/// Whether any `Accept` header lists `image/webp`
pub fn accepts_webp(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains("image/webp"))
}

/// Pick the response format, first matching rule wins:
///
/// 1. client accepts WebP, WebP enabled, source WebP-eligible: WebP
/// 2. progressive JPEG enabled and source eligible, or the source is WebP and
///    the client cannot display it: progressive JPEG
/// 3. otherwise the original file
pub fn negotiate(
    accepts_webp: bool,
    policy: ConversionPolicy,
    source: &FormatDescriptor,
) -> Negotiated {
    if accepts_webp && policy.enable_webp && source.webp_eligible {
        return Negotiated::Transcode(TargetFormat::WebP);
    }

    let progressive = policy.enable_progressive_jpeg && source.progressive_jpeg_eligible;
    let webp_fallback = source.is_webp() && !accepts_webp;
    if progressive || webp_fallback {
        return Negotiated::Transcode(TargetFormat::ProgressiveJpeg);
    }

    Negotiated::Original
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::format::classify;

    const ALL: ConversionPolicy = ConversionPolicy {
        enable_webp: true,
        enable_progressive_jpeg: true,
    };
    const WEBP_ONLY: ConversionPolicy = ConversionPolicy {
        enable_webp: true,
        enable_progressive_jpeg: false,
    };
    const JPEG_ONLY: ConversionPolicy = ConversionPolicy {
        enable_webp: false,
        enable_progressive_jpeg: true,
    };
    const NONE: ConversionPolicy = ConversionPolicy {
        enable_webp: false,
        enable_progressive_jpeg: false,
    };

    fn headers(accept: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers
    }

    #[test]
    fn test_accepts_webp() {
        assert!(accepts_webp(&headers("image/avif,image/webp,*/*")));
        assert!(!accepts_webp(&headers("image/png,image/*;q=0.8")));
        assert!(!accepts_webp(&HeaderMap::new()));
    }

    #[test]
    fn test_accepts_webp_multiple_headers() {
        let mut headers = headers("text/html");
        headers.append(ACCEPT, HeaderValue::from_static("image/webp"));

        assert!(accepts_webp(&headers));
    }

    #[test]
    fn test_webp_client_png() {
        let png = classify("png").unwrap();

        assert_eq!(
            negotiate(true, WEBP_ONLY, png),
            Negotiated::Transcode(TargetFormat::WebP)
        );
        assert_eq!(
            negotiate(true, ALL, png),
            Negotiated::Transcode(TargetFormat::WebP)
        );
    }

    #[test]
    fn test_webp_disabled_falls_to_jpeg() {
        let png = classify("png").unwrap();

        assert_eq!(
            negotiate(true, JPEG_ONLY, png),
            Negotiated::Transcode(TargetFormat::ProgressiveJpeg)
        );
    }

    #[test]
    fn test_plain_client_png() {
        let png = classify("png").unwrap();

        assert_eq!(
            negotiate(false, JPEG_ONLY, png),
            Negotiated::Transcode(TargetFormat::ProgressiveJpeg)
        );
        assert_eq!(negotiate(false, WEBP_ONLY, png), Negotiated::Original);
    }

    #[test]
    fn test_webp_source_plain_client() {
        let webp = classify("webp").unwrap();

        for policy in [ALL, WEBP_ONLY, JPEG_ONLY, NONE] {
            assert_eq!(
                negotiate(false, policy, webp),
                Negotiated::Transcode(TargetFormat::ProgressiveJpeg)
            );
        }
    }

    #[test]
    fn test_webp_source_webp_client() {
        let webp = classify("webp").unwrap();

        for policy in [ALL, WEBP_ONLY, JPEG_ONLY, NONE] {
            assert_eq!(negotiate(true, policy, webp), Negotiated::Original);
        }
    }

    #[test]
    fn test_gif_never_converted() {
        let gif = classify("gif").unwrap();

        assert_eq!(negotiate(true, ALL, gif), Negotiated::Original);
        assert_eq!(negotiate(false, ALL, gif), Negotiated::Original);
    }

    #[test]
    fn test_nothing_enabled() {
        for ext in ["png", "jpg", "jpeg", "gif"] {
            let format = classify(ext).unwrap();
            assert_eq!(negotiate(true, NONE, format), Negotiated::Original);
            assert_eq!(negotiate(false, NONE, format), Negotiated::Original);
        }
    }
}
