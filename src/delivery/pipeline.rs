//! Per-request delivery
//!
//! Each request walks the same fixed sequence and keeps nothing afterwards:
//!
//! ```text
//! ResolveGroup ──► SelectImage ──► NegotiateFormat ──┬─► ServeOriginal ──► Respond
//!      │                                              └─► ServeDerived  ──► Respond
//!      └─► 404                        any failure ──► 500 (logged, never echoed)
//! ```
//!
//! Groups without a cache directory serve the original, except a WebP source
//! for a client that cannot display WebP: that one is converted on every
//! request and never stored.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path as UrlPath, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

use crate::cache::{ArtifactCache, TranscodeError};
use crate::error::{Error, Result};
use crate::format::{self, TargetFormat};
use crate::registry::{GroupRegistry, ImageGroup};
use crate::stats::DeliveryStats;

use super::negotiate::{accepts_webp, negotiate, ConversionPolicy, Negotiated};
use super::page::error_response;

/// Shared state passed to all request handlers
#[derive(Clone)]
pub struct DeliveryState {
    registry: Arc<GroupRegistry>,
    cache: Arc<ArtifactCache>,
    policy: ConversionPolicy,
    stats: Arc<DeliveryStats>,
}

impl DeliveryState {
    /// Create the state for a registry and cache
    pub fn new(
        registry: Arc<GroupRegistry>,
        cache: Arc<ArtifactCache>,
        policy: ConversionPolicy,
    ) -> Self {
        Self {
            registry,
            cache,
            policy,
            stats: Arc::new(DeliveryStats::new()),
        }
    }

    /// Registry being served
    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    /// Delivery counters
    pub fn stats(&self) -> &Arc<DeliveryStats> {
        &self.stats
    }

    /// Build the HTTP router: `GET /<group>`, everything else is 404
    pub fn router(self) -> Router {
        Router::new()
            .route("/{group}", get(handle_group))
            .fallback(handle_fallback)
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Run the delivery sequence for one request to group `name`
    pub async fn deliver(&self, name: &str, headers: &HeaderMap) -> Response {
        let Some(group) = self.registry.get(name) else {
            tracing::info!(group = %name, "Unknown group requested");
            self.stats.record_not_found();
            return error_response(StatusCode::NOT_FOUND);
        };

        match self.deliver_from(group, headers).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(group = %name, error = %e, "Delivery failed");
                self.stats.record_failure();
                error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn deliver_from(&self, group: &ImageGroup, headers: &HeaderMap) -> Result<Response> {
        let member = group
            .pick()
            .ok_or_else(|| Error::EmptyGroup(group.name().to_string()))?;
        let source = group.member_path(member);
        tracing::info!(group = %group.name(), file = %member, "Selected image");

        let format = format::classify_path(&source).ok_or_else(|| {
            TranscodeError::Other(format!("unrecognized extension on {}", source.display()))
        })?;

        match negotiate(accepts_webp(headers), self.policy, format) {
            Negotiated::Transcode(target) if group.caching_enabled() => {
                self.serve_derived(&source, target).await
            }
            Negotiated::Transcode(target) if format.is_webp() => {
                tracing::warn!(
                    group = %group.name(),
                    target = %target,
                    "No cache directory for group, converting without caching"
                );
                self.serve_uncached(&source, target).await
            }
            Negotiated::Transcode(target) => {
                tracing::warn!(
                    group = %group.name(),
                    target = %target,
                    "No cache directory for group, serving original"
                );
                self.serve_original(&source, format.mime_type).await
            }
            Negotiated::Original => self.serve_original(&source, format.mime_type).await,
        }
    }

    async fn serve_derived(&self, source: &Path, target: TargetFormat) -> Result<Response> {
        let artifact = self.cache.obtain(source, target).await?;
        let response = stream_file(&artifact.path, target.mime_type()).await?;
        self.stats.record_derived(artifact.cached);
        Ok(response)
    }

    async fn serve_uncached(&self, source: &Path, target: TargetFormat) -> Result<Response> {
        let bytes = self.cache.encode_uncached(source, target).await?;
        let headers = [
            (CONTENT_TYPE, HeaderValue::from_static(target.mime_type())),
            (CONTENT_LENGTH, HeaderValue::from(bytes.len())),
        ];
        self.stats.record_derived(false);
        Ok((headers, Body::from(bytes)).into_response())
    }

    async fn serve_original(&self, source: &Path, mime_type: &'static str) -> Result<Response> {
        let response = stream_file(source, mime_type).await?;
        self.stats.record_original();
        Ok(response)
    }
}

/// Stream a file from disk as the response body
///
/// Errors after the headers are sent abort only this response.
async fn stream_file(path: &Path, mime_type: &'static str) -> Result<Response> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(mime_type)),
        (CONTENT_LENGTH, HeaderValue::from(len)),
    ];
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((headers, body).into_response())
}

/// Handles `GET /<group>`; axum has already percent-decoded the segment
async fn handle_group(
    State(state): State<DeliveryState>,
    group: std::result::Result<UrlPath<String>, PathRejection>,
    headers: HeaderMap,
) -> Response {
    state.stats.record_request();

    match group {
        Ok(UrlPath(name)) => state.deliver(&name, &headers).await,
        Err(rejection) => {
            tracing::info!(error = %rejection, "Undecodable group name");
            state.stats.record_not_found();
            error_response(StatusCode::NOT_FOUND)
        }
    }
}

async fn handle_fallback(State(state): State<DeliveryState>) -> Response {
    state.stats.record_request();
    state.stats.record_not_found();
    error_response(StatusCode::NOT_FOUND)
}
