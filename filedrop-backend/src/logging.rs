//! Logging things
//!

use std::time::Duration;

use axum::http::{header::CONTENT_LENGTH, HeaderMap, Request};
use axum::response::Response;
use tower_http::{
    classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier},
    trace::{MakeSpan, OnFailure, OnRequest, OnResponse, TraceLayer},
};
use tracing::{debug, error, info, warn, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is not set.
pub fn default_filter(debug: bool) -> &'static str {
    match debug {
        true => "filedrop=debug,filedrop_backend=debug,tower_http=debug",
        false => "filedrop=info,filedrop_backend=info,tower_http=info",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `debug` flag.
pub fn init_tracing(debug: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(debug).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

#[derive(Copy, Clone)]
pub(crate) struct RequestSpanner {}

impl<B> MakeSpan<B> for RequestSpanner {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_bytes = content_length(request.headers()),
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            bytes = tracing::field::Empty
        )
    }
}

impl<B> OnRequest<B> for RequestSpanner {
    fn on_request(&mut self, _request: &Request<B>, _span: &Span) {
        debug!("request received");
    }
}

impl<B> OnResponse<B> for RequestSpanner {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        span.record("status", status.as_u16());
        span.record("latency_ms", latency.as_millis() as u64);
        if let Some(bytes) = content_length(response.headers()) {
            span.record("bytes", bytes);
        }
        if status.is_client_error() {
            warn!("response sent");
        } else {
            info!("response sent");
        }
    }
}

impl OnFailure<ServerErrorsFailureClass> for RequestSpanner {
    fn on_failure(&mut self, failure: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
        error!(
            "request failed after {}ms: {}",
            latency.as_millis(),
            failure
        );
    }
}

pub(crate) fn logging_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpanner,
    RequestSpanner,
    RequestSpanner,
    tower_http::trace::DefaultOnBodyChunk,
    tower_http::trace::DefaultOnEos,
    RequestSpanner,
> {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpanner {})
        .on_request(RequestSpanner {})
        .on_response(RequestSpanner {})
        .on_failure(RequestSpanner {})
}
