//! HTTP endpoint for Prometheus scrapes built on [tower] and [http]
//!
//! *this module requires the `service` feature flag*
//!
//! # Example
//! ```ignore
//! use axum::{routing::get, Router};
//! use prometheus_metrics_handlers::service::MetricsLayer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = prometheus_metrics_handlers::Builder::new()
//!         .with_uptime_metric("process_uptime_seconds")
//!         .with_recorder()
//!         .init()?;
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "hello" }))
//!         .layer(MetricsLayer::new(registry));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Output
//!
//! ```plaintext
//! $ curl http://localhost:8080/metrics
//! # TYPE process_uptime_seconds counter
//! # HELP process_uptime_seconds Seconds since the metrics registry was initialized
//! process_uptime_seconds 42
//! ```

use super::exposition::Connection;
use super::registry::Registry;
use bytes::Bytes;
use futures::future::{self, Ready};
use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Answer a scrape request with the current metrics document
///
/// * `GET` runs every handler and returns the document
/// * `HEAD` runs every handler but returns no body
/// * Anything else is refused with 405 without running handlers
pub fn scrape_response<B>(registry: &Registry, method: &Method) -> Response<B>
where
    B: From<Bytes>,
{
    if *method != Method::GET && *method != Method::HEAD {
        let mut response = Response::new(B::from(Bytes::new()));
        *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
        return response;
    }

    let mut conn = Connection::new();
    registry.on_scrape(&mut conn);

    let body = if *method == Method::HEAD {
        Bytes::new()
    } else {
        conn.freeze()
    };

    let mut response = Response::new(B::from(body));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    response
}

/// [tower::Layer] answering scrapes on the registry's endpoint path in front of another service
#[derive(Clone, Copy)]
pub struct MetricsLayer {
    registry: &'static Registry,
}

impl MetricsLayer {
    pub fn new(registry: &'static Registry) -> Self {
        Self { registry }
    }
}

impl<S> tower::Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService::new(self.registry, inner)
    }
}

/// [tower::Service] serving the metrics document, every other request is passed to the inner service
#[derive(Clone)]
pub struct MetricsService<S> {
    registry: &'static Registry,
    inner: S,
}

impl<S> MetricsService<S> {
    pub fn new(registry: &'static Registry, inner: S) -> Self {
        Self { registry, inner }
    }
}

impl<S, ReqBody, ResBody> tower::Service<Request<ReqBody>> for MetricsService<S>
where
    S: tower::Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: From<Bytes>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = MetricsServiceFuture<S::Future, ResBody, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if req.uri().path() != self.registry.config.endpoint_path {
            return MetricsServiceFuture::Inner {
                inner: self.inner.call(req),
            };
        }

        debug!(method = %req.method(), "serving metrics scrape");

        MetricsServiceFuture::Scrape {
            response: future::ready(Ok(scrape_response(self.registry, req.method()))),
        }
    }
}

#[pin_project(project = MetricsServiceFutureProj)]
#[doc(hidden)]
pub enum MetricsServiceFuture<F, B, E> {
    Scrape {
        #[pin]
        response: Ready<Result<Response<B>, E>>,
    },
    Inner {
        #[pin]
        inner: F,
    },
}

impl<F, B, E> Future for MetricsServiceFuture<F, B, E>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            MetricsServiceFutureProj::Scrape { response } => response.poll(cx),
            MetricsServiceFutureProj::Inner { inner } => inner.poll(cx),
        }
    }
}
