use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use http::{header::CONTENT_TYPE, HeaderValue, StatusCode, Uri};
use prometheus::{Encoder, TextEncoder};
use tower::ServiceBuilder;
use tower_http::{
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use shib_slo::errors;

use crate::{
    controllers::saml,
    middlewares::{MakeSpanWithTrace, TRACE_ID_HEADER},
    var::{HTTP_REQUESTS_DURATION_SECONDS, HTTP_REQUESTS_TOTAL},
    AppState,
};

pub struct AppRouter;

impl AppRouter {
    pub fn build(state: AppState) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .merge(saml::new_router(state))
            .layer(
                ServiceBuilder::new().layer(
                    TraceLayer::new_for_http()
                        .make_span_with(
                            MakeSpanWithTrace::new().level(Level::INFO),
                        )
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(LatencyUnit::Millis),
                        ),
                ),
            )
            .layer(middleware::from_fn(Self::trace))
            .fallback(Self::not_found)
            .route_layer(middleware::from_fn(Self::track_metrics))
            .route("/metrics", get(Self::metrics))
    }

    async fn trace(request: Request, next: Next) -> impl IntoResponse {
        let (mut head, body) = request.into_parts();
        let trace_header = match head.headers.get(TRACE_ID_HEADER) {
            Some(v) => v.clone(),
            None => {
                let v = HeaderValue::from_str(
                    &uuid::Uuid::new_v4().hyphenated().to_string(),
                )
                .unwrap_or_else(|_| HeaderValue::from_static("-"));
                head.headers.insert(TRACE_ID_HEADER, v.clone());
                v
            }
        };
        let mut response = next.run(Request::from_parts(head, body)).await;
        response.headers_mut().insert(TRACE_ID_HEADER, trace_header);
        response
    }

    async fn track_metrics(request: Request, next: Next) -> impl IntoResponse {
        let path = if let Some(matched_path) =
            request.extensions().get::<MatchedPath>()
        {
            matched_path.as_str().to_owned()
        } else {
            request.uri().path().to_owned()
        };
        let start = Instant::now();
        let method = request.method().to_string();
        let response = next.run(request).await;
        let latency = start.elapsed();

        let labels = vec![method.as_str(), path.as_str()];
        HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();
        HTTP_REQUESTS_DURATION_SECONDS
            .with_label_values(&labels)
            .observe(latency.as_secs_f64());

        response
    }

    async fn metrics() -> Response {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = vec![];
        if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
            return errors::any(err).into_response();
        }

        (
            StatusCode::OK,
            [(CONTENT_TYPE, encoder.format_type().to_owned())],
            Body::from(buffer),
        )
            .into_response()
    }

    async fn health() -> StatusCode {
        StatusCode::NO_CONTENT
    }

    async fn not_found(uri: Uri) -> impl IntoResponse {
        errors::not_found(&format!("no route for {}", uri))
    }
}
