//! HTTP request metrics. Labels use the matched route template so path
//! parameters do not explode label cardinality.

use crate::services::metrics::{record_http_request, record_http_request_duration};
use axum::extract::MatchedPath;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    record_http_request(&method, &path, &status);
    record_http_request_duration(&method, &path, start.elapsed().as_secs_f64());

    response
}
