// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional HMAC request signing (spec.md §4.6, §9). Signs over
//! `method\npath\ntimestamp\nbody` with a ±5 minute replay window. Absent a
//! configured secret the layer passes every request through unsigned.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};
use tower::{Layer, Service};

type HmacSha256 = Hmac<Sha256>;

const REPLAY_WINDOW_SECS: i64 = 5 * 60;
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct SigningLayer {
    secret: Option<Arc<String>>,
}

impl SigningLayer {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.map(Arc::new),
        }
    }
}

impl<S> Layer<S> for SigningLayer {
    type Service = SigningService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SigningService {
            inner,
            secret: self.secret.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SigningService<S> {
    inner: S,
    secret: Option<Arc<String>>,
}

impl<S> Service<Request> for SigningService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let Some(secret) = self.secret.clone() else {
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(req).await });
        };

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let signature = req
                .headers()
                .get("x-signature")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let timestamp = req
                .headers()
                .get("x-timestamp")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok());

            let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
                return Ok(bad_signature());
            };

            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            if (now - timestamp).abs() > REPLAY_WINDOW_SECS {
                return Ok(bad_signature());
            }

            let method = req.method().as_str().to_string();
            let path = req.uri().path().to_string();
            let (parts, body) = req.into_parts();
            let body_bytes = match to_bytes(body, MAX_BODY_BYTES).await {
                Ok(b) => b,
                Err(_) => return Ok(bad_signature()),
            };

            let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
                Ok(m) => m,
                Err(_) => return Ok(bad_signature()),
            };
            mac.update(method.as_bytes());
            mac.update(b"\n");
            mac.update(path.as_bytes());
            mac.update(b"\n");
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b"\n");
            mac.update(&body_bytes);

            let expected = mac.finalize().into_bytes();
            let expected_hex = hex_encode(&expected);
            if !constant_time_eq(expected_hex.as_bytes(), signature.as_bytes()) {
                return Ok(bad_signature());
            }

            let rebuilt = Request::from_parts(parts, Body::from(body_bytes));
            inner.call(rebuilt).await
        })
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn bad_signature() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"code": "unauthorized", "message": "request signature invalid or expired"})),
    )
        .into_response()
}
