use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, TextEncoder,
};

// =========================
// HTTP request metrics
// =========================

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "auth_service_http_requests_total",
            "Total HTTP requests handled by auth-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create auth_service_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register auth_service_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "auth_service_http_request_duration_seconds",
            "HTTP request latencies for auth-service",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
        ]),
        &["method", "path", "status"],
    )
    .expect("failed to create auth_service_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register auth_service_http_request_duration_seconds");
    histogram
});

pub async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().as_str().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let start = Instant::now();

    let response = next.run(req).await;
    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path, &status])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Handler that serialises Prometheus metrics in text format.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, encoder.format_type())
        .body(buffer.into())
        .unwrap_or_else(|err| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(err.to_string().into())
                .expect("failed to build metrics error response")
        })
}

// =========================
// Auth domain metrics
// =========================

/// Counter for total register requests (incremented for each register attempt)
static REGISTER_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "register_requests_total",
        "Total number of registration requests",
    )
    .and_then(|c| {
        prometheus::default_registry().register(Box::new(c.clone()))?;
        Ok(c)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create register_requests counter: {}", e);
        IntCounter::new("dummy_register", "dummy").expect("dummy counter")
    })
});

/// Counter for total login requests (incremented for each login attempt)
static LOGIN_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("login_requests_total", "Total number of login requests")
        .and_then(|c| {
            prometheus::default_registry().register(Box::new(c.clone()))?;
            Ok(c)
        })
        .unwrap_or_else(|e| {
            tracing::error!("failed to create login_requests counter: {}", e);
            IntCounter::new("dummy_login", "dummy").expect("dummy counter")
        })
});

/// Counter for total login failures (wrong password or unknown account)
static LOGIN_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "login_failures_total",
        "Total number of failed login attempts (wrong password or unknown account)",
    )
    .and_then(|c| {
        prometheus::default_registry().register(Box::new(c.clone()))?;
        Ok(c)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create login_failures counter: {}", e);
        IntCounter::new("dummy_failures", "dummy").expect("dummy counter")
    })
});

/// Counter for account lockouts (threshold of consecutive failures reached)
static ACCOUNT_LOCKOUTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "account_lockouts_total",
        "Total number of account lockouts triggered",
    )
    .and_then(|c| {
        prometheus::default_registry().register(Box::new(c.clone()))?;
        Ok(c)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create account_lockouts counter: {}", e);
        IntCounter::new("dummy_lockouts", "dummy").expect("dummy counter")
    })
});

/// Counter for requests denied by the fixed-window rate limiter
static RATE_LIMIT_DENIALS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "rate_limit_denials_total",
        "Total number of requests denied by the rate limiter",
    )
    .and_then(|c| {
        prometheus::default_registry().register(Box::new(c.clone()))?;
        Ok(c)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create rate_limit_denials counter: {}", e);
        IntCounter::new("dummy_rate_limit", "dummy").expect("dummy counter")
    })
});

/// Counter for logins completed through a federated identity provider
static OAUTH_LOGINS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "oauth_logins_total",
        "Total number of logins completed via OAuth providers",
    )
    .and_then(|c| {
        prometheus::default_registry().register(Box::new(c.clone()))?;
        Ok(c)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create oauth_logins counter: {}", e);
        IntCounter::new("dummy_oauth", "dummy").expect("dummy counter")
    })
});

// Public functions to increment metrics from handlers and services

/// Increment register requests counter
#[inline]
pub fn inc_register_requests() {
    REGISTER_REQUESTS_TOTAL.inc();
}

/// Increment login requests counter
#[inline]
pub fn inc_login_requests() {
    LOGIN_REQUESTS_TOTAL.inc();
}

/// Increment login failures counter
#[inline]
pub fn inc_login_failures() {
    LOGIN_FAILURES_TOTAL.inc();
}

/// Increment account lockouts counter
#[inline]
pub fn inc_account_lockouts() {
    ACCOUNT_LOCKOUTS_TOTAL.inc();
}

/// Increment rate limit denials counter
#[inline]
pub fn inc_rate_limit_denials() {
    RATE_LIMIT_DENIALS_TOTAL.inc();
}

/// Increment OAuth logins counter
#[inline]
pub fn inc_oauth_logins() {
    OAUTH_LOGINS_TOTAL.inc();
}
