//! 日志、追踪与指标描述
//!
//! 指标只通过 `metrics` 门面记录；未安装 recorder 时全部为空操作。

use crate::config::AppConfig;
use metrics::{describe_counter, describe_histogram, Unit};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const RATE_LIMIT_DECISIONS_TOTAL: &str = "rate_limit_decisions_total";
pub const RATE_LIMIT_STORE_FAILURES_TOTAL: &str = "rate_limit_store_failures_total";
pub const AUTH_LOGINS_TOTAL: &str = "auth_logins_total";
pub const TOKENS_ISSUED_TOTAL: &str = "auth_tokens_issued_total";
pub const TOKEN_REJECTIONS_TOTAL: &str = "auth_token_rejections_total";

/// 初始化日志与追踪系统
pub fn init_telemetry(config: &AppConfig) {
    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(log_filter(&config.logging.level))
        .with(log_layer)
        .init();

    describe_metrics();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.logging.level,
        format = %config.logging.format,
        jwt_algorithm = %config.security.jwt_algorithm,
        access_token_exp_minutes = config.security.access_token_exp_minutes,
        rate_limit_window_secs = config.rate_limit.window_secs,
        rate_limit_max_requests = config.rate_limit.max_requests,
        store_failure_policy = config.rate_limit.store_failure_policy.as_str(),
        bootstrap_admin = config.bootstrap.admin().is_some(),
        "Telemetry initialized"
    );
}

/// RUST_LOG 优先，否则使用配置的级别
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// 登记所有指标的单位和说明
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, Unit::Count, "HTTP requests by method and status");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "HTTP request latency"
    );
    describe_counter!(
        RATE_LIMIT_DECISIONS_TOTAL,
        Unit::Count,
        "Rate limiter decisions by outcome (allowed, rejected)"
    );
    describe_counter!(
        RATE_LIMIT_STORE_FAILURES_TOTAL,
        Unit::Count,
        "Counter store failures by applied policy"
    );
    describe_counter!(AUTH_LOGINS_TOTAL, Unit::Count, "Login attempts by outcome");
    describe_counter!(TOKENS_ISSUED_TOTAL, Unit::Count, "Access tokens issued");
    describe_counter!(
        TOKEN_REJECTIONS_TOTAL,
        Unit::Count,
        "Bearer tokens rejected by reason (expired, invalid)"
    );
}
