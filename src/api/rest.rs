use std::sync::Arc;
use std::time::Duration;
use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{header, HeaderValue},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use crate::api::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::cache::TtlPolicy;
use crate::config::{HealthConfig, ViewsConfig};
use crate::error::Result;
use crate::observability::metrics;
use crate::observability::tracing::trace_stream;
use crate::premium::{PremiumCalculator, TrendingSort};
use crate::price_infra::HealthRegistry;
use crate::stream::StreamPublisher;
use crate::types::{Clock, ConnectionId, MarketSelector};

const MARKET_VIEW_MAX_AGE: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub calculator: Arc<PremiumCalculator>,
    pub publisher: StreamPublisher,
    pub health: Arc<HealthRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub views: Arc<ViewsConfig>,
    pub health_config: HealthConfig,
    pub ttl: TtlPolicy,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarketQuery {
    pub domestic: Option<String>,
    pub foreign: Option<String>,
}

impl MarketQuery {
    /// Parses the selectors, falling back to the configured defaults.
    fn resolve(&self, views: &ViewsConfig) -> Result<(MarketSelector, MarketSelector)> {
        let domestic = match self.domestic.as_deref() {
            Some(token) => token.parse()?,
            None => views.default_domestic,
        };
        let foreign = match self.foreign.as_deref() {
            Some(token) => token.parse()?,
            None => views.default_foreign,
        };
        Ok((domestic, foreign))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendingQuery {
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

fn s_maxage(max_age: Duration) -> String {
    format!("s-maxage={}, stale-while-revalidate", max_age.as_secs().max(1))
}

fn respond<T: Serialize>(cache_control: &str, data: T) -> Response {
    let mut response = Json(Envelope { success: true, data }).into_response();
    if let Ok(value) = HeaderValue::from_str(cache_control) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/premium/table", get(premium_table))
        .route("/premium/stream", get(premium_stream))
        .route("/premium/ws", get(premium_ws))
        .route("/market/exchange-premium", get(exchange_premium))
        .route("/market/premium-heatmap", get(premium_heatmap))
        .route("/market/summary", get(market_summary))
        .route("/market/volatility", get(volatility))
        .route("/market/majors", get(majors))
        .route("/market/trending", get(trending))
        .route("/admin/price-feeds", get(price_feeds))
        .layer(middleware::from_fn_with_state(state.limiter.clone(), rate_limit_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler() -> Result<Response> {
    let body = metrics::render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

async fn premium_table(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<Response> {
    let (domestic, foreign) = query.resolve(&state.views)?;
    let snapshot = state.calculator.snapshot(domestic, foreign);
    Ok(respond(&s_maxage(state.ttl.price_ttl), snapshot))
}

async fn premium_stream(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<Response> {
    let (domestic, foreign) = query.resolve(&state.views)?;
    let sse = state.publisher.sse(domestic, foreign);
    Ok(([(header::CACHE_CONTROL, "no-cache")], sse).into_response())
}

async fn premium_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<Response> {
    let (domestic, foreign) = query.resolve(&state.views)?;
    let id = ConnectionId::new();
    let publisher = state.publisher.clone();

    Ok(ws.on_upgrade(move |socket| async move {
        publisher
            .serve_websocket(socket, id, domestic, foreign)
            .instrument(trace_stream(id, "ws", domestic, foreign))
            .await
    }))
}

async fn exchange_premium(State(state): State<AppState>) -> Response {
    let summaries = state.calculator.exchange_summaries(&state.views);
    respond(&s_maxage(MARKET_VIEW_MAX_AGE), summaries)
}

async fn premium_heatmap(State(state): State<AppState>) -> Response {
    let heatmap = state.calculator.heatmap(&state.views);
    respond(&s_maxage(MARKET_VIEW_MAX_AGE), heatmap)
}

async fn market_summary(State(state): State<AppState>) -> Response {
    let summary = state.calculator.market_summary(&state.views);
    respond(&s_maxage(MARKET_VIEW_MAX_AGE), summary)
}

async fn volatility(State(state): State<AppState>) -> Response {
    let report = state.calculator.volatility(&state.views);
    respond(&s_maxage(state.ttl.stats_ttl), report)
}

async fn majors(State(state): State<AppState>) -> Response {
    let majors = state.calculator.majors(&state.views);
    respond(&s_maxage(MARKET_VIEW_MAX_AGE), majors)
}

async fn trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<Response> {
    let sort = match query.sort.as_deref() {
        Some(token) => token.parse()?,
        None => TrendingSort::default(),
    };
    let limit = query.limit.unwrap_or(state.views.trending_limit);
    let view = state.calculator.trending(&state.views, sort, limit);
    Ok(respond(&s_maxage(MARKET_VIEW_MAX_AGE), view))
}

async fn price_feeds(State(state): State<AppState>) -> Response {
    let reports = state.health.reports(state.clock.now(), &state.health_config);
    respond("no-cache, no-store", reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExchangeId, Quote};

    #[test]
    fn test_query_defaults_and_parsing() {
        let views = ViewsConfig::default();
        let (domestic, foreign) = MarketQuery::default().resolve(&views).unwrap();
        assert_eq!(domestic, MarketSelector::new(ExchangeId::Upbit, Quote::Krw));
        assert_eq!(foreign, MarketSelector::new(ExchangeId::Binance, Quote::Usdt));

        let query = MarketQuery {
            domestic: Some("bithumb_krw".to_string()),
            foreign: Some("OKX_USDT".to_string()),
        };
        let (domestic, foreign) = query.resolve(&views).unwrap();
        assert_eq!(domestic.exchange, ExchangeId::Bithumb);
        assert_eq!(foreign.exchange, ExchangeId::Okx);
    }

    #[test]
    fn test_bad_selector_is_rejected() {
        let query = MarketQuery {
            domestic: Some("NOPE".to_string()),
            foreign: None,
        };
        assert!(query.resolve(&ViewsConfig::default()).is_err());
    }

    #[test]
    fn test_cache_control_uses_whole_seconds() {
        assert_eq!(s_maxage(Duration::from_millis(2_000)), "s-maxage=2, stale-while-revalidate");
        assert_eq!(s_maxage(Duration::from_millis(200)), "s-maxage=1, stale-while-revalidate");
    }
}
