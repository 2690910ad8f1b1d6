use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use kimp_engine::api::{create_router, AppState, RateLimiter};
use kimp_engine::cache::{CacheSweeper, FxCache, PriceCache, TtlClass, TtlPolicy};
use kimp_engine::config::{AppConfig, FeedKind};
use kimp_engine::observability::{metrics, tracing as logging};
use kimp_engine::premium::PremiumCalculator;
use kimp_engine::price_infra::{ExchangePoller, FxPoller, HealthRegistry, HttpTickerSource};
use kimp_engine::reference::ReferenceDirectory;
use kimp_engine::stream::StreamPublisher;
use kimp_engine::types::{Clock, SystemClock};
use kimp_engine::utils::task_supervisor::TaskSupervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("KIMP_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("failed to load configuration")?;

    logging::init(&config.logging)?;
    metrics::register_metrics()?;
    tracing::info!(env = %env, feeds = config.feeds.len(), "Starting kimp-engine");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor = TaskSupervisor::new(config.server.max_task_restarts);

    // Shared state
    let prices = Arc::new(PriceCache::new("prices", TtlClass::Price, clock.clone()));
    let stats = Arc::new(PriceCache::new("stats", TtlClass::Stats, clock.clone()));
    let fx = Arc::new(match config.fx.initial_rate {
        Some(rate) => FxCache::with_rate(clock.clone(), rate),
        None => FxCache::new(clock.clone()),
    });
    let reference = Arc::new(ReferenceDirectory::load_or_empty(config.reference.symbols_path.as_deref()));
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit, clock.clone()));

    // One poller per enabled feed
    let mut registry = HealthRegistry::new();
    for feed in config.feeds.iter().filter(|feed| feed.enabled) {
        let source = Arc::new(
            HttpTickerSource::new(feed).with_context(|| format!("failed to build client for {}", feed.name()))?,
        );
        let cache = match feed.kind {
            FeedKind::Prices => prices.clone(),
            FeedKind::Stats => stats.clone(),
        };
        let health = registry.register(feed.exchange, feed.kind, config.health.degraded_after);
        let poller = Arc::new(ExchangePoller::new(source, cache, health, clock.clone(), feed.interval(), feed.timeout()));
        let shutdown = shutdown_rx.clone();
        supervisor.spawn(feed.name(), move || poller.clone().run(shutdown.clone()));
    }

    let fx_poller = Arc::new(FxPoller::new(&config.fx, fx.clone(), clock.clone())?);
    let shutdown = shutdown_rx.clone();
    supervisor.spawn("fx", move || fx_poller.clone().run(shutdown.clone()));

    let sweeper = Arc::new(CacheSweeper::new(
        vec![prices.clone(), stats.clone()],
        config.cache.dead_after(),
        config.cache.sweep_interval(),
    ));
    let shutdown = shutdown_rx.clone();
    supervisor.spawn("cache-sweeper", move || sweeper.clone().run(shutdown.clone()));

    let bucket_sweeper = limiter.clone();
    let sweep_every = config.rate_limit.sweep_interval();
    let shutdown = shutdown_rx.clone();
    supervisor.spawn("rate-limit-sweeper", move || {
        bucket_sweeper.clone().run_sweeper(sweep_every, shutdown.clone())
    });

    // HTTP surface
    let policy = TtlPolicy::from_config(&config.cache);
    let calculator = Arc::new(PremiumCalculator::new(
        prices,
        stats,
        fx,
        reference,
        policy,
        config.fx.max_age(),
    ));
    let state = AppState {
        publisher: StreamPublisher::new(calculator.clone(), clock.clone(), &config.stream),
        calculator,
        health: Arc::new(registry),
        limiter,
        views: Arc::new(config.views.clone()),
        health_config: config.health.clone(),
        ttl: policy,
        clock,
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid server bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "Listening");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let mut server_task = tokio::spawn(async move { server.await });

    let mut health_check = interval(config.server.health_check_interval());
    health_check.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut fatal = None;
    loop {
        tokio::select! {
            _ = health_check.tick() => {
                if let Err(e) = supervisor.check_health() {
                    tracing::error!(error = %e, "Background task keeps failing, shutting down");
                    fatal = Some(e);
                    break;
                }
            }
            result = &mut server_task => {
                match result {
                    Ok(Ok(())) => tracing::warn!("HTTP server stopped"),
                    Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
                    Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
                }
                break;
            }
            _ = &mut ctrl_c => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    // Graceful shutdown
    let _ = shutdown_tx.send(true);
    let grace = config.server.shutdown_grace();
    if !server_task.is_finished() {
        if tokio::time::timeout(grace, &mut server_task).await.is_err() {
            tracing::warn!("HTTP server did not drain in time");
            server_task.abort();
        }
    }
    supervisor.shutdown_all(grace).await;

    tracing::info!("Shutdown complete");
    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}
