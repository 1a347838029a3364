use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use alloy::providers::RootProvider;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use x402gate::{GateConfig, InMemoryReplayLedger, PaymentGate, ResultSigner, UsageCounters};
use x402gate_server::analyzer::NoopAnalyzer;
use x402gate_server::routes;
use x402gate_server::state::AppState;

fn parse_cors_origins() -> Vec<String> {
    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) => origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => vec![],
    }
}

fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        // Default: allow localhost on any port
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allowed_headers(vec![
                "content-type",
                "authorization",
                "x-payment",
                "x-owner-key",
                "x-trusted-key",
            ])
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allow_any_method()
            .allowed_headers(vec![
                "content-type",
                "authorization",
                "x-payment",
                "x-owner-key",
                "x-trusted-key",
            ])
            .max_age(3600)
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GateConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!("configuration error: {e}");
            tracing::error!("refusing to start — fix the environment and restart");
            std::process::exit(1);
        }
    };

    let signer = match ResultSigner::from_env() {
        Ok(signer) => signer,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let provider: RootProvider = RootProvider::new_http(
        config
            .network
            .rpc_url
            .parse()
            .expect("validated RPC URL failed to parse"),
    );

    let counters = Arc::new(UsageCounters::new());
    let gate = PaymentGate::new(
        Arc::clone(&config),
        provider.clone(),
        Arc::new(InMemoryReplayLedger::new()),
        Arc::clone(&counters),
    );

    let metrics_token = std::env::var("METRICS_TOKEN").ok().filter(|s| !s.is_empty());
    if metrics_token.is_none() {
        tracing::warn!("METRICS_TOKEN not set — /metrics requires X402_PUBLIC_METRICS=true");
    }
    let public_metrics = std::env::var("X402_PUBLIC_METRICS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let state = web::Data::new(AppState {
        config: Arc::clone(&config),
        gate,
        provider,
        counters,
        analyzer: Arc::new(NoopAnalyzer),
        signer,
        metrics_token,
        public_metrics,
    });

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let rate_limit_rpm: u64 = std::env::var("RATE_LIMIT_RPM")
        .ok()
        .and_then(|r| r.parse().ok())
        .unwrap_or(60);

    let cors_origins = parse_cors_origins();

    tracing::info!("coderisk x402 server listening on {host}:{port}");
    tracing::info!(
        mode = config.mode.as_str(),
        enforcing = config.enforcing(),
        network = config.network.id,
        pay_to = %config.pay_to,
        verify_on_chain = config.verify_on_chain,
        confirmations = config.min_confirmations,
        "gate configuration"
    );
    tracing::info!(
        basic = %config.prices.basic.text,
        premium = %config.prices.premium.text,
        pipeline = %config.prices.pipeline.text,
        "tier prices (USDC)"
    );
    tracing::info!("Rate limit: {rate_limit_rpm} req/min per IP");

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm)
        .finish()
        .expect("failed to build rate limiter config");

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(1_048_576))
            .service(routes::health)
            .service(routes::pricing)
            .service(routes::stats)
            .service(routes::metrics_endpoint)
            .service(routes::analyze)
            .service(routes::scan_dependencies)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
