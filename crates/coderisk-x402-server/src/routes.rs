use actix_web::{get, post, web, HttpRequest, HttpResponse};
use alloy::providers::Provider;
use serde_json::{json, Value};

use x402gate::security::constant_time_eq;
use x402gate::{AccessGrant, CanonicalResult, GateRejection, GateRequest, ResultHash};

use crate::analyzer::{AnalyzeRequest, ScanRequest};
use crate::metrics;
use crate::state::AppState;

fn header(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .filter(|v| !v.is_empty())
}

fn gate_request(req: &HttpRequest, dependency_scan: bool, mode: Option<String>) -> GateRequest {
    GateRequest {
        resource: req.path().to_string(),
        dependency_scan,
        mode,
        payment_proof: header(req, "x-payment"),
        owner_key: header(req, "x-owner-key"),
        trusted_key: header(req, "x-trusted-key"),
    }
}

/// Run the gate and convert a rejection into the HTTP response: 402 with the
/// challenge body, or 500 when the payment could not be checked at all.
async fn admit(state: &AppState, request: GateRequest) -> Result<AccessGrant, HttpResponse> {
    let start = std::time::Instant::now();
    let (outcome, result) = match state.gate.admit(&request).await {
        Ok(grant) => {
            let outcome = if grant.bypass.is_some() {
                "pass_bypass"
            } else {
                "pass_paid"
            };
            (outcome, Ok(grant))
        }
        Err(GateRejection::PaymentRequired(challenge)) => (
            "challenge",
            Err(HttpResponse::PaymentRequired().json(&*challenge)),
        ),
        Err(GateRejection::Infrastructure(message)) => (
            "infrastructure",
            Err(HttpResponse::InternalServerError().json(json!({
                "error": "verification_unavailable",
                "message": message,
            }))),
        ),
    };
    metrics::GATE_DECISIONS.with_label_values(&[outcome]).inc();
    metrics::GATE_LATENCY
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    result
}

/// Canonicalize, hash, and (when configured) sign an analyzer result, then
/// build the response body. The returned `result` is the canonical
/// projection — exactly the bytes the hash commits to.
fn sealed_response(state: &AppState, grant: &AccessGrant, raw: &Value) -> HttpResponse {
    let canonical = CanonicalResult::from_value(raw);
    let hash = ResultHash::compute(&canonical);
    let signature = state.signer.as_ref().map(|signer| signer.sign(&hash));

    let mut body = json!({
        "tier": grant.tier.as_str(),
        "pricePreview": state.config.prices.for_tier(grant.tier).text,
        "paymentRequired": state.config.enforcing(),
        "result": canonical.to_value(),
        "resultHash": hash.as_str(),
    });
    if let Some(signature) = signature {
        body["signature"] = serde_json::to_value(signature).unwrap_or(Value::Null);
    }
    HttpResponse::Ok().json(body)
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let config = &state.config;
    let body = json!({
        "status": "ok",
        "service": "coderisk-x402",
        "mode": config.mode.as_str(),
        "network": config.network.id,
        "requirePayment": config.require_payment,
        "verifyOnChain": config.verify_on_chain,
        "prices": {
            "basic": config.prices.basic.text,
            "premium": config.prices.premium.text,
            "pipeline": config.prices.pipeline.text,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    // Only probe the chain when verification actually depends on it.
    if config.verify_on_chain {
        if let Err(e) = state.provider.get_block_number().await {
            tracing::error!(error = %e, "health check: RPC unreachable");
            let mut body = body;
            body["status"] = json!("degraded");
            body["error"] = json!("RPC unreachable");
            return HttpResponse::ServiceUnavailable().json(body);
        }
    }
    HttpResponse::Ok().json(body)
}

#[get("/pricing")]
pub async fn pricing(state: web::Data<AppState>) -> HttpResponse {
    let config = &state.config;
    HttpResponse::Ok().json(json!({
        "mode": config.mode.as_str(),
        "requirePayment": config.require_payment,
        "network": {
            "id": config.network.id,
            "name": config.network.display_name,
            "chainId": config.network.chain_id,
        },
        "payment": {
            "token": x402gate::registry::STABLECOIN_NAME,
            "decimals": x402gate::registry::STABLECOIN_DECIMALS,
            "contract": config.network.stablecoin,
            "payTo": config.pay_to,
            "confirmations": config.min_confirmations,
            "verifyOnChain": config.verify_on_chain,
        },
        "prices": {
            "basic": config.prices.basic.text,
            "premium": config.prices.premium.text,
            "pipeline": config.prices.pipeline.text,
        },
    }))
}

#[get("/stats")]
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.counters.snapshot())
}

#[get("/metrics")]
pub async fn metrics_endpoint(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match &state.metrics_token {
        Some(token) => {
            let authorized = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| constant_time_eq(t.as_bytes(), token.as_bytes()))
                .unwrap_or(false);

            if !authorized {
                return HttpResponse::Unauthorized().json(json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            // Protected by default; serving without a token takes an
            // explicit opt-in.
            if !state.public_metrics {
                return HttpResponse::Forbidden().json(json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or X402_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}

#[post("/analyze")]
pub async fn analyze(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<AnalyzeRequest>,
) -> HttpResponse {
    if body.code.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "invalid_request",
            "message": "Missing `code` string in request body"
        }));
    }

    let grant = match admit(&state, gate_request(&req, false, body.mode.clone())).await {
        Ok(grant) => grant,
        Err(response) => return response,
    };

    let raw = state.analyzer.analyze(&body);
    sealed_response(&state, &grant, &raw)
}

#[post("/scan-dependencies")]
pub async fn scan_dependencies(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ScanRequest>,
) -> HttpResponse {
    if body.manifest.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "invalid_request",
            "message": "Missing `manifest` string in request body"
        }));
    }

    let grant = match admit(&state, gate_request(&req, true, body.mode.clone())).await {
        Ok(grant) => grant,
        Err(response) => return response,
    };

    let raw = state.analyzer.scan_dependencies(&body);
    sealed_response(&state, &grant, &raw)
}
