use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use prometheus_bridge::{record_operation, status_worsens, DomainMetrics};
use telemetry_core::DomainSimulator;

use crate::api::{
    ApiError, DomainSummary, OperationRequest, OperationResponse, ResetResponse,
    SnapshotResponse,
};

pub type HttpBody = Full<Bytes>;

pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared by every connection. Each simulator guards its own state, so
/// domains never contend with each other.
#[derive(Clone)]
pub struct AppState {
    domains: Arc<BTreeMap<String, Arc<DomainSimulator>>>,
    metrics: Arc<DomainMetrics>,
}

impl AppState {
    pub fn new(domains: BTreeMap<String, Arc<DomainSimulator>>, metrics: DomainMetrics) -> Self {
        Self {
            domains: Arc::new(domains),
            metrics: Arc::new(metrics),
        }
    }

    pub fn domain(&self, name: &str) -> Result<&Arc<DomainSimulator>, ApiError> {
        self.domains
            .get(name)
            .ok_or_else(|| ApiError::NotFound(format!("unknown domain `{name}`")))
    }

    pub fn metrics(&self) -> &DomainMetrics {
        &self.metrics
    }
}

/// Reads the body (capped at [`MAX_BODY_BYTES`]) and routes the request.
pub async fn handle_request<B>(
    state: AppState,
    req: Request<B>,
) -> Result<Response<HttpBody>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match read_body(req.into_body()).await {
        Ok(body) => route(&state, &method, &path, &body),
        Err(e) => error_response(&e),
    };
    debug!(%method, %path, status = response.status().as_u16(), "request served");
    Ok(response)
}

async fn read_body<B>(body: B) -> Result<Bytes, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| ApiError::InvalidInput(format!("request body rejected: {e}")))
}

/// Dispatches one request. Kept free of hyper's body type so it can be
/// driven directly.
pub fn route(state: &AppState, method: &Method, path: &str, body: &[u8]) -> Response<HttpBody> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let result = match (method, segments.as_slice()) {
        (&Method::GET, ["health"]) => Ok(json_response(
            StatusCode::OK,
            &serde_json::json!({ "status": "ok" }),
        )),
        (&Method::GET, ["domains"]) => Ok(list_domains(state)),
        (&Method::GET, ["domains", name, "snapshot"]) => get_snapshot(state, name),
        (&Method::GET, ["domains", name, "current"]) => get_current(state, name),
        (&Method::POST, ["domains", name, "operation"]) => post_operation(state, name, body),
        (&Method::GET, ["metrics"]) => render_metrics(state),
        _ => Err(ApiError::NotFound(format!("no route for {method} {path}"))),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

fn list_domains(state: &AppState) -> Response<HttpBody> {
    let summaries: Vec<DomainSummary> = state
        .domains
        .values()
        .map(|sim| DomainSummary {
            name: sim.name().to_string(),
            metrics: sim.metrics().names().map(str::to_string).collect(),
            gates: sim.thresholds().gate_names().map(str::to_string).collect(),
        })
        .collect();
    json_response(StatusCode::OK, &summaries)
}

fn get_snapshot(state: &AppState, name: &str) -> Result<Response<HttpBody>, ApiError> {
    let reading = state.domain(name)?.snapshot();
    state.metrics.observe_reading(&reading);
    Ok(json_response(StatusCode::OK, &SnapshotResponse::from(reading)))
}

fn get_current(state: &AppState, name: &str) -> Result<Response<HttpBody>, ApiError> {
    let reading = state.domain(name)?.current_reading();
    Ok(json_response(StatusCode::OK, &SnapshotResponse::from(reading)))
}

fn post_operation(
    state: &AppState,
    name: &str,
    body: &[u8],
) -> Result<Response<HttpBody>, ApiError> {
    let sim = state.domain(name)?;
    let request: OperationRequest = serde_json::from_slice(body).map_err(|e| {
        state.metrics.observe_invalid(name);
        ApiError::malformed(&e)
    })?;

    match request {
        OperationRequest::Evaluate { delta } => {
            let evaluation = sim.evaluate(&delta).map_err(|e| invalid(state, name, e))?;
            record_operation(&state.metrics, name, &evaluation);
            let worsens = status_worsens(name, sim.classify(&evaluation.current), &evaluation);
            Ok(json_response(
                StatusCode::OK,
                &OperationResponse::evaluated(name, evaluation, worsens),
            ))
        }
        OperationRequest::Apply { delta } => {
            let applied = sim.apply(&delta).map_err(|e| invalid(state, name, e))?;
            record_operation(&state.metrics, name, &applied.evaluation);
            let before = sim.classify(&applied.evaluation.current);
            let worsens = status_worsens(name, before, &applied.evaluation);
            if applied.committed {
                state.metrics.observe_reading(&sim.current_reading());
            }
            Ok(json_response(
                StatusCode::OK,
                &OperationResponse::applied(name, applied, worsens),
            ))
        }
        OperationRequest::Reset {} => {
            sim.reset();
            Ok(json_response(
                StatusCode::OK,
                &ResetResponse {
                    domain: name.to_string(),
                    action: "reset",
                    reset: true,
                },
            ))
        }
    }
}

fn render_metrics(state: &AppState) -> Result<Response<HttpBody>, ApiError> {
    let text = state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(format!("metrics encoding failed: {e}")))?;
    let mut response = Response::new(Full::from(text));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    Ok(response)
}

fn invalid(state: &AppState, name: &str, err: telemetry_core::TelemetryError) -> ApiError {
    state.metrics.observe_invalid(name);
    ApiError::from(err)
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<HttpBody> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::from(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(error = %e, "response serialization failed");
            let mut response = Response::new(Full::from(Bytes::from_static(
                b"{\"error\":\"internal\",\"message\":\"response serialization failed\"}",
            )));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn error_response(err: &ApiError) -> Response<HttpBody> {
    if let ApiError::Internal(msg) = err {
        error!(message = %msg, "request failed");
    }
    json_response(err.status(), &err.body())
}

/// A failed accept (descriptor exhaustion, aborted handshake) is logged and
/// skipped so the listener keeps serving.
pub(crate) fn accepted_connection<T>(accepted: io::Result<T>) -> Option<T> {
    match accepted {
        Ok(conn) => Some(conn),
        Err(e) => {
            warn!(error = %e, "accept failed");
            None
        }
    }
}

/// Accepts connections until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Some((stream, peer)) = accepted_connection(accepted) else {
                    continue;
                };
                let state = state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        handle_request(state.clone(), req)
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        warn!(%peer, error = %e, "connection error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("shutdown requested, no longer accepting connections");
                return Ok(());
            }
        }
    }
}
