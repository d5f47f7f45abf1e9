//! keyturn: refresh token rotation authority over HTTP
//!
//! Thin hyper adapter around `keyturn-core`: an OAuth2-style token endpoint
//! with rotation-on-exchange, reuse detection, revocation, and
//! introspection.

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

use keyturn_core::audit::AuditSink;
use keyturn_core::config::Config;
use keyturn_core::error::{ApiError, ErrorResponse};
use keyturn_core::platform::{AccessTokenIssuer, Clock, Store};
use keyturn_core::rotation::{self, ExchangeRequest, GrantRequest, RevokeRequest};
use keyturn_core::scope::ScopeSet;
use keyturn_core::token::FamilyId;

pub mod platform;
pub mod signer;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub issuer: Arc<dyn AccessTokenIssuer>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
}

/// Accept connections forever, serving each on its own task
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let state = state.clone();

        let io = hyper_util::rt::TokioIo::new(stream);
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, &state).await }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, "connection error");
            }
        });
    }
}

type HyperResponse = Response<Full<Bytes>>;

async fn handle_request(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<HyperResponse, std::convert::Infallible> {
    Ok(route_request(req, state).await)
}

async fn route_request(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::GET, "/") => handle_health(),
        (Method::POST, "/oauth/token") => handle_token(req, state).await,
        (Method::POST, "/oauth/grant") => handle_grant(req, state).await,
        (Method::POST, "/oauth/revoke") => handle_revoke(req, state).await,
        (Method::POST, "/oauth/introspect") => handle_introspect(req, state).await,
        _ => json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({"error": "not_found"}),
        ),
    }
}

/// Health check endpoint
fn handle_health() -> HyperResponse {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "name": "keyturn",
            "status": "ok"
        }),
    )
}

/// Token endpoint: exchanges a refresh token for a fresh pair
async fn handle_token(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let form = match read_form(req).await {
        Ok(form) => form,
        Err(e) => return error_response(&e),
    };

    match form.get("grant_type").map(String::as_str) {
        Some("refresh_token") => {}
        Some(other) => {
            return error_response(&ApiError::invalid_request(format!(
                "unsupported grant_type '{}'",
                other
            )))
        }
        None => {
            return error_response(&ApiError::invalid_request(
                "missing required parameter: grant_type",
            ))
        }
    }

    let request = ExchangeRequest {
        refresh_token: match require(&form, "refresh_token") {
            Ok(v) => v,
            Err(e) => return error_response(&e),
        },
        client_id: match require(&form, "client_id") {
            Ok(v) => v,
            Err(e) => return error_response(&e),
        },
        requested_scope: form.get("scope").map(|s| ScopeSet::parse(s)),
    };

    match rotation::exchange::handle(
        request,
        state.store.as_ref(),
        state.issuer.as_ref(),
        state.audit.as_ref(),
        state.clock.as_ref(),
        &state.config,
    )
    .await
    {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(e) => error_response(&e),
    }
}

/// Grant endpoint: creates a new family for an authenticated subject.
/// Authentication of the subject happens upstream of this service.
async fn handle_grant(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let form = match read_form(req).await {
        Ok(form) => form,
        Err(e) => return error_response(&e),
    };

    let request = GrantRequest {
        client_id: form.get("client_id").cloned().unwrap_or_default(),
        subject_id: form.get("subject_id").cloned().unwrap_or_default(),
        scope: ScopeSet::parse(form.get("scope").map(String::as_str).unwrap_or("")),
        audience: form.get("audience").cloned().unwrap_or_default(),
    };

    match rotation::grant::handle(
        request,
        state.store.as_ref(),
        state.issuer.as_ref(),
        state.audit.as_ref(),
        state.clock.as_ref(),
        &state.config,
    )
    .await
    {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(e) => error_response(&e),
    }
}

/// Revocation endpoint: token or whole family, always family-wide
async fn handle_revoke(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let form = match read_form(req).await {
        Ok(form) => form,
        Err(e) => return error_response(&e),
    };

    let request = if let Some(token) = form.get("token") {
        RevokeRequest::Token(token.clone())
    } else if let Some(raw) = form.get("family_id") {
        match FamilyId::parse(raw) {
            Some(family_id) => RevokeRequest::Family(family_id),
            None => {
                return error_response(&ApiError::invalid_request("family_id is not a valid id"))
            }
        }
    } else {
        return error_response(&ApiError::invalid_request(
            "one of 'token' or 'family_id' is required",
        ));
    };

    match rotation::revoke::handle(
        request,
        state.store.as_ref(),
        state.audit.as_ref(),
        state.clock.as_ref(),
        &state.config,
    )
    .await
    {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({})),
        Err(e) => error_response(&e),
    }
}

/// Introspection endpoint: non-mutating token state lookup.
///
/// Unauthenticated callers get only the boolean `active` flag (RFC 7662
/// reserves anything more for authorized callers); the wire must not
/// distinguish rotated from revoked from unknown, same as `invalid_grant`.
/// Full detail stays in the audit trail.
async fn handle_introspect(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let form = match read_form(req).await {
        Ok(form) => form,
        Err(e) => return error_response(&e),
    };
    let token = match require(&form, "token") {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };

    match rotation::introspect(&token, state.store.as_ref(), state.clock.as_ref()).await {
        Ok(view) => json_response(StatusCode::OK, &serde_json::json!({ "active": view.active })),
        Err(e) => error_response(&e),
    }
}

/// Read and parse an application/x-www-form-urlencoded body
async fn read_form(req: Request<Incoming>) -> Result<HashMap<String, String>, ApiError> {
    let body = req
        .collect()
        .await
        .map_err(|_| ApiError::invalid_request("failed to read request body"))?
        .to_bytes();

    Ok(url::form_urlencoded::parse(&body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

fn require(form: &HashMap<String, String>, name: &str) -> Result<String, ApiError> {
    form.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ApiError::invalid_request(format!("missing required parameter: {}", name)))
}

fn error_response(err: &ApiError) -> HyperResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &ErrorResponse::from(err))
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> HyperResponse {
    let json = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}
