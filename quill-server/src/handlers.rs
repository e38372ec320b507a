//! HTTP request handlers for the quill server

use crate::error::ApiError;
use crate::state::AppState;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use quill_core::{ConcurrencyController, NewNote, NewPrincipal, NoteId, NoteUpdate, Principal, QuillError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub type ResponseBody = Full<Bytes>;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const DEFAULT_SKIP: usize = 0;
const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
}

/// Main request handler
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!(%method, %path, "handling request");

    let response = match route(req, &state, &method, &path).await {
        Ok(response) => response,
        Err(e) => {
            if matches!(e, ApiError::Quill(QuillError::Unauthenticated)) {
                warn!(%method, %path, "authentication rejected");
            }
            e.into_response()
        }
    };

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "request completed"
    );
    Ok(response)
}

async fn route<B>(
    req: Request<B>,
    state: &Arc<AppState>,
    method: &Method,
    path: &str,
) -> Result<Response<ResponseBody>, ApiError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match (segments.as_slice(), method) {
        (["health"], &Method::GET) => handle_health(),
        (["auth", "register"], &Method::POST) => handle_register(req, state).await,
        (["auth", "login"], &Method::POST) => handle_login(req, state).await,
        (["users", "me"], &Method::GET) => handle_me(&req, state),
        (["notes"], &Method::POST) => handle_create_note(req, state).await,
        (["notes"], &Method::GET) => handle_list_notes(&req, state),
        (["notes", id], &Method::GET) => handle_get_note(&req, state, id),
        (["notes", id], &Method::PUT) => handle_update_note(req, state, id).await,
        (["notes", id], &Method::DELETE) => handle_delete_note(&req, state, id),

        (["health"], _)
        | (["auth", "register"], _)
        | (["auth", "login"], _)
        | (["users", "me"], _)
        | (["notes"], _)
        | (["notes", _], _) => Err(ApiError::MethodNotAllowed),

        _ => Err(ApiError::UnknownRoute),
    }
}

/// Health check handler
fn handle_health() -> Result<Response<ResponseBody>, ApiError> {
    json_response(StatusCode::OK, &json!({ "status": "healthy" }))
}

async fn handle_register<B>(req: Request<B>, state: &Arc<AppState>) -> Result<Response<ResponseBody>, ApiError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let request: NewPrincipal = read_json(req.into_body()).await?;
    request.validate()?;

    let hasher = Arc::clone(&state.hasher);
    let password = request.password.clone();
    let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| QuillError::Internal(format!("hashing task failed: {}", e)))??;

    let principal = state.principals.register(&request, digest)?;
    json_response(StatusCode::CREATED, &principal.profile())
}

async fn handle_login<B>(req: Request<B>, state: &Arc<AppState>) -> Result<Response<ResponseBody>, ApiError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let request: LoginRequest = read_json(req.into_body()).await?;
    let principal = state.principals.find_by_username(&request.username)?;

    // Unknown users still pay for one verification, against the decoy.
    let digest = principal
        .as_ref()
        .map(|p| p.password_hash.clone())
        .unwrap_or_else(|| state.login_decoy.clone());
    let hasher = Arc::clone(&state.hasher);
    let password = request.password;
    let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
        .await
        .map_err(|e| QuillError::Internal(format!("verification task failed: {}", e)))?;

    let principal = match principal {
        Some(principal) if verified => principal,
        _ => {
            debug!(username = %request.username, "login rejected");
            return Err(QuillError::Unauthenticated.into());
        }
    };

    let access_token = state
        .tokens()
        .issue(&principal.id.to_string(), state.token_ttl)?;

    info!(principal = %principal.id, "token issued");
    json_response(
        StatusCode::OK,
        &TokenResponse {
            access_token,
            token_type: "bearer",
        },
    )
}

fn handle_me<B>(req: &Request<B>, state: &Arc<AppState>) -> Result<Response<ResponseBody>, ApiError> {
    let principal = authenticate(req, state)?;
    json_response(StatusCode::OK, &principal.profile())
}

async fn handle_create_note<B>(req: Request<B>, state: &Arc<AppState>) -> Result<Response<ResponseBody>, ApiError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let principal = authenticate(&req, state)?;
    let fields: NewNote = read_json(req.into_body()).await?;

    let note = state.notes.create(principal.id, fields)?;
    json_response(StatusCode::CREATED, &note)
}

fn handle_list_notes<B>(req: &Request<B>, state: &Arc<AppState>) -> Result<Response<ResponseBody>, ApiError> {
    let principal = authenticate(req, state)?;
    let (skip, limit) = parse_paging(req.uri().query())?;

    let notes = state.notes.list(principal.id, skip, limit)?;
    json_response(StatusCode::OK, &notes)
}

fn handle_get_note<B>(req: &Request<B>, state: &Arc<AppState>, id: &str) -> Result<Response<ResponseBody>, ApiError> {
    let principal = authenticate(req, state)?;
    let id = parse_note_id(id)?;

    let note = state
        .notes
        .get(principal.id, id)?
        .ok_or(QuillError::NotFound)?;
    json_response(StatusCode::OK, &note)
}

async fn handle_update_note<B>(
    req: Request<B>,
    state: &Arc<AppState>,
    id: &str,
) -> Result<Response<ResponseBody>, ApiError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let principal = authenticate(&req, state)?;
    let id = parse_note_id(id)?;
    let update: NoteUpdate = read_json(req.into_body()).await?;

    let note = ConcurrencyController::new(&state.notes).update(&principal, id, &update)?;
    json_response(StatusCode::OK, &note)
}

fn handle_delete_note<B>(req: &Request<B>, state: &Arc<AppState>, id: &str) -> Result<Response<ResponseBody>, ApiError> {
    let principal = authenticate(req, state)?;
    let id = parse_note_id(id)?;

    state.notes.delete(principal.id, id)?;

    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    Ok(response)
}

/// Resolve the caller from the `Authorization` header
fn authenticate<B>(req: &Request<B>, state: &AppState) -> Result<Principal, ApiError> {
    // A header that is not valid ASCII is treated as absent.
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    Ok(state.resolver.resolve(&state.principals, header)?)
}

async fn read_json<T, B>(body: B) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge
            } else {
                ApiError::BadBody(e.to_string())
            }
        })?
        .to_bytes();

    serde_json::from_slice(&bytes)
        .map_err(|e| QuillError::Validation(format!("invalid request body: {}", e)).into())
}

fn parse_note_id(raw: &str) -> quill_core::Result<NoteId> {
    raw.parse::<u64>()
        .map(NoteId::new)
        .map_err(|_| QuillError::Validation(format!("note id must be an unsigned integer, got '{}'", raw)))
}

/// Parse `skip` and `limit` from a query string; unknown parameters are ignored
fn parse_paging(query: Option<&str>) -> quill_core::Result<(usize, usize)> {
    let mut skip = DEFAULT_SKIP;
    let mut limit = DEFAULT_LIMIT;

    for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_query_component(name)?;
        let target = match name.as_str() {
            "skip" => &mut skip,
            "limit" => &mut limit,
            _ => continue,
        };
        *target = decode_query_component(value)?.parse().map_err(|_| {
            QuillError::Validation(format!("'{}' must be a non-negative integer", name))
        })?;
    }

    Ok((skip, limit))
}

/// Percent-decode one query component; `+` stands for a space
fn decode_query_component(raw: &str) -> quill_core::Result<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|_| QuillError::Validation(format!("query component '{}' is not valid UTF-8", raw)))
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Response<ResponseBody>, ApiError> {
    let body = serde_json::to_vec(value).map_err(QuillError::from)?;

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}
