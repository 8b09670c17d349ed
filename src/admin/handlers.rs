//! Route CRUD over form-encoded HTTP.
//!
//! # Responsibilities
//! - GET: list all routes or the requested keys
//! - PUT: validate and upsert `key=endpoint` pairs
//! - DELETE: remove the named keys
//!
//! # Design Decisions
//! - Request fields come from the form body (PUT/DELETE) followed by the
//!   query string; the first value of a repeated key wins
//! - PUT applies entries in request order and stops at the first invalid
//!   one; entries before it stay stored
//! - Storage write failures are reported as 500

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use url::form_urlencoded;

use crate::admin::AdminState;
use crate::observability::metrics;
use crate::routing::endpoint::{Endpoint, EndpointError, RoutingKey};
use crate::storage::{run_blocking, StorageError};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Single entry point; dispatches on method.
pub async fn handle_routes(
    State(state): State<AdminState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body_form = if method == Method::PUT || method == Method::DELETE {
        is_form(&headers).then_some(body.as_ref())
    } else {
        None
    };
    let fields = form_fields(body_form, uri.query());

    let response = match method {
        Method::GET => handle_get(&state, fields).await,
        Method::PUT => handle_put(&state, fields).await,
        Method::DELETE => handle_delete(&state, fields).await,
        _ => {
            let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, PUT, DELETE"));
            response
        }
    };

    metrics::record_admin_request(method.as_str(), response.status().as_u16());
    response
}

async fn handle_get(state: &AdminState, fields: Vec<(String, String)>) -> Response {
    let requested: Vec<RoutingKey> = fields.into_iter().map(|(k, _)| RoutingKey::new(k)).collect();
    let any_requested = !requested.is_empty();

    let result = run_blocking(&state.storage, move |storage| {
        if requested.is_empty() {
            storage.values().into_iter().collect::<BTreeMap<_, _>>()
        } else {
            requested
                .into_iter()
                .filter_map(|key| storage.load(&key).map(|endpoint| (key, endpoint)))
                .collect()
        }
    })
    .await;

    let routes = match result {
        Ok(routes) => routes,
        Err(e) => return storage_failure(e),
    };

    if routes.is_empty() && any_requested {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, endpoint) in &routes {
        serializer.append_pair(key.as_str(), &endpoint.to_string());
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, FORM_CONTENT_TYPE)],
        serializer.finish(),
    )
        .into_response()
}

enum PutError {
    Invalid(String, EndpointError),
    Storage(StorageError),
}

async fn handle_put(state: &AdminState, fields: Vec<(String, String)>) -> Response {
    let result = run_blocking(&state.storage, move |storage| -> Result<(), PutError> {
        for (key, value) in fields {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let endpoint = Endpoint::parse(value).map_err(|e| PutError::Invalid(key.clone(), e))?;
            tracing::info!(key = %key, endpoint = %endpoint, "Storing route");
            storage
                .store(RoutingKey::new(key), endpoint)
                .map_err(PutError::Storage)?;
        }
        Ok(())
    })
    .await;

    match result {
        Ok(Ok(())) => StatusCode::OK.into_response(),
        Ok(Err(PutError::Invalid(key, e))) => {
            tracing::debug!(key = %key, error = %e, "Rejected route");
            let message = match e {
                EndpointError::MissingScheme | EndpointError::UnsupportedScheme(_) => {
                    format!("invalid or missing scheme for: {}", key)
                }
                EndpointError::MissingHost | EndpointError::Invalid(_) => {
                    format!("invalid url for: {}", key)
                }
            };
            (StatusCode::BAD_REQUEST, message).into_response()
        }
        Ok(Err(PutError::Storage(e))) | Err(e) => storage_failure(e),
    }
}

async fn handle_delete(state: &AdminState, fields: Vec<(String, String)>) -> Response {
    let result = run_blocking(&state.storage, move |storage| -> Result<(), StorageError> {
        for (key, _) in fields {
            tracing::info!(key = %key, "Deleting route");
            storage.delete(&RoutingKey::new(key))?;
        }
        Ok(())
    })
    .await;

    match result {
        Ok(Ok(())) => StatusCode::OK.into_response(),
        Ok(Err(e)) | Err(e) => storage_failure(e),
    }
}

fn storage_failure(e: StorageError) -> Response {
    tracing::error!(error = %e, "Route storage failure");
    (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim())
        .is_some_and(|v| v.eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Merge body and query fields, keeping the first value of each key.
fn form_fields(body: Option<&[u8]>, query: Option<&str>) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let pairs = body
        .into_iter()
        .flat_map(form_urlencoded::parse)
        .chain(query.into_iter().flat_map(|q| form_urlencoded::parse(q.as_bytes())));

    for (key, value) in pairs {
        if !fields.iter().any(|(k, _)| *k == key) {
            fields.push((key.into_owned(), value.into_owned()));
        }
    }
    fields
}
