use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use warp::http::{StatusCode, header};
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::agent::Agent;
use crate::protocol::ChatRequest;

/// Largest request body accepted by `/chat`.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

fn with_agent(agent: Arc<Agent>) -> impl Filter<Extract = (Arc<Agent>,), Error = Infallible> + Clone {
    warp::any().map(move || agent.clone())
}

/// All gateway routes: `POST /chat` and `GET /health`.
pub fn routes(agent: Arc<Agent>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let chat = warp::path("chat")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_agent(agent))
        .and_then(handle_chat);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    chat.or(health)
        .with(warp::trace::request())
        .recover(handle_rejection)
}

fn json_error(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status).into_response()
}

fn wants_stream(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

async fn handle_chat(
    content_type: Option<String>,
    body: Bytes,
    agent: Arc<Agent>,
) -> Result<Response, Rejection> {
    // Bodies are JSON whatever the declared content type
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejecting malformed chat request");
            return Ok(json_error(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {e}"),
            ));
        }
    };
    if request.message.trim().is_empty() {
        return Ok(json_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    if !wants_stream(content_type.as_deref()) {
        let reply = agent.handle_buffered(request).await;
        return Ok(warp::reply::json(&reply).into_response());
    }

    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(64);
    tokio::spawn(async move {
        agent.handle_stream(request, tx).await;
    });

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });

    let mut resp = Response::new(Body::wrap_stream(stream));
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    Ok(resp)
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found")
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "content length required")
    } else {
        warn!(?rejection, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    };
    Ok(json_error(status, message))
}
