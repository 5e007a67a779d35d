//! External interface (spec §6): the two RPCs (`Index`, `Search`) exposed
//! over HTTP+JSON via `axum`, since wire framing is named out of the core's
//! scope and left to a transport collaborator.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::queue::WorkQueue;
use crate::ranker;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub queue: Arc<WorkQueue>,
    pub reindex_duration: Duration,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/index", post(index))
        .route("/v1/search", get(search))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `addr`. With `tls`, terminates TLS via `axum-server`'s
/// rustls acceptor; without it, listens in plaintext.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    tls: Option<(PathBuf, PathBuf)>,
) -> std::io::Result<()> {
    match tls {
        Some((cert, key)) => {
            let config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("invalid TLS cert/key pair");
            axum_server::bind_rustls(addr, config)
                .serve(router.into_make_service())
                .await
        }
        None => axum_server::bind(addr).serve(router.into_make_service()).await,
    }
}

#[derive(Deserialize)]
struct IndexRequest {
    origin: String,
    k: u32,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// `POST /v1/index` — spec §6 `Index(origin_url, k)`. Enqueues the seed task
/// and returns immediately; crawling happens asynchronously.
async fn index(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    state
        .queue
        .add(&req.origin, &req.origin, 0, req.k as i64, state.reindex_duration)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    triples: Vec<Triple>,
}

#[derive(Serialize)]
struct Triple {
    relevant_url: String,
    origin_urls: Vec<String>,
    depth: i64,
}

/// `GET /v1/search?q=` — spec §6 `Search(query)`. 404 on no match.
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ErrorBody>)> {
    match ranker::search(&state.storage, &params.q).await {
        Ok(response) => Ok(Json(SearchResponse {
            triples: response
                .pages
                .into_iter()
                .map(|p| Triple {
                    relevant_url: p.relevant_url,
                    origin_urls: p.origin_urls,
                    depth: p.depth,
                })
                .collect(),
        })),
        Err(Error::NotFound) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "no results found".to_string(),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn internal_error(e: Error) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody { error: e.to_string() }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> AppState {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let queue = Arc::new(WorkQueue::new(storage.clone()));
        AppState {
            storage,
            queue,
            reindex_duration: Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let router = create_router(state());
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn search_on_empty_index_returns_404() {
        let router = create_router(state());
        let response = router
            .oneshot(
                Request::get("/v1/search?q=hello")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn index_returns_202_accepted() {
        let router = create_router(state());
        let response = router
            .oneshot(
                Request::post("/v1/index")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"origin":"http://a/","k":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
