use std::net::SocketAddr;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler;
use crate::api::middleware::cors::cors_layer;
use crate::api::middleware::verify_internal::verify_internal_ident;
use crate::db::prelude::*;
use crate::rewards::RewardsError;
use crate::util::env::{EnvErr, Var};
use crate::var;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub db_pool: &'static PgPool,
}

#[instrument(skip(tx))]
pub async fn router(tx: UnboundedSender<SocketAddr>) -> Result<(), RouteError> {
    let state = Arc::new(AppState {
        db_pool: db_pool().await?,
    });

    //
    // write path: trusted internal callers only
    let internal_post_routes = Router::new()
        .route("/rewards/award", post(handler::award_points))
        .route("/challenges/progress", post(handler::record_progress))
        .route_layer(middleware::from_fn(verify_internal_ident));

    let allow_origins = var!(Var::CorsAllowOrigins).await?;

    let app = Router::new()
        .merge(internal_post_routes)
        //
        // general
        .route("/", get(|| async { Response::new(Body::empty()) }))
        //
        // rewards reads
        .route("/rewards/dashboard/{user_id}", get(handler::dashboard))
        .route("/rewards/history/{user_id}", get(handler::history))
        //
        // challenge reads
        .route(
            "/challenges/today/{user_id}",
            get(handler::today_challenges),
        )
        .layer(cors_layer(allow_origins))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .with_state(state);

    let port = var!(Var::ServerApiPort)
        .await?
        .parse::<u16>()
        .map_err(|_| RouteError::InvalidPort)?;

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    tx.send(socket_addr).ok();
    axum::serve(listener, app).await?;

    Ok(())
}

/// Custom error trace handler for `RouteError`-type responses
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument(skip(tx, rx))]
pub async fn start_server(
    tx: UnboundedSender<SocketAddr>,
    mut rx: UnboundedReceiver<SocketAddr>,
) -> Result<Vec<JoinHandle<()>>, RouteError> {
    tracing::info!("starting server");
    let server_handle = tokio::task::spawn(async move {
        if let Err(e) = router(tx).await {
            tracing::error!(error = ?e, "api server exited");
        }
    });

    let logging_handle = tokio::task::spawn(async move {
        while !rx.is_closed() {
            if let Some(msg) = rx.recv().await {
                tracing::info!(
                    server_url = &format!("http://127.0.0.1:{}", msg.port()),
                    "server ready"
                );
                break;
            }
        }
    });

    let handles = vec![server_handle, logging_handle];
    Ok(handles)
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Rewards(#[from] RewardsError),

    #[error(transparent)]
    QueryError(#[from] PgError),

    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    EnvError(#[from] EnvErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("SERVER_API_PORT is not a valid port number")]
    InvalidPort,
}

/// Connectivity-shaped store failures are retryable by the caller; the
/// service itself never retries
fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message, err) = match &self {
            RouteError::Rewards(RewardsError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }

            RouteError::Rewards(RewardsError::ChallengeNotFound(id)) => (
                StatusCode::NOT_FOUND,
                format!("no active challenge with id '{id}'"),
                None,
            ),

            RouteError::Rewards(RewardsError::Store(e)) if is_transient(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                String::from("store temporarily unavailable, retry the call"),
                Some(self),
            ),

            RouteError::Rewards(RewardsError::Store(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                Some(self),
            ),

            RouteError::SqlxError(e) if is_transient(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                String::from("store temporarily unavailable, retry the call"),
                Some(self),
            ),

            RouteError::SqlxError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                Some(self),
            ),

            RouteError::QueryError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                Some(self),
            ),

            RouteError::EnvError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                Some(self),
            ),

            RouteError::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                Some(self),
            ),

            RouteError::InvalidPort => (
                StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
                Some(self),
            ),
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        if let Some(err) = err {
            response.extensions_mut().insert(Arc::new(err));
        }

        response
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = RouteError::Rewards(RewardsError::Validation("points must be non-zero".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_challenge_maps_to_not_found() {
        let err = RouteError::Rewards(RewardsError::ChallengeNotFound(uuid::Uuid::nil()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_transient_store_error_maps_to_service_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = RouteError::Rewards(RewardsError::Store(sqlx::Error::Io(io)));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
