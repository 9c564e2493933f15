// Axum request handlers: translate rider app HTTP calls into coordinator operations.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::engine::coordinator::SessionCoordinator;
use crate::engine::error::{ErrorKind, RentalError};
use crate::engine::rental::{RentalType, SafetyChecklist};
use crate::engine::snapshot::{RideReceipt, SessionSnapshot};
use crate::lock::traits::WheelLockState;

pub type SharedCoordinator = Arc<SessionCoordinator>;

pub struct RideServer {
    addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl RideServer {
    /// Bind `addr` (use port 0 for a random port) and serve in the background.
    pub async fn start(coordinator: SharedCoordinator, addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = router(coordinator);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        info!("ride server listening on {}", addr);
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build a URL for the given API path.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Shutdown the server gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub fn router(coordinator: SharedCoordinator) -> Router {
    Router::new()
        .route("/session", get(session_handler))
        .route("/bikes", get(bikes_handler))
        .route("/stats", get(stats_handler))
        .route("/rental", post(begin_handler).delete(cancel_handler))
        .route("/rental/reassign", post(reassign_handler))
        .route("/rental/checklist", post(checklist_handler))
        .route("/rental/chain/unlock", post(unlock_chain_handler))
        .route("/rental/chain/confirm", post(confirm_chain_handler))
        .route("/rental/wheel/unlock", post(unlock_wheel_handler))
        .route("/rental/wheel/toggle", post(toggle_wheel_handler))
        .route("/rental/end", post(attempt_end_handler))
        .route("/rental/end/finalize", post(finalize_end_handler))
        .with_state(coordinator)
}

#[derive(Debug, Deserialize)]
pub struct BeginRequest {
    pub rental_type: RentalType,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmChainRequest {
    pub confirmed: bool,
}

/// Query for `/rental/end/finalize`. Without `verified` the lock controller
/// is asked.
#[derive(Debug, Default, Deserialize)]
pub struct FinalizeQuery {
    pub verified: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ToggleResponse {
    wheel_lock: WheelLockState,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorKind,
    message: String,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Precondition => StatusCode::CONFLICT,
        ErrorKind::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::VerificationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::External => StatusCode::BAD_GATEWAY,
        ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RentalError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!("rental operation failed: {}", self);
        } else {
            debug!("rental operation rejected: {}", self);
        }
        let body = ErrorBody {
            error: kind,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, RentalError>;

async fn session_handler(State(c): State<SharedCoordinator>) -> impl IntoResponse {
    Json(c.snapshot())
}

async fn bikes_handler(State(c): State<SharedCoordinator>) -> impl IntoResponse {
    Json(c.list_available_bikes())
}

async fn stats_handler(State(c): State<SharedCoordinator>) -> impl IntoResponse {
    Json(c.stats())
}

async fn begin_handler(
    State(c): State<SharedCoordinator>,
    Json(req): Json<BeginRequest>,
) -> Result<impl IntoResponse, RentalError> {
    let snapshot = c.begin_rental(req.rental_type)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn reassign_handler(
    State(c): State<SharedCoordinator>,
    Json(req): Json<ReassignRequest>,
) -> ApiResult<SessionSnapshot> {
    Ok(Json(c.request_different_bike(&req.reason)?))
}

async fn checklist_handler(
    State(c): State<SharedCoordinator>,
    Json(checklist): Json<SafetyChecklist>,
) -> ApiResult<SessionSnapshot> {
    Ok(Json(c.complete_checklist(checklist)?))
}

async fn unlock_chain_handler(State(c): State<SharedCoordinator>) -> ApiResult<SessionSnapshot> {
    Ok(Json(c.unlock_chain()?))
}

async fn confirm_chain_handler(
    State(c): State<SharedCoordinator>,
    Json(req): Json<ConfirmChainRequest>,
) -> ApiResult<SessionSnapshot> {
    Ok(Json(c.confirm_chain_secured(req.confirmed)?))
}

async fn unlock_wheel_handler(State(c): State<SharedCoordinator>) -> ApiResult<SessionSnapshot> {
    Ok(Json(c.unlock_wheel()?))
}

async fn toggle_wheel_handler(State(c): State<SharedCoordinator>) -> ApiResult<ToggleResponse> {
    let wheel_lock = c.toggle_wheel_lock()?;
    Ok(Json(ToggleResponse { wheel_lock }))
}

async fn attempt_end_handler(State(c): State<SharedCoordinator>) -> ApiResult<SessionSnapshot> {
    Ok(Json(c.attempt_end_ride()?))
}

async fn finalize_end_handler(
    State(c): State<SharedCoordinator>,
    Query(query): Query<FinalizeQuery>,
) -> ApiResult<RideReceipt> {
    let receipt = match query.verified {
        Some(verified) => c.finalize_end_ride_with(verified)?,
        None => c.finalize_end_ride()?,
    };
    Ok(Json(receipt))
}

async fn cancel_handler(State(c): State<SharedCoordinator>) -> ApiResult<SessionSnapshot> {
    Ok(Json(c.cancel_rental()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(RentalError::NoBikesAvailable.kind()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(RentalError::CannotCancelWhileRiding.kind()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(RentalError::NotVerified.kind()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(
                RentalError::BikeNotFound {
                    bike_id: "X".into()
                }
                .kind()
            ),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_begin_request_parses_rental_type() {
        let req: BeginRequest = serde_json::from_str(r#"{"rental_type":"commuter"}"#).unwrap();
        assert_eq!(req.rental_type, RentalType::Commuter);
    }
}
