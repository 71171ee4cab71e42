//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fund_ledger::{
    Block, ContractorAccount, Ledger, LedgerError, MilestoneRelease, NewProject, PaymentOutcome,
    Project, ProjectSnapshot,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;

use crate::auth::{Caller, Capability, Role};

pub struct ApiState {
    pub ledger: Arc<Ledger>,
    /// Wakes the journal after every committed operation.
    pub journal: Arc<Notify>,
    pub default_milestones: Vec<String>,
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub project_id: String,
    pub name: String,
    pub budget: Decimal,
    pub contractor: String,
    #[serde(default)]
    pub milestones: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub recipient: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub project: Project,
    pub contractor: ContractorAccount,
}

#[derive(Serialize)]
pub struct ProjectsResponse {
    pub count: usize,
    pub projects: Vec<ProjectSnapshot>,
}

#[derive(Serialize)]
pub struct ChainResponse {
    pub count: usize,
    pub blocks: Vec<Block>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ─────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("role '{}' may not {capability:?}", .role.as_str())]
    Forbidden { role: Role, capability: Capability },

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("ledger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::UnknownRole(_) => StatusCode::UNAUTHORIZED,
            ApiError::Ledger(e) => match e {
                LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::DuplicateProject(_) | LedgerError::AllMilestonesCompleted(_) => {
                    StatusCode::CONFLICT
                }
                LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                LedgerError::ChainIntegrity(_)
                | LedgerError::Replay { .. }
                | LedgerError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a mutating ledger operation off the async workers. These take the
/// project lock and payments also fit the isolation forest.
async fn on_ledger<T, F>(state: &ApiState, op: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Ledger) -> fund_ledger::Result<T> + Send + 'static,
{
    let ledger = Arc::clone(&state.ledger);
    let result = tokio::task::spawn_blocking(move || op(&ledger)).await??;
    state.journal.notify_one();
    Ok(result)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /projects`
pub async fn list_projects(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
) -> ApiResult<Json<ProjectsResponse>> {
    caller.require(Capability::ViewLedger)?;
    let projects = state.ledger.list_projects();
    Ok(Json(ProjectsResponse {
        count: projects.len(),
        projects,
    }))
}

/// `POST /projects`
///
/// Registers a project and its contractor. Omitted milestones fall back to
/// the configured defaults.
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    caller.require(Capability::CreateProject)?;
    let milestones = if request.milestones.is_empty() {
        state.default_milestones.clone()
    } else {
        request.milestones
    };

    let new_project = NewProject {
        id: request.project_id,
        name: request.name,
        budget: request.budget,
        contractor: request.contractor,
        milestones,
    };
    let (project, contractor) =
        on_ledger(&state, move |ledger| ledger.create_project(new_project)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            project,
            contractor,
        }),
    ))
}

/// `GET /projects/:id`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ProjectSnapshot>> {
    caller.require(Capability::ViewLedger)?;
    Ok(Json(state.ledger.get_project(&project_id)?))
}

/// `POST /projects/:id/release`
///
/// Completes the next pending milestone and credits the contractor.
pub async fn release_milestone(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(project_id): Path<String>,
) -> ApiResult<Json<MilestoneRelease>> {
    caller.require(Capability::ReleaseMilestone)?;
    let release =
        on_ledger(&state, move |ledger| ledger.release_next_milestone(&project_id)).await?;
    Ok(Json(release))
}

/// `POST /projects/:id/payments`
pub async fn make_payment(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
    Path(project_id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> ApiResult<Json<PaymentOutcome>> {
    caller.require(Capability::MakePayment)?;
    let outcome = on_ledger(&state, move |ledger| {
        ledger.make_payment(&project_id, &request.recipient, request.amount)
    })
    .await?;
    Ok(Json(outcome))
}

/// `GET /chain`
pub async fn get_chain(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
) -> ApiResult<Json<ChainResponse>> {
    caller.require(Capability::ViewLedger)?;
    let blocks = state.ledger.get_chain();
    Ok(Json(ChainResponse {
        count: blocks.len(),
        blocks,
    }))
}

/// `GET /chain/validate`
///
/// Runs a full integrity audit; a failure is logged at error level.
pub async fn validate_chain(
    State(state): State<Arc<ApiState>>,
    caller: Caller,
) -> ApiResult<Json<ValidateResponse>> {
    caller.require(Capability::ViewLedger)?;
    let valid = state.ledger.audit().is_ok();
    Ok(Json(ValidateResponse {
        valid,
        length: state.ledger.chain_len(),
    }))
}
