use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::post};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ServerConfig, SolveOptions};
use crate::data::{ProblemInstance, Timetable};
use crate::encoding::Encoding;
use crate::error::TimetableError;
use crate::solver::{self, SolverAdapter};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub instance: ProblemInstance,
    #[serde(default)]
    pub options: SolveOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonEntry {
    pub encoding: Encoding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timetable: Option<Timetable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ApiError(TimetableError);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(TimetableError::invalid(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            TimetableError::InvalidInstance(_) => StatusCode::BAD_REQUEST,
            TimetableError::InfeasibleProblem => StatusCode::UNPROCESSABLE_ENTITY,
            TimetableError::NoSolutionWithinBudget => StatusCode::REQUEST_TIMEOUT,
            TimetableError::InconsistentSolution(_) | TimetableError::SolverError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    solver: Arc<dyn SolverAdapter>,
}

async fn solve_handler(
    State(state): State<AppState>,
    request: Result<Json<SolveRequest>, JsonRejection>,
) -> Result<Json<Timetable>, ApiError> {
    let Json(request) = request?;
    let adapter = Arc::clone(&state.solver);
    let timetable = tokio::task::spawn_blocking(move || {
        solver::solve(&request.instance, &request.options, adapter.as_ref())
    })
    .await
    .map_err(|e| ApiError(TimetableError::SolverError(format!("solver task failed: {e}"))))?
    .map_err(ApiError)?;
    Ok(Json(timetable))
}

async fn compare_handler(
    State(state): State<AppState>,
    request: Result<Json<SolveRequest>, JsonRejection>,
) -> Result<Json<Vec<ComparisonEntry>>, ApiError> {
    let Json(request) = request?;
    let results = solver::solve_all_encodings(
        Arc::new(request.instance),
        request.options,
        Arc::clone(&state.solver),
    )
    .await;
    Ok(Json(
        results
            .into_iter()
            .map(|(encoding, result)| match result {
                Ok(timetable) => ComparisonEntry {
                    encoding,
                    timetable: Some(timetable),
                    error: None,
                },
                Err(e) => ComparisonEntry {
                    encoding,
                    timetable: None,
                    error: Some(e.to_string()),
                },
            })
            .collect(),
    ))
}

pub fn router(solver: Arc<dyn SolverAdapter>) -> Router {
    Router::new()
        .route("/v1/timetable/solve", post(solve_handler))
        .route("/v1/timetable/compare", post(compare_handler))
        .with_state(AppState { solver })
}

pub async fn run_server(
    config: &ServerConfig,
    solver: Arc<dyn SolverAdapter>,
) -> std::io::Result<()> {
    let app = router(solver);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
