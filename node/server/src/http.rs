use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use spotgate_common::{
    snapshot, sweep_all, AdmissionController, Error, Job, JobSpec, JobState, MetricSnapshot,
    PricePoint, StateSnapshot,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/metrics", post(record_metric))
        .route("/jobs/:id/start", post(start_job))
        .route("/jobs/:id/halt", post(halt_job))
        .route("/jobs/:id/finish", post(finish_job))
        .route("/jobs/:id/cancel", post(cancel_job))
        .route("/jobs/:id/admission", get(check_admission))
        .route("/sweep", post(sweep_jobs))
        .route("/prices", get(price_history).post(add_price))
        .route("/prices/current", get(current_price))
        .route("/prices/clear", post(clear_prices))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Core error mapped onto an HTTP status
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateId(_) => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NoPriceData => StatusCode::SERVICE_UNAVAILABLE,
            Error::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        };

        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
struct JobResponse {
    job: Job,
    msg: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    msg: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceRequest {
    price: f64,
}

#[derive(Debug, Deserialize)]
struct MetricRequest {
    epoch: u32,
    training: MetricSnapshot,
    validation: Option<MetricSnapshot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    num_epochs: u32,
}

async fn get_state(State(state): State<AppState>) -> Json<StateSnapshot> {
    let registry = state.registry.read().await;
    let oracle = state.oracle.read().await;
    Json(snapshot(&registry, &oracle))
}

async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<JobSpec>, JsonRejection>,
) -> ApiResult<JobResponse> {
    let Json(spec) = payload?;
    let job = state.registry.write().await.create(spec)?;
    let msg = format!("Successfully added job: {}", job.id);

    Ok(Json(JobResponse { job, msg }))
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Job>> {
    let filter = query
        .state
        .as_deref()
        .map(str::parse::<JobState>)
        .transpose()?;

    let registry = state.registry.read().await;
    let jobs = registry
        .list_by_state(|s| filter.map_or(true, |wanted| s == wanted))
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(jobs))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Job> {
    let registry = state.registry.read().await;
    Ok(Json(registry.get(&id)?.clone()))
}

async fn record_metric(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MetricRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(req) = payload?;
    state
        .registry
        .write()
        .await
        .record_metric(&id, req.epoch, req.training, req.validation)?;

    Ok(Json(MessageResponse {
        msg: format!("Successfully added metric for epoch: {}", req.epoch),
    }))
}

async fn start_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<JobResponse> {
    let Json(req) = payload?;
    let job = state.registry.write().await.start(&id, req.num_epochs)?.clone();
    let msg = format!("Successfully started job: {}", job.id);

    Ok(Json(JobResponse { job, msg }))
}

async fn halt_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<JobResponse> {
    set_state(&state, &id, JobState::Halted, "halted").await
}

async fn finish_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<JobResponse> {
    set_state(&state, &id, JobState::Done, "finished").await
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<JobResponse> {
    set_state(&state, &id, JobState::Canceled, "canceled").await
}

async fn set_state(
    state: &AppState,
    id: &str,
    target: JobState,
    verb: &str,
) -> ApiResult<JobResponse> {
    let job = state.registry.write().await.transition(id, target)?.clone();
    let msg = format!("Successfully {} job: {}", verb, job.id);

    Ok(Json(JobResponse { job, msg }))
}

/// 200 when the job may be provisioned now, 400 when the price is too high
async fn check_admission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job = state.registry.read().await.get(&id)?.clone();
    let oracle = state.oracle.read().await;
    let decision = AdmissionController::new(&oracle).evaluate(&job)?;

    let status = if decision.is_admitted() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(decision)).into_response())
}

async fn sweep_jobs(State(state): State<AppState>) -> ApiResult<Vec<Job>> {
    let mut registry = state.registry.write().await;
    Ok(Json(sweep_all(&mut registry)?))
}

async fn price_history(State(state): State<AppState>) -> Json<Vec<PricePoint>> {
    Json(state.oracle.read().await.history())
}

async fn current_price(State(state): State<AppState>) -> ApiResult<PricePoint> {
    let oracle = state.oracle.read().await;
    oracle
        .current_point()
        .map(Json)
        .ok_or(ApiError(Error::NoPriceData))
}

async fn add_price(
    State(state): State<AppState>,
    payload: Result<Json<PriceRequest>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(req) = payload?;
    state.oracle.write().await.add_override(req.price)?;

    Ok(Json(MessageResponse {
        msg: format!("Successfully added price: {}", req.price),
    }))
}

async fn clear_prices(State(state): State<AppState>) -> Json<MessageResponse> {
    state.oracle.write().await.clear_override();

    Json(MessageResponse {
        msg: "Successfully cleared mock price history.".to_string(),
    })
}
