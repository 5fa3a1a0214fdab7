use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use shared::{
    domain::{
        Ambulance, AmbulanceId, FamilyMember, FamilyMemberId, GeoPoint, Incident, IncidentId,
        MedicalInfo, NewFamilyMember, NewUser, Plan, PlanUpdate, User, UserId, UserProfileUpdate,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        AssignAmbulanceRequest, AssignHospitalRequest, DispatchQueueQuery, DispatchSummary,
        IncidentSearchQuery, LoginRequest, PasswordResetRequest, Snapshot, TriggerSosRequest,
        UpdateAmbulanceStatusRequest, UpdateIncidentStatusRequest, UserSearchQuery,
    },
};
use store::{views::DEFAULT_EXPIRY_WINDOW_DAYS, CoordinationStore};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::{reject, ApiContext};
use app_state::AppState;
use config::load_settings;

type HttpResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct ExpiringPlansQuery {
    days: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let store_settings = settings.store_settings();
    let store = if settings.seed_mock_data {
        CoordinationStore::seeded(store_settings)
    } else {
        CoordinationStore::new(store_settings)
    };
    info!(
        policy = ?store.settings().transition_policy,
        latency_ms = settings.simulated_latency_ms,
        seeded = settings.seed_mock_data,
        "coordination store ready"
    );
    let _event_log = api::spawn_event_log(&store);

    let state = AppState {
        api: ApiContext { store },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/session",
            post(login).get(current_session).delete(logout),
        )
        .route("/snapshot", get(snapshot))
        .route("/incidents", get(list_incidents))
        .route("/incidents/sos", post(trigger_sos))
        .route("/incidents/:incident_id", get(get_incident))
        .route("/incidents/:incident_id/status", post(update_incident_status))
        .route("/incidents/:incident_id/ambulance", post(assign_ambulance))
        .route("/incidents/:incident_id/hospital", post(assign_hospital))
        .route("/ambulances", get(list_ambulances))
        .route("/ambulances/:ambulance_id", get(get_ambulance))
        .route("/ambulances/:ambulance_id/position", post(move_ambulance))
        .route("/ambulances/:ambulance_id/status", post(set_ambulance_status))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:user_id", get(get_user))
        .route("/users/:user_id/validate", post(validate_user))
        .route("/users/:user_id/family", post(add_family_member))
        .route(
            "/users/:user_id/family/:member_id",
            delete(remove_family_member),
        )
        .route("/users/:user_id/profile", patch(update_profile))
        .route("/users/:user_id/medical", put(update_medical_info))
        .route("/users/:user_id/plan", put(update_plan))
        .route("/users/:user_id/incidents", get(user_incidents))
        .route("/password-reset", post(request_password_reset))
        .route("/dispatch/queue", get(dispatch_queue))
        .route("/dispatch/summary", get(dispatch_summary))
        .route("/plans/expiring", get(expiring_plans))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn not_found(what: &str, id: impl std::fmt::Display) -> (StatusCode, Json<ApiError>) {
    reject(ApiError::new(
        ErrorCode::NotFound,
        format!("{what} {id} not found"),
    ))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> HttpResult<Json<User>> {
    let user = state
        .api
        .store
        .login(&req.email, &req.password)
        .await
        .map_err(reject)?;
    Ok(Json(user))
}

async fn current_session(State(state): State<Arc<AppState>>) -> HttpResult<Json<User>> {
    api::current_session(&state.api).map(Json).map_err(reject)
}

async fn logout(State(state): State<Arc<AppState>>) -> HttpResult<StatusCode> {
    state.api.store.logout().map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn snapshot(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.api.store.snapshot())
}

async fn list_incidents(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IncidentSearchQuery>,
) -> HttpResult<Json<Vec<Incident>>> {
    api::search_incidents(&state.api, &q)
        .map(Json)
        .map_err(reject)
}

async fn trigger_sos(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TriggerSosRequest>,
) -> HttpResult<(StatusCode, Json<Incident>)> {
    let incident = state
        .api
        .store
        .trigger_sos(req.location)
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(incident)))
}

async fn get_incident(
    State(state): State<Arc<AppState>>,
    Path(incident_id): Path<IncidentId>,
) -> HttpResult<Json<Incident>> {
    state
        .api
        .store
        .incident(&incident_id)
        .map(Json)
        .ok_or_else(|| not_found("incident", &incident_id))
}

async fn update_incident_status(
    State(state): State<Arc<AppState>>,
    Path(incident_id): Path<IncidentId>,
    Json(req): Json<UpdateIncidentStatusRequest>,
) -> HttpResult<Json<Incident>> {
    let incident = state
        .api
        .store
        .update_incident_status(&incident_id, req.status, req.note)
        .map_err(reject)?;
    Ok(Json(incident))
}

async fn assign_ambulance(
    State(state): State<Arc<AppState>>,
    Path(incident_id): Path<IncidentId>,
    Json(req): Json<AssignAmbulanceRequest>,
) -> HttpResult<Json<Incident>> {
    api::assign_ambulance(&state.api, &incident_id, req)
        .map(Json)
        .map_err(reject)
}

async fn assign_hospital(
    State(state): State<Arc<AppState>>,
    Path(incident_id): Path<IncidentId>,
    Json(req): Json<AssignHospitalRequest>,
) -> HttpResult<Json<Incident>> {
    api::assign_hospital(&state.api, &incident_id, req)
        .map(Json)
        .map_err(reject)
}

async fn list_ambulances(State(state): State<Arc<AppState>>) -> Json<Vec<Ambulance>> {
    Json(state.api.store.ambulances())
}

async fn get_ambulance(
    State(state): State<Arc<AppState>>,
    Path(ambulance_id): Path<AmbulanceId>,
) -> HttpResult<Json<Ambulance>> {
    state
        .api
        .store
        .ambulance(&ambulance_id)
        .map(Json)
        .ok_or_else(|| not_found("ambulance", &ambulance_id))
}

async fn move_ambulance(
    State(state): State<Arc<AppState>>,
    Path(ambulance_id): Path<AmbulanceId>,
    Json(position): Json<GeoPoint>,
) -> HttpResult<Json<Ambulance>> {
    api::move_ambulance(&state.api, &ambulance_id, position)
        .map(Json)
        .map_err(reject)
}

async fn set_ambulance_status(
    State(state): State<Arc<AppState>>,
    Path(ambulance_id): Path<AmbulanceId>,
    Json(req): Json<UpdateAmbulanceStatusRequest>,
) -> HttpResult<Json<Ambulance>> {
    api::set_ambulance_status(&state.api, &ambulance_id, req.status)
        .map(Json)
        .map_err(reject)
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserSearchQuery>,
) -> Json<Vec<User>> {
    Json(api::search_users(&state.api, &q))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewUser>,
) -> HttpResult<(StatusCode, Json<User>)> {
    let user = state.api.store.create_user(req).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> HttpResult<Json<User>> {
    state
        .api
        .store
        .user(&user_id)
        .map(Json)
        .ok_or_else(|| not_found("user", &user_id))
}

async fn validate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> HttpResult<Json<User>> {
    let user = state.api.store.validate_user(&user_id).map_err(reject)?;
    Ok(Json(user))
}

async fn add_family_member(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
    Json(req): Json<NewFamilyMember>,
) -> HttpResult<(StatusCode, Json<FamilyMember>)> {
    let member = state
        .api
        .store
        .add_family_member(&user_id, req)
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn remove_family_member(
    State(state): State<Arc<AppState>>,
    Path((user_id, member_id)): Path<(UserId, FamilyMemberId)>,
) -> HttpResult<StatusCode> {
    state
        .api
        .store
        .remove_family_member(&user_id, &member_id)
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
    Json(req): Json<UserProfileUpdate>,
) -> HttpResult<Json<User>> {
    let user = state
        .api
        .store
        .update_user_profile(&user_id, req)
        .map_err(reject)?;
    Ok(Json(user))
}

async fn update_medical_info(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
    Json(req): Json<MedicalInfo>,
) -> HttpResult<Json<User>> {
    let user = state
        .api
        .store
        .update_user_medical_info(&user_id, req)
        .map_err(reject)?;
    Ok(Json(user))
}

async fn update_plan(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
    Json(req): Json<PlanUpdate>,
) -> HttpResult<Json<Plan>> {
    let plan = state
        .api
        .store
        .update_user_plan(&user_id, req)
        .map_err(reject)?;
    Ok(Json(plan))
}

async fn user_incidents(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> HttpResult<Json<Vec<Incident>>> {
    api::incidents_for_user(&state.api, &user_id)
        .map(Json)
        .map_err(reject)
}

async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> HttpResult<StatusCode> {
    state
        .api
        .store
        .reset_password_request(&req.email)
        .await
        .map_err(reject)?;
    Ok(StatusCode::ACCEPTED)
}

async fn dispatch_queue(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DispatchQueueQuery>,
) -> Json<Vec<Incident>> {
    Json(api::dispatch_queue(&state.api, q.status))
}

async fn dispatch_summary(State(state): State<Arc<AppState>>) -> Json<DispatchSummary> {
    Json(api::dispatch_summary(&state.api))
}

async fn expiring_plans(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ExpiringPlansQuery>,
) -> HttpResult<Json<Vec<User>>> {
    let days = q.days.unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS);
    api::expiring_plans(&state.api, Utc::now().date_naive(), days)
        .map(Json)
        .map_err(reject)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
