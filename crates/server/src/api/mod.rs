use axum::{http::StatusCode, Json};
use chrono::NaiveDate;
use shared::{
    domain::{
        Ambulance, AmbulanceId, AmbulanceStatus, GeoPoint, Incident, IncidentId, IncidentStatus,
        User, UserId,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        AssignAmbulanceRequest, AssignHospitalRequest, DispatchSummary, IncidentSearchQuery,
        UserSearchQuery,
    },
};
use store::{views, CoordinationStore};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub store: CoordinationStore,
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::InvalidTransition | ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn reject(error: impl Into<ApiError>) -> (StatusCode, Json<ApiError>) {
    let error = error.into();
    (status_for(error.code), Json(error))
}

pub fn current_session(ctx: &ApiContext) -> Result<User, ApiError> {
    ctx.store
        .current_user()
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "no active session"))
}

pub fn dispatch_queue(ctx: &ApiContext, filter: Option<IncidentStatus>) -> Vec<Incident> {
    let incidents = ctx.store.incidents();
    views::dispatch_queue(&incidents, filter)
        .into_iter()
        .cloned()
        .collect()
}

pub fn dispatch_summary(ctx: &ApiContext) -> DispatchSummary {
    views::dispatch_summary(&ctx.store.incidents(), &ctx.store.ambulances())
}

pub fn search_incidents(
    ctx: &ApiContext,
    query: &IncidentSearchQuery,
) -> Result<Vec<Incident>, ApiError> {
    let statuses = query
        .status
        .as_deref()
        .map(parse_statuses)
        .transpose()?
        .unwrap_or_default();
    let incidents = ctx.store.incidents();
    Ok(views::search_incidents(
        &incidents,
        query.q.as_deref().unwrap_or_default(),
        &statuses,
        query.sort,
    )
    .into_iter()
    .cloned()
    .collect())
}

fn parse_statuses(raw: &str) -> Result<Vec<IncidentStatus>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<IncidentStatus>()
                .map_err(|message| ApiError::new(ErrorCode::Validation, message))
        })
        .collect()
}

pub fn search_users(ctx: &ApiContext, query: &UserSearchQuery) -> Vec<User> {
    let users = ctx.store.users();
    views::search_users(
        &users,
        query.q.as_deref().unwrap_or_default(),
        query.validated,
        query.plan_status,
    )
    .into_iter()
    .cloned()
    .collect()
}

pub fn incidents_for_user(ctx: &ApiContext, user_id: &UserId) -> Result<Vec<Incident>, ApiError> {
    if ctx.store.user(user_id).is_none() {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("user {user_id} not found"),
        ));
    }
    let incidents = ctx.store.incidents();
    Ok(views::incidents_for_user(&incidents, user_id)
        .into_iter()
        .cloned()
        .collect())
}

pub fn expiring_plans(ctx: &ApiContext, today: NaiveDate, days: i64) -> Result<Vec<User>, ApiError> {
    if days < 0 {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "days must not be negative",
        ));
    }
    let users = ctx.store.users();
    Ok(views::users_with_expiring_plans(&users, today, days)
        .into_iter()
        .cloned()
        .collect())
}

pub fn assign_ambulance(
    ctx: &ApiContext,
    incident_id: &IncidentId,
    req: AssignAmbulanceRequest,
) -> Result<Incident, ApiError> {
    Ok(ctx
        .store
        .assign_ambulance_to_incident(incident_id, &req.ambulance_id, req.eta_minutes)?)
}

pub fn assign_hospital(
    ctx: &ApiContext,
    incident_id: &IncidentId,
    req: AssignHospitalRequest,
) -> Result<Incident, ApiError> {
    Ok(ctx
        .store
        .assign_hospital_to_incident(incident_id, &req.hospital_name)?)
}

pub fn move_ambulance(
    ctx: &ApiContext,
    ambulance_id: &AmbulanceId,
    position: GeoPoint,
) -> Result<Ambulance, ApiError> {
    if !position.latitude.is_finite() || !position.longitude.is_finite() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "position must have finite coordinates",
        ));
    }
    Ok(ctx.store.update_ambulance_position(ambulance_id, position)?)
}

pub fn set_ambulance_status(
    ctx: &ApiContext,
    ambulance_id: &AmbulanceId,
    status: AmbulanceStatus,
) -> Result<Ambulance, ApiError> {
    Ok(ctx.store.update_ambulance_status(ambulance_id, status)?)
}

/// Logs every store event until the store is dropped.
pub fn spawn_event_log(store: &CoordinationStore) -> JoinHandle<()> {
    let mut events = store.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(event = %json, "store event"),
                    Err(error) => debug!(?event, %error, "store event not serializable"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event log fell behind the store");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
