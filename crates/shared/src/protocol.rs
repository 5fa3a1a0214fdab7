use serde::{Deserialize, Serialize};

use crate::domain::{
    Ambulance, AmbulanceId, AmbulanceStatus, GeoPoint, Incident, IncidentId, IncidentStatus,
    Location, PlanStatus, User, UserId,
};

/// Published once per successful store mutation, in the order mutations were applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StoreEvent {
    SessionStarted {
        user_id: UserId,
    },
    SessionEnded {
        user_id: UserId,
    },
    IncidentCreated {
        incident_id: IncidentId,
        user_id: UserId,
    },
    IncidentStatusChanged {
        incident_id: IncidentId,
        from: IncidentStatus,
        to: IncidentStatus,
    },
    AmbulanceAssigned {
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
        eta_minutes: u32,
    },
    HospitalAssigned {
        incident_id: IncidentId,
        hospital_name: String,
    },
    AmbulanceMoved {
        ambulance_id: AmbulanceId,
        position: GeoPoint,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        incident_id: Option<IncidentId>,
    },
    AmbulanceStatusChanged {
        ambulance_id: AmbulanceId,
        status: AmbulanceStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        released_incident_id: Option<IncidentId>,
    },
    UserCreated {
        user_id: UserId,
    },
    UserUpdated {
        user_id: UserId,
    },
    PasswordResetRequested {
        user_id: UserId,
    },
}

/// Point-in-time copy of every collection the store owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub users: Vec<User>,
    pub incidents: Vec<Incident>,
    pub ambulances: Vec<Ambulance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub active_incidents: usize,
    pub awaiting_dispatch: usize,
    pub available_ambulances: usize,
    pub total_ambulances: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSosRequest {
    pub location: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateIncidentStatusRequest {
    pub status: IncidentStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignAmbulanceRequest {
    pub ambulance_id: AmbulanceId,
    pub eta_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignHospitalRequest {
    pub hospital_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAmbulanceStatusRequest {
    pub status: AmbulanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchQueueQuery {
    #[serde(default)]
    pub status: Option<IncidentStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Admin incident search. `status` is a comma-separated list of status wire names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentSearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sort: SortDirection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub validated: Option<bool>,
    #[serde(default)]
    pub plan_status: Option<PlanStatus>,
}
