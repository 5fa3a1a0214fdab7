use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(FamilyMemberId);
id_newtype!(PlanId);
id_newtype!(IncidentId);
id_newtype!(AmbulanceId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Dispatcher,
    Administrator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub status: PlanStatus,
    pub expiration_date: NaiveDate,
    pub price: f64,
}

impl Plan {
    /// Active plans whose expiration falls on or before `today + days`. A window past the
    /// calendar range has no upper bound.
    pub fn expires_within(&self, today: NaiveDate, days: i64) -> bool {
        if self.status != PlanStatus::Active {
            return false;
        }
        match Duration::try_days(days).and_then(|window| today.checked_add_signed(window)) {
            Some(horizon) => self.expiration_date <= horizon,
            None => days > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanUpdate {
    pub name: String,
    pub status: PlanStatus,
    pub expiration_date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: FamilyMemberId,
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub receive_notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFamilyMember {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    #[serde(default)]
    pub receive_notifications: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalInfo {
    pub blood_type: String,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    pub emergency_contact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub cpf: String,
    pub address: String,
    pub role: Role,
    pub is_validated: bool,
    pub plan: Plan,
    pub family_members: Vec<FamilyMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_info: Option<MedicalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// Account data submitted by an administrator; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub cpf: String,
    pub address: String,
    pub role: Role,
    pub plan: Plan,
    #[serde(default)]
    pub medical_info: Option<MedicalInfo>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn offset_by(self, delta: GeoPoint) -> Self {
        Self {
            latitude: self.latitude + delta.latitude,
            longitude: self.longitude + delta.longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, address: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            address: address.into(),
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Incident lifecycle, declared in operational order. The declaration order is the
/// urgency ranking used by dispatcher views and by forward-only transition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    SosAcionado,
    CentralEmContato,
    CentralAcionada,
    AmbulanciaACaminho,
    AmbulanciaChegou,
    ChegadaLocal,
    PacienteEmbarcado,
    ACaminhoHospital,
    PacienteHospital,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 9] = [
        IncidentStatus::SosAcionado,
        IncidentStatus::CentralEmContato,
        IncidentStatus::CentralAcionada,
        IncidentStatus::AmbulanciaACaminho,
        IncidentStatus::AmbulanciaChegou,
        IncidentStatus::ChegadaLocal,
        IncidentStatus::PacienteEmbarcado,
        IncidentStatus::ACaminhoHospital,
        IncidentStatus::PacienteHospital,
    ];

    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::SosAcionado => "sos_acionado",
            IncidentStatus::CentralEmContato => "central_em_contato",
            IncidentStatus::CentralAcionada => "central_acionada",
            IncidentStatus::AmbulanciaACaminho => "ambulancia_a_caminho",
            IncidentStatus::AmbulanciaChegou => "ambulancia_chegou",
            IncidentStatus::ChegadaLocal => "chegada_local",
            IncidentStatus::PacienteEmbarcado => "paciente_embarcado",
            IncidentStatus::ACaminhoHospital => "a_caminho_hospital",
            IncidentStatus::PacienteHospital => "paciente_hospital",
        }
    }

    /// Operator-facing label shown on the dispatch console.
    pub fn label(self) -> &'static str {
        match self {
            IncidentStatus::SosAcionado => "SOS Acionado",
            IncidentStatus::CentralEmContato => "Central em Contato",
            IncidentStatus::CentralAcionada => "Central Acionada",
            IncidentStatus::AmbulanciaACaminho => "Ambulância a Caminho",
            IncidentStatus::AmbulanciaChegou => "Ambulância Chegou",
            IncidentStatus::ChegadaLocal => "Chegada ao Local",
            IncidentStatus::PacienteEmbarcado => "Paciente Embarcado",
            IncidentStatus::ACaminhoHospital => "A Caminho do Hospital",
            IncidentStatus::PacienteHospital => "Paciente no Hospital",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == IncidentStatus::PacienteHospital
    }

    pub fn next(self) -> Option<IncidentStatus> {
        Self::ALL.get(self.rank() as usize + 1).copied()
    }

    pub fn is_forward_to(self, other: IncidentStatus) -> bool {
        other.rank() > self.rank()
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| format!("unknown incident status '{raw}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentUpdate {
    pub status: IncidentStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub current_location: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_location: Option<Location>,
    pub path: Vec<GeoPoint>,
}

impl Tracking {
    pub fn starting_at(origin: GeoPoint) -> Self {
        Self {
            current_location: origin,
            destination_location: None,
            path: vec![origin],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub user_id: UserId,
    pub user_name: String,
    pub status: IncidentStatus,
    pub location: Location,
    pub timestamp: DateTime<Utc>,
    pub updates: Vec<IncidentUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambulance_id: Option<AmbulanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    pub tracking: Tracking,
}

impl Incident {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn last_update(&self) -> Option<&IncidentUpdate> {
        self.updates.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbulanceStatus {
    Available,
    Busy,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambulance {
    pub id: AmbulanceId,
    pub plate: String,
    pub status: AmbulanceStatus,
    pub location: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_incident_id: Option<IncidentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<UserId>,
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
