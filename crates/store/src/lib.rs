use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use shared::{
    domain::{
        Ambulance, AmbulanceId, AmbulanceStatus, FamilyMember, FamilyMemberId, GeoPoint,
        Incident, IncidentId, IncidentStatus, IncidentUpdate, Location, MedicalInfo, NewFamilyMember,
        NewUser, Plan, PlanUpdate, Tracking, User, UserId, UserProfileUpdate,
    },
    protocol::{Snapshot, StoreEvent},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod clock;
pub mod consistency;
pub mod error;
pub mod seed;
pub mod settings;
pub mod views;

pub use clock::{Clock, Latency, ManualClock, NoLatency, SimulatedLatency, SystemClock};
pub use consistency::Violation;
pub use error::{EntityKind, StoreError};
pub use seed::Dataset;
pub use settings::{StoreSettings, TransitionPolicy};

/// Single owner of users, incidents and ambulances.
///
/// Handles are cheap to clone and all share one state. Every mutation runs under one
/// lock, validates before writing, and publishes its [`StoreEvent`] before the lock is
/// released, so subscribers see events in the order mutations were applied.
#[derive(Clone)]
pub struct CoordinationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: Mutex<StoreState>,
    events: broadcast::Sender<StoreEvent>,
    clock: Arc<dyn Clock>,
    latency: Arc<dyn Latency>,
    settings: StoreSettings,
}

struct StoreState {
    version: u64,
    session: Option<UserId>,
    users: Vec<User>,
    incidents: Vec<Incident>,
    ambulances: Vec<Ambulance>,
}

impl StoreState {
    fn user_index(&self, user_id: &UserId) -> Result<usize, StoreError> {
        self.users
            .iter()
            .position(|user| user.id == *user_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::User, user_id))
    }

    fn incident_index(&self, incident_id: &IncidentId) -> Result<usize, StoreError> {
        self.incidents
            .iter()
            .position(|incident| incident.id == *incident_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Incident, incident_id))
    }

    fn ambulance_index(&self, ambulance_id: &AmbulanceId) -> Result<usize, StoreError> {
        self.ambulances
            .iter()
            .position(|ambulance| ambulance.id == *ambulance_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Ambulance, ambulance_id))
    }

    fn user_by_email(&self, email: &str) -> Option<usize> {
        let email = email.trim();
        self.users
            .iter()
            .position(|user| user.email.eq_ignore_ascii_case(email))
    }
}

impl CoordinationStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self::with_dataset(settings, Dataset::default())
    }

    /// Store preloaded with the demo fleet and accounts.
    pub fn seeded(settings: StoreSettings) -> Self {
        Self::with_dataset(settings, seed::mock_dataset())
    }

    pub fn with_dataset(settings: StoreSettings, dataset: Dataset) -> Self {
        let latency = Arc::new(SimulatedLatency(settings.simulated_latency));
        Self::new_with_dependencies(settings, dataset, Arc::new(SystemClock), latency)
    }

    pub fn new_with_dependencies(
        settings: StoreSettings,
        dataset: Dataset,
        clock: Arc<dyn Clock>,
        latency: Arc<dyn Latency>,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState {
                    version: 0,
                    session: None,
                    users: dataset.users,
                    incidents: dataset.incidents,
                    ambulances: dataset.ambulances,
                }),
                events,
                clock,
                latency,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        // Mutations never panic half-way, so a poisoned lock still guards a whole state.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, state: &mut StoreState, event: StoreEvent) {
        state.version += 1;
        debug!(version = state.version, ?event, "store mutation applied");
        // No subscribers is not an error.
        let _ = self.inner.events.send(event);
    }

    fn next_timestamp(&self, incident: &Incident) -> DateTime<Utc> {
        let now = self.inner.clock.now();
        incident
            .last_update()
            .map_or(now, |update| now.max(update.timestamp))
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state();
        Snapshot {
            version: state.version,
            users: state.users.clone(),
            incidents: state.incidents.clone(),
            ambulances: state.ambulances.clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.state().version
    }

    pub fn users(&self) -> Vec<User> {
        self.state().users.clone()
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.state().incidents.clone()
    }

    pub fn ambulances(&self) -> Vec<Ambulance> {
        self.state().ambulances.clone()
    }

    pub fn user(&self, user_id: &UserId) -> Option<User> {
        let state = self.state();
        state.users.iter().find(|user| user.id == *user_id).cloned()
    }

    pub fn incident(&self, incident_id: &IncidentId) -> Option<Incident> {
        let state = self.state();
        state
            .incidents
            .iter()
            .find(|incident| incident.id == *incident_id)
            .cloned()
    }

    pub fn ambulance(&self, ambulance_id: &AmbulanceId) -> Option<Ambulance> {
        let state = self.state();
        state
            .ambulances
            .iter()
            .find(|ambulance| ambulance.id == *ambulance_id)
            .cloned()
    }

    pub fn current_user(&self) -> Option<User> {
        let state = self.state();
        let session = state.session.as_ref()?;
        state.users.iter().find(|user| user.id == *session).cloned()
    }

    pub fn verify_consistency(&self) -> Vec<Violation> {
        let state = self.state();
        consistency::check(&state.users, &state.incidents, &state.ambulances)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, StoreError> {
        self.inner.latency.pause().await;

        if email.trim().is_empty() || password.is_empty() {
            return Err(StoreError::InvalidCredentials);
        }

        let mut guard = self.state();
        let state = &mut *guard;
        let Some(index) = state.user_by_email(email) else {
            warn!(email, "login rejected for unknown account");
            return Err(StoreError::InvalidCredentials);
        };
        let user = state.users[index].clone();
        state.session = Some(user.id.clone());
        info!(user_id = %user.id, role = ?user.role, "session started");
        self.commit(
            state,
            StoreEvent::SessionStarted {
                user_id: user.id.clone(),
            },
        );
        Ok(user)
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let user_id = state.session.take().ok_or(StoreError::NotAuthenticated)?;
        info!(%user_id, "session ended");
        self.commit(state, StoreEvent::SessionEnded { user_id });
        Ok(())
    }

    /// Opens an incident for the signed-in user at `location`.
    pub fn trigger_sos(&self, location: Location) -> Result<Incident, StoreError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let Some(user_id) = state.session.clone() else {
            warn!("sos rejected without an authenticated user");
            return Err(StoreError::NotAuthenticated);
        };
        let user_index = state.user_index(&user_id)?;

        let now = self.inner.clock.now();
        let incident = Incident {
            id: IncidentId::new(format!("incident-{}", Uuid::new_v4())),
            user_id: user_id.clone(),
            user_name: state.users[user_index].name.clone(),
            status: IncidentStatus::SosAcionado,
            tracking: Tracking::starting_at(location.point()),
            location,
            timestamp: now,
            updates: vec![IncidentUpdate {
                status: IncidentStatus::SosAcionado,
                timestamp: now,
                note: None,
            }],
            ambulance_id: None,
            hospital_name: None,
            eta_minutes: None,
        };
        state.incidents.insert(0, incident.clone());

        info!(incident_id = %incident.id, %user_id, address = %incident.location.address, "sos triggered");
        self.commit(
            state,
            StoreEvent::IncidentCreated {
                incident_id: incident.id.clone(),
                user_id,
            },
        );
        Ok(incident)
    }

    /// Appends a status update. Reaching `paciente_hospital` with a note records the
    /// note as the receiving hospital.
    pub fn update_incident_status(
        &self,
        incident_id: &IncidentId,
        status: IncidentStatus,
        note: Option<String>,
    ) -> Result<Incident, StoreError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let index = state.incident_index(incident_id)?;
        let from = state.incidents[index].status;

        if !self.inner.settings.transition_policy.allows(from, status) {
            warn!(%incident_id, %from, to = %status, "status transition rejected");
            return Err(StoreError::InvalidTransition { from, to: status });
        }

        let timestamp = self.next_timestamp(&state.incidents[index]);
        let incident = &mut state.incidents[index];
        if status == IncidentStatus::PacienteHospital {
            if let Some(hospital) = &note {
                incident.hospital_name = Some(hospital.clone());
            }
        }
        incident.updates.push(IncidentUpdate {
            status,
            timestamp,
            note,
        });
        incident.status = status;
        let updated = incident.clone();

        info!(%incident_id, %from, to = %status, "incident status updated");
        self.commit(
            state,
            StoreEvent::IncidentStatusChanged {
                incident_id: incident_id.clone(),
                from,
                to: status,
            },
        );
        Ok(updated)
    }

    /// Links an ambulance and an incident in both directions. Any link either side held
    /// before is undone first, so no incident is left pointing at an ambulance that
    /// moved on. Does not touch the incident status.
    pub fn assign_ambulance_to_incident(
        &self,
        incident_id: &IncidentId,
        ambulance_id: &AmbulanceId,
        eta_minutes: u32,
    ) -> Result<Incident, StoreError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let incident_index = state.incident_index(incident_id)?;
        let ambulance_index = state.ambulance_index(ambulance_id)?;

        if state.ambulances[ambulance_index].status == AmbulanceStatus::Maintenance {
            warn!(%incident_id, %ambulance_id, "assignment rejected for ambulance in maintenance");
            return Err(StoreError::Conflict(format!(
                "ambulance {ambulance_id} is under maintenance"
            )));
        }

        let previous_incident = state.ambulances[ambulance_index]
            .current_incident_id
            .clone()
            .filter(|previous| previous != incident_id);
        if let Some(previous) = previous_incident {
            if let Some(orphan) = state
                .incidents
                .iter_mut()
                .find(|incident| incident.id == previous)
            {
                if orphan.ambulance_id.as_ref() == Some(ambulance_id) {
                    orphan.ambulance_id = None;
                    orphan.eta_minutes = None;
                }
            }
            warn!(%ambulance_id, from = %previous, to = %incident_id, "ambulance reassigned");
        }

        let previous_ambulance = state.incidents[incident_index]
            .ambulance_id
            .clone()
            .filter(|previous| previous != ambulance_id);
        if let Some(previous) = previous_ambulance {
            if let Some(released) = state
                .ambulances
                .iter_mut()
                .find(|ambulance| ambulance.id == previous)
            {
                if released.current_incident_id.as_ref() == Some(incident_id) {
                    released.current_incident_id = None;
                    released.status = AmbulanceStatus::Available;
                }
            }
            info!(%incident_id, released = %previous, "previous ambulance released");
        }

        let incident = &mut state.incidents[incident_index];
        incident.ambulance_id = Some(ambulance_id.clone());
        incident.eta_minutes = Some(eta_minutes);
        let updated = incident.clone();
        let ambulance = &mut state.ambulances[ambulance_index];
        ambulance.status = AmbulanceStatus::Busy;
        ambulance.current_incident_id = Some(incident_id.clone());

        info!(%incident_id, %ambulance_id, eta_minutes, "ambulance assigned");
        self.commit(
            state,
            StoreEvent::AmbulanceAssigned {
                incident_id: incident_id.clone(),
                ambulance_id: ambulance_id.clone(),
                eta_minutes,
            },
        );
        Ok(updated)
    }

    /// Records the receiving hospital and places it at the configured offset from the
    /// incident origin.
    pub fn assign_hospital_to_incident(
        &self,
        incident_id: &IncidentId,
        hospital_name: &str,
    ) -> Result<Incident, StoreError> {
        let hospital_name = hospital_name.trim();
        if hospital_name.is_empty() {
            return Err(StoreError::Validation("hospital name is required".into()));
        }

        let mut guard = self.state();
        let state = &mut *guard;
        let index = state.incident_index(incident_id)?;
        let incident = &mut state.incidents[index];
        let destination = incident
            .location
            .point()
            .offset_by(self.inner.settings.hospital_offset);
        incident.hospital_name = Some(hospital_name.to_string());
        incident.tracking.destination_location = Some(Location::new(
            destination.latitude,
            destination.longitude,
            hospital_name,
        ));
        let updated = incident.clone();

        info!(%incident_id, hospital = hospital_name, "hospital assigned");
        self.commit(
            state,
            StoreEvent::HospitalAssigned {
                incident_id: incident_id.clone(),
                hospital_name: hospital_name.to_string(),
            },
        );
        Ok(updated)
    }

    /// Moves an ambulance. While it serves an incident the position is also appended to
    /// that incident's tracking path.
    pub fn update_ambulance_position(
        &self,
        ambulance_id: &AmbulanceId,
        position: GeoPoint,
    ) -> Result<Ambulance, StoreError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let index = state.ambulance_index(ambulance_id)?;
        let ambulance = &mut state.ambulances[index];
        ambulance.location = position;
        let moved = ambulance.clone();
        let incident_id = ambulance.current_incident_id.clone();

        if let Some(incident_id) = &incident_id {
            if let Some(incident) = state
                .incidents
                .iter_mut()
                .find(|incident| incident.id == *incident_id)
            {
                incident.tracking.current_location = position;
                incident.tracking.path.push(position);
            }
        }

        debug!(%ambulance_id, latitude = position.latitude, longitude = position.longitude, "ambulance moved");
        self.commit(
            state,
            StoreEvent::AmbulanceMoved {
                ambulance_id: ambulance_id.clone(),
                position,
                incident_id,
            },
        );
        Ok(moved)
    }

    /// Changes fleet status. Leaving `busy` unlinks the ambulance and its incident on
    /// both sides; entering `busy` only happens through assignment.
    pub fn update_ambulance_status(
        &self,
        ambulance_id: &AmbulanceId,
        status: AmbulanceStatus,
    ) -> Result<Ambulance, StoreError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let index = state.ambulance_index(ambulance_id)?;
        let ambulance = &mut state.ambulances[index];

        if status == AmbulanceStatus::Busy {
            if ambulance.status == AmbulanceStatus::Busy {
                return Ok(ambulance.clone());
            }
            return Err(StoreError::Conflict(format!(
                "ambulance {ambulance_id} can only become busy through an incident assignment"
            )));
        }

        ambulance.status = status;
        let released = ambulance.current_incident_id.take();
        let updated = ambulance.clone();
        if let Some(incident_id) = &released {
            if let Some(incident) = state
                .incidents
                .iter_mut()
                .find(|incident| incident.id == *incident_id)
            {
                if incident.ambulance_id.as_ref() == Some(ambulance_id) {
                    incident.ambulance_id = None;
                    incident.eta_minutes = None;
                }
            }
        }

        info!(%ambulance_id, ?status, released = ?released, "ambulance status updated");
        self.commit(
            state,
            StoreEvent::AmbulanceStatusChanged {
                ambulance_id: ambulance_id.clone(),
                status,
                released_incident_id: released,
            },
        );
        Ok(updated)
    }

    pub fn validate_user(&self, user_id: &UserId) -> Result<User, StoreError> {
        let user = self.mutate_user(user_id, |user| {
            user.is_validated = true;
            Ok(user.clone())
        })?;
        info!(%user_id, "user validated");
        Ok(user)
    }

    pub fn add_family_member(
        &self,
        user_id: &UserId,
        member: NewFamilyMember,
    ) -> Result<FamilyMember, StoreError> {
        if member.name.trim().is_empty() {
            return Err(StoreError::Validation("family member name is required".into()));
        }
        let added = self.mutate_user(user_id, |user| {
            let added = FamilyMember {
                id: FamilyMemberId::new(format!("fm-{}", Uuid::new_v4())),
                name: member.name,
                relationship: member.relationship,
                phone: member.phone,
                receive_notifications: member.receive_notifications,
            };
            user.family_members.push(added.clone());
            Ok(added)
        })?;
        info!(%user_id, member_id = %added.id, "family member added");
        Ok(added)
    }

    pub fn remove_family_member(
        &self,
        user_id: &UserId,
        member_id: &FamilyMemberId,
    ) -> Result<(), StoreError> {
        self.mutate_user(user_id, |user| {
            let before = user.family_members.len();
            user.family_members.retain(|member| member.id != *member_id);
            if user.family_members.len() == before {
                return Err(StoreError::not_found(EntityKind::FamilyMember, member_id));
            }
            Ok(())
        })?;
        info!(%user_id, %member_id, "family member removed");
        Ok(())
    }

    pub fn update_user_profile(
        &self,
        user_id: &UserId,
        update: UserProfileUpdate,
    ) -> Result<User, StoreError> {
        if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(StoreError::Validation("name cannot be blank".into()));
        }
        if update.email.as_deref().is_some_and(|email| email.trim().is_empty()) {
            return Err(StoreError::Validation("email cannot be blank".into()));
        }

        let mut guard = self.state();
        let state = &mut *guard;
        let index = state.user_index(user_id)?;
        if let Some(email) = &update.email {
            if let Some(owner) = state.user_by_email(email) {
                if owner != index {
                    return Err(StoreError::Conflict(format!("email {email} is already in use")));
                }
            }
        }

        let user = &mut state.users[index];
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(email) = update.email {
            user.email = email.trim().to_string();
        }
        if let Some(phone) = update.phone {
            user.phone = phone;
        }
        if let Some(address) = update.address {
            user.address = address;
        }
        if let Some(profile_image) = update.profile_image {
            user.profile_image = Some(profile_image);
        }
        let updated = user.clone();

        info!(%user_id, "user profile updated");
        self.commit(
            state,
            StoreEvent::UserUpdated {
                user_id: user_id.clone(),
            },
        );
        Ok(updated)
    }

    pub fn update_user_medical_info(
        &self,
        user_id: &UserId,
        medical_info: MedicalInfo,
    ) -> Result<User, StoreError> {
        let user = self.mutate_user(user_id, |user| {
            user.medical_info = Some(medical_info);
            Ok(user.clone())
        })?;
        info!(%user_id, "medical info updated");
        Ok(user)
    }

    pub fn update_user_plan(&self, user_id: &UserId, update: PlanUpdate) -> Result<Plan, StoreError> {
        if !update.price.is_finite() || update.price < 0.0 {
            return Err(StoreError::Validation(format!(
                "plan price must be a non-negative amount, got {}",
                update.price
            )));
        }
        let plan = self.mutate_user(user_id, |user| {
            user.plan.name = update.name;
            user.plan.status = update.status;
            user.plan.expiration_date = update.expiration_date;
            user.plan.price = update.price;
            Ok(user.plan.clone())
        })?;
        info!(%user_id, plan = %plan.name, status = ?plan.status, "plan updated");
        Ok(plan)
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        self.inner.latency.pause().await;

        if new_user.name.trim().is_empty() {
            return Err(StoreError::Validation("name is required".into()));
        }
        if new_user.email.trim().is_empty() {
            return Err(StoreError::Validation("email is required".into()));
        }

        let mut guard = self.state();
        let state = &mut *guard;
        if state.user_by_email(&new_user.email).is_some() {
            warn!(email = %new_user.email, "account creation rejected for duplicate email");
            return Err(StoreError::Conflict(format!(
                "email {} is already in use",
                new_user.email
            )));
        }

        let user = User {
            id: UserId::new(format!("user-{}", Uuid::new_v4())),
            name: new_user.name,
            email: new_user.email.trim().to_string(),
            phone: new_user.phone,
            cpf: new_user.cpf,
            address: new_user.address,
            role: new_user.role,
            is_validated: true,
            plan: new_user.plan,
            family_members: Vec::new(),
            medical_info: new_user.medical_info,
            profile_image: new_user.profile_image,
        };
        state.users.push(user.clone());

        info!(user_id = %user.id, role = ?user.role, "user created");
        self.commit(
            state,
            StoreEvent::UserCreated {
                user_id: user.id.clone(),
            },
        );
        Ok(user)
    }

    pub async fn reset_password_request(&self, email: &str) -> Result<(), StoreError> {
        self.inner.latency.pause().await;

        let mut guard = self.state();
        let state = &mut *guard;
        let index = state
            .user_by_email(email)
            .ok_or_else(|| StoreError::not_found(EntityKind::User, email))?;
        let user_id = state.users[index].id.clone();

        info!(%user_id, "password reset requested");
        self.commit(state, StoreEvent::PasswordResetRequested { user_id });
        Ok(())
    }

    /// Applies `apply` to one user under the lock. `apply` must fail before it writes.
    fn mutate_user<T>(
        &self,
        user_id: &UserId,
        apply: impl FnOnce(&mut User) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let index = state.user_index(user_id)?;
        let result = apply(&mut state.users[index])?;
        self.commit(
            state,
            StoreEvent::UserUpdated {
                user_id: user_id.clone(),
            },
        );
        Ok(result)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
