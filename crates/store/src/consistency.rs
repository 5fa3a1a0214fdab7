use std::collections::HashSet;

use shared::domain::{
    Ambulance, AmbulanceId, AmbulanceStatus, FamilyMemberId, Incident, IncidentId,
    IncidentStatus, User, UserId,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("incident {incident_id} is {status} but its last update is {logged:?}")]
    StatusNotLogged {
        incident_id: IncidentId,
        status: IncidentStatus,
        logged: Option<IncidentStatus>,
    },
    #[error("incident {incident_id} update {index} is older than the one before it")]
    UpdatesOutOfOrder { incident_id: IncidentId, index: usize },
    #[error("incident {incident_id} points at ambulance {ambulance_id} which does not point back")]
    OrphanedIncidentRef {
        incident_id: IncidentId,
        ambulance_id: AmbulanceId,
    },
    #[error("ambulance {ambulance_id} points at incident {incident_id} which does not point back")]
    OrphanedAmbulanceRef {
        ambulance_id: AmbulanceId,
        incident_id: IncidentId,
    },
    #[error("ambulance {ambulance_id} is busy without an incident")]
    BusyWithoutIncident { ambulance_id: AmbulanceId },
    #[error("ambulance {ambulance_id} holds incident {incident_id} while {status:?}")]
    IncidentWhileIdle {
        ambulance_id: AmbulanceId,
        incident_id: IncidentId,
        status: AmbulanceStatus,
    },
    #[error("user {user_id} has family member id {member_id} more than once")]
    DuplicateFamilyMember {
        user_id: UserId,
        member_id: FamilyMemberId,
    },
}

/// Lists every cross-entity invariant the collections currently break.
pub fn check(users: &[User], incidents: &[Incident], ambulances: &[Ambulance]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for user in users {
        let mut seen = HashSet::new();
        for member in &user.family_members {
            if !seen.insert(&member.id) {
                violations.push(Violation::DuplicateFamilyMember {
                    user_id: user.id.clone(),
                    member_id: member.id.clone(),
                });
            }
        }
    }

    for incident in incidents {
        let logged = incident.last_update().map(|update| update.status);
        if logged != Some(incident.status) {
            violations.push(Violation::StatusNotLogged {
                incident_id: incident.id.clone(),
                status: incident.status,
                logged,
            });
        }
        for (index, pair) in incident.updates.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                violations.push(Violation::UpdatesOutOfOrder {
                    incident_id: incident.id.clone(),
                    index: index + 1,
                });
            }
        }
        if let Some(ambulance_id) = &incident.ambulance_id {
            let points_back = ambulances.iter().any(|ambulance| {
                ambulance.id == *ambulance_id
                    && ambulance.current_incident_id.as_ref() == Some(&incident.id)
            });
            if !points_back {
                violations.push(Violation::OrphanedIncidentRef {
                    incident_id: incident.id.clone(),
                    ambulance_id: ambulance_id.clone(),
                });
            }
        }
    }

    for ambulance in ambulances {
        match (&ambulance.current_incident_id, ambulance.status) {
            (None, AmbulanceStatus::Busy) => violations.push(Violation::BusyWithoutIncident {
                ambulance_id: ambulance.id.clone(),
            }),
            (Some(incident_id), status) if status != AmbulanceStatus::Busy => {
                violations.push(Violation::IncidentWhileIdle {
                    ambulance_id: ambulance.id.clone(),
                    incident_id: incident_id.clone(),
                    status,
                })
            }
            _ => {}
        }
        if let Some(incident_id) = &ambulance.current_incident_id {
            let points_back = incidents.iter().any(|incident| {
                incident.id == *incident_id
                    && incident.ambulance_id.as_ref() == Some(&ambulance.id)
            });
            if !points_back {
                violations.push(Violation::OrphanedAmbulanceRef {
                    ambulance_id: ambulance.id.clone(),
                    incident_id: incident_id.clone(),
                });
            }
        }
    }

    violations
}
