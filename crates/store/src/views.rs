//! Read-only projections the dispatch and admin consoles build from a snapshot.

use std::cmp::Reverse;

use chrono::NaiveDate;
use shared::{
    domain::{
        Ambulance, AmbulanceId, AmbulanceStatus, Incident, IncidentStatus, PlanStatus, Role, User,
        UserId,
    },
    protocol::{DispatchSummary, SortDirection},
};

pub const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 30;

/// Active incidents, optionally narrowed to one status. Fresh SOS calls come first,
/// everything else newest first.
pub fn dispatch_queue(incidents: &[Incident], filter: Option<IncidentStatus>) -> Vec<&Incident> {
    let mut queue: Vec<&Incident> = incidents
        .iter()
        .filter(|incident| incident.is_active())
        .filter(|incident| filter.map_or(true, |status| incident.status == status))
        .collect();
    queue.sort_by_key(|incident| {
        (
            incident.status != IncidentStatus::SosAcionado,
            Reverse(incident.timestamp),
        )
    });
    queue
}

pub fn available_ambulances(ambulances: &[Ambulance]) -> Vec<&Ambulance> {
    ambulances
        .iter()
        .filter(|ambulance| ambulance.status == AmbulanceStatus::Available)
        .collect()
}

pub fn incident_for_ambulance<'a>(
    incidents: &'a [Incident],
    ambulance_id: &AmbulanceId,
) -> Option<&'a Incident> {
    incidents
        .iter()
        .find(|incident| incident.ambulance_id.as_ref() == Some(ambulance_id))
}

pub fn incidents_for_user<'a>(incidents: &'a [Incident], user_id: &UserId) -> Vec<&'a Incident> {
    let mut history: Vec<&Incident> = incidents
        .iter()
        .filter(|incident| incident.user_id == *user_id)
        .collect();
    history.sort_by_key(|incident| Reverse(incident.timestamp));
    history
}

pub fn active_incident_for_user<'a>(
    incidents: &'a [Incident],
    user_id: &UserId,
) -> Option<&'a Incident> {
    incidents_for_user(incidents, user_id)
        .into_iter()
        .find(|incident| incident.is_active())
}

/// Patients whose active plan lapses within `days` of `today`, soonest first.
pub fn users_with_expiring_plans(users: &[User], today: NaiveDate, days: i64) -> Vec<&User> {
    let mut expiring: Vec<&User> = users
        .iter()
        .filter(|user| user.role == Role::Patient && user.plan.expires_within(today, days))
        .collect();
    expiring.sort_by_key(|user| user.plan.expiration_date);
    expiring
}

/// Incidents whose user name or address contains `query` (case-insensitive), limited to
/// `statuses` unless it is empty, ordered by opening time.
pub fn search_incidents<'a>(
    incidents: &'a [Incident],
    query: &str,
    statuses: &[IncidentStatus],
    direction: SortDirection,
) -> Vec<&'a Incident> {
    let needle = query.trim().to_lowercase();
    let mut found: Vec<&Incident> = incidents
        .iter()
        .filter(|incident| {
            incident.user_name.to_lowercase().contains(&needle)
                || incident.location.address.to_lowercase().contains(&needle)
        })
        .filter(|incident| statuses.is_empty() || statuses.contains(&incident.status))
        .collect();
    match direction {
        SortDirection::Asc => found.sort_by_key(|incident| incident.timestamp),
        SortDirection::Desc => found.sort_by_key(|incident| Reverse(incident.timestamp)),
    }
    found
}

/// Users matching `query` on name or email (case-insensitive) or phone, narrowed by
/// validation state and plan status when given. Keeps collection order.
pub fn search_users<'a>(
    users: &'a [User],
    query: &str,
    validated: Option<bool>,
    plan_status: Option<PlanStatus>,
) -> Vec<&'a User> {
    let query = query.trim();
    let needle = query.to_lowercase();
    users
        .iter()
        .filter(|user| {
            user.name.to_lowercase().contains(&needle)
                || user.email.to_lowercase().contains(&needle)
                || user.phone.contains(query)
        })
        .filter(|user| validated.map_or(true, |wanted| user.is_validated == wanted))
        .filter(|user| plan_status.map_or(true, |wanted| user.plan.status == wanted))
        .collect()
}

pub fn dispatch_summary(incidents: &[Incident], ambulances: &[Ambulance]) -> DispatchSummary {
    DispatchSummary {
        active_incidents: incidents.iter().filter(|i| i.is_active()).count(),
        awaiting_dispatch: incidents
            .iter()
            .filter(|i| i.is_active() && i.ambulance_id.is_none())
            .count(),
        available_ambulances: available_ambulances(ambulances).len(),
        total_ambulances: ambulances.len(),
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
