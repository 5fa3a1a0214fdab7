use super::*;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone};
use shared::domain::{PlanStatus, Role};

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("time")
}

fn incident_at(id: &str, latitude: f64, longitude: f64, address: &str) -> Incident {
    let location = Location::new(latitude, longitude, address);
    Incident {
        id: IncidentId::new(id),
        user_id: UserId::new("1"),
        user_name: "João Silva".into(),
        status: IncidentStatus::SosAcionado,
        tracking: Tracking::starting_at(location.point()),
        location,
        timestamp: start_time(),
        updates: vec![IncidentUpdate {
            status: IncidentStatus::SosAcionado,
            timestamp: start_time(),
            note: None,
        }],
        ambulance_id: None,
        hospital_name: None,
        eta_minutes: None,
    }
}

fn ambulance(id: &str, status: AmbulanceStatus) -> Ambulance {
    Ambulance {
        id: AmbulanceId::new(id),
        plate: format!("PLT-{id}"),
        status,
        location: GeoPoint::new(-23.56, -46.64),
        current_incident_id: None,
        driver_id: None,
    }
}

fn fixture() -> Dataset {
    Dataset {
        users: seed::mock_dataset().users,
        incidents: vec![
            incident_at("inc1", -23.55, -46.63, "A"),
            incident_at("inc2", -23.60, -46.70, "B"),
        ],
        ambulances: vec![
            ambulance("amb1", AmbulanceStatus::Available),
            ambulance("amb2", AmbulanceStatus::Available),
            ambulance("amb3", AmbulanceStatus::Maintenance),
        ],
    }
}

fn store_with(policy: TransitionPolicy) -> (CoordinationStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let settings = StoreSettings {
        transition_policy: policy,
        ..StoreSettings::default()
    };
    let store =
        CoordinationStore::new_with_dependencies(settings, fixture(), clock.clone(), Arc::new(NoLatency));
    (store, clock)
}

fn test_store() -> CoordinationStore {
    store_with(TransitionPolicy::ForwardOnly).0
}

fn inc(id: &str) -> IncidentId {
    IncidentId::new(id)
}

fn amb(id: &str) -> AmbulanceId {
    AmbulanceId::new(id)
}

async fn signed_in_store() -> CoordinationStore {
    let store = test_store();
    store
        .login("joao.silva@example.com", "secret")
        .await
        .expect("login");
    store
}

#[test]
fn trigger_sos_without_session_leaves_incidents_unchanged() {
    let store = test_store();
    let before = store.incidents().len();

    let err = store
        .trigger_sos(Location::new(-23.55, -46.63, "A"))
        .expect_err("no session");

    assert_eq!(err, StoreError::NotAuthenticated);
    assert_eq!(store.incidents().len(), before);
}

#[tokio::test]
async fn trigger_sos_opens_incident_with_single_update_and_seeded_path() {
    let store = signed_in_store().await;

    let incident = store
        .trigger_sos(Location::new(-23.55, -46.63, "A"))
        .expect("sos");

    assert_eq!(incident.status, IncidentStatus::SosAcionado);
    assert_eq!(incident.updates.len(), 1);
    assert_eq!(incident.tracking.path, vec![GeoPoint::new(-23.55, -46.63)]);
    assert_eq!(incident.tracking.current_location, GeoPoint::new(-23.55, -46.63));
    assert_eq!(incident.user_id, UserId::new("1"));
    assert_eq!(incident.user_name, "João Silva");
    assert_eq!(store.incidents()[0].id, incident.id);
    assert_eq!(store.incidents().len(), 3);
    assert!(store.ambulances().iter().all(|a| a.current_incident_id.is_none()));
}

#[tokio::test]
async fn every_sos_gets_a_fresh_id() {
    let store = signed_in_store().await;
    let first = store.trigger_sos(Location::new(0.0, 0.0, "x")).expect("sos");
    let second = store.trigger_sos(Location::new(0.0, 0.0, "x")).expect("sos");
    assert_ne!(first.id, second.id);
}

#[test]
fn assign_ambulance_then_dispatch_status() {
    let store = test_store();

    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 15)
        .expect("assign");
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::AmbulanciaACaminho, None)
        .expect("status");

    let incident = store.incident(&inc("inc1")).expect("incident");
    let ambulance = store.ambulance(&amb("amb1")).expect("ambulance");
    assert_eq!(incident.ambulance_id, Some(amb("amb1")));
    assert_eq!(incident.eta_minutes, Some(15));
    assert_eq!(incident.status, IncidentStatus::AmbulanciaACaminho);
    assert_eq!(ambulance.status, AmbulanceStatus::Busy);
    assert_eq!(ambulance.current_incident_id, Some(inc("inc1")));
    assert!(store.verify_consistency().is_empty());
}

#[test]
fn assignment_does_not_touch_status_or_log() {
    let store = test_store();
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 8)
        .expect("assign");
    let incident = store.incident(&inc("inc1")).expect("incident");
    assert_eq!(incident.status, IncidentStatus::SosAcionado);
    assert_eq!(incident.updates.len(), 1);
}

#[test]
fn unknown_incident_status_update_changes_nothing() {
    let store = test_store();
    let before = store.snapshot();

    let err = store
        .update_incident_status(&inc("nonexistent-id"), IncidentStatus::PacienteHospital, None)
        .expect_err("missing");

    assert!(matches!(
        err,
        StoreError::NotFound {
            entity: EntityKind::Incident,
            ..
        }
    ));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn missing_entities_are_reported_by_kind() {
    let store = test_store();
    let err = store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("nope"), 5)
        .expect_err("missing ambulance");
    assert!(matches!(
        err,
        StoreError::NotFound {
            entity: EntityKind::Ambulance,
            ..
        }
    ));
    assert!(store.incident(&inc("inc1")).expect("incident").ambulance_id.is_none());

    let err = store
        .update_ambulance_position(&amb("nope"), GeoPoint::new(0.0, 0.0))
        .expect_err("missing ambulance");
    assert_eq!(err.code(), shared::error::ErrorCode::NotFound);
}

#[test]
fn live_status_always_matches_log_tail() {
    let store = test_store();
    for status in [
        IncidentStatus::CentralEmContato,
        IncidentStatus::AmbulanciaACaminho,
        IncidentStatus::ChegadaLocal,
        IncidentStatus::PacienteEmbarcado,
    ] {
        let incident = store
            .update_incident_status(&inc("inc1"), status, Some("ok".into()))
            .expect("status");
        assert_eq!(incident.status, status);
        assert_eq!(incident.last_update().map(|u| u.status), Some(status));
    }
    assert_eq!(store.incident(&inc("inc1")).expect("incident").updates.len(), 5);
}

#[test]
fn forward_only_rejects_repeats_and_rollbacks() {
    let store = test_store();
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::AmbulanciaChegou, None)
        .expect("skip ahead");

    let err = store
        .update_incident_status(&inc("inc1"), IncidentStatus::AmbulanciaChegou, None)
        .expect_err("repeat");
    assert_eq!(
        err,
        StoreError::InvalidTransition {
            from: IncidentStatus::AmbulanciaChegou,
            to: IncidentStatus::AmbulanciaChegou,
        }
    );
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::CentralEmContato, None)
        .expect_err("rollback");

    let incident = store.incident(&inc("inc1")).expect("incident");
    assert_eq!(incident.status, IncidentStatus::AmbulanciaChegou);
    assert_eq!(incident.updates.len(), 2);
}

#[test]
fn forward_only_terminal_status_has_no_way_out() {
    let store = test_store();
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::PacienteHospital, None)
        .expect("arrive");
    for status in IncidentStatus::ALL {
        assert!(store
            .update_incident_status(&inc("inc1"), status, None)
            .is_err());
    }
}

#[test]
fn lenient_policy_accepts_corrections() {
    let (store, _) = store_with(TransitionPolicy::Lenient);
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::PacienteEmbarcado, None)
        .expect("forward");
    let incident = store
        .update_incident_status(
            &inc("inc1"),
            IncidentStatus::AmbulanciaChegou,
            Some("marked too early".into()),
        )
        .expect("rollback");
    assert_eq!(incident.status, IncidentStatus::AmbulanciaChegou);
    assert_eq!(incident.updates.len(), 3);
}

#[test]
fn hospital_arrival_note_becomes_hospital_name() {
    let store = test_store();
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::ACaminhoHospital, Some("Hospital A".into()))
        .expect("status");
    assert_eq!(store.incident(&inc("inc1")).expect("incident").hospital_name, None);

    let incident = store
        .update_incident_status(
            &inc("inc1"),
            IncidentStatus::PacienteHospital,
            Some("Hospital São Paulo".into()),
        )
        .expect("status");
    assert_eq!(incident.hospital_name.as_deref(), Some("Hospital São Paulo"));
    assert_eq!(
        incident.last_update().and_then(|u| u.note.as_deref()),
        Some("Hospital São Paulo")
    );
}

#[test]
fn hospital_arrival_without_note_keeps_previous_hospital() {
    let store = test_store();
    store
        .assign_hospital_to_incident(&inc("inc1"), "Hospital X")
        .expect("hospital");
    let incident = store
        .update_incident_status(&inc("inc1"), IncidentStatus::PacienteHospital, None)
        .expect("status");
    assert_eq!(incident.hospital_name.as_deref(), Some("Hospital X"));
}

#[test]
fn assign_hospital_places_destination_at_fixed_offset() {
    let store = test_store();
    store
        .assign_hospital_to_incident(&inc("inc1"), "Hospital X")
        .expect("hospital");

    let incident = store.incident(&inc("inc1")).expect("incident");
    let destination = incident
        .tracking
        .destination_location
        .expect("destination");
    let offset = settings::DEFAULT_HOSPITAL_OFFSET;
    assert_eq!(incident.hospital_name.as_deref(), Some("Hospital X"));
    assert_eq!(destination.address, "Hospital X");
    assert!((destination.latitude - (-23.55 + offset.latitude)).abs() < 1e-9);
    assert!((destination.longitude - (-46.63 + offset.longitude)).abs() < 1e-9);
    assert_eq!(incident.status, IncidentStatus::SosAcionado);
}

#[test]
fn blank_hospital_name_is_rejected() {
    let store = test_store();
    let err = store
        .assign_hospital_to_incident(&inc("inc1"), "   ")
        .expect_err("blank");
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store
        .incident(&inc("inc1"))
        .expect("incident")
        .tracking
        .destination_location
        .is_none());
}

#[test]
fn position_updates_extend_path_only_while_assigned() {
    let store = test_store();
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 10)
        .expect("assign");

    for step in 1..=3u32 {
        let point = GeoPoint::new(-23.56 + f64::from(step) * 0.001, -46.64);
        store
            .update_ambulance_position(&amb("amb1"), point)
            .expect("move");
        let incident = store.incident(&inc("inc1")).expect("incident");
        assert_eq!(incident.tracking.path.len(), 1 + step as usize);
        assert_eq!(incident.tracking.current_location, point);
    }

    let untouched = store.incident(&inc("inc2")).expect("incident");
    store
        .update_ambulance_position(&amb("amb2"), GeoPoint::new(-23.7, -46.8))
        .expect("move free ambulance");
    assert_eq!(store.incident(&inc("inc2")).expect("incident"), untouched);
    assert_eq!(
        store.ambulance(&amb("amb2")).expect("ambulance").location,
        GeoPoint::new(-23.7, -46.8)
    );
}

#[test]
fn same_position_twice_is_recorded_twice() {
    let store = test_store();
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 10)
        .expect("assign");
    let point = GeoPoint::new(-23.551, -46.631);
    store.update_ambulance_position(&amb("amb1"), point).expect("move");
    store.update_ambulance_position(&amb("amb1"), point).expect("move");
    assert_eq!(store.incident(&inc("inc1")).expect("incident").tracking.path.len(), 3);
}

#[test]
fn leaving_busy_unlinks_both_sides() {
    let store = test_store();
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 12)
        .expect("assign");

    store
        .update_ambulance_status(&amb("amb1"), AmbulanceStatus::Available)
        .expect("release");

    let ambulance = store.ambulance(&amb("amb1")).expect("ambulance");
    let incident = store.incident(&inc("inc1")).expect("incident");
    assert_eq!(ambulance.status, AmbulanceStatus::Available);
    assert_eq!(ambulance.current_incident_id, None);
    assert_eq!(incident.ambulance_id, None);
    assert_eq!(incident.eta_minutes, None);
    assert!(store.verify_consistency().is_empty());
}

#[test]
fn busy_only_comes_from_assignment() {
    let store = test_store();
    let err = store
        .update_ambulance_status(&amb("amb1"), AmbulanceStatus::Busy)
        .expect_err("busy without incident");
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(
        store.ambulance(&amb("amb1")).expect("ambulance").status,
        AmbulanceStatus::Available
    );

    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 12)
        .expect("assign");
    store
        .update_ambulance_status(&amb("amb1"), AmbulanceStatus::Busy)
        .expect("already busy");
    assert_eq!(
        store.ambulance(&amb("amb1")).expect("ambulance").current_incident_id,
        Some(inc("inc1"))
    );
}

#[test]
fn mutations_return_the_state_they_wrote() {
    let store = test_store();

    let incident = store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 9)
        .expect("assign");
    assert_eq!(incident.ambulance_id, Some(amb("amb1")));
    assert_eq!(incident.eta_minutes, Some(9));

    let incident = store
        .assign_hospital_to_incident(&inc("inc1"), "Hospital X")
        .expect("hospital");
    assert_eq!(incident.hospital_name.as_deref(), Some("Hospital X"));
    assert_eq!(incident, store.incident(&inc("inc1")).expect("incident"));

    let point = GeoPoint::new(-23.552, -46.632);
    let ambulance = store
        .update_ambulance_position(&amb("amb1"), point)
        .expect("move");
    assert_eq!(ambulance.location, point);
    assert_eq!(ambulance.current_incident_id, Some(inc("inc1")));

    let ambulance = store
        .update_ambulance_status(&amb("amb1"), AmbulanceStatus::Busy)
        .expect("already busy");
    assert_eq!(ambulance.status, AmbulanceStatus::Busy);

    let ambulance = store
        .update_ambulance_status(&amb("amb1"), AmbulanceStatus::Maintenance)
        .expect("maintenance");
    assert_eq!(ambulance.status, AmbulanceStatus::Maintenance);
    assert_eq!(ambulance.current_incident_id, None);

    let user = store.validate_user(&UserId::new("3")).expect("validate");
    assert!(user.is_validated);
}

#[test]
fn reassigning_busy_ambulance_clears_previous_incident() {
    let store = test_store();
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 12)
        .expect("first");
    store
        .assign_ambulance_to_incident(&inc("inc2"), &amb("amb1"), 4)
        .expect("second");

    let first = store.incident(&inc("inc1")).expect("incident");
    let second = store.incident(&inc("inc2")).expect("incident");
    assert_eq!(first.ambulance_id, None);
    assert_eq!(first.eta_minutes, None);
    assert_eq!(second.ambulance_id, Some(amb("amb1")));
    assert_eq!(
        store.ambulance(&amb("amb1")).expect("ambulance").current_incident_id,
        Some(inc("inc2"))
    );
    assert!(store.verify_consistency().is_empty());
}

#[test]
fn replacing_incident_ambulance_releases_the_old_one() {
    let store = test_store();
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 12)
        .expect("first");
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb2"), 6)
        .expect("replacement");

    let old = store.ambulance(&amb("amb1")).expect("ambulance");
    assert_eq!(old.status, AmbulanceStatus::Available);
    assert_eq!(old.current_incident_id, None);
    let incident = store.incident(&inc("inc1")).expect("incident");
    assert_eq!(incident.ambulance_id, Some(amb("amb2")));
    assert_eq!(incident.eta_minutes, Some(6));
    assert!(store.verify_consistency().is_empty());
}

#[test]
fn reassigning_same_pair_only_refreshes_eta() {
    let store = test_store();
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 12)
        .expect("first");
    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 3)
        .expect("again");
    let incident = store.incident(&inc("inc1")).expect("incident");
    assert_eq!(incident.ambulance_id, Some(amb("amb1")));
    assert_eq!(incident.eta_minutes, Some(3));
    assert!(store.verify_consistency().is_empty());
}

#[test]
fn ambulances_in_maintenance_cannot_be_dispatched() {
    let store = test_store();
    let before = store.snapshot();
    let err = store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb3"), 12)
        .expect_err("maintenance");
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn events_follow_call_order_and_bump_version() {
    let store = test_store();
    let mut events = store.subscribe();

    store
        .assign_ambulance_to_incident(&inc("inc1"), &amb("amb1"), 15)
        .expect("assign");
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::AmbulanciaACaminho, None)
        .expect("status");
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::SosAcionado, None)
        .expect_err("rejected transitions publish nothing");
    store
        .update_ambulance_position(&amb("amb1"), GeoPoint::new(-23.551, -46.631))
        .expect("move");

    assert_eq!(store.version(), 3);
    assert!(matches!(
        events.try_recv().expect("first"),
        StoreEvent::AmbulanceAssigned { eta_minutes: 15, .. }
    ));
    assert_eq!(
        events.try_recv().expect("second"),
        StoreEvent::IncidentStatusChanged {
            incident_id: inc("inc1"),
            from: IncidentStatus::SosAcionado,
            to: IncidentStatus::AmbulanciaACaminho,
        }
    );
    assert!(matches!(
        events.try_recv().expect("third"),
        StoreEvent::AmbulanceMoved {
            incident_id: Some(_),
            ..
        }
    ));
    assert!(events.try_recv().is_err());
}

#[test]
fn update_timestamps_never_go_backwards() {
    let (store, clock) = store_with(TransitionPolicy::ForwardOnly);
    clock.advance(ChronoDuration::minutes(5));
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::CentralEmContato, None)
        .expect("status");
    clock.set(start_time() - ChronoDuration::hours(1));
    store
        .update_incident_status(&inc("inc1"), IncidentStatus::CentralAcionada, None)
        .expect("status");

    let updates = store.incident(&inc("inc1")).expect("incident").updates;
    assert_eq!(updates[1].timestamp, start_time() + ChronoDuration::minutes(5));
    assert_eq!(updates[2].timestamp, updates[1].timestamp);
    assert!(store.verify_consistency().is_empty());
}

#[tokio::test]
async fn login_requires_known_email_and_password() {
    let store = test_store();
    assert_eq!(
        store.login("", "secret").await.expect_err("empty email"),
        StoreError::InvalidCredentials
    );
    assert_eq!(
        store
            .login("joao.silva@example.com", "")
            .await
            .expect_err("empty password"),
        StoreError::InvalidCredentials
    );
    assert_eq!(
        store
            .login("ghost@example.com", "secret")
            .await
            .expect_err("unknown"),
        StoreError::InvalidCredentials
    );
    assert!(store.current_user().is_none());

    let user = store
        .login("Central@Example.com", "secret")
        .await
        .expect("login");
    assert_eq!(user.role, Role::Dispatcher);
    assert_eq!(store.current_user().map(|u| u.id), Some(UserId::new("4")));

    store.logout().expect("logout");
    assert!(store.current_user().is_none());
    assert_eq!(store.logout().expect_err("twice"), StoreError::NotAuthenticated);
}

#[tokio::test]
async fn current_user_reflects_profile_changes() {
    let store = signed_in_store().await;
    store
        .update_user_profile(
            &UserId::new("1"),
            UserProfileUpdate {
                phone: Some("(11) 90000-0000".into()),
                ..UserProfileUpdate::default()
            },
        )
        .expect("profile");
    assert_eq!(
        store.current_user().map(|u| u.phone),
        Some("(11) 90000-0000".to_string())
    );
}

#[test]
fn family_members_get_unique_ids_and_can_be_removed() {
    let store = test_store();
    let user_id = UserId::new("3");
    let member = |name: &str| NewFamilyMember {
        name: name.into(),
        relationship: "Irmã".into(),
        phone: "(11) 91111-2222".into(),
        receive_notifications: true,
    };

    let first = store.add_family_member(&user_id, member("Julia")).expect("add");
    let second = store.add_family_member(&user_id, member("Rita")).expect("add");
    assert_ne!(first.id, second.id);
    assert_eq!(store.user(&user_id).expect("user").family_members.len(), 2);

    store
        .remove_family_member(&user_id, &first.id)
        .expect("remove");
    let remaining = store.user(&user_id).expect("user").family_members;
    assert_eq!(remaining, vec![second]);

    let err = store
        .remove_family_member(&user_id, &first.id)
        .expect_err("already gone");
    assert!(matches!(
        err,
        StoreError::NotFound {
            entity: EntityKind::FamilyMember,
            ..
        }
    ));
    assert!(store
        .add_family_member(&UserId::new("404"), member("X"))
        .is_err());
    assert!(matches!(
        store.add_family_member(&user_id, member(" ")),
        Err(StoreError::Validation(_))
    ));
}

#[test]
fn validate_user_and_medical_info() {
    let store = test_store();
    let user_id = UserId::new("3");
    store.validate_user(&user_id).expect("validate");
    let info = MedicalInfo {
        blood_type: "A-".into(),
        allergies: vec!["Dipirona".into()],
        conditions: Vec::new(),
        medications: Vec::new(),
        emergency_contact: "Ana - (11) 90000-1111".into(),
    };
    store
        .update_user_medical_info(&user_id, info.clone())
        .expect("medical");

    let user = store.user(&user_id).expect("user");
    assert!(user.is_validated);
    assert_eq!(user.medical_info, Some(info));
    assert!(store.validate_user(&UserId::new("404")).is_err());
}

#[test]
fn profile_email_must_stay_unique() {
    let store = test_store();
    let err = store
        .update_user_profile(
            &UserId::new("1"),
            UserProfileUpdate {
                email: Some("ana.santos@example.com".into()),
                ..UserProfileUpdate::default()
            },
        )
        .expect_err("taken");
    assert!(matches!(err, StoreError::Conflict(_)));

    let updated = store
        .update_user_profile(
            &UserId::new("1"),
            UserProfileUpdate {
                name: Some("João P. Silva".into()),
                email: Some("JOAO.SILVA@example.com".into()),
                ..UserProfileUpdate::default()
            },
        )
        .expect("own email, new case");
    assert_eq!(updated.name, "João P. Silva");
}

#[test]
fn plan_update_keeps_plan_id_and_validates_price() {
    let store = test_store();
    let update = PlanUpdate {
        name: "Plano Família".into(),
        status: PlanStatus::Active,
        expiration_date: NaiveDate::from_ymd_opt(2025, 1, 31).expect("date"),
        price: 149.9,
    };
    let plan = store
        .update_user_plan(&UserId::new("3"), update.clone())
        .expect("plan");
    assert_eq!(plan.id, shared::domain::PlanId::new("2"));
    assert_eq!(plan.name, "Plano Família");

    let err = store
        .update_user_plan(
            &UserId::new("3"),
            PlanUpdate {
                price: -1.0,
                ..update
            },
        )
        .expect_err("negative");
    assert!(matches!(err, StoreError::Validation(_)));
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        name: "Beatriz Costa".into(),
        email: email.into(),
        phone: "(11) 95555-0000".into(),
        cpf: "321.654.987-00".into(),
        address: "Rua Harmonia, 50 - São Paulo, SP".into(),
        role: Role::Patient,
        plan: Plan {
            id: shared::domain::PlanId::new("2"),
            name: "Plano Básico".into(),
            status: PlanStatus::Active,
            expiration_date: NaiveDate::from_ymd_opt(2025, 6, 30).expect("date"),
            price: 69.9,
        },
        medical_info: None,
        profile_image: None,
    }
}

#[tokio::test]
async fn create_user_rejects_duplicate_email() {
    let store = test_store();
    let created = store
        .create_user(new_user("beatriz@example.com"))
        .await
        .expect("create");
    assert!(created.family_members.is_empty());
    assert_eq!(store.user(&created.id).map(|u| u.email), Some("beatriz@example.com".into()));

    let err = store
        .create_user(new_user("BEATRIZ@example.com"))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn password_reset_needs_known_email() {
    let store = test_store();
    let mut events = store.subscribe();
    store
        .reset_password_request("ana.santos@example.com")
        .await
        .expect("reset");
    assert_eq!(
        events.try_recv().expect("event"),
        StoreEvent::PasswordResetRequested {
            user_id: UserId::new("2")
        }
    );
    assert!(matches!(
        store.reset_password_request("ghost@example.com").await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn account_calls_wait_for_simulated_latency() {
    let latency = std::time::Duration::from_millis(1000);
    let store = CoordinationStore::new_with_dependencies(
        StoreSettings {
            simulated_latency: latency,
            ..StoreSettings::default()
        },
        fixture(),
        Arc::new(ManualClock::new(start_time())),
        Arc::new(SimulatedLatency(latency)),
    );

    let started = tokio::time::Instant::now();
    store
        .login("joao.silva@example.com", "secret")
        .await
        .expect("login");
    assert!(started.elapsed() >= latency);
}

#[test]
fn seeded_store_is_consistent() {
    let store = CoordinationStore::seeded(StoreSettings::default());
    let snapshot = store.snapshot();
    assert_eq!(snapshot.version, 0);
    assert_eq!(snapshot.incidents.len(), 2);
    assert_eq!(snapshot.ambulances.len(), 3);
    assert!(store.verify_consistency().is_empty());
}

#[test]
fn consistency_check_reports_orphaned_links() {
    let mut dataset = fixture();
    dataset.incidents[0].ambulance_id = Some(amb("amb1"));
    dataset.ambulances[1].status = AmbulanceStatus::Busy;
    let store = CoordinationStore::new_with_dependencies(
        StoreSettings::default(),
        dataset,
        Arc::new(SystemClock),
        Arc::new(NoLatency),
    );

    let violations = store.verify_consistency();
    assert!(violations.contains(&Violation::OrphanedIncidentRef {
        incident_id: inc("inc1"),
        ambulance_id: amb("amb1"),
    }));
    assert!(violations.contains(&Violation::BusyWithoutIncident {
        ambulance_id: amb("amb2"),
    }));
}
