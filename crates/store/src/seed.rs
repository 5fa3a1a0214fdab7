use chrono::{DateTime, NaiveDate, Utc};
use shared::domain::{
    Ambulance, AmbulanceId, AmbulanceStatus, FamilyMember, FamilyMemberId, GeoPoint, Incident,
    IncidentId, IncidentStatus, IncidentUpdate, Location, MedicalInfo, Plan, PlanId, PlanStatus,
    Role, Tracking, User, UserId,
};

use crate::settings::DEFAULT_HOSPITAL_OFFSET;

/// The collections a store starts from.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub incidents: Vec<Incident>,
    pub ambulances: Vec<Ambulance>,
}

/// Demo accounts, incidents and fleet used by the console before any real data exists.
pub fn mock_dataset() -> Dataset {
    Dataset {
        users: mock_users(),
        incidents: mock_incidents(),
        ambulances: mock_ambulances(),
    }
}

fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or_default()
}

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_default()
}

fn plan(id: &str, name: &str, status: PlanStatus, expiration: &str, price: f64) -> Plan {
    Plan {
        id: PlanId::new(id),
        name: name.into(),
        status,
        expiration_date: day(expiration),
        price,
    }
}

fn family_member(id: &str, name: &str, relationship: &str, phone: &str) -> FamilyMember {
    FamilyMember {
        id: FamilyMemberId::new(id),
        name: name.into(),
        relationship: relationship.into(),
        phone: phone.into(),
        receive_notifications: true,
    }
}

fn mock_users() -> Vec<User> {
    vec![
        User {
            id: UserId::new("1"),
            name: "João Silva".into(),
            email: "joao.silva@example.com".into(),
            phone: "(11) 98765-4321".into(),
            cpf: "123.456.789-00".into(),
            address: "Rua das Flores, 123 - São Paulo, SP".into(),
            role: Role::Patient,
            is_validated: true,
            plan: plan("1", "Plano Completo", PlanStatus::Active, "2023-12-31", 99.90),
            family_members: vec![
                family_member("1", "Maria Silva", "Esposa", "(11) 98765-1234"),
                family_member("2", "Pedro Silva", "Filho", "(11) 98765-5678"),
            ],
            medical_info: Some(MedicalInfo {
                blood_type: "O+".into(),
                allergies: vec!["Penicilina".into()],
                conditions: vec!["Hipertensão".into()],
                medications: vec!["Losartana 50mg".into()],
                emergency_contact: "Maria Silva - (11) 98765-1234".into(),
            }),
            profile_image: None,
        },
        User {
            id: UserId::new("2"),
            name: "Ana Santos".into(),
            email: "ana.santos@example.com".into(),
            phone: "(11) 97654-3210".into(),
            cpf: "987.654.321-00".into(),
            address: "Rua das Palmeiras, 456 - São Paulo, SP".into(),
            role: Role::Patient,
            is_validated: true,
            plan: plan("1", "Plano Completo", PlanStatus::Active, "2023-10-15", 99.90),
            family_members: vec![family_member(
                "3",
                "Carlos Santos",
                "Esposo",
                "(11) 97654-1234",
            )],
            medical_info: None,
            profile_image: None,
        },
        User {
            id: UserId::new("3"),
            name: "Luiz Oliveira".into(),
            email: "luiz.oliveira@example.com".into(),
            phone: "(11) 96543-2109".into(),
            cpf: "456.789.123-00".into(),
            address: "Avenida Brigadeiro, 789 - São Paulo, SP".into(),
            role: Role::Patient,
            is_validated: false,
            plan: plan("2", "Plano Básico", PlanStatus::Inactive, "2023-05-20", 69.90),
            family_members: Vec::new(),
            medical_info: None,
            profile_image: None,
        },
        User {
            id: UserId::new("4"),
            name: "Central de Atendimento".into(),
            email: "central@example.com".into(),
            phone: "(11) 3000-0192".into(),
            cpf: "000.000.000-01".into(),
            address: "Rua da Central, 1 - São Paulo, SP".into(),
            role: Role::Dispatcher,
            is_validated: true,
            plan: plan("3", "Equipe", PlanStatus::Active, "2030-12-31", 0.0),
            family_members: Vec::new(),
            medical_info: None,
            profile_image: None,
        },
        User {
            id: UserId::new("5"),
            name: "Administrador".into(),
            email: "admin@example.com".into(),
            phone: "(11) 3000-0000".into(),
            cpf: "000.000.000-02".into(),
            address: "Rua da Central, 1 - São Paulo, SP".into(),
            role: Role::Administrator,
            is_validated: true,
            plan: plan("3", "Equipe", PlanStatus::Active, "2030-12-31", 0.0),
            family_members: Vec::new(),
            medical_info: None,
            profile_image: None,
        },
    ]
}

fn update(status: IncidentStatus, timestamp: &str) -> IncidentUpdate {
    IncidentUpdate {
        status,
        timestamp: at(timestamp),
        note: None,
    }
}

fn mock_incidents() -> Vec<Incident> {
    let en_route_origin = Location::new(
        -23.550520,
        -46.633308,
        "Avenida Paulista, 1000 - São Paulo, SP",
    );
    let delivered_origin = Location::new(-23.550520, -46.633308, "Rua Augusta, 500 - São Paulo, SP");
    let hospital = delivered_origin.point().offset_by(DEFAULT_HOSPITAL_OFFSET);
    let ambulance_last_seen = GeoPoint::new(-23.560000, -46.645000);

    vec![
        Incident {
            id: IncidentId::new("1"),
            user_id: UserId::new("1"),
            user_name: "João Silva".into(),
            status: IncidentStatus::AmbulanciaACaminho,
            timestamp: at("2023-06-15T14:30:00Z"),
            updates: vec![
                update(IncidentStatus::SosAcionado, "2023-06-15T14:30:00Z"),
                update(IncidentStatus::CentralEmContato, "2023-06-15T14:32:00Z"),
                update(IncidentStatus::AmbulanciaACaminho, "2023-06-15T14:35:00Z"),
            ],
            ambulance_id: None,
            hospital_name: None,
            eta_minutes: None,
            tracking: Tracking::starting_at(en_route_origin.point()),
            location: en_route_origin,
        },
        Incident {
            id: IncidentId::new("2"),
            user_id: UserId::new("2"),
            user_name: "Ana Santos".into(),
            status: IncidentStatus::PacienteHospital,
            timestamp: at("2023-06-15T10:15:00Z"),
            updates: vec![
                update(IncidentStatus::SosAcionado, "2023-06-15T10:15:00Z"),
                update(IncidentStatus::CentralEmContato, "2023-06-15T10:16:00Z"),
                update(IncidentStatus::AmbulanciaACaminho, "2023-06-15T10:20:00Z"),
                update(IncidentStatus::AmbulanciaChegou, "2023-06-15T10:30:00Z"),
                update(IncidentStatus::PacienteEmbarcado, "2023-06-15T10:35:00Z"),
                IncidentUpdate {
                    status: IncidentStatus::PacienteHospital,
                    timestamp: at("2023-06-15T10:50:00Z"),
                    note: Some("Hospital São Paulo".into()),
                },
            ],
            ambulance_id: Some(AmbulanceId::new("2")),
            hospital_name: Some("Hospital São Paulo".into()),
            eta_minutes: Some(10),
            tracking: Tracking {
                current_location: ambulance_last_seen,
                destination_location: Some(Location::new(
                    hospital.latitude,
                    hospital.longitude,
                    "Hospital São Paulo",
                )),
                path: vec![delivered_origin.point(), ambulance_last_seen],
            },
            location: delivered_origin,
        },
    ]
}

fn mock_ambulances() -> Vec<Ambulance> {
    vec![
        Ambulance {
            id: AmbulanceId::new("1"),
            plate: "ABC-1234".into(),
            status: AmbulanceStatus::Available,
            location: GeoPoint::new(-23.555000, -46.639000),
            current_incident_id: None,
            driver_id: None,
        },
        Ambulance {
            id: AmbulanceId::new("2"),
            plate: "DEF-5678".into(),
            status: AmbulanceStatus::Busy,
            location: GeoPoint::new(-23.560000, -46.645000),
            current_incident_id: Some(IncidentId::new("2")),
            driver_id: None,
        },
        Ambulance {
            id: AmbulanceId::new("3"),
            plate: "GHI-9012".into(),
            status: AmbulanceStatus::Maintenance,
            location: GeoPoint::new(-23.553000, -46.642000),
            current_incident_id: None,
            driver_id: None,
        },
    ]
}
