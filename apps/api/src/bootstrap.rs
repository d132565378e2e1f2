use std::env;

use tracing::info;
use uuid::Uuid;

use shared_models::domain::{Doctor, Patient, WorkSchedule};
use shared_store::AppState;

/// Seed a handful of demo records so a fresh boot is immediately
/// exercisable. Disabled with SEED_DEMO_DATA=false.
pub async fn seed_demo_data(state: &AppState) {
    let enabled = env::var("SEED_DEMO_DATA")
        .map(|v| v != "false")
        .unwrap_or(true);
    if !enabled {
        return;
    }

    let doctors = [
        ("Dr. Nguyen Van An", "Cardiology", 300_000),
        ("Dr. Tran Thi Binh", "Dermatology", 200_000),
        ("Dr. Le Minh Chau", "General Practice", 150_000),
    ];

    for (name, specialization, fee) in doctors {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            specialization: specialization.to_string(),
            consultation_fee: fee,
            is_active: true,
            schedule: WorkSchedule::default(),
        };
        info!("Seeded doctor {} ({})", doctor.full_name, doctor.id);
        state.store.insert_doctor(doctor).await;
    }

    let patient = Patient {
        id: Uuid::new_v4(),
        full_name: "Demo Patient".to_string(),
        email: Some("demo@example.com".to_string()),
    };
    info!("Seeded patient {} ({})", patient.full_name, patient.id);
    state.store.insert_patient(patient).await;
}
