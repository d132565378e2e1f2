use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::domain::{Doctor, FamilyMember, Patient, WorkSchedule};
use shared_store::{AppState, DataStore};

pub struct TestConfig {
    pub jwt_secret: String,
    pub gateway_url: String,
    pub gateway_terminal_code: String,
    pub gateway_hash_secret: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            gateway_url: "https://sandbox.gateway.example/paymentv2/vpcpay.html".to_string(),
            gateway_terminal_code: "TESTTMN1".to_string(),
            gateway_hash_secret: "TESTHASHSECRETTESTHASHSECRET1234".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            gateway_url: self.gateway_url.clone(),
            gateway_terminal_code: self.gateway_terminal_code.clone(),
            gateway_hash_secret: self.gateway_hash_secret.clone(),
            gateway_return_url: "http://localhost:3000/api/payments/gateway/callback".to_string(),
            gateway_appointment_return_url:
                "http://localhost:3000/api/payments/gateway/appointment-callback".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            pending_payment_timeout_minutes: 30,
            expiry_sweep_interval_seconds: 60,
        }
    }

    pub fn to_app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(self.to_app_config()))
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "patient@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            id: patient_id.to_string(),
            email: "patient@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    /// Mint a signed HS256 token the auth middleware will accept.
    pub fn create_token(user: &TestUser, jwt_secret: &str) -> String {
        let header = json!({"alg": "HS256", "typ": "JWT"});
        let now = Utc::now();
        let claims = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": (now + Duration::hours(1)).timestamp(),
        });

        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{}.{}", header_b64, claims_b64);

        let mut mac = Hmac::<Sha256>::new_from_slice(jwt_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(signing_input.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature_b64)
    }

    pub fn auth_header(user: &TestUser, jwt_secret: &str) -> String {
        format!("Bearer {}", Self::create_token(user, jwt_secret))
    }
}

/// Store seeding helpers shared by the cell test suites.
pub struct TestData;

impl TestData {
    pub async fn seed_doctor(store: &DataStore, fee: i64) -> Doctor {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: "Dr. Test".to_string(),
            specialization: "General Practice".to_string(),
            consultation_fee: fee,
            is_active: true,
            schedule: WorkSchedule::default(),
        };
        store.insert_doctor(doctor.clone()).await;
        doctor
    }

    pub async fn seed_patient(store: &DataStore) -> Patient {
        let patient = Patient {
            id: Uuid::new_v4(),
            full_name: "Test Patient".to_string(),
            email: Some("patient@example.com".to_string()),
        };
        store.insert_patient(patient.clone()).await;
        patient
    }

    pub async fn seed_family_member(store: &DataStore, patient_id: Uuid) -> FamilyMember {
        let member = FamilyMember {
            id: Uuid::new_v4(),
            patient_id,
            full_name: "Family Member".to_string(),
            relationship: "CHILD".to_string(),
        };
        store.insert_family_member(member.clone()).await;
        member
    }

    /// Credit a wallet directly for test setup, bypassing the ledger.
    pub async fn fund_wallet(store: &DataStore, patient_id: Uuid, amount: i64) {
        store
            .update_wallet(patient_id, |wallet| {
                wallet.balance += amount;
            })
            .await;
    }
}
