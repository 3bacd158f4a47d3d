use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub database_service_url: String,
    pub request_timeout_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            database_service_url: String::new(),
            request_timeout_ms: 1_000,
        }
    }
}

impl TestConfig {
    pub fn with_database_service(url: &str) -> Self {
        Self {
            database_service_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_service_url: self.database_service_url.clone(),
            jwt_secret: self.jwt_secret.clone(),
            request_timeout_ms: self.request_timeout_ms,
            port: 3000,
            embedded_seed_path: String::new(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", Role::Patient)
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn with_id(id: &str, email: &str, role: Role) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: self.role,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::sign_claims(
            &json!({
                "sub": user.id,
                "email": user.email,
                "role": user.role.to_string(),
                "iat": now.timestamp(),
                "exp": exp.timestamp()
            }),
            secret,
        )
    }

    /// Token shaped like the ones the legacy authentication service issued:
    /// subject under `id` and a numeric role code.
    pub fn create_legacy_token(user: &TestUser, role_code: i64, secret: &str) -> String {
        let now = Utc::now();
        Self::sign_claims(
            &json!({
                "id": user.id,
                "email": user.email,
                "role": role_code,
                "iat": now.timestamp(),
                "exp": (now + Duration::hours(1)).timestamp()
            }),
            secret,
        )
    }

    pub fn sign_claims(claims: &Value, secret: &str) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned database-service payloads for wiremock-backed tests.
pub struct MockDbServiceResponses;

impl MockDbServiceResponses {
    pub fn envelope(data: Value) -> Value {
        json!({
            "success": true,
            "data": data
        })
    }

    pub fn error_response(message: &str) -> Value {
        json!({
            "success": false,
            "message": message
        })
    }

    pub fn doctor_response(doctor_id: &str, fees: f64, available: bool, slots_booked: Value) -> Value {
        json!({
            "_id": doctor_id,
            "name": "Dr. Test",
            "email": "doctor@example.com",
            "speciality": "General physician",
            "fees": fees,
            "available": available,
            "slots_booked": slots_booked,
            "revision": 1
        })
    }

    pub fn user_response(user_id: &str) -> Value {
        json!({
            "_id": user_id,
            "name": "Test Patient",
            "email": "patient@example.com",
            "phone": "0000000000"
        })
    }

    pub fn appointment_response(appointment_id: &str, user_id: &str, doctor_id: &str) -> Value {
        json!({
            "_id": appointment_id,
            "userId": user_id,
            "docId": doctor_id,
            "slotDate": "2024-06-01",
            "slotTime": "10:00",
            "userData": Self::user_response(user_id),
            "docData": {
                "_id": doctor_id,
                "name": "Dr. Test",
                "email": "doctor@example.com",
                "speciality": "General physician",
                "fees": 50.0
            },
            "amount": 50.0,
            "cancelled": false,
            "isCompleted": false,
            "date": 1717200000000i64
        })
    }
}
