use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub gateway_url: String,
    pub gateway_terminal_code: String,
    pub gateway_hash_secret: String,
    pub gateway_return_url: String,
    pub gateway_appointment_return_url: String,
    pub frontend_url: String,
    pub pending_payment_timeout_minutes: i64,
    pub expiry_sweep_interval_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            gateway_url: env::var("GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("GATEWAY_URL not set, using empty value");
                    String::new()
                }),
            gateway_terminal_code: env::var("GATEWAY_TERMINAL_CODE")
                .unwrap_or_else(|_| {
                    warn!("GATEWAY_TERMINAL_CODE not set, using empty value");
                    String::new()
                })
                .trim()
                .to_string(),
            gateway_hash_secret: env::var("GATEWAY_HASH_SECRET")
                .unwrap_or_else(|_| {
                    warn!("GATEWAY_HASH_SECRET not set, using empty value");
                    String::new()
                })
                .trim()
                .to_string(),
            gateway_return_url: env::var("GATEWAY_RETURN_URL")
                .unwrap_or_else(|_| {
                    warn!("GATEWAY_RETURN_URL not set, using empty value");
                    String::new()
                }),
            gateway_appointment_return_url: env::var("GATEWAY_APPOINTMENT_RETURN_URL")
                .unwrap_or_else(|_| {
                    warn!("GATEWAY_APPOINTMENT_RETURN_URL not set, using empty value");
                    String::new()
                }),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| {
                    warn!("FRONTEND_URL not set, using default");
                    "http://localhost:5173".to_string()
                }),
            pending_payment_timeout_minutes: env::var("PENDING_PAYMENT_TIMEOUT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            expiry_sweep_interval_seconds: env::var("EXPIRY_SWEEP_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_gateway_configured(&self) -> bool {
        !self.gateway_url.is_empty()
            && !self.gateway_terminal_code.is_empty()
            && !self.gateway_hash_secret.is_empty()
    }
}
