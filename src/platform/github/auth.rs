use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::path::Path;

use crate::error::{AppError, Result};

/// GitHub rejects app JWTs that live longer than ten minutes.
const JWT_LIFETIME_SECS: i64 = 9 * 60;
/// Backdate `iat` to tolerate clock drift between us and GitHub.
const CLOCK_DRIFT_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

impl AppClaims {
    fn issued_now(app_id: u64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            iat: now - CLOCK_DRIFT_SECS,
            exp: now + JWT_LIFETIME_SECS,
            iss: app_id.to_string(),
        }
    }
}

/// Sign a short-lived RS256 token that authenticates as the GitHub App.
pub fn generate_app_jwt(app_id: u64, private_key_path: &Path) -> Result<String> {
    let pem = std::fs::read(private_key_path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read private key at {}: {e}",
            private_key_path.display()
        ))
    })?;

    let key = EncodingKey::from_rsa_pem(&pem)
        .map_err(|e| AppError::Config(format!("Invalid RSA private key: {e}")))?;

    encode(&Header::new(Algorithm::RS256), &AppClaims::issued_now(app_id), &key)
        .map_err(|e| AppError::Config(format!("Failed to sign app JWT: {e}")))
}
