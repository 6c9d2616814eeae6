use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Audience the identity toolkit expects on custom sign-in tokens.
pub const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Longest lifetime the identity toolkit accepts for a custom token.
const MAX_LIFETIME_SECS: i64 = 3600;

/// Claims of a custom token letting a web client sign in as `uid`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CustomTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    #[serde(with = "ts_seconds")]
    pub iat: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    pub exp: DateTime<Utc>,
    pub uid: String,
}

impl CustomTokenClaims {
    /// Claims issued now by the service account `issuer`, valid for an hour.
    pub fn new(issuer: &str, uid: &str) -> Self {
        let now = Utc::now();
        Self {
            iss: issuer.to_string(),
            sub: issuer.to_string(),
            aud: CUSTOM_TOKEN_AUDIENCE.to_string(),
            iat: now,
            exp: now + Duration::seconds(MAX_LIFETIME_SECS),
            uid: uid.to_string(),
        }
    }
}

/// Sign a custom token for `uid` with the service account's RSA key.
pub fn mint_custom_token(issuer: &str, key_pem: &[u8], uid: &str) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(key_pem)?;
    let claims = CustomTokenClaims::new(issuer, uid);
    Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}
