use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

/// JWT claims identifying a user and the roles granted to them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user ID
    pub sub: String,
    /// Role names checked by permission rules
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Generate an HS256 token for `user_id` carrying `roles`.
///
/// # Errors
/// Returns `jsonwebtoken::errors::Error` if token encoding fails
pub fn generate_token(
    config: &Config,
    user_id: Uuid,
    roles: &[String],
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp() as usize;
    let exp = now + (config.jwt.expiration_days * 86400) as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        roles: roles.to_vec(),
        exp,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
    )
}

/// Verify the signature and expiration of a token and return its claims.
///
/// # Errors
/// Returns `jsonwebtoken::errors::Error` if token is invalid, expired, or malformed
pub fn verify_token(config: &Config, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt.secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}
