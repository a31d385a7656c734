use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn unix_now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

/// Signs a token of the given type with a fresh jti. HMAC signing over
/// serializable claims cannot fail.
fn issue(
    token_type: TokenType,
    user_id: u64,
    username: String,
    name: String,
    role: u8,
    secret: &str,
    ttl: usize,
) -> (String, Claims) {
    let claims = Claims {
        user_id,
        sub: username,
        name,
        role,
        exp: unix_now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();

    (token, claims)
}

pub fn generate_access_token(
    user_id: u64,
    username: String,
    name: String,
    role: u8,
    secret: &str,
    ttl: usize,
) -> String {
    issue(TokenType::Access, user_id, username, name, role, secret, ttl).0
}

/// Refresh tokens are persisted by jti, so the claims come back too.
pub fn generate_refresh_token(
    user_id: u64,
    username: String,
    name: String,
    role: u8,
    secret: &str,
    ttl: usize,
) -> (String, Claims) {
    issue(TokenType::Refresh, user_id, username, name, role, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
