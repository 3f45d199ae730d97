use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
    pub jti: String,
}

/// Issues a session token for `user_id`, valid for `ttl_hours`.
pub fn create_jwt(user_id: &str, secret: &str, ttl_hours: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| anyhow!("token expiry overflows"))?
        .timestamp();

    let claims = Claims {
        sub: user_id.to_owned(),
        exp: expiration as usize,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_cycle() {
        let token = create_jwt("user_123", "test_secret", 24).unwrap();
        let claims = validate_jwt(&token, "test_secret").unwrap();
        assert_eq!(claims.sub, "user_123");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_jwt("user_123", "test_secret", 24).unwrap();
        assert!(validate_jwt(&token, "other_secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Well past the default 60s leeway
        let token = create_jwt("user_123", "test_secret", -2).unwrap();
        assert!(validate_jwt(&token, "test_secret").is_err());
    }
}
