use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::auth::Claims;

pub fn issue_token(secret: &str, ttl_hours: i64, user_id: Uuid, role: &str) -> Result<String> {
    let exp = (Utc::now() + Duration::hours(ttl_hours)).timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn issued_token_decodes() {
        let id = Uuid::new_v4();
        let token = issue_token("secret", 1, id, "student").unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, "student");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("secret", 1, Uuid::new_v4(), "admin").unwrap();
        assert!(matches!(decode_token("other", &token), Err(Error::Token(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token("secret", -2, Uuid::new_v4(), "admin").unwrap();
        assert!(decode_token("secret", &token).is_err());
    }
}
