use axum::{extract::Request, middleware::Next, response::Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::user::{ROLE_ADMIN, ROLE_STUDENT};
use crate::utils::token::decode_token;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case(ROLE_ADMIN)
    }
}

pub async fn require_admin(mut req: Request, next: Next) -> Result<Response> {
    authorize(&mut req, Some(ROLE_ADMIN))?;
    Ok(next.run(req).await)
}

pub async fn require_student(mut req: Request, next: Next) -> Result<Response> {
    authorize(&mut req, Some(ROLE_STUDENT))?;
    Ok(next.run(req).await)
}

/// Any signed-in user.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response> {
    authorize(&mut req, None)?;
    Ok(next.run(req).await)
}

/// Validates the bearer token, checks its role and stores the claims as a
/// request extension for handlers.
fn authorize(req: &mut Request, role: Option<&str>) -> Result<()> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("Missing authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("Malformed authorization header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("Unsupported authorization scheme".to_string()))?;

    let config = crate::config::get_config();
    let claims = decode_token(&config.jwt_secret, token.trim())?;
    if let Some(role) = role {
        if !claims.role.eq_ignore_ascii_case(role) {
            return Err(Error::Forbidden(format!("Requires the {} role", role)));
        }
    }

    req.extensions_mut().insert(claims);
    Ok(())
}
