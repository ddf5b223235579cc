use sqlx::PgPool;

use crate::dto::auth_dto::{AuthResponse, LoginPayload, RegisterPayload};
use crate::error::{Error, Result};
use crate::models::user::{User, ROLE_ADMIN, ROLE_STUDENT};
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::token::issue_token;

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    jwt_secret: String,
    jwt_ttl_hours: i64,
}

impl UserService {
    pub fn new(pool: PgPool, jwt_secret: String, jwt_ttl_hours: i64) -> Self {
        Self {
            pool,
            jwt_secret,
            jwt_ttl_hours,
        }
    }

    /// Registers a student. An invited placeholder with the same email is
    /// claimed instead of creating a second account.
    pub async fn register(&self, payload: RegisterPayload) -> Result<AuthResponse> {
        let email = payload.email.trim().to_lowercase();
        let password_hash = hash_password(&payload.password)?;
        let registration_number = payload
            .registration_number
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 FOR UPDATE")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;

        let user = match existing {
            Some(user) if !user.is_placeholder() || user.is_admin() => {
                return Err(Error::BadRequest("Email is already registered".to_string()));
            }
            Some(placeholder) => {
                sqlx::query_as::<_, User>(
                    r#"
                    UPDATE users
                    SET name = $2, password_hash = $3,
                        registration_number = COALESCE($4, registration_number)
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(placeholder.id)
                .bind(payload.name.trim())
                .bind(&password_hash)
                .bind(&registration_number)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (name, email, registration_number, role, password_hash)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
                    "#,
                )
                .bind(payload.name.trim())
                .bind(&email)
                .bind(&registration_number)
                .bind(ROLE_STUDENT)
                .bind(&password_hash)
                .fetch_one(&mut *tx)
                .await?
            }
        };
        tx.commit().await?;

        tracing::info!(user_id = %user.id, email = %user.email, "Student registered");
        self.auth_response(&user)
    }

    pub async fn login(&self, payload: LoginPayload) -> Result<AuthResponse> {
        let email = payload.email.trim().to_lowercase();
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        let verified = user.filter(|u| {
            u.password_hash
                .as_deref()
                .is_some_and(|hash| verify_password(&payload.password, hash))
        });
        let Some(user) = verified else {
            tracing::info!(email = %email, "Failed login");
            return Err(Error::Unauthorized("Invalid email or password".to_string()));
        };

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        self.auth_response(&user)
    }

    /// Creates the configured administrator if no account with that email
    /// exists yet.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<()> {
        let email = email.trim().to_lowercase();
        let password_hash = hash_password(password)?;
        let created = sqlx::query(
            r#"
            INSERT INTO users (name, email, role, password_hash)
            VALUES ('Administrator', $1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&email)
        .bind(ROLE_ADMIN)
        .bind(&password_hash)
        .execute(&self.pool)
        .await?;

        if created.rows_affected() > 0 {
            tracing::info!(email = %email, "Administrator account created");
        }
        Ok(())
    }

    fn auth_response(&self, user: &User) -> Result<AuthResponse> {
        let token = issue_token(&self.jwt_secret, self.jwt_ttl_hours, user.id, &user.role)?;
        Ok(AuthResponse {
            token,
            user_id: user.id,
            role: user.role.clone(),
            name: user.name.clone(),
        })
    }
}
