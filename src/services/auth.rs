//! Authentication service: credential verification and JWT issuance
//!
//! Stateless HS256 token pairs. Logout is client-side token disposal; the
//! server keeps no session state.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::database::UserRepository;
use crate::errors::{AppError, AppResult};
use crate::models::{User, UserRole};

const ISSUER: &str = "streamcast";

/// Access and refresh tokens returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT claims carried by both token kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub iss: String,
    pub sub: String,
}

impl Claims {
    /// Gate an operation on a minimum role
    pub fn require(&self, role: UserRole) -> AppResult<()> {
        if self.role.has_permission(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

pub struct AuthService {
    users: UserRepository,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiration: Duration,
    refresh_expiration: Duration,
}

impl AuthService {
    pub fn new(users: UserRepository, config: &JwtConfig) -> Self {
        Self {
            users,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            token_expiration: Duration::hours(config.expiration_hours),
            refresh_expiration: Duration::hours(config.refresh_hours),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenPair> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::unauthorized("invalid email or password"))?;

        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| AppError::internal(format!("password verification failed: {e}")))?;
        if !valid {
            return Err(AppError::unauthorized("invalid email or password"));
        }

        self.generate_token_pair(&user)
    }

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self.validate_token(refresh_token)?;

        let user = self
            .users
            .get(claims.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

        self.generate_token_pair(&user)
    }

    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::unauthorized("token expired")
                }
                _ => AppError::unauthorized("invalid token"),
            })
    }

    pub async fn user(&self, id: Uuid) -> AppResult<User> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("user", id.to_string()))
    }

    pub async fn current_user(&self, token: &str) -> AppResult<User> {
        let claims = self.validate_token(token)?;
        self.users
            .get(claims.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("user no longer exists"))
    }

    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> AppResult<User> {
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?;

        let mut user = User::new(email, name, role);
        user.password_hash = hash;

        self.users.create(&user).await?;
        info!(email = %user.email, role = %user.role, "created user");
        Ok(user)
    }

    fn generate_token_pair(&self, user: &User) -> AppResult<TokenPair> {
        let now = Utc::now();
        let expires_at = now + self.token_expiration;

        let access_token = self.sign(user, now, expires_at)?;
        let refresh_token = self.sign(user, now, now + self.refresh_expiration)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    fn sign(&self, user: &User, now: DateTime<Utc>, expires: DateTime<Utc>) -> AppResult<String> {
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: expires.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            iss: ISSUER.to_string(),
            sub: user.id.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("token signing failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (EncodingKey, DecodingKey) {
        (
            EncodingKey::from_secret(b"test-secret"),
            DecodingKey::from_secret(b"test-secret"),
        )
    }

    fn claims_with_exp(exp: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            user_id: Uuid::new_v4(),
            email: "op@example.com".to_string(),
            role: UserRole::Operator,
            exp,
            iat: now,
            nbf: now,
            iss: ISSUER.to_string(),
            sub: "test".to_string(),
        }
    }

    #[test]
    fn tokens_round_trip() {
        let (encoding, decoding) = keys();
        let claims = claims_with_exp(Utc::now().timestamp() + 3600);
        let token = encode(&Header::default(), &claims, &encoding).unwrap();

        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        let decoded = decode::<Claims>(&token, &decoding, &validation).unwrap();

        assert_eq!(decoded.claims.user_id, claims.user_id);
        assert_eq!(decoded.claims.role, UserRole::Operator);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let (encoding, decoding) = keys();
        let claims = claims_with_exp(Utc::now().timestamp() - 3600);
        let token = encode(&Header::default(), &claims, &encoding).unwrap();

        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        let err = decode::<Claims>(&token, &decoding, &validation).unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn role_gate_rejects_insufficient_roles() {
        let claims = claims_with_exp(Utc::now().timestamp() + 3600);
        assert!(claims.require(UserRole::Viewer).is_ok());
        assert!(claims.require(UserRole::Operator).is_ok());
        assert!(matches!(
            claims.require(UserRole::Admin),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn bcrypt_hashes_verify() {
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        assert!(bcrypt::verify("hunter2", &hash).unwrap());
        assert!(!bcrypt::verify("wrong", &hash).unwrap());
    }
}
