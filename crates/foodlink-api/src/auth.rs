use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use foodlink_types::api::{Claims, LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse};
use foodlink_types::events::{ChangeKind, Table};
use foodlink_types::models::Role;

use crate::error::{ApiError, required};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::bad_request("a valid email is required"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }
    let full_name = required("full_name", &req.full_name)?;
    if req.role == Role::Admin {
        return Err(ApiError::bad_request("admin accounts cannot be self-registered"));
    }

    let lookup = email.clone();
    if state.run_db(move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::conflict("email already registered"));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        error!("password hashing failed: {}", e);
        ApiError::Internal
    })?;

    let user_id = Uuid::new_v4();
    let role = req.role;
    let (stored_email, stored_name) = (email.clone(), full_name.clone());
    let profile = state
        .run_db(move |db| {
            db.create_user(user_id, &stored_email, &password_hash, &stored_name, role)?;
            db.get_profile(user_id)
        })
        .await
        .map_err(|e| match e {
            ApiError::Conflict(_) => ApiError::conflict("email already registered"),
            other => other,
        })?;

    if let Some(profile) = &profile {
        state.publish(Table::Profiles, ChangeKind::Insert, profile);
    }
    info!("registered {} as {}", user_id, role);

    let token = create_token(&state.jwt_secret, state.token_ttl, user_id, &email, role).map_err(|e| {
        error!("token signing failed: {}", e);
        ApiError::Internal
    })?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, role, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let user = state
        .run_db(move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    verify_password(&req.password, &user.password)?;

    let user_id = user.id;
    let profile = state.run_db(move |db| db.get_profile(user_id)).await?;

    let token = create_token(&state.jwt_secret, state.token_ttl, user.id, &user.email, user.role).map_err(|e| {
        error!("token signing failed: {}", e);
        ApiError::Internal
    })?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        full_name: profile.map(|p| p.full_name).unwrap_or_default(),
        role: user.role,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (user, profile) = state
        .run_db(move |db| Ok((db.get_user_by_id(user_id)?, db.get_profile(user_id)?)))
        .await?;

    match (user, profile) {
        (Some(user), Some(profile)) => Ok(Json(MeResponse {
            email: user.email,
            role: user.role,
            profile,
        })),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored: &str) -> Result<(), ApiError> {
    let parsed_hash = PasswordHash::new(stored).map_err(|_| ApiError::Internal)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)
}

pub fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    user_id: Uuid,
    email: &str,
    role: Role,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(verify_password("wrong horse", &hash), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn token_carries_role_and_expiry() {
        let id = Uuid::new_v4();
        let token = create_token("test-secret", chrono::Duration::days(1), id, "a@b.org", Role::Ngo).unwrap();
        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap()
        .claims;
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Ngo);
        assert!(claims.exp as i64 > chrono::Utc::now().timestamp());
    }
}
