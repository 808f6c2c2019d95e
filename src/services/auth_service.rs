use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{info, warn};

use crate::db::entities::user;
use crate::db::models::NewUser;
use crate::db::repository::{Store, StoreError};
use crate::server::config::ServerConfig;
use crate::services::profile_service::profile_of;
use crate::web::error::AppError;
use crate::web::models::{AuthenticatedUser, Claims, LoginRequest, LoginResponse, RegisterRequest};

const MIN_PASSWORD_LEN: usize = 8;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register_user(
    store: &dyn Store,
    config: &ServerConfig,
    req: RegisterRequest,
) -> Result<LoginResponse, AppError> {
    let name = req.name.trim();
    let branch = req.branch.trim();
    let email = normalize_email(&req.email);
    if name.is_empty() || branch.is_empty() || email.is_empty() {
        return Err(AppError::InvalidInput(
            "Name, branch and email are required".to_string(),
        ));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash(&req.password, DEFAULT_COST)
        .map_err(|e| AppError::PasswordHashingError(e.to_string()))?;

    let goals = req.goals.map(|g| g.trim().to_string()).filter(|g| !g.is_empty());
    let created = store
        .create_user(NewUser {
            name: name.to_string(),
            branch: branch.to_string(),
            email,
            password_hash,
            goals,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => AppError::UserAlreadyExists("Email already exists".to_string()),
            other => other.into(),
        })?;

    info!(user_id = created.id, "Registered new user.");
    let token = create_jwt_for_user(&created, config)?;
    Ok(LoginResponse {
        token,
        user: profile_of(created, Vec::new()),
    })
}

pub async fn login_user(
    store: &dyn Store,
    config: &ServerConfig,
    req: LoginRequest,
) -> Result<LoginResponse, AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput("Email and password are required".to_string()));
    }

    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let valid_password = verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;
    if !valid_password {
        warn!(user_id = user.id, "Rejected login with wrong password.");
        return Err(AppError::InvalidCredentials);
    }

    let token = create_jwt_for_user(&user, config)?;
    let subjects = store.subjects_for_user(user.id).await?;
    Ok(LoginResponse {
        token,
        user: profile_of(user, subjects),
    })
}

pub fn create_jwt_for_user(user: &user::Model, config: &ServerConfig) -> Result<String, AppError> {
    let lifetime = Duration::try_hours(config.jwt_expiry_hours)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| AppError::TokenCreationError("Invalid token lifetime".to_string()))?;
    let expiration = Utc::now()
        .checked_add_signed(lifetime)
        .and_then(|t| usize::try_from(t.timestamp()).ok())
        .ok_or_else(|| AppError::TokenCreationError("Invalid token lifetime".to_string()))?;

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::TokenCreationError(e.to_string()))
}

/// Validates the token and checks that its user still exists.
pub async fn authenticate_token(
    store: &dyn Store,
    jwt_secret: &str,
    token: &str,
) -> Result<AuthenticatedUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = ?e, "JWT decoding error.");
        AppError::AuthenticationRequired
    })?;

    let user = store
        .find_user(token_data.claims.user_id)
        .await?
        .ok_or(AppError::AuthenticationRequired)?;

    Ok(AuthenticatedUser {
        id: user.id,
        name: user.name,
        email: user.email,
    })
}
