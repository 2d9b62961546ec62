
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{ApiError, FieldError, StoreError},
    models::{AuthResponse, LoginRequest, NewUser, RegisterRequest, Role, User},
    repository::{Repository, RepositoryState},
};

const MIN_PASSWORD_CHARS: usize = 8;
const MAX_NAME_CHARS: usize = 100;

/// Claims
///
/// Payload of a session token. Signed with the server's HS256 secret and validated on
/// every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id. The user row is re-read on every request, so a
    /// deleted account loses access even with an unexpired token.
    pub sub: Uuid,
    /// Role at issue time. Informational only: the stored role wins.
    pub role: Role,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
}

/// issue_token
///
/// Signs a session token for `user` valid for `config.jwt_ttl_secs`.
pub fn issue_token(config: &AppConfig, user: &User) -> Result<String, ApiError> {
    let iat = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat,
        exp: iat + config.jwt_ttl_secs as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|err| {
        tracing::error!(error = %err, "failed to sign session token");
        ApiError::Internal
    })
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take it as an argument
/// to require a session; role checks are made against `role`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        AuthUser {
            id: user.id,
            name: user.name,
            role: user.role,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user is
///    accepted as that user.
/// 2. Bearer token: the `Authorization: Bearer <jwt>` header is decoded and validated
///    (signature and expiry).
/// 3. Store lookup: the subject must still exist; its current role is used.
///
/// Rejection: `ApiError::Unauthenticated` (401) on any session failure, and
/// `ApiError::Internal` (500) when the store cannot be read.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            if let Some(user_id) = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok())
            {
                if let Some(user) = repo.get_user(user_id).await? {
                    tracing::debug!(user_id = %user.id, "local identity bypass");
                    return Ok(user.into());
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("expired session token"),
                _ => tracing::warn!(error = %err, "invalid session token"),
            }
            ApiError::Unauthenticated
        })?;

        let user = repo
            .get_user(token_data.claims.sub)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(user.into())
    }
}

/// MaybeAuthUser
///
/// Optional identity for routes that serve guests and members differently. A missing
/// or invalid session yields `None`; a store failure while loading the user is still
/// an error.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(ApiError::Internal) => Err(ApiError::Internal),
            Err(_) => Ok(MaybeAuthUser(None)),
        }
    }
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut details = Vec::new();
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        details.push(FieldError::new("email", "must be a valid email address"));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        details.push(FieldError::new("password", "must be at least 8 characters"));
    }
    let name_len = req.name.trim().chars().count();
    if name_len == 0 || name_len > MAX_NAME_CHARS {
        details.push(FieldError::new("name", "must be between 1 and 100 characters"));
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation("Invalid registration data", details))
    }
}

/// register
///
/// Creates a USER account and signs a session for it. Hashing runs on the blocking
/// pool so it does not stall the async workers.
pub async fn register(
    repo: &dyn Repository,
    config: &AppConfig,
    req: RegisterRequest,
) -> Result<AuthResponse, ApiError> {
    validate_registration(&req)?;
    let email = req.email.trim().to_lowercase();

    let cost = config.bcrypt_cost;
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing task failed");
            ApiError::Internal
        })?
        .map_err(|err| {
            tracing::error!(error = %err, "failed to hash password");
            ApiError::Internal
        })?;

    let new_user = NewUser {
        email,
        password_hash,
        name: req.name.trim().to_string(),
    };
    let user = match repo.create_user(new_user).await {
        Ok(user) => user,
        Err(StoreError::UniqueViolation) => {
            return Err(ApiError::conflict("An account with this email already exists"));
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(user_id = %user.id, "account registered");
    let token = issue_token(config, &user)?;
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

/// login
///
/// Exchanges credentials for a session. Unknown email and wrong password produce the
/// same error.
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    req: LoginRequest,
) -> Result<AuthResponse, ApiError> {
    let invalid = || ApiError::InvalidCredentials("Invalid email or password".to_string());

    let email = req.email.trim().to_lowercase();
    let Some(user) = repo.find_user_by_email(&email).await? else {
        tracing::warn!("login for unknown email");
        return Err(invalid());
    };

    let hash = user.password_hash.clone();
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "password verification task failed");
            ApiError::Internal
        })?
        .unwrap_or_else(|err| {
            // An unparseable stored hash can never match.
            tracing::warn!(user_id = %user.id, error = %err, "stored password hash rejected");
            false
        });

    if !matches {
        tracing::warn!(user_id = %user.id, "login with wrong password");
        return Err(invalid());
    }

    tracing::info!(user_id = %user.id, "session issued");
    let token = issue_token(config, &user)?;
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}
