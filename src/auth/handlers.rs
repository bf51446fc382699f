use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::users::{self, UserError};
use crate::db::models::{User, UserId};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

impl Credentials {
    fn require(self) -> AppResult<(String, String)> {
        let email = self.email.unwrap_or_default();
        let password = self.password.unwrap_or_default();
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "Email and password are required".into(),
            ));
        }
        Ok((email, password))
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Duplicate => AppError::Conflict("User already exists".into()),
            UserError::Database(e) => AppError::Pool(e),
            UserError::Sql(e) => AppError::Database(e),
            UserError::Hash(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// Run bcrypt work on the blocking pool.
async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> Result<T, UserError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("user task failed: {}", e)))?
        .map_err(AppError::from)
}

fn respond_with_token(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let token = state
        .tokens
        .issue(user.id)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(AuthResponse {
        token,
        user: UserSummary {
            id: user.id,
            email: user.email,
        },
    })
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(credentials) =
        payload.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;
    let (email, password) = credentials.require()?;

    let db = state.db.clone();
    let cost = state.config.auth.bcrypt_cost;
    let user = run_blocking(move || users::create_user(&db, &email, &password, cost)).await?;
    tracing::info!(user_id = %user.id, "Registered user");

    Ok((StatusCode::CREATED, Json(respond_with_token(&state, user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(credentials) =
        payload.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;
    let (email, password) = credentials.require()?;

    let db = state.db.clone();
    let user = run_blocking(move || users::authenticate(&db, &email, &password))
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid credentials".into()))?;
    tracing::debug!(user_id = %user.id, "User logged in");

    Ok(Json(respond_with_token(&state, user)?))
}
